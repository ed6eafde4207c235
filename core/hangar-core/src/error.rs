//! Error types for hangar-core operations.
//!
//! Each component has its own enum so callers can match on exactly the
//! failures that component can produce. `HangarError` folds them together for
//! clients that only need a message.

use std::path::PathBuf;

// ═══════════════════════════════════════════════════════════════════════════════
// Persistence
// ═══════════════════════════════════════════════════════════════════════════════

/// Failures of the durable key-value layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

// ═══════════════════════════════════════════════════════════════════════════════
// Build Library
// ═══════════════════════════════════════════════════════════════════════════════

/// A candidate directory was rejected as a game build.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Not a readable directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),

    #[error("Not a game installation: {} has no {required} directory", .path.display())]
    NotAnInstallation { path: PathBuf, required: String },
}

/// Failures of the build registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Build library is full ({capacity} builds); remove one first")]
    Full { capacity: usize },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to persist build library: {0}")]
    Store(#[from] StoreError),
}

// ═══════════════════════════════════════════════════════════════════════════════
// Launch
// ═══════════════════════════════════════════════════════════════════════════════

/// Reasons a launch cycle did not start.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LaunchError {
    #[error("No build selected")]
    NoBuildSelected,

    #[error("Not logged in")]
    NotAuthenticated,

    #[error("Launch rejected: {0}")]
    CommandRejected(String),
}

// ═══════════════════════════════════════════════════════════════════════════════
// Umbrella
// ═══════════════════════════════════════════════════════════════════════════════

/// All errors that can occur in hangar-core operations.
#[derive(Debug, thiserror::Error)]
pub enum HangarError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Launch(#[from] LaunchError),
}

impl From<ValidationError> for HangarError {
    fn from(err: ValidationError) -> Self {
        HangarError::Registry(RegistryError::Validation(err))
    }
}

/// Convenience type alias for Results using HangarError.
pub type Result<T> = std::result::Result<T, HangarError>;

impl From<HangarError> for String {
    fn from(err: HangarError) -> String {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_surfaces_through_registry_unchanged() {
        let inner = ValidationError::NotAnInstallation {
            path: PathBuf::from("/games/Foo"),
            required: "Engine".to_string(),
        };
        let wrapped = RegistryError::from(inner.clone());
        assert_eq!(wrapped.to_string(), inner.to_string());
        assert!(matches!(wrapped, RegistryError::Validation(e) if e == inner));
    }

    #[test]
    fn full_error_names_capacity() {
        let err = RegistryError::Full { capacity: 16 };
        assert!(err.to_string().contains("16"));
    }
}
