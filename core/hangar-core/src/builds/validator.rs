//! Decides whether a directory is a game installation.
//!
//! A build is accepted when its root contains the engine directory. The splash
//! image is optional: if it is present and readable it is embedded in the
//! entry as a `data:` URI, otherwise the entry simply has no cover.

use std::path::{Component, Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::types::BuildEntry;
use crate::error::ValidationError;

/// Bytes encoded per step. The largest multiple of 3 within 32 KiB, so each
/// chunk encodes without padding and the pieces concatenate cleanly.
const ENCODE_CHUNK_BYTES: usize = (32 * 1024 / 3) * 3;

/// Where things live inside a build directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildLayout {
    /// Directory that must exist directly under the build root.
    pub required_dir: String,
    /// Splash image, relative to the build root.
    pub cover_path: PathBuf,
}

impl Default for BuildLayout {
    fn default() -> Self {
        Self {
            required_dir: "Engine".to_string(),
            cover_path: ["Game", "Content", "Splash", "Splash.bmp"].iter().collect(),
        }
    }
}

/// Turns a candidate directory into a `BuildEntry`, or says why it can't.
///
/// The registry hands implementors an absolute path (see [`absolute_path`]).
pub trait ValidateBuild {
    fn validate(&self, candidate: &Path) -> Result<BuildEntry, ValidationError>;
}

#[derive(Debug, Clone, Default)]
pub struct BuildValidator {
    layout: BuildLayout,
}

impl BuildValidator {
    pub fn new(layout: BuildLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &BuildLayout {
        &self.layout
    }

    fn read_cover(&self, root: &Path) -> Option<String> {
        let cover_path = root.join(&self.layout.cover_path);
        let bytes = match fs_err::read(&cover_path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                tracing::warn!(
                    path = %cover_path.display(),
                    error = %err,
                    "Failed to read build cover; continuing without one"
                );
                return None;
            }
        };
        Some(encode_data_uri(mime_for(&cover_path), &bytes))
    }
}

impl ValidateBuild for BuildValidator {
    fn validate(&self, candidate: &Path) -> Result<BuildEntry, ValidationError> {
        let absolute = absolute_path(candidate)?;
        let candidate = absolute.as_path();
        let Some(path) = candidate.to_str() else {
            return Err(ValidationError::NonUtf8Path(candidate.to_path_buf()));
        };

        let is_dir = std::fs::metadata(candidate)
            .map(|meta| meta.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(ValidationError::NotADirectory(candidate.to_path_buf()));
        }

        if !candidate.join(&self.layout.required_dir).is_dir() {
            return Err(ValidationError::NotAnInstallation {
                path: candidate.to_path_buf(),
                required: self.layout.required_dir.clone(),
            });
        }

        let cover = self.read_cover(candidate);
        Ok(BuildEntry::new(path, cover))
    }
}

/// `candidate` joined onto the working directory when relative, with `.` and
/// `..` resolved lexically. Symlinks are kept as written.
pub(crate) fn absolute_path(candidate: &Path) -> Result<PathBuf, ValidationError> {
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        let cwd = std::env::current_dir().map_err(|err| {
            tracing::warn!(error = %err, "Working directory unavailable; cannot resolve build path");
            ValidationError::NotADirectory(candidate.to_path_buf())
        })?;
        cwd.join(candidate)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}

/// Encodes `bytes` as `data:<mime>;base64,<payload>`, one bounded chunk at a time.
pub fn encode_data_uri(mime: &str, bytes: &[u8]) -> String {
    let prefix = format!("data:{mime};base64,");
    let mut out = String::with_capacity(prefix.len() + bytes.len().div_ceil(3) * 4);
    out.push_str(&prefix);
    for chunk in bytes.chunks(ENCODE_CHUNK_BYTES) {
        BASE64_STANDARD.encode_string(chunk, &mut out);
    }
    out
}

fn mime_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("bmp") => "image/bmp",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}
