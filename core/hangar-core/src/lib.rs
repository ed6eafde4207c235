//! # hangar-core
//!
//! Core library for Hangar, a game launcher: the local library of installed
//! builds, the signed-in session, and supervision of a launched game.
//!
//! ## Design Principles
//!
//! - **Injected storage**: every component reads and writes through a
//!   `PersistentStore` it is handed; nothing is global.
//! - **Validate, then commit**: an in-memory view only changes after the store
//!   accepted the write, so a failed write never leaves a half-applied state.
//! - **Graceful degradation**: missing or corrupt files load as empty/default
//!   values with a warning, not errors.
//! - **Async only where time passes**: registry and session calls are
//!   synchronous; liveness polling and notice expiry run as tokio tasks.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hangar_core::{Launcher, StorageConfig};
//!
//! let mut launcher = Launcher::open(StorageConfig::default())?;
//! let entry = launcher.add_build("/games/Foo")?;
//! launcher.login("player@example.com", "hunter2")?;
//! launcher.launch()?;
//! ```

pub mod builds;
pub mod config;
pub mod engine;
pub mod error;
pub mod launch;
pub mod session;
pub mod storage;
pub mod store;

pub use builds::{
    encode_data_uri, BuildEntry, BuildLayout, BuildRegistry, BuildValidator, ValidateBuild,
    MAX_BUILDS,
};
pub use config::LauncherConfig;
pub use engine::Launcher;
pub use error::{
    HangarError, LaunchError, RegistryError, Result, StoreError, ValidationError,
};
pub use launch::{
    HostConfig, LaunchHost, LaunchRequest, LaunchState, LaunchSupervisor, Notice, NoticeBoard,
    ProcessHost, ScriptedHost, SupervisorConfig,
};
pub use session::{Credentials, SessionStore};
pub use storage::{StorageConfig, HOME_ENV};
pub use store::{FileStore, MemoryStore, PersistentStore};
