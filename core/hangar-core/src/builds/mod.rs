//! The local library of installed game builds.
//!
//! `BuildValidator` decides whether a directory is a game installation;
//! `BuildRegistry` owns the bounded, persisted list of accepted builds and
//! the current selection.

mod registry;
mod types;
mod validator;

pub use registry::{BuildRegistry, MAX_BUILDS};
pub use types::BuildEntry;
pub use validator::{encode_data_uri, BuildLayout, BuildValidator, ValidateBuild};
