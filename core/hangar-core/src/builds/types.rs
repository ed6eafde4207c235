use serde::{Deserialize, Serialize};

/// One validated game installation in the library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildEntry {
    /// Opaque identity, assigned at creation.
    pub id: String,
    /// Directory the user added. Several entries may share a path.
    pub path: String,
    /// Display label taken from the last path segment when the entry was created.
    pub name: String,
    /// `data:` URI of the splash image, if the build ships one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
}

impl BuildEntry {
    pub fn new(path: impl Into<String>, cover: Option<String>) -> Self {
        let path = path.into();
        let name = display_name(&path);
        Self {
            id: ulid::Ulid::new().to_string(),
            path,
            name,
            cover,
        }
    }
}

/// Last non-empty segment of `path`, accepting both `/` and `\` separators.
pub(crate) fn display_name(path: &str) -> String {
    path.rsplit(|c: char| c == '/' || c == '\\')
        .find(|segment| !segment.is_empty())
        .unwrap_or(path)
        .to_string()
}
