//! Ordered, bounded, persisted library of builds.
//!
//! Entries are kept newest-first. The in-memory view only changes after the
//! store accepted the write, so a failed commit leaves the registry exactly as
//! it was last persisted.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use super::types::BuildEntry;
use super::validator::{absolute_path, BuildValidator, ValidateBuild};
use crate::error::RegistryError;
use crate::store::{PersistentStore, KEY_BUILDS, KEY_SELECTED_PATH};

/// Maximum number of builds in the library.
pub const MAX_BUILDS: usize = 16;

pub struct BuildRegistry<V: ValidateBuild = BuildValidator> {
    store: Arc<dyn PersistentStore>,
    validator: V,
    entries: Vec<BuildEntry>,
    /// Empty string means "nothing selected".
    selected_path: String,
}

impl<V: ValidateBuild> BuildRegistry<V> {
    /// Reads the persisted list and selection.
    ///
    /// An empty persisted selection with a non-empty list selects the newest
    /// entry (in memory only, until the next commit).
    pub fn load(store: Arc<dyn PersistentStore>, validator: V) -> Self {
        let mut entries = read_entries(store.get(KEY_BUILDS));
        if entries.len() > MAX_BUILDS {
            tracing::warn!(
                count = entries.len(),
                max = MAX_BUILDS,
                "Persisted build list exceeds capacity; keeping newest entries"
            );
            entries.truncate(MAX_BUILDS);
        }

        let mut selected_path = store
            .get(KEY_SELECTED_PATH)
            .and_then(|value| value.as_str().map(str::to_string))
            .unwrap_or_default();
        if selected_path.is_empty() {
            if let Some(first) = entries.first() {
                selected_path = first.path.clone();
            }
        }

        Self {
            store,
            validator,
            entries,
            selected_path,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Validates `candidate` and puts it at the front of the library, selected.
    /// A relative `candidate` is resolved against the working directory.
    pub fn add(&mut self, candidate: &Path) -> Result<BuildEntry, RegistryError> {
        if self.is_full() {
            return Err(RegistryError::Full {
                capacity: MAX_BUILDS,
            });
        }

        let candidate = absolute_path(candidate)?;
        let entry = self.validator.validate(&candidate)?;

        let mut entries = Vec::with_capacity(self.entries.len() + 1);
        entries.push(entry.clone());
        entries.extend(self.entries.iter().cloned());
        self.commit(entries, entry.path.clone())?;

        tracing::info!(id = %entry.id, path = %entry.path, has_cover = entry.cover.is_some(), "Build added");
        Ok(entry)
    }

    /// Removes the entry with `id`. Unknown ids are ignored.
    pub fn remove(&mut self, id: &str) -> Result<(), RegistryError> {
        let Some(index) = self.entries.iter().position(|entry| entry.id == id) else {
            return Ok(());
        };

        let mut entries = self.entries.clone();
        let removed = entries.remove(index);
        let selected_path = if removed.path == self.selected_path {
            entries
                .first()
                .map(|entry| entry.path.clone())
                .unwrap_or_default()
        } else {
            self.selected_path.clone()
        };
        self.commit(entries, selected_path)?;

        tracing::info!(id = %removed.id, path = %removed.path, "Build removed");
        Ok(())
    }

    /// Selects `path`, whether or not an entry has it. `""` clears the selection.
    pub fn select(&mut self, path: &str) -> Result<(), RegistryError> {
        self.store
            .set(KEY_SELECTED_PATH, Value::String(path.to_string()))?;
        self.selected_path = path.to_string();
        tracing::debug!(path, "Build selected");
        Ok(())
    }

    /// Drops entries and selection from memory. Persisted keys are the
    /// caller's to clear.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.selected_path.clear();
    }

    fn commit(
        &mut self,
        entries: Vec<BuildEntry>,
        selected_path: String,
    ) -> Result<(), RegistryError> {
        let list = serde_json::to_value(&entries).map_err(|source| {
            crate::error::StoreError::Json {
                context: "serializing build list".to_string(),
                source,
            }
        })?;
        self.store.commit(vec![
            (KEY_BUILDS, Some(list)),
            (KEY_SELECTED_PATH, Some(Value::String(selected_path.clone()))),
        ])?;
        self.entries = entries;
        self.selected_path = selected_path;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn list(&self) -> &[BuildEntry] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&BuildEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= MAX_BUILDS
    }

    /// Raw selection; empty when nothing is selected.
    pub fn selected_path(&self) -> &str {
        &self.selected_path
    }

    /// The selected entry: an exact path match, else the newest entry.
    /// `None` when the selection is empty or the library is.
    pub fn selected(&self) -> Option<&BuildEntry> {
        if self.selected_path.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|entry| entry.path == self.selected_path)
            .or_else(|| self.entries.first())
    }

    /// Path a launch should use: the selection as-is, else the newest entry.
    pub fn launch_path(&self) -> Option<&str> {
        if !self.selected_path.is_empty() {
            return Some(&self.selected_path);
        }
        self.entries.first().map(|entry| entry.path.as_str())
    }
}

fn read_entries(value: Option<Value>) -> Vec<BuildEntry> {
    let Some(value) = value else {
        return Vec::new();
    };
    match serde_json::from_value::<Vec<BuildEntry>>(value) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::warn!(error = %err, "Persisted build list is malformed; starting empty");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::cell::Cell;

    /// Accepts every path except ones containing "bad"; counts calls.
    #[derive(Default)]
    struct CountingValidator {
        calls: Cell<usize>,
    }

    impl ValidateBuild for CountingValidator {
        fn validate(&self, candidate: &Path) -> Result<BuildEntry, ValidationError> {
            self.calls.set(self.calls.get() + 1);
            let path = candidate.to_string_lossy();
            if path.contains("bad") {
                return Err(ValidationError::NotAnInstallation {
                    path: candidate.to_path_buf(),
                    required: "Engine".to_string(),
                });
            }
            Ok(BuildEntry::new(path, None))
        }
    }

    fn registry() -> (Arc<MemoryStore>, BuildRegistry<CountingValidator>) {
        let store = Arc::new(MemoryStore::new());
        let registry = BuildRegistry::load(store.clone(), CountingValidator::default());
        (store, registry)
    }

    fn paths<V: ValidateBuild>(registry: &BuildRegistry<V>) -> Vec<&str> {
        registry.list().iter().map(|e| e.path.as_str()).collect()
    }

    #[test]
    fn add_prepends_and_selects() {
        let (_, mut registry) = registry();
        registry.add(Path::new("/games/A")).unwrap();
        registry.add(Path::new("/games/B")).unwrap();

        assert_eq!(paths(&registry), vec!["/games/B", "/games/A"]);
        assert_eq!(registry.selected_path(), "/games/B");
        assert_eq!(registry.selected().unwrap().name, "B");
    }

    #[test]
    fn relative_add_is_stored_absolute() {
        let (store, mut registry) = registry();
        let cwd = std::env::current_dir().unwrap();

        let entry = registry.add(Path::new("./Foo")).unwrap();
        let expected = cwd.join("Foo").to_string_lossy().into_owned();
        assert!(Path::new(&entry.path).is_absolute());
        assert_eq!(entry.path, expected);
        assert_eq!(entry.name, "Foo");
        assert_eq!(store.get(KEY_SELECTED_PATH), Some(json!(expected)));

        let entry = registry.add(Path::new("Foo/Bar/..")).unwrap();
        assert_eq!(entry.path, expected);
        assert_eq!(entry.name, "Foo");
    }

    #[test]
    fn add_persists_list_and_selection() {
        let (store, mut registry) = registry();
        let entry = registry.add(Path::new("/games/A")).unwrap();

        let persisted: Vec<BuildEntry> =
            serde_json::from_value(store.get(KEY_BUILDS).unwrap()).unwrap();
        assert_eq!(persisted, vec![entry]);
        assert_eq!(store.get(KEY_SELECTED_PATH), Some(json!("/games/A")));
    }

    #[test]
    fn seventeenth_add_is_rejected_without_validating() {
        let (_, mut registry) = registry();
        for i in 0..MAX_BUILDS {
            registry.add(Path::new(&format!("/games/{i}"))).unwrap();
        }
        let before = paths(&registry)
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>();
        assert_eq!(registry.validator.calls.get(), MAX_BUILDS);

        let err = registry.add(Path::new("/games/extra")).unwrap_err();
        assert!(matches!(err, RegistryError::Full { capacity: 16 }));
        assert_eq!(registry.validator.calls.get(), MAX_BUILDS);
        assert_eq!(registry.len(), MAX_BUILDS);
        assert_eq!(paths(&registry), before);
    }

    #[test]
    fn rejected_add_changes_nothing() {
        let (store, mut registry) = registry();
        registry.add(Path::new("/games/A")).unwrap();
        let persisted = store.get(KEY_BUILDS);

        let err = registry.add(Path::new("/games/bad")).unwrap_err();
        assert!(matches!(err, RegistryError::Validation(_)));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.selected_path(), "/games/A");
        assert_eq!(store.get(KEY_BUILDS), persisted);
    }

    #[test]
    fn duplicate_paths_are_kept() {
        let (_, mut registry) = registry();
        let a = registry.add(Path::new("/games/A")).unwrap();
        let b = registry.add(Path::new("/games/A")).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn removing_selected_entry_selects_new_first() {
        let (store, mut registry) = registry();
        registry.add(Path::new("/games/A")).unwrap();
        registry.add(Path::new("/games/B")).unwrap();
        let c = registry.add(Path::new("/games/C")).unwrap();

        registry.remove(&c.id).unwrap();
        assert_eq!(registry.selected_path(), "/games/B");
        assert_eq!(store.get(KEY_SELECTED_PATH), Some(json!("/games/B")));
    }

    #[test]
    fn removing_last_entry_clears_selection() {
        let (store, mut registry) = registry();
        let a = registry.add(Path::new("/games/A")).unwrap();

        registry.remove(&a.id).unwrap();
        assert!(registry.is_empty());
        assert_eq!(registry.selected_path(), "");
        assert!(registry.selected().is_none());
        assert_eq!(store.get(KEY_SELECTED_PATH), Some(json!("")));
    }

    #[test]
    fn removing_unselected_entry_keeps_selection() {
        let (_, mut registry) = registry();
        let a = registry.add(Path::new("/games/A")).unwrap();
        registry.add(Path::new("/games/B")).unwrap();
        registry.select("/games/B").unwrap();

        registry.remove(&a.id).unwrap();
        assert_eq!(registry.selected_path(), "/games/B");
    }

    #[test]
    fn removing_unknown_id_is_a_noop() {
        let (store, mut registry) = registry();
        registry.add(Path::new("/games/A")).unwrap();
        store.fail_writes(true);

        // No write is attempted, so the failing store is never hit.
        registry.remove("nope").unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn select_accepts_unknown_paths() {
        let (store, mut registry) = registry();
        registry.add(Path::new("/games/A")).unwrap();

        registry.select("/games/later").unwrap();
        assert_eq!(registry.selected_path(), "/games/later");
        assert_eq!(store.get(KEY_SELECTED_PATH), Some(json!("/games/later")));
        // Falls back to the newest entry when nothing matches.
        assert_eq!(registry.selected().unwrap().path, "/games/A");
        assert_eq!(registry.launch_path(), Some("/games/later"));
    }

    #[test]
    fn explicit_empty_selection_has_no_selected_entry() {
        let (_, mut registry) = registry();
        registry.add(Path::new("/games/A")).unwrap();
        registry.select("").unwrap();

        assert!(registry.selected().is_none());
        assert_eq!(registry.launch_path(), Some("/games/A"));
    }

    #[test]
    fn failed_commit_leaves_registry_unchanged() {
        let (store, mut registry) = registry();
        let a = registry.add(Path::new("/games/A")).unwrap();
        store.fail_writes(true);

        assert!(matches!(
            registry.add(Path::new("/games/B")),
            Err(RegistryError::Store(_))
        ));
        assert!(registry.remove(&a.id).is_err());
        assert!(registry.select("/x").is_err());

        assert_eq!(paths(&registry), vec!["/games/A"]);
        assert_eq!(registry.selected_path(), "/games/A");
    }

    #[test]
    fn load_defaults_selection_to_newest() {
        let store = Arc::new(MemoryStore::new());
        let a = BuildEntry::new("/games/A", None);
        let b = BuildEntry::new("/games/B", None);
        store
            .set(KEY_BUILDS, serde_json::to_value(vec![b.clone(), a]).unwrap())
            .unwrap();

        let registry = BuildRegistry::load(store, CountingValidator::default());
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.selected_path(), "/games/B");
    }

    #[test]
    fn load_keeps_persisted_selection() {
        let store = Arc::new(MemoryStore::new());
        let a = BuildEntry::new("/games/A", None);
        store
            .set(KEY_BUILDS, serde_json::to_value(vec![a]).unwrap())
            .unwrap();
        store.set(KEY_SELECTED_PATH, json!("/games/Z")).unwrap();

        let registry = BuildRegistry::load(store, CountingValidator::default());
        assert_eq!(registry.selected_path(), "/games/Z");
    }

    #[test]
    fn load_tolerates_malformed_and_oversized_lists() {
        let store = Arc::new(MemoryStore::new());
        store.set(KEY_BUILDS, json!({"not": "a list"})).unwrap();
        let registry = BuildRegistry::load(store.clone(), CountingValidator::default());
        assert!(registry.is_empty());

        let many: Vec<BuildEntry> = (0..20)
            .map(|i| BuildEntry::new(format!("/games/{i}"), None))
            .collect();
        store
            .set(KEY_BUILDS, serde_json::to_value(&many).unwrap())
            .unwrap();
        let registry = BuildRegistry::load(store, CountingValidator::default());
        assert_eq!(registry.len(), MAX_BUILDS);
        assert_eq!(registry.list()[0].path, "/games/0");
    }

    #[test]
    fn length_never_exceeds_capacity_under_mixed_operations() {
        let (_, mut registry) = registry();
        for round in 0..40 {
            let _ = registry.add(Path::new(&format!("/games/{round}")));
            if round % 7 == 0 {
                let id = registry.list().last().map(|e| e.id.clone());
                if let Some(id) = id {
                    registry.remove(&id).unwrap();
                }
            }
            assert!(registry.len() <= MAX_BUILDS);
        }
    }
}
