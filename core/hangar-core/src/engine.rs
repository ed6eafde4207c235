//! Launcher - The main entry point for Hangar clients.
//!
//! Wires the build registry, the session and the launch supervisor to one
//! persistent store and one host. UI-level intents ("add build", "select
//! build", "launch") go through here.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use hangar_core::{Launcher, StorageConfig};
//!
//! let mut launcher = Launcher::open(StorageConfig::default())?;
//! launcher.add_build("/games/Foo")?;
//! launcher.login("player@example.com", "hunter2")?;
//! launcher.launch()?;
//! ```

use std::path::Path;
use std::sync::Arc;

use tokio::sync::watch;

use crate::builds::{BuildEntry, BuildRegistry, BuildValidator};
use crate::config::LauncherConfig;
use crate::error::{Result, StoreError};
use crate::launch::{LaunchHost, LaunchState, LaunchSupervisor, Notice, ProcessHost};
use crate::session::{Credentials, SessionStore};
use crate::storage::StorageConfig;
use crate::store::{FileStore, PersistentStore};

pub struct Launcher<H: LaunchHost + 'static = ProcessHost> {
    storage: StorageConfig,
    config: LauncherConfig,
    registry: BuildRegistry,
    session: SessionStore,
    supervisor: LaunchSupervisor<H>,
}

impl Launcher<ProcessHost> {
    /// Opens the launcher rooted at `storage`: reads `config.json`, loads
    /// `store.json` and starts games with a `ProcessHost`.
    pub fn open(storage: StorageConfig) -> Result<Self> {
        storage.ensure_dirs().map_err(|source| StoreError::Io {
            context: format!("creating {}", storage.root().display()),
            source,
        })?;
        let config = LauncherConfig::load(&storage);
        let store: Arc<dyn PersistentStore> = Arc::new(FileStore::open(&storage.store_file())?);
        let host = Arc::new(ProcessHost::new(config.host.clone()));
        Ok(Self::with_parts(storage, config, store, host))
    }
}

impl<H: LaunchHost + 'static> Launcher<H> {
    /// Builds a launcher from explicit parts. Used by tests and embedders that
    /// bring their own store or host.
    pub fn with_parts(
        storage: StorageConfig,
        config: LauncherConfig,
        store: Arc<dyn PersistentStore>,
        host: Arc<H>,
    ) -> Self {
        let validator = BuildValidator::new(config.layout.clone());
        let registry = BuildRegistry::load(Arc::clone(&store), validator);
        let session = SessionStore::load(store);
        let supervisor = LaunchSupervisor::new(host, config.supervisor());
        Self {
            storage,
            config,
            registry,
            session,
            supervisor,
        }
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    pub fn host(&self) -> &Arc<H> {
        self.supervisor.host()
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Builds API
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn builds(&self) -> &[BuildEntry] {
        self.registry.list()
    }

    /// Validates `path` and adds it as the newest, selected build.
    pub fn add_build(&mut self, path: impl AsRef<Path>) -> Result<BuildEntry> {
        Ok(self.registry.add(path.as_ref())?)
    }

    pub fn remove_build(&mut self, id: &str) -> Result<()> {
        Ok(self.registry.remove(id)?)
    }

    pub fn select_build(&mut self, path: &str) -> Result<()> {
        Ok(self.registry.select(path)?)
    }

    pub fn selected_build(&self) -> Option<&BuildEntry> {
        self.registry.selected()
    }

    pub fn selected_path(&self) -> &str {
        self.registry.selected_path()
    }

    /// The build a launch would start, if any.
    pub fn launch_path(&self) -> Option<&str> {
        self.registry.launch_path()
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Session API
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn login(&mut self, email: &str, password: &str) -> Result<()> {
        Ok(self.session.login(Credentials::new(email, password))?)
    }

    /// Signs out and wipes all launcher state, including the build library.
    /// A running launch cycle is torn down first.
    pub fn logout(&mut self) -> Result<()> {
        self.supervisor.shutdown();
        Ok(self.session.logout(&mut self.registry)?)
    }

    pub fn session(&self) -> Option<&Credentials> {
        self.session.get()
    }

    pub fn eor(&self) -> bool {
        self.session.eor()
    }

    pub fn set_eor(&mut self, enabled: bool) -> Result<()> {
        Ok(self.session.set_eor(enabled)?)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Launch API
    // ─────────────────────────────────────────────────────────────────────────────

    /// Starts a launch cycle. Must be called inside a tokio runtime.
    pub fn launch(&mut self) -> Result<()> {
        Ok(self.supervisor.launch(&self.registry, &self.session)?)
    }

    pub fn state(&self) -> LaunchState {
        self.supervisor.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<LaunchState> {
        self.supervisor.subscribe()
    }

    pub fn notice(&self) -> Option<Notice> {
        self.supervisor.notice()
    }

    pub fn shutdown(&mut self) {
        self.supervisor.shutdown();
    }
}
