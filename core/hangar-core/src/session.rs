//! The signed-in user's credential pair and the EOR toggle.
//!
//! Credentials are written exactly as given. The password is stored in
//! plaintext in the store file; `Debug` output redacts it so it does not leak
//! into logs.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::builds::{BuildRegistry, ValidateBuild};
use crate::error::StoreError;
use crate::store::{PersistentStore, KEY_EOR, KEY_SESSION};

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

pub struct SessionStore {
    store: Arc<dyn PersistentStore>,
    credentials: Option<Credentials>,
    eor: bool,
}

impl SessionStore {
    pub fn load(store: Arc<dyn PersistentStore>) -> Self {
        let credentials = store.get(KEY_SESSION).and_then(|value| {
            serde_json::from_value::<Credentials>(value)
                .map_err(|err| {
                    tracing::warn!(error = %err, "Persisted session is malformed; treating as signed out");
                })
                .ok()
        });
        let eor = store
            .get(KEY_EOR)
            .and_then(|value| value.as_bool())
            .unwrap_or(false);

        Self {
            store,
            credentials,
            eor,
        }
    }

    pub fn login(&mut self, credentials: Credentials) -> Result<(), StoreError> {
        let value = serde_json::to_value(&credentials).map_err(|source| StoreError::Json {
            context: "serializing session".to_string(),
            source,
        })?;
        self.store.set(KEY_SESSION, value)?;
        tracing::info!(email = %credentials.email, "Signed in");
        self.credentials = Some(credentials);
        Ok(())
    }

    /// Total reset: clears every persisted key, then the session, the toggle
    /// and the build library in memory. Nothing changes if the clear fails.
    pub fn logout<V: ValidateBuild>(
        &mut self,
        registry: &mut BuildRegistry<V>,
    ) -> Result<(), StoreError> {
        self.store.clear()?;
        self.credentials = None;
        self.eor = false;
        registry.reset();
        tracing::info!("Signed out; launcher state cleared");
        Ok(())
    }

    pub fn get(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.credentials.is_some()
    }

    pub fn eor(&self) -> bool {
        self.eor
    }

    pub fn set_eor(&mut self, enabled: bool) -> Result<(), StoreError> {
        self.store.set(KEY_EOR, Value::Bool(enabled))?;
        self.eor = enabled;
        tracing::debug!(enabled, "EOR toggle updated");
        Ok(())
    }
}
