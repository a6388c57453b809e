//! Process-wide holder of the shared [`Client`] instance.
//!
//! A consuming application configures the kit once at bootstrap, either by
//! passing a [`ClientConfig`] to [`get_or_init`] or by building a client
//! itself and handing it to [`set`]. Everything downstream then reaches the
//! same instance through [`get_or_init`] with no config.
//!
//! The slot is guarded by a mutex, so racing first-time initializations
//! serialize instead of tearing; [`set`] still follows last-write-wins. Flow
//! APIs in this crate take the client by reference, so the global is only a
//! bootstrap convenience — explicit injection works everywhere.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::client::Client;
use crate::config::ClientConfig;
use crate::error::OpenfortKitError;

/// A slot holding at most one shared [`Client`].
///
/// The module-level functions delegate to a single process-wide `Registry`;
/// separate instances exist for tests and for applications that prefer
/// explicit wiring.
#[derive(Default)]
pub struct Registry {
    slot: Mutex<Option<Arc<Client>>>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Returns the held client, initializing it from `config` when unset.
    ///
    /// A supplied `config` is ignored once a client is held.
    ///
    /// # Errors
    ///
    /// Returns [`OpenfortKitError::Uninitialized`] when the slot is empty and
    /// no config is supplied.
    pub fn get_or_init(
        &self,
        config: Option<ClientConfig>,
    ) -> Result<Arc<Client>, OpenfortKitError> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = slot.as_ref() {
            return Ok(Arc::clone(client));
        }
        let Some(config) = config else {
            return Err(OpenfortKitError::Uninitialized);
        };
        let client = Arc::new(Client::new(config));
        *slot = Some(Arc::clone(&client));
        Ok(client)
    }

    /// Unconditionally replaces the held client. Last write wins.
    pub fn set(&self, client: Arc<Client>) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(client);
    }
}

fn shared() -> &'static Registry {
    static SHARED: OnceLock<Registry> = OnceLock::new();
    SHARED.get_or_init(Registry::new)
}

/// Constructs a fresh client from `config`. Never touches the shared slot.
#[must_use]
pub fn create(config: ClientConfig) -> Arc<Client> {
    Arc::new(Client::new(config))
}

/// Returns the shared client, initializing it from `config` when unset.
///
/// # Errors
///
/// Returns [`OpenfortKitError::Uninitialized`] when no client has been
/// configured and no config is supplied.
pub fn get_or_init(config: Option<ClientConfig>) -> Result<Arc<Client>, OpenfortKitError> {
    shared().get_or_init(config)
}

/// Unconditionally replaces the shared client. Last write wins.
pub fn set(client: Arc<Client>) {
    shared().set(client);
}
