//! Bearer token handling.
//!
//! The token is opaque: it is read from the persistent store, attached to
//! mutating requests and cleared when the server rejects it.

use std::sync::Arc;

use tracing::{info, warn};

use crate::infra::error::StorageError;
use crate::infra::storage::KeyValueStore;

const TOKEN_KEY: &str = "token";

#[derive(Clone)]
pub struct Credentials {
    store: Arc<dyn KeyValueStore>,
}

impl Credentials {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// The held token; blank values count as absent.
    pub fn token(&self) -> Option<String> {
        self.store
            .get(TOKEN_KEY)
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
    }

    pub fn is_signed_in(&self) -> bool {
        self.token().is_some()
    }

    pub fn set_token(&self, token: &str) -> Result<(), StorageError> {
        let token = token.trim();
        if token.is_empty() {
            return self.store.remove(TOKEN_KEY);
        }
        self.store.set(TOKEN_KEY, token)?;
        info!("Bearer token stored");
        Ok(())
    }

    /// Forget the token. Storage failures are logged, not raised.
    pub fn clear(&self) {
        match self.store.remove(TOKEN_KEY) {
            Ok(()) => info!("Bearer token cleared"),
            Err(err) => warn!(error = %err, "Failed to clear bearer token"),
        }
    }
}
