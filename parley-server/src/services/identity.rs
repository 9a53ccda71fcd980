//! Identity resolution: asserted usernames map to lazily created users.

use std::sync::Arc;

use shared::models::User;
use tracing::instrument;

use crate::store::{Store, StoreError};

/// Resolves asserted usernames to user records, creating them on first
/// reference. Identity is never verified; this is the whole authentication
/// story by design.
#[derive(Clone)]
pub struct IdentityService {
    store: Arc<dyn Store>,
}

impl std::fmt::Debug for IdentityService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityService").finish()
    }
}

impl IdentityService {
    /// Creates a new identity service over the given store.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Look up `username`, creating the user when absent.
    ///
    /// Safe under concurrent calls racing to create the same username: the
    /// store's uniqueness constraint is the authority, and a duplicate-key
    /// insert failure is retried as a lookup rather than propagated.
    ///
    /// # Errors
    /// Only store unavailability surfaces as an error.
    #[instrument(name = "identity.resolve", skip(self), err)]
    pub async fn resolve(&self, username: &str) -> Result<User, StoreError> {
        let username = username.trim();

        loop {
            if let Some(user) = self.store.find_user(username).await? {
                return Ok(user);
            }

            match self.store.create_user(username).await {
                Ok(user) => return Ok(user),
                // Lost the creation race; the next lookup finds the winner.
                Err(StoreError::DuplicateUsername) => continue,
                Err(err) => return Err(err),
            }
        }
    }
}
