//! Pack repository: translates a principal's credit-pack to and from durable
//! bytes through the [`Store`] capability.
//!
//! Concurrency is the caller's job: `save` must only be called while holding
//! the per-principal lock (see [`crate::service`]).

use std::sync::Arc;

use crate::pack::CreditPack;
use crate::store::{Store, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// A record exists but does not decode. Non-recoverable without manual
    /// intervention; never silently treated as "no pack".
    #[error("stored pack record is corrupt: {0}")]
    CorruptRecord(#[source] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct PackRepository {
    store: Arc<dyn Store>,
}

fn pack_key(principal: &str) -> String {
    format!("/pack/{principal}")
}

impl PackRepository {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Load the principal's pack. `Ok(None)` means "never created", which is
    /// distinct from an exhausted pack (`remaining == 0`).
    pub fn load(&self, principal: &str) -> Result<Option<CreditPack>, RepositoryError> {
        let Some(bytes) = self.store.get(&pack_key(principal))? else {
            return Ok(None);
        };

        let pack = serde_json::from_slice(&bytes).map_err(RepositoryError::CorruptRecord)?;
        Ok(Some(pack))
    }

    /// Persist the pack under its owner's key, overwriting any prior record.
    pub fn save(&self, pack: &CreditPack) -> Result<(), RepositoryError> {
        tracing::debug!(owner = %pack.owner, remaining = pack.remaining, "saving pack");

        let bytes = serde_json::to_vec(pack).map_err(RepositoryError::CorruptRecord)?;
        self.store.set(&pack_key(&pack.owner), &bytes)?;
        Ok(())
    }
}
