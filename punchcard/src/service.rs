//! PackService: transport-agnostic credit-pack lifecycle management.
//!
//! This service owns:
//! - The load-mutate-persist sequence for every mutating operation
//! - Per-principal mutual exclusion (no two mutations for the same principal
//!   may interleave; unrelated principals never contend)
//!
//! Reads take no lock. They still observe consistent snapshots because the
//! store persists a pack as one atomic write, so a load returns the state
//! entirely before or entirely after any mutation.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::pack::CreditPack;
use crate::repository::{PackRepository, RepositoryError};
use crate::store::{Store, StoreError};

/// Uses granted when a new pack is requested without an explicit amount.
pub const DEFAULT_PACK_AMOUNT: u32 = 10;

#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error("no credit pack exists for this user")]
    NotFound,

    #[error("no uses left on this pack")]
    Exhausted,

    #[error("there's an active pack already in use for {0}")]
    AlreadyActive(String),

    #[error("no active pack available; request a new one first")]
    NoActivePack,

    #[error("stored pack record is corrupt: {0}")]
    CorruptRecord(#[source] serde_json::Error),

    #[error("store failure: {0}")]
    Persistence(#[source] StoreError),
}

impl From<RepositoryError> for PackError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::CorruptRecord(e) => PackError::CorruptRecord(e),
            RepositoryError::Store(e) => PackError::Persistence(e),
        }
    }
}

/// What the caller gets back from `new_pack` and `details`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PackReceipt {
    pub remaining: u32,
    pub created_at: String,
}

/// Credit-pack lifecycle manager.
///
/// Every operation takes the resolved principal explicitly; the service has
/// no notion of an ambient "current user".
pub struct PackService {
    repo: PackRepository,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl PackService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            repo: PackRepository::new(store),
            locks: DashMap::new(),
        }
    }

    /// The mutation lock for one principal. Entries are created on first use
    /// and kept for the life of the process.
    fn lock_for(&self, principal: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(principal.to_string())
            .or_default()
            .clone()
    }

    /// Issue a fresh pack for `principal`.
    ///
    /// Creation and renewal are the same transition: both require that no
    /// active pack exists. An exhausted pack is overwritten; its history is
    /// reset. `amount` of zero or `None` falls back to
    /// [`DEFAULT_PACK_AMOUNT`].
    pub async fn new_pack(
        &self,
        principal: &str,
        amount: Option<u32>,
    ) -> Result<PackReceipt, PackError> {
        let lock = self.lock_for(principal);
        let _guard = lock.lock().await;

        if let Some(existing) = self.repo.load(principal)?
            && existing.is_active()
        {
            return Err(PackError::AlreadyActive(principal.to_string()));
        }

        let amount = match amount {
            Some(0) | None => DEFAULT_PACK_AMOUNT,
            Some(n) => n,
        };

        let pack = CreditPack::new(principal, amount);
        self.repo.save(&pack)?;

        tracing::info!(%principal, amount, "issued new pack");

        Ok(PackReceipt {
            remaining: pack.remaining,
            created_at: pack.created_at,
        })
    }

    /// Spend one use of the principal's pack and return the new remaining
    /// count.
    ///
    /// Consumption is all-or-nothing: an exhausted pack fails without a
    /// persistence call. If the write fails after the in-memory decrement,
    /// the error is surfaced rather than reporting success — the durable
    /// record is assumed unmodified and callers should re-query `remaining`
    /// before retrying.
    pub async fn use_pack(&self, principal: &str) -> Result<u32, PackError> {
        let lock = self.lock_for(principal);
        let _guard = lock.lock().await;

        let mut pack = self.repo.load(principal)?.ok_or(PackError::NotFound)?;

        pack.consume().map_err(|_| PackError::Exhausted)?;
        self.repo.save(&pack)?;

        tracing::info!(%principal, remaining = pack.remaining, "pack punched");

        Ok(pack.remaining)
    }

    /// Uses left on the principal's pack. Read-only, lock-free.
    pub fn remaining(&self, principal: &str) -> Result<u32, PackError> {
        let pack = self.repo.load(principal)?.ok_or(PackError::NotFound)?;
        Ok(pack.remaining)
    }

    /// Remaining count and creation time of the current pack.
    ///
    /// Details of an exhausted pack are meaningless to the caller, so this
    /// fails with [`PackError::NoActivePack`] at zero remaining.
    pub fn details(&self, principal: &str) -> Result<PackReceipt, PackError> {
        let pack = self.repo.load(principal)?.ok_or(PackError::NotFound)?;

        if !pack.is_active() {
            return Err(PackError::NoActivePack);
        }

        Ok(PackReceipt {
            remaining: pack.remaining,
            created_at: pack.created_at,
        })
    }

    /// Full consumption timestamp sequence. Valid for exhausted packs too.
    pub fn history(&self, principal: &str) -> Result<Vec<String>, PackError> {
        let pack = self.repo.load(principal)?.ok_or(PackError::NotFound)?;
        Ok(pack.history)
    }
}
