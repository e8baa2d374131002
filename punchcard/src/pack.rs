//! Credit-pack entity: a bounded counter of uses owned by one principal.

use serde::{Deserialize, Serialize};

/// One credit-pack per principal.
///
/// `remaining` and `history` move together: every successful [`consume`]
/// decrements one and appends to the other, never one without the other.
///
/// [`consume`]: CreditPack::consume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditPack {
    /// Principal that owns this pack. Immutable after creation.
    pub owner: String,
    /// Uses left. Never goes below zero; zero means exhausted.
    pub remaining: u32,
    /// When the pack was created or last renewed (RFC 3339).
    pub created_at: String,
    /// One timestamp per successful consumption, in consumption order.
    #[serde(default)]
    pub history: Vec<String>,
}

/// Consuming an exhausted pack.
#[derive(Debug, thiserror::Error)]
#[error("no uses left on this pack")]
pub struct Exhausted;

impl CreditPack {
    /// Create a fresh pack with `amount` uses and an empty history.
    pub fn new(owner: impl Into<String>, amount: u32) -> Self {
        Self {
            owner: owner.into(),
            remaining: amount,
            created_at: chrono::Utc::now().to_rfc3339(),
            history: Vec::new(),
        }
    }

    /// Spend one use: decrement `remaining` and stamp `history`.
    ///
    /// Fails without touching either field when the pack is exhausted.
    pub fn consume(&mut self) -> Result<(), Exhausted> {
        if self.remaining == 0 {
            return Err(Exhausted);
        }

        self.remaining -= 1;
        self.history.push(chrono::Utc::now().to_rfc3339());
        Ok(())
    }

    /// Whether the pack still has uses left.
    pub fn is_active(&self) -> bool {
        self.remaining > 0
    }
}
