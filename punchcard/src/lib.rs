//! punchcard: credit-pack service for bounded, per-user passes.

mod config;
mod pack;

pub mod auth;
pub mod repository;
pub mod service;
pub mod store;
pub mod transport;

pub use config::{Config, ConfigError};
pub use pack::{CreditPack, Exhausted};
pub use repository::{PackRepository, RepositoryError};
pub use service::{PackError, PackReceipt, PackService, DEFAULT_PACK_AMOUNT};
pub use store::{MemoryStore, Store, StoreError};
