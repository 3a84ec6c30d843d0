//! Local cache management for cloudstore.
//!
//! Every opened object stages its bytes in a local file. This crate decides
//! where those files live and makes sure each one is removed exactly once.
//!
//! # Design Rules
//!
//! 1. At most one live cache slot exists per `(scope, name)` pair.
//! 2. Cache paths carry a generation number, so releasing a stale slot can
//!    never delete a newer slot's file.
//! 3. Downloads land in a staging file and are renamed into place only when
//!    complete; a half-written file is never visible at a slot path.
//! 4. Release is idempotent on every path (explicit, by path, on drop, and
//!    after shutdown).
//! 5. The cache root is explicit process state: [`CacheManager::init`]
//!    creates it and [`CacheManager::shutdown`] reclaims everything in it.

pub mod config;
pub mod error;
pub mod manager;

pub use config::{CacheConfig, ContentionPolicy};
pub use error::{CacheError, CacheResult};
pub use manager::{CacheManager, CacheSlot};
