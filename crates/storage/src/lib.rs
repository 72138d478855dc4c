//! Local durable store for patrol-rust
//!
//! This crate keeps the offline visit queue, the cached user profile and
//! the bearer token on the device, surviving process restarts.

mod error;
mod kv;
mod models;
mod offline;

pub use error::{Result, StorageError};
pub use kv::{FileStore, KeyValueStore, MemoryStore};
pub use models::{CachedUser, QueuedVisit, Role, VisitRecord, VisitType};
pub use offline::{OfflineStore, OFFLINE_VISITS_KEY, TOKEN_KEY, USER_KEY};
