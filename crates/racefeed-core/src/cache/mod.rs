//! Local caching module for offline data access.
//!
//! This module provides the `EntityStore` for storing and retrieving feed
//! payloads on disk, and the staleness policy that decides whether a cached
//! copy can be used.
//!
//! Cache layout: one directory per entity type, one file per key.

pub mod policy;
pub mod store;

pub use policy::{is_trustworthy, window_closes, PUBLICATION_WINDOW_DAYS};
pub use store::{EntityStore, StoreStats};
