//! Data models shared across the feed layers.
//!
//! - `EntityType`: the remote feeds and their dispatch table
//! - `RaceRecord`, `ModifiedRecord`: racelist and modification metadata
//! - `Payload`, `FetchOutcome`: what a resolver hands back for one key

pub mod entity;
pub mod payload;
pub mod race;

pub use entity::{CredentialKind, EntityType, LookupFeed, PayloadTransform, StalenessRule, UnknownEntityType};
pub use payload::{FetchOutcome, Payload, Source};
pub use race::{course_code, sharecode_date, ModifiedRecord, RaceRecord};
