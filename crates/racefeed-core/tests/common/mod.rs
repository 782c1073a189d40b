//! Common test utilities and fixtures.

pub mod fetcher;
pub mod fixtures;

#[allow(unused_imports)]
pub use fetcher::*;
#[allow(unused_imports)]
pub use fixtures::*;
