//! Storage for bundle records.
//!
//! The [`BundleStore`] trait is the only way to mutate a bundle: every
//! update is an atomic read-modify-write keyed by bundle ID or booking ID.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryBundleStore;
pub use postgres::PostgresBundleStore;
pub use store::{BundleStore, UpdateOutcome, apply_mutation};
