//! Shared types for the bundle booking system.

pub mod header;
pub mod types;

pub use header::MessageHeader;
pub use types::BundleId;
