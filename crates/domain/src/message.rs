//! Common trait for messages that travel on the bus.

use serde::{Serialize, de::DeserializeOwned};

/// A command or event exchanged with other services.
///
/// The type name is used for routing, logging, and metric labels.
pub trait Message: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the message type name.
    fn message_type(&self) -> &'static str;
}
