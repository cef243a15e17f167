use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata carried by every command and event on the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    /// Unique message ID.
    pub id: Uuid,
    /// When the producer published the message.
    pub published_at: DateTime<Utc>,
    /// Token the receiver uses to drop duplicate deliveries.
    pub idempotency_key: Uuid,
}

impl MessageHeader {
    /// Creates a header stamped with the current time and fresh IDs.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            published_at: Utc::now(),
            idempotency_key: Uuid::new_v4(),
        }
    }

    /// Creates a header with a fixed publication time.
    pub fn published_at(published_at: DateTime<Utc>) -> Self {
        Self {
            published_at,
            ..Self::new()
        }
    }
}

impl Default for MessageHeader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_headers_are_distinct() {
        let a = MessageHeader::new();
        let b = MessageHeader::new();
        assert_ne!(a.id, b.id);
        assert_ne!(a.idempotency_key, b.idempotency_key);
    }

    #[test]
    fn published_at_keeps_timestamp() {
        let at = Utc::now() - chrono::Duration::minutes(5);
        assert_eq!(MessageHeader::published_at(at).published_at, at);
    }
}
