//! Messages accepted on the worker's input.

use async_trait::async_trait;
use bundle_store::BundleStore;
use common::BundleId;
use domain::{InboundEvent, NewBundle};
use saga::{BundleProcessManager, CommandSender, EventPublisher, InboundHandler};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `type` tag of a bundle creation line.
pub const INITIALIZE_BUNDLE: &str = "InitializeBundle";

/// Request to create a bundle.
///
/// The caller picks the bundle ID, so sending the same line again after a
/// failure finds the stored bundle instead of creating a second one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializeBundle {
    pub bundle_id: BundleId,

    #[serde(flatten)]
    pub bundle: NewBundle,
}

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intake {
    /// Creates a bundle before any of its events arrive.
    Initialize(InitializeBundle),

    /// An event for the process manager.
    Event(InboundEvent),
}

impl Intake {
    /// Encodes the message as one input line, without the newline.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        match self {
            Intake::Initialize(request) => {
                let mut envelope = serde_json::Map::new();
                envelope.insert("type".to_string(), Value::from(INITIALIZE_BUNDLE));
                envelope.insert("data".to_string(), serde_json::to_value(request)?);
                serde_json::to_string(&envelope)
            }
            Intake::Event(event) => serde_json::to_string(event),
        }
    }
}

/// Parses one input line. Blank lines yield `None`.
///
/// Lines use the same `{"type": ..., "data": ...}` envelope as inbound
/// events; `InitializeBundle` is the only type that is not an event.
pub fn parse_line(line: &str) -> Result<Option<Intake>, serde_json::Error> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let mut value: Value = serde_json::from_str(line)?;
    if value.get("type").and_then(Value::as_str) == Some(INITIALIZE_BUNDLE) {
        let data = value.get_mut("data").map(Value::take).unwrap_or(Value::Null);
        return serde_json::from_value(data).map(|r| Some(Intake::Initialize(r)));
    }
    serde_json::from_value(value).map(|e| Some(Intake::Event(e)))
}

/// A handler that can also create bundles.
#[async_trait]
pub trait BundleIntake: InboundHandler {
    /// Stores the bundle and announces it.
    async fn initialize(&self, request: InitializeBundle) -> saga::Result<BundleId>;
}

#[async_trait]
impl<S, C, P> BundleIntake for BundleProcessManager<S, C, P>
where
    S: BundleStore,
    C: CommandSender,
    P: EventPublisher,
{
    async fn initialize(&self, request: InitializeBundle) -> saga::Result<BundleId> {
        self.initialize_bundle_with_id(request.bundle_id, request.bundle)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::MessageHeader;
    use domain::BundleInitialized;
    use uuid::Uuid;

    fn request() -> InitializeBundle {
        InitializeBundle {
            bundle_id: BundleId::new(),
            bundle: NewBundle::for_passengers(
                "ann@example.com",
                vec!["Ann".to_string()],
                Uuid::new_v4(),
                Uuid::new_v4(),
                Uuid::new_v4(),
            ),
        }
    }

    #[test]
    fn test_parse_initialize_line() {
        let request = request();
        let line = format!(
            r#"{{"type":"InitializeBundle","data":{{"bundle_id":"{}","customer_email":"ann@example.com","number_of_seats":1,"passenger_names":["Ann"],"show_id":"{}","outbound_flight_id":"{}","return_flight_id":"{}"}}}}"#,
            request.bundle_id,
            request.bundle.show_id,
            request.bundle.outbound_flight_id,
            request.bundle.return_flight_id,
        );

        assert_eq!(parse_line(&line).unwrap(), Some(Intake::Initialize(request)));
    }

    #[test]
    fn test_to_line_is_parsed_back() {
        let initialize = Intake::Initialize(request());
        let event = Intake::Event(InboundEvent::BundleInitialized(BundleInitialized {
            header: MessageHeader::new(),
            bundle_id: BundleId::new(),
        }));

        for intake in [initialize, event] {
            let line = intake.to_line().unwrap();
            assert_eq!(parse_line(&line).unwrap(), Some(intake));
        }
    }

    #[test]
    fn test_initialize_without_bundle_id_is_rejected() {
        let line = r#"{"type":"InitializeBundle","data":{"customer_email":"ann@example.com"}}"#;
        assert!(parse_line(line).is_err());
    }

    #[test]
    fn test_blank_and_unknown_lines() {
        assert!(parse_line("   ").unwrap().is_none());
        assert!(parse_line(r#"{"type":"Nope"}"#).is_err());
        assert!(parse_line("not json").is_err());
    }
}
