//! Push event types for the parking client
//!
//! The backend delivers two event kinds over the push channel, in transport
//! order per connection. There is no replay: an event emitted while this
//! client is disconnected is permanently lost to it.

use serde::{Deserialize, Serialize};

use crate::models::{Session, Vehicle};
use crate::{Error, Result};

/// Wire name of the plate-recognition result event
pub const RECOGNITION_EVENT: &str = "resultado-placa";

/// Wire name of the session-created event
pub const SESSION_CREATED_EVENT: &str = "resultado-novo-estacionamento";

/// Recognition failure payload: the external recognizer saw a plate it
/// could not match to a registered vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlateError {
    pub message: String,
    #[serde(rename = "placa")]
    pub plate: String,
}

/// Payload of a `resultado-placa` event: either an error object or a
/// single-element list containing the recognized vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecognitionPayload {
    Failure { error: PlateError },
    Matches(Vec<Vehicle>),
}

/// An event delivered over the push subscription
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    /// Automatic license-plate recognition result
    RecognitionResult(RecognitionPayload),
    /// A newly created parking session, to be prepended to the Sessions
    /// collection
    SessionCreated(Session),
}

impl PushEvent {
    /// Decode a named push event from its JSON data
    ///
    /// Returns `Ok(None)` for event names this client does not consume
    /// (heartbeats and future event kinds pass through unhandled).
    pub fn decode(event: &str, data: &str) -> Result<Option<PushEvent>> {
        match event {
            RECOGNITION_EVENT => {
                let payload: RecognitionPayload = serde_json::from_str(data)
                    .map_err(|e| Error::Decode(format!("{RECOGNITION_EVENT}: {e}")))?;
                Ok(Some(PushEvent::RecognitionResult(payload)))
            }
            SESSION_CREATED_EVENT => {
                let session: Session = serde_json::from_str(data)
                    .map_err(|e| Error::Decode(format!("{SESSION_CREATED_EVENT}: {e}")))?;
                Ok(Some(PushEvent::SessionCreated(session)))
            }
            _ => Ok(None),
        }
    }

    /// Wire name of this event kind
    pub fn event_name(&self) -> &'static str {
        match self {
            PushEvent::RecognitionResult(_) => RECOGNITION_EVENT,
            PushEvent::SessionCreated(_) => SESSION_CREATED_EVENT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_recognition_match() {
        let data = r#"[{"id":"5","placa":"ABC1234","modelo":"Gol","cor":"Prata"}]"#;
        let event = PushEvent::decode(RECOGNITION_EVENT, data)
            .unwrap()
            .unwrap();

        match event {
            PushEvent::RecognitionResult(RecognitionPayload::Matches(vehicles)) => {
                assert_eq!(vehicles.len(), 1);
                assert_eq!(vehicles[0].plate, "ABC1234");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_decode_recognition_failure() {
        let data = r#"{"error":{"message":"não encontrado","placa":"ZZZ9999"}}"#;
        let event = PushEvent::decode(RECOGNITION_EVENT, data)
            .unwrap()
            .unwrap();

        match event {
            PushEvent::RecognitionResult(RecognitionPayload::Failure { error }) => {
                assert_eq!(error.plate, "ZZZ9999");
                assert_eq!(error.message, "não encontrado");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_decode_session_created() {
        let data = r#"{
            "id": "80",
            "data_entrada": "2025-05-01T09:00:00Z",
            "data_saida": null,
            "veiculoId": "5",
            "vagaId": "10"
        }"#;
        let event = PushEvent::decode(SESSION_CREATED_EVENT, data)
            .unwrap()
            .unwrap();

        match event {
            PushEvent::SessionCreated(session) => {
                assert_eq!(session.id, "80");
                assert!(session.is_open());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_event_passes_through() {
        assert_eq!(PushEvent::decode("connected", "{}").unwrap(), None);
    }

    #[test]
    fn test_malformed_payload_is_decode_error() {
        let err = PushEvent::decode(SESSION_CREATED_EVENT, "not json").unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }
}
