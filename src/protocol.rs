//! Wire format of the overlay event stream.
//!
//! Every frame is a JSON envelope `{ type, payload, version?, replay?, time? }`.
//! Only `alert`, `raid` and `store` are acted on; all other types are kept
//! as [`Message::Unknown`] so newer servers never break older clients.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::Snapshot;

pub const TYPE_ALERT: &str = "alert";
pub const TYPE_RAID: &str = "raid";
pub const TYPE_STORE: &str = "store";
pub const TYPE_REPLAY: &str = "replay";

/// Outer wrapper of every stream message.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub version: Option<VersionToken>,
    /// Set by the server when re-sending a stored event.
    #[serde(default)]
    pub replay: bool,
    /// Original event time, present on replayed events.
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
}

impl Envelope {
    pub fn parse(frame: &str) -> serde_json::Result<Self> {
        serde_json::from_str(frame)
    }

    /// Normalised version token; empty strings count as absent.
    pub fn version(&self) -> Option<String> {
        self.version
            .as_ref()
            .map(VersionToken::to_string)
            .filter(|v| !v.is_empty())
    }

    /// Decode the payload according to the declared type.
    pub fn message(&self) -> serde_json::Result<Message> {
        Ok(match self.kind.as_str() {
            TYPE_ALERT => Message::Alert(AlertPayload::deserialize(&self.payload)?),
            TYPE_RAID => Message::Raid(RaidPayload::deserialize(&self.payload)?),
            TYPE_STORE => Message::Store(Snapshot::new(self.payload.clone())),
            _ => Message::Unknown(self.kind.clone()),
        })
    }
}

/// Opaque protocol version; the server hashes its build, but numbers are tolerated.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum VersionToken {
    Text(String),
    Number(serde_json::Number),
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => write!(f, "{text}"),
            Self::Number(number) => write!(f, "{number}"),
        }
    }
}

/// Decoded message body.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Alert(AlertPayload),
    Raid(RaidPayload),
    Store(Snapshot),
    /// Any other type, carrying the declared type name.
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AlertPayload {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub variant: Option<String>,
    #[serde(default)]
    pub sound: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RaidPayload {
    #[serde(default)]
    pub from: String,
    /// Chat tags deliver the count as a string, other sources as a number.
    #[serde(rename = "viewerCount", default)]
    pub viewer_count: Option<ViewerCount>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ViewerCount {
    Number(serde_json::Number),
    Text(String),
}

impl fmt::Display for ViewerCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(number) => write!(f, "{number}"),
            Self::Text(text) => write!(f, "{text}"),
        }
    }
}

/// Requests the client may send upstream.
#[derive(Debug, Clone, Serialize)]
pub struct ClientRequest {
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl ClientRequest {
    pub fn replay() -> Self {
        Self { kind: TYPE_REPLAY }
    }

    pub fn to_frame(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_alert_envelope() {
        let env = Envelope::parse(
            r#"{"type":"alert","payload":{"title":"T","text":"X","sound":"/s.webm"},"version":"abc"}"#,
        )
        .unwrap();
        assert_eq!(env.version().as_deref(), Some("abc"));
        assert!(!env.replay);

        match env.message().unwrap() {
            Message::Alert(alert) => {
                assert_eq!(alert.title, "T");
                assert_eq!(alert.text, "X");
                assert_eq!(alert.variant, None);
                assert_eq!(alert.sound.as_deref(), Some("/s.webm"));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_raid_viewer_count_accepts_string_or_number() {
        let from_chat: RaidPayload =
            serde_json::from_value(json!({"from": "carol", "viewerCount": "42"})).unwrap();
        let from_api: RaidPayload =
            serde_json::from_value(json!({"from": "carol", "viewerCount": 42})).unwrap();

        assert_eq!(from_chat.viewer_count.unwrap().to_string(), "42");
        assert_eq!(from_api.viewer_count.unwrap().to_string(), "42");
    }

    #[test]
    fn test_numeric_and_empty_versions() {
        let numeric = Envelope::parse(r#"{"type":"x","version":7}"#).unwrap();
        assert_eq!(numeric.version().as_deref(), Some("7"));

        let empty = Envelope::parse(r#"{"type":"x","version":""}"#).unwrap();
        assert_eq!(empty.version(), None);

        let missing = Envelope::parse(r#"{"type":"x"}"#).unwrap();
        assert_eq!(missing.version(), None);
    }

    #[test]
    fn test_unknown_and_missing_types() {
        let env = Envelope::parse(r#"{"type":"bits","payload":{"amount":100}}"#).unwrap();
        assert_eq!(env.message().unwrap(), Message::Unknown("bits".to_string()));

        let env = Envelope::parse(r#"{"payload":{}}"#).unwrap();
        assert_eq!(env.message().unwrap(), Message::Unknown(String::new()));
    }

    #[test]
    fn test_replayed_event_carries_time() {
        let env = Envelope::parse(
            r#"{"type":"raid","payload":{"from":"dave","viewerCount":3},"replay":true,"time":"2024-03-01T18:30:00Z"}"#,
        )
        .unwrap();
        assert!(env.replay);
        assert_eq!(
            env.time.unwrap().to_rfc3339(),
            "2024-03-01T18:30:00+00:00"
        );
    }

    #[test]
    fn test_malformed_alert_payload_is_an_error() {
        let env = Envelope::parse(r#"{"type":"alert","payload":"oops"}"#).unwrap();
        assert!(env.message().is_err());
    }

    #[test]
    fn test_replay_request_frame() {
        assert_eq!(ClientRequest::replay().to_frame().unwrap(), r#"{"type":"replay"}"#);
    }
}
