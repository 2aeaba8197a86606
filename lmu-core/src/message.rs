//! Stream envelope decoding
//!
//! Every frame is `{"type": <string>, "body": <type-specific JSON>}`. The tag
//! is decoded first and selects how the body is decoded.

use crate::model::{CompetitorSnapshot, SessionInfo};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

pub const STANDINGS: &str = "standings";
pub const SESSION_INFO: &str = "sessionInfo";
pub const STANDINGS_HISTORY: &str = "standingsHistory";

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed envelope: {0}")]
    Envelope(#[source] serde_json::Error),

    #[error("malformed {kind} body: {source}")]
    Body {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    body: Value,
}

/// A decoded stream message
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// One tick for every competitor, in feed order
    Standings(Vec<CompetitorSnapshot>),
    SessionInfo(SessionInfo),
    /// Per-lap history; recognized but not processed
    StandingsHistory,
    /// Any other type, kept for diagnostics
    Unknown { kind: String, body: Value },
}

impl Message {
    pub fn decode(raw: &str) -> Result<Self, DecodeError> {
        let envelope: Envelope = serde_json::from_str(raw).map_err(DecodeError::Envelope)?;
        match envelope.kind.as_str() {
            STANDINGS => serde_json::from_value(envelope.body)
                .map(Message::Standings)
                .map_err(|source| DecodeError::Body {
                    kind: STANDINGS,
                    source,
                }),
            SESSION_INFO => serde_json::from_value(envelope.body)
                .map(Message::SessionInfo)
                .map_err(|source| DecodeError::Body {
                    kind: SESSION_INFO,
                    source,
                }),
            STANDINGS_HISTORY => Ok(Message::StandingsHistory),
            _ => Ok(Message::Unknown {
                kind: envelope.kind,
                body: envelope.body,
            }),
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            Message::Standings(_) => STANDINGS,
            Message::SessionInfo(_) => SESSION_INFO,
            Message::StandingsHistory => STANDINGS_HISTORY,
            Message::Unknown { kind, .. } => kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_standings() {
        let raw = r#"{"type":"standings","body":[
            {"driverName":"Alice","position":1},
            {"driverName":"Bob","position":2}
        ]}"#;
        match Message::decode(raw).unwrap() {
            Message::Standings(list) => {
                assert_eq!(list.len(), 2);
                assert_eq!(list[0].driver_name, "Alice");
                assert_eq!(list[1].driver_name, "Bob");
            }
            other => panic!("Expected standings, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_session_info() {
        let raw = r#"{"type":"sessionInfo","body":{"trackName":"Le Mans","session":"RACE1","trackTemp":28.5}}"#;
        match Message::decode(raw).unwrap() {
            Message::SessionInfo(session) => {
                assert_eq!(session.track_name, "Le Mans");
                assert_eq!(session.session, "RACE1");
                assert_eq!(session.track_temp, 28.5);
            }
            other => panic!("Expected sessionInfo, got {:?}", other),
        }
    }

    #[test]
    fn test_null_field_keeps_whole_standings_frame() {
        let raw = r#"{"type":"standings","body":[
            {"driverName":"Alice","position":1,"fullTeamName":"Toyota Gazoo Racing"},
            {"driverName":"Bob","position":2,"fullTeamName":null,"bestLapTime":null}
        ]}"#;
        match Message::decode(raw).unwrap() {
            Message::Standings(list) => {
                assert_eq!(list.len(), 2);
                assert_eq!(list[0].full_team_name, "Toyota Gazoo Racing");
                assert_eq!(list[1].driver_name, "Bob");
                assert!(list[1].full_team_name.is_empty());
                assert_eq!(list[1].best_lap_time, 0.0);
            }
            other => panic!("Expected standings, got {:?}", other),
        }

        let raw = r#"{"type":"sessionInfo","body":{"trackName":"Spa","session":"RACE1","serverName":null}}"#;
        match Message::decode(raw).unwrap() {
            Message::SessionInfo(session) => {
                assert_eq!(session.track_name, "Spa");
                assert!(session.server_name.is_empty());
            }
            other => panic!("Expected sessionInfo, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_history_is_recognized() {
        let raw = r#"{"type":"standingsHistory","body":{"Alice":[{"lapTime":95.2}]}}"#;
        assert_eq!(Message::decode(raw).unwrap(), Message::StandingsHistory);
    }

    #[test]
    fn test_decode_unknown_type_keeps_body() {
        let raw = r#"{"type":"weatherForecast","body":{"rain":0.3}}"#;
        let message = Message::decode(raw).unwrap();
        assert_eq!(message.kind(), "weatherForecast");
        match message {
            Message::Unknown { body, .. } => assert_eq!(body["rain"], 0.3),
            other => panic!("Expected unknown, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_envelope() {
        assert!(matches!(
            Message::decode("not json"),
            Err(DecodeError::Envelope(_))
        ));
        assert!(matches!(
            Message::decode(r#"{"body":{}}"#),
            Err(DecodeError::Envelope(_))
        ));
    }

    #[test]
    fn test_tag_body_mismatch_is_body_error() {
        let err = Message::decode(r#"{"type":"standings","body":{"trackName":"Spa"}}"#)
            .unwrap_err();
        match err {
            DecodeError::Body { kind, .. } => assert_eq!(kind, STANDINGS),
            other => panic!("Expected body error, got {:?}", other),
        }

        let err = Message::decode(r#"{"type":"sessionInfo","body":[1,2]}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Body { kind: SESSION_INFO, .. }));
    }
}
