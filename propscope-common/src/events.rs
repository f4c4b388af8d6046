//! Live-update events pushed to dashboard connections
//!
//! Wire shapes (one SSE `data:` frame each):
//! - started: `{"ready":false,"status":"started","super_id":"…"}`
//! - ready:   `{"ready":true,"super_id":"…","status":"complete"}`
//! - timeout: `{"ready":false,"timeout":true}`

use serde::{Serialize, Serializer};

use crate::model::AnalysisStatus;

/// Event delivered to a connection waiting on a property URL
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// The workflow engine picked the job up and assigned an id
    Started { super_id: String },
    /// A terminal record is stored and can be fetched
    Ready {
        super_id: Option<String>,
        status: AnalysisStatus,
    },
    /// No terminal record arrived within the wait ceiling
    Timeout,
}

impl StreamEvent {
    /// Terminal events close the connection after delivery
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::Started { .. })
    }

    /// Event type name for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            StreamEvent::Started { .. } => "started",
            StreamEvent::Ready { .. } => "ready",
            StreamEvent::Timeout => "timeout",
        }
    }
}

#[derive(Serialize)]
struct Frame<'a> {
    ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<AnalysisStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    super_id: Option<Option<&'a str>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    timeout: bool,
}

impl Serialize for StreamEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let frame = match self {
            StreamEvent::Started { super_id } => Frame {
                ready: false,
                status: Some(AnalysisStatus::Started),
                super_id: Some(Some(super_id)),
                timeout: false,
            },
            StreamEvent::Ready { super_id, status } => Frame {
                ready: true,
                status: Some(*status),
                super_id: Some(super_id.as_deref()),
                timeout: false,
            },
            StreamEvent::Timeout => Frame {
                ready: false,
                status: None,
                super_id: None,
                timeout: true,
            },
        };
        frame.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn test_wire_shapes() {
        let started = StreamEvent::Started { super_id: "abc".into() };
        assert_eq!(
            to_value(&started).unwrap(),
            json!({"ready": false, "status": "started", "super_id": "abc"})
        );

        let ready = StreamEvent::Ready {
            super_id: Some("abc".into()),
            status: AnalysisStatus::Complete,
        };
        assert_eq!(
            to_value(&ready).unwrap(),
            json!({"ready": true, "status": "complete", "super_id": "abc"})
        );

        let anonymous = StreamEvent::Ready { super_id: None, status: AnalysisStatus::Error };
        assert_eq!(
            to_value(&anonymous).unwrap(),
            json!({"ready": true, "status": "error", "super_id": null})
        );

        assert_eq!(
            to_value(&StreamEvent::Timeout).unwrap(),
            json!({"ready": false, "timeout": true})
        );
    }

    #[test]
    fn test_terminal_events() {
        assert!(!StreamEvent::Started { super_id: "a".into() }.is_terminal());
        assert!(StreamEvent::Timeout.is_terminal());
        assert!(StreamEvent::Ready { super_id: None, status: AnalysisStatus::Complete }.is_terminal());
    }
}
