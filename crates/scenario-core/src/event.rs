//! Role-relative view of one observed SIP message

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use sippcap_capture::Headers;

use crate::error::{Result, ScenarioError};
use crate::kind::MessageKind;

/// Which way a message travelled relative to the role being compiled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// The role sent the message
    Outbound,
    /// The role received the message
    Inbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Outbound => write!(f, "SEND"),
            Direction::Inbound => write!(f, "RECV"),
        }
    }
}

/// One observed SIP message from the point of view of one role
///
/// `direction` and `kind` are optional only so that an unclassifiable
/// message can be represented and rejected by [`Event::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Event {
    pub direction: Option<Direction>,
    /// Method name, outbound status line or inbound status code, as observed
    pub kind: Option<String>,
    pub headers: Headers,
    /// Normalized SDP, empty when the message carried none
    pub session_description: String,
    pub source: Option<SocketAddr>,
    pub destination: Option<SocketAddr>,
    pub timestamp: Option<Duration>,
    pub frame: Option<u64>,
}

impl Event {
    /// Create an event with the two mandatory fields set
    pub fn new(direction: Direction, kind: impl Into<String>) -> Self {
        Self {
            direction: Some(direction),
            kind: Some(kind.into()),
            ..Default::default()
        }
    }

    pub fn outbound(kind: impl Into<String>) -> Self {
        Self::new(Direction::Outbound, kind)
    }

    pub fn inbound(kind: impl Into<String>) -> Self {
        Self::new(Direction::Inbound, kind)
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push(name, value);
        self
    }

    pub fn with_session_description(mut self, sdp: impl Into<String>) -> Self {
        self.session_description = sdp.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: Duration) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Reject events that cannot be compiled
    pub fn validate(&self) -> Result<()> {
        if self.direction.is_none() {
            return Err(ScenarioError::invalid_event(format!(
                "no direction for {}",
                self.describe()
            )));
        }
        match &self.kind {
            Some(kind) if !kind.trim().is_empty() => Ok(()),
            _ => Err(ScenarioError::invalid_event(format!("no kind for {}", self.describe()))),
        }
    }

    /// Parsed kind; the event must already be valid
    pub fn message_kind(&self) -> Result<MessageKind> {
        let kind = self
            .kind
            .as_deref()
            .ok_or_else(|| ScenarioError::invalid_event("missing kind"))?;
        MessageKind::parse(kind)
    }

    pub fn is_outbound(&self) -> bool {
        self.direction == Some(Direction::Outbound)
    }

    pub fn is_inbound(&self) -> bool {
        self.direction == Some(Direction::Inbound)
    }

    fn describe(&self) -> String {
        match self.frame {
            Some(frame) => format!("message in frame {}", frame),
            None => "message".to_string(),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = self.direction.map(|d| d.to_string()).unwrap_or_else(|| "?".into());
        let kind = self.kind.as_deref().unwrap_or("?");
        let sdp = if self.session_description.is_empty() { "" } else { "(SDP)" };
        write!(f, "{}{} {}", kind, sdp, direction)?;
        if let (Some(src), Some(dst)) = (self.source, self.destination) {
            write!(f, " from: {} to: {}", src, dst)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(Event::outbound("INVITE").validate().is_ok());

        let mut event = Event::inbound("200");
        event.direction = None;
        assert!(matches!(event.validate(), Err(ScenarioError::InvalidEvent { .. })));

        let mut event = Event::inbound("200");
        event.kind = None;
        assert!(matches!(event.validate(), Err(ScenarioError::InvalidEvent { .. })));

        assert!(Event::inbound("  ").validate().is_err());
    }

    #[test]
    fn test_display() {
        let event = Event::outbound("INVITE").with_session_description("v=0");
        assert_eq!(event.to_string(), "INVITE(SDP) SEND");
    }
}
