//! Packet classification
//!
//! Turns a captured [`PacketRecord`] into an [`Event`] relative to one
//! role address.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use sippcap_capture::PacketRecord;
use tracing::{debug, warn};

use crate::error::{Result, ScenarioError};
use crate::event::{Direction, Event};
use crate::sdp::extract_session_description;

/// Media type that marks a body as a session description
pub const SDP_MEDIA_TYPE: &str = "application/sdp";

/// Address identifying one call participant
///
/// A bare IP matches any port on that host; `ip:port` matches one socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleAddress {
    Host(IpAddr),
    Socket(SocketAddr),
}

impl RoleAddress {
    pub fn matches(&self, addr: &SocketAddr) -> bool {
        match self {
            RoleAddress::Host(ip) => addr.ip() == *ip,
            RoleAddress::Socket(socket) => addr == socket,
        }
    }
}

impl FromStr for RoleAddress {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(socket) = s.parse::<SocketAddr>() {
            return Ok(RoleAddress::Socket(socket));
        }
        s.trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<IpAddr>()
            .map(RoleAddress::Host)
            .map_err(|_| ScenarioError::Config(format!("invalid role address '{}'", s)))
    }
}

impl fmt::Display for RoleAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoleAddress::Host(ip) => write!(f, "{}", ip),
            RoleAddress::Socket(socket) => write!(f, "{}", socket),
        }
    }
}

/// Classify one packet relative to `role`
///
/// Fails with [`ScenarioError::UnroutablePacket`] when the role is neither
/// the sender nor the receiver, and with [`ScenarioError::InvalidEvent`]
/// when the resulting event cannot be compiled. An undecodable session
/// description is logged and leaves the description empty.
pub fn classify(packet: &PacketRecord, role: &RoleAddress) -> Result<Event> {
    let direction = if role.matches(&packet.source) {
        Direction::Outbound
    } else if role.matches(&packet.destination) {
        Direction::Inbound
    } else {
        return Err(ScenarioError::unroutable(role, packet.frame));
    };

    let kind = match packet.method() {
        Some(method) => Some(method.to_string()),
        None => match direction {
            Direction::Outbound => packet.status_line(),
            Direction::Inbound => packet.status_code().map(|code| code.to_string()),
        },
    };

    let session_description = if packet.content_type().as_deref() == Some(SDP_MEDIA_TYPE) {
        match extract_session_description(packet.body()) {
            Ok(sdp) => sdp,
            Err(e) => {
                warn!(frame = packet.frame, error = %e, "session description dropped");
                String::new()
            }
        }
    } else {
        String::new()
    };

    let event = Event {
        direction: Some(direction),
        kind,
        headers: packet.headers().clone(),
        session_description,
        source: Some(packet.source),
        destination: Some(packet.destination),
        timestamp: Some(packet.timestamp),
        frame: Some(packet.frame),
    };
    event.validate()?;

    debug!(role = %role, frame = packet.frame, "{}", event);
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use sippcap_capture::{Headers, SipMessage, StartLine};

    fn record(src: &str, dst: &str, start_line: StartLine, headers: Headers, body: &[u8]) -> PacketRecord {
        PacketRecord::new(
            src.parse().unwrap(),
            dst.parse().unwrap(),
            SipMessage {
                start_line,
                headers,
                body: Bytes::copy_from_slice(body),
            },
        )
    }

    fn ok_response() -> StartLine {
        StartLine::Status {
            version: "SIP/2.0".into(),
            code: 200,
            reason: "OK".into(),
        }
    }

    #[test]
    fn test_role_address_parsing() {
        assert_eq!(
            "10.0.0.1".parse::<RoleAddress>().unwrap(),
            RoleAddress::Host("10.0.0.1".parse().unwrap())
        );
        assert_eq!(
            "10.0.0.1:5080".parse::<RoleAddress>().unwrap(),
            RoleAddress::Socket("10.0.0.1:5080".parse().unwrap())
        );
        assert!("[::1]:5060".parse::<RoleAddress>().is_ok());
        assert!("::1".parse::<RoleAddress>().is_ok());
        assert!("pbx.example.com".parse::<RoleAddress>().is_err());
    }

    #[test]
    fn test_role_address_matching_is_exact() {
        let role: RoleAddress = "10.0.0.1".parse().unwrap();
        assert!(role.matches(&"10.0.0.1:5060".parse().unwrap()));
        assert!(!role.matches(&"10.0.0.11:5060".parse().unwrap()));

        let role: RoleAddress = "10.0.0.1:5060".parse().unwrap();
        assert!(!role.matches(&"10.0.0.1:5062".parse().unwrap()));
    }

    #[test]
    fn test_response_kind_depends_on_direction() {
        let packet = record("10.0.0.2:5060", "10.0.0.1:5060", ok_response(), Headers::new(), b"");

        let uas = classify(&packet, &"10.0.0.2".parse().unwrap()).unwrap();
        assert_eq!(uas.direction, Some(Direction::Outbound));
        assert_eq!(uas.kind.as_deref(), Some("SIP/2.0 200 OK"));

        let uac = classify(&packet, &"10.0.0.1".parse().unwrap()).unwrap();
        assert_eq!(uac.direction, Some(Direction::Inbound));
        assert_eq!(uac.kind.as_deref(), Some("200"));
    }

    #[test]
    fn test_unroutable() {
        let packet = record("10.0.0.2:5060", "10.0.0.1:5060", ok_response(), Headers::new(), b"");
        let err = classify(&packet, &"10.0.0.3".parse().unwrap()).unwrap_err();
        assert!(matches!(err, ScenarioError::UnroutablePacket { .. }));
    }

    #[test]
    fn test_sdp_only_for_sdp_content_type() {
        let body = b"v=0\r\nc=IN IP4 10.0.0.1\r\nm=audio 4000 RTP/AVP 0\r\n";
        let sdp_headers = Headers::new().with("Content-Type", "Application/SDP; charset=x");
        let packet = record("10.0.0.2:5060", "10.0.0.1:5060", ok_response(), sdp_headers, body);
        let event = classify(&packet, &"10.0.0.1".parse().unwrap()).unwrap();
        assert_eq!(event.session_description, "v=0\nc=IN IP4 [local_ip]\nm=audio [media_port] RTP/AVP 0");

        let text_headers = Headers::new().with("Content-Type", "text/plain");
        let packet = record("10.0.0.2:5060", "10.0.0.1:5060", ok_response(), text_headers, body);
        let event = classify(&packet, &"10.0.0.1".parse().unwrap()).unwrap();
        assert!(event.session_description.is_empty());
    }

    #[test]
    fn test_malformed_sdp_keeps_event() {
        let headers = Headers::new().with("Content-Type", "application/sdp");
        let packet = record("10.0.0.2:5060", "10.0.0.1:5060", ok_response(), headers, &[0xff, 0xfe]);
        let event = classify(&packet, &"10.0.0.1".parse().unwrap()).unwrap();
        assert!(event.session_description.is_empty());
        assert!(event.validate().is_ok());
    }
}
