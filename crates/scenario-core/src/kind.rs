//! # Message kinds
//!
//! An event's kind is kept as observed text: a method name for requests,
//! and for responses either the full status line (when the role sent it) or
//! the bare status code (when the role received it). This module parses that
//! text into a closed set of request methods or a response status.
//!
//! Matching is always by exact membership. `"180"` is a status code, never
//! a partial match for `"18"`, and `"INVITE"` does not match `"REINVITE"`.
//!
//! ```rust
//! use sippcap_scenario::kind::{MessageKind, RequestMethod};
//!
//! let kind = MessageKind::parse("INVITE").unwrap();
//! assert_eq!(kind, MessageKind::Request(RequestMethod::Invite));
//!
//! let kind = MessageKind::parse("SIP/2.0 183 Session Progress").unwrap();
//! assert_eq!(kind.status_code(), Some(183));
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, ScenarioError};

/// Status codes whose responses carry the dialog route set
pub const ROUTE_BEARING: [u16; 3] = [180, 183, 200];

/// SIP request methods with a scenario template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestMethod {
    /// Establishes a session
    Invite,
    /// Confirms a final response to INVITE
    Ack,
    /// Ends a session
    Bye,
    /// Cancels a pending INVITE
    Cancel,
    /// Registers a contact binding
    Register,
    /// Queries capabilities
    Options,
    /// Acknowledges a reliable provisional response
    Prack,
    /// Subscribes to an event package
    Subscribe,
    /// Delivers an event notification
    Notify,
    /// Publishes event state
    Publish,
    /// Carries mid-session information
    Info,
    /// Asks the recipient to contact a third party
    Refer,
    /// Instant message
    Message,
    /// Modifies session state before the dialog is confirmed
    Update,
}

impl RequestMethod {
    /// Every supported method
    pub const ALL: [RequestMethod; 14] = [
        RequestMethod::Invite,
        RequestMethod::Ack,
        RequestMethod::Bye,
        RequestMethod::Cancel,
        RequestMethod::Register,
        RequestMethod::Options,
        RequestMethod::Prack,
        RequestMethod::Subscribe,
        RequestMethod::Notify,
        RequestMethod::Publish,
        RequestMethod::Info,
        RequestMethod::Refer,
        RequestMethod::Message,
        RequestMethod::Update,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestMethod::Invite => "INVITE",
            RequestMethod::Ack => "ACK",
            RequestMethod::Bye => "BYE",
            RequestMethod::Cancel => "CANCEL",
            RequestMethod::Register => "REGISTER",
            RequestMethod::Options => "OPTIONS",
            RequestMethod::Prack => "PRACK",
            RequestMethod::Subscribe => "SUBSCRIBE",
            RequestMethod::Notify => "NOTIFY",
            RequestMethod::Publish => "PUBLISH",
            RequestMethod::Info => "INFO",
            RequestMethod::Refer => "REFER",
            RequestMethod::Message => "MESSAGE",
            RequestMethod::Update => "UPDATE",
        }
    }

    /// Returns true for the method that opens an INVITE dialog
    pub fn is_dialog_initiating(&self) -> bool {
        matches!(self, RequestMethod::Invite)
    }
}

impl fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestMethod {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self> {
        RequestMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ScenarioError::UnsupportedMessageKind(s.to_string()))
    }
}

/// A response status as observed by one role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseStatus {
    pub code: u16,
    /// Status line text as observed, or just the code
    pub text: String,
}

impl ResponseStatus {
    /// Parse `SIP/2.0 200 OK`, `200 OK` or `200`
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        let rest = match trimmed.get(..4) {
            Some(prefix) if prefix.eq_ignore_ascii_case("SIP/") => trimmed
                .split_once(' ')
                .map(|(_, rest)| rest.trim_start())
                .unwrap_or_default(),
            _ => trimmed,
        };

        let digits = rest.split(' ').next().unwrap_or_default();
        let code = match digits.parse::<u16>() {
            Ok(code) if digits.len() == 3 && (100..=699).contains(&code) => code,
            _ => return Err(ScenarioError::UnsupportedMessageKind(text.to_string())),
        };

        Ok(Self {
            code,
            text: trimmed.to_string(),
        })
    }

    /// 1xx
    pub fn is_provisional(&self) -> bool {
        (100..200).contains(&self.code)
    }

    pub fn is_final(&self) -> bool {
        !self.is_provisional()
    }

    /// 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// Returns true if the code is one of the route-bearing codes
    pub fn is_route_bearing_code(&self) -> bool {
        ROUTE_BEARING.contains(&self.code)
    }

    /// Returns true if the observed text is a full status line
    pub fn is_status_line(&self) -> bool {
        self.text
            .get(..4)
            .map_or(false, |prefix| prefix.eq_ignore_ascii_case("SIP/"))
    }

    /// The status line to put on the wire
    ///
    /// Observed status lines are kept verbatim; a bare code gets the
    /// standard reason phrase.
    pub fn status_line(&self) -> String {
        if self.is_status_line() {
            self.text.clone()
        } else {
            format!("SIP/2.0 {} {}", self.code, reason_phrase(self.code))
        }
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Standard reason phrase for a status code
pub fn reason_phrase(code: u16) -> &'static str {
    match code {
        100 => "Trying",
        180 => "Ringing",
        181 => "Call Is Being Forwarded",
        182 => "Queued",
        183 => "Session Progress",
        199 => "Early Dialog Terminated",
        200 => "OK",
        202 => "Accepted",
        204 => "No Notification",
        300 => "Multiple Choices",
        301 => "Moved Permanently",
        302 => "Moved Temporarily",
        305 => "Use Proxy",
        380 => "Alternative Service",
        400 => "Bad Request",
        401 => "Unauthorized",
        402 => "Payment Required",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        407 => "Proxy Authentication Required",
        408 => "Request Timeout",
        410 => "Gone",
        415 => "Unsupported Media Type",
        420 => "Bad Extension",
        421 => "Extension Required",
        422 => "Session Interval Too Small",
        423 => "Interval Too Brief",
        480 => "Temporarily Unavailable",
        481 => "Call/Transaction Does Not Exist",
        482 => "Loop Detected",
        483 => "Too Many Hops",
        484 => "Address Incomplete",
        486 => "Busy Here",
        487 => "Request Terminated",
        488 => "Not Acceptable Here",
        489 => "Bad Event",
        491 => "Request Pending",
        500 => "Server Internal Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Server Time-out",
        505 => "Version Not Supported",
        513 => "Message Too Large",
        600 => "Busy Everywhere",
        603 => "Decline",
        604 => "Does Not Exist Anywhere",
        606 => "Not Acceptable",
        c if c < 200 => "Session Progress",
        c if c < 300 => "OK",
        c if c < 400 => "Redirection",
        c if c < 500 => "Client Error",
        c if c < 600 => "Server Error",
        _ => "Global Failure",
    }
}

/// A parsed event kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Request(RequestMethod),
    Response(ResponseStatus),
}

impl MessageKind {
    /// Parse observed kind text
    ///
    /// Fails with [`ScenarioError::UnsupportedMessageKind`] when the text is
    /// neither a supported method nor a status.
    pub fn parse(text: &str) -> Result<Self> {
        if let Ok(method) = text.trim().parse::<RequestMethod>() {
            return Ok(MessageKind::Request(method));
        }
        ResponseStatus::parse(text).map(MessageKind::Response)
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            MessageKind::Response(status) => Some(status.code),
            MessageKind::Request(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_round_trip() {
        for method in RequestMethod::ALL {
            assert_eq!(method.as_str().parse::<RequestMethod>().unwrap(), method);
        }
        assert!("invite".parse::<RequestMethod>().is_err());
        assert!("REINVITE".parse::<RequestMethod>().is_err());
    }

    #[test]
    fn test_status_forms() {
        let s = ResponseStatus::parse("SIP/2.0 183 Session Progress").unwrap();
        assert_eq!(s.code, 183);
        assert!(s.is_provisional());
        assert!(s.is_route_bearing_code());
        assert_eq!(s.status_line(), "SIP/2.0 183 Session Progress");

        let s = ResponseStatus::parse("486").unwrap();
        assert!(s.is_final());
        assert!(!s.is_route_bearing_code());
        assert_eq!(s.status_line(), "SIP/2.0 486 Busy Here");

        let s = ResponseStatus::parse("200 OK").unwrap();
        assert!(s.is_success());
    }

    #[test]
    fn test_exact_membership() {
        // "18" is not a status and "1800" is not 180
        assert!(ResponseStatus::parse("18").is_err());
        assert!(ResponseStatus::parse("1800").is_err());
        assert!(ResponseStatus::parse("099").is_err());
        assert!(!ResponseStatus::parse("181").unwrap().is_route_bearing_code());
    }

    #[test]
    fn test_message_kind() {
        assert_eq!(
            MessageKind::parse("BYE").unwrap(),
            MessageKind::Request(RequestMethod::Bye)
        );
        assert_eq!(MessageKind::parse("200").unwrap().status_code(), Some(200));
        assert!(matches!(
            MessageKind::parse("HELLO"),
            Err(ScenarioError::UnsupportedMessageKind(_))
        ));
    }
}
