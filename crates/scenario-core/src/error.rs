//! Error types for scenario generation
//!
//! Two of these are recoverable and are absorbed per packet: a packet that
//! belongs to neither role, and a session description that cannot be
//! decoded. Everything else aborts the run.

use std::io;

use thiserror::Error;

/// A type alias for handling `Result`s with `ScenarioError`
pub type Result<T> = std::result::Result<T, ScenarioError>;

/// Errors raised while turning captured packets into scenarios
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// The packet matches the role address on neither side
    #[error("Packet in frame {frame} does not involve {address}")]
    UnroutablePacket { address: String, frame: u64 },

    /// A session description body could not be decoded as text
    #[error("Malformed session description: {0}")]
    MalformedSessionDescription(String),

    /// An event is missing its direction or kind
    #[error("Invalid event: {reason}")]
    InvalidEvent { reason: String },

    /// No packets were classified for one of the roles
    #[error("No SIP packets matching {0} found in capture")]
    NoEventsForRole(String),

    /// The event kind is neither a known request method nor a status
    #[error("Unsupported message kind: {0}")]
    UnsupportedMessageKind(String),

    /// An action cannot be rendered into scenario text
    #[error("Cannot render action: {0}")]
    UnrenderableAction(String),

    /// The formatter rejected the assembled document
    #[error("Scenario document is not well-formed: {0}")]
    DocumentNotWellFormed(String),

    /// Input/output error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid settings
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ScenarioError {
    pub(crate) fn unroutable(address: impl ToString, frame: u64) -> Self {
        ScenarioError::UnroutablePacket {
            address: address.to_string(),
            frame,
        }
    }

    pub(crate) fn invalid_event(reason: impl Into<String>) -> Self {
        ScenarioError::InvalidEvent { reason: reason.into() }
    }

    /// Returns true for errors that only affect a single packet
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ScenarioError::UnroutablePacket { .. } | ScenarioError::MalformedSessionDescription(_)
        )
    }
}

impl From<toml::de::Error> for ScenarioError {
    fn from(err: toml::de::Error) -> Self {
        ScenarioError::Config(err.to_string())
    }
}
