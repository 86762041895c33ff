//! Per-message packet records
//!
//! A [`PacketRecord`] is one SIP message as seen on the wire, together with
//! where and when it was captured. Records are produced in capture order.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, trace, warn};

use crate::error::Result;
use crate::frame::{decode_frame, Transport};
use crate::headers::Headers;
use crate::pcap::{read_frames, RawFrame};
use crate::sip::{parse_messages, SipMessage, StartLine};

/// One SIP message observed in the capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketRecord {
    /// 1-based frame number in the capture
    pub frame: u64,
    /// Capture time since the Unix epoch
    pub timestamp: Duration,
    pub source: SocketAddr,
    pub destination: SocketAddr,
    pub transport: Transport,
    pub message: SipMessage,
}

impl PacketRecord {
    /// Build a record directly from a message, mostly useful in tests
    pub fn new(source: SocketAddr, destination: SocketAddr, message: SipMessage) -> Self {
        Self {
            frame: 0,
            timestamp: Duration::ZERO,
            source,
            destination,
            transport: Transport::Udp,
            message,
        }
    }

    pub fn with_timestamp(mut self, timestamp: Duration) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Request method, `None` for responses
    pub fn method(&self) -> Option<&str> {
        self.message.start_line.method()
    }

    /// Full status line such as `SIP/2.0 200 OK`, `None` for requests
    pub fn status_line(&self) -> Option<String> {
        match &self.message.start_line {
            line @ StartLine::Status { .. } => Some(line.to_string()),
            StartLine::Request { .. } => None,
        }
    }

    /// Status code, `None` for requests
    pub fn status_code(&self) -> Option<u16> {
        self.message.start_line.status_code()
    }

    /// Media type of the body, lowercased and without parameters
    pub fn content_type(&self) -> Option<String> {
        self.message.headers.media_type()
    }

    pub fn headers(&self) -> &Headers {
        &self.message.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.message.body
    }
}

/// Reads SIP packet records out of a pcap or pcapng capture
#[derive(Debug, Clone)]
pub struct CaptureReader {
    data: Bytes,
}

impl CaptureReader {
    /// Wrap capture bytes already in memory
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Read a capture file from disk
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        debug!(path = %path.display(), bytes = data.len(), "capture loaded");
        Ok(Self::from_bytes(data))
    }

    /// Every link-layer frame in the capture
    pub fn frames(&self) -> Result<Vec<RawFrame<'_>>> {
        read_frames(&self.data)
    }

    /// Every SIP message in the capture, one record per message
    ///
    /// Frames that are not UDP/TCP, or whose payload does not start with a
    /// SIP start line, are skipped. A payload that starts like SIP but does
    /// not parse is skipped with a warning.
    pub fn packets(&self) -> Result<Vec<PacketRecord>> {
        let frames = self.frames()?;
        let mut records = Vec::new();
        let mut skipped = 0usize;

        for frame in &frames {
            let Some(segment) = decode_frame(frame.link_type, frame.data) else {
                trace!(frame = frame.number, link_type = frame.link_type, "not an IP transport frame");
                skipped += 1;
                continue;
            };

            let messages = match parse_messages(segment.payload) {
                Ok(messages) => messages,
                Err(e) => {
                    warn!(frame = frame.number, error = %e, "unparseable SIP payload skipped");
                    skipped += 1;
                    continue;
                }
            };
            if messages.is_empty() {
                skipped += 1;
                continue;
            }

            for message in messages {
                trace!(frame = frame.number, start_line = %message.start_line, "SIP message");
                records.push(PacketRecord {
                    frame: frame.number,
                    timestamp: frame.timestamp,
                    source: segment.source,
                    destination: segment.destination,
                    transport: segment.transport,
                    message,
                });
            }
        }

        info!(
            frames = frames.len(),
            sip_messages = records.len(),
            skipped,
            "capture decoded"
        );
        Ok(records)
    }
}
