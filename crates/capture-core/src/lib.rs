//! # sippcap-capture
//!
//! Packet capture ingestion for the sippcap scenario generator.
//!
//! This crate reads classic pcap and pcapng files, walks each frame down
//! through the link, IP and transport layers, and extracts the SIP messages
//! carried in UDP datagrams or TCP segments. The result is an ordered list
//! of [`PacketRecord`]s, one per SIP message.
//!
//! ```no_run
//! use sippcap_capture::CaptureReader;
//!
//! # fn main() -> sippcap_capture::Result<()> {
//! let reader = CaptureReader::open("call.pcap")?;
//! for packet in reader.packets()? {
//!     println!("{} -> {}: {}", packet.source, packet.destination, packet.message.start_line);
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod frame;
pub mod headers;
pub mod pcap;
pub mod record;
pub mod sip;

pub use error::{CaptureError, Result};
pub use frame::{decode_frame, Segment, Transport};
pub use headers::{Header, Headers};
pub use pcap::{read_frames, RawFrame};
pub use record::{CaptureReader, PacketRecord};
pub use sip::{parse_message, parse_messages, SipMessage, StartLine};
