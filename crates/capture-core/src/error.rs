use std::io;
use thiserror::Error;

/// A type alias for handling `Result`s with `CaptureError`
pub type Result<T> = std::result::Result<T, CaptureError>;

/// Errors that can occur while reading a capture file
#[derive(Error, Debug)]
pub enum CaptureError {
    /// The file does not start with a pcap or pcapng magic number
    #[error("Unknown capture format (magic 0x{0:08x})")]
    UnknownFormat(u32),

    /// A header or block ended before its declared length
    #[error("Truncated {what} at offset {offset}")]
    Truncated {
        /// What was being read
        what: &'static str,
        /// Byte offset in the capture where reading stopped
        offset: usize,
    },

    /// A pcapng block violates the block layout
    #[error("Invalid pcapng block at offset {offset}: {reason}")]
    InvalidBlock {
        /// Byte offset of the block
        offset: usize,
        /// Why the block was rejected
        reason: String,
    },

    /// The payload looked like SIP but could not be parsed
    #[error("Invalid SIP message: {0}")]
    InvalidSip(String),

    /// Input/output error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<nom::Err<nom::error::Error<&[u8]>>> for CaptureError {
    fn from(err: nom::Err<nom::error::Error<&[u8]>>) -> Self {
        match err {
            nom::Err::Incomplete(_) => CaptureError::InvalidSip("incomplete message".to_string()),
            nom::Err::Error(e) | nom::Err::Failure(e) => {
                CaptureError::InvalidSip(format!("parsing failed: {:?}", e.code))
            }
        }
    }
}
