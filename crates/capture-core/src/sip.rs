//! SIP message extraction from transport payloads
//!
//! The parser only needs what the scenario generator consumes: the start
//! line, the header list in wire order and the raw body. It accepts both
//! CRLF and bare LF line endings and unfolds continuation lines.
//!
//! ```text
//! SIP-message  =  start-line *message-header CRLF [ message-body ]
//! start-line   =  Request-Line / Status-Line
//! Request-Line =  Method SP Request-URI SP SIP-Version CRLF
//! Status-Line  =  SIP-Version SP Status-Code SP Reason-Phrase CRLF
//! ```

use std::fmt;

use bytes::Bytes;
use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_till, take_till1, take_while1, take_while_m_n},
    character::complete::{char, digit1, line_ending, space0, space1},
    combinator::{map_res, opt, peek, recognize},
    multi::many0,
    sequence::{preceded, terminated, tuple},
    IResult,
};
use tracing::trace;

use crate::error::Result;
use crate::headers::{Header, Headers};

/// The first line of a SIP message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartLine {
    /// `METHOD Request-URI SIP/2.0`
    Request {
        method: String,
        uri: String,
        version: String,
    },
    /// `SIP/2.0 Status-Code Reason-Phrase`
    Status {
        version: String,
        code: u16,
        reason: String,
    },
}

impl StartLine {
    /// Request method, `None` for responses
    pub fn method(&self) -> Option<&str> {
        match self {
            StartLine::Request { method, .. } => Some(method),
            StartLine::Status { .. } => None,
        }
    }

    /// Response status code, `None` for requests
    pub fn status_code(&self) -> Option<u16> {
        match self {
            StartLine::Status { code, .. } => Some(*code),
            StartLine::Request { .. } => None,
        }
    }
}

impl fmt::Display for StartLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartLine::Request { method, uri, version } => write!(f, "{} {} {}", method, uri, version),
            StartLine::Status { version, code, reason } if reason.is_empty() => {
                write!(f, "{} {}", version, code)
            }
            StartLine::Status { version, code, reason } => write!(f, "{} {} {}", version, code, reason),
        }
    }
}

/// A parsed SIP message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SipMessage {
    pub start_line: StartLine,
    pub headers: Headers,
    pub body: Bytes,
}

fn is_eol(c: u8) -> bool {
    c == b'\r' || c == b'\n'
}

// token = 1*(alphanum / "-" / "." / "!" / "%" / "*" / "_" / "+" / "`" / "'" / "~")
fn is_token_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || b"-.!%*_+`'~".contains(&c)
}

fn is_wsp(c: u8) -> bool {
    c == b' ' || c == b'\t'
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

// SIP-Version = "SIP" "/" 1*DIGIT "." 1*DIGIT
fn sip_version(input: &[u8]) -> IResult<&[u8], &[u8]> {
    recognize(tuple((tag_no_case("SIP/"), digit1, char('.'), digit1)))(input)
}

fn status_code(input: &[u8]) -> IResult<&[u8], u16> {
    map_res(
        take_while_m_n(3, 3, |c: u8| c.is_ascii_digit()),
        |digits: &[u8]| -> std::result::Result<u16, std::num::ParseIntError> {
            String::from_utf8_lossy(digits).parse::<u16>()
        },
    )(input)
}

fn status_line(input: &[u8]) -> IResult<&[u8], StartLine> {
    let (input, version) = sip_version(input)?;
    let (input, _) = space1(input)?;
    let (input, code) = status_code(input)?;
    // The code must be exactly three digits followed by a space or the end of line
    let (input, _) = alt((space1, peek(line_ending)))(input)?;
    let (input, reason) = terminated(take_till(is_eol), line_ending)(input)?;

    Ok((
        input,
        StartLine::Status {
            version: lossy(version),
            code,
            reason: lossy(reason).trim().to_string(),
        },
    ))
}

fn request_line(input: &[u8]) -> IResult<&[u8], StartLine> {
    let (input, (method, _, uri, _, version, _)) = tuple((
        take_while1(is_token_char),
        space1,
        take_till1(|c| c == b' ' || is_eol(c)),
        space1,
        sip_version,
        terminated(space0, line_ending),
    ))(input)?;

    Ok((
        input,
        StartLine::Request {
            method: lossy(method),
            uri: lossy(uri),
            version: lossy(version),
        },
    ))
}

/// Parse a Request-Line or Status-Line
pub fn start_line(input: &[u8]) -> IResult<&[u8], StartLine> {
    alt((status_line, request_line))(input)
}

// message-header = field-name HCOLON field-value CRLF, with LWS folding
fn header_line(input: &[u8]) -> IResult<&[u8], Header> {
    let (input, name) = take_while1(is_token_char)(input)?;
    let (input, _) = tuple((space0, char(':'), space0))(input)?;
    let (input, value) = terminated(take_till(is_eol), line_ending)(input)?;
    let (input, folded) = many0(preceded(
        take_while1(is_wsp),
        terminated(take_till(is_eol), line_ending),
    ))(input)?;

    let mut value = lossy(value).trim().to_string();
    for part in folded {
        value.push(' ');
        value.push_str(lossy(part).trim());
    }

    Ok((input, Header::new(lossy(name), value)))
}

fn header_block(input: &[u8]) -> IResult<&[u8], Vec<Header>> {
    terminated(many0(header_line), opt(line_ending))(input)
}

/// Returns true if the payload starts with a SIP start line
pub fn looks_like_sip(payload: &[u8]) -> bool {
    start_line(payload).is_ok()
}

/// Parse one SIP message and return the unconsumed remainder
///
/// The body extends for Content-Length bytes when that header is present
/// and satisfiable; otherwise it takes the rest of the payload.
pub fn parse_message(input: &[u8]) -> Result<(&[u8], SipMessage)> {
    let (input, start_line) = start_line(input)?;
    let (input, headers) = header_block(input)?;
    let headers: Headers = headers.into_iter().collect();

    let body_len = match headers.content_length() {
        Some(len) if len <= input.len() => len,
        Some(len) => {
            trace!(declared = len, available = input.len(), "SIP body shorter than Content-Length");
            input.len()
        }
        None => input.len(),
    };
    let (body, rest) = input.split_at(body_len);

    Ok((
        rest,
        SipMessage {
            start_line,
            headers,
            body: Bytes::copy_from_slice(body),
        },
    ))
}

/// Extract every SIP message carried by a transport payload
///
/// A payload that does not start with a SIP start line yields no messages.
/// Stream transports may carry several messages back to back; they are
/// separated using Content-Length. Keep-alive CRLFs between them are skipped.
pub fn parse_messages(payload: &[u8]) -> Result<Vec<SipMessage>> {
    let mut messages = Vec::new();
    let mut input = payload;

    loop {
        let skip = input.iter().take_while(|c| is_eol(**c)).count();
        input = &input[skip..];
        if input.is_empty() || !looks_like_sip(input) {
            break;
        }
        let (rest, message) = parse_message(input)?;
        messages.push(message);
        if rest.len() == input.len() {
            break;
        }
        input = rest;
    }

    Ok(messages)
}
