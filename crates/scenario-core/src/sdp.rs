//! Session description normalization
//!
//! Captured SDP is rewritten so that the scenario can be replayed from any
//! host: every dotted-quad address becomes `[local_ip]` and the audio media
//! port becomes `[media_port]`. The text is then re-split into one
//! `key=value` line per attribute, since some capture exports deliver the
//! whole description on a single line or with escaped line breaks.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, ScenarioError};

/// Placeholder substituted for IPv4 addresses
pub const LOCAL_IP: &str = "[local_ip]";
/// Placeholder substituted for the audio media port
pub const MEDIA_PORT: &str = "[media_port]";

static IPV4_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:[0-9]{1,3}\.){3}[0-9]{1,3}\b").unwrap());

static AUDIO_PORT: Lazy<Regex> = Lazy::new(|| Regex::new(r"m=audio\s+\d+").unwrap());

static KEY_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[vosiuepcbtrzkam]=").unwrap());

// Escaped CRLF as printed by some dissector exports
const ESCAPED_CRLF: &str = "\\xd\\xa";

/// Decode and normalize a session description body
pub fn extract_session_description(body: &[u8]) -> Result<String> {
    let text = std::str::from_utf8(body)
        .map_err(|e| ScenarioError::MalformedSessionDescription(e.to_string()))?;

    // Split first: an address glued to the next key ("1.2.3.4s=-") has no
    // word boundary until the attributes are on their own lines.
    let text = text.replace(ESCAPED_CRLF, "\n");
    let mut lines = Vec::new();
    for line in text.lines() {
        split_attributes(line.trim(), &mut lines);
    }
    let text = lines.join("\n");

    let text = IPV4_LITERAL.replace_all(&text, LOCAL_IP);
    let text = AUDIO_PORT.replace_all(&text, format!("m=audio {}", MEDIA_PORT).as_str());
    Ok(text.into_owned())
}

// Break a line before every key token that is not part of a word
fn split_attributes<'a>(line: &'a str, out: &mut Vec<&'a str>) {
    let mut start = 0;
    for m in KEY_TOKEN.find_iter(line) {
        let at = m.start();
        if at == start {
            continue;
        }
        let preceded_by_letter = line[..at]
            .chars()
            .next_back()
            .map_or(false, |c| c.is_ascii_alphabetic());
        if preceded_by_letter {
            continue;
        }
        push_trimmed(&line[start..at], out);
        start = at;
    }
    push_trimmed(&line[start..], out);
}

fn push_trimmed<'a>(part: &'a str, out: &mut Vec<&'a str>) {
    let part = part.trim();
    if !part.is_empty() {
        out.push(part);
    }
}
