//! Ordered SIP header storage
//!
//! Headers are kept exactly as they appeared on the wire: original name
//! spelling, original value text and original order. Lookups are
//! case-insensitive and understand the compact header forms of RFC 3261
//! Section 7.3.3, so `get("Content-Type")` also finds a `c:` header.

use std::fmt;

/// A single header line as observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Header name as written in the message
    pub name: String,
    /// Header value with surrounding whitespace removed
    pub value: String,
}

impl Header {
    /// Create a new header
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Returns true if this header has the given name, compact forms included
    pub fn is(&self, name: &str) -> bool {
        canonical_name(&self.name).eq_ignore_ascii_case(canonical_name(name))
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.value)
    }
}

/// Expand an RFC 3261 compact header name to its long form
pub fn canonical_name(name: &str) -> &str {
    match name {
        "i" | "I" => "Call-ID",
        "m" | "M" => "Contact",
        "e" | "E" => "Content-Encoding",
        "l" | "L" => "Content-Length",
        "c" | "C" => "Content-Type",
        "o" | "O" => "Event",
        "f" | "F" => "From",
        "s" | "S" => "Subject",
        "k" | "K" => "Supported",
        "t" | "T" => "To",
        "v" | "V" => "Via",
        "r" | "R" => "Refer-To",
        "u" | "U" => "Allow-Events",
        other => other,
    }
}

/// Ordered, case-insensitive collection of SIP headers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<Header>,
}

impl Headers {
    /// Create an empty header collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header, keeping any earlier occurrence
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push(Header::new(name, value));
    }

    /// Builder-style variant of [`Headers::push`]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(name, value);
        self
    }

    /// First value of the named header
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|h| h.is(name))
            .map(|h| h.value.as_str())
    }

    /// Returns true if at least one header with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterate over all headers in wire order
    pub fn iter(&self) -> impl Iterator<Item = &Header> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Declared Content-Length, if present and numeric
    pub fn content_length(&self) -> Option<usize> {
        self.get("Content-Length").and_then(|v| v.trim().parse().ok())
    }

    /// Media type of the Content-Type header without parameters, lowercased
    pub fn media_type(&self) -> Option<String> {
        self.get("Content-Type").map(|v| {
            v.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }

    /// Sequence number and method of the CSeq header
    pub fn cseq(&self) -> Option<(u32, &str)> {
        let value = self.get("CSeq")?;
        let mut parts = value.split_whitespace();
        let seq = parts.next()?.parse().ok()?;
        let method = parts.next()?;
        Some((seq, method))
    }
}

impl FromIterator<Header> for Headers {
    fn from_iter<I: IntoIterator<Item = Header>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = &'a Header;
    type IntoIter = std::slice::Iter<'a, Header>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
