//! Scenario document assembly
//!
//! Rendered blocks are wrapped in the SIPp envelope, their whitespace is
//! normalized and the result goes through a [`DocumentFormatter`]. Nothing
//! is returned for a document the formatter rejects.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use tracing::debug;

use crate::error::{Result, ScenarioError};
use crate::formatter::{DocumentFormatter, XmlFormatter};

/// Encoding named in the XML declaration; documents are written as UTF-8
pub const DOCUMENT_ENCODING: &str = "UTF-8";

/// Assembles scenario documents with a pluggable formatter
#[derive(Debug, Clone, Default)]
pub struct ScenarioSerializer<F = XmlFormatter> {
    formatter: F,
}

fn envelope_error(reason: impl ToString) -> ScenarioError {
    ScenarioError::DocumentNotWellFormed(reason.to_string())
}

impl<F: DocumentFormatter> ScenarioSerializer<F> {
    pub fn new(formatter: F) -> Self {
        Self { formatter }
    }

    pub fn serialize(&self, role_label: &str, dialog_label: &str, blocks: &[String]) -> Result<Vec<u8>> {
        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some(DOCUMENT_ENCODING), None)))
            .map_err(envelope_error)?;
        writer.get_mut().push(b'\n');
        writer
            .write_event(Event::Comment(BytesText::from_escaped(format!(
                " {} scenario ",
                escape_comment(role_label)
            ))))
            .map_err(envelope_error)?;
        writer.get_mut().push(b'\n');

        let mut scenario = BytesStart::new("scenario");
        scenario.push_attribute(("name", dialog_label));
        writer.write_event(Event::Start(scenario)).map_err(envelope_error)?;
        writer.get_mut().push(b'\n');
        for block in blocks {
            writer.get_mut().extend_from_slice(normalize_block(block).as_bytes());
        }
        writer
            .write_event(Event::End(BytesEnd::new("scenario")))
            .map_err(envelope_error)?;

        let document = String::from_utf8(writer.into_inner()).map_err(envelope_error)?;
        debug!(role = role_label, blocks = blocks.len(), "serializing scenario");
        self.formatter.format(&document)
    }
}

/// Serialize with the default [`XmlFormatter`]
pub fn serialize(role_label: &str, dialog_label: &str, blocks: &[String]) -> Result<Vec<u8>> {
    ScenarioSerializer::<XmlFormatter>::default().serialize(role_label, dialog_label, blocks)
}

// "--" may not appear inside an XML comment
fn escape_comment(text: &str) -> String {
    let mut out = text.replace("--", "- -");
    if out.ends_with('-') {
        out.push(' ');
    }
    out
}

/// Normalize the whitespace of one rendered block
///
/// Every line loses its leading whitespace. A CDATA section may open and
/// close on the same line as its `<send>` tags. Inside a CDATA section blank
/// lines are dropped, except the single line right after `Content-Length:`
/// that separates the headers from the body.
pub fn normalize_block(block: &str) -> String {
    let mut out = String::with_capacity(block.len());
    let mut in_cdata = false;
    let mut separator_pending = false;

    for line in block.lines() {
        let line = line.trim_start();

        if !in_cdata && line.contains("<![CDATA[") {
            in_cdata = true;
            separator_pending = false;
        } else if in_cdata && line.contains("]]>") {
            in_cdata = false;
        } else if in_cdata {
            if line.is_empty() && !separator_pending {
                continue;
            }
            separator_pending = line.starts_with("Content-Length:");
        } else if line.is_empty() {
            continue;
        }

        out.push_str(line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    #[test]
    fn test_normalize_keeps_only_the_body_separator() {
        let block = "  <send>\n  <![CDATA[\n\n  INVITE sip:b SIP/2.0\n\n  Content-Length: [len]\n\n\n  v=0\n\n  o=- 1 1 IN IP4 [local_ip]\n  ]]>\n  </send>\n";
        assert_eq!(
            normalize_block(block),
            "<send>\n<![CDATA[\nINVITE sip:b SIP/2.0\nContent-Length: [len]\n\nv=0\no=- 1 1 IN IP4 [local_ip]\n]]>\n</send>\n"
        );
    }

    #[test]
    fn test_normalize_inline_cdata_markers() {
        let block = "<send><![CDATA[\nOPTIONS sip:b SIP/2.0\n\nContent-Length: [len]\n\n]]></send>\n";
        assert_eq!(
            normalize_block(block),
            "<send><![CDATA[\nOPTIONS sip:b SIP/2.0\nContent-Length: [len]\n\n]]></send>\n"
        );
    }

    #[test]
    fn test_serialize_envelope() {
        let blocks = vec!["<pause milliseconds=\"5\"/>\n".to_string()];
        let text = String::from_utf8(serialize("UAC", "A & \"B\" <c>", &blocks).unwrap()).unwrap();
        assert_eq!(
            text,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <!-- UAC scenario -->\n\
             <scenario name=\"A &amp; &quot;B&quot; &lt;c&gt;\">\n    \
             <pause milliseconds=\"5\"/>\n\
             </scenario>\n"
        );
    }

    #[test]
    fn test_non_ascii_name_is_utf8() {
        let text = String::from_utf8(serialize("UAS", "Übergabe café", &[]).unwrap()).unwrap();
        assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(text.contains("<scenario name=\"Übergabe café\">"));
    }

    #[test]
    fn test_role_comment_cannot_close_early() {
        let text = String::from_utf8(serialize("U--A", "x", &[]).unwrap()).unwrap();
        assert!(text.contains("<!-- U- -A scenario -->"));
    }

    struct Capture(RefCell<Option<String>>);

    impl DocumentFormatter for Capture {
        fn format(&self, document: &str) -> Result<Vec<u8>> {
            *self.0.borrow_mut() = Some(document.to_string());
            Ok(b"formatted".to_vec())
        }
    }

    #[test]
    fn test_custom_formatter_receives_envelope() {
        let serializer = ScenarioSerializer::new(Capture(RefCell::new(None)));
        let blocks = vec!["  <pause milliseconds=\"7\"/>\n\n".to_string()];

        assert_eq!(serializer.serialize("UAC", "call", &blocks).unwrap(), b"formatted");
        assert_eq!(
            serializer.formatter.0.borrow().as_deref(),
            Some(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
                 <!-- UAC scenario -->\n\
                 <scenario name=\"call\">\n\
                 <pause milliseconds=\"7\"/>\n\
                 </scenario>"
            )
        );
    }

    #[test]
    fn test_broken_block_is_rejected() {
        let blocks = vec!["<recv response=\"200\">\n".to_string()];
        let err = serialize("UAS", "x", &blocks).unwrap_err();
        assert!(matches!(err, ScenarioError::DocumentNotWellFormed(_)));
    }
}
