//! Well-formedness check and pretty printing of scenario documents

use quick_xml::events::Event;
use quick_xml::{Reader, Writer};
use tracing::trace;

use crate::error::{Result, ScenarioError};

/// Validates an assembled document and returns its pretty-printed bytes
///
/// Implementations must reject a document that is not well-formed rather
/// than emit it.
pub trait DocumentFormatter {
    fn format(&self, document: &str) -> Result<Vec<u8>>;
}

/// [`DocumentFormatter`] backed by quick-xml
///
/// Elements are indented by `indent` spaces per level. CDATA sections keep
/// their line structure; each line is re-indented one level deeper than the
/// section itself and the closing `]]>` lines up with the opening marker.
#[derive(Debug, Clone, Copy)]
pub struct XmlFormatter {
    pub indent: usize,
}

impl Default for XmlFormatter {
    fn default() -> Self {
        Self { indent: 4 }
    }
}

impl XmlFormatter {
    pub fn new(indent: usize) -> Self {
        Self { indent }
    }

    fn reindent_cdata(&self, content: &str, depth: usize) -> String {
        let mut lines: Vec<&str> = content.split('\n').collect();
        if lines.first().is_some_and(|l| l.trim().is_empty()) {
            lines.remove(0);
        }
        if lines.last().is_some_and(|l| l.trim().is_empty()) {
            lines.pop();
        }

        let inner = " ".repeat((depth + 1) * self.indent);
        let mut out = String::from("\n");
        for line in lines {
            let line = line.trim_end_matches('\r').trim_start();
            if !line.is_empty() {
                out.push_str(&inner);
                out.push_str(line);
            }
            out.push('\n');
        }
        out.push_str(&" ".repeat(depth * self.indent));
        out
    }
}

fn not_well_formed(reason: impl ToString) -> ScenarioError {
    ScenarioError::DocumentNotWellFormed(reason.to_string())
}

impl DocumentFormatter for XmlFormatter {
    fn format(&self, document: &str) -> Result<Vec<u8>> {
        let mut reader = Reader::from_str(document);
        reader.config_mut().trim_text(true);
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', self.indent);

        let mut depth = 0usize;
        let mut roots = 0usize;

        loop {
            let event = reader.read_event().map_err(|e| {
                not_well_formed(format!("{} at byte {}", e, reader.buffer_position()))
            })?;

            match event {
                Event::Eof => break,
                Event::Start(start) => {
                    if depth == 0 {
                        roots += 1;
                    }
                    depth += 1;
                    writer.write_event(Event::Start(start)).map_err(not_well_formed)?;
                }
                Event::End(end) => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or_else(|| not_well_formed("closing tag without an open element"))?;
                    writer.write_event(Event::End(end)).map_err(not_well_formed)?;
                }
                Event::Empty(empty) => {
                    if depth == 0 {
                        roots += 1;
                    }
                    writer.write_event(Event::Empty(empty)).map_err(not_well_formed)?;
                }
                Event::CData(cdata) => {
                    if depth == 0 {
                        return Err(not_well_formed("CDATA outside the root element"));
                    }
                    let content = std::str::from_utf8(&cdata).map_err(not_well_formed)?;
                    // written raw so the section gets its own line like an element
                    let out = writer.get_mut();
                    out.push(b'\n');
                    out.extend_from_slice(" ".repeat(depth * self.indent).as_bytes());
                    out.extend_from_slice(b"<![CDATA[");
                    out.extend_from_slice(self.reindent_cdata(content, depth).as_bytes());
                    out.extend_from_slice(b"]]>");
                }
                Event::Text(text) => {
                    if depth == 0 {
                        return Err(not_well_formed("text outside the root element"));
                    }
                    writer.write_event(Event::Text(text)).map_err(not_well_formed)?;
                }
                other => {
                    writer.write_event(other).map_err(not_well_formed)?;
                }
            }
        }

        if depth != 0 {
            return Err(not_well_formed(format!("{} element(s) left open", depth)));
        }
        if roots != 1 {
            return Err(not_well_formed(format!("expected one root element, found {}", roots)));
        }

        let mut bytes = writer.into_inner();
        bytes.push(b'\n');
        trace!("formatted document of {} bytes", bytes.len());
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn format(doc: &str) -> Result<String> {
        XmlFormatter::default()
            .format(doc)
            .map(|bytes| String::from_utf8(bytes).unwrap())
    }

    #[test]
    fn test_indents_elements_and_cdata() {
        let doc = "<scenario name=\"x\">\n<send>\n<![CDATA[\nOPTIONS sip:a SIP/2.0\nContent-Length: [len]\n\n]]>\n</send>\n<pause milliseconds=\"10\"/>\n</scenario>\n";
        assert_eq!(
            format(doc).unwrap(),
            "<scenario name=\"x\">\n    <send>\n        <![CDATA[\n            OPTIONS sip:a SIP/2.0\n            Content-Length: [len]\n\n        ]]>\n    </send>\n    <pause milliseconds=\"10\"/>\n</scenario>\n"
        );
    }

    #[test]
    fn test_custom_indent_width() {
        let doc = "<scenario><recv response=\"200\"><action><assignstr assign_to=\"t\" value=\"v\"/></action></recv><send><![CDATA[\nACK sip:b SIP/2.0\n]]></send></scenario>";
        let text = String::from_utf8(XmlFormatter::new(2).format(doc).unwrap()).unwrap();
        assert_eq!(
            text,
            "<scenario>\n  <recv response=\"200\">\n    <action>\n      <assignstr assign_to=\"t\" value=\"v\"/>\n    </action>\n  </recv>\n  <send>\n    <![CDATA[\n      ACK sip:b SIP/2.0\n    ]]>\n  </send>\n</scenario>\n"
        );
    }

    #[test]
    fn test_rejects_mismatched_tags() {
        assert!(matches!(
            format("<scenario><send></recv></scenario>"),
            Err(ScenarioError::DocumentNotWellFormed(_))
        ));
    }

    #[test]
    fn test_rejects_unclosed_root() {
        assert!(matches!(
            format("<scenario><send></send>"),
            Err(ScenarioError::DocumentNotWellFormed(_))
        ));
    }
}
