//! Sanitize-or-passthrough normalization of HTML bodies.
//!
//! Bodies carrying a literal `<html>` marker are parsed as a well-formed
//! markup document and re-serialized in an indented canonical form, so two
//! captures of the same message compare equal regardless of how the sender
//! laid out its markup. Anything that does not parse is returned unchanged.

use crate::error::{Error, Result};
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::sync::LazyLock;

/// Marker that switches normalization on.
const HTML_MARKER: &str = "<html>";

/// A `&` that already starts a known entity or a numeric reference, or a bare `&`.
#[allow(clippy::expect_used)]
static AMPERSAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(?:amp|apos|quot|lt|gt|#\d{2,4});|&").expect("ampersand pattern is valid")
});

/// Normalizes an HTML body, falling back to the original text.
///
/// Never fails: a parse failure is logged and the input is returned as-is.
#[must_use]
pub fn sanitize_html(body: &str) -> Cow<'_, str> {
    if !body.contains(HTML_MARKER) {
        return Cow::Borrowed(body);
    }

    match canonicalize(&escape_ampersands(body)) {
        Ok(normalized) => Cow::Owned(normalized),
        Err(e) => {
            tracing::warn!(
                error = %e,
                content = body,
                "HTML body is not well-formed, keeping original"
            );
            Cow::Borrowed(body)
        }
    }
}

/// Escapes every `&` that is not already part of a recognized entity.
#[must_use]
pub fn escape_ampersands(text: &str) -> Cow<'_, str> {
    AMPERSAND.replace_all(text, |caps: &Captures<'_>| {
        if &caps[0] == "&" {
            "&amp;".to_string()
        } else {
            caps[0].to_string()
        }
    })
}

/// Parses a single-rooted markup document and writes it back indented.
fn canonicalize(markup: &str) -> Result<String> {
    let mut reader = Reader::from_str(markup);
    reader.config_mut().trim_text(true);
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    let mut open: Vec<Vec<u8>> = Vec::new();
    let mut roots = 0usize;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| Error::Markup(format!("at byte {}: {e}", reader.buffer_position())))?;

        match &event {
            Event::Eof => break,
            Event::Start(start) => {
                if open.is_empty() {
                    roots += 1;
                }
                open.push(start.name().as_ref().to_vec());
            }
            Event::End(_) => {
                open.pop();
            }
            Event::Empty(_) if open.is_empty() => roots += 1,
            Event::Text(text) if open.is_empty() => {
                return Err(Error::Markup(format!(
                    "text outside the root element: {:?}",
                    String::from_utf8_lossy(text)
                )));
            }
            _ => {}
        }

        if roots > 1 {
            return Err(Error::Markup("more than one root element".to_string()));
        }

        writer
            .write_event(event)
            .map_err(|e| Error::Markup(e.to_string()))?;
    }

    if let Some(name) = open.last() {
        return Err(Error::Markup(format!(
            "unclosed element <{}>",
            String::from_utf8_lossy(name)
        )));
    }
    if roots == 0 {
        return Err(Error::Markup("no root element".to_string()));
    }

    String::from_utf8(writer.into_inner())
        .map(|s| s.trim().to_string())
        .map_err(|e| Error::Markup(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_bare_ampersand() {
        assert_eq!(escape_ampersands("a & b"), "a &amp; b");
        assert_eq!(escape_ampersands("a &amp; b"), "a &amp; b");
        assert_eq!(escape_ampersands("&lt;p&gt;"), "&lt;p&gt;");
        assert_eq!(escape_ampersands("&#160;"), "&#160;");
        assert_eq!(escape_ampersands("&nbsp;"), "&amp;nbsp;");
    }

    #[test]
    fn test_plain_text_passthrough() {
        let body = "just text & more";
        assert!(matches!(sanitize_html(body), Cow::Borrowed(_)));
    }

    #[test]
    fn test_well_formed_html_is_normalized() {
        let body = "<html><body><p>Fish & Chips</p></body></html>\r\n";
        let normalized = sanitize_html(body);
        assert!(normalized.starts_with("<html>"));
        assert!(normalized.ends_with("</html>"));
        assert!(normalized.contains("Fish &amp; Chips"));
        assert!(normalized.contains("\n  <body>"));
    }

    #[test]
    fn test_layout_differences_normalize_equal() {
        let compact = "<html><body><p>Hi</p></body></html>";
        let spread = "<html>\r\n  <body>\r\n<p>Hi</p>\r\n </body>\r\n</html>\r\n";
        assert_eq!(sanitize_html(compact), sanitize_html(spread));
    }

    #[test]
    fn test_malformed_html_kept() {
        let body = "<html><body><br></body></html>";
        assert_eq!(sanitize_html(body), body);
    }

    #[test]
    fn test_unclosed_html_kept() {
        let body = "<html><body><p>Hi</p>";
        assert_eq!(sanitize_html(body), body);
    }

    #[test]
    fn test_text_outside_root_kept() {
        let body = "Hello <html><p>Hi</p></html>";
        assert_eq!(sanitize_html(body), body);
    }
}
