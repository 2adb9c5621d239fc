//! Multipart walking and part classification.
//!
//! The walker is line based: it finds the first `Content-Type` line that
//! declares a `boundary=`, then slices every following run of lines that
//! does not mention the boundary into a part and walks that part in turn.
//! A block with no boundary is a single part and is classified by its own
//! `Content-Type`.

use crate::content_type::ContentType;
use crate::encoding::{decode_base64, decode_base64_text, strip_prefix_ignore_case};
use crate::error::Result;
use crate::header::{split_header, unfold};
use std::fmt;

const CONTENT_TYPE: &str = "content-type";
const CONTENT_TRANSFER_ENCODING: &str = "content-transfer-encoding";
const BOUNDARY: &str = "boundary=";

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    #[default]
    SevenBit,
    /// 8-bit binary.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding. Recognized but passed through undecoded.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
}

impl TransferEncoding {
    /// Parses transfer encoding from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit, // Default (includes "7bit")
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

/// What a single part contributes to the decoded email.
///
/// Ordered by precedence: when a part carries several `Content-Type`
/// lines, the highest kind wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PartKind {
    /// `image/jpeg`: the inline image.
    Image,
    /// `application/pdf` without parameters: an attachment.
    Attachment,
    /// `text/plain` or `text/html`: the body.
    Body,
}

impl PartKind {
    /// Classifies a `Content-Type` header line.
    ///
    /// A PDF is only an attachment when the line has no `;` at all. Senders
    /// that put the file name in a `name=` parameter instead of
    /// `Content-Disposition` are not treated as attachments.
    #[must_use]
    pub fn classify(line: &str) -> Option<Self> {
        let (_, value) = split_header(line)?;
        let content_type = ContentType::parse(value).ok()?;

        if content_type.is_body_text() {
            Some(Self::Body)
        } else if content_type.is("application/pdf") && !line.contains(';') {
            Some(Self::Attachment)
        } else if content_type.is("image/jpeg") {
            Some(Self::Image)
        } else {
            None
        }
    }
}

/// Content gathered while walking a multipart body.
#[derive(Debug, Default)]
pub(crate) struct Collected {
    /// Last body part seen.
    pub body: Option<String>,
    /// Last inline image seen.
    pub image: Option<Vec<u8>>,
    /// Attachments in order of appearance.
    pub attachments: Vec<Vec<u8>>,
    /// Transfer encoding of the first part that declared one.
    pub first_transfer_encoding: Option<String>,
}

/// Walks a MIME unit (message or part), collecting classified content.
///
/// A unit whose boundary is never declared is classified as a single part.
pub(crate) fn walk(lines: &[String], out: &mut Collected) -> Result<()> {
    let mut boundary: Option<String> = None;
    let mut buffer: Vec<&str> = Vec::new();

    for line in lines {
        if let Some(marker) = boundary.as_deref() {
            if !line.contains(marker) {
                buffer.push(line);
            } else if !buffer.is_empty() {
                let (part, _) = unfold(&buffer);
                walk(&part, out)?;
                buffer.clear();
            }
        } else if is_content_type(line) {
            boundary = extract_boundary(line);
        }
    }

    if boundary.is_none() {
        classify_part(lines, out)?;
    }
    Ok(())
}

/// Classifies one part and stores its decoded content.
fn classify_part(lines: &[String], out: &mut Collected) -> Result<()> {
    let mut kind: Option<PartKind> = None;
    let mut encoding: Option<&str> = None;
    let mut content: Vec<&str> = Vec::new();
    let mut in_content = false;

    for line in lines {
        if in_content {
            content.push(line);
        } else if line.is_empty() {
            in_content = true;
        } else if is_content_type(line) {
            kind = kind.max(PartKind::classify(line));
        } else if strip_prefix_ignore_case(line, CONTENT_TRANSFER_ENCODING).is_some() {
            encoding = split_header(line).map(|(_, value)| value);
        }
    }

    if let Some(value) = encoding {
        out.first_transfer_encoding
            .get_or_insert_with(|| value.to_string());
    }

    let Some(kind) = kind else {
        return Ok(());
    };
    let joined = content.join("\r\n");
    tracing::trace!(?kind, bytes = joined.len(), "classified part");

    match kind {
        PartKind::Body => {
            let base64 =
                encoding.is_some_and(|e| TransferEncoding::parse(e) == TransferEncoding::Base64);
            out.body = Some(if base64 {
                decode_base64_text(&joined, "text part")?
            } else {
                joined
            });
        }
        PartKind::Attachment => {
            out.attachments
                .push(decode_base64(&joined, "application/pdf attachment")?);
        }
        PartKind::Image => {
            out.image = Some(decode_base64(&joined, "image/jpeg part")?);
        }
    }
    Ok(())
}

fn is_content_type(line: &str) -> bool {
    strip_prefix_ignore_case(line, CONTENT_TYPE).is_some()
}

/// Extracts the boundary from a `Content-Type` line.
///
/// Leading `=`, quotes and whitespace are dropped; the value ends at a
/// closing quote or `;`.
fn extract_boundary(line: &str) -> Option<String> {
    let ix = line.to_ascii_lowercase().find(BOUNDARY)?;
    let raw = line[ix + BOUNDARY.len()..].trim_start_matches(['=', '"', ' ', '\t']);
    let end = raw.find(['"', ';']).unwrap_or(raw.len());
    let boundary = raw[..end].trim();
    (!boundary.is_empty()).then(|| boundary.to_string())
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use crate::encoding::encode_base64;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    #[test]
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse("7bit"), TransferEncoding::SevenBit);
        assert_eq!(TransferEncoding::parse(" Base64 "), TransferEncoding::Base64);
        assert_eq!(
            TransferEncoding::parse("quoted-printable"),
            TransferEncoding::QuotedPrintable
        );
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            PartKind::classify("Content-Type: text/plain; charset=utf-8"),
            Some(PartKind::Body)
        );
        assert_eq!(PartKind::classify("content-type: TEXT/HTML"), Some(PartKind::Body));
        assert_eq!(
            PartKind::classify("Content-Type: application/pdf"),
            Some(PartKind::Attachment)
        );
        assert_eq!(PartKind::classify("Content-Type: image/jpeg"), Some(PartKind::Image));
        assert_eq!(PartKind::classify("Content-Type: application/zip"), None);
    }

    #[test]
    fn test_classify_pdf_with_name_parameter_is_not_attachment() {
        assert_eq!(
            PartKind::classify("Content-Type: application/pdf; name=\"report.pdf\""),
            None
        );
    }

    #[test]
    fn test_extract_boundary() {
        assert_eq!(
            extract_boundary("Content-Type: multipart/mixed; boundary=XYZ"),
            Some("XYZ".to_string())
        );
        assert_eq!(
            extract_boundary("Content-Type: multipart/mixed; BOUNDARY=\"----=_Part_1\"; x=y"),
            Some("----=_Part_1".to_string())
        );
        assert_eq!(extract_boundary("Content-Type: multipart/mixed; boundary=\"\""), None);
        assert_eq!(extract_boundary("Content-Type: text/plain"), None);
    }

    #[test]
    fn test_walk_mixed() {
        let pdf = encode_base64(b"%PDF-1.4");
        let text = format!(
            "Content-Type: multipart/mixed; boundary=XYZ\n\
             \n\
             --XYZ\n\
             Content-Type: text/plain\n\
             \n\
             hello\n\
             --XYZ\n\
             Content-Type: application/pdf\n\
             Content-Transfer-Encoding: base64\n\
             \n\
             {pdf}\n\
             --XYZ--\n"
        );
        let mut out = Collected::default();
        walk(&lines(&text), &mut out).unwrap();

        assert_eq!(out.body.as_deref(), Some("hello"));
        assert_eq!(out.attachments, vec![b"%PDF-1.4".to_vec()]);
        assert_eq!(out.first_transfer_encoding.as_deref(), Some("base64"));
        assert!(out.image.is_none());
    }

    #[test]
    fn test_walk_nested_alternative_last_body_wins() {
        let text = "Content-Type: multipart/mixed; boundary=OUTER\n\
                    \n\
                    --OUTER\n\
                    Content-Type: multipart/alternative;\n\
                    \tboundary=\"INNER\"\n\
                    \n\
                    --INNER\n\
                    Content-Type: text/plain\n\
                    \n\
                    plain\n\
                    --INNER\n\
                    Content-Type: text/html\n\
                    \n\
                    <p>html</p>\n\
                    --INNER--\n\
                    --OUTER--\n";
        let mut out = Collected::default();
        walk(&lines(text), &mut out).unwrap();

        assert_eq!(out.body.as_deref(), Some("<p>html</p>"));
    }

    #[test]
    fn test_walk_base64_text_part() {
        let encoded = encode_base64("Grüße".as_bytes());
        let text = format!(
            "Content-Type: multipart/mixed; boundary=B\n\
             \n\
             --B\n\
             Content-Type: text/plain; charset=utf-8\n\
             Content-Transfer-Encoding: base64\n\
             \n\
             {encoded}\n\
             --B--\n"
        );
        let mut out = Collected::default();
        walk(&lines(&text), &mut out).unwrap();

        assert_eq!(out.body.as_deref(), Some("Grüße"));
    }

    #[test]
    fn test_walk_image() {
        let jpeg = encode_base64(&[0xFF, 0xD8, 0xFF, 0xE0]);
        let text = format!(
            "Content-Type: multipart/related; boundary=R\n\
             \n\
             --R\n\
             Content-Type: image/jpeg\n\
             \n\
             {jpeg}\n\
             --R--\n"
        );
        let mut out = Collected::default();
        walk(&lines(&text), &mut out).unwrap();

        assert_eq!(out.image, Some(vec![0xFF, 0xD8, 0xFF, 0xE0]));
    }

    #[test]
    fn test_walk_bad_attachment_base64_fails_with_context() {
        let text = "Content-Type: multipart/mixed; boundary=B\n\
                    \n\
                    --B\n\
                    Content-Type: application/pdf\n\
                    \n\
                    !!!not base64!!!\n\
                    --B--\n";
        let mut out = Collected::default();
        let err = walk(&lines(text), &mut out).unwrap_err();

        assert!(err.to_string().contains("application/pdf attachment"));
    }

    #[test]
    fn test_walk_without_boundary_is_single_unclassified_part() {
        let text = "Content-Type: multipart/mixed\n\nsomething\n";
        let mut out = Collected::default();
        walk(&lines(text), &mut out).unwrap();

        assert!(out.body.is_none());
        assert!(out.attachments.is_empty());
    }
}
