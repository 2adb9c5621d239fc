//! Content-transfer and header decoding.
//!
//! Only the forms a captured test message actually carries are modelled:
//! Base64 bodies and parts, and RFC 2047 encoded-words of the form
//! `=?utf-8?b?<base64>?=`.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Opening marker of a UTF-8 Base64 encoded-word (matched case-insensitively).
pub const ENCODED_WORD_PREFIX: &str = "=?utf-8?b?";

/// Closing marker of an encoded-word.
pub const ENCODED_WORD_SUFFIX: &str = "?=";

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decodes Base64 data, ignoring embedded whitespace and line breaks.
///
/// `context` names the header or part being decoded and is carried in the
/// error.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str, context: &str) -> Result<Vec<u8>> {
    let cleaned: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(cleaned)
        .map_err(|e| Error::base64(context, e))
}

/// Decodes Base64 data and interprets it as UTF-8 text.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64 or not valid UTF-8.
pub fn decode_base64_text(data: &str, context: &str) -> Result<String> {
    let bytes = decode_base64(data, context)?;
    String::from_utf8(bytes).map_err(|e| Error::utf8(context, e))
}

/// Encodes a header value as a single UTF-8 Base64 encoded-word.
///
/// Plain ASCII text without `=` or `?` is returned unchanged.
#[must_use]
pub fn encode_rfc2047(text: &str) -> String {
    if text.chars().all(|c| c.is_ascii() && c != '=' && c != '?') {
        return text.to_string();
    }

    let encoded = encode_base64(text.as_bytes());
    format!("{ENCODED_WORD_PREFIX}{encoded}{ENCODED_WORD_SUFFIX}")
}

/// Returns true if `text` starts with the UTF-8 Base64 encoded-word marker.
#[must_use]
pub fn is_encoded_word(text: &str) -> bool {
    strip_prefix_ignore_case(text, ENCODED_WORD_PREFIX).is_some()
}

/// Returns true if `text` contains the UTF-8 Base64 encoded-word marker anywhere.
#[must_use]
pub fn contains_encoded_word(text: &str) -> bool {
    text.to_ascii_lowercase().contains(ENCODED_WORD_PREFIX)
}

/// Decodes a single `=?utf-8?b?...?=` encoded-word.
///
/// Everything between the prefix and the last `?=` is treated as the
/// Base64 payload. Text that is not an encoded-word is returned unchanged.
///
/// # Errors
///
/// Returns an error if the word is unterminated, or if its payload is not
/// valid Base64 or UTF-8.
pub fn decode_rfc2047(text: &str) -> Result<String> {
    match encoded_payload(text)? {
        Some(payload) => decode_base64_text(payload, "encoded-word"),
        None => Ok(text.to_string()),
    }
}

/// Decodes a header value made of space-separated encoded-words.
///
/// Each encoded-word is Base64-decoded on its own and the bytes of adjacent
/// words are joined before the single UTF-8 decode, so a multi-byte
/// character split across two words still decodes. Plain words are kept,
/// separated from their neighbours by a single space.
///
/// # Errors
///
/// Returns an error naming `context` if any payload is invalid.
pub fn decode_encoded_words(text: &str, context: &str) -> Result<String> {
    let mut bytes = Vec::new();
    let mut previous_plain = None;

    for segment in text.split([' ', '\t']).filter(|s| !s.is_empty()) {
        if let Some(payload) = encoded_payload(segment)? {
            if previous_plain == Some(true) {
                bytes.push(b' ');
            }
            bytes.extend(decode_base64(payload, context)?);
            previous_plain = Some(false);
        } else {
            if previous_plain.is_some() {
                bytes.push(b' ');
            }
            bytes.extend_from_slice(segment.as_bytes());
            previous_plain = Some(true);
        }
    }

    String::from_utf8(bytes).map_err(|e| Error::utf8(context, e))
}

/// Extracts the Base64 payload of an encoded-word, or `None` for plain text.
fn encoded_payload(word: &str) -> Result<Option<&str>> {
    let Some(rest) = strip_prefix_ignore_case(word, ENCODED_WORD_PREFIX) else {
        return Ok(None);
    };
    let end = rest
        .rfind(ENCODED_WORD_SUFFIX)
        .ok_or_else(|| Error::InvalidEncoding(format!("unterminated encoded-word: {word}")))?;
    Ok(Some(&rest[..end]))
}

/// Case-insensitive ASCII `strip_prefix`.
pub(crate) fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &text[prefix.len()..])
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
    use proptest::prelude::*;

    #[test]
    fn test_base64_encode_decode() {
        let data = b"Hello, World!";
        let encoded = encode_base64(data);
        assert_eq!(encoded, "SGVsbG8sIFdvcmxkIQ==");

        let decoded = decode_base64(&encoded, "test").unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_base64_ignores_line_breaks() {
        let decoded = decode_base64("SGVsbG8s\r\nIFdvcmxk\r\nIQ==", "test").unwrap();
        assert_eq!(decoded, b"Hello, World!");
    }

    #[test]
    fn test_base64_error_names_context() {
        let err = decode_base64("not*base64", "attachment part").unwrap_err();
        assert!(err.to_string().contains("attachment part"));
    }

    #[test]
    fn test_rfc2047_encode() {
        assert_eq!(encode_rfc2047("Hello"), "Hello");

        let encoded = encode_rfc2047("Héllo");
        assert_eq!(encoded, "=?utf-8?b?SMOpbGxv?=");
    }

    #[test]
    fn test_rfc2047_decode() {
        assert_eq!(decode_rfc2047("Hello").unwrap(), "Hello");
        assert_eq!(decode_rfc2047("=?utf-8?b?SMOpbGxv?=").unwrap(), "Héllo");
        assert_eq!(decode_rfc2047("=?UTF-8?B?SMOpbGxv?=").unwrap(), "Héllo");
    }

    #[test]
    fn test_rfc2047_unterminated() {
        assert!(decode_rfc2047("=?utf-8?b?SMOpbGxv").is_err());
    }

    #[test]
    fn test_is_encoded_word() {
        assert!(is_encoded_word("=?utf-8?b?SMOpbGxv?="));
        assert!(is_encoded_word("=?Utf-8?B?SMOpbGxv?="));
        assert!(!is_encoded_word("Re: =?utf-8?b?SMOpbGxv?="));
        assert!(contains_encoded_word("Re: =?UTF-8?B?SMOpbGxv?="));
    }

    #[test]
    fn test_encoded_words_padded_segments() {
        // Each word padded separately, as mail clients emit them
        let header = "=?utf-8?b?SMOpbA==?= =?utf-8?b?bG8=?=";
        assert_eq!(decode_encoded_words(header, "Subject").unwrap(), "Héllo");
    }

    #[test]
    fn test_encoded_words_split_multibyte_char() {
        // "é" is 0xC3 0xA9; each word carries one byte
        let header = "=?utf-8?b?SMM=?= =?utf-8?b?qWxsbw==?=";
        assert_eq!(decode_encoded_words(header, "Subject").unwrap(), "Héllo");
    }

    #[test]
    fn test_encoded_words_concatenate_payloads() {
        // "Héllo wörld" split mid-payload across two words
        let full = encode_base64("Héllo wörld".as_bytes());
        let (first, second) = full.split_at(8);
        let header = format!("=?utf-8?b?{first}?= =?utf-8?b?{second}?=");

        assert_eq!(
            decode_encoded_words(&header, "Subject").unwrap(),
            "Héllo wörld"
        );
    }

    #[test]
    fn test_encoded_words_mixed_with_plain() {
        let decoded = decode_encoded_words("Re: =?utf-8?b?SMOpbGxv?= again", "Subject").unwrap();
        assert_eq!(decoded, "Re: Héllo again");
    }

    #[test]
    fn test_encoded_words_invalid_payload() {
        let err = decode_encoded_words("=?utf-8?b?@@@@?=", "Subject").unwrap_err();
        assert!(matches!(err, Error::Base64 { ref context, .. } if context == "Subject"));
    }

    proptest! {
        #[test]
        fn prop_encoded_word_round_trip(text in "\\PC{0,40}") {
            let encoded = encode_rfc2047(&text);
            prop_assert_eq!(decode_rfc2047(&encoded).unwrap(), text);
        }
    }
}
