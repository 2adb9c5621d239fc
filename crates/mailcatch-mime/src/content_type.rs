//! `Content-Type` values.

use crate::error::{Error, Result};

/// A parsed `Content-Type` header value.
///
/// The media type is lowercased; parameter names are lowercased and their
/// values kept verbatim (minus surrounding quotes), in header order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    essence: String,
    slash: usize,
    params: Vec<(String, String)>,
}

impl ContentType {
    /// Creates a content type without parameters.
    #[must_use]
    pub fn new(main_type: &str, sub_type: &str) -> Self {
        Self {
            essence: format!("{main_type}/{sub_type}").to_ascii_lowercase(),
            slash: main_type.len(),
            params: Vec::new(),
        }
    }

    /// Returns `type/subtype`, lowercased.
    #[must_use]
    pub fn essence(&self) -> &str {
        &self.essence
    }

    /// Returns the top-level type, e.g. `multipart`.
    #[must_use]
    pub fn main_type(&self) -> &str {
        &self.essence[..self.slash]
    }

    /// Returns the subtype, e.g. `alternative`.
    #[must_use]
    pub fn sub_type(&self) -> &str {
        &self.essence[self.slash + 1..]
    }

    /// Looks up a parameter by case-insensitive name. The first occurrence
    /// wins.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns whether any parameters were given.
    #[must_use]
    pub fn has_params(&self) -> bool {
        !self.params.is_empty()
    }

    /// Returns the `charset` parameter.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.param("charset")
    }

    /// Returns the `boundary` parameter.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.param("boundary")
    }

    /// Compares against a `type/subtype` string, ignoring case.
    #[must_use]
    pub fn is(&self, essence: &str) -> bool {
        self.essence.eq_ignore_ascii_case(essence)
    }

    /// Returns true for any `multipart/*` type.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.main_type() == "multipart"
    }

    /// Returns true for `text/plain` and `text/html`.
    #[must_use]
    pub fn is_body_text(&self) -> bool {
        self.is("text/plain") || self.is("text/html")
    }

    /// Parses `type/subtype; name=value; ...`.
    ///
    /// Parameters without `=` are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidContentType`] when the media type is missing
    /// either half.
    pub fn parse(value: &str) -> Result<Self> {
        let mut segments = value.split(';');
        let media = segments.next().unwrap_or_default().trim();

        let Some((main, sub)) = media.split_once('/') else {
            return Err(Error::InvalidContentType(media.to_string()));
        };
        let (main, sub) = (main.trim(), sub.trim());
        if main.is_empty() || sub.is_empty() {
            return Err(Error::InvalidContentType(media.to_string()));
        }

        let mut content_type = Self::new(main, sub);
        content_type.params = segments
            .filter_map(|segment| segment.split_once('='))
            .map(|(name, value)| {
                (
                    name.trim().to_ascii_lowercase(),
                    value.trim().trim_matches('"').to_string(),
                )
            })
            .collect();
        Ok(content_type)
    }
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

    #[test]
    fn test_essence_lowercased() {
        let ct = ContentType::parse("Text/HTML; Charset=UTF-8").unwrap();
        assert_eq!(ct.essence(), "text/html");
        assert_eq!(ct.main_type(), "text");
        assert_eq!(ct.sub_type(), "html");
        assert_eq!(ct.charset(), Some("UTF-8"));
        assert!(ct.is_body_text());
    }

    #[test]
    fn test_quoted_boundary() {
        let ct = ContentType::parse("multipart/mixed; boundary=\"----=_Part_123\"").unwrap();
        assert!(ct.is_multipart());
        assert!(ct.is("Multipart/Mixed"));
        assert_eq!(ct.boundary(), Some("----=_Part_123"));
    }

    #[test]
    fn test_params_in_order_first_wins() {
        let ct = ContentType::parse("image/jpeg; name=a.jpg; flag; name=b.jpg").unwrap();
        assert!(ct.has_params());
        assert_eq!(ct.param("NAME"), Some("a.jpg"));
        assert!(!ContentType::parse("application/pdf").unwrap().has_params());
    }

    #[test]
    fn test_invalid() {
        assert!(matches!(ContentType::parse("garbage"), Err(Error::InvalidContentType(_))));
        assert!(ContentType::parse("/plain").is_err());
        assert!(ContentType::parse("text/ ; charset=x").is_err());
    }
}
