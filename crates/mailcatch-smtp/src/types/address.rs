//! Envelope address types.

/// Reverse- or forward-path from a `MAIL FROM` / `RCPT TO` command.
///
/// The receiver accepts whatever the client sends, so no validation is
/// done; an empty path (the null sender `<>`) is allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Creates an address from an already extracted path.
    #[must_use]
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    /// Extracts the path from a command argument such as `FROM:<a@x.com>`.
    ///
    /// Takes the text after the first `:` (or the whole argument if there is
    /// none), trimmed. If it starts with `<`, the path is what lies between
    /// the brackets and any ESMTP parameters after `>` are ignored.
    #[must_use]
    pub fn from_argument(argument: &str) -> Self {
        let tail = argument
            .split_once(':')
            .map_or(argument, |(_, tail)| tail)
            .trim();

        let path = match tail.strip_prefix('<') {
            Some(inner) => inner.split_once('>').map_or(inner, |(path, _)| path),
            None => tail,
        };
        Self(path.trim().to_string())
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for the null path.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
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
    fn test_bracketed_path() {
        let addr = Address::from_argument(" FROM:<user@example.com>");
        assert_eq!(addr.as_str(), "user@example.com");
    }

    #[test]
    fn test_esmtp_parameters_ignored() {
        let addr = Address::from_argument(" FROM:<user@example.com> SIZE=1024 BODY=8BITMIME");
        assert_eq!(addr.as_str(), "user@example.com");
    }

    #[test]
    fn test_space_after_colon() {
        let addr = Address::from_argument(" TO: <user@example.com>");
        assert_eq!(addr.as_str(), "user@example.com");
    }

    #[test]
    fn test_unbracketed_path() {
        let addr = Address::from_argument(" TO:user@example.com");
        assert_eq!(addr.as_str(), "user@example.com");
    }

    #[test]
    fn test_null_sender() {
        let addr = Address::from_argument(" FROM:<>");
        assert!(addr.is_empty());
    }

    #[test]
    fn test_missing_colon() {
        let addr = Address::from_argument(" <user@example.com>");
        assert_eq!(addr.as_str(), "user@example.com");
    }

    #[test]
    fn test_display() {
        assert_eq!(Address::new("a@x.com").to_string(), "a@x.com");
    }
}
