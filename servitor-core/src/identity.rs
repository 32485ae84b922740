//! Identity type for remotely addressable objects

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Unique name of a persistent object exposed to remote callers.
///
/// An identity is a `name` qualified by an optional `category`. The category
/// is what a dispatcher uses to pick the locator responsible for the object;
/// the name is unique within that category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity {
    name: String,
    category: String,
}

impl Identity {
    /// Create an identity from a name and a category.
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
        }
    }

    /// Create an identity in the default (empty) category.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, String::new())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> &str {
        &self.category
    }
}

/// Write `part` with `/` and `\` escaped by a leading backslash.
fn write_escaped(f: &mut fmt::Formatter<'_>, part: &str) -> fmt::Result {
    for c in part.chars() {
        if c == '/' || c == '\\' {
            f.write_str("\\")?;
        }
        write!(f, "{c}")?;
    }
    Ok(())
}

impl fmt::Display for Identity {
    /// `category/name`, or just `name` for the default category. Slashes and
    /// backslashes inside either part are backslash-escaped.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.category.is_empty() {
            write_escaped(f, &self.category)?;
            f.write_str("/")?;
        }
        write_escaped(f, &self.name)
    }
}

impl FromStr for Identity {
    type Err = IdentityParseError;

    /// Parse `category/name` or a bare `name`, splitting on the first
    /// unescaped `/`. A backslash takes the next character literally.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut category = None;
        let mut current = String::new();
        let mut chars = s.chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some(escaped) => current.push(escaped),
                    None => return Err(IdentityParseError::TrailingEscape(s.to_string())),
                },
                '/' if category.is_none() => category = Some(std::mem::take(&mut current)),
                '/' => return Err(IdentityParseError::UnescapedSlash(s.to_string())),
                c => current.push(c),
            }
        }
        if current.is_empty() {
            return Err(IdentityParseError::EmptyName(s.to_string()));
        }
        Ok(Self::new(current, category.unwrap_or_default()))
    }
}

/// Error when parsing an identity string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityParseError {
    #[error("Invalid identity (empty name): {0:?}")]
    EmptyName(String),

    #[error("Invalid identity (unescaped '/' in name): {0:?}")]
    UnescapedSlash(String),

    #[error("Invalid identity (dangling escape): {0:?}")]
    TrailingEscape(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_and_without_category() {
        assert_eq!(Identity::new("alice", "phonebook").to_string(), "phonebook/alice");
        assert_eq!(Identity::named("alice").to_string(), "alice");
    }

    #[test]
    fn test_display_escapes_slash_and_backslash() {
        assert_eq!(Identity::named("a/b").to_string(), r"a\/b");
        assert_eq!(Identity::new("x", "a/b").to_string(), r"a\/b/x");
        assert_eq!(Identity::new(r"c:\tmp", "files").to_string(), r"files/c:\\tmp");
    }

    #[test]
    fn test_slash_in_name_or_category_round_trips() {
        for id in [
            Identity::named("a/b"),
            Identity::new("x", "a/b"),
            Identity::new("etc/passwd", "files"),
            Identity::new(r"dir\", r"cat\"),
        ] {
            let parsed: Identity = id.to_string().parse().unwrap();
            assert_eq!(parsed, id);
        }
    }

    #[test]
    fn test_parse_splits_on_first_unescaped_slash() {
        let id: Identity = r"files/etc\/passwd".parse().unwrap();
        assert_eq!(id.category(), "files");
        assert_eq!(id.name(), "etc/passwd");

        let bare: Identity = "alice".parse().unwrap();
        assert_eq!(bare, Identity::named("alice"));

        let leading: Identity = "/alice".parse().unwrap();
        assert_eq!(leading, Identity::named("alice"));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(
            "".parse::<Identity>().unwrap_err(),
            IdentityParseError::EmptyName(String::new())
        );
        let err = "phonebook/".parse::<Identity>().unwrap_err();
        assert!(err.to_string().contains("phonebook/"));
        assert!(matches!(
            "files/etc/passwd".parse::<Identity>(),
            Err(IdentityParseError::UnescapedSlash(_))
        ));
        assert!(matches!(
            r"files/alice\".parse::<Identity>(),
            Err(IdentityParseError::TrailingEscape(_))
        ));
    }

    #[test]
    fn test_identities_differ_by_category() {
        assert_ne!(Identity::new("a", "x"), Identity::new("a", "y"));
        assert_ne!(Identity::new("a", "x"), Identity::named("a"));
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Display then FromStr gives back the identity for any non-empty
        /// name and any category, slashes and backslashes included.
        #[test]
        fn prop_display_parse_inverse(
            name in r"[a-z0-9/\\._-]{1,16}",
            category in r"[a-z0-9/\\._-]{0,8}",
        ) {
            let id = Identity::new(name, category);
            let parsed: Identity = id.to_string().parse().unwrap();
            prop_assert_eq!(parsed, id);
        }

        /// Same over arbitrary unicode text.
        #[test]
        fn prop_display_parse_inverse_any_text(name in ".{1,16}", category in ".{0,8}") {
            let id = Identity::new(name, category);
            let parsed: Identity = id.to_string().parse().unwrap();
            prop_assert_eq!(parsed, id);
        }

        /// Bare names without a slash parse back into the default category.
        #[test]
        fn prop_bare_name_parses_to_default_category(name in "[a-z0-9._-]{1,16}") {
            let parsed: Identity = name.parse().unwrap();
            prop_assert_eq!(parsed, Identity::named(name));
        }
    }
}
