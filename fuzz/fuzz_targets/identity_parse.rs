//! Fuzz identity parsing.
//!
//! Parsing never panics, a parsed identity always has a name, and printing
//! a parsed identity then parsing it again gives back the same identity.
//!
//! Run with: cargo +nightly fuzz run identity_parse -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use servitor_core::{Identity, IdentityParseError};

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        match input.parse::<Identity>() {
            Ok(identity) => {
                assert!(!identity.name().is_empty());
                let reparsed: Identity = identity
                    .to_string()
                    .parse()
                    .expect("printed identity must parse");
                assert_eq!(reparsed, identity);
            }
            Err(IdentityParseError::EmptyName(_)) => {
                assert!(input.is_empty() || input.ends_with('/'));
            }
            Err(IdentityParseError::UnescapedSlash(_)) => assert!(input.contains('/')),
            Err(IdentityParseError::TrailingEscape(_)) => assert!(input.ends_with('\\')),
        }
    }
});
