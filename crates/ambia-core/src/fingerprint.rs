// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic cache keys.

use sha2::{Digest, Sha256};

/// Length of a cache key in hex characters.
pub const CACHE_KEY_LEN: usize = 16;

/// Normalises a query for keying: trimmed and lowercased.
pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Computes the cache key for a user's query.
///
/// `hex(sha256(user_id + ":" + normalize(query)))`, truncated to 16 characters.
/// Queries differing only in case or surrounding whitespace share a key.
pub fn fingerprint(user_id: &str, query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hasher.update(b":");
    hasher.update(normalize_query(query).as_bytes());
    let mut key = hex::encode(hasher.finalize());
    key.truncate(CACHE_KEY_LEN);
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn key_is_sixteen_lowercase_hex_chars() {
        let key = fingerprint("user-1", "What's the weather?");
        assert_eq!(key.len(), CACHE_KEY_LEN);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn users_do_not_share_keys() {
        assert_ne!(
            fingerprint("alice", "morning briefing"),
            fingerprint("bob", "morning briefing")
        );
    }

    proptest! {
        #[test]
        fn case_and_whitespace_do_not_change_key(
            user in "[a-z0-9-]{1,12}",
            query in "[a-zA-Z ]{1,40}",
            pad_left in " {0,3}",
            pad_right in " {0,3}",
        ) {
            let padded = format!("{pad_left}{}{pad_right}", query.to_uppercase());
            prop_assert_eq!(fingerprint(&user, &query), fingerprint(&user, &padded));
        }

        #[test]
        fn key_is_deterministic(user in ".{0,20}", query in ".{0,60}") {
            prop_assert_eq!(fingerprint(&user, &query), fingerprint(&user, &query));
        }
    }
}
