//! Scoped storage-key derivation.
//!
//! Every persisted value lives under a key derived from the preference name
//! and the signed-in user's identity. Both components are escaped to a
//! filename-safe alphabet before joining, so two distinct (name, identity)
//! pairs can never produce the same key and an identity containing the join
//! separator cannot smuggle itself into another scope.

/// Derives the storage key for `name` scoped to `identity`.
///
/// Returns `None` when no identity is present: with nobody signed in there
/// is no scope to persist under, and the in-memory default is used instead.
pub fn scoped_key(name: &str, identity: Option<&str>) -> Option<String> {
    let identity = identity?;
    Some(format!("pref.{}.{}", escape(name), escape(identity)))
}

/// Percent-escapes every byte outside `[A-Za-z0-9_-]`.
///
/// The escaping is injective (each input maps to exactly one output and
/// `%` itself is always escaped), which is what makes `scoped_key`
/// collision-free across identities.
fn escape(component: &str) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(component.len());
    for byte in component.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_' | b'-' => out.push(byte as char),
            _ => {
                let _ = write!(out, "%{:02X}", byte);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_identity_yields_no_key() {
        assert_eq!(scoped_key("theme", None), None);
    }

    #[test]
    fn key_contains_both_components() {
        let key = scoped_key("theme", Some("alice")).unwrap();
        assert_eq!(key, "pref.theme.alice");
    }

    #[test]
    fn distinct_identities_never_collide() {
        let a = scoped_key("theme", Some("alice")).unwrap();
        let b = scoped_key("theme", Some("bob")).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn separator_bytes_in_identity_cannot_cross_scopes() {
        // Without escaping these two pairs would both flatten to
        // "pref.a.b.c".
        let first = scoped_key("a", Some("b.c")).unwrap();
        let second = scoped_key("a.b", Some("c")).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn escaped_keys_are_filename_safe() {
        let key = scoped_key("theme", Some("alice@example.com/../../etc")).unwrap();
        assert!(!key.contains('/'));
        assert!(!key.contains("@"));
        assert!(key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '%')));
    }

    #[test]
    fn percent_in_identity_stays_unambiguous() {
        let literal = scoped_key("theme", Some("a%40b")).unwrap();
        let encoded = scoped_key("theme", Some("a@b")).unwrap();
        assert_ne!(literal, encoded);
    }
}
