//! Header-set fingerprinting
//!
//! A header signature is a stable hash of a set of spreadsheet column
//! headers, used as the cache key for resolved header mappings. Two files
//! with the same columns in any order produce the same signature, so a
//! header layout is never re-resolved twice.

use sha2::{Digest, Sha256};

/// Compute the signature for a set of column headers.
///
/// Headers are trimmed, lower-cased and sorted before hashing, and empty
/// headers are dropped, so the result is independent of column order,
/// casing and surrounding whitespace.
pub fn header_signature<S: AsRef<str>>(headers: &[S]) -> String {
    let mut normalized: Vec<String> = headers
        .iter()
        .map(|h| h.as_ref().trim().to_lowercase())
        .filter(|h| !h.is_empty())
        .collect();
    normalized.sort();

    let mut hasher = Sha256::new();
    hasher.update(normalized.join("|").as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_is_order_independent() {
        let a = ["Name".to_string(), "Email".to_string(), "Phone".to_string()];
        let b = ["Phone".to_string(), "Name".to_string(), "Email".to_string()];
        assert_eq!(header_signature(&a), header_signature(&b));
    }

    #[test]
    fn test_signature_normalizes_case_and_whitespace() {
        let a = ["  Full Name ", "EMAIL"];
        let b = ["full name", "email"];
        assert_eq!(header_signature(&a), header_signature(&b));
    }

    #[test]
    fn test_signature_drops_empty_headers() {
        let a = ["Email", "", "   "];
        let b = ["Email"];
        assert_eq!(header_signature(&a), header_signature(&b));
    }

    #[test]
    fn test_different_header_sets_differ() {
        let a = ["Email"];
        let b = ["Phone"];
        assert_ne!(header_signature(&a), header_signature(&b));
    }

    #[test]
    fn test_signature_is_hex_sha256() {
        let sig = header_signature(&["Email"]);
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
