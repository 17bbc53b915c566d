//! Wallet address validation — candidate extraction and EIP-55 checksum.
//!
//! Only properly checksummed addresses are accepted. A lowercase-only or
//! case-mangled address is skipped rather than answered.

use std::sync::OnceLock;

use regex::Regex;
use sha3::{Digest, Keccak256};

/// Candidate pattern: `0x` followed by exactly 40 hex digits.
fn candidate_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("0x[0-9a-fA-F]{40}").expect("static pattern compiles"))
}

/// Find the first address-shaped substring in free-form reply text.
///
/// Returns the raw candidate with its original casing so the checksum can
/// still be verified. `None` means the message has nothing to validate.
pub fn extract_candidate(text: &str) -> Option<&str> {
    candidate_re().find(text).map(|m| m.as_str())
}

/// Verify an EIP-55 checksummed address.
///
/// The checksum hashes the lowercased hex body with Keccak-256: digit
/// positions carry no case, and each letter must be uppercase exactly when
/// the corresponding hash nibble is >= 8. All-lowercase input passes only
/// if that is what the checksum produces.
pub fn is_valid(candidate: &str) -> bool {
    let Some(hex) = candidate.strip_prefix("0x") else {
        return false;
    };
    if hex.len() != 40 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return false;
    }

    let digest = Keccak256::digest(hex.to_ascii_lowercase().as_bytes());
    hex.bytes().enumerate().all(|(i, b)| {
        if b.is_ascii_digit() {
            return true;
        }
        let nibble = if i % 2 == 0 {
            digest[i / 2] >> 4
        } else {
            digest[i / 2] & 0x0f
        };
        if nibble >= 8 {
            b.is_ascii_uppercase()
        } else {
            b.is_ascii_lowercase()
        }
    })
}

/// Normalize an address into the registry's identity key (lowercase).
pub fn normalize(address: &str) -> String {
    address.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Published EIP-55 test vectors.
    const VALID: &[&str] = &[
        // All caps
        "0x52908400098527886E0F7030069857D2E4169EE7",
        "0x8617E340B3D01FA5F11F306F4090FD50E238070D",
        // All lower
        "0xde709f2102306220921060314715629080e2fb77",
        "0x27b1fdb04752bbc536007a920d24acb045561c26",
        // Normal
        "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
        "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
        "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
        "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
    ];

    #[test]
    fn accepts_checksum_vectors() {
        for addr in VALID {
            assert!(is_valid(addr), "expected valid: {addr}");
        }
    }

    #[test]
    fn rejects_case_flip() {
        // Lowercasing the first checksummed letter breaks the checksum.
        assert!(!is_valid("0x5aaeb6053F3E94C9b9A09f33669435E7Ef1BeAed"));
        // So does uppercasing a letter the checksum wants lowercase.
        assert!(!is_valid("0x5aAeb6053F3E94C9b9A09F33669435E7Ef1BeAed"));
    }

    #[test]
    fn rejects_uniform_case_with_wrong_checksum() {
        // The checksummed form of this address is mixed-case, so neither
        // uniform casing passes.
        assert!(!is_valid("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed"));
        assert!(!is_valid("0x5AAEB6053F3E94C9B9A09F33669435E7EF1BEAED"));
    }

    #[test]
    fn rejects_malformed() {
        assert!(!is_valid(""));
        assert!(!is_valid("0x"));
        assert!(!is_valid("5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed")); // no prefix
        assert!(!is_valid("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeA")); // 38 digits
        assert!(!is_valid("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAedFF")); // 42 digits
        assert!(!is_valid("0xzz08400098527886E0F7030069857D2E4169EE7")); // non-hex
    }

    #[test]
    fn extracts_candidate_from_reply_text() {
        let text = "my wallet is 0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed thanks";
        assert_eq!(
            extract_candidate(text),
            Some("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed")
        );
    }

    #[test]
    fn extracts_first_of_several() {
        let text = "0xde709f2102306220921060314715629080e2fb77 then \
                    0x27b1fdb04752bbc536007a920d24acb045561c26";
        assert_eq!(
            extract_candidate(text),
            Some("0xde709f2102306220921060314715629080e2fb77")
        );
    }

    #[test]
    fn extraction_truncates_longer_hex_runs() {
        // No boundary anchor: a longer hex run yields its first 40 digits.
        let text = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAedFF";
        assert_eq!(
            extract_candidate(text),
            Some("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed")
        );
    }

    #[test]
    fn no_candidate_in_plain_text() {
        assert_eq!(extract_candidate("gm, love the project"), None);
        assert_eq!(extract_candidate("0xshort"), None);
        // Uppercase prefix is not an address.
        assert_eq!(
            extract_candidate("0X5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"),
            None
        );
    }

    #[test]
    fn normalize_lowercases() {
        assert_eq!(
            normalize("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"),
            "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed"
        );
    }
}
