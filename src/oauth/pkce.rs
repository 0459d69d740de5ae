//! PKCE (Proof Key for Code Exchange) support.
//!
//! The gateway sits in two PKCE relationships at once: it verifies the
//! MCP client's commitment at `/token` (S256 or plain), and it generates
//! its own verifier/challenge pair for the leg to the IdP (always S256).

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Verify a PKCE S256 code challenge.
///
/// Computes `BASE64URL(SHA256(code_verifier))` and compares to the stored challenge.
pub fn verify_s256(code_verifier: &str, code_challenge: &str) -> bool {
    challenge_s256(code_verifier) == code_challenge
}

/// Verify a PKCE plain code challenge (verifier must equal challenge).
pub fn verify_plain(code_verifier: &str, code_challenge: &str) -> bool {
    code_verifier == code_challenge
}

/// Compute the S256 challenge for a verifier.
#[must_use]
pub fn challenge_s256(code_verifier: &str) -> String {
    let hash = Sha256::digest(code_verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Generate a fresh code verifier: 32 random bytes, base64url (43 chars).
#[must_use]
pub fn generate_verifier() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_s256_valid() {
        // RFC 7636 Appendix B test vector
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        let challenge = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";
        assert!(verify_s256(verifier, challenge));
    }

    #[test]
    fn test_s256_invalid_verifier() {
        let challenge = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";
        assert!(!verify_s256("wrong-verifier", challenge));
    }

    #[test]
    fn test_plain_comparison() {
        assert!(verify_plain("abc", "abc"));
        assert!(!verify_plain("abc", "abd"));
    }

    #[test]
    fn test_generated_verifier_roundtrip() {
        let verifier = generate_verifier();
        assert_eq!(verifier.len(), 43);
        assert!(verify_s256(&verifier, &challenge_s256(&verifier)));
    }

    #[test]
    fn test_generated_verifiers_are_unique() {
        assert_ne!(generate_verifier(), generate_verifier());
    }
}
