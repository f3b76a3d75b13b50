//! Webhook signature validation.
//!
//! The provider signs the raw request body with HMAC-SHA256 and sends the
//! digest as `x-hub-signature-256: sha256=<hex>`. Validation recomputes
//! the digest over the exact bytes received, before any parsing, and
//! compares in constant time.

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the webhook signature.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Signature validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    /// Signature header missing or empty.
    MissingSignature,
    /// Header value is not `sha256=<hex>`.
    InvalidFormat(String),
    /// Digest does not match the payload.
    Mismatch,
    /// Validation secret is empty.
    InvalidSecret,
}

impl fmt::Display for SignatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSignature => write!(f, "signature header missing"),
            Self::InvalidFormat(value) => write!(f, "invalid signature format: {value}"),
            Self::Mismatch => write!(f, "signature mismatch"),
            Self::InvalidSecret => write!(f, "invalid signing secret"),
        }
    }
}

impl std::error::Error for SignatureError {}

/// Validates a webhook signature header against the raw payload.
///
/// Only the `sha256=<hex>` format is accepted. The digest comparison is
/// constant time so mismatch position does not leak through timing.
///
/// # Errors
///
/// Returns the specific failure; callers map every variant to 401.
pub fn verify_signature(
    payload: &[u8],
    signature: Option<&str>,
    secret: &str,
) -> Result<(), SignatureError> {
    let signature = match signature {
        Some(s) if !s.is_empty() => s,
        _ => return Err(SignatureError::MissingSignature),
    };

    if secret.is_empty() {
        return Err(SignatureError::InvalidSecret);
    }

    let hex_digest = signature
        .strip_prefix("sha256=")
        .ok_or_else(|| SignatureError::InvalidFormat(signature.to_string()))?;

    let expected = generate_hmac_hex(payload, secret)?;

    if timing_safe_eq(hex_digest, &expected) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Generates the HMAC-SHA256 digest of a payload as lowercase hex.
///
/// # Errors
///
/// Returns `SignatureError::InvalidSecret` if the key is rejected.
pub fn generate_hmac_hex(payload: &[u8], secret: &str) -> Result<String, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::InvalidSecret)?;

    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Timing-safe string comparison.
fn timing_safe_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (a_byte, b_byte) in a.as_bytes().iter().zip(b.as_bytes()) {
        result |= a_byte ^ b_byte;
    }

    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_signature_is_accepted() {
        let payload = br#"{"action":"opened"}"#;
        let secret = "test_secret";
        let signature = format!("sha256={}", generate_hmac_hex(payload, secret).unwrap());

        assert!(verify_signature(payload, Some(&signature), secret).is_ok());
    }

    #[test]
    fn wrong_digest_is_rejected() {
        let payload = br#"{"action":"opened"}"#;

        let err = verify_signature(payload, Some("sha256=deadbeef"), "test_secret").unwrap_err();
        assert_eq!(err, SignatureError::Mismatch);
    }

    #[test]
    fn missing_header_is_rejected() {
        let err = verify_signature(b"{}", None, "test_secret").unwrap_err();
        assert_eq!(err, SignatureError::MissingSignature);

        let err = verify_signature(b"{}", Some(""), "test_secret").unwrap_err();
        assert_eq!(err, SignatureError::MissingSignature);
    }

    #[test]
    fn foreign_formats_are_rejected() {
        let payload = b"{}";
        let secret = "test_secret";
        let digest = generate_hmac_hex(payload, secret).unwrap();

        // Correct digest in any other framing still fails
        let err = verify_signature(payload, Some(&digest), secret).unwrap_err();
        assert!(matches!(err, SignatureError::InvalidFormat(_)));

        let stripe_style = format!("v1={digest}");
        let err = verify_signature(payload, Some(&stripe_style), secret).unwrap_err();
        assert!(matches!(err, SignatureError::InvalidFormat(_)));
    }

    #[test]
    fn empty_secret_is_rejected() {
        let err = verify_signature(b"{}", Some("sha256=abc"), "").unwrap_err();
        assert_eq!(err, SignatureError::InvalidSecret);
    }

    #[test]
    fn signature_covers_exact_bytes() {
        let secret = "test_secret";
        let signature = format!("sha256={}", generate_hmac_hex(b"payload-a", secret).unwrap());

        assert!(verify_signature(b"payload-b", Some(&signature), secret).is_err());
    }

    #[test]
    fn digest_is_deterministic_hex() {
        let sig1 = generate_hmac_hex(b"payload", "secret").unwrap();
        let sig2 = generate_hmac_hex(b"payload", "secret").unwrap();

        assert_eq!(sig1, sig2);
        assert_eq!(sig1.len(), 64);
    }

    #[test]
    fn timing_safe_eq_handles_lengths() {
        assert!(timing_safe_eq("abc", "abc"));
        assert!(!timing_safe_eq("abc", "abd"));
        assert!(!timing_safe_eq("abc", "abcd"));
    }
}
