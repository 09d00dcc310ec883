use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted clock skew between the platform's timestamp header and
/// the local clock. Requests older than this are replay candidates.
const DEFAULT_TOLERANCE_SECS: i64 = 300;

pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("timestamp header is not a unix timestamp")]
    InvalidTimestamp,
    #[error("request timestamp is outside the accepted window")]
    StaleTimestamp,
    #[error("signature header is not a v0 hex signature")]
    MalformedSignature,
    #[error("signature does not match the request body")]
    Mismatch,
}

/// Verifies the platform's `v0=`-prefixed HMAC-SHA256 signature over
/// `"v0:{timestamp}:{raw_body}"`.
pub struct SignatureVerifier {
    signing_secret: SecretString,
    tolerance_secs: i64,
}

impl SignatureVerifier {
    pub fn new(signing_secret: SecretString) -> Self {
        Self { signing_secret, tolerance_secs: DEFAULT_TOLERANCE_SECS }
    }

    pub fn verify(
        &self,
        timestamp: &str,
        body: &[u8],
        signature_header: &str,
    ) -> Result<(), SignatureError> {
        self.verify_at(unix_now(), timestamp, body, signature_header)
    }

    pub fn verify_at(
        &self,
        now_unix: i64,
        timestamp: &str,
        body: &[u8],
        signature_header: &str,
    ) -> Result<(), SignatureError> {
        let parsed_timestamp: i64 =
            timestamp.trim().parse().map_err(|_| SignatureError::InvalidTimestamp)?;
        if (now_unix - parsed_timestamp).abs() > self.tolerance_secs {
            return Err(SignatureError::StaleTimestamp);
        }

        let provided = signature_header
            .strip_prefix("v0=")
            .and_then(decode_hex)
            .ok_or(SignatureError::MalformedSignature)?;

        let mut mac = HmacSha256::new_from_slice(self.signing_secret.expose_secret().as_bytes())
            .map_err(|_| SignatureError::MalformedSignature)?;
        mac.update(b"v0:");
        mac.update(timestamp.trim().as_bytes());
        mac.update(b":");
        mac.update(body);

        mac.verify_slice(&provided).map_err(|_| SignatureError::Mismatch)
    }
}

/// Hex-encode a computed signature into header form; used by tests and any
/// outbound-callback signing.
pub fn sign(signing_secret: &str, timestamp: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(signing_secret.as_bytes())
        .expect("hmac accepts any key length");
    mac.update(b"v0:");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);

    let digest = mac.finalize().into_bytes();
    let mut rendered = String::with_capacity(3 + digest.len() * 2);
    rendered.push_str("v0=");
    for byte in digest {
        rendered.push_str(&format!("{byte:02x}"));
    }
    rendered
}

fn decode_hex(input: &str) -> Option<Vec<u8>> {
    if input.len() % 2 != 0 {
        return None;
    }
    (0..input.len())
        .step_by(2)
        .map(|index| u8::from_str_radix(input.get(index..index + 2)?, 16).ok())
        .collect()
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::{sign, SignatureError, SignatureVerifier};

    const SECRET: &str = "8f742231b10e8888abcd99yyyzzz85a5";
    const NOW: i64 = 1_720_000_000;

    fn verifier() -> SignatureVerifier {
        SignatureVerifier::new(SECRET.to_owned().into())
    }

    #[test]
    fn well_formed_signature_verifies() {
        let timestamp = NOW.to_string();
        let body = br#"{"type":"event_callback"}"#;
        let header = sign(SECRET, &timestamp, body);

        assert_eq!(verifier().verify_at(NOW, &timestamp, body, &header), Ok(()));
    }

    #[test]
    fn tampered_body_fails_even_with_well_formed_headers() {
        let timestamp = NOW.to_string();
        let header = sign(SECRET, &timestamp, br#"{"type":"event_callback"}"#);

        let result =
            verifier().verify_at(NOW, &timestamp, br#"{"type":"tampered"}"#, &header);
        assert_eq!(result, Err(SignatureError::Mismatch));
    }

    #[test]
    fn stale_timestamp_is_rejected_before_mac_comparison() {
        let old = (NOW - 10_000).to_string();
        let body = b"{}";
        let header = sign(SECRET, &old, body);

        assert_eq!(verifier().verify_at(NOW, &old, body, &header), Err(SignatureError::StaleTimestamp));
    }

    #[test]
    fn non_numeric_timestamp_is_rejected() {
        let result = verifier().verify_at(NOW, "yesterday", b"{}", "v0=00");
        assert_eq!(result, Err(SignatureError::InvalidTimestamp));
    }

    #[test]
    fn signature_without_version_prefix_is_malformed() {
        let timestamp = NOW.to_string();
        let result = verifier().verify_at(NOW, &timestamp, b"{}", "deadbeef");
        assert_eq!(result, Err(SignatureError::MalformedSignature));
    }

    #[test]
    fn odd_length_hex_is_malformed() {
        let timestamp = NOW.to_string();
        let result = verifier().verify_at(NOW, &timestamp, b"{}", "v0=abc");
        assert_eq!(result, Err(SignatureError::MalformedSignature));
    }
}
