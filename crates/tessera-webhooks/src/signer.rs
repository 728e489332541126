//! HMAC-SHA256 request signing, mirroring the `X-Tessera-Signature` header
//! the receiving end is expected to verify.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Hex-encoded HMAC-SHA256 of `payload` under `secret`.
pub fn sign_payload(payload: &str, secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// The full header value, e.g. `sha256=<hex>`.
pub fn signature_header(payload: &str, secret: &str) -> String {
    format!("sha256={}", sign_payload(payload, secret))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_input_is_deterministic() {
        let a = sign_payload("{\"hello\":true}", "secret");
        let b = sign_payload("{\"hello\":true}", "secret");
        assert_eq!(a, b);
    }

    #[test]
    fn different_secrets_produce_different_signatures() {
        let a = sign_payload("payload", "secret-a");
        let b = sign_payload("payload", "secret-b");
        assert_ne!(a, b);
    }

    #[test]
    fn header_has_sha256_prefix() {
        assert!(signature_header("p", "s").starts_with("sha256="));
    }
}
