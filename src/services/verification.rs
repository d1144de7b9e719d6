// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Signed email-verification tokens.
//!
//! Token format: base64url("uid|expiry_hex|signature_hex"), where the
//! signature is HMAC-SHA256 over "uid|expiry_hex".

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Verification links are valid for 24 hours.
pub const TOKEN_LIFETIME_SECS: i64 = 24 * 60 * 60;

/// Create a verification token for `uid`, valid from `now` (unix seconds).
pub fn create_token(uid: &str, secret: &[u8], now: i64) -> Option<String> {
    let expiry = now + TOKEN_LIFETIME_SECS;
    let payload = format!("{}|{:x}", uid, expiry);
    let signature = sign(&payload, secret)?;
    Some(URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, signature)))
}

/// Verify a token and return the uid it was issued for.
///
/// Returns `None` for malformed, forged, or expired tokens.
pub fn verify_token(token: &str, secret: &[u8], now: i64) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(token).ok()?;
    let decoded = String::from_utf8(bytes).ok()?;

    // uid never contains '|', so split from the right
    let mut parts = decoded.rsplitn(3, '|');
    let signature_hex = parts.next()?;
    let expiry_hex = parts.next()?;
    let uid = parts.next()?;
    if uid.is_empty() {
        return None;
    }

    let payload = format!("{}|{}", uid, expiry_hex);
    let expected = sign(&payload, secret)?;
    if !bool::from(expected.as_bytes().ct_eq(signature_hex.as_bytes())) {
        tracing::warn!("Email verification token signature mismatch");
        return None;
    }

    let expiry = i64::from_str_radix(expiry_hex, 16).ok()?;
    if now > expiry {
        tracing::info!(uid, "Email verification token expired");
        return None;
    }

    Some(uid.to_string())
}

fn sign(payload: &str, secret: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload.as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test_email_token_key";
    const NOW: i64 = 1_700_000_000;

    #[test]
    fn test_valid_token_returns_uid() {
        let token = create_token("user-1", SECRET, NOW).unwrap();
        assert_eq!(verify_token(&token, SECRET, NOW + 60).as_deref(), Some("user-1"));
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = create_token("user-1", SECRET, NOW).unwrap();
        assert!(verify_token(&token, SECRET, NOW + TOKEN_LIFETIME_SECS + 1).is_none());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = create_token("user-1", SECRET, NOW).unwrap();
        assert!(verify_token(&token, b"other_secret", NOW).is_none());
    }

    #[test]
    fn test_tampered_uid_rejected() {
        let token = create_token("user-1", SECRET, NOW).unwrap();
        let decoded = String::from_utf8(URL_SAFE_NO_PAD.decode(&token).unwrap()).unwrap();
        let forged = URL_SAFE_NO_PAD.encode(decoded.replacen("user-1", "user-2", 1));
        assert!(verify_token(&forged, SECRET, NOW).is_none());
    }

    #[test]
    fn test_malformed_rejected() {
        assert!(verify_token("not base64!!", SECRET, NOW).is_none());
        assert!(verify_token(&URL_SAFE_NO_PAD.encode("only|two"), SECRET, NOW).is_none());
    }
}
