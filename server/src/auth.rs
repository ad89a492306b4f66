//! Shared-secret bearer authentication for the refresh trigger.

use axum::http::{header, HeaderMap};
use sha2::{Digest, Sha256};

/// Token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Compare the presented token with `secret` through fixed-length digests.
pub fn verify_bearer(headers: &HeaderMap, secret: &str) -> bool {
    let Some(token) = bearer_token(headers) else {
        return false;
    };

    let presented = Sha256::digest(token.as_bytes());
    let expected = Sha256::digest(secret.as_bytes());

    presented
        .iter()
        .zip(expected.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
