// src/services/verifier.rs
//! Offline credential verification.
//!
//! Validates a compact signed token (`header.payload.signature`, each segment
//! base64url) against a trust bundle and two revocation sets. Pure and
//! deterministic: no I/O, no clock reads, inputs are never mutated.
//!
//! ## Check order
//! The first failing check wins:
//! 1. Structural decode of the three segments
//! 2. Required claims (`iss`, `kid`, `jti`, `nbf`, `exp`)
//! 3. Validity window, inclusive at both ends
//! 4. Key resolution by exact `(iss, kid)` match
//! 5. Revocation, credential list before key list
//! 6. Signature, under the algorithm the trust bundle registered for the key
//!
//! The token header's `alg` is never consulted for step 6, so relabelling a
//! token cannot move verification onto a weaker or different algorithm.

use crate::errors::{RevocationScope, VerifyErrorKind};
use crate::models::{TokenHeader, TokenPayload, TrustBundle};
use crate::utils::crypto::{decoding_key, verify_signature};
use crate::utils::serialization::decode_segment;
use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Number, Value};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Warning attached to a valid token that is close to its `exp`
pub const EXPIRES_SOON: &str = "expires soon";

/// Result of verifying one token.
///
/// Header and payload are kept on failure whenever they could be decoded, so
/// rejected scans can still be logged and reported.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum VerifyResult {
    Verified {
        header: TokenHeader,
        payload: TokenPayload,
        jti: String,
        warnings: Vec<String>,
    },
    Failed {
        reason: VerifyErrorKind,
        header: Option<TokenHeader>,
        payload: Option<TokenPayload>,
    },
}

impl VerifyResult {
    pub fn is_verified(&self) -> bool {
        matches!(self, VerifyResult::Verified { .. })
    }

    /// Failure reason, `None` for a verified token
    pub fn reason(&self) -> Option<&VerifyErrorKind> {
        match self {
            VerifyResult::Verified { .. } => None,
            VerifyResult::Failed { reason, .. } => Some(reason),
        }
    }

    /// Credential identifier, when the payload carried one
    pub fn jti(&self) -> Option<&str> {
        match self {
            VerifyResult::Verified { jti, .. } => Some(jti),
            VerifyResult::Failed { payload, .. } => payload.as_ref().and_then(|p| p.jti.as_deref()),
        }
    }

    fn failed(reason: VerifyErrorKind, header: Option<TokenHeader>, payload: Option<TokenPayload>) -> Self {
        VerifyResult::Failed {
            reason,
            header,
            payload,
        }
    }
}

/// Soft checks applied to otherwise valid tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifyOptions {
    /// Attach [`EXPIRES_SOON`] when `exp - now` is at most this many seconds
    pub expiry_warning_secs: Option<i64>,
}

/// Verifies `token` at time `now` (Unix seconds).
///
/// # Arguments
/// * `token` - Compact signed token
/// * `trust` - Trust bundle to resolve the signing key from
/// * `revoked_credentials` - Revoked `jti` values
/// * `revoked_keys` - Revoked `kid` values
/// * `now` - Verification time in seconds since the Unix epoch
pub fn verify(
    token: &str,
    trust: &TrustBundle,
    revoked_credentials: &BTreeSet<String>,
    revoked_keys: &BTreeSet<String>,
    now: i64,
) -> VerifyResult {
    verify_with_options(
        token,
        trust,
        revoked_credentials,
        revoked_keys,
        now,
        VerifyOptions::default(),
    )
}

/// [`verify`] with soft checks enabled.
pub fn verify_with_options(
    token: &str,
    trust: &TrustBundle,
    revoked_credentials: &BTreeSet<String>,
    revoked_keys: &BTreeSet<String>,
    now: i64,
    options: VerifyOptions,
) -> VerifyResult {
    // 1. Structure
    let segments: Vec<&str> = token.trim().split('.').collect();
    if segments.len() != 3 {
        return VerifyResult::failed(
            VerifyErrorKind::Format(format!("expected 3 segments, found {}", segments.len())),
            None,
            None,
        );
    }
    let header: TokenHeader = match decode_json(segments[0], "header") {
        Ok(header) => header,
        Err(reason) => return VerifyResult::failed(reason, None, None),
    };
    let payload: TokenPayload = match decode_json(segments[1], "payload") {
        Ok(payload) => payload,
        Err(reason) => return VerifyResult::failed(reason, Some(header), None),
    };

    // 2. Required claims
    let claims = match required_claims(&header, &payload) {
        Ok(claims) => claims,
        Err(reason) => return VerifyResult::failed(reason, Some(header), Some(payload)),
    };

    // 3. Validity window
    if compare_to_claim(now, claims.nbf) == Some(Ordering::Less) {
        return VerifyResult::failed(VerifyErrorKind::NotYetValid, Some(header), Some(payload));
    }
    if compare_to_claim(now, claims.exp) == Some(Ordering::Greater) {
        return VerifyResult::failed(VerifyErrorKind::Expired, Some(header), Some(payload));
    }

    // 4. Key resolution
    let key = match trust.find_key(claims.iss, claims.kid) {
        Some(key) => key,
        None => {
            debug!("No trusted key for iss={} kid={}", claims.iss, claims.kid);
            return VerifyResult::failed(VerifyErrorKind::KeyNotFound, Some(header), Some(payload));
        }
    };

    // 5. Revocation
    let credential_revoked = revoked_credentials.contains(claims.jti);
    let key_revoked = revoked_keys.contains(claims.kid);
    if credential_revoked || key_revoked {
        if credential_revoked && key_revoked {
            debug!("Credential {} and key {} are both revoked", claims.jti, claims.kid);
        }
        let scope = if credential_revoked {
            RevocationScope::Credential
        } else {
            RevocationScope::Key
        };
        return VerifyResult::failed(VerifyErrorKind::Revoked(scope), Some(header), Some(payload));
    }

    // 6. Signature, pinned to the registered algorithm
    let (verifying_key, algorithm) = match decoding_key(key) {
        Ok(Some(rebuilt)) => rebuilt,
        Ok(None) => {
            debug!("Key {} is registered under {}, which cannot be verified", claims.kid, key.alg);
            return VerifyResult::failed(VerifyErrorKind::SignatureInvalid, Some(header), Some(payload));
        }
        Err(e) => {
            // Unusable trust data, not a signature mismatch
            let reason = VerifyErrorKind::Format(format!(
                "trusted key {} of {} is unusable: {e}",
                key.kid, key.issuer_id
            ));
            return VerifyResult::failed(reason, Some(header), Some(payload));
        }
    };
    let signing_input_len = segments[0].len() + 1 + segments[1].len();
    let signing_input = &token.trim()[..signing_input_len];
    if !verify_signature(signing_input.as_bytes(), segments[2], &verifying_key, algorithm) {
        return VerifyResult::failed(VerifyErrorKind::SignatureInvalid, Some(header), Some(payload));
    }

    let mut warnings = Vec::new();
    if let Some(window) = options.expiry_warning_secs {
        if seconds_until(now, claims.exp) <= i128::from(window) {
            warnings.push(EXPIRES_SOON.to_string());
        }
    }

    let jti = claims.jti.to_string();
    VerifyResult::Verified {
        header,
        payload,
        jti,
        warnings,
    }
}

/// Claims every token must carry, borrowed from the decoded records.
struct RequiredClaims<'a> {
    iss: &'a str,
    kid: &'a str,
    jti: &'a str,
    nbf: &'a Number,
    exp: &'a Number,
}

fn required_claims<'a>(header: &'a TokenHeader, payload: &'a TokenPayload) -> Result<RequiredClaims<'a>, VerifyErrorKind> {
    let iss = non_empty(payload.iss.as_deref()).ok_or(VerifyErrorKind::MissingClaim("iss"))?;
    let kid = non_empty(header.kid.as_deref()).ok_or(VerifyErrorKind::MissingClaim("kid"))?;
    let jti = non_empty(payload.jti.as_deref()).ok_or(VerifyErrorKind::MissingClaim("jti"))?;
    let nbf = payload.nbf.as_ref().ok_or(VerifyErrorKind::MissingClaim("nbf"))?;
    let exp = payload.exp.as_ref().ok_or(VerifyErrorKind::MissingClaim("exp"))?;
    Ok(RequiredClaims { iss, kid, jti, nbf, exp })
}

/// Orders `now` against a numeric date claim. Integer claims compare exactly.
fn compare_to_claim(now: i64, claim: &Number) -> Option<Ordering> {
    if let Some(value) = claim.as_i64() {
        return Some(now.cmp(&value));
    }
    if claim.as_u64().is_some() {
        // Larger than any i64
        return Some(Ordering::Less);
    }
    claim.as_f64().and_then(|value| (now as f64).partial_cmp(&value))
}

/// Whole seconds from `now` until `claim`, rounded up.
fn seconds_until(now: i64, claim: &Number) -> i128 {
    if let Some(value) = claim.as_i64() {
        return i128::from(value) - i128::from(now);
    }
    if let Some(value) = claim.as_u64() {
        return i128::from(value) - i128::from(now);
    }
    claim
        .as_f64()
        .map_or(i128::MAX, |value| (value - now as f64).ceil() as i128)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn decode_json<T: DeserializeOwned>(segment: &str, what: &str) -> Result<T, VerifyErrorKind> {
    let bytes = decode_segment(segment)
        .map_err(|e| VerifyErrorKind::Format(format!("{what} is not base64url: {e}")))?;
    let text = std::str::from_utf8(&bytes)
        .map_err(|e| VerifyErrorKind::Format(format!("{what} is not UTF-8: {e}")))?;
    let value: Value = serde_json::from_str(text)
        .map_err(|e| VerifyErrorKind::Format(format!("{what} is not valid JSON: {e}")))?;
    if !value.is_object() {
        return Err(VerifyErrorKind::Format(format!("{what} is not a JSON object")));
    }
    serde_json::from_value(value).map_err(|e| VerifyErrorKind::Format(format!("{what}: {e}")))
}
