// src/models/trust.rs
//! Trust material downloaded from the synchronization authority.
//!
//! These records are what an offline device keeps between syncs:
//! - `TrustBundle`: the issuer signing keys the device accepts
//! - `RevocationList`: credential identifiers (`jti`) that must be rejected
//! - `RevokedKeySet`: signing key identifiers (`kid`) that must be rejected
//!
//! Field names on the wire are camelCase, matching what the authority serves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Signature algorithm registered for an issuer key.
///
/// Verification always uses the algorithm recorded here, never the one a
/// token claims in its own header.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alg {
    RS256,
    ES256,
    /// Any algorithm this device cannot verify. Kept so a single unknown
    /// entry does not invalidate the whole bundle.
    #[serde(other)]
    Unsupported,
}

impl fmt::Display for Alg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Alg::RS256 => f.write_str("RS256"),
            Alg::ES256 => f.write_str("ES256"),
            Alg::Unsupported => f.write_str("unsupported"),
        }
    }
}

/// A single trusted signing key.
///
/// # Fields
/// - `issuer_id`: identifier of the issuing entity, matched against `iss`
/// - `kid`: key identifier, matched against the token header's `kid`
/// - `alg`: algorithm the authority registered for this key
/// - `public_key_pem`: SPKI PEM encoding of the public key
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TrustBundleItem {
    /// Example: "did:example:issuer"
    pub issuer_id: String,
    pub kid: String,
    pub alg: Alg,
    pub public_key_pem: String,
}

/// Versioned set of issuer keys a device trusts.
///
/// `(issuer_id, kid)` pairs are unique within a bundle; lookups match both
/// fields exactly.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TrustBundle {
    pub version: i64,
    pub issued_at: DateTime<Utc>,
    #[serde(default)]
    pub issuers: Vec<TrustBundleItem>,
}

impl TrustBundle {
    /// Finds the key registered for `issuer_id` under `kid`.
    pub fn find_key(&self, issuer_id: &str, kid: &str) -> Option<&TrustBundleItem> {
        self.issuers
            .iter()
            .find(|item| item.issuer_id == issuer_id && item.kid == kid)
    }

    /// Returns `true` if no `(issuer_id, kid)` pair appears twice.
    pub fn has_unique_keys(&self) -> bool {
        let mut seen = BTreeSet::new();
        self.issuers
            .iter()
            .all(|item| seen.insert((item.issuer_id.as_str(), item.kid.as_str())))
    }
}

/// Revoked credential identifiers as of `issued_at`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RevocationList {
    pub version: i64,
    pub issued_at: DateTime<Utc>,
    #[serde(default)]
    pub revoked_jti: BTreeSet<String>,
}

/// Revoked signing key identifiers, checked independently of `RevocationList`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RevokedKeySet {
    #[serde(default)]
    pub revoked_kids: BTreeSet<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(issuer_id: &str, kid: &str) -> TrustBundleItem {
        TrustBundleItem {
            issuer_id: issuer_id.to_string(),
            kid: kid.to_string(),
            alg: Alg::RS256,
            public_key_pem: String::new(),
        }
    }

    #[test]
    fn test_find_key_matches_both_fields() {
        let bundle = TrustBundle {
            version: 2,
            issued_at: Utc::now(),
            issuers: vec![item("did:x", "k1"), item("did:y", "k2")],
        };

        assert!(bundle.find_key("did:x", "k1").is_some());
        // Same kid under another issuer must not resolve
        assert!(bundle.find_key("did:y", "k1").is_none());
        assert!(bundle.find_key("did:x", "k2").is_none());
    }

    #[test]
    fn test_duplicate_pairs_detected() {
        let bundle = TrustBundle {
            version: 1,
            issued_at: Utc::now(),
            issuers: vec![item("did:x", "k1"), item("did:x", "k1")],
        };
        assert!(!bundle.has_unique_keys());
    }

    #[test]
    fn test_bundle_parses_authority_json() {
        let raw = json!({
            "version": 3,
            "issuedAt": "2025-01-01T00:00:00Z",
            "issuers": [
                { "issuerId": "did:x", "kid": "k1", "alg": "ES256", "publicKeyPem": "pem" },
                { "issuerId": "did:x", "kid": "k2", "alg": "EdDSA", "publicKeyPem": "pem" }
            ]
        });

        let bundle: TrustBundle = serde_json::from_value(raw).unwrap();
        assert_eq!(bundle.version, 3);
        assert_eq!(bundle.issuers[0].alg, Alg::ES256);
        // Unknown algorithms survive parsing but can never verify
        assert_eq!(bundle.issuers[1].alg, Alg::Unsupported);
    }

    #[test]
    fn test_revocation_list_field_names() {
        let raw = json!({
            "version": 1,
            "issuedAt": "2025-01-01T00:00:00Z",
            "revokedJti": ["c1", "c2"]
        });
        let list: RevocationList = serde_json::from_value(raw).unwrap();
        assert!(list.revoked_jti.contains("c1"));

        let keys: RevokedKeySet = serde_json::from_value(json!({ "revokedKids": ["k9"] })).unwrap();
        assert!(keys.revoked_kids.contains("k9"));
    }
}
