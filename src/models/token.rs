// src/models/token.rs
//! Header and payload of a compact signed credential token.
//!
//! Both are closed records: known claims are explicit optional fields, so the
//! verifier's required-claim check is exhaustive. A claim present with the
//! wrong JSON type is treated as absent. Payload claims this crate does not
//! interpret are kept in `extra` so callers can still log or display them.

use crate::utils::serialization::{numeric_claim, string_claim};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::collections::BTreeMap;

/// Decoded token header (first segment).
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenHeader {
    /// Algorithm the token claims. Informational only; never used to pick
    /// the verification algorithm.
    #[serde(default, deserialize_with = "string_claim", skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    /// Key identifier selecting one of the issuer's keys
    #[serde(default, deserialize_with = "string_claim", skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    #[serde(default, deserialize_with = "string_claim", skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

/// Decoded token payload (second segment).
///
/// Time claims are seconds since the Unix epoch.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct TokenPayload {
    /// Issuer identifier
    #[serde(default, deserialize_with = "string_claim", skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Subject (holder) identifier
    #[serde(default, deserialize_with = "string_claim", skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Credential identifier, used for revocation lookups
    #[serde(default, deserialize_with = "string_claim", skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,

    #[serde(default, deserialize_with = "numeric_claim", skip_serializing_if = "Option::is_none")]
    pub iat: Option<Number>,

    #[serde(default, deserialize_with = "numeric_claim", skip_serializing_if = "Option::is_none")]
    pub nbf: Option<Number>,

    #[serde(default, deserialize_with = "numeric_claim", skip_serializing_if = "Option::is_none")]
    pub exp: Option<Number>,

    /// Remaining claims (e.g. `vc`), untouched
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wrong_typed_claims_read_as_absent() {
        let payload: TokenPayload = serde_json::from_value(json!({
            "iss": 42,
            "jti": "c1",
            "nbf": "1000",
            "exp": 2000,
            "vc": { "type": ["VerifiableCredential"] }
        }))
        .unwrap();

        assert_eq!(payload.iss, None);
        assert_eq!(payload.jti.as_deref(), Some("c1"));
        assert_eq!(payload.nbf, None);
        assert_eq!(payload.exp, Some(Number::from(2000)));
        assert!(payload.extra.contains_key("vc"));
    }

    #[test]
    fn test_header_ignores_unknown_fields() {
        let header: TokenHeader =
            serde_json::from_value(json!({ "alg": "RS256", "kid": "k1", "x5t": "abc" })).unwrap();
        assert_eq!(header.kid.as_deref(), Some("k1"));
        assert_eq!(header.typ, None);
    }
}
