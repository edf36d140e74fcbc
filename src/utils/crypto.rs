// src/utils/crypto.rs
//! Signature primitives for compact tokens.
//!
//! Public keys are rebuilt from the PEM stored in the trust bundle and used
//! under the algorithm registered alongside them.

use crate::models::{Alg, TrustBundleItem};
use jsonwebtoken::errors::Result;
use jsonwebtoken::{crypto, Algorithm, DecodingKey};

/// Maps a registered algorithm onto the `jsonwebtoken` algorithm used to verify it.
pub fn jws_algorithm(alg: Alg) -> Option<Algorithm> {
    match alg {
        Alg::RS256 => Some(Algorithm::RS256),
        Alg::ES256 => Some(Algorithm::ES256),
        Alg::Unsupported => None,
    }
}

/// Rebuilds the public key of a trust bundle entry.
///
/// # Returns
/// - `Ok(Some((key, algorithm)))` ready for [`verify_signature`]
/// - `Ok(None)` if the registered algorithm cannot be verified here
/// - `Err` if the stored PEM does not hold a key of the registered type
pub fn decoding_key(item: &TrustBundleItem) -> Result<Option<(DecodingKey, Algorithm)>> {
    let Some(algorithm) = jws_algorithm(item.alg) else {
        return Ok(None);
    };
    let pem = item.public_key_pem.as_bytes();
    let key = match item.alg {
        Alg::ES256 => DecodingKey::from_ec_pem(pem)?,
        _ => DecodingKey::from_rsa_pem(pem)?,
    };
    Ok(Some((key, algorithm)))
}

/// Verifies `signature` (base64url) over `signing_input`.
///
/// A signature that does not decode counts as a mismatch.
pub fn verify_signature(signing_input: &[u8], signature: &str, key: &DecodingKey, algorithm: Algorithm) -> bool {
    crypto::verify(signature, signing_input, key, algorithm).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSA_PUBLIC: &str = include_str!("../../tests/fixtures/rsa_public.pem");
    const EC_PUBLIC: &str = include_str!("../../tests/fixtures/ec_public.pem");

    fn item(alg: Alg, pem: &str) -> TrustBundleItem {
        TrustBundleItem {
            issuer_id: "did:x".into(),
            kid: "k1".into(),
            alg,
            public_key_pem: pem.into(),
        }
    }

    #[test]
    fn test_registered_keys_rebuild() {
        let (_, alg) = decoding_key(&item(Alg::RS256, RSA_PUBLIC)).unwrap().unwrap();
        assert_eq!(alg, Algorithm::RS256);
        let (_, alg) = decoding_key(&item(Alg::ES256, EC_PUBLIC)).unwrap().unwrap();
        assert_eq!(alg, Algorithm::ES256);
    }

    #[test]
    fn test_unsupported_alg_has_no_key() {
        assert!(decoding_key(&item(Alg::Unsupported, RSA_PUBLIC)).unwrap().is_none());
    }

    #[test]
    fn test_garbage_pem_is_an_error() {
        assert!(decoding_key(&item(Alg::RS256, "not a pem")).is_err());
        assert!(decoding_key(&item(Alg::ES256, "")).is_err());
    }

    #[test]
    fn test_undecodable_signature_is_a_mismatch() {
        let (key, alg) = decoding_key(&item(Alg::RS256, RSA_PUBLIC)).unwrap().unwrap();
        assert!(!verify_signature(b"a.b", "!!!", &key, alg));
    }
}
