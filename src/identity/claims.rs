//! Unverified decoding of provider-issued token payloads.
//!
//! Signatures are not checked: the id token arrives straight from the
//! token endpoint over TLS and is only used for display and session keys.

use base64::{Engine as _, engine::general_purpose};
use jsonwebtoken::{DecodingKey, Validation};
use serde::Deserialize;

use crate::error::AppError;

/// Claims read from the id token
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct IdTokenClaims {
    pub sub: Option<String>,
    pub oid: Option<String>,
    pub tid: Option<String>,
    pub preferred_username: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// `client_info` blob returned when `client_info=1` is requested
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientInfo {
    pub uid: String,
    pub utid: String,
}

impl ClientInfo {
    pub fn home_account_id(&self) -> String {
        format!("{}.{}", self.uid, self.utid)
    }
}

/// Decode the claims of a compact JWT
///
/// The header must parse as a JOSE header; the signature and the
/// registered claims (`exp`, `aud`, ...) are not checked.
pub fn decode_id_token(token: &str) -> Result<IdTokenClaims, AppError> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    jsonwebtoken::decode::<IdTokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| AppError::IdentityProvider(format!("id_token: {e}")))
}

/// Decode the base64url `client_info` value
pub fn decode_client_info(raw: &str) -> Result<ClientInfo, AppError> {
    let decoded = general_purpose::URL_SAFE_NO_PAD
        .decode(raw.trim_end_matches('='))
        .map_err(anyhow::Error::from)
        .and_then(|bytes| serde_json::from_slice(&bytes).map_err(anyhow::Error::from));

    decoded.map_err(|e| AppError::IdentityProvider(format!("client_info: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(json: &str) -> String {
        general_purpose::URL_SAFE_NO_PAD.encode(json)
    }

    #[test]
    fn decodes_claims_from_jwt_payload() {
        let token = format!(
            "{}.{}.signature",
            encode(r#"{"alg":"RS256"}"#),
            encode(r#"{"oid":"00000000-0000-0000-0001","tid":"9188040d","preferred_username":"ada@example.com","name":"Ada"}"#)
        );

        let claims = decode_id_token(&token).unwrap();
        assert_eq!(claims.oid.as_deref(), Some("00000000-0000-0000-0001"));
        assert_eq!(claims.preferred_username.as_deref(), Some("ada@example.com"));
        assert_eq!(claims.name.as_deref(), Some("Ada"));
        assert_eq!(claims.sub, None);
    }

    #[test]
    fn rejects_tokens_without_three_segments() {
        assert!(decode_id_token("not-a-jwt").is_err());
        assert!(decode_id_token("a.b.c.d").is_err());
    }

    #[test]
    fn rejects_undecodable_payload() {
        let token = format!("{}.%%%.sig", encode(r#"{"alg":"RS256"}"#));
        assert!(matches!(
            decode_id_token(&token),
            Err(AppError::IdentityProvider(_))
        ));
    }

    #[test]
    fn rejects_tokens_with_unparseable_header() {
        let token = format!("!!!not-a-header!!!.{}.", encode(r#"{"sub":"x"}"#));
        assert!(matches!(
            decode_id_token(&token),
            Err(AppError::IdentityProvider(_))
        ));

        let token = format!("{}.{}.", encode(r#"{"typ":"JWT"}"#), encode(r#"{"sub":"x"}"#));
        assert!(decode_id_token(&token).is_err());
    }

    #[test]
    fn ignores_expiry_and_audience() {
        let token = format!(
            "{}.{}.sig",
            encode(r#"{"alg":"RS256","typ":"JWT"}"#),
            encode(r#"{"sub":"x","exp":1,"aud":"someone-else"}"#)
        );

        let claims = decode_id_token(&token).unwrap();
        assert_eq!(claims.sub.as_deref(), Some("x"));
    }

    #[test]
    fn client_info_tolerates_padding() {
        let raw = general_purpose::URL_SAFE.encode(r#"{"uid":"u1","utid":"t1"}"#);
        let info = decode_client_info(&raw).unwrap();
        assert_eq!(info.home_account_id(), "u1.t1");
    }
}
