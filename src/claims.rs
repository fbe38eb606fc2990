use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;

use crate::error::Error;
use crate::types::Role;

/// Claims read from a session token **without signature verification**.
///
/// This exists for the advisory route guard only: it answers "what does this
/// token claim to be" so logged-out or non-privileged users are redirected away
/// from privileged screens. It is not a security boundary; the API verifies
/// the signature on every actual call.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct TokenClaims {
    /// Subject identity (user ID).
    pub sub: String,
    /// Role claim, compared by the route guard.
    pub role: Role,
    #[serde(default)]
    pub nick: Option<String>,
    /// Expiry as a Unix timestamp. Not enforced here; the API rejects expired
    /// tokens on use.
    #[serde(default)]
    pub exp: Option<i64>,
}

/// Decodes the claims segment of a session token without verifying it.
///
/// Expects the `header.claims.signature` shape and base64url-decodes the middle
/// segment only.
///
/// # Errors
///
/// Returns [`Error::Token`] if the token does not have three segments, the
/// claims segment is not valid base64url, or the claims JSON is missing
/// required fields.
pub fn decode_unverified(token_str: &str) -> Result<TokenClaims, Error> {
    let parts: Vec<&str> = token_str.split('.').collect();
    if parts.len() != 3 {
        return Err(Error::Token("invalid token format".into()));
    }

    let claims_bytes = URL_SAFE_NO_PAD
        .decode(parts[1])
        .map_err(|_| Error::Token("invalid claims encoding".into()))?;

    serde_json::from_slice(&claims_bytes)
        .map_err(|e| Error::Token(format!("invalid claims: {e}")))
}

/// Build a structurally valid token around a claims JSON body. The signature
/// segment is junk, which is the point: decoding must never look at it.
#[cfg(test)]
pub(crate) fn unsigned_token(claims_json: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"EdDSA","typ":"JWT"}"#);
    let claims = URL_SAFE_NO_PAD.encode(claims_json.as_bytes());
    format!("{header}.{claims}.unverified-signature")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_role_and_subject() {
        let token = unsigned_token(r#"{"sub":"u1","role":"admin","nick":"ayse"}"#);
        let claims = decode_unverified(&token).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.role, Role::admin());
        assert_eq!(claims.nick.as_deref(), Some("ayse"));
    }

    #[test]
    fn rejects_wrong_segment_count() {
        assert!(decode_unverified("only-one-segment").is_err());
        assert!(decode_unverified("two.segments").is_err());
        assert!(decode_unverified("a.b.c.d").is_err());
    }

    #[test]
    fn rejects_bad_encoding() {
        let err = decode_unverified("hdr.!!!not-base64!!!.sig").unwrap_err();
        assert!(matches!(err, Error::Token(_)));
    }

    #[test]
    fn rejects_missing_role_claim() {
        let token = unsigned_token(r#"{"sub":"u1"}"#);
        assert!(decode_unverified(&token).is_err());
    }

    #[test]
    fn signature_is_never_inspected() {
        let token = unsigned_token(r#"{"sub":"u1","role":"member"}"#);
        let forged = format!("{}{}", token.trim_end_matches("unverified-signature"), "x");
        assert!(decode_unverified(&forged).is_ok());
    }
}
