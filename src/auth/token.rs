//! Bearer header parsing and the local expiry pre-check.

use base64::{
    engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD},
    Engine,
};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::auth::error::AuthError;

const BEARER_PREFIX: &str = "Bearer ";

/// Claims read from the token payload without verifying the signature.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default, deserialize_with = "lenient_exp")]
    pub exp: Option<f64>,
    #[serde(default)]
    pub email: Option<String>,
}

impl TokenClaims {
    /// `exp` (seconds) scaled to milliseconds and compared against `now_ms`.
    /// Tokens without `exp` are left to the verifier.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        match self.exp {
            Some(exp) => exp * 1000.0 <= now_ms as f64,
            None => false,
        }
    }
}

/// `exp` as a number or a numeric string. Any other value is treated as absent.
fn lenient_exp<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|exp| exp.is_finite()),
        _ => None,
    })
}

/// Token from an `Authorization` header value.
pub fn extract_bearer(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header.ok_or(AuthError::MissingToken)?;
    let token = header
        .strip_prefix(BEARER_PREFIX)
        .map(str::trim)
        .ok_or(AuthError::InvalidFormat)?;

    if token.is_empty() || token.contains(char::is_whitespace) {
        return Err(AuthError::InvalidFormat);
    }
    Ok(token)
}

/// Decode the middle segment of a three-segment token.
pub fn decode_claims(token: &str) -> Result<TokenClaims, AuthError> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => return Err(AuthError::InvalidFormat),
    };

    let payload = payload.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| STANDARD_NO_PAD.decode(payload))
        .map_err(|_| AuthError::InvalidFormat)?;

    serde_json::from_slice(&bytes).map_err(|_| AuthError::InvalidFormat)
}

/// Reject tokens that are unreadable or visibly past their `exp`.
pub fn precheck(token: &str, now_ms: u64) -> Result<TokenClaims, AuthError> {
    let claims = decode_claims(token)?;
    if claims.is_expired_at(now_ms) {
        return Err(AuthError::Expired);
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(payload: &str) -> String {
        format!("eyJhbGciOiJIUzI1NiJ9.{}.sig", URL_SAFE_NO_PAD.encode(payload))
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer(Some("Bearer abc.def.ghi")), Ok("abc.def.ghi"));
        assert_eq!(extract_bearer(None), Err(AuthError::MissingToken));
        assert_eq!(extract_bearer(Some("Basic dXNlcg==")), Err(AuthError::InvalidFormat));
        assert_eq!(extract_bearer(Some("Bearer ")), Err(AuthError::InvalidFormat));
        assert_eq!(extract_bearer(Some("Bearer a b")), Err(AuthError::InvalidFormat));
        assert_eq!(extract_bearer(Some("bearer abc")), Err(AuthError::InvalidFormat));
    }

    #[test]
    fn test_decode_claims() {
        let claims = decode_claims(&token(r#"{"sub":"u1","exp":1700000000}"#)).unwrap();
        assert_eq!(claims.sub.as_deref(), Some("u1"));
        assert_eq!(claims.exp, Some(1_700_000_000.0));
    }

    #[test]
    fn test_decode_accepts_standard_alphabet_with_padding() {
        let payload = STANDARD_NO_PAD.encode(r#"{"sub":"u?>"}"#);
        let claims = decode_claims(&format!("h.{payload}==.s")).unwrap();
        assert_eq!(claims.sub.as_deref(), Some("u?>"));
    }

    #[test]
    fn test_decode_rejects_bad_shapes() {
        assert_eq!(decode_claims("only.two"), Err(AuthError::InvalidFormat));
        assert_eq!(decode_claims("a.b.c.d"), Err(AuthError::InvalidFormat));
        assert_eq!(decode_claims("a.!!!.c"), Err(AuthError::InvalidFormat));
        assert_eq!(decode_claims(&token("not json")), Err(AuthError::InvalidFormat));
    }

    #[test]
    fn test_expiry_boundary() {
        let tok = token(r#"{"sub":"u1","exp":1700000000}"#);
        assert_eq!(precheck(&tok, 1_700_000_000_000), Err(AuthError::Expired));
        assert!(precheck(&tok, 1_699_999_999_999).is_ok());
    }

    #[test]
    fn test_string_exp_is_checked() {
        let tok = token(r#"{"sub":"u1","exp":"1699999999"}"#);
        assert_eq!(precheck(&tok, 1_700_000_000_000), Err(AuthError::Expired));

        let live = token(r#"{"sub":"u1","exp":" 1700003600 "}"#);
        assert_eq!(precheck(&live, 1_700_000_000_000).unwrap().exp, Some(1_700_003_600.0));

        let unreadable = token(r#"{"sub":"u1","exp":"tomorrow"}"#);
        assert_eq!(precheck(&unreadable, 1_700_000_000_000).unwrap().exp, None);
        assert_eq!(decode_claims(&token(r#"{"exp":null}"#)).unwrap().exp, None);
    }

    #[test]
    fn test_missing_exp_passes() {
        assert!(precheck(&token(r#"{"sub":"u1"}"#), u64::MAX).is_ok());
    }
}
