//! JWT claim inspection for manually-provided FedAuth tokens.
//!
//! This does not validate a token's signature (the server does that); it
//! only decodes the unsigned payload segment so a caller can answer "is
//! this token expired, and for what audience", the same way
//! [`crate::azure_ad::AzureAdAuth`] tracks expiry for tokens it acquires
//! itself via `expires_at`.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

use crate::error::AuthError;

/// Claims read out of a JWT's payload segment.
///
/// Only the claims the driver needs to make expiry/routing decisions are
/// kept; anything else in the payload is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtClaims {
    /// Expiration time, as seconds since the Unix epoch (`exp` claim).
    pub exp: Option<u64>,
    /// Intended audience (`aud` claim). Azure AD tokens for Azure SQL carry
    /// `https://database.windows.net/` here.
    pub aud: Option<String>,
    /// Token issuer (`iss` claim).
    pub iss: Option<String>,
}

impl JwtClaims {
    /// Decode the claims from a compact JWT (`header.payload.signature`).
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] if the token isn't
    /// structured as three dot-separated segments, if the payload segment
    /// isn't valid base64url, or if the decoded bytes aren't a JSON object.
    pub fn decode(token: &str) -> Result<Self, AuthError> {
        let mut parts = token.split('.');
        let _header = parts
            .next()
            .ok_or_else(|| AuthError::InvalidCredentials("JWT missing header segment".into()))?;
        let payload = parts
            .next()
            .ok_or_else(|| AuthError::InvalidCredentials("JWT missing payload segment".into()))?;
        if parts.next().is_none() {
            return Err(AuthError::InvalidCredentials(
                "JWT missing signature segment".into(),
            ));
        }

        let decoded = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|e| AuthError::InvalidCredentials(format!("JWT payload not base64url: {e}")))?;

        serde_json::from_slice(&decoded)
            .map_err(|e| AuthError::InvalidCredentials(format!("JWT payload not valid JSON: {e}")))
    }

    /// Whether the token has already expired, per its `exp` claim.
    ///
    /// A token with no `exp` claim is treated as non-expiring (returns
    /// `false`) since the driver has no basis to judge it.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        let Some(exp) = self.exp else {
            return false;
        };
        now_unix_secs() >= exp
    }

    /// Whether the token will expire within `within` of now.
    #[must_use]
    pub fn is_expiring_soon(&self, within: Duration) -> bool {
        let Some(exp) = self.exp else {
            return false;
        };
        now_unix_secs() + within.as_secs() >= exp
    }

    /// Whether this token's `aud` claim matches `expected` exactly.
    ///
    /// Azure AD audiences are typically a resource URI
    /// (`https://database.windows.net/`); callers should pass the exact
    /// expected value, trailing slash included.
    #[must_use]
    pub fn audience_matches(&self, expected: &str) -> bool {
        self.aud.as_deref() == Some(expected)
    }
}

fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn make_token(payload_json: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(b"{\"alg\":\"none\"}");
        let payload = URL_SAFE_NO_PAD.encode(payload_json.as_bytes());
        format!("{header}.{payload}.sig")
    }

    #[test]
    fn test_decode_valid_token() {
        let token = make_token(r#"{"exp":9999999999,"aud":"https://database.windows.net/","iss":"https://sts.windows.net/tenant/"}"#);
        let claims = JwtClaims::decode(&token).unwrap();
        assert_eq!(claims.exp, Some(9999999999));
        assert_eq!(claims.aud.as_deref(), Some("https://database.windows.net/"));
    }

    #[test]
    fn test_decode_missing_segments() {
        assert!(JwtClaims::decode("onlyheader").is_err());
        assert!(JwtClaims::decode("header.payload").is_err());
    }

    #[test]
    fn test_decode_invalid_base64() {
        assert!(JwtClaims::decode("header.not!base64url.sig").is_err());
    }

    #[test]
    fn test_is_expired_past() {
        let token = make_token(r#"{"exp":1}"#);
        let claims = JwtClaims::decode(&token).unwrap();
        assert!(claims.is_expired());
    }

    #[test]
    fn test_is_expired_future() {
        let token = make_token(r#"{"exp":9999999999}"#);
        let claims = JwtClaims::decode(&token).unwrap();
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_no_exp_claim_treated_as_non_expiring() {
        let token = make_token(r#"{"aud":"https://database.windows.net/"}"#);
        let claims = JwtClaims::decode(&token).unwrap();
        assert!(!claims.is_expired());
        assert!(!claims.is_expiring_soon(Duration::from_secs(3600)));
    }

    #[test]
    fn test_audience_matches() {
        let token = make_token(r#"{"aud":"https://database.windows.net/"}"#);
        let claims = JwtClaims::decode(&token).unwrap();
        assert!(claims.audience_matches("https://database.windows.net/"));
        assert!(!claims.audience_matches("https://other.example/"));
    }
}
