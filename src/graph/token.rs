//! Access token introspection
//!
//! Decodes the JWT payload of a Graph token for logging and the `token-info`
//! command. The signature is not checked and the claims never influence a
//! request; Graph validates the token.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};

/// Claims of interest in an Entra ID access token
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenClaims {
    /// Audience
    pub aud: Option<String>,
    /// Tenant id
    pub tid: Option<String>,
    /// User object id
    pub oid: Option<String>,
    /// User principal name
    pub upn: Option<String>,
    pub preferred_username: Option<String>,
    pub name: Option<String>,
    /// Space-separated delegated scopes
    pub scp: Option<String>,
    /// Application roles
    pub roles: Option<Vec<String>>,
    /// Expiry (Unix seconds)
    pub exp: Option<i64>,
}

impl TokenClaims {
    /// Decode the payload segment; `None` for opaque or malformed tokens
    pub fn decode(token: &str) -> Option<Self> {
        let payload = token.split('.').nth(1)?;
        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Delegated scopes as a list
    pub fn scopes(&self) -> Vec<&str> {
        self.scp
            .as_deref()
            .map(|s| s.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Best available name for the signed-in principal
    pub fn principal(&self) -> Option<&str> {
        self.upn
            .as_deref()
            .or(self.preferred_username.as_deref())
            .or(self.oid.as_deref())
    }

    /// Whether `exp` is in the past
    pub fn is_expired(&self) -> bool {
        self.exp
            .map(|exp| exp <= chrono::Utc::now().timestamp())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_token(claims: serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes());
        format!("{}.{}.sig", header, payload)
    }

    #[test]
    fn test_decode_claims() {
        let token = make_token(serde_json::json!({
            "tid": "tenant-1",
            "upn": "ada@example.com",
            "scp": "Chat.ReadBasic ChatMessage.Send User.Read",
            "exp": 4102444800i64
        }));

        let claims = TokenClaims::decode(&token).unwrap();
        assert_eq!(claims.tid.as_deref(), Some("tenant-1"));
        assert_eq!(claims.principal(), Some("ada@example.com"));
        assert_eq!(
            claims.scopes(),
            vec!["Chat.ReadBasic", "ChatMessage.Send", "User.Read"]
        );
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_opaque_token_yields_none() {
        assert!(TokenClaims::decode("opaque-token").is_none());
        assert!(TokenClaims::decode("a.!!!.c").is_none());
    }

    #[test]
    fn test_expired_token() {
        let token = make_token(serde_json::json!({"exp": 1}));
        assert!(TokenClaims::decode(&token).unwrap().is_expired());
    }
}
