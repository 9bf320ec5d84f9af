//! Microsoft Graph API client
//!
//! Bearer-authenticated request executor plus the user lookups. Chat and
//! message operations live in their own managers.

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::graph::scopes;
use crate::error::{GraphApiError, Result, TeamsMcpError};
use crate::graph::chats::ChatManager;
use crate::graph::messages::MessageManager;
use crate::graph::normalize::{self, User};
use crate::graph::token::TokenClaims;
use crate::graph::types::{GraphErrorEnvelope, GraphUser};

/// Microsoft Graph API client bound to one caller's credential
#[derive(Debug, Clone)]
pub struct GraphClient {
    /// HTTP client
    http_client: reqwest::Client,

    /// Graph base URL, no trailing slash
    base_url: String,

    /// Caller-supplied bearer token
    access_token: String,
}

impl GraphClient {
    /// Create a new Graph client
    pub fn new(
        http_client: reqwest::Client,
        base_url: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Result<Self> {
        let access_token = access_token.into().trim().to_string();
        if access_token.is_empty() {
            return Err(TeamsMcpError::Graph(GraphApiError::MissingToken));
        }

        if let Some(claims) = TokenClaims::decode(&access_token) {
            tracing::debug!(
                tenant = claims.tid.as_deref().unwrap_or("-"),
                user = claims.principal().unwrap_or("-"),
                scopes = claims.scp.as_deref().unwrap_or("-"),
                expired = claims.is_expired(),
                "Using Graph access token"
            );
        }

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token,
        })
    }

    /// Graph base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a Graph path (`/me/chats`)
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Accept a caller-supplied `@odata.nextLink` only on our Graph host
    pub fn resolve_next_link(&self, link: &str) -> Result<String> {
        let link = link.trim();
        let prefix = format!("{}/", self.base_url);
        if link.starts_with(&prefix) {
            Ok(link.to_string())
        } else {
            Err(TeamsMcpError::invalid_param(
                "nextLink",
                format!("must start with {}", prefix),
            ))
        }
    }

    /// Chat operations
    pub fn chats(&self) -> ChatManager<'_> {
        ChatManager::new(self)
    }

    /// Message operations
    pub fn messages(&self) -> MessageManager<'_> {
        MessageManager::new(self)
    }

    // ==================== User Operations ====================

    /// The signed-in user
    pub async fn me(&self) -> Result<User> {
        let raw: GraphUser = self.get_json(&self.url("/me"), scopes::USER_READ).await?;
        Ok(normalize::user(raw))
    }

    /// Look up a user by object id or UPN
    pub async fn user(&self, user_id: &str) -> Result<User> {
        let url = self.url(&format!("/users/{}", segment(user_id)));
        let raw: GraphUser = self.get_json(&url, scopes::USER_READ_BASIC_ALL).await?;
        Ok(normalize::user(raw))
    }

    // ==================== Request Execution ====================

    /// GET and decode JSON
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        required_scope: &'static str,
    ) -> Result<T> {
        tracing::debug!("Graph GET {}", url);
        let response = self
            .send(self.http_client.get(url), required_scope)
            .await?;
        Ok(response.json().await?)
    }

    /// POST a JSON body and decode the JSON reply
    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
        required_scope: &'static str,
    ) -> Result<T> {
        tracing::debug!("Graph POST {}", url);
        let response = self
            .send(self.http_client.post(url).json(body), required_scope)
            .await?;
        Ok(response.json().await?)
    }

    async fn send(&self, request: RequestBuilder, required_scope: &'static str) -> Result<Response> {
        let response = request
            .bearer_auth(&self.access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from_response(response, required_scope).await)
        }
    }
}

/// Map a non-2xx Graph response into a typed error
async fn error_from_response(response: Response, required_scope: &'static str) -> TeamsMcpError {
    let status = response.status();
    let retry_after_secs = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());

    let text = response.text().await.unwrap_or_default();
    let envelope: GraphErrorEnvelope = serde_json::from_str(&text).unwrap_or_default();
    let code = envelope.error.code;
    let message = envelope
        .error
        .message
        .filter(|m| !m.is_empty())
        .or_else(|| Some(text.trim().to_string()).filter(|t| !t.is_empty()))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string()
        });

    tracing::warn!(
        status = status.as_u16(),
        code = code.as_deref().unwrap_or("-"),
        "Graph request failed: {}",
        message
    );

    let err = match status {
        StatusCode::UNAUTHORIZED => GraphApiError::Authentication {
            status: status.as_u16(),
            code,
            message,
        },
        StatusCode::FORBIDDEN => GraphApiError::Permission {
            status: status.as_u16(),
            code,
            message,
            required_scope,
        },
        StatusCode::NOT_FOUND => GraphApiError::NotFound {
            status: status.as_u16(),
            code,
            message,
        },
        StatusCode::TOO_MANY_REQUESTS => GraphApiError::RateLimited {
            code,
            message,
            retry_after_secs,
        },
        _ => GraphApiError::Remote {
            status: status.as_u16(),
            code,
            message,
        },
    };

    TeamsMcpError::Graph(err)
}

/// Percent-encode a single path segment
pub(crate) fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GraphClient {
        GraphClient::new(
            reqwest::Client::new(),
            "https://graph.microsoft.com/v1.0/",
            "token",
        )
        .unwrap()
    }

    #[test]
    fn test_empty_token_rejected() {
        let err = GraphClient::new(reqwest::Client::new(), "https://graph.microsoft.com/v1.0", "  ")
            .unwrap_err();
        assert!(matches!(err, TeamsMcpError::Graph(GraphApiError::MissingToken)));
    }

    #[test]
    fn test_url_building() {
        assert_eq!(
            client().url("/me/chats"),
            "https://graph.microsoft.com/v1.0/me/chats"
        );
    }

    #[test]
    fn test_next_link_must_stay_on_graph_host() {
        let c = client();
        assert!(c
            .resolve_next_link("https://graph.microsoft.com/v1.0/me/chats?$skiptoken=a")
            .is_ok());
        assert!(c
            .resolve_next_link("https://evil.example.com/v1.0/me/chats")
            .is_err());
        assert!(c
            .resolve_next_link("https://graph.microsoft.com/v1.0.evil.com/x")
            .is_err());
    }

    #[test]
    fn test_segment_encoding() {
        assert_eq!(segment("19:abc@thread.v2"), "19%3Aabc%40thread.v2");
    }
}
