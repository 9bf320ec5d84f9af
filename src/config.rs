//! Configuration management for the Teams Chat MCP Server
//!
//! Handles environment variables and the per-deployment service knobs.

use std::time::Duration;

use crate::error::{ConfigError, Result, TeamsMcpError};
use crate::graph::types::MemberRole;

/// Configuration for the Teams Chat MCP Server
#[derive(Debug, Clone)]
pub struct Config {
    /// Microsoft Graph base URL (no trailing slash)
    pub graph_base_url: String,

    /// Access token used when a tool call does not carry its own
    pub access_token: Option<String>,

    /// Optional per-request timeout for Graph calls
    pub request_timeout: Option<Duration>,

    /// Listing defaults and other service variations
    pub service: ServiceConfig,
}

/// Knobs that differ between deployments of the chat service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Default `$top` for chat listing
    pub chat_page_size: u32,

    /// Default `$top` for message listing
    pub message_page_size: u32,

    /// Relationships expanded on chat listing
    pub chat_expand: Vec<String>,

    /// How many chats the recent-messages aggregation visits
    pub recent_chat_limit: u32,

    /// Messages fetched per chat during aggregation
    pub recent_messages_per_chat: u32,

    /// Role given to create-chat members that do not specify one
    pub default_member_role: MemberRole,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            chat_page_size: graph::DEFAULT_PAGE_SIZE,
            message_page_size: graph::DEFAULT_PAGE_SIZE,
            chat_expand: vec!["members".to_string(), "lastMessagePreview".to_string()],
            recent_chat_limit: 20,
            recent_messages_per_chat: 10,
            default_member_role: MemberRole::Owner,
        }
    }
}

impl Config {
    /// Create a new configuration from the environment
    pub fn new() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("GRAPH_API_BASE_URL") {
            config.graph_base_url = normalize_base_url(&url)?;
        }

        config.access_token = std::env::var("GRAPH_ACCESS_TOKEN")
            .or_else(|_| std::env::var("MS_GRAPH_ACCESS_TOKEN"))
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        if let Some(secs) = env_number("GRAPH_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Some(Duration::from_secs(secs as u64));
        }

        if let Some(size) = env_number("TEAMS_MCP_CHAT_PAGE_SIZE")? {
            config.service.chat_page_size = size.clamp(1, graph::MAX_CHAT_PAGE_SIZE);
        }

        if let Some(size) = env_number("TEAMS_MCP_MESSAGE_PAGE_SIZE")? {
            config.service.message_page_size = size.clamp(1, graph::MAX_MESSAGE_PAGE_SIZE);
        }

        if let Ok(expand) = std::env::var("TEAMS_MCP_CHAT_EXPAND") {
            config.service.chat_expand = expand
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(role) = std::env::var("TEAMS_MCP_DEFAULT_MEMBER_ROLE") {
            config.service.default_member_role = match role.trim() {
                "owner" => MemberRole::Owner,
                "guest" => MemberRole::Guest,
                other => {
                    return Err(TeamsMcpError::Config(ConfigError::InvalidEnvVar {
                        var: "TEAMS_MCP_DEFAULT_MEMBER_ROLE".to_string(),
                        message: format!("expected 'owner' or 'guest', got '{}'", other),
                    }))
                }
            };
        }

        Ok(config)
    }

    /// Point the configuration at another Graph host (tests, national clouds)
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        self.graph_base_url = normalize_base_url(base_url)?;
        Ok(self)
    }

    /// Set the fallback access token
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            graph_base_url: graph::API_BASE_URL.to_string(),
            access_token: None,
            request_timeout: None,
            service: ServiceConfig::default(),
        }
    }
}

fn env_number(var: &str) -> Result<Option<u32>> {
    match std::env::var(var) {
        Ok(value) => value.trim().parse::<u32>().map(Some).map_err(|e| {
            TeamsMcpError::Config(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                message: e.to_string(),
            })
        }),
        Err(_) => Ok(None),
    }
}

fn normalize_base_url(url: &str) -> Result<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if !(trimmed.starts_with("https://") || trimmed.starts_with("http://")) {
        return Err(TeamsMcpError::Config(ConfigError::InvalidConfig {
            message: format!("Graph base URL must be absolute: '{}'", url),
        }));
    }
    Ok(trimmed.to_string())
}

/// Microsoft Graph constants
pub mod graph {
    /// Base URL for Microsoft Graph v1.0
    pub const API_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

    /// Default page size when the caller does not ask for one
    pub const DEFAULT_PAGE_SIZE: u32 = 50;

    /// `/me/chats` refuses anything above this
    pub const MAX_CHAT_PAGE_SIZE: u32 = 50;

    /// Upper bound accepted for message listing
    pub const MAX_MESSAGE_PAGE_SIZE: u32 = 1000;

    /// Delegated permissions each operation needs
    pub mod scopes {
        pub const CHAT_READ_BASIC: &str = "Chat.ReadBasic";
        pub const CHAT_READ: &str = "Chat.Read";
        pub const CHAT_CREATE: &str = "Chat.Create";
        pub const CHAT_MESSAGE_SEND: &str = "ChatMessage.Send";
        pub const USER_READ: &str = "User.Read";
        pub const USER_READ_BASIC_ALL: &str = "User.ReadBasic.All";
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.graph_base_url, "https://graph.microsoft.com/v1.0");
        assert_eq!(config.service.chat_page_size, 50);
        assert_eq!(
            config.service.chat_expand,
            vec!["members".to_string(), "lastMessagePreview".to_string()]
        );
        assert_eq!(config.service.default_member_role, MemberRole::Owner);
    }

    #[test]
    fn test_with_base_url_trims_trailing_slash() {
        let config = Config::default()
            .with_base_url("http://127.0.0.1:8080/v1.0/")
            .unwrap();
        assert_eq!(config.graph_base_url, "http://127.0.0.1:8080/v1.0");
    }

    #[test]
    fn test_relative_base_url_rejected() {
        assert!(Config::default().with_base_url("graph.local").is_err());
    }
}
