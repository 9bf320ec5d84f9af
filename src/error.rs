//! Error types for the Teams Chat MCP Server
//!
//! This module defines the error hierarchy for all operations in the server.

use serde::Serialize;
use thiserror::Error;

/// Main error type for the Teams Chat MCP Server
#[derive(Error, Debug)]
pub enum TeamsMcpError {
    /// Microsoft Graph API errors
    #[error("{0}")]
    Graph(#[from] GraphApiError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// MCP protocol errors
    #[error("MCP protocol error: {0}")]
    Mcp(#[from] McpError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Microsoft Graph API errors, mapped once at the request boundary
#[derive(Error, Debug)]
pub enum GraphApiError {
    #[error("No access token provided")]
    MissingToken,

    #[error("Authentication failed ({status}): {message}")]
    Authentication {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Permission denied ({status}): {message}")]
    Permission {
        status: u16,
        code: Option<String>,
        message: String,
        required_scope: &'static str,
    },

    #[error("Not found ({status}): {message}")]
    NotFound {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Rate limited by Microsoft Graph: {message}")]
    RateLimited {
        code: Option<String>,
        message: String,
        retry_after_secs: Option<u64>,
    },

    #[error("Graph request failed ({status}): {message}")]
    Remote {
        status: u16,
        code: Option<String>,
        message: String,
    },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {message}")]
    InvalidEnvVar { var: String, message: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

/// Validation errors
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid parameter: {name} - {message}")]
    InvalidParameter { name: String, message: String },

    #[error("Invalid arguments: {message}")]
    InvalidArguments { message: String },

    #[error("Invalid parameters: {}", .0.join("; "))]
    Constraints(Vec<String>),
}

impl From<validator::ValidationErrors> for ValidationError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut problems: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                let name = camel_case(field);
                errs.iter()
                    .map(move |e| format!("{} - {}", name, describe_constraint(e)))
            })
            .collect();
        problems.sort();
        ValidationError::Constraints(problems)
    }
}

fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for ch in field.chars() {
        if ch == '_' {
            upper = true;
        } else if upper {
            out.extend(ch.to_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

fn describe_constraint(error: &validator::ValidationError) -> String {
    if let Some(message) = &error.message {
        return message.to_string();
    }

    let bound = |key: &str| {
        error.params.get(key).and_then(|v| v.as_f64()).map(|n| {
            if n.fract() == 0.0 {
                format!("{}", n as i64)
            } else {
                n.to_string()
            }
        })
    };

    match error.code.as_ref() {
        "range" => match (bound("min"), bound("max")) {
            (Some(min), Some(max)) => format!("must be between {} and {}", min, max),
            (Some(min), None) => format!("must be at least {}", min),
            (None, Some(max)) => format!("must be at most {}", max),
            (None, None) => "out of range".to_string(),
        },
        "length" => match (bound("min"), bound("max")) {
            (Some(min), Some(max)) => format!("length must be between {} and {}", min, max),
            (Some(min), None) if min == "1" => "must not be empty".to_string(),
            (Some(min), None) => format!("length must be at least {}", min),
            (None, Some(max)) => format!("length must be at most {}", max),
            (None, None) => "invalid length".to_string(),
        },
        code => format!("failed {} check", code),
    }
}

/// MCP protocol errors
#[derive(Error, Debug)]
pub enum McpError {
    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },
}

/// Result type alias for Teams Chat MCP operations
pub type Result<T> = std::result::Result<T, TeamsMcpError>;

/// Coarse failure classification surfaced to tool callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Authentication,
    Permission,
    RateLimit,
    Remote,
    NotFound,
    Internal,
}

impl ErrorKind {
    /// Human label used in tool responses
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "Validation error",
            ErrorKind::Authentication => "Authentication error",
            ErrorKind::Permission => "Permission error",
            ErrorKind::RateLimit => "Rate limit error",
            ErrorKind::Remote => "Remote error",
            ErrorKind::NotFound => "Not found",
            ErrorKind::Internal => "Internal error",
        }
    }
}

impl TeamsMcpError {
    /// Shorthand for an invalid parameter
    pub fn invalid_param(name: impl Into<String>, message: impl Into<String>) -> Self {
        TeamsMcpError::Validation(ValidationError::InvalidParameter {
            name: name.into(),
            message: message.into(),
        })
    }

    /// Classify this error for the caller
    pub fn kind(&self) -> ErrorKind {
        match self {
            TeamsMcpError::Graph(e) => match e {
                GraphApiError::MissingToken | GraphApiError::Authentication { .. } => {
                    ErrorKind::Authentication
                }
                GraphApiError::Permission { .. } => ErrorKind::Permission,
                GraphApiError::NotFound { .. } => ErrorKind::NotFound,
                GraphApiError::RateLimited { .. } => ErrorKind::RateLimit,
                GraphApiError::Remote { .. } => ErrorKind::Remote,
            },
            TeamsMcpError::Validation(_) | TeamsMcpError::Mcp(_) => ErrorKind::Validation,
            TeamsMcpError::Http(_) => ErrorKind::Remote,
            TeamsMcpError::Config(_) | TeamsMcpError::Io(_) | TeamsMcpError::Json(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Remediation hint shown next to the failure
    pub fn remediation(&self) -> String {
        match self {
            TeamsMcpError::Graph(GraphApiError::MissingToken) => {
                "Pass an accessToken argument or set GRAPH_ACCESS_TOKEN".to_string()
            }
            TeamsMcpError::Graph(GraphApiError::Authentication { .. }) => {
                "The access token is invalid or expired; obtain a fresh Microsoft Graph token"
                    .to_string()
            }
            TeamsMcpError::Graph(GraphApiError::Permission { required_scope, .. }) => {
                format!("Ensure the token has the {} permission", required_scope)
            }
            TeamsMcpError::Graph(GraphApiError::NotFound { .. }) => {
                "Check that the chat or user ID exists and is visible to the signed-in user"
                    .to_string()
            }
            TeamsMcpError::Graph(GraphApiError::RateLimited {
                retry_after_secs, ..
            }) => match retry_after_secs {
                Some(secs) => format!("Wait {} seconds before retrying", secs),
                None => "Wait before retrying; Microsoft Graph is throttling requests".to_string(),
            },
            TeamsMcpError::Graph(GraphApiError::Remote { .. }) | TeamsMcpError::Http(_) => {
                "Microsoft Graph rejected the request; check the arguments and try again"
                    .to_string()
            }
            TeamsMcpError::Validation(_) | TeamsMcpError::Mcp(_) => {
                "Fix the tool arguments to match the input schema".to_string()
            }
            TeamsMcpError::Config(_) => "Check the server environment variables".to_string(),
            TeamsMcpError::Io(_) | TeamsMcpError::Json(_) => {
                "Unexpected local failure; see server logs".to_string()
            }
        }
    }

    /// Structured payload for tool response metadata
    pub fn details(&self) -> serde_json::Value {
        let mut details = serde_json::json!({
            "kind": self.kind(),
            "message": self.to_string(),
            "hint": self.remediation(),
        });

        if let TeamsMcpError::Graph(e) = self {
            let (status, code, retry_after) = match e {
                GraphApiError::MissingToken => (None, None, None),
                GraphApiError::Authentication { status, code, .. }
                | GraphApiError::Permission { status, code, .. }
                | GraphApiError::NotFound { status, code, .. }
                | GraphApiError::Remote { status, code, .. } => (Some(*status), code.clone(), None),
                GraphApiError::RateLimited {
                    code,
                    retry_after_secs,
                    ..
                } => (Some(429), code.clone(), *retry_after_secs),
            };
            details["status"] = serde_json::json!(status);
            details["code"] = serde_json::json!(code);
            if retry_after.is_some() {
                details["retryAfterSecs"] = serde_json::json!(retry_after);
            }
        }

        details
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TeamsMcpError::invalid_param("chatId", "must not be empty");
        assert_eq!(
            err.to_string(),
            "Invalid parameter: chatId - must not be empty"
        );
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_constraint_errors_name_fields() {
        let mut errors = validator::ValidationErrors::new();
        let mut range = validator::ValidationError::new("range");
        range.add_param("min".into(), &1.0);
        errors.add("chat_limit", range);
        errors.add("members", {
            let mut length = validator::ValidationError::new("length");
            length.add_param("min".into(), &1u64);
            length
        });

        let err = TeamsMcpError::Validation(errors.into());
        assert_eq!(
            err.to_string(),
            "Invalid parameters: chatLimit - must be at least 1; members - must not be empty"
        );
    }

    #[test]
    fn test_error_conversion() {
        let graph_err = GraphApiError::MissingToken;
        let err: TeamsMcpError = graph_err.into();
        assert!(matches!(err, TeamsMcpError::Graph(_)));
        assert_eq!(err.kind(), ErrorKind::Authentication);
    }

    #[test]
    fn test_permission_hint_names_scope() {
        let err = TeamsMcpError::Graph(GraphApiError::Permission {
            status: 403,
            code: Some("Forbidden".to_string()),
            message: "Missing role".to_string(),
            required_scope: "Chat.ReadBasic",
        });
        assert_eq!(err.kind(), ErrorKind::Permission);
        assert!(err.remediation().contains("Chat.ReadBasic"));

        let details = err.details();
        assert_eq!(details["kind"], "permission");
        assert_eq!(details["status"], 403);
        assert_eq!(details["code"], "Forbidden");
    }

    #[test]
    fn test_rate_limit_details_carry_retry_after() {
        let err = TeamsMcpError::Graph(GraphApiError::RateLimited {
            code: Some("TooManyRequests".to_string()),
            message: "slow down".to_string(),
            retry_after_secs: Some(7),
        });
        assert_eq!(err.kind(), ErrorKind::RateLimit);
        assert!(err.remediation().contains("7 seconds"));
        assert_eq!(err.details()["retryAfterSecs"], 7);
    }
}
