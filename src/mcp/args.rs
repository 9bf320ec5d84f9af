//! Tool argument types
//!
//! Each tool's arguments are a serde struct whose JSON Schema (schemars) is
//! published through `tools/list` and whose bounds (validator) are checked
//! before any Graph request is built.

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::error::{Result, TeamsMcpError, ValidationError};
use crate::graph::chats::{NewChat, NewChatType, NewMember};
use crate::graph::query::{parse_datetime, ChatFilter, ListOptions, MessageFilter};
use crate::graph::types::{ChatType, ContentType, Importance, MemberRole};

/// Deserialize and validate tool arguments
pub fn parse<T: DeserializeOwned + Validate>(args: Value) -> Result<T> {
    let args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args
    };

    let parsed: T = serde_json::from_value(args).map_err(|e| ValidationError::InvalidArguments {
        message: e.to_string(),
    })?;
    parsed.validate().map_err(ValidationError::from)?;
    Ok(parsed)
}

/// JSON Schema for an argument struct
pub fn schema<T: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T))
        .unwrap_or_else(|_| serde_json::json!({ "type": "object" }))
}

/// A single string or a list of strings
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

fn list(value: Option<OneOrMany>) -> Vec<String> {
    value
        .map(OneOrMany::into_vec)
        .unwrap_or_default()
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Chat kinds accepted by the chat-type filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum ChatTypeArg {
    OneOnOne,
    Group,
    Meeting,
}

impl From<ChatTypeArg> for ChatType {
    fn from(arg: ChatTypeArg) -> Self {
        match arg {
            ChatTypeArg::OneOnOne => ChatType::OneOnOne,
            ChatTypeArg::Group => ChatType::Group,
            ChatTypeArg::Meeting => ChatType::Meeting,
        }
    }
}

// ==================== list-chats ====================

/// Arguments of `list-chats`
#[derive(Debug, Clone, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ListChatsArgs {
    /// Microsoft Graph access token (defaults to GRAPH_ACCESS_TOKEN)
    pub access_token: Option<String>,

    /// Maximum number of chats to return (1-50)
    #[validate(range(min = 1))]
    pub top: Option<u32>,

    /// Not supported by Graph for chats; use nextLink instead
    pub skip: Option<u32>,

    /// Raw OData $filter expression
    pub filter: Option<String>,

    /// Only chats of this type
    pub chat_type: Option<ChatTypeArg>,

    /// $orderby clause(s), e.g. "lastMessagePreview/createdDateTime desc"
    pub order_by: Option<OneOrMany>,

    /// Properties to $select
    pub select: Option<OneOrMany>,

    /// Relationships to $expand (defaults to members,lastMessagePreview)
    pub expand: Option<OneOrMany>,

    /// @odata.nextLink from a previous page; other options are ignored
    pub next_link: Option<String>,
}

impl ListChatsArgs {
    pub fn list_options(&self) -> ListOptions {
        ListOptions {
            top: self.top,
            skip: self.skip,
            filter: non_blank(self.filter.clone()),
            order_by: list(self.order_by.clone()),
            select: list(self.select.clone()),
            expand: list(self.expand.clone()),
        }
    }

    pub fn chat_filter(&self) -> ChatFilter {
        ChatFilter {
            chat_type: self.chat_type.map(ChatType::from),
        }
    }
}

// ==================== get-chat ====================

/// Arguments of `get-chat`
#[derive(Debug, Clone, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GetChatArgs {
    /// Microsoft Graph access token (defaults to GRAPH_ACCESS_TOKEN)
    pub access_token: Option<String>,

    /// Chat ID
    #[validate(length(min = 1))]
    pub chat_id: String,

    /// Relationships to $expand (defaults to members,lastMessagePreview)
    pub expand: Option<OneOrMany>,
}

impl GetChatArgs {
    pub fn expand(&self, default: &[String]) -> Vec<String> {
        let expand = list(self.expand.clone());
        if expand.is_empty() {
            default.to_vec()
        } else {
            expand
        }
    }
}

// ==================== message filters ====================

/// Structured message predicates shared by the message tools
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageFilterArgs {
    /// Sender user ID
    pub from: Option<String>,

    /// Message importance
    pub importance: Option<Importance>,

    /// Only messages created after this time (RFC 3339 or YYYY-MM-DD)
    pub created_after: Option<String>,

    /// Only messages created before this time (RFC 3339 or YYYY-MM-DD)
    pub created_before: Option<String>,

    /// Text the message body must contain
    pub contains: Option<String>,

    /// Only read (true) or unread (false) messages; applied after retrieval
    pub is_read: Option<bool>,
}

impl MessageFilterArgs {
    /// Parse dates and build the filter
    pub fn to_filter(&self) -> Result<MessageFilter> {
        let created_after = self
            .created_after
            .as_deref()
            .map(|v| parse_datetime("createdAfter", v))
            .transpose()?;
        let created_before = self
            .created_before
            .as_deref()
            .map(|v| parse_datetime("createdBefore", v))
            .transpose()?;

        if let (Some(after), Some(before)) = (created_after, created_before) {
            if after >= before {
                return Err(TeamsMcpError::invalid_param(
                    "createdAfter",
                    "must be earlier than createdBefore",
                ));
            }
        }

        Ok(MessageFilter {
            from: non_blank(self.from.clone()),
            importance: self.importance,
            created_after,
            created_before,
            contains: self.contains.clone().filter(|c| !c.is_empty()),
            is_read: self.is_read,
        })
    }
}

// ==================== list-messages ====================

/// Arguments of `list-messages`
#[derive(Debug, Clone, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ListMessagesArgs {
    /// Microsoft Graph access token (defaults to GRAPH_ACCESS_TOKEN)
    pub access_token: Option<String>,

    /// Chat ID
    #[validate(length(min = 1))]
    pub chat_id: String,

    /// Maximum number of messages to return (1-1000)
    #[validate(range(min = 1))]
    pub top: Option<u32>,

    /// Number of messages to skip
    pub skip: Option<u32>,

    /// Raw OData $filter expression, combined with the structured filters
    pub filter: Option<String>,

    /// $orderby clause(s) (defaults to "createdDateTime desc")
    pub order_by: Option<OneOrMany>,

    /// Properties to $select
    pub select: Option<OneOrMany>,

    #[serde(flatten)]
    pub filters: MessageFilterArgs,

    /// @odata.nextLink from a previous page; other options are ignored
    pub next_link: Option<String>,
}

impl ListMessagesArgs {
    pub fn list_options(&self) -> ListOptions {
        ListOptions {
            top: self.top,
            skip: self.skip,
            filter: non_blank(self.filter.clone()),
            order_by: list(self.order_by.clone()),
            select: list(self.select.clone()),
            expand: Vec::new(),
        }
    }
}

// ==================== list-recent-messages ====================

/// Arguments of `list-recent-messages`
#[derive(Debug, Clone, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ListRecentMessagesArgs {
    /// Microsoft Graph access token (defaults to GRAPH_ACCESS_TOKEN)
    pub access_token: Option<String>,

    /// Maximum number of messages to return after merging (default 50, at most 1000)
    #[validate(range(min = 1))]
    pub top: Option<u32>,

    /// Number of merged messages to skip
    pub skip: Option<u32>,

    /// Number of most recently active chats to scan (at most 50)
    #[validate(range(min = 1))]
    pub chat_limit: Option<u32>,

    /// Messages fetched from each chat (at most 1000)
    #[validate(range(min = 1))]
    pub per_chat: Option<u32>,

    #[serde(flatten)]
    pub filters: MessageFilterArgs,
}

// ==================== create-chat ====================

/// A member of a chat to create
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemberArg {
    /// User ID or user principal name (email)
    pub id: String,

    /// Member roles (defaults to the configured role)
    pub roles: Option<Vec<MemberRole>>,
}

/// Arguments of `create-chat`
#[derive(Debug, Clone, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateChatArgs {
    /// Microsoft Graph access token (defaults to GRAPH_ACCESS_TOKEN)
    pub access_token: Option<String>,

    /// Kind of chat to create
    pub chat_type: NewChatType,

    /// Chat topic (group chats only)
    pub topic: Option<String>,

    /// Members other than the caller, who is added as owner
    #[validate(length(min = 1))]
    pub members: Vec<MemberArg>,
}

impl CreateChatArgs {
    pub fn new_chat(&self) -> NewChat {
        NewChat {
            chat_type: self.chat_type,
            topic: non_blank(self.topic.clone()),
            members: self
                .members
                .iter()
                .map(|m| NewMember {
                    id: m.id.trim().to_string(),
                    roles: m.roles.clone(),
                })
                .collect(),
        }
    }
}

// ==================== send-message ====================

/// Arguments of `send-message`
#[derive(Debug, Clone, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageArgs {
    /// Microsoft Graph access token (defaults to GRAPH_ACCESS_TOKEN)
    pub access_token: Option<String>,

    /// Chat ID
    #[validate(length(min = 1))]
    pub chat_id: String,

    /// Message content
    #[validate(length(min = 1))]
    pub content: String,

    /// Body format (default text)
    pub content_type: Option<ContentType>,

    /// Message importance (default normal)
    pub importance: Option<Importance>,
}

// ==================== get-user ====================

/// Arguments of `get-user`
#[derive(Debug, Clone, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GetUserArgs {
    /// Microsoft Graph access token (defaults to GRAPH_ACCESS_TOKEN)
    pub access_token: Option<String>,

    /// User ID or principal name; omit for the signed-in user
    pub user_id: Option<String>,
}

impl GetUserArgs {
    pub fn user_id(&self) -> Option<String> {
        non_blank(self.user_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_rejects_zero_top() {
        let err = parse::<ListChatsArgs>(json!({ "top": 0 })).unwrap_err();
        assert!(matches!(err, TeamsMcpError::Validation(ValidationError::Constraints(_))));
    }

    #[test]
    fn test_parse_accepts_null_arguments() {
        let args = parse::<ListChatsArgs>(Value::Null).unwrap();
        assert!(args.access_token.is_none());
        assert_eq!(args.list_options(), ListOptions::default());
    }

    #[test]
    fn test_unknown_importance_rejected() {
        let err = parse::<ListMessagesArgs>(json!({
            "chatId": "c1",
            "importance": "critical"
        }))
        .unwrap_err();
        assert!(matches!(
            err,
            TeamsMcpError::Validation(ValidationError::InvalidArguments { .. })
        ));
    }

    #[test]
    fn test_message_filters_flattened() {
        let args = parse::<ListMessagesArgs>(json!({
            "chatId": "c1",
            "from": "u-1",
            "importance": "high",
            "createdAfter": "2024-01-01",
            "isRead": false,
            "orderBy": "createdDateTime asc"
        }))
        .unwrap();

        let filter = args.filters.to_filter().unwrap();
        assert_eq!(filter.from.as_deref(), Some("u-1"));
        assert_eq!(filter.importance, Some(Importance::High));
        assert_eq!(filter.is_read, Some(false));
        assert!(filter.created_after.is_some());
        assert_eq!(args.list_options().order_by, vec!["createdDateTime asc"]);
    }

    #[test]
    fn test_bad_date_rejected() {
        let args = parse::<ListMessagesArgs>(json!({
            "chatId": "c1",
            "createdBefore": "last tuesday"
        }))
        .unwrap();
        assert!(args.filters.to_filter().is_err());
    }

    #[test]
    fn test_inverted_date_range_rejected() {
        let filters = MessageFilterArgs {
            created_after: Some("2024-02-01".to_string()),
            created_before: Some("2024-01-01".to_string()),
            ..Default::default()
        };
        assert!(filters.to_filter().is_err());
    }

    #[test]
    fn test_create_chat_args() {
        let args = parse::<CreateChatArgs>(json!({
            "accessToken": "t",
            "chatType": "group",
            "topic": "Sync",
            "members": [{ "id": " u1@example.com " }]
        }))
        .unwrap();

        let new_chat = args.new_chat();
        assert_eq!(new_chat.chat_type, NewChatType::Group);
        assert_eq!(new_chat.members[0].id, "u1@example.com");
        assert!(new_chat.members[0].roles.is_none());

        assert!(parse::<CreateChatArgs>(json!({
            "chatType": "meeting",
            "members": [{ "id": "u1" }]
        }))
        .is_err());
        assert!(parse::<CreateChatArgs>(json!({ "chatType": "group", "members": [] })).is_err());
    }

    #[test]
    fn test_send_message_requires_content() {
        assert!(parse::<SendMessageArgs>(json!({ "chatId": "c1", "content": "" })).is_err());
        let args = parse::<SendMessageArgs>(json!({
            "chatId": "c1",
            "content": "<b>hi</b>",
            "contentType": "html",
            "importance": "urgent"
        }))
        .unwrap();
        assert_eq!(args.content_type, Some(ContentType::Html));
        assert_eq!(args.importance, Some(Importance::Urgent));
    }

    #[test]
    fn test_schema_is_object_with_camel_case_properties() {
        let schema = schema::<ListMessagesArgs>();
        assert_eq!(schema["type"], "object");
        let props = schema["properties"].as_object().unwrap();
        assert!(props.contains_key("chatId"));
        assert!(props.contains_key("accessToken"));
        assert!(props.contains_key("isRead"));
        assert_eq!(schema["required"], json!(["chatId"]));
    }
}
