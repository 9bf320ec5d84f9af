//! Microsoft Graph type definitions
//!
//! Wire types mirror the Graph v1.0 JSON shapes. Every response field is
//! optional so that a sparse or partially projected payload (`$select`) still
//! deserializes; defaults are applied later by the normalizer.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ==================== Shared enums ====================

/// Message body format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Text,
    Html,
}

impl ContentType {
    /// Parse a Graph value; anything unrecognized reads as text
    pub fn from_graph(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("html") => ContentType::Html,
            _ => ContentType::Text,
        }
    }
}

/// Message importance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    #[default]
    Normal,
    High,
    Urgent,
}

impl Importance {
    /// OData literal for this value
    pub fn as_str(&self) -> &'static str {
        match self {
            Importance::Normal => "normal",
            Importance::High => "high",
            Importance::Urgent => "urgent",
        }
    }

    /// Parse a Graph value; anything unrecognized reads as normal
    pub fn from_graph(value: Option<&str>) -> Self {
        match value.map(|v| v.to_ascii_lowercase()).as_deref() {
            Some("high") => Importance::High,
            Some("urgent") => Importance::Urgent,
            _ => Importance::Normal,
        }
    }
}

/// Role of a conversation member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Owner,
    Guest,
}

/// Kind of chat as reported by Graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ChatType {
    OneOnOne,
    Group,
    Meeting,
    Unknown,
}

impl ChatType {
    /// Graph literal for this value
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatType::OneOnOne => "oneOnOne",
            ChatType::Group => "group",
            ChatType::Meeting => "meeting",
            ChatType::Unknown => "unknown",
        }
    }

    /// Parse a Graph value; `unknownFutureValue` and anything new read as unknown
    pub fn from_graph(value: Option<&str>) -> Self {
        match value {
            Some("oneOnOne") => ChatType::OneOnOne,
            Some("group") => ChatType::Group,
            Some("meeting") => ChatType::Meeting,
            _ => ChatType::Unknown,
        }
    }
}

// ==================== Response types ====================

/// A page of a Graph collection
#[derive(Debug, Clone, Deserialize)]
pub struct GraphCollection<T> {
    /// Items in this page
    #[serde(default)]
    pub value: Vec<T>,

    /// Continuation link, followed verbatim
    #[serde(rename = "@odata.nextLink", default)]
    pub next_link: Option<String>,
}

/// Graph `chat` resource
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraphChat {
    pub id: String,
    pub topic: Option<String>,
    pub chat_type: Option<String>,
    pub created_date_time: Option<String>,
    pub last_updated_date_time: Option<String>,
    pub web_url: Option<String>,
    pub members: Option<Vec<GraphConversationMember>>,
    pub last_message_preview: Option<GraphMessagePreview>,
}

/// Graph `conversationMember` (usually `aadUserConversationMember`)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraphConversationMember {
    pub id: Option<String>,
    pub display_name: Option<String>,
    pub roles: Option<Vec<String>>,
    pub user_id: Option<String>,
    pub email: Option<String>,
}

/// Graph `chatMessageInfo`, the preview attached to a chat
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraphMessagePreview {
    pub id: Option<String>,
    pub created_date_time: Option<String>,
    pub body: Option<GraphItemBody>,
    pub from: Option<GraphIdentitySet>,
    pub is_deleted: Option<bool>,
}

/// Graph `itemBody`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraphItemBody {
    pub content_type: Option<String>,
    pub content: Option<String>,
}

/// Graph `identitySet` (message sender)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraphIdentitySet {
    pub user: Option<GraphIdentity>,
    pub application: Option<GraphIdentity>,
    pub device: Option<GraphIdentity>,
}

/// Graph `identity`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraphIdentity {
    pub id: Option<String>,
    pub display_name: Option<String>,
}

/// Graph `chatMessage`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraphChatMessage {
    pub id: String,
    pub chat_id: Option<String>,
    pub created_date_time: Option<String>,
    pub message_type: Option<String>,
    pub body: Option<GraphItemBody>,
    pub from: Option<GraphIdentitySet>,
    pub importance: Option<String>,
    pub is_read: Option<bool>,
    pub web_url: Option<String>,
}

/// Graph `user`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraphUser {
    pub id: String,
    pub display_name: Option<String>,
    pub user_principal_name: Option<String>,
    pub mail: Option<String>,
    pub job_title: Option<String>,
}

/// Graph error envelope: `{"error": {"code": ..., "message": ...}}`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GraphErrorEnvelope {
    pub error: GraphErrorBody,
}

/// Body of a Graph error
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GraphErrorBody {
    pub code: Option<String>,
    pub message: Option<String>,
}

// ==================== Request types ====================

/// Body of `POST /chats`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChatRequest {
    pub chat_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,

    pub members: Vec<MemberBinding>,
}

/// One `aadUserConversationMember` entry of a create-chat payload
#[derive(Debug, Clone, Serialize)]
pub struct MemberBinding {
    #[serde(rename = "@odata.type")]
    pub odata_type: String,

    pub roles: Vec<MemberRole>,

    #[serde(rename = "user@odata.bind")]
    pub user_bind: String,
}

impl MemberBinding {
    /// OData type of a directory user member
    pub const AAD_USER_MEMBER: &'static str = "#microsoft.graph.aadUserConversationMember";

    /// Bind a user (object id or UPN) relative to the Graph base URL
    pub fn user(base_url: &str, user_id: &str, roles: Vec<MemberRole>) -> Self {
        Self {
            odata_type: Self::AAD_USER_MEMBER.to_string(),
            roles,
            user_bind: format!("{}/users('{}')", base_url, user_id.replace('\'', "''")),
        }
    }
}

/// Body of `POST /chats/{id}/messages`
#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest {
    pub body: ItemBodyRequest,
    pub importance: Importance,
}

/// Outgoing `itemBody`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemBodyRequest {
    pub content_type: ContentType,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_deserialize_sparse() {
        let json = r#"{"id": "19:abc@thread.v2"}"#;
        let chat: GraphChat = serde_json::from_str(json).unwrap();
        assert_eq!(chat.id, "19:abc@thread.v2");
        assert!(chat.topic.is_none());
        assert!(chat.members.is_none());
    }

    #[test]
    fn test_collection_next_link() {
        let json = r#"{
            "value": [{"id": "m1"}],
            "@odata.nextLink": "https://graph.microsoft.com/v1.0/me/chats?$skiptoken=x"
        }"#;
        let page: GraphCollection<GraphChatMessage> = serde_json::from_str(json).unwrap();
        assert_eq!(page.value.len(), 1);
        assert!(page.next_link.unwrap().contains("skiptoken"));
    }

    #[test]
    fn test_member_binding_serialization() {
        let binding = MemberBinding::user(
            "https://graph.microsoft.com/v1.0",
            "u1@example.com",
            vec![MemberRole::Owner],
        );
        let json = serde_json::to_value(&binding).unwrap();
        assert_eq!(
            json["@odata.type"],
            "#microsoft.graph.aadUserConversationMember"
        );
        assert_eq!(
            json["user@odata.bind"],
            "https://graph.microsoft.com/v1.0/users('u1@example.com')"
        );
        assert_eq!(json["roles"][0], "owner");
    }

    #[test]
    fn test_chat_type_parse() {
        assert_eq!(ChatType::from_graph(Some("group")), ChatType::Group);
        assert_eq!(
            ChatType::from_graph(Some("unknownFutureValue")),
            ChatType::Unknown
        );
        assert_eq!(ChatType::from_graph(None), ChatType::Unknown);
    }

    #[test]
    fn test_send_message_request_serialization() {
        let request = SendMessageRequest {
            body: ItemBodyRequest {
                content_type: ContentType::Html,
                content: "<b>hi</b>".to_string(),
            },
            importance: Importance::Urgent,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["body"]["contentType"], "html");
        assert_eq!(json["importance"], "urgent");
    }
}
