//! Response normalization
//!
//! Maps Graph wire types into the stable entities the tools render. Missing
//! optional fields fall back to documented defaults; nothing in here fails.

use serde::Serialize;

use crate::graph::types::{
    ChatType, ContentType, GraphChat, GraphChatMessage, GraphCollection, GraphConversationMember,
    GraphIdentitySet, GraphItemBody, GraphMessagePreview, GraphUser, Importance,
};

/// Topic shown for chats without one
pub const NO_TOPIC: &str = "No topic";

/// Display name used when Graph omits one
pub const UNKNOWN_NAME: &str = "Unknown";

/// A Teams chat
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    pub topic: String,
    pub chat_type: ChatType,
    pub created_date_time: Option<String>,
    pub last_updated_date_time: Option<String>,
    pub web_url: Option<String>,
    pub members: Vec<ChatMember>,
    pub last_message_preview: Option<MessagePreview>,
}

/// A member of a chat
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMember {
    /// User object id, or email when that is all that is known
    pub id: String,
    pub display_name: String,
    pub user_principal_name: Option<String>,
    pub roles: Vec<String>,
}

/// Latest message summary attached to a chat
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePreview {
    pub id: Option<String>,
    pub content: String,
    pub content_type: ContentType,
    pub sender: Option<String>,
    pub created_date_time: Option<String>,
    pub is_deleted: bool,
}

/// A chat message
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    pub created_date_time: Option<String>,
    pub message_type: String,
    pub body: MessageBody,
    pub from: Option<Sender>,
    pub importance: Importance,
    /// `None` when Graph does not report a read flag
    pub is_read: Option<bool>,
    pub web_url: Option<String>,
}

/// Message body
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageBody {
    pub content_type: ContentType,
    pub content: String,
}

/// Message sender
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sender {
    pub id: Option<String>,
    pub display_name: String,
}

/// A directory user
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub display_name: String,
    pub user_principal_name: Option<String>,
    pub mail: Option<String>,
    pub job_title: Option<String>,
}

impl User {
    /// Whether `key` names this user by id, UPN or mail
    pub fn matches(&self, key: &str) -> bool {
        self.id.eq_ignore_ascii_case(key)
            || self
                .user_principal_name
                .as_deref()
                .is_some_and(|upn| upn.eq_ignore_ascii_case(key))
            || self
                .mail
                .as_deref()
                .is_some_and(|mail| mail.eq_ignore_ascii_case(key))
    }
}

/// One page of normalized results
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Always `items.len()`, including after client-side filtering
    pub count: usize,
    pub next_link: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_link: Option<String>) -> Self {
        Self {
            count: items.len(),
            items,
            next_link,
        }
    }

    /// Drop items failing `keep`, correcting the count
    pub fn retain<F>(&mut self, keep: F)
    where
        F: FnMut(&T) -> bool,
    {
        self.items.retain(keep);
        self.count = self.items.len();
    }
}

// ==================== Mapping ====================

/// Normalize a chat
pub fn chat(raw: GraphChat) -> Chat {
    Chat {
        topic: raw
            .topic
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| NO_TOPIC.to_string()),
        chat_type: ChatType::from_graph(raw.chat_type.as_deref()),
        created_date_time: raw.created_date_time,
        last_updated_date_time: raw.last_updated_date_time,
        web_url: raw.web_url,
        members: raw
            .members
            .unwrap_or_default()
            .into_iter()
            .map(member)
            .collect(),
        last_message_preview: raw.last_message_preview.map(preview),
        id: raw.id,
    }
}

/// Normalize a page of chats
pub fn chat_page(raw: GraphCollection<GraphChat>) -> Page<Chat> {
    Page::new(raw.value.into_iter().map(chat).collect(), raw.next_link)
}

/// Normalize a conversation member
pub fn member(raw: GraphConversationMember) -> ChatMember {
    let id = raw
        .user_id
        .clone()
        .or_else(|| raw.email.clone())
        .or(raw.id)
        .unwrap_or_default();

    ChatMember {
        id,
        display_name: raw
            .display_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_NAME.to_string()),
        user_principal_name: raw.email,
        roles: raw.roles.unwrap_or_default(),
    }
}

fn preview(raw: GraphMessagePreview) -> MessagePreview {
    let (content_type, content) = body_parts(raw.body);
    MessagePreview {
        id: raw.id,
        content,
        content_type,
        sender: raw.from.and_then(sender).map(|s| s.display_name),
        created_date_time: raw.created_date_time,
        is_deleted: raw.is_deleted.unwrap_or(false),
    }
}

/// Normalize a chat message
pub fn message(raw: GraphChatMessage) -> ChatMessage {
    let (content_type, content) = body_parts(raw.body);
    ChatMessage {
        id: raw.id,
        chat_id: raw.chat_id,
        created_date_time: raw.created_date_time,
        message_type: raw.message_type.unwrap_or_else(|| "message".to_string()),
        body: MessageBody {
            content_type,
            content,
        },
        from: raw.from.and_then(sender),
        importance: Importance::from_graph(raw.importance.as_deref()),
        is_read: raw.is_read,
        web_url: raw.web_url,
    }
}

/// Normalize a page of messages
pub fn message_page(raw: GraphCollection<GraphChatMessage>) -> Page<ChatMessage> {
    Page::new(raw.value.into_iter().map(message).collect(), raw.next_link)
}

/// Normalize a user
pub fn user(raw: GraphUser) -> User {
    User {
        display_name: raw
            .display_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_NAME.to_string()),
        id: raw.id,
        user_principal_name: raw.user_principal_name,
        mail: raw.mail,
        job_title: raw.job_title,
    }
}

fn body_parts(body: Option<GraphItemBody>) -> (ContentType, String) {
    match body {
        Some(b) => (
            ContentType::from_graph(b.content_type.as_deref()),
            b.content.unwrap_or_default(),
        ),
        None => (ContentType::Text, String::new()),
    }
}

/// Users first, then applications (bots), then devices
fn sender(from: GraphIdentitySet) -> Option<Sender> {
    from.user
        .or(from.application)
        .or(from.device)
        .map(|identity| Sender {
            id: identity.id,
            display_name: identity
                .display_name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_NAME.to_string()),
        })
}

// ==================== Client-side filters ====================

/// Apply the read-flag filter Graph cannot evaluate server-side.
/// Messages without a flag match neither `true` nor `false`.
pub fn filter_read_state(page: &mut Page<ChatMessage>, is_read: Option<bool>) {
    if let Some(wanted) = is_read {
        page.retain(|m| m.is_read == Some(wanted));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_message(id: &str, is_read: Option<bool>) -> GraphChatMessage {
        GraphChatMessage {
            id: id.to_string(),
            is_read,
            ..Default::default()
        }
    }

    #[test]
    fn test_chat_defaults() {
        let chat = chat(GraphChat {
            id: "c1".to_string(),
            topic: Some("   ".to_string()),
            ..Default::default()
        });
        assert_eq!(chat.topic, NO_TOPIC);
        assert_eq!(chat.chat_type, ChatType::Unknown);
        assert!(chat.members.is_empty());
        assert!(chat.last_message_preview.is_none());
    }

    #[test]
    fn test_member_defaults() {
        let member = member(GraphConversationMember {
            id: Some("MCMjMSMj".to_string()),
            user_id: Some("user-guid".to_string()),
            ..Default::default()
        });
        assert_eq!(member.id, "user-guid");
        assert_eq!(member.display_name, UNKNOWN_NAME);
        assert!(member.roles.is_empty());
    }

    #[test]
    fn test_chat_from_json() {
        let json = r#"{
            "id": "19:meeting@thread.v2",
            "topic": "Weekly Sync",
            "chatType": "group",
            "members": [
                {"displayName": "Ada", "userId": "u-ada", "email": "ada@example.com", "roles": ["owner"]},
                {"userId": "u-bob", "roles": []}
            ],
            "lastMessagePreview": {
                "id": "m9",
                "createdDateTime": "2024-05-01T10:00:00Z",
                "body": {"contentType": "html", "content": "<p>done</p>"},
                "from": {"user": {"id": "u-ada", "displayName": "Ada"}}
            }
        }"#;
        let raw: GraphChat = serde_json::from_str(json).unwrap();
        let chat = chat(raw);

        assert_eq!(chat.chat_type, ChatType::Group);
        assert_eq!(chat.members.len(), 2);
        assert_eq!(chat.members[0].user_principal_name.as_deref(), Some("ada@example.com"));
        assert_eq!(chat.members[1].display_name, UNKNOWN_NAME);

        let preview = chat.last_message_preview.unwrap();
        assert_eq!(preview.sender.as_deref(), Some("Ada"));
        assert_eq!(preview.content_type, ContentType::Html);
    }

    #[test]
    fn test_message_sender_falls_back_to_application() {
        let json = r#"{
            "id": "m1",
            "importance": "HIGH",
            "body": {"contentType": "text", "content": "build green"},
            "from": {"user": null, "application": {"id": "bot-1", "displayName": "CI Bot"}}
        }"#;
        let msg = message(serde_json::from_str(json).unwrap());
        let sender = msg.from.unwrap();
        assert_eq!(sender.display_name, "CI Bot");
        assert_eq!(msg.importance, Importance::High);
        assert_eq!(msg.message_type, "message");
    }

    #[test]
    fn test_is_read_filter_corrects_count() {
        let raw = GraphCollection {
            value: vec![
                raw_message("m1", Some(true)),
                raw_message("m2", Some(false)),
                raw_message("m3", Some(false)),
            ],
            next_link: None,
        };
        let mut page = message_page(raw);
        assert_eq!(page.count, 3);

        filter_read_state(&mut page, Some(false));
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.count, 2);
        assert!(page.items.iter().all(|m| m.is_read == Some(false)));
    }

    #[test]
    fn test_is_read_filter_excludes_unknown_flag() {
        let mut page = Page::new(
            vec![
                message(raw_message("m1", None)),
                message(raw_message("m2", Some(true))),
            ],
            None,
        );
        filter_read_state(&mut page, Some(true));
        assert_eq!(page.count, 1);
        assert_eq!(page.items[0].id, "m2");
    }

    #[test]
    fn test_next_link_preserved_verbatim() {
        let link = "https://graph.microsoft.com/v1.0/chats/c1/messages?$skiptoken=abc%3D%3D";
        let page = message_page(GraphCollection {
            value: vec![],
            next_link: Some(link.to_string()),
        });
        assert_eq!(page.next_link.as_deref(), Some(link));
    }

    #[test]
    fn test_user_matches_case_insensitive() {
        let user = user(GraphUser {
            id: "guid-1".to_string(),
            user_principal_name: Some("Me@Example.com".to_string()),
            ..Default::default()
        });
        assert!(user.matches("me@example.com"));
        assert!(user.matches("GUID-1"));
        assert!(!user.matches("someone@example.com"));
        assert_eq!(user.display_name, UNKNOWN_NAME);
    }
}
