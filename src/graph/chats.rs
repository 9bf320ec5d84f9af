//! Chat operations
//!
//! Listing, lookup and creation of chats, including the degraded result
//! returned when a freshly created chat cannot be read back.

use chrono::{SecondsFormat, Utc};
use schemars::JsonSchema;
use serde::Deserialize;

use crate::config::graph::scopes;
use crate::error::{Result, TeamsMcpError};
use crate::graph::client::{segment, GraphClient};
use crate::graph::normalize::{self, Chat, ChatMember, Page, User, NO_TOPIC, UNKNOWN_NAME};
use crate::graph::query::{combine_filters, translate, ChatFilter, EndpointProfile, ListOptions};
use crate::graph::types::{
    ChatType, CreateChatRequest, GraphChat, GraphCollection, MemberBinding, MemberRole,
};

/// Chat kinds that can be created through Graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum NewChatType {
    OneOnOne,
    Group,
}

impl NewChatType {
    pub fn as_chat_type(&self) -> ChatType {
        match self {
            NewChatType::OneOnOne => ChatType::OneOnOne,
            NewChatType::Group => ChatType::Group,
        }
    }
}

/// A member to add to a new chat
#[derive(Debug, Clone, PartialEq)]
pub struct NewMember {
    /// User object id or UPN/email
    pub id: String,
    pub roles: Option<Vec<MemberRole>>,
}

/// Everything needed to create a chat
#[derive(Debug, Clone)]
pub struct NewChat {
    pub chat_type: NewChatType,
    pub topic: Option<String>,
    pub members: Vec<NewMember>,
}

/// Creation payload plus the member list as known locally
#[derive(Debug, Clone)]
pub struct PlannedChat {
    pub request: CreateChatRequest,
    pub members: Vec<ChatMember>,
}

/// Result of chat creation
#[derive(Debug, Clone)]
pub struct CreatedChat {
    pub chat: Chat,
    /// Set when the read-back failed and `chat` was assembled locally
    pub fallback: bool,
}

/// A chat listing request
#[derive(Debug, Clone, Default)]
pub struct ChatListRequest {
    pub options: ListOptions,
    pub filter: ChatFilter,
    /// Continue from a previous page instead of building a query
    pub next_link: Option<String>,
}

/// A page plus any warnings raised while building the request
#[derive(Debug, Clone)]
pub struct Listing<T> {
    pub page: Page<T>,
    pub warnings: Vec<String>,
}

/// Chat manager for Graph operations
pub struct ChatManager<'a> {
    client: &'a GraphClient,
}

impl<'a> ChatManager<'a> {
    /// Create a new chat manager
    pub fn new(client: &'a GraphClient) -> Self {
        Self { client }
    }

    /// List the signed-in user's chats
    pub async fn list(
        &self,
        request: &ChatListRequest,
        profile: &EndpointProfile,
    ) -> Result<Listing<Chat>> {
        let (url, warnings) = match request.next_link.as_deref() {
            Some(link) => (self.client.resolve_next_link(link)?, Vec::new()),
            None => {
                let options = ListOptions {
                    filter: combine_filters(
                        request.options.filter.as_deref(),
                        request.filter.clauses(),
                    ),
                    ..request.options.clone()
                };
                let query = translate(&options, profile);
                (query.apply_to(&self.client.url("/me/chats")), query.warnings)
            }
        };

        for warning in &warnings {
            tracing::warn!("{}", warning);
        }

        let raw: GraphCollection<GraphChat> = self
            .client
            .get_json(&url, scopes::CHAT_READ_BASIC)
            .await?;

        let page = normalize::chat_page(raw);
        tracing::info!(count = page.count, more = page.next_link.is_some(), "Listed chats");

        Ok(Listing { page, warnings })
    }

    /// Get one chat, expanding the given relationships
    pub async fn get(&self, chat_id: &str, expand: &[String]) -> Result<Chat> {
        let mut url = self.client.url(&format!("/chats/{}", segment(chat_id)));
        if !expand.is_empty() {
            url = format!(
                "{}?$expand={}",
                url,
                urlencoding::encode(&expand.join(","))
            );
        }

        let raw: GraphChat = self.client.get_json(&url, scopes::CHAT_READ_BASIC).await?;
        Ok(normalize::chat(raw))
    }

    /// Create a chat with the caller as owner.
    ///
    /// A failed read-back after a successful create is not an error: the
    /// chat is returned as assembled from the create response and the inputs.
    pub async fn create(&self, new_chat: &NewChat, default_role: MemberRole) -> Result<CreatedChat> {
        validate_new_chat(new_chat)?;

        let me = self.client.me().await?;
        let planned = plan_chat(self.client.base_url(), &me, new_chat, default_role)?;

        let created: GraphChat = self
            .client
            .post_json(
                &self.client.url("/chats"),
                &planned.request,
                scopes::CHAT_CREATE,
            )
            .await?;

        tracing::info!(chat_id = %created.id, "Chat created");

        match self.get(&created.id, &["members".to_string()]).await {
            Ok(chat) => Ok(CreatedChat {
                chat,
                fallback: false,
            }),
            Err(e) => {
                tracing::warn!(
                    chat_id = %created.id,
                    "Chat created but could not be read back, returning local view: {}",
                    e
                );
                Ok(CreatedChat {
                    chat: fallback_chat(created, new_chat, planned.members),
                    fallback: true,
                })
            }
        }
    }
}

/// Check the shape rules Graph enforces on chat creation
pub fn validate_new_chat(new_chat: &NewChat) -> Result<()> {
    if new_chat.members.is_empty() {
        return Err(TeamsMcpError::invalid_param(
            "members",
            "at least one member besides the caller is required",
        ));
    }

    if let Some(member) = new_chat.members.iter().find(|m| m.id.trim().is_empty()) {
        return Err(TeamsMcpError::invalid_param(
            "members",
            format!("member id must not be empty (got '{}')", member.id),
        ));
    }

    if new_chat.chat_type == NewChatType::OneOnOne {
        if new_chat.members.len() != 1 {
            return Err(TeamsMcpError::invalid_param(
                "members",
                "oneOnOne chats take exactly one other member",
            ));
        }
        if new_chat.topic.is_some() {
            return Err(TeamsMcpError::invalid_param(
                "topic",
                "only group chats can have a topic",
            ));
        }
    }

    Ok(())
}

/// Build the create payload: the caller once as owner, then the requested members
pub fn plan_chat(
    base_url: &str,
    me: &User,
    new_chat: &NewChat,
    default_role: MemberRole,
) -> Result<PlannedChat> {
    let mut bindings = vec![MemberBinding::user(base_url, &me.id, vec![MemberRole::Owner])];
    let mut members = vec![ChatMember {
        id: me.id.clone(),
        display_name: me.display_name.clone(),
        user_principal_name: me.user_principal_name.clone(),
        roles: vec!["owner".to_string()],
    }];
    let mut seen: Vec<&str> = Vec::new();

    for member in &new_chat.members {
        let id = member.id.trim();
        // The caller may be listed by id, UPN or mail; it is bound once above
        if me.matches(id) {
            tracing::debug!(member = id, "Caller listed as member, already bound as owner");
            continue;
        }
        if seen.iter().any(|s| s.eq_ignore_ascii_case(id)) {
            tracing::debug!(member = id, "Skipping duplicate chat member");
            continue;
        }
        seen.push(id);

        let roles = match &member.roles {
            Some(roles) if !roles.is_empty() => roles.clone(),
            _ => vec![default_role],
        };

        bindings.push(MemberBinding::user(base_url, id, roles.clone()));
        members.push(ChatMember {
            id: id.to_string(),
            display_name: UNKNOWN_NAME.to_string(),
            user_principal_name: id.contains('@').then(|| id.to_string()),
            roles: roles.iter().map(|r| role_name(*r).to_string()).collect(),
        });
    }

    if bindings.len() < 2 {
        return Err(TeamsMcpError::invalid_param(
            "members",
            "at least one member other than the caller is required",
        ));
    }
    if new_chat.chat_type == NewChatType::OneOnOne && bindings.len() != 2 {
        return Err(TeamsMcpError::invalid_param(
            "members",
            "a oneOnOne chat needs exactly one member other than the caller",
        ));
    }

    Ok(PlannedChat {
        request: CreateChatRequest {
            chat_type: new_chat.chat_type.as_chat_type().as_str().to_string(),
            topic: match new_chat.chat_type {
                NewChatType::Group => new_chat.topic.clone().filter(|t| !t.trim().is_empty()),
                NewChatType::OneOnOne => None,
            },
            members: bindings,
        },
        members,
    })
}

/// Local view of a chat whose read-back failed
pub fn fallback_chat(created: GraphChat, new_chat: &NewChat, members: Vec<ChatMember>) -> Chat {
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    Chat {
        id: created.id,
        topic: new_chat
            .topic
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| NO_TOPIC.to_string()),
        chat_type: new_chat.chat_type.as_chat_type(),
        created_date_time: Some(now.clone()),
        last_updated_date_time: Some(now),
        web_url: created.web_url,
        members,
        last_message_preview: None,
    }
}

fn role_name(role: MemberRole) -> &'static str {
    match role {
        MemberRole::Owner => "owner",
        MemberRole::Guest => "guest",
    }
}
