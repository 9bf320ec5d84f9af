//! Message operations
//!
//! Listing and sending chat messages, and the sequential cross-chat
//! aggregation behind the recent-messages view.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::graph::scopes;
use crate::error::Result;
use crate::graph::chats::{ChatListRequest, Listing};
use crate::graph::client::{segment, GraphClient};
use crate::graph::normalize::{self, filter_read_state, ChatMessage, Page};
use crate::graph::query::{combine_filters, translate, EndpointProfile, ListOptions, MessageFilter};
use crate::graph::types::{
    ContentType, GraphChatMessage, GraphCollection, Importance, ItemBodyRequest,
    SendMessageRequest,
};

/// A message listing request for one chat
#[derive(Debug, Clone, Default)]
pub struct MessageListRequest {
    pub options: ListOptions,
    pub filter: MessageFilter,
    /// Continue from a previous page instead of building a query
    pub next_link: Option<String>,
}

/// A message to post
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub content: String,
    pub content_type: ContentType,
    pub importance: Importance,
}

/// Parameters of the cross-chat aggregation
#[derive(Debug, Clone, Default)]
pub struct RecentMessagesRequest {
    /// Chats to visit, most recently active first
    pub chat_limit: u32,
    /// Messages requested from each chat
    pub per_chat: u32,
    /// Window applied after sorting
    pub top: u32,
    pub skip: u32,
    pub filter: MessageFilter,
}

/// A chat left out of the aggregation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedChat {
    pub chat_id: String,
    pub topic: String,
    pub reason: String,
}

/// Aggregated recent messages
#[derive(Debug, Clone)]
pub struct RecentMessages {
    pub page: Page<ChatMessage>,
    /// Messages matching the filter before the window was applied
    pub total_matched: usize,
    pub chats_scanned: usize,
    pub skipped: Vec<SkippedChat>,
}

/// Message manager for Graph operations
pub struct MessageManager<'a> {
    client: &'a GraphClient,
}

impl<'a> MessageManager<'a> {
    /// Create a new message manager
    pub fn new(client: &'a GraphClient) -> Self {
        Self { client }
    }

    fn messages_url(&self, chat_id: &str) -> String {
        self.client
            .url(&format!("/chats/{}/messages", segment(chat_id)))
    }

    /// List messages in one chat
    pub async fn list(
        &self,
        chat_id: &str,
        request: &MessageListRequest,
        profile: &EndpointProfile,
    ) -> Result<Listing<ChatMessage>> {
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
                (query.apply_to(&self.messages_url(chat_id)), query.warnings)
            }
        };

        for warning in &warnings {
            tracing::warn!("{}", warning);
        }

        let raw: GraphCollection<GraphChatMessage> =
            self.client.get_json(&url, scopes::CHAT_READ).await?;

        let mut page = normalize::message_page(raw);
        let retrieved = page.count;
        filter_read_state(&mut page, request.filter.is_read);

        tracing::info!(
            chat_id,
            retrieved,
            returned = page.count,
            "Listed chat messages"
        );

        Ok(Listing { page, warnings })
    }

    /// Post a message to a chat
    pub async fn send(&self, chat_id: &str, message: &OutgoingMessage) -> Result<ChatMessage> {
        let request = SendMessageRequest {
            body: ItemBodyRequest {
                content_type: message.content_type,
                content: message.content.clone(),
            },
            importance: message.importance,
        };

        let raw: GraphChatMessage = self
            .client
            .post_json(&self.messages_url(chat_id), &request, scopes::CHAT_MESSAGE_SEND)
            .await?;

        tracing::info!(chat_id, message_id = %raw.id, "Message sent");

        let mut sent = normalize::message(raw);
        sent.chat_id.get_or_insert_with(|| chat_id.to_string());
        Ok(sent)
    }

    /// Recent messages across the caller's chats.
    ///
    /// Chats are visited one after another. A chat whose listing fails is
    /// recorded in `skipped` and the walk continues.
    pub async fn recent(
        &self,
        request: &RecentMessagesRequest,
        chat_profile: &EndpointProfile,
        message_profile: &EndpointProfile,
    ) -> Result<RecentMessages> {
        let chats = self
            .client
            .chats()
            .list(
                &ChatListRequest {
                    options: ListOptions {
                        top: Some(request.chat_limit),
                        order_by: vec!["lastMessagePreview/createdDateTime desc".to_string()],
                        ..Default::default()
                    },
                    ..Default::default()
                },
                chat_profile,
            )
            .await?
            .page;

        // Read state is applied once over the merged set.
        let per_chat = MessageListRequest {
            options: ListOptions {
                top: Some(request.per_chat),
                ..Default::default()
            },
            filter: MessageFilter {
                is_read: None,
                ..request.filter.clone()
            },
            next_link: None,
        };

        let mut collected = Vec::new();
        let mut skipped = Vec::new();

        for chat in &chats.items {
            match self.list(&chat.id, &per_chat, message_profile).await {
                Ok(listing) => {
                    collected.extend(listing.page.items.into_iter().map(|mut m| {
                        m.chat_id.get_or_insert_with(|| chat.id.clone());
                        m
                    }));
                }
                Err(e) => {
                    tracing::warn!(chat_id = %chat.id, "Skipping chat: {}", e);
                    skipped.push(SkippedChat {
                        chat_id: chat.id.clone(),
                        topic: chat.topic.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let mut merged = Page::new(collected, None);
        filter_read_state(&mut merged, request.filter.is_read);
        sort_newest_first(&mut merged.items);

        let total_matched = merged.count;
        let window: Vec<ChatMessage> = merged
            .items
            .into_iter()
            .skip(request.skip as usize)
            .take(request.top as usize)
            .collect();

        Ok(RecentMessages {
            page: Page::new(window, None),
            total_matched,
            chats_scanned: chats.items.len(),
            skipped,
        })
    }
}

/// Sort by `createdDateTime` descending; undated messages last
pub fn sort_newest_first(messages: &mut [ChatMessage]) {
    messages.sort_by_cached_key(|m| {
        std::cmp::Reverse(
            m.created_date_time
                .as_deref()
                .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
                .map(|t| t.with_timezone(&Utc)),
        )
    });
}
