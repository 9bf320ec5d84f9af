//! MCP Tool definitions and handlers
//!
//! Defines all available tools and their implementations.

use serde_json::Value;

use crate::config::graph::MAX_MESSAGE_PAGE_SIZE;
use crate::config::Config;
use crate::error::{GraphApiError, McpError, Result, TeamsMcpError};
use crate::graph::chats::ChatListRequest;
use crate::graph::client::GraphClient;
use crate::graph::messages::{MessageListRequest, OutgoingMessage, RecentMessagesRequest};
use crate::graph::query::EndpointProfile;
use crate::mcp::args::{
    self, CreateChatArgs, GetChatArgs, GetUserArgs, ListChatsArgs, ListMessagesArgs,
    ListRecentMessagesArgs, SendMessageArgs,
};
use crate::mcp::format;
use crate::mcp::types::{CallToolResult, Tool};

/// Tool names
pub mod names {
    pub const LIST_CHATS: &str = "list-chats";
    pub const GET_CHAT: &str = "get-chat";
    pub const LIST_MESSAGES: &str = "list-messages";
    pub const LIST_RECENT_MESSAGES: &str = "list-recent-messages";
    pub const CREATE_CHAT: &str = "create-chat";
    pub const SEND_MESSAGE: &str = "send-message";
    pub const GET_USER: &str = "get-user";
}

/// Tool handler
pub struct ToolHandler {
    config: Config,

    /// Shared connection pool; credentials are attached per call
    http_client: reqwest::Client,
}

impl ToolHandler {
    /// Create a new tool handler
    pub fn new(config: Config) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            config,
            http_client: builder.build()?,
        })
    }

    /// List all available tools
    pub fn list_tools(&self) -> Vec<Tool> {
        vec![
            tool_def(
                names::LIST_CHATS,
                "Lists the signed-in user's Teams chats with members and last message preview. Requires Chat.ReadBasic.",
                args::schema::<ListChatsArgs>(),
            ),
            tool_def(
                names::GET_CHAT,
                "Gets one chat with its members. Requires Chat.ReadBasic.",
                args::schema::<GetChatArgs>(),
            ),
            tool_def(
                names::LIST_MESSAGES,
                "Lists messages in a chat, newest first, with optional sender, importance, date, text and read-state filters. Requires Chat.Read.",
                args::schema::<ListMessagesArgs>(),
            ),
            tool_def(
                names::LIST_RECENT_MESSAGES,
                "Lists the most recent messages across the user's most recently active chats. Chats that cannot be read are skipped. Requires Chat.Read.",
                args::schema::<ListRecentMessagesArgs>(),
            ),
            tool_def(
                names::CREATE_CHAT,
                "Creates a oneOnOne or group chat; the signed-in user is added as owner. Requires Chat.Create.",
                args::schema::<CreateChatArgs>(),
            ),
            tool_def(
                names::SEND_MESSAGE,
                "Sends a text or HTML message to a chat. Requires ChatMessage.Send.",
                args::schema::<SendMessageArgs>(),
            ),
            tool_def(
                names::GET_USER,
                "Gets the signed-in user, or another user by ID or principal name. Requires User.Read or User.ReadBasic.All.",
                args::schema::<GetUserArgs>(),
            ),
        ]
    }

    /// Call a tool by name
    pub async fn call_tool(&self, name: &str, args: Value) -> CallToolResult {
        let result = match name {
            names::LIST_CHATS => self.handle_list_chats(args).await,
            names::GET_CHAT => self.handle_get_chat(args).await,
            names::LIST_MESSAGES => self.handle_list_messages(args).await,
            names::LIST_RECENT_MESSAGES => self.handle_list_recent_messages(args).await,
            names::CREATE_CHAT => self.handle_create_chat(args).await,
            names::SEND_MESSAGE => self.handle_send_message(args).await,
            names::GET_USER => self.handle_get_user(args).await,
            _ => Err(McpError::UnknownTool {
                name: name.to_string(),
            }
            .into()),
        };

        result.unwrap_or_else(|e| {
            tracing::warn!(tool = name, kind = e.kind().label(), "Tool call failed: {}", e);
            format::failure(&e)
        })
    }

    /// Graph client for this call's credential
    fn client(&self, access_token: Option<&str>) -> Result<GraphClient> {
        let token = access_token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .or(self.config.access_token.as_deref())
            .ok_or(GraphApiError::MissingToken)?;

        GraphClient::new(
            self.http_client.clone(),
            self.config.graph_base_url.as_str(),
            token,
        )
    }

    fn chat_profile(&self) -> EndpointProfile {
        EndpointProfile::chats(&self.config.service)
    }

    fn message_profile(&self) -> EndpointProfile {
        EndpointProfile::messages(&self.config.service)
    }

    // ==================== Tool Handlers ====================

    async fn handle_list_chats(&self, args: Value) -> Result<CallToolResult> {
        let args: ListChatsArgs = args::parse(args)?;

        let request = ChatListRequest {
            options: args.list_options(),
            filter: args.chat_filter(),
            next_link: non_blank(args.next_link.as_deref()),
        };

        let client = self.client(args.access_token.as_deref())?;
        let listing = client.chats().list(&request, &self.chat_profile()).await?;
        Ok(format::chat_list(&listing))
    }

    async fn handle_get_chat(&self, args: Value) -> Result<CallToolResult> {
        let args: GetChatArgs = args::parse(args)?;
        let expand = args.expand(&self.config.service.chat_expand);

        let client = self.client(args.access_token.as_deref())?;
        let chat = client.chats().get(args.chat_id.trim(), &expand).await?;
        Ok(format::chat_details(&chat))
    }

    async fn handle_list_messages(&self, args: Value) -> Result<CallToolResult> {
        let args: ListMessagesArgs = args::parse(args)?;
        let chat_id = args.chat_id.trim();

        let request = MessageListRequest {
            options: args.list_options(),
            filter: args.filters.to_filter()?,
            next_link: non_blank(args.next_link.as_deref()),
        };

        let client = self.client(args.access_token.as_deref())?;
        let listing = client
            .messages()
            .list(chat_id, &request, &self.message_profile())
            .await?;
        Ok(format::message_list(chat_id, &listing))
    }

    async fn handle_list_recent_messages(&self, args: Value) -> Result<CallToolResult> {
        let args: ListRecentMessagesArgs = args::parse(args)?;
        let service = &self.config.service;
        let chat_profile = self.chat_profile();
        let message_profile = self.message_profile();

        // Over-limit values are clamped like the single-chat listings
        let request = RecentMessagesRequest {
            chat_limit: chat_profile
                .effective_top(Some(args.chat_limit.unwrap_or(service.recent_chat_limit))),
            per_chat: message_profile
                .effective_top(Some(args.per_chat.unwrap_or(service.recent_messages_per_chat))),
            top: args
                .top
                .unwrap_or(service.message_page_size)
                .clamp(1, MAX_MESSAGE_PAGE_SIZE),
            skip: args.skip.unwrap_or(0),
            filter: args.filters.to_filter()?,
        };

        let client = self.client(args.access_token.as_deref())?;
        let recent = client
            .messages()
            .recent(&request, &chat_profile, &message_profile)
            .await?;
        Ok(format::recent_messages(&recent, request.skip))
    }

    async fn handle_create_chat(&self, args: Value) -> Result<CallToolResult> {
        let args: CreateChatArgs = args::parse(args)?;
        let new_chat = args.new_chat();

        let client = self.client(args.access_token.as_deref())?;
        let created = client
            .chats()
            .create(&new_chat, self.config.service.default_member_role)
            .await?;
        Ok(format::created_chat(&created))
    }

    async fn handle_send_message(&self, args: Value) -> Result<CallToolResult> {
        let args: SendMessageArgs = args::parse(args)?;
        if args.content.trim().is_empty() {
            return Err(TeamsMcpError::invalid_param("content", "must not be blank"));
        }

        let chat_id = args.chat_id.trim();
        let message = OutgoingMessage {
            content: args.content.clone(),
            content_type: args.content_type.unwrap_or_default(),
            importance: args.importance.unwrap_or_default(),
        };

        let client = self.client(args.access_token.as_deref())?;
        let sent = client.messages().send(chat_id, &message).await?;
        Ok(format::sent_message(chat_id, &sent))
    }

    async fn handle_get_user(&self, args: Value) -> Result<CallToolResult> {
        let args: GetUserArgs = args::parse(args)?;

        let client = self.client(args.access_token.as_deref())?;
        let user = match args.user_id() {
            Some(id) => client.user(&id).await?,
            None => client.me().await?,
        };
        Ok(format::user(&user))
    }
}

fn tool_def(name: &str, description: &str, schema: Value) -> Tool {
    Tool {
        name: name.to_string(),
        description: Some(description.to_string()),
        input_schema: schema,
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn handler(token: Option<&str>) -> ToolHandler {
        let mut config = Config::default();
        config.access_token = token.map(str::to_string);
        ToolHandler::new(config).unwrap()
    }

    #[test]
    fn test_list_tools() {
        let tools = handler(None).list_tools();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "list-chats",
                "get-chat",
                "list-messages",
                "list-recent-messages",
                "create-chat",
                "send-message",
                "get-user"
            ]
        );
        assert!(tools.iter().all(|t| t.input_schema["type"] == "object"));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let result = handler(Some("t")).call_tool("delete-chat", json!({})).await;
        assert!(result.is_error);
        assert!(result.text_content().contains("Unknown tool: delete-chat"));
    }

    #[tokio::test]
    async fn test_missing_token_fails_before_request() {
        let result = handler(None).call_tool("list-chats", json!({})).await;
        assert!(result.is_error);
        let meta = result.metadata.unwrap();
        assert_eq!(meta["error"]["kind"], "authentication");
        assert!(meta["error"]["hint"]
            .as_str()
            .unwrap()
            .contains("GRAPH_ACCESS_TOKEN"));
    }

    #[tokio::test]
    async fn test_validation_precedes_credential_check() {
        let result = handler(None)
            .call_tool(
                "list-messages",
                json!({ "chatId": "c1", "createdAfter": "not a date" }),
            )
            .await;
        assert!(result.is_error);
        assert_eq!(result.metadata.unwrap()["error"]["kind"], "validation");
    }

    #[tokio::test]
    async fn test_blank_message_rejected() {
        let result = handler(Some("t"))
            .call_tool("send-message", json!({ "chatId": "c1", "content": "   " }))
            .await;
        assert!(result.is_error);
        assert!(result.text_content().contains("content"));
    }
}
