//! Presentation formatting
//!
//! Renders normalized entities as fixed-width text tables with the full
//! entities attached as response metadata. Nothing here performs I/O.

use chrono::DateTime;
use serde_json::json;

use crate::error::TeamsMcpError;
use crate::graph::chats::{CreatedChat, Listing};
use crate::graph::messages::RecentMessages;
use crate::graph::normalize::{Chat, ChatMember, ChatMessage, User};
use crate::graph::types::ContentType;
use crate::mcp::types::CallToolResult;

/// A table column
#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub title: &'static str,
    pub width: usize,
}

const fn col(title: &'static str, width: usize) -> Column {
    Column { title, width }
}

/// Chat table layout
pub const CHAT_COLUMNS: [Column; 5] = [
    col("#", 4),
    col("Topic", 30),
    col("Type", 10),
    col("Members", 8),
    col("Last Message", 40),
];

/// Message table layout
pub const MESSAGE_COLUMNS: [Column; 5] = [
    col("#", 4),
    col("From", 20),
    col("Message", 50),
    col("Date", 17),
    col("Read", 4),
];

/// Indent of member sub-rows, aligned under the topic column
const MEMBER_INDENT: usize = 5;

// ==================== Cells ====================

/// Fit text into exactly `width` characters, cutting with `...` when longer
pub fn fit(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        let keep = width.saturating_sub(3);
        let mut cut: String = text.chars().take(keep).collect();
        cut.push_str(&".".repeat(width - keep));
        cut
    } else {
        format!("{:<width$}", text, width = width)
    }
}

/// Drop markup and decode the common entities
pub fn strip_html(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut tag: Option<String> = None;

    for ch in html.chars() {
        match tag.as_mut() {
            None if ch == '<' => tag = Some(String::new()),
            None => result.push(ch),
            Some(_) if ch == '>' => {
                let name = tag.take().unwrap_or_default();
                let name = name.trim_start_matches('/').to_ascii_lowercase();
                // Block-level tags separate words
                let name = name.split(|c: char| c.is_whitespace() || c == '/').next();
                if matches!(name, Some("br" | "p" | "div" | "li" | "tr")) {
                    result.push(' ');
                }
            }
            Some(name) => name.push(ch),
        }
    }

    result
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Collapse all whitespace runs, newlines included, into single spaces
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// One-line plain-text rendition of a message body
pub fn plain_text(content: &str, content_type: ContentType) -> String {
    match content_type {
        ContentType::Html => collapse_whitespace(&strip_html(content)),
        ContentType::Text => collapse_whitespace(content),
    }
}

/// `YYYY-MM-DD HH:MM` in UTC; unparseable values are shown as given
pub fn format_timestamp(value: Option<&str>) -> String {
    match value {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|t| t.naive_utc().format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|_| raw.to_string()),
        None => "-".to_string(),
    }
}

fn read_marker(is_read: Option<bool>) -> &'static str {
    match is_read {
        Some(true) => "yes",
        Some(false) => "no",
        None => "-",
    }
}

fn row(columns: &[Column], cells: &[String]) -> String {
    columns
        .iter()
        .zip(cells)
        .map(|(c, text)| fit(text, c.width))
        .collect::<Vec<_>>()
        .join(" ")
}

fn header(columns: &[Column]) -> String {
    let titles: Vec<String> = columns.iter().map(|c| c.title.to_string()).collect();
    let rules: Vec<String> = columns.iter().map(|c| "-".repeat(c.width)).collect();
    format!("{}\n{}", row(columns, &titles), row(columns, &rules))
}

// ==================== Tables ====================

fn member_line(member: &ChatMember) -> String {
    let mut line = format!(
        "{}- {}",
        " ".repeat(MEMBER_INDENT),
        collapse_whitespace(&member.display_name)
    );
    if let Some(upn) = &member.user_principal_name {
        line.push_str(&format!(" <{}>", upn));
    }
    if !member.roles.is_empty() {
        line.push_str(&format!(" [{}]", member.roles.join(", ")));
    }
    line
}

fn last_message_cell(chat: &Chat) -> String {
    match &chat.last_message_preview {
        Some(p) if p.is_deleted => "(deleted)".to_string(),
        Some(p) => {
            let text = plain_text(&p.content, p.content_type);
            match &p.sender {
                Some(sender) => format!("{}: {}", collapse_whitespace(sender), text),
                None => text,
            }
        }
        None => "-".to_string(),
    }
}

/// Chat table with one member sub-row per member
pub fn chats_table(chats: &[Chat]) -> String {
    let mut lines = vec![header(&CHAT_COLUMNS)];

    for (i, chat) in chats.iter().enumerate() {
        lines.push(row(
            &CHAT_COLUMNS,
            &[
                format!("{}.", i + 1),
                collapse_whitespace(&chat.topic),
                chat.chat_type.as_str().to_string(),
                chat.members.len().to_string(),
                last_message_cell(chat),
            ],
        ));
        lines.extend(chat.members.iter().map(member_line));
    }

    lines.join("\n")
}

fn message_cell(message: &ChatMessage) -> String {
    let text = plain_text(&message.body.content, message.body.content_type);
    if text.is_empty() && message.message_type != "message" {
        format!("[{}]", message.message_type)
    } else {
        text
    }
}

/// Message table, numbered from `first_index`
pub fn messages_table(messages: &[ChatMessage], first_index: usize) -> String {
    let mut lines = vec![header(&MESSAGE_COLUMNS)];

    for (i, message) in messages.iter().enumerate() {
        lines.push(row(
            &MESSAGE_COLUMNS,
            &[
                format!("{}.", first_index + i),
                message
                    .from
                    .as_ref()
                    .map(|s| collapse_whitespace(&s.display_name))
                    .unwrap_or_else(|| "-".to_string()),
                message_cell(message),
                format_timestamp(message.created_date_time.as_deref()),
                read_marker(message.is_read).to_string(),
            ],
        ));
    }

    lines.join("\n")
}

fn push_paging(text: &mut String, next_link: Option<&str>, warnings: &[String]) {
    if let Some(link) = next_link {
        text.push_str("\n\nMore results available. Pass this nextLink to continue:\n");
        text.push_str(link);
    }
    for warning in warnings {
        text.push_str(&format!("\n\nWarning: {}", warning));
    }
}

// ==================== Tool responses ====================

/// `list-chats` response
pub fn chat_list(listing: &Listing<Chat>) -> CallToolResult {
    let page = &listing.page;
    let mut text = if page.items.is_empty() {
        "No chats found.".to_string()
    } else {
        format!("Found {} chats:\n\n{}", page.count, chats_table(&page.items))
    };
    push_paging(&mut text, page.next_link.as_deref(), &listing.warnings);

    CallToolResult::text(text).with_metadata(json!({
        "chats": page.items,
        "count": page.count,
        "nextLink": page.next_link,
        "warnings": listing.warnings,
    }))
}

fn chat_summary(chat: &Chat) -> String {
    let mut text = format!(
        "Chat: {}\nID: {}\nType: {}\nCreated: {}\nLast updated: {}",
        chat.topic,
        chat.id,
        chat.chat_type.as_str(),
        format_timestamp(chat.created_date_time.as_deref()),
        format_timestamp(chat.last_updated_date_time.as_deref()),
    );
    if let Some(url) = &chat.web_url {
        text.push_str(&format!("\nLink: {}", url));
    }

    text.push_str(&format!("\n\nMembers ({}):", chat.members.len()));
    for member in &chat.members {
        text.push('\n');
        text.push_str(&member_line(member));
    }

    if chat.last_message_preview.is_some() {
        text.push_str(&format!("\n\nLast message: {}", last_message_cell(chat)));
    }
    text
}

/// `get-chat` response
pub fn chat_details(chat: &Chat) -> CallToolResult {
    CallToolResult::text(chat_summary(chat)).with_metadata(json!({ "chat": chat }))
}

/// `create-chat` response
pub fn created_chat(created: &CreatedChat) -> CallToolResult {
    let mut text = format!("Chat created successfully.\n\n{}", chat_summary(&created.chat));
    if created.fallback {
        text.push_str(
            "\n\nNote: the new chat could not be read back; details above reflect the request.",
        );
    }

    CallToolResult::text(text).with_metadata(json!({
        "chat": created.chat,
        "fallback": created.fallback,
    }))
}

/// `list-messages` response
pub fn message_list(chat_id: &str, listing: &Listing<ChatMessage>) -> CallToolResult {
    let page = &listing.page;
    let mut text = if page.items.is_empty() {
        format!("No messages found in chat {}.", chat_id)
    } else {
        format!(
            "Found {} messages in chat {}:\n\n{}",
            page.count,
            chat_id,
            messages_table(&page.items, 1)
        )
    };
    push_paging(&mut text, page.next_link.as_deref(), &listing.warnings);

    CallToolResult::text(text).with_metadata(json!({
        "chatId": chat_id,
        "messages": page.items,
        "count": page.count,
        "nextLink": page.next_link,
        "warnings": listing.warnings,
    }))
}

/// `list-recent-messages` response
pub fn recent_messages(recent: &RecentMessages, skip: u32) -> CallToolResult {
    let page = &recent.page;
    let mut text = if page.items.is_empty() {
        format!("No recent messages found across {} chats.", recent.chats_scanned)
    } else {
        format!(
            "Showing {} of {} recent messages across {} chats:\n\n{}",
            page.count,
            recent.total_matched,
            recent.chats_scanned,
            messages_table(&page.items, skip as usize + 1)
        )
    };

    let warnings: Vec<String> = recent
        .skipped
        .iter()
        .map(|s| format!("skipped chat '{}' ({}): {}", s.topic, s.chat_id, s.reason))
        .collect();
    push_paging(&mut text, None, &warnings);

    CallToolResult::text(text).with_metadata(json!({
        "messages": page.items,
        "count": page.count,
        "totalMatched": recent.total_matched,
        "chatsScanned": recent.chats_scanned,
        "skippedChats": recent.skipped,
        "warnings": warnings,
    }))
}

/// `send-message` response
pub fn sent_message(chat_id: &str, message: &ChatMessage) -> CallToolResult {
    let text = format!(
        "Message sent successfully.\nChat: {}\nMessage ID: {}\nSent: {}\nImportance: {}",
        chat_id,
        message.id,
        format_timestamp(message.created_date_time.as_deref()),
        message.importance.as_str(),
    );
    CallToolResult::text(text).with_metadata(json!({ "message": message }))
}

/// `get-user` response
pub fn user(user: &User) -> CallToolResult {
    let mut text = format!("User: {}\nID: {}", user.display_name, user.id);
    if let Some(upn) = &user.user_principal_name {
        text.push_str(&format!("\nUPN: {}", upn));
    }
    if let Some(mail) = &user.mail {
        text.push_str(&format!("\nMail: {}", mail));
    }
    if let Some(title) = &user.job_title {
        text.push_str(&format!("\nJob title: {}", title));
    }
    CallToolResult::text(text).with_metadata(json!({ "user": user }))
}

/// Failed tool call: message, remediation hint and structured details
pub fn failure(err: &TeamsMcpError) -> CallToolResult {
    CallToolResult::error(format!(
        "{}: {}\nHint: {}",
        err.kind().label(),
        err,
        err.remediation()
    ))
    .with_metadata(json!({ "error": err.details() }))
}
