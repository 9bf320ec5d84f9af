//! OData query translation
//!
//! Turns validated listing options into Graph query strings. Everything in
//! here is a pure function of its inputs; caller options are only borrowed.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

use crate::config::graph::{MAX_CHAT_PAGE_SIZE, MAX_MESSAGE_PAGE_SIZE};
use crate::config::ServiceConfig;
use crate::error::Result;
use crate::error::TeamsMcpError;
use crate::graph::types::{ChatType, Importance};

/// Shape a listing request before translation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListOptions {
    pub top: Option<u32>,
    pub skip: Option<u32>,
    pub filter: Option<String>,
    pub order_by: Vec<String>,
    pub select: Vec<String>,
    pub expand: Vec<String>,
}

/// Per-endpoint limits and defaults
#[derive(Debug, Clone)]
pub struct EndpointProfile {
    pub default_top: u32,
    pub max_top: u32,
    pub default_order_by: Vec<String>,
    pub default_expand: Vec<String>,
    /// `/me/chats` silently ignores `$skip`
    pub supports_skip: bool,
}

impl EndpointProfile {
    /// `/me/chats`
    pub fn chats(service: &ServiceConfig) -> Self {
        Self {
            default_top: service.chat_page_size,
            max_top: MAX_CHAT_PAGE_SIZE,
            default_order_by: Vec::new(),
            default_expand: service.chat_expand.clone(),
            supports_skip: false,
        }
    }

    /// `/chats/{id}/messages`
    pub fn messages(service: &ServiceConfig) -> Self {
        Self {
            default_top: service.message_page_size,
            max_top: MAX_MESSAGE_PAGE_SIZE,
            default_order_by: vec!["createdDateTime desc".to_string()],
            default_expand: Vec::new(),
            supports_skip: true,
        }
    }

    /// Clamp a requested page size into `1..=max_top`
    pub fn effective_top(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_top)
            .clamp(1, self.max_top)
    }
}

/// Result of translating [`ListOptions`]
#[derive(Debug, Clone, Default)]
pub struct TranslatedQuery {
    /// Ordered `(key, raw value)` pairs
    pub params: Vec<(&'static str, String)>,

    /// Conditions the caller should be told about
    pub warnings: Vec<String>,
}

impl TranslatedQuery {
    /// Raw (unencoded) value of a parameter
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Percent-encoded query string without the leading `?`
    pub fn to_query_string(&self) -> String {
        self.params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Append this query to a URL
    pub fn apply_to(&self, url: &str) -> String {
        if self.params.is_empty() {
            url.to_string()
        } else {
            format!("{}?{}", url, self.to_query_string())
        }
    }
}

/// Translate listing options for one endpoint
pub fn translate(options: &ListOptions, profile: &EndpointProfile) -> TranslatedQuery {
    let mut query = TranslatedQuery::default();

    let top = profile.effective_top(options.top);
    if let Some(requested) = options.top {
        if requested > profile.max_top {
            tracing::debug!(requested, clamped = top, "Clamping $top to endpoint maximum");
        }
    }
    query.params.push(("$top", top.to_string()));

    if let Some(skip) = options.skip.filter(|s| *s > 0) {
        if profile.supports_skip {
            query.params.push(("$skip", skip.to_string()));
        } else {
            query.warnings.push(format!(
                "skip={} ignored: this endpoint does not support $skip; use nextLink to page",
                skip
            ));
        }
    }

    if let Some(filter) = options.filter.as_deref().filter(|f| !f.trim().is_empty()) {
        query.params.push(("$filter", filter.to_string()));
    }

    let order_by = non_empty_or(&options.order_by, &profile.default_order_by);
    if !order_by.is_empty() {
        query.params.push(("$orderby", order_by.join(",")));
    }

    if !options.select.is_empty() {
        query.params.push(("$select", options.select.join(",")));
    }

    let expand = non_empty_or(&options.expand, &profile.default_expand);
    if !expand.is_empty() {
        query.params.push(("$expand", expand.join(",")));
    }

    query
}

fn non_empty_or<'a>(given: &'a [String], default: &'a [String]) -> &'a [String] {
    if given.is_empty() {
        default
    } else {
        given
    }
}

// ==================== Filter synthesis ====================

/// Structured message predicates, translated server-side where Graph allows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageFilter {
    /// Sender user id
    pub from: Option<String>,
    pub importance: Option<Importance>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    /// Substring of the message body
    pub contains: Option<String>,
    /// Read flag, applied after retrieval
    pub is_read: Option<bool>,
}

impl MessageFilter {
    /// OData clauses in a fixed order: sender, importance, dates, substring
    pub fn clauses(&self) -> Vec<String> {
        let mut clauses = Vec::new();

        if let Some(ref from) = self.from {
            clauses.push(format!("from/user/id eq {}", quote_literal(from)));
        }
        if let Some(importance) = self.importance {
            clauses.push(format!(
                "importance eq {}",
                quote_literal(importance.as_str())
            ));
        }
        if let Some(after) = self.created_after {
            clauses.push(format!("createdDateTime gt {}", format_datetime(&after)));
        }
        if let Some(before) = self.created_before {
            clauses.push(format!("createdDateTime lt {}", format_datetime(&before)));
        }
        if let Some(ref text) = self.contains {
            clauses.push(format!("contains(body/content, {})", quote_literal(text)));
        }

        clauses
    }
}

/// Structured chat predicates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatFilter {
    pub chat_type: Option<ChatType>,
}

impl ChatFilter {
    pub fn clauses(&self) -> Vec<String> {
        self.chat_type
            .map(|t| vec![format!("chatType eq {}", quote_literal(t.as_str()))])
            .unwrap_or_default()
    }
}

/// Join a raw caller filter and synthesized clauses with `and`
pub fn combine_filters(raw: Option<&str>, clauses: Vec<String>) -> Option<String> {
    let raw = raw.map(str::trim).filter(|r| !r.is_empty());

    match (raw, clauses.is_empty()) {
        (None, true) => None,
        (Some(raw), true) => Some(raw.to_string()),
        (None, false) => Some(clauses.join(" and ")),
        (Some(raw), false) => {
            let mut parts = vec![format!("({})", raw)];
            parts.extend(clauses);
            Some(parts.join(" and "))
        }
    }
}

/// OData string literal with embedded quotes doubled
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// OData `DateTimeOffset` literal (UTC, second precision)
pub fn format_datetime(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse an RFC 3339 timestamp or a bare `YYYY-MM-DD` date (midnight UTC)
pub fn parse_datetime(name: &str, value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| {
            TeamsMcpError::invalid_param(
                name,
                format!("'{}' is not an RFC 3339 timestamp or YYYY-MM-DD date", value),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> ServiceConfig {
        ServiceConfig::default()
    }

    #[test]
    fn test_top_defaults_and_clamps() {
        let messages = EndpointProfile::messages(&service());
        let chats = EndpointProfile::chats(&service());

        let q = translate(&ListOptions::default(), &messages);
        assert_eq!(q.get("$top"), Some("50"));

        let q = translate(
            &ListOptions {
                top: Some(5000),
                ..Default::default()
            },
            &messages,
        );
        assert_eq!(q.get("$top"), Some("1000"));

        let q = translate(
            &ListOptions {
                top: Some(120),
                ..Default::default()
            },
            &chats,
        );
        assert_eq!(q.get("$top"), Some("50"));
    }

    #[test]
    fn test_message_defaults_order_by_created_desc() {
        let q = translate(&ListOptions::default(), &EndpointProfile::messages(&service()));
        assert_eq!(q.get("$orderby"), Some("createdDateTime desc"));
        assert!(q.get("$expand").is_none());
    }

    #[test]
    fn test_chat_skip_dropped_with_warning() {
        let q = translate(
            &ListOptions {
                skip: Some(20),
                ..Default::default()
            },
            &EndpointProfile::chats(&service()),
        );
        assert!(q.get("$skip").is_none());
        assert_eq!(q.warnings.len(), 1);
        assert!(q.warnings[0].contains("nextLink"));
    }

    #[test]
    fn test_message_skip_passed_through() {
        let q = translate(
            &ListOptions {
                skip: Some(20),
                ..Default::default()
            },
            &EndpointProfile::messages(&service()),
        );
        assert_eq!(q.get("$skip"), Some("20"));
        assert!(q.warnings.is_empty());
    }

    #[test]
    fn test_arrays_joined_with_commas() {
        let options = ListOptions {
            select: vec!["id".to_string(), "topic".to_string()],
            expand: vec!["members".to_string()],
            order_by: vec!["lastMessagePreview/createdDateTime desc".to_string()],
            ..Default::default()
        };
        let q = translate(&options, &EndpointProfile::chats(&service()));
        assert_eq!(q.get("$select"), Some("id,topic"));
        assert_eq!(q.get("$expand"), Some("members"));
        assert_eq!(
            q.get("$orderby"),
            Some("lastMessagePreview/createdDateTime desc")
        );
    }

    #[test]
    fn test_translate_does_not_mutate_options() {
        let options = ListOptions {
            top: Some(9999),
            skip: Some(3),
            ..Default::default()
        };
        let before = options.clone();
        let _ = translate(&options, &EndpointProfile::chats(&service()));
        assert_eq!(options, before);
    }

    #[test]
    fn test_query_string_percent_encodes_values() {
        let options = ListOptions {
            filter: Some("importance eq 'high'".to_string()),
            ..Default::default()
        };
        let q = translate(&options, &EndpointProfile::messages(&service()));
        let qs = q.to_query_string();
        assert!(qs.starts_with("$top=50&"));
        assert!(qs.contains("$filter=importance%20eq%20%27high%27"));
        assert!(qs.contains("$orderby=createdDateTime%20desc"));
    }

    #[test]
    fn test_message_filter_clause_per_predicate_in_order() {
        let filter = MessageFilter {
            from: Some("user-1".to_string()),
            importance: Some(Importance::High),
            created_after: Some(parse_datetime("createdAfter", "2024-01-01").unwrap()),
            created_before: Some(
                parse_datetime("createdBefore", "2024-02-01T12:30:00+02:00").unwrap(),
            ),
            contains: Some("O'Brien's plan".to_string()),
            is_read: Some(false),
        };

        let combined = combine_filters(None, filter.clauses()).unwrap();
        let parts: Vec<&str> = combined.split(" and ").collect();
        assert_eq!(
            parts,
            vec![
                "from/user/id eq 'user-1'",
                "importance eq 'high'",
                "createdDateTime gt 2024-01-01T00:00:00Z",
                "createdDateTime lt 2024-02-01T10:30:00Z",
                "contains(body/content, 'O''Brien''s plan')",
            ]
        );
    }

    #[test]
    fn test_combine_raw_filter_first() {
        let filter = MessageFilter {
            importance: Some(Importance::Urgent),
            ..Default::default()
        };
        let combined = combine_filters(Some("messageType eq 'message'"), filter.clauses());
        assert_eq!(
            combined.as_deref(),
            Some("(messageType eq 'message') and importance eq 'urgent'")
        );
        assert_eq!(combine_filters(Some("  "), Vec::new()), None);
    }

    #[test]
    fn test_chat_filter_clause() {
        let filter = ChatFilter {
            chat_type: Some(ChatType::OneOnOne),
        };
        assert_eq!(filter.clauses(), vec!["chatType eq 'oneOnOne'".to_string()]);
    }

    #[test]
    fn test_parse_datetime_rejects_garbage() {
        let err = parse_datetime("createdAfter", "last tuesday").unwrap_err();
        assert!(err.to_string().contains("createdAfter"));
    }
}
