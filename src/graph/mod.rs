//! Microsoft Graph module
//!
//! Query translation, request execution and response normalization for the
//! Teams chat endpoints.

pub mod chats;
pub mod client;
pub mod messages;
pub mod normalize;
pub mod query;
pub mod token;
pub mod types;
