//! Teams Chat MCP Server Library
//!
//! A Model Context Protocol (MCP) server for Microsoft Teams chats.
//! Provides tools for listing chats, reading and sending messages, and
//! creating chats via the Microsoft Graph API.

pub mod config;
pub mod error;
pub mod graph;
pub mod mcp;

pub use config::Config;
pub use error::{Result, TeamsMcpError};
