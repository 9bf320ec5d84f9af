//! Teams Chat MCP Server
//!
//! A Model Context Protocol (MCP) server for Microsoft Teams chats.
//! Provides tools for listing chats, reading and sending messages, and
//! creating chats via the Microsoft Graph API.

use clap::{Parser, Subcommand};

use teams_chat_mcp_server::config::Config;
use teams_chat_mcp_server::error::Result;
use teams_chat_mcp_server::graph::token::TokenClaims;
use teams_chat_mcp_server::mcp::server::McpServer;
use teams_chat_mcp_server::TeamsMcpError;

/// Teams Chat MCP Server
#[derive(Parser)]
#[command(name = "teams-chat-mcp-server")]
#[command(author, version, about = "Teams Chat MCP Server - A Model Context Protocol server for Microsoft Teams chats")]
struct Cli {
    /// Microsoft Graph base URL (overrides GRAPH_API_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode an access token and show its tenant, user, scopes and expiry
    TokenInfo {
        /// Token to inspect (defaults to GRAPH_ACCESS_TOKEN)
        token: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the protocol; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::new()?;
    if let Some(base_url) = cli.base_url.as_deref() {
        config = config.with_base_url(base_url)?;
    }

    match cli.command {
        Some(Commands::TokenInfo { token }) => {
            let token = token.or_else(|| config.access_token.clone());
            print_token_info(token.as_deref())
        }
        None => {
            if config.access_token.is_none() {
                tracing::warn!(
                    "GRAPH_ACCESS_TOKEN is not set; tool calls must pass accessToken"
                );
            }

            let mut server = McpServer::new(config)?;
            server.run_stdio().await
        }
    }
}

fn print_token_info(token: Option<&str>) -> Result<()> {
    let token = token.ok_or_else(|| {
        TeamsMcpError::invalid_param("token", "pass a token or set GRAPH_ACCESS_TOKEN")
    })?;

    let claims = TokenClaims::decode(token).ok_or_else(|| {
        TeamsMcpError::invalid_param("token", "not a JWT; opaque tokens cannot be inspected")
    })?;

    println!("Tenant:   {}", claims.tid.as_deref().unwrap_or("-"));
    println!("User:     {}", claims.principal().unwrap_or("-"));
    println!("Audience: {}", claims.aud.as_deref().unwrap_or("-"));

    let scopes = claims.scopes();
    if scopes.is_empty() {
        println!("Scopes:   -");
    } else {
        println!("Scopes:   {}", scopes.join(" "));
    }

    match claims
        .exp
        .and_then(|exp| chrono::DateTime::from_timestamp(exp, 0))
    {
        Some(expiry) if claims.is_expired() => println!("Expired:  {} (expired)", expiry),
        Some(expiry) => println!("Expires:  {}", expiry),
        None => println!("Expires:  -"),
    }

    Ok(())
}
