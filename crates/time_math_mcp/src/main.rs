use std::env;
use tracing_subscriber::{self, EnvFilter};

mod core;
mod server;

/// Time Math MCP Server
///
/// An MCP server exposing batch time arithmetic:
/// - Tools: calendar-aware add/subtract, differences, duration breakdowns,
///   timestamp statistics and chronological sorting over batched inputs
/// - Resources: server status, help and operation reference
///
/// Usage: npx @modelcontextprotocol/inspector cargo run --bin mcp-server-time-math
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging only if LOG_LEVEL environment variable is set
    if let Ok(log_level) = env::var("LOG_LEVEL") {
        // Initialize the tracing subscriber with stderr logging; stdout
        // carries the MCP transport
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level)),
            )
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .init();

        tracing::info!("Starting Time Math MCP server with log level: {}", log_level);
    }

    if let Err(e) = server::run().await {
        // Only log error if logging is initialized
        if env::var("LOG_LEVEL").is_ok() {
            tracing::error!("Error running Time Math MCP server: {}", e);
        }
        return Err(e);
    }

    Ok(())
}
