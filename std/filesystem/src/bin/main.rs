//! Binary entry point for the mcp-filesystem-server MCP server.

use clap::{Parser, ValueEnum};
use mcp_filesystem_server::{FilesystemServer, config::ToolFilter, http, validate::AllowedRoots};
use rmcp::ServiceExt;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Transport {
    Stdio,
    Http,
}

/// MCP Filesystem Server: sandboxed file and directory tools.
#[derive(Parser)]
#[command(name = "mcp-filesystem-server", version, about)]
struct Cli {
    /// Transport to serve the MCP protocol over.
    #[arg(long, value_enum, default_value = "stdio")]
    transport: Transport,

    /// Host to bind for the HTTP transport.
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Port to bind for the HTTP transport.
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Comma-separated tools to enable. Accepts exact names and wildcards
    /// such as `read_*`.
    #[arg(long, default_value = "all")]
    tools: ToolFilter,

    /// Allowed directories the server may access.
    #[arg(required = true, num_args = 1..)]
    allowed_dirs: Vec<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the stdio transport, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let roots = AllowedRoots::new(&cli.allowed_dirs)?;
    for dir in roots.dirs() {
        tracing::info!(dir = %dir.display(), "allowed directory");
    }
    let server = FilesystemServer::new(roots, &cli.tools);

    match cli.transport {
        Transport::Stdio => {
            tracing::info!("serving MCP over stdio");
            server
                .serve(rmcp::transport::stdio())
                .await?
                .waiting()
                .await?;
        }
        Transport::Http => http::serve(server, &cli.host, cli.port).await?,
    }
    Ok(())
}
