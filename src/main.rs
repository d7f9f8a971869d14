use std::sync::Arc;

use clap::Parser;
use rmcp::{
    handler::server::tool::ToolRouter, handler::server::wrapper::Parameters,
    model::*, tool, tool_handler, tool_router,
    transport::stdio, ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

mod annotate;
mod apis;
mod assemble;
mod classify;
mod config;
mod extract;
mod health;
mod http;
mod models;
mod normalize;
mod pipeline;
mod search;

use config::Config;
use models::{ExtractionRequest, SearchRequest};
use pipeline::Pipeline;

// ── CLI ─────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "paper-extract")]
#[command(about = "Academic paper search and structured content extraction")]
#[command(version)]
struct Cli {
    /// Transport mode: stdio (MCP) or http (REST)
    #[arg(long, default_value = "stdio")]
    transport: Transport,

    /// HTTP server port (only used with --transport http)
    #[arg(long, default_value = "8000", env = "PORT")]
    port: u16,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum Transport {
    /// MCP over standard input/output
    #[default]
    Stdio,
    /// REST endpoints under /api/tools
    Http,
}

// ── Server ──────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct PaperExtractServer {
    tool_router: ToolRouter<Self>,
    pipeline: Arc<Pipeline>,
}

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| McpError::internal_error(format!("Serialization error: {}", e), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[tool_router]
impl PaperExtractServer {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            pipeline,
        }
    }

    #[tool(description = "Search the bibliographic index. Returns normalized results with relevance scores in [0,1], integer years, citation counts and bare DOIs.")]
    async fn search_papers(
        &self,
        Parameters(params): Parameters<SearchRequest>,
    ) -> Result<CallToolResult, McpError> {
        json_result(&self.pipeline.search(&params).await)
    }

    #[tool(description = "Extract title, abstract, key findings, methodology, citations and authors from an arXiv abstract page, a DOI link or a direct PDF link. Failures are reported in metadata.extraction_success and metadata.failure_reason.")]
    async fn extract_content(
        &self,
        Parameters(params): Parameters<ExtractionRequest>,
    ) -> Result<CallToolResult, McpError> {
        json_result(&self.pipeline.extract(&params).await)
    }

    #[tool(description = "Check liveness of the GROBID and OpenAlex upstreams")]
    async fn check_health(&self) -> Result<CallToolResult, McpError> {
        json_result(&self.pipeline.health().await)
    }

    #[tool(description = "List extractors in routing order and the upstream each one targets")]
    async fn list_extractors(&self) -> Result<CallToolResult, McpError> {
        json_result(&self.pipeline.extractors())
    }
}

#[tool_handler]
impl ServerHandler for PaperExtractServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Search academic papers through OpenAlex and extract structured content \
                 from arXiv abstract pages, DOI links and PDF documents (via GROBID)."
                    .into(),
            ),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        transport = ?cli.transport,
        openalex = %config.openalex_url,
        grobid = %config.grobid_url,
        "Starting paper-extract"
    );

    let pipeline = Arc::new(Pipeline::from_config(&config)?);

    match cli.transport {
        Transport::Stdio => {
            let service = PaperExtractServer::new(pipeline).serve(stdio()).await?;
            service.waiting().await?;
        }
        Transport::Http => {
            http::serve(pipeline, cli.port).await?;
        }
    }

    Ok(())
}
