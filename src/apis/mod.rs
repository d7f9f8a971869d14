pub mod arxiv;
pub mod grobid;
pub mod openalex;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::classify::SourceKind;

const USER_AGENT: &str = concat!("paper-extract/", env!("CARGO_PKG_VERSION"));

/// Fields produced by one extractor before heuristics fill the gaps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub title: String,
    pub abstract_text: String,
    /// `None` when the upstream has no structured methodology section.
    pub methodology: Option<String>,
    pub citations: Vec<String>,
    pub authors: Option<Vec<String>>,
}

/// Which upstream path produced an extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionPath {
    AbstractFeed,
    IdentifierResolution,
    DocumentFulltext,
}

impl ExtractionPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionPath::AbstractFeed => "abstract_feed",
            ExtractionPath::IdentifierResolution => "identifier_resolution",
            ExtractionPath::DocumentFulltext => "document_fulltext",
        }
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Upstream returned {status} for {url}")]
    Status { status: u16, url: String },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Empty document: {0}")]
    EmptyDocument(String),
}

/// One step of the extraction fallback chain.
#[async_trait]
pub trait Extractor: Send + Sync {
    fn name(&self) -> &str;
    fn path(&self) -> ExtractionPath;
    /// Whether this extractor should be attempted for the given source.
    fn applies_to(&self, url: &str, kind: &SourceKind) -> bool;
    /// `Ok(None)` means the upstream answered but had nothing usable.
    async fn extract(&self, url: &str, kind: &SourceKind) -> Result<Option<Extraction>, SourceError>;
}

/// Build an HTTP client with the given connect and total timeouts.
pub fn http_client(
    connect_timeout: Duration,
    timeout: Duration,
    contact_email: Option<&str>,
) -> Result<reqwest::Client, SourceError> {
    let ua = match contact_email {
        Some(e) => format!("{} (mailto:{})", USER_AGENT, e),
        None => USER_AGENT.to_string(),
    };
    Ok(reqwest::Client::builder()
        .user_agent(ua)
        .connect_timeout(connect_timeout)
        .timeout(timeout)
        .build()?)
}

/// Collapse runs of whitespace (including newlines) into single spaces.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn ensure_success(resp: &reqwest::Response) -> Result<(), SourceError> {
    if resp.status().is_success() {
        Ok(())
    } else {
        Err(SourceError::Status {
            status: resp.status().as_u16(),
            url: resp.url().to_string(),
        })
    }
}
