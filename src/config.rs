use std::time::Duration;

use crate::annotate::{Annotator, DEFAULT_METHOD_KEYWORDS};
use crate::apis::{self, SourceError};

const DEFAULT_METADATA_TIMEOUT_SECS: u64 = 10;
const DEFAULT_FULLTEXT_TIMEOUT_SECS: u64 = 60;
const METADATA_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const FULLTEXT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub openalex_url: String,
    pub openalex_email: Option<String>,
    pub arxiv_url: String,
    pub grobid_url: String,
    /// Total timeout for metadata lookups and liveness probes.
    pub metadata_timeout: Duration,
    /// Total timeout for document downloads and full-text processing.
    pub fulltext_timeout: Duration,
    pub method_keywords: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let base_url = |name: &str, default: &str| {
            var(name)
                .unwrap_or_else(|| default.to_string())
                .trim_end_matches('/')
                .to_string()
        };
        let secs = |name: &str, default: u64| match var(name) {
            None => Duration::from_secs(default),
            Some(raw) => match raw.parse::<u64>() {
                Ok(n) if n > 0 => Duration::from_secs(n),
                _ => {
                    tracing::warn!(variable = name, value = %raw, default, "Invalid timeout, using default");
                    Duration::from_secs(default)
                }
            },
        };

        let method_keywords = var("PAPER_EXTRACT_METHOD_KEYWORDS")
            .map(|s| {
                s.split(',')
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|k| !k.is_empty())
            .unwrap_or_else(|| DEFAULT_METHOD_KEYWORDS.iter().map(|k| k.to_string()).collect());

        Self {
            openalex_url: base_url("OPENALEX_URL", apis::openalex::DEFAULT_BASE_URL),
            openalex_email: var("OPENALEX_EMAIL"),
            arxiv_url: base_url("ARXIV_URL", apis::arxiv::DEFAULT_BASE_URL),
            grobid_url: base_url("GROBID_URL", apis::grobid::DEFAULT_BASE_URL),
            metadata_timeout: secs("PAPER_EXTRACT_METADATA_TIMEOUT_SECS", DEFAULT_METADATA_TIMEOUT_SECS),
            fulltext_timeout: secs("PAPER_EXTRACT_FULLTEXT_TIMEOUT_SECS", DEFAULT_FULLTEXT_TIMEOUT_SECS),
            method_keywords,
        }
    }

    /// Point every upstream at one mock server, with short timeouts.
    #[cfg(test)]
    pub fn for_testing(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            openalex_url: base.to_string(),
            openalex_email: None,
            arxiv_url: format!("{}/api/query", base),
            grobid_url: base.to_string(),
            metadata_timeout: Duration::from_secs(5),
            fulltext_timeout: Duration::from_secs(5),
            method_keywords: DEFAULT_METHOD_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        }
    }

    pub fn metadata_client(&self) -> Result<reqwest::Client, SourceError> {
        apis::http_client(METADATA_CONNECT_TIMEOUT, self.metadata_timeout, self.openalex_email.as_deref())
    }

    pub fn fulltext_client(&self) -> Result<reqwest::Client, SourceError> {
        apis::http_client(FULLTEXT_CONNECT_TIMEOUT, self.fulltext_timeout, self.openalex_email.as_deref())
    }

    pub fn annotator(&self) -> Annotator {
        Annotator::new(self.method_keywords.iter().cloned())
    }

    /// Describe each extractor in routing order and the upstream it targets.
    pub fn extractor_status(&self) -> Vec<ExtractorStatus> {
        vec![
            ExtractorStatus {
                name: "arxiv".into(),
                path: apis::ExtractionPath::AbstractFeed.as_str().into(),
                upstream: self.arxiv_url.clone(),
                note: "arXiv abstract pages; Atom feed by identifier".into(),
            },
            ExtractorStatus {
                name: "openalex".into(),
                path: apis::ExtractionPath::IdentifierResolution.as_str().into(),
                upstream: self.openalex_url.clone(),
                note: if self.openalex_email.is_some() {
                    "DOI links; polite pool email set".into()
                } else {
                    "DOI links; no email (limited rate)".into()
                },
            },
            ExtractorStatus {
                name: "grobid".into(),
                path: apis::ExtractionPath::DocumentFulltext.as_str().into(),
                upstream: self.grobid_url.clone(),
                note: format!(
                    "Direct PDF links; {}s full-text timeout",
                    self.fulltext_timeout.as_secs()
                ),
            },
        ]
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ExtractorStatus {
    pub name: String,
    pub path: String,
    pub upstream: String,
    pub note: String,
}
