//! Request and response types shared by the MCP and REST transports.
//!
//! Field names are part of the wire contract: callers branch on
//! `relevance_score`, integer `year`, and `extraction_success`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_RESULTS: u32 = 20;
pub const MAX_RESULTS_CAP: u32 = 200;

// ── Search ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct SearchRequest {
    #[serde(default)]
    #[schemars(description = "Free-text query")]
    pub query: String,
    #[serde(default)]
    #[schemars(description = "Optional upstream filters")]
    pub filters: Option<SearchFilters>,
    #[serde(default)]
    #[schemars(description = "Maximum results to return (default 20, max 200)")]
    pub max_results: Option<u32>,
}

impl SearchRequest {
    pub fn page_size(&self) -> u32 {
        self.max_results
            .unwrap_or(DEFAULT_MAX_RESULTS)
            .clamp(1, MAX_RESULTS_CAP)
    }

    pub fn year_range(&self) -> Option<&YearRange> {
        self.filters.as_ref().and_then(|f| f.year_range.as_ref())
    }
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct SearchFilters {
    #[serde(default)]
    pub year_range: Option<YearRange>,
    /// Accepted for compatibility; quality thresholds are applied by the caller.
    #[serde(default)]
    pub min_quality_score: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, JsonSchema)]
pub struct YearRange {
    #[serde(default)]
    pub start: Option<i32>,
    #[serde(default)]
    pub end: Option<i32>,
}

impl YearRange {
    /// Upstream filter expression, `None` when both bounds are open.
    pub fn to_filter(&self) -> Option<String> {
        match (self.start, self.end) {
            (None, None) => None,
            (Some(s), Some(e)) if s == e => Some(format!("publication_year:{}", s)),
            (Some(s), Some(e)) => Some(format!("publication_year:{}-{}", s.min(e), s.max(e))),
            (Some(s), None) => Some(format!("publication_year:>{}", s.saturating_sub(1))),
            (None, Some(e)) => Some(format!("publication_year:<{}", e.saturating_add(1))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub relevance_score: f64,
    pub year: Option<i32>,
    pub citations: u32,
    pub authors: Vec<String>,
    pub venue: String,
    pub doi: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchMetrics {
    pub query_time_ms: u64,
    pub sources_searched: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub total_found: usize,
    pub search_metrics: SearchMetrics,
}

// ── Extraction ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ExtractionRequest {
    #[serde(default)]
    #[schemars(description = "Paper URL: arXiv abstract page, DOI link, or direct PDF link")]
    pub source_url: String,
    #[serde(default)]
    pub extraction_parameters: Option<ExtractionParameters>,
}

impl ExtractionRequest {
    pub fn required_elements(&self) -> Option<&[String]> {
        self.extraction_parameters
            .as_ref()
            .and_then(|p| p.required_elements.as_deref())
            .filter(|e| !e.is_empty())
    }

    pub fn max_length(&self) -> Option<usize> {
        self.extraction_parameters.as_ref().and_then(|p| p.max_length)
    }
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ExtractionParameters {
    #[serde(default)]
    #[schemars(description = "Subset of fields to return (title, abstract, key_findings, methodology, citations, authors)")]
    pub required_elements: Option<Vec<String>>,
    #[serde(default)]
    pub focus_areas: Option<Vec<String>>,
    #[serde(default)]
    #[schemars(description = "Maximum abstract length in characters")]
    pub max_length: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedContent {
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub key_findings: Vec<String>,
    pub methodology: String,
    pub citations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
}

/// Either every field, or only the ones a caller asked for.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ContentPayload {
    Full(ExtractedContent),
    Filtered(serde_json::Map<String, serde_json::Value>),
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractionMetadata {
    pub extraction_success: bool,
    pub source_url: String,
    pub extraction_timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractionMetrics {
    pub processing_time_ms: u64,
    pub confidence_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractResponse {
    pub extracted_content: ContentPayload,
    pub metadata: ExtractionMetadata,
    pub extraction_metrics: ExtractionMetrics,
}

// ── Health ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSummary {
    pub service: String,
    pub grobid: bool,
    pub openalex: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyHealth {
    pub service: String,
    pub up: bool,
}
