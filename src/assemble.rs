//! Turns a routing outcome into the caller-facing extraction response.

use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::annotate::Annotator;
use crate::apis::ExtractionPath;
use crate::extract::RouteOutcome;
use crate::models::{
    ContentPayload, ExtractResponse, ExtractedContent, ExtractionMetadata, ExtractionMetrics,
    ExtractionRequest,
};

/// Fixed confidence per extraction path. Failures always report 0.0.
pub fn confidence_for(path: ExtractionPath) -> f64 {
    match path {
        ExtractionPath::AbstractFeed => 0.8,
        ExtractionPath::IdentifierResolution => 0.8,
        ExtractionPath::DocumentFulltext => 0.9,
    }
}

pub fn assemble(
    outcome: RouteOutcome,
    request: &ExtractionRequest,
    annotator: &Annotator,
    started: Instant,
) -> ExtractResponse {
    let (mut content, path, failure_reason) = match outcome {
        RouteOutcome::Succeeded { path, extraction } => {
            let key_findings = annotator.key_findings(&extraction.abstract_text);
            let methodology = extraction
                .methodology
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| annotator.methodology(&extraction.abstract_text));
            let content = ExtractedContent {
                title: extraction.title,
                abstract_text: extraction.abstract_text,
                key_findings,
                methodology,
                citations: extraction.citations,
                authors: extraction.authors,
            };
            (content, Some(path), None)
        }
        RouteOutcome::Unclassified => (
            ExtractedContent::default(),
            None,
            Some(
                "Unsupported source URL: expected an arXiv abstract page, a DOI link, \
                 or a direct PDF link"
                    .to_string(),
            ),
        ),
        RouteOutcome::Exhausted { kind, attempts } => {
            let reason = if attempts.is_empty() {
                format!("No extractor available for {} source", kind.label())
            } else {
                let tried: Vec<String> = attempts
                    .iter()
                    .map(|a| format!("{}: {}", a.extractor, a.reason))
                    .collect();
                format!("All extractors failed ({})", tried.join("; "))
            };
            (ExtractedContent::default(), None, Some(reason))
        }
    };

    let success = !content.key_findings.is_empty() || !content.methodology.trim().is_empty();
    let confidence_score = match path {
        Some(p) if success => confidence_for(p),
        _ => 0.0,
    };

    if let Some(limit) = request.max_length() {
        truncate_chars(&mut content.abstract_text, limit);
    }

    let extracted_content = match request.required_elements() {
        Some(keys) => ContentPayload::Filtered(select_fields(&content, keys)),
        None => ContentPayload::Full(content),
    };

    ExtractResponse {
        extracted_content,
        metadata: ExtractionMetadata {
            extraction_success: success,
            source_url: request.source_url.clone(),
            extraction_timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            failure_reason: if success { None } else { failure_reason },
        },
        extraction_metrics: ExtractionMetrics {
            processing_time_ms: started.elapsed().as_millis() as u64,
            confidence_score,
        },
    }
}

/// Project content onto the requested keys, in request order, without
/// duplicates. Unknown keys map to an empty string.
pub fn select_fields(content: &ExtractedContent, keys: &[String]) -> Map<String, Value> {
    let mut out = Map::new();
    for key in keys {
        if out.contains_key(key) {
            continue;
        }
        let value = match key.as_str() {
            "title" => Value::from(content.title.clone()),
            "abstract" => Value::from(content.abstract_text.clone()),
            "key_findings" => Value::from(content.key_findings.clone()),
            "methodology" => Value::from(content.methodology.clone()),
            "citations" => Value::from(content.citations.clone()),
            "authors" => Value::from(content.authors.clone().unwrap_or_default()),
            other => {
                tracing::debug!(key = other, "Unknown content field requested");
                Value::from("")
            }
        };
        out.insert(key.clone(), value);
    }
    out
}

fn truncate_chars(s: &mut String, limit: usize) {
    if let Some((idx, _)) = s.char_indices().nth(limit) {
        s.truncate(idx);
    }
}
