use std::sync::Arc;
use std::time::Instant;

use crate::annotate::Annotator;
use crate::apis::{Extraction, ExtractionPath, Extractor};
use crate::assemble;
use crate::classify::{classify, SourceKind};
use crate::models::{ExtractResponse, ExtractionRequest};

/// One extractor that was tried and produced nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    pub extractor: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    Succeeded { path: ExtractionPath, extraction: Extraction },
    Unclassified,
    Exhausted { kind: SourceKind, attempts: Vec<Attempt> },
}

/// Tries extractors in their fixed priority order and stops at the first
/// one that yields a result. Failed extractors are never retried.
pub struct ExtractionRouter {
    extractors: Vec<Arc<dyn Extractor>>,
    annotator: Annotator,
}

impl ExtractionRouter {
    pub fn new(extractors: Vec<Arc<dyn Extractor>>, annotator: Annotator) -> Self {
        Self { extractors, annotator }
    }

    pub fn extractor_names(&self) -> Vec<&str> {
        self.extractors.iter().map(|e| e.name()).collect()
    }

    pub async fn route(&self, url: &str) -> RouteOutcome {
        let kind = classify(url);
        if kind == SourceKind::Unclassified {
            tracing::info!(source_url = url, "Source URL matches no extractor");
            return RouteOutcome::Unclassified;
        }

        let mut attempts = Vec::new();
        for extractor in &self.extractors {
            if !extractor.applies_to(url, &kind) {
                continue;
            }
            tracing::debug!(source_url = url, extractor = extractor.name(), "Attempting extraction");
            match extractor.extract(url, &kind).await {
                Ok(Some(extraction)) => {
                    return RouteOutcome::Succeeded { path: extractor.path(), extraction };
                }
                Ok(None) => {
                    tracing::warn!(source_url = url, extractor = extractor.name(), "Extractor found nothing, falling back");
                    attempts.push(Attempt {
                        extractor: extractor.name().to_string(),
                        reason: "upstream returned no usable record".to_string(),
                    });
                }
                Err(e) => {
                    tracing::warn!(source_url = url, extractor = extractor.name(), error = %e, "Extractor failed, falling back");
                    attempts.push(Attempt {
                        extractor: extractor.name().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        RouteOutcome::Exhausted { kind, attempts }
    }

    /// Route, fill gaps heuristically and assemble the response. Never fails.
    pub async fn extract(&self, request: &ExtractionRequest) -> ExtractResponse {
        let started = Instant::now();
        let source_url = request.source_url.trim();
        if let Some(focus) = request.extraction_parameters.as_ref().and_then(|p| p.focus_areas.as_ref()) {
            tracing::debug!(?focus, "focus_areas accepted but not used for extraction");
        }
        let outcome = self.route(source_url).await;
        let path = match &outcome {
            RouteOutcome::Succeeded { path, .. } => path.as_str(),
            RouteOutcome::Unclassified => "unclassified",
            RouteOutcome::Exhausted { .. } => "exhausted",
        };
        let response = assemble::assemble(outcome, request, &self.annotator, started);
        tracing::info!(
            source_url = %request.source_url,
            path,
            success = response.metadata.extraction_success,
            "Extraction finished"
        );
        response
    }
}
