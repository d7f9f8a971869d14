use std::sync::Arc;

use crate::apis::arxiv::ArxivClient;
use crate::apis::grobid::GrobidClient;
use crate::apis::openalex::OpenAlexClient;
use crate::apis::{Extractor, SourceError};
use crate::config::{Config, ExtractorStatus};
use crate::extract::ExtractionRouter;
use crate::health::HealthProbe;
use crate::models::{
    DependencyHealth, ExtractResponse, ExtractionRequest, HealthSummary, SearchRequest,
    SearchResponse,
};
use crate::search;

/// Everything a transport needs, wired once from configuration and shared
/// read-only between requests.
pub struct Pipeline {
    openalex: Arc<OpenAlexClient>,
    router: ExtractionRouter,
    health: HealthProbe,
    extractors: Vec<ExtractorStatus>,
}

impl Pipeline {
    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        let metadata = config.metadata_client()?;
        let fulltext = config.fulltext_client()?;

        let openalex = Arc::new(OpenAlexClient::new(metadata.clone(), config.openalex_url.clone()));
        let arxiv = Arc::new(ArxivClient::new(metadata.clone(), config.arxiv_url.clone()));
        let grobid = Arc::new(GrobidClient::new(fulltext, metadata, config.grobid_url.clone()));

        // Routing priority: feed, identifier, full text.
        let extractors: Vec<Arc<dyn Extractor>> = vec![arxiv, openalex.clone(), grobid.clone()];
        let annotator = config.annotator();
        tracing::debug!(keywords = ?annotator.keywords(), "Method keywords loaded");
        let router = ExtractionRouter::new(extractors, annotator);
        tracing::debug!(extractors = ?router.extractor_names(), "Extraction chain ready");

        Ok(Self {
            health: HealthProbe::new(grobid, openalex.clone()),
            openalex,
            router,
            extractors: config.extractor_status(),
        })
    }

    pub async fn search(&self, request: &SearchRequest) -> SearchResponse {
        search::run_search(&self.openalex, request).await
    }

    pub async fn extract(&self, request: &ExtractionRequest) -> ExtractResponse {
        self.router.extract(request).await
    }

    pub async fn health(&self) -> HealthSummary {
        self.health.summary().await
    }

    pub async fn health_grobid(&self) -> DependencyHealth {
        self.health.grobid().await
    }

    pub async fn health_openalex(&self) -> DependencyHealth {
        self.health.openalex().await
    }

    pub fn extractors(&self) -> &[ExtractorStatus] {
        &self.extractors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentPayload, ExtractionParameters};
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn pipeline_for(server: &MockServer) -> Pipeline {
        Pipeline::from_config(&Config::for_testing(&server.uri())).unwrap()
    }

    fn extract_request(url: &str, required: Option<Vec<&str>>) -> ExtractionRequest {
        ExtractionRequest {
            source_url: url.to_string(),
            extraction_parameters: required.map(|r| ExtractionParameters {
                required_elements: Some(r.into_iter().map(String::from).collect()),
                ..Default::default()
            }),
        }
    }

    #[tokio::test]
    async fn test_feed_scenario() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/query"))
            .and(query_param("id_list", "1234.5678"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<feed><title>Paper X</title><summary>Sentence one. Sentence two.</summary></feed>",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let resp = pipeline_for(&server)
            .await
            .extract(&extract_request("https://arxiv.org/abs/1234.5678", None))
            .await;
        let ContentPayload::Full(content) = &resp.extracted_content else {
            panic!("expected full content");
        };
        assert_eq!(content.title, "Paper X");
        assert_eq!(content.key_findings, vec!["Sentence one.", "Sentence two."]);
        assert!(resp.metadata.extraction_success);
        assert_eq!(resp.extraction_metrics.confidence_score, 0.8);
    }

    #[tokio::test]
    async fn test_zero_byte_document_fails_cleanly() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/empty.pdf"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let url = format!("{}/files/empty.pdf", server.uri());
        let resp = pipeline_for(&server).await.extract(&extract_request(&url, None)).await;
        assert!(!resp.metadata.extraction_success);
        assert_eq!(resp.extraction_metrics.confidence_score, 0.0);
        let reason = resp.metadata.failure_reason.unwrap_or_default();
        assert!(!reason.is_empty());
        assert!(reason.contains("grobid"));
    }

    #[tokio::test]
    async fn test_unreachable_document_fails_cleanly() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/missing.pdf"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let pipeline = pipeline_for(&server).await;

        let missing = format!("{}/files/missing.pdf", server.uri());
        let resp = pipeline.extract(&extract_request(&missing, None)).await;
        assert!(!resp.metadata.extraction_success);
        assert_eq!(resp.extraction_metrics.confidence_score, 0.0);
        let reason = resp.metadata.failure_reason.unwrap_or_default();
        assert!(reason.contains("grobid"));

        let gone = MockServer::start().await;
        let refused = format!("{}/files/paper.pdf", gone.uri());
        drop(gone);
        let resp = pipeline.extract(&extract_request(&refused, None)).await;
        assert!(!resp.metadata.extraction_success);
        assert_eq!(resp.extraction_metrics.confidence_score, 0.0);
        let reason = resp.metadata.failure_reason.unwrap_or_default();
        assert!(reason.contains("grobid"));
    }

    #[tokio::test]
    async fn test_doi_filtered_to_requested_keys() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/works"))
            .and(query_param("filter", "doi:10.1234/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"title": "Resolved", "abstract": "A model of things. It works."}]
            })))
            .mount(&server)
            .await;

        let resp = pipeline_for(&server)
            .await
            .extract(&extract_request("https://doi.org/10.1234/abc", Some(vec!["title", "methodology"])))
            .await;
        let ContentPayload::Filtered(map) = &resp.extracted_content else {
            panic!("expected filtered content");
        };
        assert_eq!(map.len(), 2);
        assert_eq!(map["title"], "Resolved");
        assert_eq!(map["methodology"], "A model of things.");
        assert!(resp.metadata.extraction_success);
    }

    #[tokio::test]
    async fn test_unclassified_with_filter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let resp = pipeline_for(&server)
            .await
            .extract(&extract_request("https://example.com/blog/post", Some(vec!["title", "key_findings"])))
            .await;
        let ContentPayload::Filtered(map) = &resp.extracted_content else {
            panic!("expected filtered content");
        };
        assert_eq!(map.len(), 2);
        assert_eq!(map["title"], "");
        assert_eq!(map["key_findings"], json!([]));
        assert!(!resp.metadata.extraction_success);
        assert!(resp.metadata.failure_reason.is_some());
    }

    #[tokio::test]
    async fn test_extractors_listed_in_routing_order() {
        let server = MockServer::start().await;
        let pipeline = pipeline_for(&server).await;
        let names: Vec<&str> = pipeline.extractors().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["arxiv", "openalex", "grobid"]);
    }
}
