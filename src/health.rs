use std::sync::Arc;

use crate::apis::grobid::GrobidClient;
use crate::apis::openalex::OpenAlexClient;
use crate::models::{DependencyHealth, HealthSummary};

/// Liveness checks for the two upstream dependencies. A probe never fails;
/// an unreachable upstream simply reports `false`.
pub struct HealthProbe {
    grobid: Arc<GrobidClient>,
    openalex: Arc<OpenAlexClient>,
}

impl HealthProbe {
    pub fn new(grobid: Arc<GrobidClient>, openalex: Arc<OpenAlexClient>) -> Self {
        Self { grobid, openalex }
    }

    pub async fn grobid(&self) -> DependencyHealth {
        DependencyHealth { service: "grobid".into(), up: self.grobid.is_alive().await }
    }

    pub async fn openalex(&self) -> DependencyHealth {
        DependencyHealth { service: "openalex".into(), up: self.openalex.is_alive().await }
    }

    /// Probe both upstreams concurrently.
    pub async fn summary(&self) -> HealthSummary {
        let (grobid, openalex) = tokio::join!(self.grobid.is_alive(), self.openalex.is_alive());
        tracing::info!(grobid, openalex, "Health check finished");
        HealthSummary { service: "ok".into(), grobid, openalex }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn probe_for(grobid: &MockServer, openalex: &MockServer) -> HealthProbe {
        let http = crate::apis::http_client(Duration::from_secs(1), Duration::from_secs(2), None).unwrap();
        HealthProbe::new(
            Arc::new(GrobidClient::new(http.clone(), http.clone(), grobid.uri())),
            Arc::new(OpenAlexClient::new(http, openalex.uri())),
        )
    }

    #[tokio::test]
    async fn test_both_up() {
        let grobid = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/isalive"))
            .respond_with(ResponseTemplate::new(200).set_body_string("true"))
            .mount(&grobid)
            .await;
        let openalex = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/works"))
            .and(query_param("per-page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"results":[]}"#))
            .mount(&openalex)
            .await;

        let summary = probe_for(&grobid, &openalex).summary().await;
        assert_eq!(summary.service, "ok");
        assert!(summary.grobid);
        assert!(summary.openalex);
    }

    #[tokio::test]
    async fn test_grobid_down_openalex_up() {
        let grobid = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&grobid)
            .await;
        let openalex = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/works"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&openalex)
            .await;

        let probe = probe_for(&grobid, &openalex);
        let g = probe.grobid().await;
        assert_eq!(g.service, "grobid");
        assert!(!g.up);
        let o = probe.openalex().await;
        assert_eq!(o.service, "openalex");
        assert!(o.up);
    }
}
