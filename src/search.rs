use std::time::Instant;

use crate::apis::openalex::OpenAlexClient;
use crate::models::{SearchMetrics, SearchRequest, SearchResponse};
use crate::normalize;

/// Query the bibliographic index and normalize one page of results.
///
/// Never fails: upstream errors are logged by the client and surface as an
/// empty result list. A blank query does not touch the network.
pub async fn run_search(client: &OpenAlexClient, request: &SearchRequest) -> SearchResponse {
    let query = request.query.trim();
    if query.is_empty() {
        tracing::debug!("Blank search query, skipping upstream");
        return SearchResponse::default();
    }

    let started = Instant::now();
    let page_size = request.page_size();
    let filter = request.year_range().and_then(|r| r.to_filter());
    if let Some(min) = request.filters.as_ref().and_then(|f| f.min_quality_score) {
        tracing::debug!(min, "min_quality_score is not applied upstream");
    }

    let mut works = client.search(query, page_size, filter.as_deref()).await;
    works.truncate(page_size as usize);

    let max_score = normalize::max_score(&works);
    let results: Vec<_> = works.iter().map(|w| normalize::normalize(w, max_score)).collect();

    tracing::info!(query, results = results.len(), "Search finished");
    SearchResponse {
        total_found: results.len(),
        results,
        search_metrics: SearchMetrics {
            query_time_ms: started.elapsed().as_millis() as u64,
            sources_searched: 1,
        },
    }
}
