use std::collections::BTreeMap;

use super::{ensure_success, Extraction, ExtractionPath, Extractor, SourceError};
use crate::classify::SourceKind;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Deserializer};

pub const DEFAULT_BASE_URL: &str = "https://api.openalex.org";

/// Positions past this are dropped when rebuilding an abstract.
const MAX_ABSTRACT_POSITIONS: usize = 50_000;

pub struct OpenAlexClient {
    client: reqwest::Client,
    base_url: String,
}

impl OpenAlexClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into() }
    }

    /// Run one search query. Failures are logged and yield an empty list;
    /// a blank query returns immediately without touching the network.
    pub async fn search(&self, query: &str, max_results: u32, filter: Option<&str>) -> Vec<OAWork> {
        if query.trim().is_empty() {
            return Vec::new();
        }
        match self.try_search(query.trim(), max_results, filter).await {
            Ok(works) => works,
            Err(e) => {
                tracing::warn!(error = %e, "OpenAlex search failed");
                Vec::new()
            }
        }
    }

    async fn try_search(
        &self,
        query: &str,
        max_results: u32,
        filter: Option<&str>,
    ) -> Result<Vec<OAWork>, SourceError> {
        let per_page = max_results.to_string();
        let mut params = vec![("search", query), ("per-page", per_page.as_str())];
        if let Some(f) = filter {
            params.push(("filter", f));
        }
        tracing::debug!(query, per_page = %per_page, ?filter, "Querying OpenAlex works");
        let resp = self.client
            .get(format!("{}/works", self.base_url))
            .query(&params)
            .send().await?;
        ensure_success(&resp)?;
        let page: OAResponse = resp.json().await?;
        Ok(page.into_works())
    }

    /// Look up works by DOI through the identifier filter endpoint.
    pub async fn lookup_doi(&self, doi: &str) -> Result<Vec<OAWork>, SourceError> {
        let filter = format!("doi:{}", doi);
        let resp = self.client
            .get(format!("{}/works", self.base_url))
            .query(&[("filter", filter.as_str())])
            .send().await?;
        ensure_success(&resp)?;
        let page: OAResponse = resp.json().await?;
        Ok(page.into_works())
    }

    pub async fn is_alive(&self) -> bool {
        let resp = self.client
            .get(format!("{}/works", self.base_url))
            .query(&[("per-page", "1")])
            .send().await;
        match resp {
            Ok(r) => r.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, "OpenAlex liveness probe failed");
                false
            }
        }
    }
}

#[async_trait]
impl Extractor for OpenAlexClient {
    fn name(&self) -> &str { "openalex" }

    fn path(&self) -> ExtractionPath { ExtractionPath::IdentifierResolution }

    fn applies_to(&self, _url: &str, kind: &SourceKind) -> bool {
        matches!(kind, SourceKind::ResolvableIdentifier { .. })
    }

    async fn extract(&self, _url: &str, kind: &SourceKind) -> Result<Option<Extraction>, SourceError> {
        let SourceKind::ResolvableIdentifier { doi } = kind else {
            return Ok(None);
        };
        let works = self.lookup_doi(doi).await?;
        Ok(works.first().map(|w| Extraction {
            title: w.display_title(),
            abstract_text: w.abstract_text(),
            methodology: None,
            citations: w.citations(),
            authors: Some(w.author_names()),
        }))
    }
}

// ── Raw record shapes ───────────────────────────────────────────────────────

#[derive(Deserialize)]
struct OAResponse {
    #[serde(default)]
    results: Vec<serde_json::Value>,
}

impl OAResponse {
    /// Records that do not fit the expected shape are skipped.
    fn into_works(self) -> Vec<OAWork> {
        self.results
            .into_iter()
            .filter_map(|v| match serde_json::from_value::<OAWork>(v) {
                Ok(w) => Some(w),
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping malformed OpenAlex record");
                    None
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OAWork {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub doi: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub ids: Option<OAIds>,
    #[serde(default, deserialize_with = "lenient")]
    pub publication_year: Option<i32>,
    #[serde(default, deserialize_with = "lenient")]
    pub cited_by_count: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub relevance_score: Option<f64>,
    /// Older responses carry the score under this name.
    #[serde(default, deserialize_with = "lenient")]
    pub score: Option<f64>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub authorships: Vec<OAAuthorship>,
    #[serde(default, deserialize_with = "lenient")]
    pub primary_location: Option<OALocation>,
    #[serde(default, deserialize_with = "lenient")]
    pub best_oa_location: Option<OALocation>,
    #[serde(default, deserialize_with = "lenient")]
    pub host_venue: Option<OAVenue>,
    #[serde(default, rename = "abstract", deserialize_with = "lenient")]
    pub abstract_plain: Option<String>,
    #[serde(default, deserialize_with = "lenient_index")]
    pub abstract_inverted_index: Option<BTreeMap<String, Vec<usize>>>,
    /// Works this one cites, as OpenAlex URIs.
    #[serde(default, deserialize_with = "lenient_list")]
    pub referenced_works: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OAIds {
    #[serde(default)]
    pub doi: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAAuthorship {
    #[serde(default)]
    pub author: Option<OAAuthor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAAuthor {
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OALocation {
    #[serde(default)]
    pub landing_page_url: Option<String>,
    #[serde(default)]
    pub pdf_url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub source: Option<OAVenue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OAVenue {
    #[serde(default)]
    pub display_name: Option<String>,
}

impl OAWork {
    pub fn display_title(&self) -> String {
        self.title
            .as_deref()
            .or(self.display_name.as_deref())
            .map(super::collapse_whitespace)
            .unwrap_or_default()
    }

    /// Plain abstract when present, otherwise rebuilt from the inverted index.
    pub fn abstract_text(&self) -> String {
        if let Some(text) = self.abstract_plain.as_deref().filter(|t| !t.trim().is_empty()) {
            return text.trim().to_string();
        }
        self.abstract_inverted_index
            .as_ref()
            .map(reconstruct_abstract)
            .unwrap_or_default()
    }

    /// Author display names in authorship order; entries without a name are skipped.
    pub fn author_names(&self) -> Vec<String> {
        self.authorships
            .iter()
            .filter_map(|a| a.author.as_ref()?.display_name.as_deref())
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn citations(&self) -> Vec<String> {
        self.referenced_works
            .iter()
            .map(|r| r.trim())
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Upstream relevance, `None` unless finite and non-negative.
    pub fn raw_score(&self) -> Option<f64> {
        self.relevance_score
            .or(self.score)
            .filter(|s| s.is_finite() && *s >= 0.0)
    }

    pub fn raw_doi(&self) -> Option<&str> {
        self.doi
            .as_deref()
            .or_else(|| self.ids.as_ref()?.doi.as_deref())
            .filter(|d| !d.trim().is_empty())
    }
}

/// Rebuild prose from a word → positions map.
///
/// Slots are filled token by token in key order, so when two tokens claim
/// the same position the lexicographically later one ends up in the slot.
/// That case is logged rather than treated as valid input.
pub fn reconstruct_abstract(index: &BTreeMap<String, Vec<usize>>) -> String {
    let max_pos = index
        .values()
        .flatten()
        .copied()
        .filter(|&p| p < MAX_ABSTRACT_POSITIONS)
        .max();
    let Some(max_pos) = max_pos else {
        return String::new();
    };

    let mut slots: Vec<Option<&str>> = vec![None; max_pos + 1];
    for (token, positions) in index {
        for &pos in positions {
            if pos >= MAX_ABSTRACT_POSITIONS {
                tracing::debug!(pos, "Dropping out-of-range abstract position");
                continue;
            }
            if let Some(prev) = slots[pos] {
                tracing::debug!(pos, prev, token = %token, "Inverted index position collision");
            }
            slots[pos] = Some(token.as_str());
        }
    }

    slots.into_iter().flatten().collect::<Vec<_>>().join(" ")
}

/// Deserialize a field, treating a value of the wrong shape as absent.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

/// Deserialize a word → positions map position by position.
///
/// Positions may arrive as numbers or numeric strings; anything else is
/// dropped on its own without discarding the rest of the index.
fn lenient_index<'de, D>(deserializer: D) -> Result<Option<BTreeMap<String, Vec<usize>>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let Some(serde_json::Value::Object(map)) = value else {
        return Ok(None);
    };
    let index = map
        .into_iter()
        .map(|(token, positions)| {
            let positions = match positions {
                serde_json::Value::Array(items) => items.iter().filter_map(index_position).collect(),
                _ => Vec::new(),
            };
            (token, positions)
        })
        .collect();
    Ok(Some(index))
}

fn index_position(value: &serde_json::Value) -> Option<usize> {
    let pos = match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    if pos.is_none() {
        tracing::debug!(%value, "Dropping malformed abstract position");
    }
    pos.and_then(|p| usize::try_from(p).ok())
}

/// Deserialize a list, dropping elements of the wrong shape.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect(),
        _ => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OpenAlexClient {
        let http = crate::apis::http_client(Duration::from_secs(2), Duration::from_secs(5), None).unwrap();
        OpenAlexClient::new(http, server.uri())
    }

    fn index(pairs: &[(&str, &[usize])]) -> BTreeMap<String, Vec<usize>> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_vec())).collect()
    }

    #[test]
    fn test_reconstruct_abstract_simple() {
        let idx = index(&[("hello", &[0]), ("world", &[1])]);
        assert_eq!(reconstruct_abstract(&idx), "hello world");
    }

    #[test]
    fn test_reconstruct_abstract_repeated_tokens() {
        let idx = index(&[("the", &[0, 3]), ("cat", &[1]), ("saw", &[2]), ("dog", &[4])]);
        assert_eq!(reconstruct_abstract(&idx), "the cat saw the dog");
    }

    #[test]
    fn test_reconstruct_abstract_gaps_are_skipped() {
        let idx = index(&[("a", &[0]), ("c", &[2])]);
        assert_eq!(reconstruct_abstract(&idx), "a c");
    }

    #[test]
    fn test_reconstruct_abstract_empty() {
        assert_eq!(reconstruct_abstract(&BTreeMap::new()), "");
        assert_eq!(reconstruct_abstract(&index(&[("orphan", &[])])), "");
    }

    #[test]
    fn test_reconstruct_abstract_collision_is_deterministic() {
        let idx = index(&[("alpha", &[0]), ("beta", &[0]), ("end", &[1])]);
        assert_eq!(reconstruct_abstract(&idx), "beta end");
    }

    #[test]
    fn test_work_prefers_plain_abstract() {
        let w: OAWork = serde_json::from_value(json!({
            "abstract": "Plain text.",
            "abstract_inverted_index": {"ignored": [0]}
        })).unwrap();
        assert_eq!(w.abstract_text(), "Plain text.");
    }

    #[test]
    fn test_bad_index_position_keeps_rest_of_abstract() {
        let w: OAWork = serde_json::from_value(json!({
            "abstract_inverted_index": {"Graph": [0], "networks": [1], "learn": [2], "well": [-1]}
        })).unwrap();
        assert_eq!(w.abstract_text(), "Graph networks learn");
    }

    #[test]
    fn test_index_accepts_numeric_string_positions() {
        let w: OAWork = serde_json::from_value(json!({
            "abstract_inverted_index": {"deep": ["0"], "models": [1, "x", 2.5], "fit": " 2 "}
        })).unwrap();
        assert_eq!(w.abstract_text(), "deep models");
    }

    #[test]
    fn test_work_tolerates_malformed_fields() {
        let w: OAWork = serde_json::from_value(json!({
            "title": "T",
            "publication_year": "not a year",
            "authorships": [
                {"author": {"display_name": "Ada Lovelace"}},
                "garbage",
                {"author": null},
                {"author": {"display_name": "  "}},
                {"author": {"display_name": "Alan Turing"}}
            ],
            "primary_location": 42
        })).unwrap();
        assert_eq!(w.publication_year, None);
        assert!(w.primary_location.is_none());
        assert_eq!(w.author_names(), vec!["Ada Lovelace", "Alan Turing"]);
    }

    #[tokio::test]
    async fn test_search_sends_query_and_page_size() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/works"))
            .and(query_param("search", "graph neural networks"))
            .and(query_param("per-page", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"title": "GNN survey"}, {"title": "GCN"}, "not an object"]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let works = client_for(&server).search("graph neural networks", 5, None).await;
        assert_eq!(works.len(), 2);
        assert_eq!(works[0].display_title(), "GNN survey");
    }

    #[tokio::test]
    async fn test_search_passes_filter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/works"))
            .and(query_param("filter", "publication_year:2020-2022"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
            .expect(1)
            .mount(&server)
            .await;

        let works = client_for(&server).search("x", 5, Some("publication_year:2020-2022")).await;
        assert!(works.is_empty());
    }

    #[tokio::test]
    async fn test_blank_query_issues_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        assert!(client_for(&server).search("   ", 5, None).await.is_empty());
    }

    #[tokio::test]
    async fn test_search_failure_yields_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        assert!(client_for(&server).search("anything", 5, None).await.is_empty());

        let bad_json = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&bad_json)
            .await;
        assert!(client_for(&bad_json).search("anything", 5, None).await.is_empty());
    }

    #[tokio::test]
    async fn test_extract_by_doi_reconstructs_abstract() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/works"))
            .and(query_param("filter", "doi:10.1234/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{
                    "title": "Resolved",
                    "abstract_inverted_index": {"hello": [0], "world": [1]},
                    "authorships": [{"author": {"display_name": "A. Author"}}],
                    "referenced_works": ["https://openalex.org/W1", " ", "https://openalex.org/W2", 7]
                }]
            })))
            .mount(&server)
            .await;

        let kind = SourceKind::ResolvableIdentifier { doi: "10.1234/abc".into() };
        let extraction = client_for(&server)
            .extract("https://doi.org/10.1234/abc", &kind)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(extraction.title, "Resolved");
        assert_eq!(extraction.abstract_text, "hello world");
        assert_eq!(extraction.authors, Some(vec!["A. Author".to_string()]));
        assert_eq!(extraction.methodology, None);
        assert_eq!(extraction.citations, vec!["https://openalex.org/W1", "https://openalex.org/W2"]);
    }

    #[tokio::test]
    async fn test_extract_by_doi_empty_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/works"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
            .mount(&server)
            .await;

        let kind = SourceKind::ResolvableIdentifier { doi: "10.1/none".into() };
        let result = client_for(&server).extract("https://doi.org/10.1/none", &kind).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_is_alive() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/works"))
            .and(query_param("per-page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
            .mount(&server)
            .await;
        assert!(client_for(&server).is_alive().await);

        let down = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&down)
            .await;
        assert!(!client_for(&down).is_alive().await);
    }
}
