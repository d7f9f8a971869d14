use super::{collapse_whitespace, ensure_success, Extraction, ExtractionPath, Extractor, SourceError};
use crate::classify::SourceKind;
use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;

pub const DEFAULT_BASE_URL: &str = "http://export.arxiv.org/api/query";

pub struct ArxivClient {
    client: reqwest::Client,
    base_url: String,
}

impl ArxivClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into() }
    }

    /// Fetch the Atom feed for a single arXiv identifier.
    pub async fn fetch_feed(&self, arxiv_id: &str) -> Result<String, SourceError> {
        tracing::debug!(arxiv_id, "Fetching arXiv Atom feed");
        let resp = self.client
            .get(&self.base_url)
            .query(&[("id_list", arxiv_id)])
            .send().await?;
        ensure_success(&resp)?;
        Ok(resp.text().await?)
    }
}

#[async_trait]
impl Extractor for ArxivClient {
    fn name(&self) -> &str {
        "arxiv"
    }

    fn path(&self) -> ExtractionPath {
        ExtractionPath::AbstractFeed
    }

    fn applies_to(&self, _url: &str, kind: &SourceKind) -> bool {
        matches!(kind, SourceKind::AbstractFeed { .. })
    }

    async fn extract(&self, _url: &str, kind: &SourceKind) -> Result<Option<Extraction>, SourceError> {
        let SourceKind::AbstractFeed { arxiv_id } = kind else {
            return Ok(None);
        };
        let xml = self.fetch_feed(arxiv_id).await?;
        let entry = parse_feed(&xml)?;
        if entry.title.is_empty() && entry.summary.is_empty() {
            return Ok(None);
        }
        Ok(Some(Extraction {
            title: entry.title,
            abstract_text: entry.summary,
            methodology: None,
            citations: Vec::new(),
            authors: Some(entry.authors),
        }))
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct FeedEntry {
    pub title: String,
    pub summary: String,
    pub authors: Vec<String>,
}

/// Parse the first `<entry>` of an Atom feed. Documents without any entry
/// fall back to their top-level `<title>` and `<summary>`.
pub fn parse_feed(xml: &str) -> Result<FeedEntry, SourceError> {
    let mut reader = Reader::from_str(xml);
    let mut entry = FeedEntry::default();
    let mut document = FeedEntry::default();
    let mut entries_seen = 0usize;
    let mut in_entry = false;
    let mut in_author = false;
    let mut current_tag = String::new();
    let mut author_name = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let tag = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                let scope = if in_entry { &entry } else { &document };
                match tag.as_str() {
                    "entry" => {
                        entries_seen += 1;
                        in_entry = entries_seen == 1;
                        current_tag.clear();
                    }
                    "author" => {
                        in_author = true;
                        author_name.clear();
                        current_tag.clear();
                    }
                    // Only the first title/summary in a scope counts.
                    "title" if !scope.title.is_empty() => current_tag.clear(),
                    "summary" if !scope.summary.is_empty() => current_tag.clear(),
                    _ => current_tag.clone_from(&tag),
                }
            }
            Ok(Event::Text(e)) if in_entry || entries_seen == 0 => {
                let text = e.unescape().unwrap_or_default().to_string();
                let scope = if in_entry { &mut entry } else { &mut document };
                match current_tag.as_str() {
                    "title" if !in_author => scope.title.push_str(&text),
                    "summary" => scope.summary.push_str(&text),
                    "name" if in_author => author_name.push_str(&text),
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                let tag = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match tag.as_str() {
                    "entry" => in_entry = false,
                    "author" if in_author => {
                        in_author = false;
                        let name = collapse_whitespace(&author_name);
                        if !name.is_empty() {
                            if in_entry {
                                entry.authors.push(name);
                            } else if entries_seen == 0 {
                                document.authors.push(name);
                            }
                        }
                    }
                    _ => {}
                }
                if tag == current_tag {
                    current_tag.clear();
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(SourceError::Parse(format!("Atom parse error: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    // Without entries, the feed's own title is a query echo unless the
    // document carries an abstract alongside it.
    let mut parsed = if entries_seen > 0 {
        entry
    } else if !document.summary.trim().is_empty() {
        document
    } else {
        FeedEntry::default()
    };
    parsed.title = collapse_whitespace(&parsed.title);
    parsed.summary = collapse_whitespace(&parsed.summary);
    Ok(parsed)
}
