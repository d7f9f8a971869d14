use super::{collapse_whitespace, ensure_success, Extraction, ExtractionPath, Extractor, SourceError};
use crate::classify::{is_document_url, SourceKind};
use async_trait::async_trait;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8070";

/// Liveness paths differ between GROBID releases and reverse-proxy setups.
const ISALIVE_PATHS: [&str; 3] = ["/api/isalive", "/isalive", "/api/isalive/"];

/// Downloads documents and structures them through a GROBID service.
pub struct GrobidClient {
    client: reqwest::Client,
    probe_client: reqwest::Client,
    base_url: String,
}

impl GrobidClient {
    /// `client` carries the long full-text timeout; `probe_client` the short one.
    pub fn new(client: reqwest::Client, probe_client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self { client, probe_client, base_url: base_url.into() }
    }

    pub async fn download(&self, url: &str) -> Result<Vec<u8>, SourceError> {
        tracing::debug!(url, "Downloading document");
        let resp = self.client.get(url).send().await?;
        ensure_success(&resp)?;
        Ok(resp.bytes().await?.to_vec())
    }

    /// Submit raw document bytes and return the TEI markup.
    pub async fn process_fulltext(&self, document: Vec<u8>) -> Result<String, SourceError> {
        let part = reqwest::multipart::Part::bytes(document)
            .file_name("input.pdf")
            .mime_str("application/pdf")?;
        let form = reqwest::multipart::Form::new().part("input", part);

        let resp = self.client
            .post(format!("{}/api/processFulltextDocument", self.base_url))
            .multipart(form)
            .send().await?;
        ensure_success(&resp)?;
        Ok(resp.text().await?)
    }

    pub async fn is_alive(&self) -> bool {
        for probe in ISALIVE_PATHS {
            let url = format!("{}{}", self.base_url, probe);
            match self.probe_client.get(&url).send().await {
                Ok(r) if r.status().is_success() => return true,
                Ok(r) => tracing::debug!(url = %url, status = r.status().as_u16(), "GROBID probe rejected"),
                Err(e) => tracing::debug!(url = %url, error = %e, "GROBID probe failed"),
            }
        }
        false
    }
}

#[async_trait]
impl Extractor for GrobidClient {
    fn name(&self) -> &str { "grobid" }

    fn path(&self) -> ExtractionPath { ExtractionPath::DocumentFulltext }

    /// Any URL shaped like a document download, whatever else it classified as.
    fn applies_to(&self, url: &str, _kind: &SourceKind) -> bool {
        is_document_url(url)
    }

    async fn extract(&self, url: &str, _kind: &SourceKind) -> Result<Option<Extraction>, SourceError> {
        let document = self.download(url).await?;
        if document.is_empty() {
            return Err(SourceError::EmptyDocument(url.to_string()));
        }
        let tei = self.process_fulltext(document).await?;
        if tei.trim().is_empty() {
            return Ok(None);
        }
        let parsed = parse_tei(&tei)?;
        Ok(Some(Extraction {
            title: parsed.title,
            abstract_text: parsed.abstract_text,
            methodology: parsed.methodology,
            citations: parsed.citations,
            authors: Some(parsed.authors),
        }))
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct TeiDocument {
    pub title: String,
    pub abstract_text: String,
    pub methodology: Option<String>,
    pub citations: Vec<String>,
    pub authors: Vec<String>,
}

/// Text collected between a start tag at `depth` and its matching end tag.
#[derive(Default)]
struct Capture {
    depth: Option<usize>,
    text: String,
    done: bool,
}

impl Capture {
    fn open(&mut self, depth: usize) {
        self.depth = Some(depth);
        self.text.clear();
    }

    fn active(&self) -> bool {
        self.depth.is_some()
    }

    fn idle(&self) -> bool {
        !self.done && self.depth.is_none()
    }

    /// Close if `depth` matches; returns the collapsed text when it closed.
    fn close(&mut self, depth: usize) -> Option<String> {
        if self.depth != Some(depth) {
            return None;
        }
        self.depth = None;
        Some(collapse_whitespace(&self.text))
    }
}

fn is_method_div(e: &BytesStart) -> bool {
    e.attributes().flatten().any(|attr| {
        attr.key.local_name().as_ref() == b"type" && attr.value.as_ref() == b"method"
    })
}

/// Parse GROBID TEI: header title and abstract, the first `<div type="method">`,
/// reference titles from `<listBibl>`, and header author names.
pub fn parse_tei(xml: &str) -> Result<TeiDocument, SourceError> {
    let mut reader = Reader::from_str(xml);
    let mut doc = TeiDocument::default();
    let mut stack: Vec<String> = Vec::new();
    let mut title = Capture::default();
    let mut abstract_text = Capture::default();
    let mut method = Capture::default();
    let mut bibl = Capture::default();
    let mut bibl_title = Capture::default();
    let mut author = Capture::default();
    let mut name_part = Capture::default();
    let mut author_parts: Vec<String> = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                let in_bibl_list = stack.iter().any(|t| t == "listBibl");
                let in_header = stack.iter().any(|t| t == "teiHeader");
                let method_div = name == "div" && is_method_div(&e);
                stack.push(name);
                let depth = stack.len();

                match stack[depth - 1].as_str() {
                    "title" if in_bibl_list => {
                        if bibl.active() && bibl_title.idle() {
                            bibl_title.open(depth);
                        }
                    }
                    "title" if title.idle() => title.open(depth),
                    "abstract" if abstract_text.idle() => abstract_text.open(depth),
                    "div" if method_div && method.idle() => method.open(depth),
                    "biblStruct" if in_bibl_list => {
                        bibl.open(depth);
                        bibl_title = Capture::default();
                    }
                    "author" if in_header && !in_bibl_list => {
                        author.open(depth);
                        author_parts.clear();
                    }
                    "forename" | "surname" if author.active() => {
                        name_part.open(depth);
                        author_parts.push(String::new());
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape().unwrap_or_default();
                if title.active() {
                    title.text.push_str(&text);
                }
                if bibl_title.active() {
                    bibl_title.text.push_str(&text);
                }
                if abstract_text.active() {
                    abstract_text.text.push_str(&text);
                }
                if let Some(depth) = method.depth {
                    if !stack[depth..].iter().any(|t| t == "head") {
                        method.text.push_str(&text);
                    }
                }
                if name_part.active() {
                    if let Some(part) = author_parts.last_mut() {
                        part.push_str(&text);
                    }
                }
            }
            Ok(Event::End(_)) => {
                let depth = stack.len();
                let Some(name) = stack.pop() else {
                    return Err(SourceError::Parse("unbalanced TEI markup".into()));
                };
                if matches!(name.as_str(), "p" | "head" | "div" | "s") {
                    abstract_text.text.push(' ');
                    method.text.push(' ');
                }

                if let Some(t) = title.close(depth) {
                    if !t.is_empty() {
                        doc.title = t;
                        title.done = true;
                    }
                }
                if let Some(t) = abstract_text.close(depth) {
                    doc.abstract_text = t;
                    abstract_text.done = true;
                }
                if let Some(t) = method.close(depth) {
                    doc.methodology = Some(t).filter(|m| !m.is_empty());
                    method.done = true;
                }
                if let Some(t) = bibl_title.close(depth) {
                    bibl_title.text = t;
                    bibl_title.done = true;
                }
                if bibl.close(depth).is_some() {
                    let reference = collapse_whitespace(&bibl_title.text);
                    if !reference.is_empty() {
                        doc.citations.push(reference);
                    }
                }
                name_part.close(depth);
                if author.close(depth).is_some() {
                    let full = collapse_whitespace(&author_parts.join(" "));
                    if !full.is_empty() {
                        doc.authors.push(full);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(SourceError::Parse(format!("TEI parse error: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    Ok(doc)
}
