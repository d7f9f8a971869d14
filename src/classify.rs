use std::sync::LazyLock;

use regex::Regex;

static ARXIV_ABS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)arxiv\.org/abs/([\w./-]+)").expect("valid arXiv pattern")
});

static DOI_RESOLVER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[/.@])doi\.org/(.+)$|^doi:(.+)$").expect("valid DOI pattern")
});

/// What kind of upstream a source URL can be resolved against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    AbstractFeed { arxiv_id: String },
    ResolvableIdentifier { doi: String },
    DirectDocument,
    Unclassified,
}

impl SourceKind {
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::AbstractFeed { .. } => "abstract_feed",
            SourceKind::ResolvableIdentifier { .. } => "resolvable_identifier",
            SourceKind::DirectDocument => "direct_document",
            SourceKind::Unclassified => "unclassified",
        }
    }
}

/// Classify a source URL. Rules are checked in priority order:
/// arXiv abstract page, DOI resolver link, document download, anything else.
pub fn classify(url: &str) -> SourceKind {
    let url = url.trim();

    if let Some(caps) = ARXIV_ABS.captures(url) {
        let id = caps[1].trim_end_matches('/').trim_end_matches(".pdf");
        if !id.is_empty() {
            return SourceKind::AbstractFeed { arxiv_id: id.to_string() };
        }
    }

    if let Some(caps) = DOI_RESOLVER.captures(url) {
        let raw = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str()).unwrap_or("");
        if let Some(doi) = sanitize_doi(raw) {
            return SourceKind::ResolvableIdentifier { doi };
        }
    }

    if is_document_url(url) {
        return SourceKind::DirectDocument;
    }

    SourceKind::Unclassified
}

/// Strip resolver scheme/host and a literal `doi:` prefix, then keep the
/// substring starting at the first `10.` registrant prefix.
pub fn sanitize_doi(raw: &str) -> Option<String> {
    let mut s = raw.trim();
    for prefix in ["https://", "http://"] {
        if let Some(rest) = strip_prefix_ci(s, prefix) {
            s = rest;
        }
    }
    for prefix in ["dx.doi.org/", "doi.org/"] {
        if let Some(rest) = strip_prefix_ci(s, prefix) {
            s = rest;
        }
    }
    if let Some(rest) = strip_prefix_ci(s, "doi:") {
        s = rest.trim_start();
    }

    let start = s.find("10.")?;
    let doi = s[start..].trim_end_matches('/').trim();
    // A bare registrant prefix ("10.1234") is not a resolvable identifier.
    if !doi.contains('/') {
        return None;
    }
    Some(doi.to_string())
}

/// True when the URL points at a downloadable document rather than a landing page.
pub fn is_document_url(url: &str) -> bool {
    let lower = url.trim().to_ascii_lowercase();
    let path = lower.split(['?', '#']).next().unwrap_or("");
    path.ends_with(".pdf") || path.contains("/pdf/")
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len() && s.is_char_boundary(prefix.len())
        && s[..prefix.len()].eq_ignore_ascii_case(prefix)
    {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}
