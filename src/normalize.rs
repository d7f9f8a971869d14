use crate::apis::openalex::OAWork;
use crate::classify::sanitize_doi;
use crate::models::SearchResult;

pub const SNIPPET_CHARS: usize = 300;

/// Map one upstream work onto the canonical result shape.
///
/// `max_score` is the largest raw score in the page; scores are divided by
/// it so every result lands in `[0, 1]`.
pub fn normalize(work: &OAWork, max_score: f64) -> SearchResult {
    let relevance_score = match work.raw_score() {
        Some(s) if max_score > 0.0 => (s / max_score).clamp(0.0, 1.0),
        _ => 0.0,
    };
    let doi = work.raw_doi().and_then(sanitize_doi).unwrap_or_default();

    SearchResult {
        url: result_url(work, &doi),
        title: work.display_title(),
        snippet: snippet(&work.abstract_text()),
        relevance_score,
        year: work.publication_year.filter(|y| (1000..=9999).contains(y)),
        citations: work
            .cited_by_count
            .map(|c| c.clamp(0, u32::MAX as i64) as u32)
            .unwrap_or(0),
        authors: work.author_names(),
        venue: venue(work),
        doi,
    }
}

/// Largest usable score in a page, `0.0` when none is present.
pub fn max_score(works: &[OAWork]) -> f64 {
    works
        .iter()
        .filter_map(OAWork::raw_score)
        .fold(0.0, f64::max)
}

fn result_url(work: &OAWork, doi: &str) -> String {
    let primary = work.primary_location.as_ref();
    non_blank(primary.and_then(|l| l.landing_page_url.as_deref()))
        .or_else(|| non_blank(primary.and_then(|l| l.pdf_url.as_deref())))
        .or_else(|| non_blank(work.best_oa_location.as_ref()?.pdf_url.as_deref()))
        .map(str::to_string)
        .unwrap_or_else(|| {
            if doi.is_empty() {
                String::new()
            } else {
                format!("https://doi.org/{}", doi)
            }
        })
}

fn non_blank(url: Option<&str>) -> Option<&str> {
    url.map(str::trim).filter(|u| !u.is_empty())
}

fn venue(work: &OAWork) -> String {
    work.primary_location
        .as_ref()
        .and_then(|l| l.source.as_ref()?.display_name.as_deref())
        .or_else(|| work.host_venue.as_ref()?.display_name.as_deref())
        .map(str::trim)
        .unwrap_or_default()
        .to_string()
}

fn snippet(text: &str) -> String {
    match text.char_indices().nth(SNIPPET_CHARS) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
