//! Best-effort text heuristics used when an upstream does not supply
//! key findings or a methodology section directly.

pub const MAX_KEY_FINDINGS: usize = 3;

pub const DEFAULT_METHOD_KEYWORDS: &[&str] = &[
    "method",
    "methodology",
    "approach",
    "simulation",
    "experiment",
    "evaluated",
    "framework",
    "algorithm",
    "model",
    "survey",
    "analysis",
];

#[derive(Debug, Clone)]
pub struct Annotator {
    keywords: Vec<String>,
}

impl Default for Annotator {
    fn default() -> Self {
        Self::new(DEFAULT_METHOD_KEYWORDS.iter().map(|k| k.to_string()))
    }
}

impl Annotator {
    /// Keywords are matched case-insensitively as substrings; blanks are dropped.
    pub fn new(keywords: impl IntoIterator<Item = String>) -> Self {
        let keywords = keywords
            .into_iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keywords }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// The leading sentences of an abstract, at most three.
    pub fn key_findings(&self, abstract_text: &str) -> Vec<String> {
        split_sentences(abstract_text)
            .into_iter()
            .take(MAX_KEY_FINDINGS)
            .collect()
    }

    /// First abstract sentence mentioning a method keyword, or empty.
    pub fn methodology(&self, abstract_text: &str) -> String {
        split_sentences(abstract_text)
            .into_iter()
            .find(|s| {
                let lower = s.to_lowercase();
                self.keywords.iter().any(|k| lower.contains(k.as_str()))
            })
            .unwrap_or_default()
    }
}

/// Split on `.`, `!` or `?` followed by whitespace. Each piece is trimmed
/// and empty pieces are dropped.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let Some(&(next_i, next_c)) = chars.peek() else {
            continue;
        };
        if next_c.is_whitespace() {
            push_trimmed(&mut sentences, &text[start..next_i]);
            // Skip the whitespace run that separates sentences.
            let mut end = next_i;
            while let Some(&(j, w)) = chars.peek() {
                if !w.is_whitespace() {
                    break;
                }
                end = j + w.len_utf8();
                chars.next();
            }
            start = end;
        }
    }
    push_trimmed(&mut sentences, &text[start..]);
    sentences
}

fn push_trimmed(out: &mut Vec<String>, piece: &str) {
    let piece = piece.trim();
    if !piece.is_empty() {
        out.push(piece.to_string());
    }
}
