//! Keyword-overlap scoring used whenever a model provider is missing.
//!
//! Retrieval and rerank collapse into one pass in fallback mode: the score
//! computed here is both the filter and the final ranking.

use super::store::{DocFilter, Document, SearchResult};

/// Fraction of whitespace-separated query tokens found in `doc_text`.
///
/// Matching is a case-insensitive substring test, so a CJK query such as
/// "计算机" matches any document containing it. Repeated query tokens each
/// count. An empty query scores `0.0`.
pub fn score(query: &str, doc_text: &str) -> f32 {
    let tokens: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
    if tokens.is_empty() {
        return 0.0;
    }

    let doc_lower = doc_text.to_lowercase();
    let matched = tokens
        .iter()
        .filter(|t| doc_lower.contains(t.as_str()))
        .count();

    matched as f32 / tokens.len() as f32
}

/// Score every document, keep those above zero, best first, at most `limit`.
pub fn rank(
    query: &str,
    documents: &[Document],
    filter: Option<&DocFilter>,
    limit: usize,
) -> Vec<SearchResult> {
    let mut results: Vec<SearchResult> = documents
        .iter()
        .filter(|doc| filter.map_or(true, |f| f.matches(doc)))
        .filter_map(|doc| {
            let s = score(query, &doc.text);
            (s > 0.0).then(|| SearchResult::new(doc.clone(), s))
        })
        .collect();

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results.truncate(limit);
    results
}
