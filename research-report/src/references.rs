//! ABOUTME: Reference extraction — stable IDs assigned before relevance sort

use research_core::{Reference, SearchResult};

/// Extracts one reference per non-empty-URL source across `search_results`,
/// in encounter order. IDs are assigned during that pass and never change
/// afterward; the returned vec is then sorted by relevance descending for
/// display. This ordering realises reference stability: a citation `[7]`
/// in the report body always means the same source, regardless of how the
/// reference list is later re-sorted or filtered.
pub fn extract_references(search_results: &[SearchResult]) -> Vec<Reference> {
    let mut references = Vec::new();
    let mut next_id = 1u32;

    for result in search_results {
        for source in &result.result.sources {
            if source.url.is_empty() {
                continue;
            }
            references.push(Reference {
                id: next_id,
                title: if source.title.is_empty() {
                    "Untitled".to_string()
                } else {
                    source.title.clone()
                },
                url: source.url.clone(),
                query: result.query.clone(),
                relevance: source.relevance,
            });
            next_id += 1;
        }
    }

    references.sort_by(|a, b| b.relevance.partial_cmp(&a.relevance).unwrap_or(std::cmp::Ordering::Equal));
    references
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use research_core::{SearchResultInner, SourceRef};

    fn result(query: &str, sources: Vec<SourceRef>) -> SearchResult {
        SearchResult {
            query: query.to_string(),
            goal: "goal".to_string(),
            priority: 1,
            result: SearchResultInner {
                summary: String::new(),
                sources,
                processed: String::new(),
                full_content: None,
                provider: None,
                timestamp: Utc::now(),
            },
        }
    }

    #[test]
    fn skips_sources_without_url() {
        let results = vec![result(
            "q",
            vec![SourceRef {
                url: String::new(),
                title: "no url".to_string(),
                relevance: 0.9,
            }],
        )];
        assert!(extract_references(&results).is_empty());
    }

    #[test]
    fn ids_are_assigned_before_relevance_sort() {
        let results = vec![result(
            "q",
            vec![
                SourceRef {
                    url: "https://a.example".to_string(),
                    title: "A".to_string(),
                    relevance: 0.2,
                },
                SourceRef {
                    url: "https://b.example".to_string(),
                    title: "B".to_string(),
                    relevance: 0.9,
                },
            ],
        )];
        let refs = extract_references(&results);
        assert_eq!(refs[0].title, "B");
        assert_eq!(refs[0].id, 2);
        assert_eq!(refs[1].title, "A");
        assert_eq!(refs[1].id, 1);
    }
}
