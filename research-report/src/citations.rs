//! ABOUTME: Citation analysis — which references the report body actually cites

use regex::Regex;
use research_core::{CitationStats, Reference};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
pub struct CitedReference {
    pub reference: Reference,
    pub citation_count: u64,
}

/// Scans `report_body` for `[n]`-style citations, splits `references`
/// into cited (sorted by citation count descending) and uncited, and
/// computes aggregate statistics. Citation numbers not present in
/// `references` are recorded as invalid rather than silently dropped.
pub fn analyze_citations(
    report_body: &str,
    references: &[Reference],
) -> (Vec<CitedReference>, Vec<Reference>, CitationStats) {
    let pattern = Regex::new(r"\[(\d+)\]").expect("static regex");
    let valid_ids: HashSet<u32> = references.iter().map(|r| r.id).collect();

    let mut counts: HashMap<u32, u64> = HashMap::new();
    let mut invalid = Vec::new();
    let mut invalid_seen = HashSet::new();

    for caps in pattern.captures_iter(report_body) {
        if let Ok(id) = caps[1].parse::<u32>() {
            *counts.entry(id).or_insert(0) += 1;
            if !valid_ids.contains(&id) && invalid_seen.insert(id) {
                invalid.push(id);
            }
        }
    }

    let mut cited = Vec::new();
    let mut uncited = Vec::new();
    for reference in references {
        match counts.get(&reference.id) {
            Some(&citation_count) => cited.push(CitedReference {
                reference: reference.clone(),
                citation_count,
            }),
            None => uncited.push(reference.clone()),
        }
    }
    cited.sort_by(|a, b| b.citation_count.cmp(&a.citation_count));

    let total_citations: u64 = counts.values().sum();
    let unique_citations = counts.len() as u64;
    let mut most_cited: Vec<(u32, u64)> = counts.iter().map(|(&id, &n)| (id, n)).collect();
    most_cited.sort_by(|a, b| b.1.cmp(&a.1));
    most_cited.truncate(5);

    let stats = CitationStats {
        total_citations,
        unique_citations,
        invalid_citations: invalid,
        most_cited,
        avg_citations_per_source: total_citations as f64 / unique_citations.max(1) as f64,
        citation_distribution: counts,
    };

    (cited, uncited, stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(id: u32, title: &str) -> Reference {
        Reference {
            id,
            title: title.to_string(),
            url: format!("https://example.com/{id}"),
            query: "q".to_string(),
            relevance: 1.0,
        }
    }

    #[test]
    fn splits_cited_and_uncited() {
        let refs = vec![reference(1, "A"), reference(2, "B")];
        let (cited, uncited, stats) = analyze_citations("See [1] and again [1].", &refs);
        assert_eq!(cited.len(), 1);
        assert_eq!(cited[0].citation_count, 2);
        assert_eq!(uncited.len(), 1);
        assert_eq!(stats.total_citations, 2);
        assert_eq!(stats.unique_citations, 1);
    }

    #[test]
    fn flags_invalid_citation_numbers() {
        let refs = vec![reference(1, "A")];
        let (_, _, stats) = analyze_citations("See [1] and [99].", &refs);
        assert_eq!(stats.invalid_citations, vec![99]);
    }
}
