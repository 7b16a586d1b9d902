//! ABOUTME: Section-aware hierarchical synthesis — parse, classify, synthesize, assemble
//! ABOUTME: Ported from the original section_synthesizer, not wired in the Python orchestrator

use crate::analyzer::content_for;
use regex::Regex;
use research_core::{Reference, ResearchError, SearchResult};
use research_providers::MultiProviderLlmClient;
use research_utils::truncate::{summarize_bounded, BoundedItem};
use research_utils::parse_lenient;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::info;

/// Per-section truncation bounds, tighter than the analyzer's progressive
/// synthesis bounds since each section only needs its own evidence.
pub const MAX_PER_RESULT: usize = 8_000;
pub const MAX_TOTAL: usize = 30_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub id: usize,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub claim: String,
    pub source_ids: Vec<u32>,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectionSynthesis {
    pub synthesis: String,
    pub evidence_index: Vec<EvidenceItem>,
    pub key_data_points: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct HierarchicalContext {
    pub structured_context: String,
    pub evidence_index: Vec<EvidenceItem>,
    pub section_syntheses: Vec<(Section, SectionSynthesis)>,
}

/// Splits a report plan into sections on `^##\s+` headings. Falls back to
/// a single catch-all "Research Findings" section spanning the whole plan
/// when no heading is found, so every caller downstream always has at
/// least one section to synthesize.
pub fn parse_sections(report_plan: &str) -> Vec<Section> {
    let heading = Regex::new(r"(?m)^##\s+(.+?)\s*$").expect("static regex");
    let matches: Vec<_> = heading.find_iter(report_plan).collect();

    if matches.is_empty() {
        return vec![Section {
            id: 0,
            title: "Research Findings".to_string(),
            description: report_plan.trim().to_string(),
        }];
    }

    let captures: Vec<_> = heading.captures_iter(report_plan).collect();
    let mut sections = Vec::with_capacity(matches.len());
    for (i, (m, cap)) in matches.iter().zip(captures.iter()).enumerate() {
        let title = cap[1].trim().to_string();
        let body_start = m.end();
        let body_end = matches.get(i + 1).map(|next| next.start()).unwrap_or(report_plan.len());
        let description = report_plan[body_start..body_end].trim().to_string();
        sections.push(Section {
            id: i,
            title,
            description,
        });
    }
    sections
}

#[derive(Debug, Deserialize, Default)]
struct ClassificationRaw {
    #[serde(default)]
    mapping: HashMap<String, Vec<usize>>,
}

/// One LLM call mapping each search result index onto every section it is
/// relevant to. On parse failure every result is assigned to every
/// section, so no section ever synthesizes against zero evidence solely
/// because classification broke.
pub async fn classify_results_to_sections(
    client: &MultiProviderLlmClient,
    sections: &[Section],
    results: &[SearchResult],
) -> Result<HashMap<String, Vec<usize>>, ResearchError> {
    if sections.is_empty() || results.is_empty() {
        return Ok(HashMap::new());
    }

    let section_pairs: Vec<(String, String)> = sections
        .iter()
        .map(|s| (s.title.clone(), s.description.clone()))
        .collect();
    let result_summaries: Vec<(usize, String, String, String)> = results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let snippet: String = content_for(r).chars().take(300).collect();
            (i, r.query.clone(), r.goal.clone(), snippet)
        })
        .collect();

    let prompt = research_prompts::section_classification_prompt(&section_pairs, &result_summaries);
    let (text, _tokens) = client
        .generate(&prompt, &research_core::GenerateOptions::default())
        .await?;

    let raw: ClassificationRaw = parse_lenient(&text, ClassificationRaw::default);
    if raw.mapping.is_empty() {
        let all_indices: Vec<usize> = (0..results.len()).collect();
        return Ok(sections
            .iter()
            .map(|s| (s.title.clone(), all_indices.clone()))
            .collect());
    }
    Ok(raw.mapping)
}

fn section_references(results: &[&SearchResult], all_references: &[Reference]) -> Vec<Reference> {
    let mut seen = HashSet::new();
    let mut refs = Vec::new();
    for r in results {
        for src in r.result.sources.iter().take(5) {
            if let Some(reference) = all_references.iter().find(|x| x.url == src.url) {
                if seen.insert(reference.id) {
                    refs.push(reference.clone());
                }
            }
        }
    }
    refs
}

#[derive(Debug, Deserialize, Default)]
struct SectionSynthesisRaw {
    #[serde(default)]
    synthesis: String,
    #[serde(rename = "evidenceIndex", default)]
    evidence_index: Vec<EvidenceRaw>,
    #[serde(rename = "keyDataPoints", default)]
    key_data_points: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EvidenceRaw {
    claim: String,
    #[serde(rename = "sourceIds", default)]
    source_ids: Vec<u32>,
    #[serde(default = "default_confidence")]
    confidence: Confidence,
}

fn default_confidence() -> Confidence {
    Confidence::Medium
}

/// One LLM call synthesising `section` from its assigned `results`.
/// Returns an empty synthesis without calling out if no results were
/// assigned — there is nothing to ground a synthesis in.
pub async fn synthesize_section(
    client: &MultiProviderLlmClient,
    section: &Section,
    results: &[&SearchResult],
    all_references: &[Reference],
    language: Option<&str>,
) -> Result<SectionSynthesis, ResearchError> {
    if results.is_empty() {
        return Ok(SectionSynthesis::default());
    }

    let items: Vec<BoundedItem> = results
        .iter()
        .map(|r| BoundedItem {
            label: format!("Query: {}", r.query),
            content: content_for(r).to_string(),
        })
        .collect();
    let results_context = summarize_bounded(&items, MAX_PER_RESULT, MAX_TOTAL);
    let refs = section_references(results, all_references);

    let prompt = research_prompts::section_synthesis_prompt(&section.title, &results_context, &refs, language);
    let (text, _tokens) = client
        .generate(&prompt, &research_core::GenerateOptions::default())
        .await?;

    let raw: SectionSynthesisRaw = parse_lenient(&text, || SectionSynthesisRaw {
        synthesis: text.clone(),
        ..Default::default()
    });

    Ok(SectionSynthesis {
        synthesis: raw.synthesis,
        evidence_index: raw
            .evidence_index
            .into_iter()
            .map(|e| EvidenceItem {
                claim: e.claim,
                source_ids: e.source_ids,
                confidence: e.confidence,
            })
            .collect(),
        key_data_points: raw.key_data_points,
    })
}

fn render_section(title: &str, synthesis: &SectionSynthesis) -> String {
    let evidence = if synthesis.evidence_index.is_empty() {
        "_No distinct evidence items identified._".to_string()
    } else {
        synthesis
            .evidence_index
            .iter()
            .map(|e| {
                let ids = e
                    .source_ids
                    .iter()
                    .map(|id| format!("[{id}]"))
                    .collect::<Vec<_>>()
                    .join(" ");
                format!("- {} {} (confidence: {:?})", e.claim, ids, e.confidence)
            })
            .collect::<Vec<_>>()
            .join("\n")
    };
    let data_points = if synthesis.key_data_points.is_empty() {
        "_None identified._".to_string()
    } else {
        synthesis
            .key_data_points
            .iter()
            .map(|p| format!("- {p}"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "## {title}\n\n### Detailed Findings\n\n{}\n\n### Evidence Index\n\n{evidence}\n\n### Key Data Points\n\n{data_points}",
        if synthesis.synthesis.is_empty() {
            "_No results were available for this section._"
        } else {
            synthesis.synthesis.as_str()
        }
    )
}

/// Classifies, synthesizes (concurrently per section) and assembles the
/// full hierarchical context that supersedes raw result summarisation as
/// input to the final report prompt.
pub async fn build_hierarchical_context(
    client: &MultiProviderLlmClient,
    sections: &[Section],
    results: &[SearchResult],
    all_references: &[Reference],
    language: Option<&str>,
) -> Result<HierarchicalContext, ResearchError> {
    info!(sections = sections.len(), results = results.len(), "hierarchical context start");

    let mapping = classify_results_to_sections(client, sections, results).await?;

    let futures = sections.iter().map(|section| {
        let assigned: Vec<&SearchResult> = mapping
            .get(&section.title)
            .map(|indices| indices.iter().filter_map(|&i| results.get(i)).collect())
            .unwrap_or_default();
        synthesize_section(client, section, &assigned, all_references, language)
    });

    let synthesized: Vec<Result<SectionSynthesis, ResearchError>> = futures::future::join_all(futures).await;

    let mut section_syntheses = Vec::with_capacity(sections.len());
    let mut rendered = Vec::with_capacity(sections.len());
    let mut evidence_index = Vec::new();

    for (section, synthesis) in sections.iter().zip(synthesized.into_iter()) {
        let synthesis = synthesis?;
        rendered.push(render_section(&section.title, &synthesis));
        evidence_index.extend(synthesis.evidence_index.clone());
        section_syntheses.push((section.clone(), synthesis));
    }

    info!("hierarchical context end");
    Ok(HierarchicalContext {
        structured_context: rendered.join("\n---\n\n"),
        evidence_index,
        section_syntheses,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_sections_splits_on_headings() {
        let plan = "## Background\nsome text\n## Analysis\nmore text\n";
        let sections = parse_sections(plan);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].title, "Background");
        assert_eq!(sections[0].description, "some text");
        assert_eq!(sections[1].title, "Analysis");
        assert_eq!(sections[1].description, "more text");
    }

    #[test]
    fn parse_sections_falls_back_without_headings() {
        let sections = parse_sections("no headings here");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title, "Research Findings");
    }

    #[test]
    fn render_section_handles_empty_synthesis() {
        let out = render_section("Title", &SectionSynthesis::default());
        assert!(out.contains("No results were available"));
        assert!(out.contains("_None identified._"));
    }
}
