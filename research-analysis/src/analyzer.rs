//! ABOUTME: Progressive synthesis, critical analysis, and bounded result summarisation
//! ABOUTME: Grounded in the original ResearchAnalyzer's synthesis/critique stages

use research_core::{ProcessingContext, ResearchError, SearchResult, SynthesisRecord};
use research_providers::MultiProviderLlmClient;
use research_utils::truncate::{summarize_bounded, BoundedItem};
use research_utils::parse_lenient;
use serde::Deserialize;
use tracing::info;

/// Default bounds for progressive-synthesis prompts. Distinct from the
/// reporter's tighter `(6000, 200_000)` call-site policy — see DESIGN.md.
pub const DEFAULT_MAX_PER_RESULT: usize = 8_000;
pub const DEFAULT_MAX_TOTAL: usize = 200_000;

pub(crate) fn content_for(result: &SearchResult) -> &str {
    result
        .result
        .full_content
        .as_deref()
        .filter(|s| !s.is_empty())
        .or_else(|| Some(result.result.processed.as_str()).filter(|s| !s.is_empty()))
        .unwrap_or(result.result.summary.as_str())
}

/// Serialises `results` in order, preferring `full_content` over
/// `processed` over `summary`, bounded at `max_per_result`/`max_total`.
/// This is the input for every downstream synthesis prompt once the
/// search loop's raw results are too large to pass whole.
pub fn summarize_search_results(
    results: &[SearchResult],
    max_per_result: usize,
    max_total: usize,
) -> String {
    let items: Vec<BoundedItem> = results
        .iter()
        .enumerate()
        .map(|(i, r)| BoundedItem {
            label: format!("Search {} - Query: {}", i + 1, r.query),
            content: content_for(r).to_string(),
        })
        .collect();
    summarize_bounded(&items, max_per_result, max_total)
}

#[derive(Debug, Deserialize, Default)]
struct SynthesisRaw {
    #[serde(default)]
    synthesis: String,
    #[serde(rename = "sectionCoverage", default)]
    section_coverage: std::collections::HashMap<String, research_core::SectionCoverageEntry>,
    #[serde(rename = "knowledgeGaps", default)]
    knowledge_gaps: Vec<String>,
    #[serde(rename = "crossDomainLinks", default)]
    cross_domain_links: Vec<String>,
}

/// One LLM call integrating this wave's findings with `previous_synthesis`.
/// Appends a <=500-char preview of the new synthesis text to
/// `ctx.response.metadata["synthesisHistory"]`, realising invariant 7
/// (progressive synthesis preservation) together with the orchestrator
/// threading the returned record forward as next iteration's input.
pub async fn intermediate_synthesis(
    ctx: &mut ProcessingContext,
    client: &MultiProviderLlmClient,
    report_plan: &str,
    wave_results: &[SearchResult],
    previous_synthesis: Option<&str>,
) -> Result<SynthesisRecord, ResearchError> {
    info!(wave_size = wave_results.len(), "intermediate synthesis start");

    let wave_summary = summarize_search_results(wave_results, DEFAULT_MAX_PER_RESULT, DEFAULT_MAX_TOTAL);
    let prompt = research_prompts::intermediate_synthesis_prompt(
        &ctx.request.query,
        report_plan,
        &wave_summary,
        previous_synthesis,
    );

    let (text, tokens) = client
        .generate(&prompt, &research_core::GenerateOptions::default())
        .await?;
    ctx.record_tokens(tokens.total_tokens);

    let raw: SynthesisRaw = parse_lenient(&text, || SynthesisRaw {
        synthesis: text.clone(),
        ..Default::default()
    });

    let preview: String = raw.synthesis.chars().take(500).collect();
    ctx.response
        .metadata
        .entry("synthesisHistory")
        .or_insert_with(|| serde_json::Value::Array(Vec::new()));
    if let Some(serde_json::Value::Array(history)) = ctx.response.metadata.get_mut("synthesisHistory") {
        history.push(serde_json::Value::String(preview));
    }

    info!("intermediate synthesis end");
    Ok(SynthesisRecord {
        synthesis: raw.synthesis,
        section_coverage: raw.section_coverage,
        knowledge_gaps: raw.knowledge_gaps,
        cross_domain_links: raw.cross_domain_links,
    })
}

/// Unconditional multi-perspective critique. Uses `synthesis` when
/// available rather than re-summarising raw results, to stay within
/// prompt bounds. Result is stored at
/// `ctx.response.metadata["criticalAnalysis"]`.
pub async fn critical_analysis_stage(
    ctx: &mut ProcessingContext,
    client: &MultiProviderLlmClient,
    results: &[SearchResult],
    report_plan: &str,
    synthesis: Option<&str>,
) -> Result<String, ResearchError> {
    info!("critical analysis start");

    let owned_summary;
    let research_summary = match synthesis {
        Some(s) => s,
        None => {
            owned_summary = summarize_search_results(results, DEFAULT_MAX_PER_RESULT, DEFAULT_MAX_TOTAL);
            &owned_summary
        }
    };

    let context_block = format!("Research Plan:\n{report_plan}\n\nResearch Findings:\n{research_summary}");
    let prompt = research_prompts::critical_thinking_prompt(&ctx.request.query, &context_block);

    let (critical_analysis, tokens) = client
        .generate(&prompt, &research_core::GenerateOptions::default())
        .await?;
    ctx.record_tokens(tokens.total_tokens);

    ctx.response.metadata.insert(
        "criticalAnalysis".to_string(),
        serde_json::Value::String(critical_analysis.clone()),
    );

    info!("critical analysis end");
    Ok(critical_analysis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use research_core::{SearchResultInner, SourceRef};

    fn result(query: &str, content: &str) -> SearchResult {
        SearchResult {
            query: query.to_string(),
            goal: "goal".to_string(),
            priority: 1,
            result: SearchResultInner {
                summary: content.to_string(),
                sources: vec![SourceRef {
                    url: "https://example.com".to_string(),
                    title: "Example".to_string(),
                    relevance: 0.9,
                }],
                processed: String::new(),
                full_content: None,
                provider: Some("tavily".to_string()),
                timestamp: Utc::now(),
            },
        }
    }

    #[test]
    fn prefers_full_content_over_processed_over_summary() {
        let mut r = result("q", "summary text");
        r.result.processed = "processed text".to_string();
        r.result.full_content = Some("full text".to_string());
        assert_eq!(content_for(&r), "full text");

        r.result.full_content = None;
        assert_eq!(content_for(&r), "processed text");

        r.result.processed = String::new();
        assert_eq!(content_for(&r), "summary text");
    }

    #[test]
    fn summarize_truncates_and_marks_overflow() {
        let results = vec![result("a", &"x".repeat(10)), result("b", &"y".repeat(10))];
        let out = summarize_search_results(&results, 5, 20);
        assert!(out.contains("... [truncated]") || out.contains("more results truncated"));
    }
}
