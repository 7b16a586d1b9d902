//! ABOUTME: Final report assembly — references, citations, formatting, persistence
//! ABOUTME: Ported from the original ReportGenerator, minus its inline-text variant

pub mod bundle;
pub mod citations;
pub mod formatting;
pub mod references;

pub use bundle::{save_report_bundle, BundleMetadata};
pub use citations::{analyze_citations, CitedReference};
pub use formatting::{build_academic_report_prompt, format_report_with_categorized_references};
pub use references::extract_references;

use research_core::{
    ComputationResult, GenerateOptions, ProcessingContext, ResearchError, SearchResult,
};
use research_providers::MultiProviderLlmClient;
use tracing::info;

/// Report-prep truncation bounds, tighter than the analyzer's because
/// this call site competes with citation-density and word-count
/// requirements within the same prompt.
pub const REPORT_MAX_PER_RESULT: usize = 6_000;
pub const REPORT_MAX_TOTAL: usize = 200_000;

/// Generates the final academic-style report body, then assembles it with
/// a categorized references section. `research_context` should already be
/// structured (e.g. the hierarchical context from `research-analysis`) or
/// a bounded plain summarisation, depending on what the caller has.
pub async fn write_final_report(
    ctx: &mut ProcessingContext,
    client: &MultiProviderLlmClient,
    search_results: &[SearchResult],
    report_plan: &str,
    research_context: &str,
    critical_analysis: Option<&str>,
    computational_result: Option<&ComputationResult>,
) -> Result<String, ResearchError> {
    info!(results = search_results.len(), "final report start");

    let references = extract_references(search_results);
    let prompt = build_academic_report_prompt(
        report_plan,
        research_context,
        &references,
        &ctx.request.query,
        critical_analysis,
        computational_result,
    );

    let (report_body, tokens) = client.generate(&prompt, &GenerateOptions::default()).await?;
    ctx.record_tokens(tokens.total_tokens);

    let (cited, uncited, citation_stats) = analyze_citations(&report_body, &references);
    let final_report = format_report_with_categorized_references(
        &report_body,
        &cited,
        &uncited,
        &citation_stats,
        critical_analysis.is_some(),
        computational_result,
    );

    ctx.response.metadata.insert(
        "citationStats".to_string(),
        serde_json::json!({
            "totalCitations": citation_stats.total_citations,
            "uniqueCitations": citation_stats.unique_citations,
            "citedReferences": cited.len(),
            "uncitedReferences": uncited.len(),
        }),
    );

    info!(words = final_report.split_whitespace().count(), "final report end");
    Ok(final_report)
}
