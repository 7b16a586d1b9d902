//! ABOUTME: Academic report prompt construction and categorized-reference formatting
//! ABOUTME: Inline figure embedding matches each "Figure N" reference to its paragraph

use crate::citations::CitedReference;
use regex::Regex;
use research_core::{ChartSpec, ComputationResult, Reference};

/// Builds the references block (`[id] title`, one per line) and delegates
/// the rest of prompt construction to `research_prompts::academic_report_prompt`.
pub fn build_academic_report_prompt(
    plan: &str,
    context: &str,
    references: &[Reference],
    requirement: &str,
    critical_analysis: Option<&str>,
    computational_result: Option<&ComputationResult>,
) -> String {
    let references_block: String = references
        .iter()
        .map(|r| format!("[{}] {}", r.id, r.title))
        .collect::<Vec<_>>()
        .join("\n");

    let computational_summary = computational_result.map(|c| {
        format!(
            "Output:\n{}\n\nNumber of charts/figures generated: {}",
            c.stdout,
            c.figures.len()
        )
    });

    research_prompts::academic_report_prompt(
        plan,
        context,
        &references_block,
        requirement,
        critical_analysis,
        computational_summary.as_deref(),
    )
}

fn reference_entry(reference: &Reference, citation_count: Option<u64>) -> String {
    let indicator = match citation_count {
        Some(n) if n > 1 => format!(" `x{n}`"),
        _ => String::new(),
    };
    let mut entry = format!("[{}] **{}**{indicator}\n", reference.id, reference.title);
    entry.push_str(&format!("   URL: {}\n", reference.url));
    if !reference.query.is_empty() {
        let preview: String = reference.query.chars().take(50).collect();
        entry.push_str(&format!("   Search context: {preview}...\n"));
    }
    entry
}

fn references_section(
    cited: &[CitedReference],
    uncited: &[Reference],
    citation_stats: &research_core::CitationStats,
    has_critical_analysis: bool,
    computational_result: Option<&ComputationResult>,
) -> String {
    let mut out = String::from("\n\n---\n\n");

    if !cited.is_empty() {
        out.push_str("## Cited References\n\n");
        out.push_str("*Sources actually cited in this report, ordered by citation count:*\n\n");
        for cited_ref in cited.iter().take(30) {
            out.push_str(&reference_entry(&cited_ref.reference, Some(cited_ref.citation_count)));
            out.push('\n');
        }
    }

    if !uncited.is_empty() {
        out.push_str("\n## Related Sources (Not Cited)\n\n");
        out.push_str("*Consulted during research but not directly cited:*\n\n");
        for reference in uncited.iter().take(20) {
            out.push_str(&format!("- {}\n  URL: {}\n", reference.title, reference.url));
        }
        out.push('\n');
    }

    out.push_str("\n---\n\n## Citation Statistics\n\n");
    out.push_str("### Basic Metrics\n");
    out.push_str(&format!("- **Cited references**: {}\n", cited.len()));
    out.push_str(&format!("- **Related, uncited references**: {}\n", uncited.len()));
    let total_refs = cited.len() + uncited.len();
    out.push_str(&format!("- **Total references consulted**: {total_refs}\n"));
    let citation_rate = cited.len() as f64 / total_refs.max(1) as f64 * 100.0;
    out.push_str(&format!("- **Citation rate**: {citation_rate:.1}%\n"));

    out.push_str("\n### Citation Depth\n");
    out.push_str(&format!("- **Total citations**: {}\n", citation_stats.total_citations));
    out.push_str(&format!(
        "- **Average citations per source**: {:.1}\n",
        citation_stats.avg_citations_per_source
    ));
    if !citation_stats.most_cited.is_empty() {
        let most_cited: Vec<String> = citation_stats
            .most_cited
            .iter()
            .take(3)
            .map(|(id, count)| format!("[{id}] ({count}x)"))
            .collect();
        out.push_str(&format!("- **Most cited**: {}\n", most_cited.join(", ")));
    }
    if !citation_stats.invalid_citations.is_empty() {
        out.push_str(&format!(
            "\n**Warning**: detected {} invalid citation number(s): {:?}\n",
            citation_stats.invalid_citations.len(),
            citation_stats.invalid_citations
        ));
    }

    out.push_str("\n### Analysis Modes\n");
    let mut modes = vec!["Deep Research".to_string()];
    if has_critical_analysis {
        modes.push("Critical Analysis".to_string());
    }
    if let Some(computation) = computational_result {
        modes.push(format!("Computational Analysis ({} figures)", computation.figures.len()));
    }
    out.push_str(&format!("- **Research modes**: {}\n", modes.join(" + ")));

    out.push_str("\n---\n");
    out.push_str(&format!("*Report generated: {}*\n", chrono::Utc::now().format("%Y-%m-%d %H:%M:%S")));
    out.push_str("*Generated by the deep-research engine");
    if has_critical_analysis {
        out.push_str(" with critical analysis*");
    } else {
        out.push('*');
    }

    out
}

fn figure_markdown(index: usize, spec: Option<&ChartSpec>, base64_png: &str) -> String {
    let title = spec.map(|s| s.title.clone()).unwrap_or_else(|| format!("Figure {index}"));
    let insight = spec.map(|s| s.insight.clone()).unwrap_or_default();
    let mut md = format!("\n\n**Figure {index}: {title}**\n\n");
    md.push_str(&format!("![Figure {index}: {title}](data:image/png;base64,{base64_png})\n\n"));
    if !insight.is_empty() {
        md.push_str(&format!("*{insight}*\n\n"));
    }
    md
}

/// Finds where to insert a figure: first an explicit `Figure N` mention,
/// then (when a spec is known) its `targetSection` heading, inserting
/// after that match's paragraph boundary.
fn find_insertion_point(report_body: &str, index: usize, spec: Option<&ChartSpec>) -> Option<usize> {
    let figure_pattern = Regex::new(&format!(r"(?i)Figure\s+{index}\b")).expect("valid regex");
    let matched = figure_pattern.find(report_body).or_else(|| {
        spec.filter(|s| !s.target_section.trim().is_empty())
            .and_then(|s| {
                let escaped = regex::escape(s.target_section.trim());
                Regex::new(&format!(r"(?im)^#{{1,6}}\s*{escaped}\s*$"))
                    .ok()
                    .and_then(|re| re.find(report_body))
            })
    })?;

    let mut para_end = report_body[matched.end()..]
        .find("\n\n")
        .map(|p| matched.end() + p + 1)
        .unwrap_or(report_body.len());
    if para_end > report_body.len() {
        para_end = report_body.len();
    }
    Some(para_end)
}

/// Embeds each generated figure inline at its first `Figure N` reference
/// or `targetSection` heading in `report_body`, inserting after that
/// paragraph's boundary. Figures with no matching reference are appended
/// as an overflow block before the references section, so nothing
/// generated is silently dropped.
fn embed_figures_inline(report_body: &mut String, computational_result: Option<&ComputationResult>) -> String {
    let Some(computation) = computational_result else {
        return String::new();
    };
    if computation.figures.is_empty() {
        return String::new();
    }

    let mut overflow = String::new();
    for (i, base64_png) in computation.figures.iter().enumerate() {
        let index = i + 1;
        let spec = computation.figure_specs.get(i);
        let figure_md = figure_markdown(index, spec, base64_png);

        match find_insertion_point(report_body, index, spec) {
            Some(insert_at) => report_body.insert_str(insert_at, &figure_md),
            None => overflow.push_str(&figure_md),
        }
    }
    overflow
}

/// Assembles the final report: inline figure embedding, then the
/// categorized references/citation-statistics/mode footer block.
pub fn format_report_with_categorized_references(
    report_body: &str,
    cited: &[CitedReference],
    uncited: &[Reference],
    citation_stats: &research_core::CitationStats,
    has_critical_analysis: bool,
    computational_result: Option<&ComputationResult>,
) -> String {
    let mut body = report_body.to_string();
    let overflow = embed_figures_inline(&mut body, computational_result);
    let references = references_section(cited, uncited, citation_stats, has_critical_analysis, computational_result);
    format!("{body}{overflow}{references}")
}
