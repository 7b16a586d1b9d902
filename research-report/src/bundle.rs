//! ABOUTME: Report bundle persistence — report.md, figures/, metadata.json
//! ABOUTME: One bundle directory per trace, named {traceId8}_{timestamp}

use base64::{engine::general_purpose::STANDARD, Engine as _};
use research_core::ComputationResult;
use std::io;
use std::path::PathBuf;

pub struct BundleMetadata<'a> {
    pub query: &'a str,
    pub model_name: &'a str,
    pub total_duration_ms: u64,
    pub total_tokens: u64,
    pub cited_count: usize,
    pub stages: &'a [String],
}

/// Writes `report.md`, one `figures/figure_N.png` per generated chart
/// (inline base64 references in `full_report` are rewritten to the
/// relative file path), and `metadata.json` under
/// `{log_dir}/reports/{trace_id8}_{timestamp}/`.
pub fn save_report_bundle(
    log_dir: &str,
    trace_id8: &str,
    full_report: &str,
    computational_result: Option<&ComputationResult>,
    meta: &BundleMetadata,
) -> io::Result<PathBuf> {
    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S").to_string();
    let bundle_dir = PathBuf::from(log_dir).join("reports").join(format!("{trace_id8}_{timestamp}"));
    std::fs::create_dir_all(&bundle_dir)?;

    let mut report_for_bundle = full_report.to_string();
    if let Some(computation) = computational_result {
        if !computation.figures.is_empty() {
            let figures_dir = bundle_dir.join("figures");
            std::fs::create_dir_all(&figures_dir)?;
            for (i, fig_b64) in computation.figures.iter().enumerate() {
                let index = i + 1;
                let bytes = STANDARD
                    .decode(fig_b64)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                std::fs::write(figures_dir.join(format!("figure_{index}.png")), bytes)?;
                report_for_bundle = rewrite_figure_reference(&report_for_bundle, index, fig_b64);
            }
        }
    }

    std::fs::write(bundle_dir.join("report.md"), report_for_bundle)?;

    let figure_titles: Vec<&str> = computational_result
        .map(|c| c.figure_specs.iter().map(|s| s.title.as_str()).collect())
        .unwrap_or_default();
    let metadata = serde_json::json!({
        "query": meta.query,
        "mode": "deep_research",
        "model": meta.model_name,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "durationMs": meta.total_duration_ms,
        "totalTokens": meta.total_tokens,
        "citations": {"citedCount": meta.cited_count},
        "figures": {
            "count": computational_result.map(|c| c.figures.len()).unwrap_or(0),
            "titles": figure_titles,
        },
        "stages": meta.stages,
    });
    std::fs::write(
        bundle_dir.join("metadata.json"),
        serde_json::to_string_pretty(&metadata).expect("metadata always serializable"),
    )?;

    Ok(bundle_dir)
}

fn rewrite_figure_reference(report: &str, index: usize, base64_png: &str) -> String {
    let needle = format!("data:image/png;base64,{base64_png})");
    let replacement = format!("figures/figure_{index}.png)");
    report.replace(&needle, &replacement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use research_core::{ChartSpec, ChartType};

    #[test]
    fn writes_report_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let computation = ComputationResult {
            figures: vec!["aGVsbG8=".to_string()],
            figure_specs: vec![ChartSpec {
                title: "Growth".to_string(),
                chart_type: ChartType::Bar,
                data_description: "d".to_string(),
                target_section: "s".to_string(),
                insight: "i".to_string(),
            }],
            stdout: String::new(),
            code: vec![],
            execution_time_ms: 0,
        };
        let report = "See ![Figure 1: Growth](data:image/png;base64,aGVsbG8=) here.";
        let meta = BundleMetadata {
            query: "q",
            model_name: "test-model",
            total_duration_ms: 10,
            total_tokens: 5,
            cited_count: 1,
            stages: &[],
        };
        let bundle_dir = save_report_bundle(
            dir.path().to_str().unwrap(),
            "abcd1234",
            report,
            Some(&computation),
            &meta,
        )
        .unwrap();

        assert!(bundle_dir.join("report.md").exists());
        assert!(bundle_dir.join("figures/figure_1.png").exists());
        assert!(bundle_dir.join("metadata.json").exists());

        let saved_report = std::fs::read_to_string(bundle_dir.join("report.md")).unwrap();
        assert!(saved_report.contains("figures/figure_1.png"));
        assert!(!saved_report.contains("base64"));
    }
}
