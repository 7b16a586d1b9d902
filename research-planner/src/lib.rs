//! ABOUTME: Report planning, domain identification, and search-query generation
//! ABOUTME: Thin orchestration over research-prompts and the multi-provider LLM client

use research_core::{Domain, GapReport, GenerateOptions, ResearchError, SearchTask};
use research_providers::MultiProviderLlmClient;
use research_utils::parse_lenient;
use serde::Deserialize;
use tracing::info;

/// Produces the markdown report plan for `query`.
pub async fn write_report_plan(
    client: &MultiProviderLlmClient,
    query: &str,
) -> Result<String, ResearchError> {
    let prompt = research_prompts::report_plan_prompt(query);
    let (text, _tokens) = client.generate(&prompt, &GenerateOptions::default()).await?;
    info!(chars = text.len(), "report plan generated");
    Ok(text)
}

#[derive(Debug, Deserialize, Default)]
struct DomainsResponse {
    #[serde(default)]
    domains: Vec<DomainRaw>,
}

#[derive(Debug, Deserialize)]
struct DomainRaw {
    name: String,
    weight: f64,
    #[serde(rename = "searchAngles", default)]
    search_angles: Vec<String>,
}

/// Identifies the distinct research domains a topic spans. Falls back to
/// a single catch-all domain if the model response cannot be parsed.
pub async fn identify_research_domains(
    client: &MultiProviderLlmClient,
    query: &str,
    plan: &str,
) -> Result<Vec<Domain>, ResearchError> {
    let prompt = research_prompts::domain_identification_prompt(query, plan);
    let (text, _) = client.generate(&prompt, &GenerateOptions::default()).await?;

    let parsed: Vec<DomainRaw> = parse_lenient_domains(&text);
    if parsed.is_empty() {
        return Ok(vec![Domain {
            name: "General".to_string(),
            weight: 1.0,
            search_angles: vec![query.to_string()],
        }]);
    }

    Ok(parsed
        .into_iter()
        .map(|d| Domain {
            name: d.name,
            weight: d.weight,
            search_angles: d.search_angles,
        })
        .collect())
}

fn parse_lenient_domains(text: &str) -> Vec<DomainRaw> {
    if let Some(value) = research_utils::parse_lenient_value(text) {
        if let Some(arr) = value.as_array() {
            return arr
                .iter()
                .filter_map(|v| serde_json::from_value(v.clone()).ok())
                .collect();
        }
        if let Ok(wrapped) = serde_json::from_value::<DomainsResponse>(value) {
            return wrapped.domains;
        }
    }
    Vec::new()
}

fn serp_query_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "query": {"type": "string"},
                "researchGoal": {"type": "string"},
                "priority": {"type": "integer", "description": "1 = highest priority"}
            },
            "required": ["query", "researchGoal", "priority"]
        }
    })
}

#[derive(Debug, Deserialize)]
struct SerpQueryRaw {
    query: String,
    #[serde(rename = "researchGoal")]
    research_goal: String,
    #[serde(default = "default_priority")]
    priority: u32,
}

fn default_priority() -> u32 {
    999
}

/// Parses the model's query list and sorts by its self-reported
/// `priority` (ascending, 1 = highest) so budget truncation below keeps
/// the top-priority queries rather than the first ones the model wrote.
fn tasks_from_response(text: &str) -> Vec<SearchTask> {
    let mut raw: Vec<SerpQueryRaw> = parse_lenient(text, Vec::new);
    raw.sort_by_key(|r| r.priority);
    raw.into_iter()
        .map(|r| SearchTask {
            query: r.query,
            research_goal: r.research_goal,
            priority: r.priority,
        })
        .collect()
}

/// Generates up to `query_budget` initial search queries for `plan`,
/// proportionally distributed across `domains` when non-empty.
pub async fn generate_serp_queries(
    client: &MultiProviderLlmClient,
    plan: &str,
    domains: &[Domain],
    query_budget: u32,
) -> Result<Vec<SearchTask>, ResearchError> {
    let schema = serp_query_schema();
    let prompt = if domains.is_empty() {
        research_prompts::serp_queries_prompt(plan, &schema, query_budget)
    } else {
        research_prompts::serp_queries_with_domains_prompt(plan, domains, &schema, query_budget)
    };
    let (text, _) = client.generate(&prompt, &GenerateOptions::default()).await?;
    let tasks = tasks_from_response(&text);
    Ok(tasks.into_iter().take(query_budget as usize).collect())
}

/// Generates follow-up queries targeting gaps not covered by
/// `executed_queries`, bounded by `remaining_budget`.
pub async fn generate_followup_queries(
    client: &MultiProviderLlmClient,
    plan: &str,
    learnings: &str,
    executed_queries: &[String],
    remaining_budget: u32,
) -> Result<Vec<SearchTask>, ResearchError> {
    if remaining_budget == 0 {
        return Ok(Vec::new());
    }
    let schema = serp_query_schema();
    let prompt = research_prompts::followup_queries_prompt(
        plan,
        learnings,
        executed_queries,
        &schema,
        remaining_budget,
    );
    let (text, _) = client.generate(&prompt, &GenerateOptions::default()).await?;
    let tasks = tasks_from_response(&text);
    Ok(tasks.into_iter().take(remaining_budget as usize).collect())
}

#[derive(Deserialize)]
struct CompletenessRaw {
    #[serde(rename = "overallCoverage")]
    overall_coverage: f64,
    #[serde(default)]
    sections: Vec<SectionRaw>,
    #[serde(rename = "priorityGaps", default)]
    priority_gaps: Vec<String>,
}

#[derive(Deserialize)]
struct SectionRaw {
    name: String,
    coverage: f64,
    depth: String,
    #[serde(default)]
    gaps: Vec<String>,
}

/// Scans the first 10 characters of a non-JSON response for the `YES`
/// the prompt asks the model to lead with, per the "Start your response
/// with YES or NO" instruction in `completeness_review_prompt`.
fn completeness_from_yes_scan(text: &str) -> CompletenessRaw {
    let lead: String = text.chars().take(10).collect();
    let is_sufficient = lead.to_uppercase().contains("YES");
    CompletenessRaw {
        overall_coverage: if is_sufficient { 70.0 } else { 0.0 },
        sections: Vec::new(),
        priority_gaps: Vec::new(),
    }
}

/// Assesses whether accumulated findings sufficiently cover the plan.
/// `isSufficient` is never taken verbatim from the model: it is always
/// recomputed deterministically from `overallCoverage`/`sections` (>= 70
/// overall and every section >= 40), per spec. On JSON-parse failure,
/// falls back to scanning the response's first 10 characters for `YES`.
pub async fn review_research_completeness(
    client: &MultiProviderLlmClient,
    plan: &str,
    results_summary: &str,
    iteration: u32,
) -> Result<GapReport, ResearchError> {
    let prompt = research_prompts::completeness_review_prompt(plan, results_summary, iteration);
    let (text, _) = client.generate(&prompt, &GenerateOptions::default()).await?;

    let raw: CompletenessRaw = parse_lenient(&text, || completeness_from_yes_scan(&text));

    let is_sufficient =
        raw.overall_coverage >= 70.0 && raw.sections.iter().all(|s| s.coverage >= 40.0);

    Ok(GapReport {
        is_sufficient,
        overall_coverage: raw.overall_coverage,
        sections: raw
            .sections
            .into_iter()
            .map(|s| research_core::SectionGap {
                name: s.name,
                coverage: s.coverage,
                depth: s.depth,
                gaps: s.gaps,
            })
            .collect(),
        priority_gaps: raw.priority_gaps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tasks_from_response_sorts_by_reported_priority() {
        let text = r#"[{"query": "a", "researchGoal": "ga", "priority": 2},
                       {"query": "b", "researchGoal": "gb", "priority": 1}]"#;
        let tasks = tasks_from_response(text);
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].query, "b");
        assert_eq!(tasks[0].priority, 1);
        assert_eq!(tasks[1].query, "a");
        assert_eq!(tasks[1].priority, 2);
    }

    #[test]
    fn tasks_from_response_missing_priority_sorts_last() {
        let text = r#"[{"query": "a", "researchGoal": "ga", "priority": 1},
                       {"query": "b", "researchGoal": "gb"}]"#;
        let tasks = tasks_from_response(text);
        assert_eq!(tasks[0].query, "a");
        assert_eq!(tasks[1].query, "b");
    }

    #[test]
    fn tasks_from_response_empty_on_garbage() {
        let tasks = tasks_from_response("not json");
        assert!(tasks.is_empty());
    }

    #[test]
    fn budget_truncation_keeps_top_priority_queries() {
        let text = r#"[{"query": "low", "researchGoal": "g", "priority": 5},
                       {"query": "high", "researchGoal": "g", "priority": 1},
                       {"query": "mid", "researchGoal": "g", "priority": 3}]"#;
        let mut tasks = tasks_from_response(text);
        tasks.truncate(2);
        assert_eq!(tasks[0].query, "high");
        assert_eq!(tasks[1].query, "mid");
    }

    #[test]
    fn yes_scan_recognizes_leading_yes() {
        let raw = completeness_from_yes_scan("YES, coverage looks solid across every section.");
        assert_eq!(raw.overall_coverage, 70.0);
        assert!(raw.sections.is_empty());
    }

    #[test]
    fn yes_scan_defaults_to_insufficient_on_no() {
        let raw = completeness_from_yes_scan("NO, several sections remain thin.");
        assert_eq!(raw.overall_coverage, 0.0);
    }

    #[test]
    fn parse_lenient_domains_accepts_bare_array() {
        let text = r#"[{"name": "Economics", "weight": 0.6, "searchAngles": ["a", "b"]}]"#;
        let domains = parse_lenient_domains(text);
        assert_eq!(domains.len(), 1);
        assert_eq!(domains[0].name, "Economics");
    }

    struct StubLlm(&'static str);

    #[async_trait::async_trait]
    impl research_core::LlmProvider for StubLlm {
        fn name(&self) -> &str {
            "stub"
        }

        fn is_available(&self) -> bool {
            true
        }

        async fn generate(
            &self,
            _prompt: &str,
            _options: &GenerateOptions,
        ) -> Result<(String, research_core::TokenInfo), ResearchError> {
            Ok((self.0.to_string(), research_core::TokenInfo::default()))
        }

        async fn stream(
            &self,
            _prompt: &str,
            _options: &GenerateOptions,
        ) -> Result<futures::stream::BoxStream<'static, Result<String, ResearchError>>, ResearchError>
        {
            Ok(Box::pin(futures::stream::empty()))
        }
    }

    #[tokio::test]
    async fn review_completeness_ignores_model_self_report_and_recomputes() {
        // The model claims isSufficient=true while reporting a section
        // below the 40 threshold; the deterministic recomputation must
        // override the model's claim and report insufficient.
        let response = r#"{"isSufficient": true, "overallCoverage": 80,
            "sections": [{"name": "Intro", "coverage": 90, "depth": "deep", "gaps": []},
                         {"name": "Risks", "coverage": 10, "depth": "shallow", "gaps": ["x"]}],
            "priorityGaps": []}"#;
        let client = MultiProviderLlmClient::new(vec![std::sync::Arc::new(StubLlm(response))]);
        let report = review_research_completeness(&client, "plan", "findings", 1)
            .await
            .unwrap();
        assert!(!report.is_sufficient);
    }

    #[tokio::test]
    async fn review_completeness_falls_back_to_yes_scan_on_parse_failure() {
        let client =
            MultiProviderLlmClient::new(vec![std::sync::Arc::new(StubLlm("YES, all good here."))]);
        let report = review_research_completeness(&client, "plan", "findings", 1)
            .await
            .unwrap();
        assert!(report.is_sufficient);
    }
}
