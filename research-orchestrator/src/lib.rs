//! ABOUTME: The deep-research pipeline — wires planning, search, analysis, compute, and reporting
//! ABOUTME: Ported from the original DeepResearchProcessor's process/_execute_with_retry pair

use chrono::Utc;
use research_config::ResearchConfig;
use research_core::{
    ProcessingContext, Request, ResearchError, Response, SandboxService, SearchProvider,
    SearchResult, WorkflowError, WorkflowState, WorkflowStatus,
};
use research_providers::MultiProviderLlmClient;
use research_search::SearchExecutor;
use research_streaming::{EventCallback, StreamingManager};
use research_utils::{retry_with_backoff, RetryConfig};
use std::sync::Arc;
use tracing::info;

/// Iteration cap for the research loop — matches the original's
/// `MAX_ITERATIONS`.
const MAX_ITERATIONS: u32 = 3;

/// Collaborators the orchestrator needs beyond pure configuration. Built
/// once at the composition root and shared (via `Arc`) across requests.
pub struct OrchestratorDeps {
    pub llm: Arc<MultiProviderLlmClient>,
    pub search_service: Option<Arc<dyn SearchProvider>>,
    pub sandbox: Option<Arc<dyn SandboxService>>,
    pub config: ResearchConfig,
}

fn enter_step(ctx: &mut ProcessingContext, workflow_state: &mut WorkflowState, step: &str) {
    ctx.enter_step(step);
    workflow_state.current_step = Some(step.to_string());
}

fn sync_workflow_state(ctx: &mut ProcessingContext, workflow_state: &WorkflowState) {
    ctx.response.metadata.insert(
        "workflowState".to_string(),
        serde_json::to_value(workflow_state).unwrap_or(serde_json::Value::Null),
    );
}

/// Runs the full research request to completion: init, retry-wrapped
/// workflow, and a final workflow-state sync. Returns the populated
/// `Response` (report body in `result`) on success.
///
/// Non-streaming requests run the workflow directly; `request.streaming`
/// requests run the same workflow body through `StreamingManager::
/// process_with_streaming` instead, with its emitted SSE frames recorded
/// at `response.metadata["sseFrames"]` — both paths share one workflow
/// implementation, differing only in this outer dispatch.
pub async fn process(deps: &OrchestratorDeps, request: Request) -> Result<Response, ResearchError> {
    process_with_callback(deps, request, None).await
}

/// Like [`process`], but (for streaming requests) forwards every emitted
/// event to `callback` as it is produced, rather than only after the
/// workflow completes.
pub async fn process_with_callback(
    deps: &OrchestratorDeps,
    request: Request,
    callback: Option<EventCallback>,
) -> Result<Response, ResearchError> {
    let streaming = request.streaming;
    let mut ctx = ProcessingContext::new(request);
    let mut workflow_state = WorkflowState::new(vec![
        "plan".to_string(),
        "search".to_string(),
        "synthesize".to_string(),
    ]);
    sync_workflow_state(&mut ctx, &workflow_state);

    info!(query = %ctx.request.query, "deep research workflow starting");

    let (outcome, sse_frames) = if streaming {
        let manager = StreamingManager::new(callback);
        let workflow_state = &mut workflow_state;
        manager
            .process_with_streaming(&mut ctx, |ctx, _emitter| {
                run_with_retries(ctx, workflow_state, deps)
            })
            .await
    } else {
        (run_with_retries(&mut ctx, &mut workflow_state, deps).await, Vec::new())
    };

    if !sse_frames.is_empty() {
        ctx.response.metadata.insert(
            "sseFrames".to_string(),
            serde_json::Value::Array(sse_frames.into_iter().map(serde_json::Value::String).collect()),
        );
    }

    match outcome {
        Ok(report) => {
            workflow_state.status = WorkflowStatus::Completed;
            sync_workflow_state(&mut ctx, &workflow_state);
            ctx.response.result = report;
            ctx.response.time_ms = (Utc::now() - ctx.start_time).num_milliseconds().max(0) as u64;
            info!("deep research workflow completed");
            Ok(ctx.response)
        }
        Err(err) => {
            workflow_state.status = WorkflowStatus::Failed;
            sync_workflow_state(&mut ctx, &workflow_state);
            tracing::error!(%err, "deep research workflow failed");
            Err(err)
        }
    }
}

/// Runs `run_workflow` wrapped in workflow-level retry, recording each
/// failed attempt on `workflow_state.errors` before the retry policy
/// decides whether to try again.
async fn run_with_retries(
    ctx: &mut ProcessingContext,
    workflow_state: &mut WorkflowState,
    deps: &OrchestratorDeps,
) -> Result<String, ResearchError> {
    retry_with_backoff(
        || {
            let ctx = &mut *ctx;
            let workflow_state = &mut *workflow_state;
            async move {
                match run_workflow(ctx, workflow_state, deps).await {
                    Ok(report) => Ok(report),
                    Err(err) => {
                        workflow_state.errors.push(WorkflowError {
                            error: err.to_string(),
                            category: format!("{:?}", err.category()),
                            step: workflow_state.current_step.clone().unwrap_or_default(),
                            retry_count: workflow_state.errors.len() as u32,
                            timestamp: Utc::now(),
                        });
                        Err(err)
                    }
                }
            }
        },
        RetryConfig::workflow_level(),
    )
    .await
}

/// The core pipeline body, executed fresh on every retry attempt.
async fn run_workflow(
    ctx: &mut ProcessingContext,
    workflow_state: &mut WorkflowState,
    deps: &OrchestratorDeps,
) -> Result<String, ResearchError> {
    enter_step(ctx, workflow_state, "plan");
    let report_plan = research_planner::write_report_plan(&deps.llm, &ctx.request.query).await?;

    enter_step(ctx, workflow_state, "domainIdentification");
    let domains =
        research_planner::identify_research_domains(&deps.llm, &ctx.request.query, &report_plan).await?;

    let executor = SearchExecutor::new(
        deps.llm.clone(),
        deps.search_service.clone(),
        deps.config.search.clone(),
        deps.config.log_dir.clone(),
    );

    let mut all_search_results: Vec<SearchResult> = Vec::new();
    let mut executed_queries: Vec<String> = Vec::new();
    let mut accumulated_synthesis: Option<String> = None;
    let mut iteration = 0u32;

    while iteration < MAX_ITERATIONS {
        iteration += 1;
        workflow_state.iterations = iteration;
        enter_step(ctx, workflow_state, "search");
        info!(iteration, MAX_ITERATIONS, "research iteration");

        let tasks = if iteration == 1 {
            research_planner::generate_serp_queries(
                &deps.llm,
                &report_plan,
                &domains,
                deps.config.search.queries_first_iteration as u32,
            )
            .await?
        } else {
            let remaining = deps
                .config
                .search
                .max_total_queries
                .saturating_sub(executed_queries.len())
                .min(deps.config.search.queries_followup_iteration);
            research_planner::generate_followup_queries(
                &deps.llm,
                &report_plan,
                accumulated_synthesis.as_deref().unwrap_or(""),
                &executed_queries,
                remaining as u32,
            )
            .await?
        };

        if tasks.is_empty() {
            break;
        }

        let wave_results = executor.execute_search_tasks(&tasks).await;
        let mut enriched = Vec::with_capacity(wave_results.len());
        for result in wave_results {
            enriched.push(executor.enrich_with_full_content(result).await);
        }

        executed_queries.extend(tasks.iter().map(|t| t.query.clone()));
        all_search_results.extend(enriched.iter().cloned());

        enter_step(ctx, workflow_state, "synthesis");
        let synthesis_record = research_analysis::intermediate_synthesis(
            ctx,
            &deps.llm,
            &report_plan,
            &enriched,
            accumulated_synthesis.as_deref(),
        )
        .await?;
        accumulated_synthesis = Some(synthesis_record.synthesis);

        let gap_report = research_planner::review_research_completeness(
            &deps.llm,
            &report_plan,
            accumulated_synthesis.as_deref().unwrap_or(""),
            iteration,
        )
        .await?;

        if gap_report.is_sufficient {
            info!("research is sufficient, proceeding to report");
            break;
        }
        if executed_queries.len() >= deps.config.search.max_total_queries {
            info!(
                executed = executed_queries.len(),
                budget = deps.config.search.max_total_queries,
                "search budget exhausted"
            );
            break;
        }
    }

    // Reversible compression: full results are written to disk; the
    // condensed synthesis (or a bounded fallback) carries downstream.
    let _research_data_path = executor.save_research_data(ctx, &all_search_results);
    let synthesis_summary = accumulated_synthesis
        .clone()
        .unwrap_or_else(|| research_analysis::summarize_search_results(&all_search_results, 8_000, 200_000));

    enter_step(ctx, workflow_state, "criticalAnalysis");
    let critical_analysis = research_analysis::critical_analysis_stage(
        ctx,
        &deps.llm,
        &all_search_results,
        &report_plan,
        Some(&synthesis_summary),
    )
    .await?;

    let sections = research_analysis::parse_sections(&report_plan);
    let references = research_report::extract_references(&all_search_results);
    let hierarchical_context = research_analysis::build_hierarchical_context(
        &deps.llm,
        &sections,
        &all_search_results,
        &references,
        None,
    )
    .await?;

    let chart_specs =
        research_compute::plan_report_charts(&deps.llm, &report_plan, &synthesis_summary).await;

    let computational_result = if !chart_specs.is_empty() {
        if let Some(sandbox) = &deps.sandbox {
            enter_step(ctx, workflow_state, "computationalAnalysis");
            research_compute::execute_chart_plan(
                ctx,
                &deps.llm,
                sandbox.as_ref(),
                &chart_specs,
                deps.config.sandbox_max_chart_failures,
                deps.config.sandbox_compute_timeout_secs,
            )
            .await?
        } else {
            None
        }
    } else {
        None
    };

    enter_step(ctx, workflow_state, "synthesize");
    let final_report = research_report::write_final_report(
        ctx,
        &deps.llm,
        &all_search_results,
        &report_plan,
        &hierarchical_context.structured_context,
        Some(&critical_analysis),
        computational_result.as_ref(),
    )
    .await?;

    let cited_count = ctx
        .response
        .metadata
        .get("citationStats")
        .and_then(|v| v.get("citedReferences"))
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(0) as usize;
    let model_name = deps.llm.last_provider().unwrap_or_else(|| "unknown".to_string());
    let bundle_meta = research_report::BundleMetadata {
        query: &ctx.request.query,
        model_name: &model_name,
        total_duration_ms: (chrono::Utc::now() - ctx.start_time).num_milliseconds().max(0) as u64,
        total_tokens: ctx.total_tokens,
        cited_count,
        stages: &ctx.steps_completed,
    };
    match research_report::save_report_bundle(
        &deps.config.log_dir,
        &ctx.request.trace_id8(),
        &final_report,
        computational_result.as_ref(),
        &bundle_meta,
    ) {
        Ok(bundle_dir) => {
            ctx.response.metadata.insert(
                "reportBundlePath".to_string(),
                serde_json::Value::String(bundle_dir.to_string_lossy().to_string()),
            );
        }
        Err(err) => {
            tracing::warn!(%err, "failed to persist report bundle");
        }
    }

    info!("research workflow completed successfully");
    Ok(final_report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use research_core::{GenerateOptions, LlmProvider, Mode, TokenInfo};

    struct StubLlm;

    #[async_trait]
    impl LlmProvider for StubLlm {
        fn name(&self) -> &str {
            "stub"
        }

        fn is_available(&self) -> bool {
            true
        }

        async fn generate(
            &self,
            prompt: &str,
            _options: &GenerateOptions,
        ) -> Result<(String, TokenInfo), ResearchError> {
            let response = if prompt.contains("Respond as a JSON array") {
                "[]".to_string()
            } else if prompt.contains("Respond as JSON: {\"synthesis\"") {
                r#"{"synthesis": "stub synthesis", "sectionCoverage": {}, "knowledgeGaps": [], "crossDomainLinks": []}"#.to_string()
            } else if prompt.contains("isSufficient") {
                r#"{"isSufficient": true, "overallCoverage": 90, "sections": [], "priorityGaps": []}"#.to_string()
            } else if prompt.contains("researchGoal") {
                "[]".to_string()
            } else {
                "stub report plan text".to_string()
            };
            Ok((response, TokenInfo::default()))
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
    async fn process_completes_with_no_search_tasks() {
        let deps = OrchestratorDeps {
            llm: Arc::new(MultiProviderLlmClient::new(vec![Arc::new(StubLlm)])),
            search_service: None,
            sandbox: None,
            config: ResearchConfig {
                log_dir: std::env::temp_dir().to_string_lossy().to_string(),
                ..ResearchConfig::default()
            },
        };

        let request = Request {
            query: "what is the state of solid-state batteries?".to_string(),
            mode: Mode::DeepResearch,
            trace_id: uuid::Uuid::new_v4(),
            context_id: None,
            temperature: None,
            max_tokens: None,
            streaming: false,
            metadata: serde_json::Map::new(),
        };

        let response = process(&deps, request).await.unwrap();
        assert!(!response.result.is_empty());
    }

    #[tokio::test]
    async fn process_persists_a_report_bundle() {
        let log_dir = tempfile::tempdir().unwrap();
        let deps = OrchestratorDeps {
            llm: Arc::new(MultiProviderLlmClient::new(vec![Arc::new(StubLlm)])),
            search_service: None,
            sandbox: None,
            config: ResearchConfig {
                log_dir: log_dir.path().to_string_lossy().to_string(),
                ..ResearchConfig::default()
            },
        };

        let request = Request {
            query: "what is the state of solid-state batteries?".to_string(),
            mode: Mode::DeepResearch,
            trace_id: uuid::Uuid::new_v4(),
            context_id: None,
            temperature: None,
            max_tokens: None,
            streaming: false,
            metadata: serde_json::Map::new(),
        };

        let response = process(&deps, request).await.unwrap();
        let bundle_path = response
            .metadata
            .get("reportBundlePath")
            .and_then(|v| v.as_str())
            .expect("bundle path recorded");
        let bundle_dir = std::path::Path::new(bundle_path);
        assert!(bundle_dir.join("report.md").exists());
        assert!(bundle_dir.join("metadata.json").exists());
    }

    #[tokio::test]
    async fn streaming_request_records_sse_frames_and_still_completes() {
        let log_dir = tempfile::tempdir().unwrap();
        let deps = OrchestratorDeps {
            llm: Arc::new(MultiProviderLlmClient::new(vec![Arc::new(StubLlm)])),
            search_service: None,
            sandbox: None,
            config: ResearchConfig {
                log_dir: log_dir.path().to_string_lossy().to_string(),
                ..ResearchConfig::default()
            },
        };

        let request = Request {
            query: "what is the state of solid-state batteries?".to_string(),
            mode: Mode::DeepResearch,
            trace_id: uuid::Uuid::new_v4(),
            context_id: None,
            temperature: None,
            max_tokens: None,
            streaming: true,
            metadata: serde_json::Map::new(),
        };

        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let callback: research_streaming::EventCallback = Arc::new(move |event| {
            seen_clone.lock().unwrap().push(event.step.clone());
        });

        let response = process_with_callback(&deps, request, Some(callback)).await.unwrap();
        assert!(!response.result.is_empty());

        let frames = response
            .metadata
            .get("sseFrames")
            .and_then(|v| v.as_array())
            .expect("sse frames recorded");
        assert!(!frames.is_empty());
        assert!(frames.iter().any(|f| f.as_str().unwrap_or("").contains("final_report")));

        let steps = seen.lock().unwrap();
        assert_eq!(steps.first().map(String::as_str), Some("init"));
        assert_eq!(steps.last().map(String::as_str), Some("complete"));
    }
}
