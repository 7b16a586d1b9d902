//! ABOUTME: Parallel search-task execution with per-provider fallback and enrichment
//! ABOUTME: Grounded in the original SearchExecutor's batch/race strategies

use chrono::Utc;
use research_config::{ParallelStrategy, SearchEngineConfig};
use research_core::{
    GenerateOptions, ProcessingContext, RawSearchHit, ResearchError, SearchProvider, SearchResult,
    SearchResultInner, SearchTask, SourceRef,
};
use research_providers::MultiProviderLlmClient;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, warn};

pub struct SearchExecutor {
    llm: Arc<MultiProviderLlmClient>,
    search_service: Option<Arc<dyn SearchProvider>>,
    config: SearchEngineConfig,
    log_dir: String,
}

impl SearchExecutor {
    pub fn new(
        llm: Arc<MultiProviderLlmClient>,
        search_service: Option<Arc<dyn SearchProvider>>,
        config: SearchEngineConfig,
        log_dir: impl Into<String>,
    ) -> Self {
        Self {
            llm,
            search_service,
            config,
            log_dir: log_dir.into(),
        }
    }

    /// Executes every task, batched by `config.parallel_searches` unless
    /// `config.parallel_strategy` selects race mode, in which case every
    /// provider in the fallback chain starts concurrently per task and
    /// the first provider to return sources wins.
    pub async fn execute_search_tasks(&self, tasks: &[SearchTask]) -> Vec<SearchResult> {
        info!(total_tasks = tasks.len(), "executing search tasks");

        let mut results = Vec::with_capacity(tasks.len());
        let batch_size = self.config.parallel_searches.max(1);

        for batch in tasks.chunks(batch_size) {
            let mut set = JoinSet::new();
            for task in batch.iter().cloned() {
                let this = self.clone_handles();
                set.spawn(async move { this.execute_single(&task).await });
            }
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok(result) => results.push(result),
                    Err(err) => warn!(%err, "search task panicked"),
                }
            }
        }

        let total_sources: usize = results.iter().map(|r| r.result.sources.len()).sum();
        info!(total_sources, total_tasks = tasks.len(), "search summary");
        results
    }

    fn clone_handles(&self) -> SearchExecutorHandles {
        SearchExecutorHandles {
            llm: self.llm.clone(),
            search_service: self.search_service.clone(),
            config: self.config.clone(),
        }
    }

    async fn execute_single(&self, task: &SearchTask) -> SearchResult {
        self.clone_handles().execute_single(task).await
    }

    /// Fetches full page content for the top `urls_per_query` sources by
    /// relevance, when the search service supports multi-fetch.
    pub async fn enrich_with_full_content(&self, mut result: SearchResult) -> SearchResult {
        let Some(service) = &self.search_service else {
            return result;
        };
        if result.result.sources.is_empty() {
            return result;
        }

        let mut ranked = result.result.sources.clone();
        ranked.sort_by(|a, b| b.relevance.partial_cmp(&a.relevance).unwrap_or(std::cmp::Ordering::Equal));
        let urls: Vec<String> = ranked
            .into_iter()
            .take(self.config.urls_per_query)
            .map(|s| s.url)
            .collect();
        if urls.is_empty() {
            return result;
        }

        match service.fetch_multiple(&urls).await {
            Ok(content_map) => {
                let full_texts: Vec<String> = urls
                    .iter()
                    .filter_map(|u| content_map.get(u).cloned())
                    .collect();
                if !full_texts.is_empty() {
                    result.result.full_content = Some(full_texts.join("\n\n---\n\n"));
                }
            }
            Err(err) => warn!(%err, "full-content extraction failed"),
        }
        result
    }

    /// Persists search results for the session under
    /// `{log_dir}/research_data/{trace_id8}_{timestamp}/search_results.json`.
    pub fn save_research_data(
        &self,
        ctx: &ProcessingContext,
        results: &[SearchResult],
    ) -> Option<std::path::PathBuf> {
        let timestamp = ctx.start_time.format("%Y%m%d_%H%M%S");
        let session_dir = std::path::Path::new(&self.log_dir)
            .join("research_data")
            .join(format!("{}_{}", ctx.request.trace_id8(), timestamp));

        if let Err(err) = std::fs::create_dir_all(&session_dir) {
            warn!(%err, "failed to create research data directory");
            return None;
        }

        let filepath = session_dir.join("search_results.json");
        match serde_json::to_string_pretty(results) {
            Ok(json) => {
                if let Err(err) = std::fs::write(&filepath, json) {
                    warn!(%err, "failed to save research data");
                    return None;
                }
                info!(path = %filepath.display(), count = results.len(), "research data saved");
                Some(filepath)
            }
            Err(err) => {
                warn!(%err, "failed to serialise research data");
                None
            }
        }
    }
}

/// Clonable handle bundle used by spawned tasks; avoids borrowing
/// `SearchExecutor` across an `'static` task boundary.
struct SearchExecutorHandles {
    llm: Arc<MultiProviderLlmClient>,
    search_service: Option<Arc<dyn SearchProvider>>,
    config: SearchEngineConfig,
}

impl SearchExecutorHandles {
    async fn execute_single(&self, task: &SearchTask) -> SearchResult {
        // Batch and hybrid both run the task batch concurrently (handled
        // uniformly in `execute_search_tasks`'s chunking); the only
        // per-query difference is whether a single query's own provider
        // attempts are raced or tried in sequential fallback order.
        let inner = match self.config.parallel_strategy {
            ParallelStrategy::Race | ParallelStrategy::Hybrid => {
                self.race_search(&task.query, &task.research_goal).await
            }
            ParallelStrategy::Batch => self.fallback_search(&task.query, &task.research_goal).await,
        };

        SearchResult {
            query: task.query.clone(),
            goal: task.research_goal.clone(),
            priority: task.priority,
            result: inner,
        }
    }

    async fn race_search(&self, query: &str, goal: &str) -> SearchResultInner {
        let Some(service) = &self.search_service else {
            return self.model_based_search(query, goal).await;
        };

        let search_type = infer_search_type(goal);
        let timeout = std::time::Duration::from_secs(self.config.timeout_secs);
        let attempt = async {
            match service.search(query, self.config.max_results, search_type).await {
                Ok(hits) if !hits.is_empty() => Some(format_hits(hits, "primary")),
                _ => None,
            }
        };

        match tokio::time::timeout(timeout, attempt).await {
            Ok(Some(result)) => result,
            _ => self.empty_result(query),
        }
    }

    async fn fallback_search(&self, query: &str, goal: &str) -> SearchResultInner {
        let Some(service) = &self.search_service else {
            return self.model_based_search(query, goal).await;
        };

        let primary = self.try_provider(service.as_ref(), query, goal, "primary").await;
        if let Some(result) = primary {
            if !result.sources.is_empty() {
                return result;
            }
        }

        warn!(query, "primary search returned no sources, trying fallback chain");
        for fallback in &self.config.fallback_chain {
            let tag = format!("{fallback:?}");
            if let Some(result) = self.try_provider(service.as_ref(), query, goal, &tag).await {
                if !result.sources.is_empty() {
                    return result;
                }
            }
        }

        self.model_based_search(query, goal).await
    }

    async fn try_provider(
        &self,
        service: &dyn SearchProvider,
        query: &str,
        goal: &str,
        provider_tag: &str,
    ) -> Option<SearchResultInner> {
        let search_type = infer_search_type(goal);
        let timeout = std::time::Duration::from_secs(self.config.timeout_secs);
        match tokio::time::timeout(
            timeout,
            service.search(query, self.config.max_results, search_type),
        )
        .await
        {
            Ok(Ok(hits)) if !hits.is_empty() => Some(format_hits(hits, service.name())),
            Ok(Ok(_)) => None,
            Ok(Err(err)) => {
                warn!(%err, provider = service.name(), attempt = provider_tag, "search provider failed");
                None
            }
            Err(_) => {
                warn!(provider = service.name(), attempt = provider_tag, "search provider timed out");
                None
            }
        }
    }

    async fn model_based_search(&self, query: &str, goal: &str) -> SearchResultInner {
        let prompt = research_prompts::query_result_prompt(query, goal);
        match self.llm.generate(&prompt, &GenerateOptions::default()).await {
            Ok((text, _)) => SearchResultInner {
                summary: text,
                sources: vec![SourceRef {
                    url: "model://knowledge".to_string(),
                    title: "AI Knowledge Base".to_string(),
                    relevance: 0.8,
                }],
                processed: String::new(),
                full_content: None,
                provider: Some("model".to_string()),
                timestamp: Utc::now(),
            },
            Err(err) => {
                warn!(%err, "model-based search fallback failed");
                self.empty_result(query)
            }
        }
    }

    fn empty_result(&self, query: &str) -> SearchResultInner {
        SearchResultInner {
            summary: format!("[No search results available for: {query}]"),
            sources: Vec::new(),
            processed: String::new(),
            full_content: None,
            provider: Some("none".to_string()),
            timestamp: Utc::now(),
        }
    }
}

/// Infers an Exa-style `search_type` from the research goal's keywords,
/// grounded in `_exa_search`'s keyword groups: code/programming ->
/// "code", research/paper -> "research", news/latest -> "news", else
/// "general".
fn infer_search_type(goal: &str) -> Option<&'static str> {
    let lower = goal.to_lowercase();
    if lower.contains("code") || lower.contains("programming") {
        Some("code")
    } else if lower.contains("research") || lower.contains("paper") {
        Some("research")
    } else if lower.contains("news") || lower.contains("latest") {
        Some("news")
    } else {
        Some("general")
    }
}

fn format_hits(hits: Vec<RawSearchHit>, provider: &str) -> SearchResultInner {
    let sources: Vec<SourceRef> = hits
        .iter()
        .map(|h| SourceRef {
            url: h.url.clone(),
            title: h.title.clone(),
            relevance: h.score.unwrap_or(0.5),
        })
        .collect();
    let summary = hits
        .iter()
        .map(|h| format!("- {}: {}", h.title, h.snippet.chars().take(100).collect::<String>()))
        .collect::<Vec<_>>()
        .join("\n");
    SearchResultInner {
        summary,
        sources,
        processed: String::new(),
        full_content: None,
        provider: Some(provider.to_string()),
        timestamp: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use research_core::{LlmProvider, TokenInfo};
    use std::collections::HashMap;

    struct EmptyProvider;

    #[async_trait]
    impl SearchProvider for EmptyProvider {
        fn name(&self) -> &str {
            "empty"
        }

        async fn search(
            &self,
            _query: &str,
            _max_results: u32,
            _search_type: Option<&str>,
        ) -> Result<Vec<RawSearchHit>, ResearchError> {
            Ok(Vec::new())
        }

        async fn fetch_multiple(
            &self,
            _urls: &[String],
        ) -> Result<HashMap<String, String>, ResearchError> {
            Ok(HashMap::new())
        }
    }

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
            _prompt: &str,
            _options: &research_core::GenerateOptions,
        ) -> Result<(String, TokenInfo), ResearchError> {
            Ok(("stub knowledge".to_string(), TokenInfo::default()))
        }

        async fn stream(
            &self,
            _prompt: &str,
            _options: &research_core::GenerateOptions,
        ) -> Result<futures::stream::BoxStream<'static, Result<String, ResearchError>>, ResearchError>
        {
            Ok(Box::pin(futures::stream::empty()))
        }
    }

    #[test]
    fn infer_search_type_matches_goal_keywords() {
        assert_eq!(infer_search_type("find the code for this library"), Some("code"));
        assert_eq!(infer_search_type("locate the research paper"), Some("research"));
        assert_eq!(infer_search_type("what's the latest news"), Some("news"));
        assert_eq!(infer_search_type("general overview"), Some("general"));
    }

    struct RecordingProvider {
        seen_search_types: std::sync::Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl SearchProvider for RecordingProvider {
        fn name(&self) -> &str {
            "recording"
        }

        async fn search(
            &self,
            _query: &str,
            _max_results: u32,
            search_type: Option<&str>,
        ) -> Result<Vec<RawSearchHit>, ResearchError> {
            self.seen_search_types
                .lock()
                .unwrap()
                .push(search_type.map(str::to_string));
            Ok(Vec::new())
        }

        async fn fetch_multiple(
            &self,
            _urls: &[String],
        ) -> Result<HashMap<String, String>, ResearchError> {
            Ok(HashMap::new())
        }
    }

    #[tokio::test]
    async fn batch_search_infers_search_type_from_goal() {
        let llm = Arc::new(MultiProviderLlmClient::new(vec![Arc::new(StubLlm)]));
        let provider = Arc::new(RecordingProvider {
            seen_search_types: std::sync::Mutex::new(Vec::new()),
        });
        let executor = SearchExecutor::new(
            llm,
            Some(provider.clone()),
            SearchEngineConfig {
                parallel_strategy: ParallelStrategy::Batch,
                ..SearchEngineConfig::default()
            },
            "/tmp",
        );

        let task = SearchTask {
            query: "test query".to_string(),
            research_goal: "find the code for this".to_string(),
            priority: 1,
        };
        let _ = executor.execute_search_tasks(&[task]).await;

        let seen = provider.seen_search_types.lock().unwrap();
        assert!(seen.iter().all(|t| t.as_deref() == Some("code")));
        assert!(!seen.is_empty());
    }

    #[tokio::test]
    async fn falls_back_to_model_search_when_no_sources() {
        let llm = Arc::new(MultiProviderLlmClient::new(vec![Arc::new(StubLlm)]));
        let executor = SearchExecutor::new(
            llm,
            Some(Arc::new(EmptyProvider)),
            SearchEngineConfig::default(),
            "/tmp",
        );

        let task = SearchTask {
            query: "test query".to_string(),
            research_goal: "goal".to_string(),
            priority: 1,
        };
        let results = executor.execute_search_tasks(&[task]).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].result.provider.as_deref(), Some("model"));
    }

    #[tokio::test]
    async fn save_research_data_writes_file() {
        let tmp = tempfile::tempdir().unwrap();
        let llm = Arc::new(MultiProviderLlmClient::new(vec![Arc::new(StubLlm)]));
        let executor = SearchExecutor::new(
            llm,
            None,
            SearchEngineConfig::default(),
            tmp.path().to_string_lossy().to_string(),
        );

        let request = research_core::Request {
            query: "q".to_string(),
            mode: research_core::Mode::DeepResearch,
            trace_id: uuid::Uuid::new_v4(),
            context_id: None,
            temperature: None,
            max_tokens: None,
            streaming: false,
            metadata: serde_json::Map::new(),
        };
        let ctx = ProcessingContext::new(request);
        let path = executor.save_research_data(&ctx, &[]);
        assert!(path.is_some());
        assert!(path.unwrap().exists());
    }
}
