//! ABOUTME: Collaborator traits for the pipeline's external dependencies
//! ABOUTME: LlmProvider, SearchProvider, SandboxService, KnowledgeService

use crate::error::ResearchError;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct TokenInfo {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    /// True when the provider lacked exact usage accounting and this was
    /// estimated by whitespace tokenisation.
    pub estimated: bool,
}

/// A single LLM backend. Implementors wrap a provider's HTTP client
/// (reqwest) behind this object-safe trait so the fallback chain in
/// `research-providers` can hold a `Vec<Arc<dyn LlmProvider>>`.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool;

    async fn generate(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<(String, TokenInfo), ResearchError>;

    async fn stream(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<BoxStream<'static, Result<String, ResearchError>>, ResearchError>;
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RawSearchHit {
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub score: Option<f64>,
}

/// External web-search collaborator. Production implementations wrap
/// Tavily/Exa/Serper/Brave/DuckDuckGo/SearXNG HTTP APIs; this trait only
/// names the shape the search executor depends on.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn search(
        &self,
        query: &str,
        max_results: u32,
        search_type: Option<&str>,
    ) -> Result<Vec<RawSearchHit>, ResearchError>;

    async fn fetch_multiple(
        &self,
        urls: &[String],
    ) -> Result<HashMap<String, String>, ResearchError>;
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SandboxOutcome {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub figures: Vec<String>,
    pub return_value: Option<serde_json::Value>,
    pub execution_time_ms: u64,
    pub error: Option<String>,
}

/// Sandboxed Python execution collaborator. Presence (`Option<Arc<dyn
/// SandboxService>>` at the composition root) gates whether chart
/// execution runs at all; chart *planning* always runs regardless.
#[async_trait]
pub trait SandboxService: Send + Sync {
    async fn execute_python(&self, code: &str, timeout_secs: u64) -> SandboxOutcome;
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct KnowledgeHit {
    pub content: String,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Local knowledge-base retrieval, used by system1 knowledge mode. Not
/// consumed by the deep-research core itself; named here only so the
/// router's mode table type-checks against a complete collaborator set.
#[async_trait]
pub trait KnowledgeService: Send + Sync {
    async fn retrieve(&self, query: &str, top_k: u32) -> Result<Vec<KnowledgeHit>, ResearchError>;
}
