//! ABOUTME: Composition root for the research binary
//! ABOUTME: Wires providers, search, sandbox, and the orchestrator, then runs one request

mod cli;
mod providers;
mod sandbox;

use anyhow::{bail, Result};
use clap::Parser;
use cli::{Cli, OutputFormat};
use research_config::ResearchConfig;
use research_core::{LlmProvider, Mode, Request, SandboxService, SearchProvider};
use research_orchestrator::{process_with_callback, OrchestratorDeps};
use research_providers::{HttpChatProvider, MultiProviderLlmClient};
use std::sync::Arc;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_tracing(cli.trace);

    let mut config = ResearchConfig::from_env();
    if let Some(dir) = &cli.log_dir {
        config.log_dir = dir.clone();
    }

    let llm_providers = build_llm_providers(&config);
    if llm_providers.is_empty() {
        bail!("no LLM provider configured: set OPENAI_API_KEY, ANTHROPIC_API_KEY, or GEMINI_API_KEY");
    }
    let llm = Arc::new(MultiProviderLlmClient::new(llm_providers));

    let search_service: Option<Arc<dyn SearchProvider>> = if cli.no_search {
        None
    } else {
        config
            .providers
            .tavily_api_key
            .clone()
            .map(|key| Arc::new(providers::TavilySearchProvider::new(key)) as Arc<dyn SearchProvider>)
    };

    let sandbox: Option<Arc<dyn SandboxService>> = if cli.no_sandbox {
        None
    } else {
        Some(Arc::new(sandbox::PythonSandbox::new()))
    };

    let deps = OrchestratorDeps {
        llm,
        search_service,
        sandbox,
        config,
    };

    let request = Request {
        query: cli.query.clone(),
        mode: Mode::DeepResearch,
        trace_id: Uuid::new_v4(),
        context_id: None,
        temperature: None,
        max_tokens: None,
        streaming: cli.stream,
        metadata: serde_json::Map::new(),
    };

    let callback: Option<Arc<dyn Fn(&research_core::ResearchEvent) + Send + Sync>> = if cli.stream {
        Some(Arc::new(|event: &research_core::ResearchEvent| {
            eprintln!("{}", event.to_sse().trim_end());
        }))
    } else {
        None
    };

    let response = process_with_callback(&deps, request, callback).await?;

    match cli.output {
        OutputFormat::Text => println!("{}", response.result),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&response)?),
    }

    Ok(())
}

/// Builds the provider fallback chain in OpenAI -> Anthropic -> Gemini
/// priority order, including only providers with a configured API key.
fn build_llm_providers(config: &ResearchConfig) -> Vec<Arc<dyn LlmProvider>> {
    let keys = &config.providers;
    let mut providers: Vec<Arc<dyn LlmProvider>> = Vec::new();

    if let Some(key) = &keys.openai_api_key {
        providers.push(Arc::new(HttpChatProvider::openai(key.clone(), keys.llm_model.clone())));
    }
    if let Some(key) = &keys.anthropic_api_key {
        providers.push(Arc::new(HttpChatProvider::anthropic(key.clone(), keys.anthropic_model.clone())));
    }
    if let Some(key) = &keys.gemini_api_key {
        providers.push(Arc::new(HttpChatProvider::gemini(key.clone(), keys.gemini_model.clone())));
    }

    providers
}

/// Priority: `RUST_LOG` env var > `--trace` flag > warn default. Tracing
/// output always goes to stderr so stdout stays clean for the report body.
fn setup_tracing(trace_level: cli::TraceLevel) {
    use std::io;
    use tracing_subscriber::EnvFilter;

    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(io::stderr)
            .with_target(false)
            .init();
    } else {
        let level: tracing::Level = trace_level.into();
        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(io::stderr)
            .with_target(false)
            .init();
    }
}
