//! ABOUTME: Core data-model types shared across the research pipeline
//! ABOUTME: Mirrors the Request/Response/ProcessingContext entity set

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Closed set of request modes. Each carries a fixed cognitive level —
/// there is no side lookup table, satisfying the mode->cognitive-level
/// consistency property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Mode {
    Auto,
    Chat,
    Knowledge,
    Search,
    Code,
    Thinking,
    DeepResearch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CognitiveLevel {
    System1,
    System2,
    Agent,
}

impl Mode {
    pub fn cognitive_level(self) -> CognitiveLevel {
        match self {
            Mode::Auto | Mode::Chat | Mode::Knowledge => CognitiveLevel::System1,
            Mode::Search | Mode::Code => CognitiveLevel::System2,
            Mode::Thinking | Mode::DeepResearch => CognitiveLevel::Agent,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub query: String,
    pub mode: Mode,
    pub trace_id: Uuid,
    pub context_id: Option<Uuid>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub streaming: bool,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Request {
    /// First 8 hex characters of the trace id, used throughout file
    /// artefact paths (`{traceId8}_{timestamp}`).
    pub fn trace_id8(&self) -> String {
        self.trace_id.simple().to_string()[..8].to_string()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Response {
    pub result: String,
    pub mode: Option<Mode>,
    pub trace_id: Option<Uuid>,
    pub tokens_used: u64,
    pub time_ms: u64,
    pub cost_usd: f64,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub events: Vec<ResearchEvent>,
}

/// Shared scratchpad for one request's pipeline run. Single-writer:
/// exclusively owned by the orchestrator task for the duration of a
/// request; helpers receive it by non-owning reference.
pub struct ProcessingContext {
    pub request: Request,
    pub response: Response,
    pub current_step: Option<String>,
    pub steps_completed: Vec<String>,
    pub start_time: DateTime<Utc>,
    pub total_tokens: u64,
    pub intermediate_results: serde_json::Map<String, serde_json::Value>,
}

impl ProcessingContext {
    pub fn new(request: Request) -> Self {
        Self {
            response: Response {
                mode: Some(request.mode),
                trace_id: Some(request.trace_id),
                ..Default::default()
            },
            request,
            current_step: None,
            steps_completed: Vec::new(),
            start_time: Utc::now(),
            total_tokens: 0,
            intermediate_results: serde_json::Map::new(),
        }
    }

    pub fn enter_step(&mut self, step: impl Into<String>) {
        let step = step.into();
        self.current_step = Some(step.clone());
        self.steps_completed.push(step);
    }

    pub fn record_tokens(&mut self, tokens: u64) {
        self.total_tokens += tokens;
        self.response.tokens_used += tokens;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchTask {
    /// Short keyword phrase, 3-8 words, not a full research question.
    pub query: String,
    pub research_goal: String,
    /// Priority 1 = highest.
    pub priority: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRef {
    pub url: String,
    pub title: String,
    pub relevance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResultInner {
    pub summary: String,
    pub sources: Vec<SourceRef>,
    pub processed: String,
    pub full_content: Option<String>,
    pub provider: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub query: String,
    pub goal: String,
    pub priority: u32,
    pub result: SearchResultInner,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Domain {
    pub name: String,
    pub weight: f64,
    pub search_angles: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SectionStatus {
    Covered,
    Partial,
    Missing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionCoverageEntry {
    pub status: SectionStatus,
    pub notes: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SynthesisRecord {
    pub synthesis: String,
    pub section_coverage: HashMap<String, SectionCoverageEntry>,
    pub knowledge_gaps: Vec<String>,
    pub cross_domain_links: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionGap {
    pub name: String,
    pub coverage: f64,
    pub depth: String,
    pub gaps: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GapReport {
    pub is_sufficient: bool,
    pub overall_coverage: f64,
    pub sections: Vec<SectionGap>,
    pub priority_gaps: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Bar,
    Line,
    Pie,
    Heatmap,
    Scatter,
    Waterfall,
    Radar,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartSpec {
    pub title: String,
    pub chart_type: ChartType,
    pub data_description: String,
    pub target_section: String,
    pub insight: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationResult {
    /// Base64-encoded PNG bytes, one per generated figure.
    pub figures: Vec<String>,
    pub figure_specs: Vec<ChartSpec>,
    pub stdout: String,
    pub code: Vec<String>,
    pub execution_time_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reference {
    pub id: u32,
    pub title: String,
    pub url: String,
    pub query: String,
    pub relevance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationStats {
    pub total_citations: u64,
    pub unique_citations: u64,
    pub invalid_citations: Vec<u32>,
    pub most_cited: Vec<(u32, u64)>,
    pub avg_citations_per_source: f64,
    pub citation_distribution: HashMap<u32, u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowError {
    pub error: String,
    pub category: String,
    pub step: String,
    pub retry_count: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub status: WorkflowStatus,
    pub steps: Vec<String>,
    pub current_step: Option<String>,
    pub iterations: u32,
    pub errors: Vec<WorkflowError>,
}

impl WorkflowState {
    pub fn new(steps: Vec<String>) -> Self {
        Self {
            status: WorkflowStatus::Running,
            steps,
            current_step: None,
            iterations: 0,
            errors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Progress,
    Message,
    Reasoning,
    SearchResult,
    Error,
    FinalReport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub step: String,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl ResearchEvent {
    pub fn new(event_type: EventType, step: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event_type,
            step: step.into(),
            data,
            timestamp: Utc::now(),
        }
    }

    /// Renders the SSE wire format: `data: {json}\n\n`.
    pub fn to_sse(&self) -> String {
        format!(
            "data: {}\n\n",
            serde_json::to_string(self).unwrap_or_default()
        )
    }
}
