//! ABOUTME: Front-end mode dispatch deciding whether a request enters deep research
//! ABOUTME: Keyword priority selection, optional complexity scoring, tool mask

use research_config::RouterConfig;
use research_core::{CognitiveLevel, Mode, Request};
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

const CODE_KEYWORDS: &[&str] = &["code", "代碼", "function", "程式"];
const SEARCH_KEYWORDS: &[&str] = &["search", "搜尋", "find"];
const KNOWLEDGE_KEYWORDS: &[&str] = &["knowledge", "explain", "知識", "解釋"];
const THINKING_KEYWORDS: &[&str] = &["deep", "analyze", "分析", "思考"];
const MULTI_STEP_KEYWORDS: &[&str] = &[
    "分析", "analyze", "compare", "比較", "evaluate", "評估", "explain why", "為什麼",
    "step by step", "逐步",
];
const TOOL_NEED_KEYWORDS: &[&str] = &[
    "code", "代碼", "程式", "search", "搜尋", "execute", "執行", "research", "研究",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplexityLevel {
    System1,
    System2,
    Agent,
}

#[derive(Debug, Clone, Copy)]
pub struct ComplexityScore {
    pub score: f64,
    pub level: ComplexityLevel,
}

/// Weighted score from length (0.2), multi-step signal (0.3), tool-need
/// signal (0.3), and question-mark count (0.2). Score >= 0.6 -> Agent,
/// >= 0.3 -> System2, else System1.
pub fn analyze_complexity(query: &str) -> ComplexityScore {
    let lower = query.to_lowercase();
    let length_score = (query.chars().count() as f64 / 500.0).min(1.0);
    let multi_step_count = MULTI_STEP_KEYWORDS.iter().filter(|k| lower.contains(**k)).count();
    let multi_step_score = (multi_step_count as f64 / 3.0).min(1.0);
    let tool_need_count = TOOL_NEED_KEYWORDS.iter().filter(|k| lower.contains(**k)).count();
    let tool_need_score = (tool_need_count as f64 / 3.0).min(1.0);
    let question_marks = (query.matches('?').count() + query.matches('？').count()).min(3) as f64 / 3.0;

    let score =
        0.2 * length_score + 0.3 * multi_step_score + 0.3 * tool_need_score + 0.2 * question_marks;

    let level = if score >= 0.6 {
        ComplexityLevel::Agent
    } else if score >= 0.3 {
        ComplexityLevel::System2
    } else {
        ComplexityLevel::System1
    };

    ComplexityScore { score, level }
}

#[derive(Debug, Clone)]
pub struct RoutingDecision {
    pub mode: Mode,
    pub complexity: Option<ComplexityScore>,
    pub confidence: f64,
    pub reason: String,
    pub cognitive_level: CognitiveLevel,
}

fn select_mode_by_keyword(query: &str) -> (Mode, &'static str) {
    let lower = query.to_lowercase();
    if CODE_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return (Mode::Code, "code keyword match");
    }
    if SEARCH_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return (Mode::Search, "search keyword match");
    }
    if KNOWLEDGE_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return (Mode::Knowledge, "knowledge keyword match");
    }
    if THINKING_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return (Mode::Thinking, "thinking keyword match");
    }
    (Mode::Chat, "default")
}

/// Decides the effective mode for `request`. Explicit (non-`Auto`) modes
/// pass through unchanged with full confidence. `Auto` runs keyword
/// selection in priority order (code > search > knowledge > thinking >
/// chat), optionally refined by complexity scoring.
pub fn route(request: &Request, config: &RouterConfig) -> RoutingDecision {
    if request.mode != Mode::Auto {
        return RoutingDecision {
            mode: request.mode,
            complexity: None,
            confidence: 1.0,
            reason: "explicit mode".to_string(),
            cognitive_level: request.mode.cognitive_level(),
        };
    }

    let (mode, reason) = select_mode_by_keyword(&request.query);
    let complexity = if config.complexity_analysis_enabled {
        Some(analyze_complexity(&request.query))
    } else {
        None
    };

    RoutingDecision {
        mode,
        complexity,
        confidence: 0.8,
        reason: reason.to_string(),
        cognitive_level: mode.cognitive_level(),
    }
}

pub type ToolName = &'static str;

/// Mode-indexed allow-list of tool names, consulted only at the
/// permission layer. The LLM-visible tool catalogue never shrinks; only
/// the set the model is permitted to invoke does, preserving
/// prompt-prefix stability for provider-side KV-cache reuse.
pub static TOOL_AVAILABILITY_MASK: LazyLock<HashMap<Mode, HashSet<ToolName>>> =
    LazyLock::new(|| {
        let mut m = HashMap::new();
        m.insert(Mode::Chat, HashSet::from(["respond"]));
        m.insert(Mode::Knowledge, HashSet::from(["respond", "knowledge_retrieve"]));
        m.insert(Mode::Search, HashSet::from(["respond", "web_search"]));
        m.insert(
            Mode::Code,
            HashSet::from(["respond", "code_execute", "code_analyze"]),
        );
        m.insert(Mode::Thinking, HashSet::from(["respond"]));
        m.insert(
            Mode::DeepResearch,
            HashSet::from(["respond", "web_search", "web_fetch", "code_execute"]),
        );
        m.insert(Mode::Auto, HashSet::from(["respond"]));
        m
    });

pub fn is_tool_allowed(mode: Mode, tool: &str) -> bool {
    TOOL_AVAILABILITY_MASK
        .get(&mode)
        .map(|allowed| allowed.contains(tool))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn req(query: &str, mode: Mode) -> Request {
        Request {
            query: query.to_string(),
            mode,
            trace_id: Uuid::new_v4(),
            context_id: None,
            temperature: None,
            max_tokens: None,
            streaming: false,
            metadata: serde_json::Map::new(),
        }
    }

    #[test]
    fn explicit_mode_passes_through() {
        let decision = route(&req("anything", Mode::DeepResearch), &RouterConfig::default());
        assert_eq!(decision.mode, Mode::DeepResearch);
        assert_eq!(decision.confidence, 1.0);
    }

    #[test]
    fn keyword_priority_prefers_code_over_search() {
        let decision = route(&req("search for code function", Mode::Auto), &RouterConfig::default());
        assert_eq!(decision.mode, Mode::Code);
    }

    #[test]
    fn cognitive_level_matches_mode() {
        let decision = route(&req("explain this", Mode::Auto), &RouterConfig::default());
        assert_eq!(decision.cognitive_level, decision.mode.cognitive_level());
    }

    #[test]
    fn tool_mask_shrinks_permission_not_catalogue() {
        assert!(is_tool_allowed(Mode::Chat, "respond"));
        assert!(!is_tool_allowed(Mode::Chat, "web_search"));
        assert!(is_tool_allowed(Mode::DeepResearch, "web_search"));
    }

    #[test]
    fn thinking_keyword_alone_never_upgrades_to_deep_research() {
        let decision = route(
            &req("please deeply analyze this topic, step by step", Mode::Auto),
            &RouterConfig::default(),
        );
        assert_eq!(decision.mode, Mode::Thinking);
    }

    #[test]
    fn complexity_score_rises_with_multi_step_and_tool_signals() {
        let simple = analyze_complexity("hi");
        let complex = analyze_complexity("first analyze this, then compare it, then execute code, then evaluate? really?");
        assert!(complex.score > simple.score);
        assert_eq!(simple.level, ComplexityLevel::System1);
    }

    #[test]
    fn complexity_score_high_enough_selects_agent_level() {
        let query = "analyze and compare, explain why, step by step, then execute code and research further? and then? and then?";
        let score = analyze_complexity(query);
        assert_eq!(score.level, ComplexityLevel::Agent);
    }
}
