//! ABOUTME: Keyword-based error classification for the multi-provider client
//! ABOUTME: Pure function: structured errors are trusted, else keyword match

use research_core::{ErrorCategory, ResearchError};

const NETWORK_KEYWORDS: &[&str] = &[
    "timeout",
    "connection",
    "dns",
    "ssl",
    "socket",
    "unreachable",
];
const LLM_KEYWORDS: &[&str] = &[
    "rate_limit",
    "context_length",
    "content_filter",
    "model_not_found",
    "api_error",
];
const RESOURCE_KEYWORDS: &[&str] = &["memory", "disk", "quota", "oom"];

/// Classifies a raw failure message into one of the five categories.
/// Structured `ResearchError` values already carry their category (see
/// `ResearchError::category`); this function is for failures arriving as
/// plain strings — soft errors from a provider, or a `dyn Error` whose
/// concrete type we don't control.
pub fn classify_message(message: &str) -> ErrorCategory {
    let lower = message.to_lowercase();
    if NETWORK_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return ErrorCategory::Network;
    }
    if LLM_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return ErrorCategory::Llm;
    }
    if RESOURCE_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return ErrorCategory::ResourceLimit;
    }
    ErrorCategory::Unknown
}

/// Classifies an already-structured `ResearchError`, trusting its own
/// category over re-deriving one from the message text.
pub fn classify(err: &ResearchError) -> ErrorCategory {
    err.category()
}

/// A successful-looking string result is treated as a raised failure when
/// it starts with `[` and contains `Error]` — some providers return
/// sentinel error strings instead of raising.
pub fn is_soft_error(text: &str) -> bool {
    text.starts_with('[') && text.contains("Error]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_network_keywords() {
        assert_eq!(classify_message("Connection timeout"), ErrorCategory::Network);
    }

    #[test]
    fn classifies_llm_keywords() {
        assert_eq!(
            classify_message("429 rate_limit exceeded"),
            ErrorCategory::Llm
        );
    }

    #[test]
    fn classifies_resource_keywords() {
        assert_eq!(classify_message("disk quota exceeded"), ErrorCategory::ResourceLimit);
    }

    #[test]
    fn unmatched_is_unknown() {
        assert_eq!(classify_message("totally unrelated text"), ErrorCategory::Unknown);
    }

    #[test]
    fn detects_soft_error_sentinel() {
        assert!(is_soft_error("[Provider Error] something went wrong"));
        assert!(!is_soft_error("a normal response"));
        assert!(!is_soft_error("[not an error marker"));
    }
}
