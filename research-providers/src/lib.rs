//! ABOUTME: Error classification and the multi-provider LLM client
//! ABOUTME: Fallback chain, soft-error detection, token accounting

pub mod adapters;
pub mod classify;
pub mod multi_provider;

pub use adapters::HttpChatProvider;
pub use classify::{classify, classify_message, is_soft_error};
pub use multi_provider::{MultiProviderLlmClient, ANTHROPIC_MAX_TOKENS_FLOOR};
