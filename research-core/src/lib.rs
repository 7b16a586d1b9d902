//! ABOUTME: Shared types, error taxonomy, and collaborator traits
//! ABOUTME: for the deep-research orchestrator workspace

pub mod error;
pub mod traits;
pub mod types;

pub use error::{ErrorCategory, ResearchError, Result};
pub use traits::{
    GenerateOptions, KnowledgeHit, KnowledgeService, LlmProvider, RawSearchHit, SandboxOutcome,
    SandboxService, SearchProvider, TokenInfo,
};
pub use types::*;
