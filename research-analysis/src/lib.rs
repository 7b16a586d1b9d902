//! ABOUTME: Progressive synthesis, critical analysis, and hierarchical section synthesis
//! ABOUTME: The analytical layer sitting between search execution and report assembly

pub mod analyzer;
pub mod sections;

pub use analyzer::{critical_analysis_stage, intermediate_synthesis, summarize_search_results};
pub use sections::{
    build_hierarchical_context, classify_results_to_sections, parse_sections, synthesize_section,
    Confidence, EvidenceItem, HierarchicalContext, Section, SectionSynthesis,
};
