//! ABOUTME: Shared utility helpers used across the research pipeline crates
//! ABOUTME: Lenient JSON parsing, XML sanitisation, truncation, retry

pub mod json;
pub mod retry;
pub mod truncate;
pub mod xml;

pub use json::{parse_lenient, parse_lenient_value};
pub use retry::{retry_with_backoff, JitterStrategy, RetryConfig};
pub use truncate::{summarize_bounded, BoundedItem};
pub use xml::sanitize_xml_input;
