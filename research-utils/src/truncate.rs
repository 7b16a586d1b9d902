//! ABOUTME: Bounded summarisation shared by the analyzer and reporter
//! ABOUTME: Per-item and total-byte truncation with explicit markers

/// One summarisable item: a rendered label plus the text content to
/// bound. Callers (analyzer, section synthesizer, reporter) build these
/// from their own result shapes before calling `summarize_bounded`.
pub struct BoundedItem {
    pub label: String,
    pub content: String,
}

/// Serialises `items` in order, truncating each item's content at
/// `max_per_item` chars (appending `"... [truncated]"`) and stopping once
/// the running total exceeds `max_total`, at which point the remaining
/// count is summarised as `"... [{n} more results truncated for context
/// limit]"`.
///
/// Two call sites use this with different constants: the analyzer's
/// progressive-synthesis input uses (8000, 200_000); the reporter's final
/// report-context preparation uses the tighter (6000, 200_000) because it
/// competes with citation-density and word-count requirements in the same
/// prompt.
pub fn summarize_bounded(items: &[BoundedItem], max_per_item: usize, max_total: usize) -> String {
    let mut out = Vec::with_capacity(items.len());
    let mut total = 0usize;

    for (i, item) in items.iter().enumerate() {
        let mut content = item.content.clone();
        if content.chars().count() > max_per_item {
            content = content.chars().take(max_per_item).collect::<String>() + "... [truncated]";
        }
        let entry = format!("{}\n{}", item.label, content);
        total += entry.chars().count();
        if total > max_total {
            out.push(format!(
                "... [{} more results truncated for context limit]",
                items.len() - i
            ));
            break;
        }
        out.push(entry);
    }

    out.join("\n\n")
}
