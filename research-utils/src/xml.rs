//! ABOUTME: XML-injection sanitiser applied to every prompt-interpolated value
//! ABOUTME: Escapes `<` and `>` so user content cannot break prompt XML tags

/// Escapes `<` and `>` in `text`. Every prompt template passes
/// interpolated query/plan/learnings/suggestion/etc. content through this
/// before embedding it inside a `<TAG>...</TAG>` block.
pub fn sanitize_xml_input(text: impl std::fmt::Display) -> String {
    text.to_string().replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_angle_brackets() {
        assert_eq!(
            sanitize_xml_input("<script>alert(1)</script>"),
            "&lt;script&gt;alert(1)&lt;/script&gt;"
        );
    }

    #[test]
    fn leaves_plain_text_untouched() {
        assert_eq!(sanitize_xml_input("plain text"), "plain text");
    }

    #[test]
    fn coerces_non_string_display_input() {
        assert_eq!(sanitize_xml_input(42), "42");
    }
}
