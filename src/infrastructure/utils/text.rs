/// Strips control characters (keeping newlines and tabs) and surrounding
/// whitespace from free-text input.
pub fn sanitize_text(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect::<String>()
        .trim()
        .to_string()
}
