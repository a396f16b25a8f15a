/// Strips control characters that have no business in a code payload while
/// keeping the whitespace that does.
pub fn sanitize_code_content(code: &str) -> String {
    code.chars()
        .filter(|&c| c == '\n' || c == '\r' || c == '\t' || c >= ' ')
        .collect()
}

/// Shortens long payloads for log lines. Character-based so it never splits
/// a UTF-8 sequence.
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{}…({} chars total)", head, text.chars().count())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_keeps_code_whitespace() {
        let input = "def f():\n\treturn 1\r\n\u{0000}\u{0007}";
        assert_eq!(sanitize_code_content(input), "def f():\n\treturn 1\r\n");
    }

    #[test]
    fn truncate_marks_long_payloads() {
        assert_eq!(truncate_for_log("short", 10), "short");
        let out = truncate_for_log(&"x".repeat(50), 10);
        assert!(out.starts_with("xxxxxxxxxx"));
        assert!(out.contains("50 chars total"));
    }
}
