//! Text clean-up helpers shared by extraction and ingestion.

use std::sync::LazyLock;

use regex::Regex;

static TRAILING_LINE_SPACE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[ \t\r]+\n").unwrap_or_else(|e| panic!("invalid regex: {e}"))
});
static BLANK_LINE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").unwrap_or_else(|e| panic!("invalid regex: {e}")));
static SPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]{2,}").unwrap_or_else(|e| panic!("invalid regex: {e}")));

/// Collapse runs of spaces and blank lines.
///
/// Three or more newlines become one blank line and repeated spaces/tabs
/// become a single space.
pub fn normalize_whitespace(text: &str) -> String {
    let text = TRAILING_LINE_SPACE.replace_all(text, "\n");
    let text = BLANK_LINE_RUN.replace_all(&text, "\n\n");
    let text = SPACE_RUN.replace_all(&text, " ");
    text.trim().to_string()
}

/// Truncate to at most `max_chars` characters without splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Last path segment of a URL, used as a human-readable media title.
pub fn file_name_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(url)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_whitespace() {
        let raw = "Title   here\n\n\n\n\nBody  \t text  \n\n\nEnd";
        assert_eq!(normalize_whitespace(raw), "Title here\n\nBody text\n\nEnd");
    }

    #[test]
    fn test_normalize_keeps_single_blank_line() {
        assert_eq!(normalize_whitespace("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(
            file_name_from_url("https://cdn.test/a/b/sermon.mp4?sig=1"),
            "sermon.mp4"
        );
        assert_eq!(file_name_from_url("https://cdn.test/a/"), "a");
    }
}
