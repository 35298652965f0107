//! Utility functions for common operations.

use crate::error::TranslationError;

/// Longest field a chat embed will display, in characters.
pub const DISPLAY_FIELD_LIMIT: usize = 1024;

const ELLIPSIS: &str = "...";

/// Truncates text to at most `limit` characters for display.
///
/// Text over the limit is cut on a character boundary and ends with `...`;
/// the result including the suffix never exceeds `limit`. Limits too small
/// for the suffix get a plain cut.
///
/// # Arguments
/// * `text` - The text to shorten
/// * `limit` - Maximum length in characters
pub fn truncate_for_display(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }

    if limit < ELLIPSIS.len() {
        return text.chars().take(limit).collect();
    }

    let keep = limit - ELLIPSIS.len();
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}

/// Prefixes every line with `> ` so the text renders as a quote block.
pub fn quote_block(text: &str) -> String {
    text.lines()
        .map(|line| format!("> {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Checks if an HTTP response is successful, and if not, returns a detailed error.
///
/// This helper extracts both the status code and response body for better error messages.
///
/// # Arguments
/// * `response` - The reqwest Response to check
///
/// # Returns
/// Ok(response) if successful, or Err(TranslationError) with details if not
pub async fn check_response_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, TranslationError> {
    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        return Err(TranslationError::ApiError(format!(
            "HTTP {}: {}",
            status, text
        )));
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_text_unchanged() {
        assert_eq!(truncate_for_display("hello", 10), "hello");
        assert_eq!(truncate_for_display("", 10), "");
    }

    #[test]
    fn test_truncate_counts_characters() {
        let text = "翻".repeat(DISPLAY_FIELD_LIMIT);
        assert_eq!(truncate_for_display(&text, DISPLAY_FIELD_LIMIT), text);

        let longer = "翻".repeat(DISPLAY_FIELD_LIMIT + 1);
        let truncated = truncate_for_display(&longer, DISPLAY_FIELD_LIMIT);
        assert_eq!(truncated.chars().count(), DISPLAY_FIELD_LIMIT);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn test_truncate_tiny_limit() {
        assert_eq!(truncate_for_display("abcdef", 3), "...");
        assert_eq!(truncate_for_display("abcdef", 2), "ab");
        assert_eq!(truncate_for_display("abcdef", 0), "");
    }

    #[test]
    fn test_quote_block() {
        assert_eq!(quote_block("a\nb"), "> a\n> b");
        assert_eq!(quote_block("single"), "> single");
    }
}
