//! Thread title derivation.

/// Title every thread starts with until its first message arrives
pub const SENTINEL_TITLE: &str = "New Chat";

/// Maximum number of characters kept from the first message
pub const TITLE_MAX_CHARS: usize = 30;

/// Derive a thread title from the text of its first message.
///
/// Lengths are counted in `char`s so multi-byte text is never split inside a
/// code point.
pub fn derive_title(text: &str) -> String {
    if text.chars().count() > TITLE_MAX_CHARS {
        let head: String = text.chars().take(TITLE_MAX_CHARS).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_kept() {
        assert_eq!(derive_title("Should I take COS217?"), "Should I take COS217?");
    }

    #[test]
    fn test_exactly_thirty_chars_is_kept() {
        let text = "a".repeat(30);
        assert_eq!(derive_title(&text), text);
    }

    #[test]
    fn test_long_text_is_truncated() {
        let text = "What events are happening on campus tomorrow night?";
        assert!(text.chars().count() > 30);
        assert_eq!(derive_title(text), "What events are happening on c...");
    }

    #[test]
    fn test_forty_five_chars() {
        let text = "0123456789".repeat(4) + "abcde";
        assert_eq!(text.len(), 45);
        assert_eq!(derive_title(&text), format!("{}...", &text[..30]));
    }

    #[test]
    fn test_multibyte_text() {
        let text = "老虎".repeat(20);
        let title = derive_title(&text);
        assert_eq!(title.chars().count(), 33);
        assert!(title.ends_with("..."));
    }
}
