/// Fold a span of canonical text onto one line: whitespace runs, including
/// the `\n` between paragraphs or table rows, become a single space and the
/// ends are trimmed.
///
/// Prompt-view entries and chunk previews go through this so every anchor
/// stays on its own line.
///
/// ```rust
/// use canonical::collapse_whitespace;
///
/// assert_eq!(collapse_whitespace("  Net   sales\n increased "), "Net sales increased");
/// assert_eq!(collapse_whitespace("| A | B |\r\n| 1 | 2 |"), "| A | B | | 1 | 2 |");
/// assert_eq!(collapse_whitespace(" \n\t "), "");
/// ```
pub fn collapse_whitespace(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len());
    for word in text.split_whitespace() {
        if !normalized.is_empty() {
            normalized.push(' ');
        }
        normalized.push_str(word);
    }
    normalized
}
