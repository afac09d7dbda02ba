//! Smart-punctuation folding applied to every character before emission.

/// Fold typographic punctuation and Unicode spaces to their ASCII forms.
///
/// Returns `None` for characters that are dropped entirely (zero-width
/// space). Everything not in the table passes through unchanged.
pub fn fold_punctuation(ch: char) -> Option<char> {
    match ch {
        '\u{2018}' | '\u{2019}' => Some('\''),
        '\u{201a}' => Some(','),
        '\u{201c}' | '\u{201d}' | '\u{201e}' => Some('"'),
        '\u{2013}' | '\u{2014}' | '\u{2015}' | '\u{2212}' => Some('-'),
        '\u{00a0}' | '\u{2000}'..='\u{200a}' | '\u{202f}' | '\u{205f}' | '\u{3000}' => Some(' '),
        '\u{200b}' => None,
        other => Some(other),
    }
}
