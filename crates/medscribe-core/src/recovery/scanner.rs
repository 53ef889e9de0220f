//! Quote-aware scanning over model output.
//!
//! All structural decisions (where an object starts, where it ends, which
//! delimiters are still open) ignore characters inside JSON string literals.

/// Lexical state of the scanner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum ScanState {
    #[default]
    Normal,
    InString,
    /// Inside a string, directly after a backslash.
    Escaped,
}

impl ScanState {
    /// State after consuming `c`.
    pub(crate) fn step(self, c: char) -> Self {
        match (self, c) {
            (Self::Normal, '"') => Self::InString,
            (Self::Normal, _) => Self::Normal,
            (Self::InString, '\\') => Self::Escaped,
            (Self::InString, '"') => Self::Normal,
            (Self::InString, _) => Self::InString,
            (Self::Escaped, _) => Self::InString,
        }
    }
}

/// Characters outside string literals, with their byte offsets.
///
/// Quote characters themselves are never yielded.
pub(crate) fn structural(text: &str) -> impl Iterator<Item = (usize, char)> + '_ {
    let mut state = ScanState::Normal;
    text.char_indices().filter_map(move |(at, c)| {
        let outside = state == ScanState::Normal && c != '"';
        state = state.step(c);
        outside.then_some((at, c))
    })
}

/// Remove a surrounding ```` ``` ```` fence and a bare language tag on its
/// opening line. Text without a leading fence is only trimmed.
pub(crate) fn strip_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_suffix("```").unwrap_or(inner);

    match inner.split_once('\n') {
        Some((tag, rest)) if !tag.contains('{') => rest.trim(),
        _ => inner.trim(),
    }
}

/// The first brace-balanced object span, skipping braces inside strings.
///
/// Returns `None` when there is no opening brace or the depth never
/// returns to zero.
pub(crate) fn balanced_span(text: &str) -> Option<&str> {
    let mut start = None;
    let mut depth: i64 = 0;

    for (at, c) in structural(text) {
        match (c, start) {
            ('{', None) => {
                start = Some(at);
                depth = 1;
            }
            ('{', Some(_)) => depth += 1,
            ('}', Some(open)) => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[open..=at]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Text between the first `{` and the last `}`, ignoring quoting.
///
/// When no closing brace follows the first opening brace, the span runs to
/// the end of the text so truncated output can still be repaired.
pub(crate) fn outer_span(text: &str) -> Option<&str> {
    let open = text.find('{')?;
    match text.rfind('}') {
        Some(close) if close > open => Some(&text[open..=close]),
        _ => Some(&text[open..]),
    }
}
