//! Syntax repair for almost-JSON object spans.

use serde_json::Value;

use super::parse_object;
use super::scanner::ScanState;

/// Repair a candidate span and parse it.
///
/// Trailing commas are removed, missing closers appended, and the result
/// parsed. If that fails, trailing commas are removed exactly once more
/// (closing a truncated list can expose a new one) before giving up.
pub(crate) fn repair(span: &str) -> Option<Value> {
    let repaired = close_unbalanced(&remove_trailing_commas(span));
    parse_object(&repaired).or_else(|| parse_object(&remove_trailing_commas(&repaired)))
}

/// Delete every comma that is followed only by whitespace and then a `}` or
/// `]`. The whitespace between them goes too. Commas inside strings are kept.
pub(crate) fn remove_trailing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut state = ScanState::Normal;
    // Offset in `out` of a comma that may turn out to be trailing.
    let mut pending: Option<usize> = None;

    for c in text.chars() {
        if state == ScanState::Normal {
            match c {
                '}' | ']' => {
                    if let Some(at) = pending.take() {
                        out.truncate(at);
                    }
                }
                ',' => pending = Some(out.len()),
                c if c.is_whitespace() => {}
                _ => pending = None,
            }
        }
        state = state.step(c);
        out.push(c);
    }
    out
}

/// Append whatever closers are still expected at end of input.
///
/// Every `{` or `[` outside a string pushes its closer; every closer that
/// matches the top of the stack pops it. A closer that does not match is
/// left in place and the stack untouched, which leaves the text invalid.
/// An unterminated string is closed first, dropping a dangling backslash.
pub(crate) fn close_unbalanced(text: &str) -> String {
    let mut expected: Vec<char> = Vec::new();
    let mut state = ScanState::Normal;

    for c in text.chars() {
        if state == ScanState::Normal {
            match c {
                '{' => expected.push('}'),
                '[' => expected.push(']'),
                '}' | ']' if expected.last() == Some(&c) => {
                    expected.pop();
                }
                _ => {}
            }
        }
        state = state.step(c);
    }

    let mut repaired = text.to_string();
    match state {
        ScanState::Normal => {}
        ScanState::InString => repaired.push('"'),
        ScanState::Escaped => {
            repaired.pop();
            repaired.push('"');
        }
    }
    if !expected.is_empty() {
        tracing::debug!(closers = expected.len(), "Appending missing closers");
    }
    repaired.extend(expected.iter().rev());
    repaired
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_remove_trailing_commas() {
        assert_eq!(remove_trailing_commas(r#"{"a":[1,2,],}"#), r#"{"a":[1,2]}"#);
        assert_eq!(remove_trailing_commas("{\"a\":1 ,\n  }"), "{\"a\":1 }");
        assert_eq!(remove_trailing_commas(r#"{"a":1,"b":2}"#), r#"{"a":1,"b":2}"#);
    }

    #[test]
    fn test_remove_trailing_commas_respects_strings() {
        let text = r#"{"text":"a,]","b":"c\",}"}"#;
        assert_eq!(remove_trailing_commas(text), text);
    }

    #[test]
    fn test_close_unbalanced_order() {
        assert_eq!(
            close_unbalanced(r#"{"summary_bullets":[{"text":"a""#),
            r#"{"summary_bullets":[{"text":"a"}]}"#
        );
    }

    #[test]
    fn test_close_unbalanced_ignores_quoted_delimiters() {
        assert_eq!(close_unbalanced(r#"{"a":"[{""#), r#"{"a":"[{"}"#);
    }

    #[test]
    fn test_close_unbalanced_closes_open_string() {
        assert_eq!(close_unbalanced(r#"{"a":["fev"#), r#"{"a":["fev"]}"#);
        assert_eq!(close_unbalanced(r#"{"a":"x\"#), r#"{"a":"x"}"#);
    }

    #[test]
    fn test_close_unbalanced_leaves_mismatch() {
        assert_eq!(close_unbalanced(r#"{"a":[1}"#), r#"{"a":[1}]}"#);
    }

    #[test]
    fn test_repair_second_comma_pass() {
        assert_eq!(repair(r#"{"a":[1,2,"#), Some(json!({"a": [1, 2]})));
    }

    #[test]
    fn test_repair_gives_up() {
        assert_eq!(repair(r#"{"a":"#), None);
        assert_eq!(repair(r#"{"a":[1}"#), None);
    }
}
