use crate::tokenizer::tokenize;

/// Placeholder replaced by the matched token inside a highlight template.
pub const PLACEHOLDER: &str = "{{_}}";

/// Wrap every token of `text` that equals `term` using `template`.
///
/// Matching is on whole tokens only, so `"d"` never touches `"dddd"`. The
/// result is the tokens rejoined with single spaces.
pub fn highlight(term: &str, text: &str, template: &str) -> String {
    tokenize(text)
        .into_iter()
        .map(|token| {
            if token == term {
                template.replace(PLACEHOLDER, token)
            } else {
                token.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_exact_tokens_only() {
        let out = highlight("d", "n n z c c c d d d dddd", "<{{_}}>");
        assert_eq!(out, "n n z c c c <d> <d> <d> dddd");
    }

    #[test]
    fn no_match_normalizes_whitespace() {
        assert_eq!(highlight("q", "a  b\tc", "[{{_}}]"), "a b c");
    }

    #[test]
    fn template_without_placeholder_replaces_token() {
        assert_eq!(highlight("b", "a b", "***"), "a ***");
    }

    #[test]
    fn repeated_placeholder() {
        assert_eq!(highlight("b", "a b", "{{_}}|{{_}}"), "a b|b");
    }
}
