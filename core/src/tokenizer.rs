use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref RE: Regex = Regex::new(r"\S+").expect("valid regex");
}

/// Split text into whitespace-delimited tokens, in order.
///
/// Tokens are returned exactly as they appear: no case folding, no
/// normalization, no stemming. Blank input yields no tokens.
pub fn tokenize(text: &str) -> Vec<&str> {
    RE.find_iter(text).map(|m| m.as_str()).collect()
}
