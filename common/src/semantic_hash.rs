use sha2::{Digest, Sha256};

/// Body text beyond this many characters does not influence the fingerprint.
const BODY_PREFIX_CHARS: usize = 500;

/// Lowercase, strip punctuation, collapse whitespace, drop short tokens,
/// sort the remainder. Two texts that differ only in formatting or token
/// order normalise to the same string.
pub fn normalize_text(text: &str) -> String {
    let lowered: String = text
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect();

    let mut tokens: Vec<&str> = lowered
        .split_whitespace()
        .filter(|token| token.chars().count() > 2)
        .collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Stable 64-hex-char fingerprint of normalized title + truncated body +
/// sorted keywords. Keyword order never changes the result.
pub fn semantic_hash(title: &str, body: &str, keywords: &[String]) -> String {
    let body_prefix: String = body.chars().take(BODY_PREFIX_CHARS).collect();

    let mut sorted_keywords: Vec<String> = keywords
        .iter()
        .map(|keyword| keyword.to_lowercase())
        .collect();
    sorted_keywords.sort_unstable();

    let combined = format!(
        "{} | {} | {}",
        normalize_text(title),
        normalize_text(&body_prefix),
        sorted_keywords.join(" ")
    );

    let digest = Sha256::digest(combined.as_bytes());
    let hex: String = digest.iter().map(|byte| format!("{byte:02x}")).collect();
    hex.chars().take(64).collect()
}
