//! Text normalization shared by the classifier, the frame store and the
//! retrieval index.

/// Fixed stop-word list removed during keyword extraction
pub const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "am",
    "in", "on", "at", "to", "for", "of", "with", "by", "from", "into",
    "and", "or", "but", "not", "this", "that", "these", "those", "there",
    "it", "its", "as", "do", "does", "did", "has", "have", "had",
    "can", "could", "will", "would", "should", "may", "might", "must",
    "i", "me", "my", "we", "our", "you", "your", "they", "them", "their",
    "what", "which", "who", "whom", "how", "why", "when", "where",
    "about", "any", "some", "so", "if", "then", "than", "also", "just",
];

/// Lower-case, trim and collapse internal whitespace
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split into lower-case alphanumeric tokens. Underscores are kept so
/// frame identifiers such as `neem_oil` survive as one token.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(&token)
}

/// Tokens minus stop words, de-duplicated, first occurrence order kept
pub fn extract_keywords(text: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for token in tokenize(text) {
        if is_stop_word(&token) || keywords.contains(&token) {
            continue;
        }
        keywords.push(token);
    }
    keywords
}

/// Punctuation-free normalized form used for string similarity
pub fn plain(text: &str) -> String {
    tokenize(text).join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize("  How   do I\tControl APHIDS? "), "how do i control aphids?");
    }

    #[test]
    fn test_tokenize_strips_punctuation() {
        assert_eq!(tokenize("Neem_oil, soap & water!"), vec!["neem_oil", "soap", "water"]);
    }

    #[test]
    fn test_keywords_drop_stop_words() {
        let keywords = extract_keywords("Aphid Control on Tomatoes and the aphid");
        assert_eq!(keywords, vec!["aphid", "control", "tomatoes"]);
    }
}
