//! Tokenization for indexing and query parsing.

use std::collections::HashSet;

/// Words too common to carry any signal in a query.
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "that", "this", "into", "are", "was", "were", "you",
    "not", "but", "can", "has", "have", "its", "our", "your", "all", "any", "use", "using",
    "should", "will", "would", "could", "been", "being", "what", "when", "where", "which",
    "who", "how", "why", "then", "than", "there", "their", "them", "they", "these", "those",
    "about", "also", "some", "such", "only", "other", "each", "over", "under", "please",
];

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

/// Distinct lower-cased tokens longer than `min_len`, for the inverted index.
pub fn index_tokens(text: &str, min_len: usize) -> HashSet<String> {
    words(text).filter(|w| w.chars().count() > min_len).collect()
}

/// Lower-cased, stop-word-free query tokens longer than `min_len`,
/// deduplicated in first-seen order.
pub fn query_tokens(query: &str, min_len: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    words(query)
        .filter(|w| w.chars().count() > min_len)
        .filter(|w| !STOP_WORDS.contains(&w.as_str()))
        .filter(|w| seen.insert(w.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_tokens_respect_min_length() {
        let tokens = index_tokens("fn get_wallet(id: u64) -> Wallet", 3);
        assert!(tokens.contains("wallet"));
        assert!(!tokens.contains("get"));
        assert!(!tokens.contains("u64"));
        assert!(!tokens.contains("id"));
    }

    #[test]
    fn query_tokens_drop_stop_words_and_short_words() {
        let tokens = query_tokens("Add the wallet API to THE payment service", 2);
        assert_eq!(tokens, vec!["add", "wallet", "api", "payment", "service"]);
    }

    #[test]
    fn query_tokens_are_deduplicated() {
        let tokens = query_tokens("test tests test", 2);
        assert_eq!(tokens, vec!["test", "tests"]);
    }

    #[test]
    fn empty_query_yields_nothing() {
        assert!(query_tokens("  ,, ", 2).is_empty());
    }
}
