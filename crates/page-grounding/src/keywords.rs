use crate::normalize::normalize;

/// Tokens shorter than this (in characters) never become keywords.
pub const MIN_KEYWORD_CHARS: usize = 3;

/// Words dropped from questions before matching: interrogatives, articles,
/// prepositions, auxiliaries, pronouns and conversational filler.
pub const STOP_WORDS: &[&str] = &[
    "what", "where", "when", "how", "why", "who", "which", "is", "are", "was", "were", "do",
    "does", "did", "can", "could", "would", "should", "will", "the", "a", "an", "in", "on", "at",
    "to", "for", "of", "with", "by", "from", "this", "that", "these", "those", "it", "its", "be",
    "been", "being", "have", "has", "had", "about", "me", "tell", "show", "find", "get", "give",
    "please", "help", "i", "you", "we", "they", "my",
];

pub fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(&token)
}

/// Extract the keywords a question is matched on.
///
/// Returns normalized tokens in question order, without duplicates. An empty
/// result means the question carries nothing to search for.
pub fn extract_keywords(question: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for token in normalize(question).split_whitespace() {
        if token.chars().count() < MIN_KEYWORD_CHARS || is_stop_word(token) {
            continue;
        }
        if keywords.iter().any(|k| k == token) {
            continue;
        }
        keywords.push(token.to_string());
    }
    keywords
}
