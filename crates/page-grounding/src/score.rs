use serde::{Deserialize, Serialize};

use crate::normalize::normalize;

/// Points a keyword contributes to a sentence's score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// Keyword appears as a whole word in the sentence.
    pub whole_word: u32,
    /// Keyword appears only inside a longer word of the sentence.
    pub partial: u32,
    /// Keyword appears anywhere in the section heading. Added at most once per keyword.
    pub heading: u32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            whole_word: 3,
            partial: 1,
            heading: 2,
        }
    }
}

/// Score a sentence against the question keywords.
///
/// Keywords are expected to be normalized already (see
/// [`extract_keywords`](crate::keywords::extract_keywords)); the sentence and
/// heading are normalized here.
pub fn score_sentence(
    sentence: &str,
    keywords: &[String],
    heading: &str,
    weights: &ScoreWeights,
) -> u32 {
    let sentence = normalize(sentence);
    let heading = normalize(heading);

    keywords
        .iter()
        .map(|keyword| {
            let mut points = 0;
            if contains_word(&sentence, keyword) {
                points += weights.whole_word;
            } else if sentence.contains(keyword.as_str()) {
                points += weights.partial;
            }
            if heading.contains(keyword.as_str()) {
                points += weights.heading;
            }
            points
        })
        .sum()
}

/// Whole-word containment over normalized text.
///
/// Normalized text is word characters separated by single spaces, so a word
/// boundary on both sides of the keyword is the same as equality with one of
/// the space-separated tokens.
fn contains_word(normalized: &str, keyword: &str) -> bool {
    !keyword.is_empty() && normalized.split(' ').any(|token| token == keyword)
}
