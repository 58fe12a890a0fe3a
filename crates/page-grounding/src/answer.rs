use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::env::env_parse;
use crate::error::GroundingError;
use crate::keywords::extract_keywords;
use crate::score::{score_sentence, ScoreWeights};
use crate::sections::{SectionSource, DEFAULT_HEADING};

/// Reply when the question has nothing left to search for after stop-word removal.
pub const CLARIFICATION_MESSAGE: &str = "I can help you find information on this page. Could you be more specific about what you're looking for?";

static SENTENCE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerConfig {
    pub weights: ScoreWeights,
    /// Upper bound on quoted sentences.
    pub max_matches: usize,
    /// Sentences this short (in characters) or shorter are discarded.
    pub min_sentence_chars: usize,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            max_matches: 3,
            min_sentence_chars: 15,
        }
    }
}

impl AnswerConfig {
    /// Optional overrides:
    /// - `GROUNDING_MAX_MATCHES`
    /// - `GROUNDING_MIN_SENTENCE_CHARS`
    /// - `GROUNDING_WHOLE_WORD_WEIGHT`, `GROUNDING_PARTIAL_WEIGHT`, `GROUNDING_HEADING_WEIGHT`
    pub fn from_env() -> Result<Self, GroundingError> {
        let defaults = Self::default();
        let max_matches = env_parse("GROUNDING_MAX_MATCHES")?.unwrap_or(defaults.max_matches);
        if max_matches == 0 {
            return Err(GroundingError::InvalidSetting {
                name: "GROUNDING_MAX_MATCHES",
                value: "0".to_string(),
            });
        }
        Ok(Self {
            weights: ScoreWeights {
                whole_word: env_parse("GROUNDING_WHOLE_WORD_WEIGHT")?
                    .unwrap_or(defaults.weights.whole_word),
                partial: env_parse("GROUNDING_PARTIAL_WEIGHT")?.unwrap_or(defaults.weights.partial),
                heading: env_parse("GROUNDING_HEADING_WEIGHT")?.unwrap_or(defaults.weights.heading),
            },
            max_matches,
            min_sentence_chars: env_parse("GROUNDING_MIN_SENTENCE_CHARS")?
                .unwrap_or(defaults.min_sentence_chars),
        })
    }
}

/// A candidate sentence that matched at least one keyword.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ScoredSentence {
    pub sentence: String,
    pub score: u32,
    pub heading: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// The question contained no usable keywords.
    NeedsClarification,
    /// Keywords were found but no page sentence matched any of them.
    NotFound { keywords: Vec<String> },
    Found {
        /// Shared heading of every quoted sentence, when there is exactly one
        /// and it isn't the default heading.
        attribution: Option<String>,
        keywords: Vec<String>,
        matches: Vec<ScoredSentence>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnswerOutcome {
    Found,
    NotFound,
    NeedsClarification,
}

impl Answer {
    pub fn outcome(&self) -> AnswerOutcome {
        match self {
            Answer::NeedsClarification => AnswerOutcome::NeedsClarification,
            Answer::NotFound { .. } => AnswerOutcome::NotFound,
            Answer::Found { .. } => AnswerOutcome::Found,
        }
    }

    pub fn keywords(&self) -> &[String] {
        match self {
            Answer::NeedsClarification => &[],
            Answer::NotFound { keywords } | Answer::Found { keywords, .. } => keywords,
        }
    }

    pub fn matches(&self) -> &[ScoredSentence] {
        match self {
            Answer::Found { matches, .. } => matches,
            _ => &[],
        }
    }

    /// The reply shown to the user.
    pub fn render(&self) -> String {
        match self {
            Answer::NeedsClarification => CLARIFICATION_MESSAGE.to_string(),
            Answer::NotFound { keywords } => not_found_message(keywords),
            Answer::Found {
                attribution,
                matches,
                ..
            } => {
                let mut out = String::new();
                if let Some(heading) = attribution {
                    out.push_str(&format!("From \"{heading}\":\n\n"));
                }
                for m in matches {
                    out.push_str(&format!("• {}.\n", m.sentence));
                }
                out.trim_end().to_string()
            }
        }
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

pub fn not_found_message(keywords: &[String]) -> String {
    format!(
        "I couldn't find information about \"{}\" on this page. This might not be covered in the current page content.",
        keywords.join(", ")
    )
}

/// Extractive answer generator over page sections.
#[derive(Debug, Clone, Default)]
pub struct AnswerEngine {
    config: AnswerConfig,
}

impl AnswerEngine {
    /// `max_matches` is raised to 1 if it is 0.
    pub fn new(mut config: AnswerConfig) -> Self {
        config.max_matches = config.max_matches.max(1);
        Self { config }
    }

    pub fn config(&self) -> &AnswerConfig {
        &self.config
    }

    /// Answer `question` from the sections `source` yields right now.
    pub fn answer(&self, question: &str, source: &dyn SectionSource) -> Answer {
        let sections = source.sections();
        let keywords = extract_keywords(question);
        if keywords.is_empty() {
            debug!(sections = sections.len(), "question has no keywords");
            return Answer::NeedsClarification;
        }

        let mut scored = Vec::new();
        for section in &sections {
            for piece in SENTENCE_BREAK.split(&section.content) {
                let sentence = piece.trim();
                if sentence.chars().count() <= self.config.min_sentence_chars {
                    continue;
                }
                let score =
                    score_sentence(sentence, &keywords, &section.heading, &self.config.weights);
                if score > 0 {
                    scored.push(ScoredSentence {
                        sentence: sentence.to_string(),
                        score,
                        heading: section.heading.clone(),
                    });
                }
            }
        }

        debug!(
            sections = sections.len(),
            keywords = keywords.len(),
            candidates = scored.len(),
            "scored page sentences"
        );

        if scored.is_empty() {
            return Answer::NotFound { keywords };
        }

        // Stable: equal scores stay in document order.
        scored.sort_by(|a, b| b.score.cmp(&a.score));
        scored.truncate(self.config.max_matches);

        let attribution = scored.first().and_then(|first| {
            let heading = &first.heading;
            (heading != DEFAULT_HEADING && scored.iter().all(|m| &m.heading == heading))
                .then(|| heading.clone())
        });

        Answer::Found {
            attribution,
            keywords,
            matches: scored,
        }
    }

    /// Convenience wrapper returning the rendered reply.
    pub fn generate_answer(&self, question: &str, source: &dyn SectionSource) -> String {
        self.answer(question, source).render()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::HtmlPage;
    use crate::sections::Section;

    fn office_hours_page() -> Vec<Section> {
        vec![Section::new(
            "Office Hours",
            "Dr. Smith holds office hours on Tuesday and Thursday from 2 to 4 PM. Email is preferred for scheduling.",
        )]
    }

    #[test]
    fn office_hours_question_quotes_best_sentence_first() {
        let engine = AnswerEngine::default();
        let answer = engine.answer("When are Dr. Smith's office hours?", &office_hours_page());

        assert_eq!(answer.keywords(), ["smith", "office", "hours"]);
        let matches = answer.matches();
        assert_eq!(
            matches[0].sentence,
            "Smith holds office hours on Tuesday and Thursday from 2 to 4 PM"
        );
        assert_eq!(matches[0].score, 13);
        assert!(matches.iter().skip(1).all(|m| m.score < matches[0].score));

        let rendered = answer.render();
        assert!(rendered.starts_with("From \"Office Hours\":\n\n• Smith holds office hours"));
    }

    #[test]
    fn unmatched_question_names_keywords() {
        let engine = AnswerEngine::default();
        let answer = engine.answer("What is the capital of France?", &office_hours_page());
        assert_eq!(
            answer,
            Answer::NotFound {
                keywords: vec!["capital".to_string(), "france".to_string()]
            }
        );
        let rendered = answer.render();
        assert!(rendered.contains("\"capital, france\""));
        assert_ne!(rendered, CLARIFICATION_MESSAGE);
    }

    #[test]
    fn degenerate_questions_ask_for_clarification() {
        let engine = AnswerEngine::default();
        for question in ["", "   ", "please help me", "what is it?", "a an to"] {
            assert_eq!(
                engine.generate_answer(question, &office_hours_page()),
                CLARIFICATION_MESSAGE,
                "question {question:?}"
            );
        }
        let empty: Vec<Section> = Vec::new();
        assert_eq!(engine.generate_answer("", &empty), CLARIFICATION_MESSAGE);
    }

    #[test]
    fn at_most_three_bullets() {
        let content = (1..=6)
            .map(|i| format!("Exam number {i} takes place in the main hall"))
            .collect::<Vec<_>>()
            .join(". ");
        let page = vec![Section::new("Exams", content)];
        let engine = AnswerEngine::default();

        let rendered = engine.generate_answer("exam hall", &page);
        assert_eq!(rendered.lines().filter(|l| l.starts_with("• ")).count(), 3);
        assert!(rendered.contains("• Exam number 1 takes place in the main hall."));
        assert!(rendered.contains("• Exam number 3 takes place in the main hall."));
        assert!(!rendered.contains("number 4"));
    }

    #[test]
    fn attribution_only_for_a_single_named_heading() {
        let engine = AnswerEngine::default();

        let mixed = vec![
            Section::new("Grading", "Final grades are published after the exam week ends."),
            Section::new("Attendance", "Attendance counts toward final grades in every course."),
        ];
        let rendered = engine.generate_answer("final grades", &mixed);
        assert!(!rendered.starts_with("From"));
        assert!(rendered.starts_with("• "));

        let default_only = vec![Section::new(
            DEFAULT_HEADING,
            "Final grades are published after the exam week ends.",
        )];
        let rendered = engine.generate_answer("final grades", &default_only);
        assert_eq!(rendered, "• Final grades are published after the exam week ends.");
    }

    #[test]
    fn ties_keep_document_order() {
        let page = vec![
            Section::new("Rooms", "Room assignments for lab alpha are fixed."),
            Section::new("Rooms", "Room assignments for lab beta are fixed."),
        ];
        let answer = AnswerEngine::default().answer("room assignments", &page);
        let sentences: Vec<&str> = answer.matches().iter().map(|m| m.sentence.as_str()).collect();
        assert_eq!(
            sentences,
            vec![
                "Room assignments for lab alpha are fixed",
                "Room assignments for lab beta are fixed"
            ]
        );
    }

    #[test]
    fn short_fragments_are_ignored() {
        let page = vec![Section::new("Notes", "Labs end. Labs! Lab times vary by week and room.")];
        let answer = AnswerEngine::default().answer("lab", &page);
        assert_eq!(answer.matches().len(), 1);
        assert_eq!(answer.matches()[0].sentence, "Lab times vary by week and room");
    }

    #[test]
    fn answers_from_html_snapshot() {
        let page = HtmlPage::new(
            r#"<body>
                <h2>Enrollment Verification</h2>
                <p>Students can verify enrollment from the department office after registration closes.</p>
                <div data-chatbot="true"><p>Enrollment questions? Ask the assistant anything at all.</p></div>
            </body>"#,
        );
        let rendered = AnswerEngine::default().generate_answer("verify enrollment", &page);
        assert_eq!(
            rendered,
            "From \"Enrollment Verification\":\n\n\
             • Enrollment Verification Students can verify enrollment from the department office after registration closes."
        );
    }

    #[test]
    fn configurable_cap_and_threshold() {
        let engine = AnswerEngine::new(AnswerConfig {
            max_matches: 1,
            min_sentence_chars: 5,
            ..AnswerConfig::default()
        });
        let page = vec![Section::new("Labs", "Lab one. Lab two runs late.")];
        let answer = engine.answer("lab", &page);
        assert_eq!(answer.matches().len(), 1);
        assert_eq!(answer.matches()[0].sentence, "Lab one");
    }

    #[test]
    fn zero_cap_still_quotes_the_best_sentence() {
        let engine = AnswerEngine::new(AnswerConfig {
            max_matches: 0,
            ..AnswerConfig::default()
        });
        assert_eq!(engine.config().max_matches, 1);

        let page = vec![Section::new("Labs", "Lab times vary by week and room.")];
        assert_eq!(
            engine.generate_answer("lab times", &page),
            "From \"Labs\":\n\n• Lab times vary by week and room."
        );
    }
}
