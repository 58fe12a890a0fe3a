use crate::openai::Message;
use crate::sections::Section;

pub const DEFAULT_CONTEXT_MAX_CHARS: usize = 12_000;

const SYSTEM_PROMPT: &str = "You are a page assistant for a university department portal. \
Answer the user's question using only the page text provided. Quote or paraphrase the \
relevant lines and keep the answer short. If the page text does not contain the answer, \
say that the information is not on this page instead of guessing.";

/// Build the chat messages that ground a local model in the page text.
///
/// Sections are rendered as `## heading` blocks in document order until
/// `max_context_chars` is spent; the section that crosses the budget is cut
/// on a character boundary and the rest are left out.
pub fn build_grounded_messages(
    question: &str,
    sections: &[Section],
    max_context_chars: usize,
) -> Vec<Message> {
    let mut context = String::new();
    let mut remaining = max_context_chars;

    for section in sections {
        if remaining == 0 {
            break;
        }
        let block = format!("## {}\n{}\n\n", section.heading, section.content);
        let len = block.chars().count();
        if len <= remaining {
            context.push_str(&block);
            remaining -= len;
        } else {
            context.extend(block.chars().take(remaining));
            remaining = 0;
        }
    }

    let context = context.trim_end();
    let user = if context.is_empty() {
        format!("PAGE TEXT:\n(the page has no visible text)\n\nQUESTION:\n{}", question.trim())
    } else {
        format!("PAGE TEXT:\n{context}\n\nQUESTION:\n{}", question.trim())
    };

    vec![Message::system(SYSTEM_PROMPT), Message::user(user)]
}
