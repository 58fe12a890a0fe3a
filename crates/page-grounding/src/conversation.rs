use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::answer::AnswerEngine;
use crate::sections::SectionSource;

pub const GREETING: &str =
    "👋 Hi! I can answer questions about what's on this page. Ask me anything!";

pub const DEFAULT_REPLY_DELAY: Duration = Duration::from_millis(400);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Bot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn bot(content: impl Into<String>) -> Self {
        Self {
            role: Role::Bot,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversationError {
    #[error("message must not be empty")]
    EmptyInput,

    #[error("a previous question is still being answered")]
    Busy,
}

/// One chat session: an append-only transcript plus the submit gate.
///
/// At most one submission is in flight at a time; a second `submit` while one
/// is pending is rejected with [`ConversationError::Busy`] and leaves the
/// transcript untouched.
pub struct Conversation {
    engine: AnswerEngine,
    reply_delay: Duration,
    transcript: Mutex<Vec<ChatMessage>>,
    pending: AtomicBool,
}

impl Conversation {
    pub fn new(engine: AnswerEngine, reply_delay: Duration) -> Self {
        Self {
            engine,
            reply_delay,
            transcript: Mutex::new(vec![ChatMessage::bot(GREETING)]),
            pending: AtomicBool::new(false),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    pub async fn transcript(&self) -> Vec<ChatMessage> {
        self.transcript.lock().await.clone()
    }

    /// Record the question, answer it from `source`, record and return the reply.
    ///
    /// The page is read after the reply delay, so the answer reflects the page
    /// as it is when the reply is produced.
    pub async fn submit(
        &self,
        input: &str,
        source: &(dyn SectionSource + Sync),
    ) -> Result<ChatMessage, ConversationError> {
        let question = input.trim();
        if question.is_empty() {
            return Err(ConversationError::EmptyInput);
        }

        if self
            .pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ConversationError::Busy);
        }
        let _gate = PendingGuard(&self.pending);

        self.transcript
            .lock()
            .await
            .push(ChatMessage::user(question));

        if !self.reply_delay.is_zero() {
            tokio::time::sleep(self.reply_delay).await;
        }

        let answer = self.engine.answer(question, source);
        debug!(outcome = ?answer.outcome(), "answered chat question");
        let reply = ChatMessage::bot(answer.render());

        self.transcript.lock().await.push(reply.clone());
        Ok(reply)
    }
}

/// Clears the in-flight flag when a submission finishes or is dropped.
struct PendingGuard<'a>(&'a AtomicBool);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
