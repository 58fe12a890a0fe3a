//! In-memory registry of chat sessions.
//!
//! Transcripts live only as long as the process; nothing is persisted. A
//! session unused for longer than the TTL is evicted on the next `start`,
//! `get` or `len`.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::debug;

use page_grounding::answer::{AnswerConfig, AnswerEngine};
use page_grounding::conversation::Conversation;

/// Default idle lifetime of a session (one day).
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(86_400);

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(0);

pub type ConversationId = String;

struct Session {
    conversation: Arc<Conversation>,
    last_used: Instant,
}

#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<ConversationId, Session>>>,
    answer: AnswerConfig,
    reply_delay: Duration,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(answer: AnswerConfig, reply_delay: Duration, ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            answer,
            reply_delay,
            ttl,
        }
    }

    pub async fn start(&self) -> ConversationId {
        let id = new_conversation_id();
        let engine = AnswerEngine::new(self.answer.clone());
        let conversation = Conversation::new(engine, self.reply_delay);

        let mut sessions = self.sessions.write().await;
        self.evict_expired(&mut sessions);
        sessions.insert(
            id.clone(),
            Session {
                conversation: Arc::new(conversation),
                last_used: Instant::now(),
            },
        );
        id
    }

    /// Look up a live session and mark it used.
    pub async fn get(&self, id: &str) -> Option<Arc<Conversation>> {
        let mut sessions = self.sessions.write().await;
        self.evict_expired(&mut sessions);
        let session = sessions.get_mut(id)?;
        session.last_used = Instant::now();
        Some(Arc::clone(&session.conversation))
    }

    /// Returns `false` when the id was unknown or already expired.
    pub async fn end(&self, id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        self.evict_expired(&mut sessions);
        sessions.remove(id).is_some()
    }

    pub async fn len(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        self.evict_expired(&mut sessions);
        sessions.len()
    }

    fn evict_expired(&self, sessions: &mut HashMap<ConversationId, Session>) {
        let before = sessions.len();
        sessions.retain(|_, session| session.last_used.elapsed() <= self.ttl);
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!(evicted, remaining = sessions.len(), "expired idle conversations");
        }
    }
}

fn new_conversation_id() -> ConversationId {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0));
    let counter = SESSION_COUNTER.fetch_add(1, Ordering::Relaxed);

    let mut h = Sha256::new();
    h.update(now.as_nanos().to_le_bytes());
    h.update(std::process::id().to_le_bytes());
    h.update(counter.to_le_bytes());
    let digest = h.finalize();
    digest[..16].iter().map(|b| format!("{b:02x}")).collect()
}
