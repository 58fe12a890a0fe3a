/// MCP server exposing the page assistant.
///
/// Tools:
/// - `answer_question`: extractive answer from an HTML snapshot
/// - `extract_sections`: the heading/content sections a snapshot yields
/// - `start_conversation` / `send_message` / `get_transcript` / `end_conversation`
/// - `list_models` / `ask_model_about_page`: answers through the local model
use std::sync::Arc;

use rmcp::{
    Json, ServerHandler,
    handler::server::router::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::*,
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use page_grounding::answer::{AnswerEngine, AnswerOutcome, ScoredSentence, CLARIFICATION_MESSAGE};
use page_grounding::conversation::{ChatMessage, Conversation};
use page_grounding::html::HtmlPage;
use page_grounding::openai::{ModelListResponse, OpenAiClient};
use page_grounding::prompt::build_grounded_messages;
use page_grounding::rate_limit::RateLimiter;
use page_grounding::sections::{Section, SectionSource};

use crate::sessions::{ConversationId, SessionStore};

#[derive(Clone)]
pub struct PageAssistantServer {
    engine: AnswerEngine,
    sessions: SessionStore,
    openai: Arc<OpenAiClient>,
    limiter: Option<RateLimiter>,
    context_max_chars: usize,
    tool_router: ToolRouter<PageAssistantServer>,
}

impl PageAssistantServer {
    pub fn new(
        engine: AnswerEngine,
        sessions: SessionStore,
        openai: Arc<OpenAiClient>,
        limiter: Option<RateLimiter>,
        context_max_chars: usize,
    ) -> Self {
        Self {
            engine,
            sessions,
            openai,
            limiter,
            context_max_chars,
            tool_router: Self::tool_router(),
        }
    }

    async fn gate(&self) -> Result<(), String> {
        if let Some(limiter) = &self.limiter {
            limiter.check().await?;
        }
        Ok(())
    }

    async fn conversation(&self, id: &str) -> Result<Arc<Conversation>, String> {
        self.sessions
            .get(id)
            .await
            .ok_or_else(|| format!("unknown conversation_id: {id}"))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct AnswerQuestionParams {
    /// Free-text question about the page.
    question: String,
    /// HTML snapshot of the page as currently rendered.
    html: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ExtractSectionsParams {
    html: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SendMessageParams {
    conversation_id: ConversationId,
    question: String,
    html: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ConversationParams {
    conversation_id: ConversationId,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct AskModelAboutPageParams {
    /// Local model ID, e.g. "llama3".
    model: String,
    question: String,
    html: String,
}

#[derive(Debug, Serialize, JsonSchema)]
struct AnswerResponse {
    answer: String,
    outcome: AnswerOutcome,
    keywords: Vec<String>,
    matches: Vec<ScoredSentence>,
}

#[derive(Debug, Serialize, JsonSchema)]
struct SectionsResponse {
    sections: Vec<Section>,
}

#[derive(Debug, Serialize, JsonSchema)]
struct StartConversationResponse {
    conversation_id: ConversationId,
}

#[derive(Debug, Serialize, JsonSchema)]
struct ReplyResponse {
    reply: String,
}

#[derive(Debug, Serialize, JsonSchema)]
struct TranscriptResponse {
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, JsonSchema)]
struct OkResponse {
    ok: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
enum AnswerSource {
    Model,
    PageMatch,
}

#[derive(Debug, Serialize, JsonSchema)]
struct ModelAnswerResponse {
    text: String,
    source: AnswerSource,
    /// Set when the model call failed and the page-match answer was used instead.
    fallback_reason: Option<String>,
}

#[tool_router]
impl PageAssistantServer {
    #[tool(description = "Answer a question from the visible text of an HTML page snapshot. Returns the reply plus the keywords searched and the matched sentences.")]
    async fn answer_question(
        &self,
        Parameters(params): Parameters<AnswerQuestionParams>,
    ) -> Result<Json<AnswerResponse>, String> {
        let page = HtmlPage::new(params.html);
        let answer = self.engine.answer(&params.question, &page);
        Ok(Json(AnswerResponse {
            answer: answer.render(),
            outcome: answer.outcome(),
            keywords: answer.keywords().to_vec(),
            matches: answer.matches().to_vec(),
        }))
    }

    #[tool(description = "Extract the visible text of an HTML page snapshot as sections grouped under their nearest preceding heading.")]
    async fn extract_sections(
        &self,
        Parameters(params): Parameters<ExtractSectionsParams>,
    ) -> Result<Json<SectionsResponse>, String> {
        let sections = HtmlPage::new(params.html).sections();
        Ok(Json(SectionsResponse { sections }))
    }

    #[tool(description = "Start a chat session and return its conversation_id. The transcript starts with the assistant greeting.")]
    async fn start_conversation(&self) -> Result<Json<StartConversationResponse>, String> {
        let id = self.sessions.start().await;
        let active = self.sessions.len().await;
        info!(
            conversation_id = %id,
            active = active,
            "conversation started"
        );
        Ok(Json(StartConversationResponse { conversation_id: id }))
    }

    #[tool(description = "Send a question in a chat session. The question and the page-grounded reply are appended to the transcript; only one question per session may be pending at a time.")]
    async fn send_message(
        &self,
        Parameters(params): Parameters<SendMessageParams>,
    ) -> Result<Json<ReplyResponse>, String> {
        let conversation = self.conversation(&params.conversation_id).await?;
        let page = HtmlPage::new(params.html);
        let reply = conversation
            .submit(&params.question, &page)
            .await
            .map_err(|e| format!("send_message failed: {e}"))?;
        Ok(Json(ReplyResponse {
            reply: reply.content,
        }))
    }

    #[tool(description = "Get the full transcript of a chat session in order.")]
    async fn get_transcript(
        &self,
        Parameters(params): Parameters<ConversationParams>,
    ) -> Result<Json<TranscriptResponse>, String> {
        let conversation = self.conversation(&params.conversation_id).await?;
        Ok(Json(TranscriptResponse {
            messages: conversation.transcript().await,
        }))
    }

    #[tool(description = "End a chat session and discard its transcript.")]
    async fn end_conversation(
        &self,
        Parameters(params): Parameters<ConversationParams>,
    ) -> Result<Json<OkResponse>, String> {
        let ok = self.sessions.end(&params.conversation_id).await;
        Ok(Json(OkResponse { ok }))
    }

    #[tool(description = "List models available from the local model host (GET /v1/models).")]
    async fn list_models(&self) -> Result<Json<ModelListResponse>, String> {
        self.gate().await?;
        let models = self
            .openai
            .list_models()
            .await
            .map_err(|e| format!("list_models failed: {e}"))?;
        Ok(Json(models))
    }

    #[tool(description = "Answer a question with a local model grounded in the page's visible text. Falls back to the page-match answer if the model call fails.")]
    async fn ask_model_about_page(
        &self,
        Parameters(params): Parameters<AskModelAboutPageParams>,
    ) -> Result<Json<ModelAnswerResponse>, String> {
        let model = params.model.trim().to_string();
        if model.is_empty() {
            return Err("model must not be empty".to_string());
        }
        let question = params.question.trim();
        if question.is_empty() {
            return Ok(Json(ModelAnswerResponse {
                text: CLARIFICATION_MESSAGE.to_string(),
                source: AnswerSource::PageMatch,
                fallback_reason: None,
            }));
        }
        self.gate().await?;

        let sections = HtmlPage::new(params.html).sections();
        let messages = build_grounded_messages(question, &sections, self.context_max_chars);

        match self.openai.complete_text(&model, messages).await {
            Ok(text) => Ok(Json(ModelAnswerResponse {
                text,
                source: AnswerSource::Model,
                fallback_reason: None,
            })),
            Err(e) => {
                warn!(model = %model, error = %e, "model answer failed, using page match");
                Ok(Json(ModelAnswerResponse {
                    text: self.engine.generate_answer(question, &sections),
                    source: AnswerSource::PageMatch,
                    fallback_reason: Some(e.to_string()),
                }))
            }
        }
    }
}

#[tool_handler]
impl ServerHandler for PageAssistantServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_06_18,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "page-assistant".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Page assistant MCP server. Pass the page's HTML snapshot with every call. Use \
answer_question for a one-off grounded answer, or start_conversation/send_message/get_transcript/\
end_conversation for a chat session. ask_model_about_page answers through a local model and falls \
back to page matching when the model is unavailable."
                    .to_string(),
            ),
        }
    }
}
