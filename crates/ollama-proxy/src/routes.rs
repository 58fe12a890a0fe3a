use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::TryStreamExt;
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{debug, warn};

use page_grounding::rate_limit::RateLimiter;

use crate::config::{Config, MAX_BODY_BYTES};
use crate::error::AppError;

#[derive(Clone)]
pub struct ProxyState {
    http: reqwest::Client,
    upstream_url: Arc<str>,
    timeout: Duration,
    limiter: Option<RateLimiter>,
}

impl ProxyState {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .user_agent("ollama-proxy")
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            upstream_url: Arc::from(config.upstream_url.as_str()),
            timeout: config.timeout,
            limiter: config.rate_limit_rps.map(RateLimiter::new),
        })
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    details: String,
}

pub fn router(state: ProxyState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/ollama-chat", post(ollama_chat))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// Forward a chat-completions body unchanged and hand back whatever the
/// model server answered, status included. `"stream": true` bodies are
/// relayed chunk by chunk.
async fn ollama_chat(
    State(state): State<ProxyState>,
    Json(body): Json<Value>,
) -> Result<Response, (StatusCode, Json<ErrorBody>)> {
    if let Some(limiter) = &state.limiter {
        limiter.check().await.map_err(too_many_requests)?;
    }

    let streaming = body.get("stream").and_then(Value::as_bool).unwrap_or(false);
    debug!(
        model = body.get("model").and_then(serde_json::Value::as_str).unwrap_or(""),
        streaming,
        "forwarding chat request"
    );

    let mut request = state.http.post(&*state.upstream_url).json(&body);
    if !streaming {
        request = request.timeout(state.timeout);
    }
    let upstream = request.send().await.map_err(proxy_error)?;

    if streaming {
        return relay_stream(upstream);
    }

    let status = upstream.status();
    let payload: Value = upstream.json().await.map_err(proxy_error)?;
    if !status.is_success() {
        warn!(status = %status, "upstream returned an error status");
    }
    Ok((status, Json(payload)).into_response())
}

fn relay_stream(upstream: reqwest::Response) -> Result<Response, (StatusCode, Json<ErrorBody>)> {
    let status = upstream.status();
    let content_type = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("text/event-stream"));

    let chunks = upstream
        .bytes_stream()
        .inspect_err(|e| warn!(error = %e, "upstream stream interrupted"));

    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from_stream(chunks))
        .map_err(proxy_error)
}

fn proxy_error(err: impl std::fmt::Display) -> (StatusCode, Json<ErrorBody>) {
    warn!(error = %err, "proxy request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            error: "Proxy error",
            details: err.to_string(),
        }),
    )
}

fn too_many_requests(message: String) -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::TOO_MANY_REQUESTS,
        Json(ErrorBody {
            error: "Rate limit exceeded",
            details: message,
        }),
    )
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use serde_json::json;
    use tokio::net::TcpListener;

    use super::*;

    const SSE_BODY: &str =
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\ndata: [DONE]\n\n";

    async fn spawn(app: Router) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    /// Stand-in for the model server's chat-completions endpoint.
    async fn fake_completions(Json(body): Json<Value>) -> Response {
        if body["stream"] == true {
            return ([(header::CONTENT_TYPE, "text/event-stream")], SSE_BODY).into_response();
        }
        match body["model"].as_str() {
            Some("missing") => (
                StatusCode::NOT_FOUND,
                Json(json!({"error": {"message": "model \"missing\" not found"}})),
            )
                .into_response(),
            Some("plain") => "not json".into_response(),
            _ => {
                let question = body["messages"][0]["content"].as_str().unwrap_or("");
                let reply = format!("echo: {question}");
                Json(json!({
                    "choices": [{"message": {"role": "assistant", "content": reply}}]
                }))
                .into_response()
            }
        }
    }

    async fn spawn_upstream() -> String {
        let app = Router::new().route("/v1/chat/completions", post(fake_completions));
        let addr = spawn(app).await;
        format!("http://{addr}/v1/chat/completions")
    }

    async fn spawn_proxy(upstream_url: String, rate_limit_rps: Option<u32>) -> String {
        let config = Config {
            upstream_url,
            rate_limit_rps,
            ..Config::default()
        };
        let addr = spawn(router(ProxyState::new(&config).unwrap())).await;
        format!("http://{addr}")
    }

    fn chat_body(model: &str) -> Value {
        json!({
            "model": model,
            "messages": [{"role": "user", "content": "When are office hours?"}]
        })
    }

    #[tokio::test]
    async fn forwards_body_and_returns_upstream_json() {
        let proxy = spawn_proxy(spawn_upstream().await, None).await;
        let resp = reqwest::Client::new()
            .post(format!("{proxy}/api/ollama-chat"))
            .json(&chat_body("llama3"))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let payload: Value = resp.json().await.unwrap();
        assert_eq!(
            payload["choices"][0]["message"]["content"],
            "echo: When are office hours?"
        );
    }

    #[tokio::test]
    async fn upstream_error_status_is_passed_through() {
        let proxy = spawn_proxy(spawn_upstream().await, None).await;
        let resp = reqwest::Client::new()
            .post(format!("{proxy}/api/ollama-chat"))
            .json(&chat_body("missing"))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let payload: Value = resp.json().await.unwrap();
        assert_eq!(payload["error"]["message"], "model \"missing\" not found");
    }

    #[tokio::test]
    async fn unreachable_upstream_is_a_proxy_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let proxy = spawn_proxy(format!("http://{addr}/v1/chat/completions"), None).await;
        let resp = reqwest::Client::new()
            .post(format!("{proxy}/api/ollama-chat"))
            .json(&chat_body("llama3"))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let payload: Value = resp.json().await.unwrap();
        assert_eq!(payload["error"], "Proxy error");
        assert!(!payload["details"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_json_upstream_reply_is_a_proxy_error() {
        let proxy = spawn_proxy(spawn_upstream().await, None).await;
        let resp = reqwest::Client::new()
            .post(format!("{proxy}/api/ollama-chat"))
            .json(&chat_body("plain"))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let payload: Value = resp.json().await.unwrap();
        assert_eq!(payload["error"], "Proxy error");
    }

    #[tokio::test]
    async fn streaming_requests_are_relayed() {
        let proxy = spawn_proxy(spawn_upstream().await, None).await;
        let mut body = chat_body("llama3");
        body["stream"] = json!(true);

        let resp = reqwest::Client::new()
            .post(format!("{proxy}/api/ollama-chat"))
            .json(&body)
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/event-stream"
        );
        assert_eq!(resp.text().await.unwrap(), SSE_BODY);
    }

    #[tokio::test]
    async fn rate_limit_rejects_with_429() {
        let proxy = spawn_proxy(spawn_upstream().await, Some(1)).await;
        let client = reqwest::Client::new();
        let url = format!("{proxy}/api/ollama-chat");

        let first = client.post(&url).json(&chat_body("llama3")).send().await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = client.post(&url).json(&chat_body("llama3")).send().await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        let payload: Value = second.json().await.unwrap();
        assert_eq!(payload["error"], "Rate limit exceeded");
        assert!(payload["details"]
            .as_str()
            .unwrap()
            .starts_with("rate limit exceeded (RATE_LIMIT_RPS=1)"));
    }

    #[tokio::test]
    async fn cors_allows_any_origin_and_health_is_ok() {
        let proxy = spawn_proxy(spawn_upstream().await, None).await;
        let resp = reqwest::Client::new()
            .get(format!("{proxy}/healthz"))
            .header(header::ORIGIN, "http://portal.example.edu")
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "*"
        );
    }
}
