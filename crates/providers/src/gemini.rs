//! Google Gemini provider (Generative Language API, `generateContent`).
//!
//! The persona instruction goes into `systemInstruction`; history turns map to
//! `user`/`model` contents ahead of the new user text. The key is sent in the
//! `x-goog-api-key` header so it never appears in URLs or logs.

use askdesk_core::message::Role;
use askdesk_core::provider::{CompletionRequest, CompletionResponse, Usage};
use askdesk_core::CompletionError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::http;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client: http::build_client(timeout)?,
        })
    }

    /// Point at a different endpoint (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn to_api_request(request: &CompletionRequest) -> GeminiRequest<'_> {
        let mut contents: Vec<GeminiContent<'_>> = request
            .history
            .iter()
            .map(|turn| GeminiContent {
                role: match turn.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                },
                parts: vec![GeminiPart { text: &turn.text }],
            })
            .collect();
        contents.push(GeminiContent {
            role: "user",
            parts: vec![GeminiPart {
                text: &request.user_text,
            }],
        });

        GeminiRequest {
            system_instruction: GeminiSystemInstruction {
                parts: vec![GeminiPart {
                    text: &request.instruction,
                }],
            },
            contents,
            generation_config: GeminiGenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        }
    }
}

#[async_trait]
impl askdesk_core::Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, CompletionError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, request.model);

        debug!(
            model = %request.model,
            history = request.history.len(),
            "Sending Gemini request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::to_api_request(&request))
            .send()
            .await
            .map_err(|e| http::network_error("gemini", e))?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let body = response.text().await.unwrap_or_default();
            return Err(http::classify_status("gemini", status, &headers, &body));
        }

        let api_response: GeminiResponse = response.json().await.map_err(|e| {
            CompletionError::Transient(format!("failed to parse Gemini response: {e}"))
        })?;

        let text = api_response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .filter(|t| !t.trim().is_empty());

        let Some(text) = text else {
            let reason = api_response
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates".into());
            warn!(reason = %reason, "Gemini returned no usable candidate");
            return Err(CompletionError::Transient(format!(
                "no candidates returned ({reason})"
            )));
        };

        let usage = api_response.usage_metadata.map(|u| Usage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        });

        Ok(CompletionResponse {
            text,
            model: api_response.model_version.unwrap_or(request.model),
            usage,
        })
    }

    async fn health_check(&self) -> std::result::Result<bool, CompletionError> {
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| http::network_error("gemini", e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(true);
        }

        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        match http::classify_status("gemini", status, &headers, &body) {
            err @ CompletionError::Unauthorized(_) => Err(err),
            _ => Ok(false),
        }
    }
}

// --- Gemini API types (internal) ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    system_instruction: GeminiSystemInstruction<'a>,
    contents: Vec<GeminiContent<'a>>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize)]
struct GeminiSystemInstruction<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    role: &'a str,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    prompt_feedback: Option<GeminiPromptFeedback>,
    usage_metadata: Option<GeminiUsage>,
    model_version: Option<String>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::test_server;
    use askdesk_core::message::Turn;
    use askdesk_core::Provider;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;

    fn provider(base_url: &str) -> GeminiProvider {
        GeminiProvider::new("AIza-test", Duration::from_secs(5))
            .unwrap()
            .with_base_url(base_url)
    }

    #[test]
    fn request_shape() {
        let request = CompletionRequest::new("gemini-2.5-flash", "You are the EIT assistant.", "Fees?")
            .with_history(&[Turn::user("Hi"), Turn::assistant("Hello!")])
            .with_max_tokens(Some(512));
        let body = serde_json::to_value(GeminiProvider::to_api_request(&request)).unwrap();

        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            "You are the EIT assistant."
        );
        let roles: Vec<_> = body["contents"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["role"].as_str().unwrap())
            .collect();
        assert_eq!(roles, ["user", "model", "user"]);
        assert_eq!(body["contents"][2]["parts"][0]["text"], "Fees?");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 512);
    }

    #[test]
    fn max_tokens_omitted_when_unset() {
        let request = CompletionRequest::new("m", "i", "q");
        let body = serde_json::to_value(GeminiProvider::to_api_request(&request)).unwrap();
        assert!(body["generationConfig"].get("maxOutputTokens").is_none());
    }

    #[tokio::test]
    async fn successful_completion_joins_parts() {
        let router = Router::new().route(
            "/models/{call}",
            post(|headers: HeaderMap| async move {
                assert_eq!(headers["x-goog-api-key"], "AIza-test");
                Json(json!({
                    "candidates": [{"content": {"role": "model", "parts": [
                        {"text": "Tuition is "}, {"text": "INR 1,50,000."}
                    ]}}],
                    "usageMetadata": {"promptTokenCount": 100, "candidatesTokenCount": 6, "totalTokenCount": 106},
                    "modelVersion": "gemini-2.5-flash-001"
                }))
            }),
        );
        let base = test_server::spawn(router).await;

        let response = provider(&base)
            .complete(CompletionRequest::new("gemini-2.5-flash", "persona", "fees?"))
            .await
            .unwrap();
        assert_eq!(response.text, "Tuition is INR 1,50,000.");
        assert_eq!(response.model, "gemini-2.5-flash-001");
        assert_eq!(response.usage.unwrap().total_tokens, 106);
    }

    #[tokio::test]
    async fn quota_and_key_errors_are_classified() {
        let router = Router::new()
            .route(
                "/quota/models/{call}",
                post(|| async {
                    (
                        StatusCode::TOO_MANY_REQUESTS,
                        Json(json!({"error": {"code": 429, "status": "RESOURCE_EXHAUSTED",
                            "details": [{"retryDelay": "30s"}]}})),
                    )
                }),
            )
            .route(
                "/badkey/models/{call}",
                post(|| async {
                    (
                        StatusCode::BAD_REQUEST,
                        Json(json!({"error": {"code": 400, "status": "INVALID_ARGUMENT",
                            "details": [{"reason": "API_KEY_INVALID"}]}})),
                    )
                }),
            );
        let base = test_server::spawn(router).await;
        let request = CompletionRequest::new("gemini-2.5-flash", "i", "q");

        let err = provider(&format!("{base}/quota"))
            .complete(request.clone())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CompletionError::QuotaExceeded {
                retry_after_secs: Some(30)
            }
        );

        let err = provider(&format!("{base}/badkey"))
            .complete(request)
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn blocked_prompt_is_transient() {
        let router = Router::new().route(
            "/models/{call}",
            post(|| async { Json(json!({"promptFeedback": {"blockReason": "SAFETY"}})) }),
        );
        let base = test_server::spawn(router).await;

        let err = provider(&base)
            .complete(CompletionRequest::new("gemini-2.5-flash", "i", "q"))
            .await
            .unwrap_err();
        let CompletionError::Transient(msg) = err else {
            panic!("expected transient, got {err:?}");
        };
        assert!(msg.contains("SAFETY"));
    }

    #[tokio::test]
    async fn health_check_probes_models() {
        let router = Router::new()
            .route("/ok/models", get(|| async { Json(json!({"models": []})) }))
            .route("/bad/models", get(|| async { StatusCode::UNAUTHORIZED }))
            .route("/down/models", get(|| async { StatusCode::BAD_GATEWAY }));
        let base = test_server::spawn(router).await;

        assert!(provider(&format!("{base}/ok")).health_check().await.unwrap());
        assert!(!provider(&format!("{base}/down")).health_check().await.unwrap());
        assert!(matches!(
            provider(&format!("{base}/bad")).health_check().await,
            Err(CompletionError::Unauthorized(_))
        ));
    }
}
