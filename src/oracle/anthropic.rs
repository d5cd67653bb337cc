//! Anthropic Messages API oracle.
//!
//! Thin HTTP wrapper for `/v1/messages`. Request building and response
//! parsing are pure functions so they can be tested without the network.

#[cfg(test)]
#[path = "anthropic_test.rs"]
mod tests;

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use canvas::render::raster::Snapshot;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{ChatLine, OracleError, TutorReply, TutorRequest, TutoringOracle, Verdict, VerifyRequest};
use crate::config::OracleConfig;

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const TUTOR_MAX_TOKENS: u32 = 1024;
const VERIFY_MAX_TOKENS: u32 = 512;
const HISTORY_LIMIT: usize = 20;

const TUTOR_SYSTEM: &str = "You are a Socratic tutor in a small study room. Guide the students toward the \
answer with questions and hints; never state the final answer outright.";

const VERIFY_SYSTEM: &str = "You check whether a study group has solved a problem. Reply with JSON only: \
{\"solved\": bool, \"needsWhiteboard\": bool, \"message\": string}. Set needsWhiteboard when the chat alone \
is not enough and you need to see their whiteboard work.";

// =============================================================================
// CLIENT
// =============================================================================

pub struct AnthropicOracle {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl AnthropicOracle {
    /// # Errors
    ///
    /// Returns [`OracleError::HttpClientBuild`] if the HTTP client fails to build.
    pub fn new(config: &OracleConfig) -> Result<Self, OracleError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| OracleError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, api_key: config.api_key.clone(), model: config.model.clone() })
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn send(&self, body: &ApiRequest<'_>) -> Result<String, OracleError> {
        let response = self
            .http
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|e| OracleError::ApiRequest(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| OracleError::ApiRequest(e.to_string()))?;
        if status != 200 {
            return Err(OracleError::ApiResponse { status, body: text });
        }
        parse_response(&text)
    }
}

#[async_trait::async_trait]
impl TutoringOracle for AnthropicOracle {
    async fn ask_tutor(&self, request: TutorRequest) -> Result<TutorReply, OracleError> {
        let system = tutor_system(&request.members, request.member_change.as_deref());
        let messages = vec![user_message(&request.problem, &request.history, request.image.as_ref())];
        let body = ApiRequest { model: &self.model, max_tokens: TUTOR_MAX_TOKENS, system: &system, messages };
        let content = self.send(&body).await?;
        info!(model = %self.model, chars = content.len(), "oracle: tutor replied");
        Ok(TutorReply { content })
    }

    async fn verify(&self, request: VerifyRequest) -> Result<Verdict, OracleError> {
        let messages = vec![user_message(&request.problem, &request.history, request.image.as_ref())];
        let body = ApiRequest { model: &self.model, max_tokens: VERIFY_MAX_TOKENS, system: VERIFY_SYSTEM, messages };
        let text = self.send(&body).await?;
        let verdict = parse_verdict(&text)?;
        debug!(solved = verdict.solved, needs_whiteboard = verdict.needs_whiteboard, "oracle: verdict");
        Ok(verdict)
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<ApiMessage>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: Vec<RequestBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RequestBlock {
    Text { text: String },
    Image { source: ImageSource },
}

#[derive(Debug, Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: &'static str,
    data: String,
}

#[derive(Deserialize)]
struct ApiResponse {
    content: Vec<ResponseBlock>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

// =============================================================================
// BUILDING
// =============================================================================

fn tutor_system(members: &[String], member_change: Option<&str>) -> String {
    let mut system = TUTOR_SYSTEM.to_string();
    if !members.is_empty() {
        system.push_str(&format!("\nStudents present: {}.", members.join(", ")));
    }
    if let Some(change) = member_change {
        system.push_str(&format!("\n{change}"));
    }
    system
}

/// The whole exchange as one user turn: problem, recent chat, optional board.
fn user_message(problem: &str, history: &[ChatLine], image: Option<&Snapshot>) -> ApiMessage {
    let mut text = format!("Problem:\n{problem}\n");
    let start = history.len().saturating_sub(HISTORY_LIMIT);
    if start < history.len() {
        text.push_str("\nConversation:\n");
        for line in &history[start..] {
            let author = if line.from_tutor { "Tutor" } else { line.author.as_str() };
            text.push_str(&format!("{author}: {}\n", line.content));
        }
    }

    let mut content = Vec::new();
    if let Some(snapshot) = image {
        content.push(RequestBlock::Image {
            source: ImageSource { kind: "base64", media_type: "image/png", data: STANDARD.encode(&snapshot.png) },
        });
        text.push_str("\nThe attached image is the group's whiteboard.");
    }
    content.push(RequestBlock::Text { text });
    ApiMessage { role: "user", content }
}

// =============================================================================
// PARSING
// =============================================================================

/// Concatenated text blocks of a Messages API response.
fn parse_response(json: &str) -> Result<String, OracleError> {
    let api: ApiResponse = serde_json::from_str(json).map_err(|e| OracleError::ApiParse(e.to_string()))?;
    let text: Vec<String> = api
        .content
        .into_iter()
        .filter_map(|block| match block {
            ResponseBlock::Text { text } => Some(text),
            ResponseBlock::Other => None,
        })
        .collect();
    Ok(text.join("\n"))
}

/// Read the JSON verdict out of model text, tolerating prose or code fences
/// around the object.
fn parse_verdict(text: &str) -> Result<Verdict, OracleError> {
    let (Some(open), Some(close)) = (text.find('{'), text.rfind('}')) else {
        return Err(OracleError::MalformedVerdict(text.to_string()));
    };
    if close < open {
        return Err(OracleError::MalformedVerdict(text.to_string()));
    }
    serde_json::from_str(&text[open..=close]).map_err(|e| OracleError::MalformedVerdict(e.to_string()))
}
