//! Tutoring oracle: the LLM behind the room's tutor and solution checks.
//!
//! DESIGN
//! ======
//! Callers depend on the [`TutoringOracle`] trait only. The production
//! implementation talks to the Anthropic Messages API; tests substitute
//! scripted oracles. Every failure is an [`OracleError`] so the verifier can
//! turn it into an "unsolved" record instead of wedging the room.

pub mod anthropic;

pub use anthropic::AnthropicOracle;

use canvas::render::raster::Snapshot;
use serde::{Deserialize, Serialize};

use crate::frame::ErrorCode;

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("oracle not configured")]
    Unavailable,

    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    #[error("API request failed: {0}")]
    ApiRequest(String),

    #[error("API response error: status {status}")]
    ApiResponse { status: u16, body: String },

    #[error("API response parse failed: {0}")]
    ApiParse(String),

    /// The model answered, but not with a verdict we can read.
    #[error("malformed verdict: {0}")]
    MalformedVerdict(String),
}

impl ErrorCode for OracleError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Unavailable => "E_ORACLE_UNAVAILABLE",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
            Self::ApiRequest(_) => "E_API_REQUEST",
            Self::ApiResponse { .. } => "E_API_RESPONSE",
            Self::ApiParse(_) => "E_API_PARSE",
            Self::MalformedVerdict(_) => "E_MALFORMED_VERDICT",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::ApiRequest(_) | Self::ApiResponse { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// REQUESTS
// =============================================================================

/// One line of the room chat, as stored under `chat/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatLine {
    pub author: String,
    pub content: String,
    /// `true` for lines the tutor itself wrote.
    #[serde(default)]
    pub from_tutor: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TutorRequest {
    pub problem: String,
    pub history: Vec<ChatLine>,
    pub image: Option<Snapshot>,
    pub members: Vec<String>,
    /// e.g. "Dana joined the room."
    pub member_change: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct VerifyRequest {
    pub problem: String,
    pub history: Vec<ChatLine>,
    pub image: Option<Snapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TutorReply {
    pub content: String,
}

/// Outcome of a solution check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub solved: bool,
    #[serde(default)]
    pub needs_whiteboard: bool,
    #[serde(default)]
    pub message: String,
}

#[async_trait::async_trait]
pub trait TutoringOracle: Send + Sync {
    async fn ask_tutor(&self, request: TutorRequest) -> Result<TutorReply, OracleError>;

    async fn verify(&self, request: VerifyRequest) -> Result<Verdict, OracleError>;
}

/// Stand-in used when no API key is configured.
pub struct UnavailableOracle;

#[async_trait::async_trait]
impl TutoringOracle for UnavailableOracle {
    async fn ask_tutor(&self, _request: TutorRequest) -> Result<TutorReply, OracleError> {
        Err(OracleError::Unavailable)
    }

    async fn verify(&self, _request: VerifyRequest) -> Result<Verdict, OracleError> {
        Err(OracleError::Unavailable)
    }
}
