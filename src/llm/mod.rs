pub mod gemini;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use self::gemini::GeminiClient;
use crate::error::CompletionError;
use crate::models::message::Message;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Everything one completion call needs. The key travels with the request
/// because it is widget configuration, not client configuration.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub api_key: Option<&'a str>,
    pub system_context: Option<&'a str>,
    pub history: &'a [Message],
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Single attempt; returns the first candidate's first text fragment.
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, CompletionError>;

    fn model(&self) -> &str;
}

#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn CompletionClient>, CompletionError> {
    let client = GeminiClient::from_config(config)?;
    Ok(Arc::new(client))
}
