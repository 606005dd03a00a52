use async_trait::async_trait;
use log::{ debug, info };
use serde::{ Deserialize, Serialize };

use super::{ CompletionClient, CompletionRequest, LlmConfig, DEFAULT_BASE_URL, DEFAULT_MODEL };
use crate::error::CompletionError;
use crate::models::message::{ Part, Role };

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

// Role and parts only; the origin flag never leaves the widget.
#[derive(Serialize)]
struct Content<'a> {
    role: Role,
    parts: &'a [Part],
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

fn build_payload<'a>(request: &CompletionRequest<'a>) -> GenerateContentRequest<'a> {
    let system_instruction = request.system_context
        .filter(|ctx| !ctx.trim().is_empty())
        .map(|ctx| SystemInstruction { parts: vec![Part::text(ctx)] });

    let contents = request.history
        .iter()
        .map(|m| Content { role: m.role, parts: &m.parts })
        .collect();

    GenerateContentRequest { system_instruction, contents }
}

fn extract_text(body: &str) -> Result<String, CompletionError> {
    let parsed: GenerateContentResponse = serde_json::from_str(body)?;
    parsed.candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|content| content.parts.into_iter().find_map(|p| p.text))
        .filter(|text| !text.is_empty())
        .ok_or(CompletionError::EmptyResponse)
}

pub struct GeminiClient {
    http: reqwest::Client,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(
        model: Option<String>,
        base_url: Option<String>,
        http: reqwest::Client
    ) -> Self {
        let model = model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let base_url = base_url
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Self { http, model, base_url }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, CompletionError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        Ok(Self::new(config.model.clone(), config.base_url.clone(), http))
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url.trim_end_matches('/'), self.model)
    }
}

#[async_trait]
impl CompletionClient for GeminiClient {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, CompletionError> {
        let url = self.endpoint();
        info!(
            "GeminiClient::complete() → model={} messages={} context={}",
            self.model,
            request.history.len(),
            request.system_context.is_some()
        );

        let payload = build_payload(&request);
        let resp = self.http
            .post(&url)
            .query(&[("key", request.api_key.unwrap_or(""))])
            .json(&payload)
            .send().await?;

        let status = resp.status();
        let body = resp.text().await?;
        debug!("Gemini responded with {} ({} bytes)", status, body.len());

        if !status.is_success() {
            return Err(CompletionError::Status { status, body });
        }

        extract_text(&body)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::Message;
    use serde_json::json;

    #[test]
    fn test_payload_strips_origin_and_adds_context() {
        let history = vec![
            Message::local_user(vec![Part::text("hi")]),
            Message::local_model("hello").into_remote()
        ];
        let request = CompletionRequest {
            api_key: Some("k"),
            system_context: Some("be brief"),
            history: &history,
        };

        let value = serde_json::to_value(build_payload(&request)).unwrap();
        assert_eq!(
            value,
            json!({
                "system_instruction": {"parts": [{"text": "be brief"}]},
                "contents": [
                    {"role": "user", "parts": [{"text": "hi"}]},
                    {"role": "model", "parts": [{"text": "hello"}]}
                ]
            })
        );
    }

    #[test]
    fn test_payload_omits_blank_context() {
        let history = vec![Message::local_user(vec![Part::text("hi")])];
        let request = CompletionRequest { api_key: None, system_context: Some("  "), history: &history };
        let value = serde_json::to_value(build_payload(&request)).unwrap();
        assert!(value.get("system_instruction").is_none());
    }

    #[test]
    fn test_extract_first_candidate_text() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"T"},{"text":"U"}]}},{"content":{"parts":[{"text":"V"}]}}]}"#;
        assert_eq!(extract_text(body).unwrap(), "T");
    }

    #[test]
    fn test_extract_without_candidates_is_empty() {
        assert!(matches!(extract_text(r#"{"candidates":[]}"#), Err(CompletionError::EmptyResponse)));
        assert!(matches!(extract_text(r#"{}"#), Err(CompletionError::EmptyResponse)));
    }

    #[test]
    fn test_extract_garbage_is_malformed() {
        assert!(matches!(extract_text("not json"), Err(CompletionError::Malformed(_))));
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let client = GeminiClient::new(
            Some("m".into()),
            Some("http://localhost:1/v1beta/".into()),
            reqwest::Client::new()
        );
        assert_eq!(client.endpoint(), "http://localhost:1/v1beta/models/m:generateContent");
    }
}
