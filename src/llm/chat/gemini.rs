use async_trait::async_trait;
use log::info;
use serde::{ Deserialize, Serialize };
use std::error::Error as StdError;
use std::time::Duration;

use super::{ ChatClient, Completion };
use crate::error::LlmError;
use crate::llm::LlmConfig;
use crate::models::chat::{ Role, Turn };

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
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

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<GoogleCandidate>,
    prompt_feedback: Option<GooglePromptFeedback>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GoogleCandidate {
    content: Option<GoogleContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct GoogleContent {
    #[serde(default)]
    parts: Vec<GooglePart>,
}

#[derive(Deserialize, Debug)]
struct GooglePart {
    text: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GooglePromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct GoogleErrorBody {
    error: GoogleErrorDetail,
}

#[derive(Deserialize)]
struct GoogleErrorDetail {
    message: String,
}

fn classify(response: GenerateContentResponse) -> Completion {
    let Some(candidate) = response.candidates.into_iter().next() else {
        return match response.prompt_feedback.and_then(|f| f.block_reason) {
            Some(reason) => Completion::Blocked(reason),
            None => Completion::Empty,
        };
    };

    if let Some(reason) = candidate.finish_reason {
        if reason != "STOP" {
            return Completion::Blocked(reason);
        }
    }

    let text: String = candidate.content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.is_empty() {
        Completion::Empty
    } else {
        Completion::Text(text)
    }
}

fn provider_message(body: &str) -> String {
    serde_json
        ::from_str::<GoogleErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

pub struct GeminiChatClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiChatClient {
    pub fn new(
        api_key: String,
        model: String,
        base_url: String,
        timeout: Duration
    ) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let api_key = config.api_key
            .clone()
            .ok_or_else(|| "Google API key is required for GeminiChatClient".to_string())?;

        Self::new(api_key, config.completion_model.clone(), config.base_url.clone(), config.timeout)
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl ChatClient for GeminiChatClient {
    async fn generate(&self, turns: &[Turn]) -> Result<Completion, LlmError> {
        let payload = GenerateContentRequest {
            contents: turns
                .iter()
                .map(|turn| GeminiContent {
                    role: match turn.role {
                        Role::User => "user",
                        Role::Model => "model",
                    },
                    parts: vec![GeminiPart { text: &turn.content }],
                })
                .collect(),
        };

        info!("GeminiChatClient::generate() → model={} turns={}", self.model, turns.len());

        let resp = self.http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send().await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: provider_message(&body),
            });
        }

        let parsed: GenerateContentResponse = serde_json
            ::from_str(&body)
            .map_err(|e| LlmError::Decode(e.to_string()))?;

        Ok(classify(parsed))
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify_json(body: &str) -> Completion {
        classify(serde_json::from_str(body).unwrap())
    }

    #[test]
    fn text_parts_are_joined() {
        let completion = classify_json(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"We open "},{"text":"at nine."}]},"finishReason":"STOP"}]}"#
        );
        assert_eq!(completion, Completion::Text("We open at nine.".to_string()));
    }

    #[test]
    fn non_stop_finish_reason_is_blocked() {
        let completion = classify_json(
            r#"{"candidates":[{"content":{"parts":[{"text":"partial"}]},"finishReason":"SAFETY"}]}"#
        );
        assert_eq!(completion, Completion::Blocked("SAFETY".to_string()));
    }

    #[test]
    fn prompt_feedback_block_without_candidates_is_blocked() {
        let completion = classify_json(r#"{"promptFeedback":{"blockReason":"OTHER"}}"#);
        assert_eq!(completion, Completion::Blocked("OTHER".to_string()));
    }

    #[test]
    fn missing_parts_is_empty() {
        assert_eq!(classify_json(r#"{"candidates":[]}"#), Completion::Empty);
        assert_eq!(classify_json(r#"{"candidates":[{"finishReason":"STOP"}]}"#), Completion::Empty);
        assert_eq!(
            classify_json(r#"{"candidates":[{"content":{"parts":[]},"finishReason":"STOP"}]}"#),
            Completion::Empty
        );
    }

    #[test]
    fn provider_error_message_is_extracted() {
        let body = r#"{"error":{"code":400,"message":"API key not valid.","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(provider_message(body), "API key not valid.");
        assert_eq!(provider_message("  upstream down "), "upstream down");
    }
}
