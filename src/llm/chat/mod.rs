pub mod gemini;

use async_trait::async_trait;
use std::error::Error as StdError;
use std::sync::Arc;

use self::gemini::GeminiChatClient;
use super::LlmConfig;
use crate::error::LlmError;
use crate::models::chat::Turn;

pub const BLOCKED_REPLY: &str = "The response was blocked by the model's safety filters.";
pub const EMPTY_REPLY: &str = "Received an empty response from the model.";

/// What the provider sent back for one generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Text(String),
    /// The provider withheld the output; carries the finish/block reason.
    Blocked(String),
    Empty,
}

impl Completion {
    /// Text shown to the end user. Blocked content is never included.
    pub fn into_reply(self) -> String {
        match self {
            Completion::Text(text) => text,
            Completion::Blocked(_) => BLOCKED_REPLY.to_string(),
            Completion::Empty => EMPTY_REPLY.to_string(),
        }
    }
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Sends an ordered transcript; the last turn is the new user message.
    async fn generate(&self, turns: &[Turn]) -> Result<Completion, LlmError>;

    async fn complete(&self, prompt: &str) -> Result<Completion, LlmError> {
        self.generate(&[Turn::user(prompt)]).await
    }

    fn get_model(&self) -> String;
}

pub fn new_client(
    config: &LlmConfig
) -> Result<Arc<dyn ChatClient>, Box<dyn StdError + Send + Sync>> {
    let client = GeminiChatClient::from_config(config)?;
    Ok(Arc::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_and_empty_map_to_fixed_replies() {
        assert_eq!(Completion::Text("hi".into()).into_reply(), "hi");
        assert_eq!(Completion::Blocked("SAFETY".into()).into_reply(), BLOCKED_REPLY);
        assert_eq!(Completion::Empty.into_reply(), EMPTY_REPLY);
    }
}
