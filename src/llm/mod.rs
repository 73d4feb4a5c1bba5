pub mod chat;
pub mod session;

use serde::{ Deserialize, Serialize };
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmMode {
    Stateless,
    Session,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseLlmModeError {
    message: String,
}

impl fmt::Display for ParseLlmModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseLlmModeError {}

impl FromStr for LlmMode {
    type Err = ParseLlmModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stateless" => Ok(LlmMode::Stateless),
            "session" => Ok(LlmMode::Session),
            _ =>
                Err(ParseLlmModeError {
                    message: format!("Invalid LLM mode: '{}' (expected stateless or session)", s),
                }),
        }
    }
}

impl fmt::Display for LlmMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmMode::Stateless => write!(f, "stateless"),
            LlmMode::Session => write!(f, "session"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub completion_model: String,
    pub base_url: String,
    pub timeout: Duration,
}
