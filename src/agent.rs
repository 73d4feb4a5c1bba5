use crate::cli::Args;
use crate::config::prompt::{ self, PromptTemplate, DEFAULT_TEMPLATE };
use crate::error::{ ApiError, ConfigError, StoreError };
use crate::llm::chat::{ new_client as new_chat_client, Completion };
use crate::llm::session::ChatSessions;
use crate::llm::LlmConfig;
use crate::models::faq::Retrieval;
use crate::store::{ FaqStore, DEFAULT_FAQS };

use log::{ debug, error, info, warn };
use std::fmt;
use std::time::Duration;

/// Startup outcome of a subsystem, reported by `/health`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ok,
    Error(String),
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Readiness::Ok => write!(f, "OK"),
            Readiness::Error(reason) => write!(f, "Error({})", reason),
        }
    }
}

pub enum LlmState {
    Ready(ChatSessions),
    MissingKey,
    InitFailed(String),
}

impl LlmState {
    pub fn readiness(&self) -> Readiness {
        match self {
            LlmState::Ready(_) => Readiness::Ok,
            LlmState::MissingKey => Readiness::Error(ConfigError::Missing("GOOGLE_API_KEY").to_string()),
            LlmState::InitFailed(reason) => Readiness::Error(reason.clone()),
        }
    }
}

/// Everything a chat request needs, built once at startup and shared
/// read-only between requests. Only the session map inside `llm` mutates.
pub struct FaqAgent {
    store: Option<FaqStore>,
    db_status: Readiness,
    llm: LlmState,
    prompt_template: String,
    production: bool,
}

impl FaqAgent {
    pub fn new(
        store: Option<FaqStore>,
        db_status: Readiness,
        llm: LlmState,
        prompt_template: Option<String>
    ) -> Self {
        Self {
            store,
            db_status,
            llm,
            prompt_template: prompt_template.unwrap_or_else(|| DEFAULT_TEMPLATE.to_string()),
            production: false,
        }
    }

    /// Runs the startup sequence. Failures never abort: they are logged and
    /// recorded in the readiness flags.
    pub async fn initialize(args: &Args) -> Self {
        let (store, db_status) = Self::initialize_store(args).await;
        let llm = Self::initialize_llm(args);

        let prompt_template = args.prompt_template
            .clone()
            .filter(|t| !t.trim().is_empty());
        if let Some(template) = &prompt_template {
            match PromptTemplate::parse(template) {
                Ok(_) => info!("Using prompt template from configuration"),
                Err(e) => error!("Configured prompt template is invalid, chat requests will fail: {}", e),
            }
        }

        let mut agent = Self::new(store, db_status, llm, prompt_template);
        agent.production = args.production;
        agent
    }

    async fn initialize_store(args: &Args) -> (Option<FaqStore>, Readiness) {
        let Some(url) = args.database_url() else {
            let e = ConfigError::Missing("DATABASE_URL");
            error!("Database disabled: {}", e);
            return (None, Readiness::Error(e.to_string()));
        };

        let store = match FaqStore::connect(url, args.database_max_connections) {
            Ok(store) => store,
            Err(e) => {
                error!("Could not create database pool: {}", e);
                return (None, Readiness::Error(e.to_string()));
            }
        };
        info!("Database pool created ({:?})", store.dialect());

        let status = match store.prepare(&DEFAULT_FAQS).await {
            Ok((schema, seeded)) => {
                info!("Database ready: schema {:?}, {} FAQs seeded", schema, seeded);
                Readiness::Ok
            }
            Err(e) => {
                error!("Database initialization failed: {}", e);
                Readiness::Error(e.to_string())
            }
        };

        (Some(store), status)
    }

    fn initialize_llm(args: &Args) -> LlmState {
        let Some(api_key) = args.google_api_key() else {
            error!("Gemini disabled: {}", ConfigError::Missing("GOOGLE_API_KEY"));
            return LlmState::MissingKey;
        };

        let config = LlmConfig {
            api_key: Some(api_key.to_string()),
            completion_model: args.gemini_model.clone(),
            base_url: args.gemini_base_url.clone(),
            timeout: Duration::from_secs(args.llm_timeout_secs),
        };
        match new_chat_client(&config) {
            Ok(client) => {
                let sessions = ChatSessions::with_limits(client, args.llm_mode, args.session_limits());
                info!(
                    "Chat client configured: Model={}, BaseURL={}, Mode={}",
                    sessions.model(),
                    config.base_url,
                    sessions.mode()
                );
                LlmState::Ready(sessions)
            }
            Err(e) => {
                error!("Could not initialize Gemini client: {}", e);
                LlmState::InitFailed(e.to_string())
            }
        }
    }

    pub fn db_status(&self) -> &Readiness {
        &self.db_status
    }

    pub fn llm_status(&self) -> Readiness {
        self.llm.readiness()
    }

    pub async fn count_faqs(&self) -> Result<i64, StoreError> {
        let store = self.store.as_ref().ok_or(StoreError::NotConfigured)?;
        store.count().await
    }

    pub async fn retrieve(&self) -> Retrieval {
        match &self.store {
            Some(store) => store.fetch_all().await,
            None => Retrieval::Unavailable(StoreError::NotConfigured.to_string()),
        }
    }

    /// Answers one chat message: retrieve FAQs, compose the prompt, ask the model.
    pub async fn answer(
        &self,
        message: &str,
        conversation_id: Option<&str>
    ) -> Result<String, ApiError> {
        let sessions = match &self.llm {
            LlmState::Ready(sessions) => sessions,
            LlmState::MissingKey => {
                return Err(ApiError::Internal("Google API Key not configured".to_string()));
            }
            LlmState::InitFailed(_) => {
                return Err(ApiError::Internal("Gemini model not initialized".to_string()));
            }
        };

        let retrieval = self.retrieve().await;
        match &retrieval {
            Retrieval::Rows(rows) => info!("Retrieved {} FAQs for context", rows.len()),
            Retrieval::Unavailable(reason) => warn!("Continuing without FAQ context: {}", reason),
        }

        let prompt = prompt::compose(&self.prompt_template, &retrieval, message).map_err(|e| {
            error!("Prompt template formatting failed: {}", e);
            ApiError::from(e)
        })?;
        if !self.production {
            debug!("Composed prompt:\n{}", prompt);
        }

        info!("Sending request to Gemini API");
        let completion = sessions.send(conversation_id, &prompt).await.map_err(|e| {
            error!("Error calling Gemini API: {}", e);
            ApiError::from(e)
        })?;
        info!("Received response from Gemini API");

        match &completion {
            Completion::Blocked(reason) => warn!("Gemini blocked the response: {}", reason),
            Completion::Empty => warn!("Gemini returned an empty response"),
            Completion::Text(_) => {}
        }

        Ok(completion.into_reply())
    }
}
