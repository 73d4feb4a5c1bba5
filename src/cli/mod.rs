use clap::Parser;

use std::time::Duration;

use crate::llm::session::SessionLimits;
use crate::llm::LlmMode;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Store Args ---
    /// Connection string for the FAQ store (postgres://... or sqlite://...)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Maximum pooled connections to the FAQ store.
    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value = "5")]
    pub database_max_connections: u32,

    // --- Chat LLM Provider Args ---
    /// API Key for the Google Gemini API
    #[arg(long, env = "GOOGLE_API_KEY")]
    pub google_api_key: Option<String>,

    /// Gemini model used for chat replies
    #[arg(long, env = "GEMINI_MODEL", default_value = "gemini-2.0-flash")]
    pub gemini_model: String,

    /// Root of the Gemini REST API
    #[arg(
        long,
        env = "GEMINI_BASE_URL",
        default_value = "https://generativelanguage.googleapis.com/v1beta"
    )]
    pub gemini_base_url: String,

    /// stateless: every chat request is a one-shot generation.
    /// session: requests carrying a conversation_id continue that conversation.
    #[arg(long, env = "LLM_MODE", default_value = "stateless")]
    pub llm_mode: LlmMode,

    /// Request timeout toward the LLM provider, in seconds.
    #[arg(long, env = "LLM_TIMEOUT_SECS", default_value = "60")]
    pub llm_timeout_secs: u64,

    /// Session mode: conversations idle longer than this are forgotten, in seconds.
    #[arg(long, env = "SESSION_IDLE_TTL_SECS", default_value = "1800")]
    pub session_idle_ttl_secs: u64,

    /// Session mode: most conversations kept in memory at once.
    #[arg(long, env = "SESSION_MAX_COUNT", default_value = "1000")]
    pub session_max_count: usize,

    /// Session mode: user/model exchanges kept per conversation.
    #[arg(long, env = "SESSION_MAX_EXCHANGES", default_value = "20")]
    pub session_max_exchanges: usize,

    /// Override for the prompt template. Must contain {context} and {user_message}.
    #[arg(long, env = "PROMPT_TEMPLATE")]
    pub prompt_template: Option<String>,

    // --- General App Args ---
    /// Address the HTTP server binds to.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port the HTTP server listens on.
    #[arg(long, env = "PORT", default_value = "5001")]
    pub port: u16,

    /// Turn off development verbosity (debug logging, prompt dumps).
    #[arg(long, env = "PRODUCTION", default_value = "false")]
    pub production: bool,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

impl Args {
    /// Blank values count as unset, the way an empty `.env` entry should.
    pub fn database_url(&self) -> Option<&str> {
        non_blank(self.database_url.as_deref())
    }

    pub fn google_api_key(&self) -> Option<&str> {
        non_blank(self.google_api_key.as_deref())
    }

    pub fn session_limits(&self) -> SessionLimits {
        SessionLimits {
            max_sessions: self.session_max_count,
            idle_ttl: Duration::from_secs(self.session_idle_ttl_secs),
            max_exchanges: self.session_max_exchanges,
        }
    }

    pub fn default_log_filter(&self) -> &'static str {
        if self.production {
            "info"
        } else {
            "debug"
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
