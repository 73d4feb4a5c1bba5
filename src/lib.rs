pub mod agent;
pub mod models;
pub mod server;
pub mod config;
pub mod llm;
pub mod cli;
pub mod error;
pub mod store;

use agent::FaqAgent;
use cli::Args;
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Listen Address: {}:{}", args.host, args.port);
    info!("Database URL Set: {}", args.database_url().is_some());
    info!("Google API Key Set: {}", args.google_api_key().is_some());
    info!("Gemini Model: {}", args.gemini_model);
    info!("LLM Mode: {}", args.llm_mode);
    info!("Custom Prompt Template: {}", args.prompt_template.is_some());
    info!("Production: {}", args.production);
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let agent = Arc::new(FaqAgent::initialize(&args).await);
    info!(
        "Startup finished: db_connection_setup={} llm_configured={}",
        agent.db_status(),
        agent.llm_status()
    );

    let server = Server::new(agent, args);
    server.run().await?;

    Ok(())
}
