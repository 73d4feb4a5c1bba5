use clap::Parser;
use dotenv::dotenv;
use faq_chat_backend::cli::Args;
use std::error::Error;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    dotenv().ok();
    let args = Args::parse();
    env_logger::Builder
        ::from_env(env_logger::Env::default().default_filter_or(args.default_log_filter()))
        .init();

    faq_chat_backend::run(args).await
}
