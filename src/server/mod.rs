pub mod api;

use crate::agent::FaqAgent;
use crate::cli::Args;
use std::error::Error;
use std::sync::Arc;

pub struct Server {
    agent: Arc<FaqAgent>,
    args: Args,
}

impl Server {
    pub fn new(agent: Arc<FaqAgent>, args: Args) -> Self {
        Self { agent, args }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        api::start_http_server(&self.args, self.agent.clone()).await
    }
}
