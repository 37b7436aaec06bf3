use std::sync::Arc;

use trainlive_core::{config::Config, status::TrainStatusClient};
use trainlive_rail::RailApiClient;

#[tokio::main]
async fn main() -> Result<(), trainlive_core::Error> {
    trainlive_core::logging::init("trainlive")?;

    let cfg = Arc::new(Config::load()?);

    let client: Arc<dyn TrainStatusClient> = Arc::new(RailApiClient::from_config(&cfg)?);
    tracing::debug!(base_url = %cfg.train_api_url, "train status client ready");

    trainlive_telegram::router::run_bot(cfg, client)
        .await
        .map_err(|e| trainlive_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
