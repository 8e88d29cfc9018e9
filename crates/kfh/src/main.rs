use std::sync::Arc;

use kfh_core::{config::Config, credentials::TokenCache, handoff::HandoffPlugin};
use kfh_wecom::WecomClient;

mod console;

#[tokio::main]
async fn main() -> Result<(), kfh_core::Error> {
    kfh_core::logging::init("kfh")?;

    let cfg = Arc::new(Config::load()?);
    tracing::info!(
        open_kfid = %cfg.open_kfid,
        api_base = %cfg.api_base,
        state_check = cfg.state_check,
        "kfh starting"
    );

    let api = Arc::new(WecomClient::from_config(&cfg)?);
    let tokens = Arc::new(TokenCache::new(
        api.clone(),
        cfg.credentials.clone(),
        cfg.token_ttl,
    ));
    let plugin = HandoffPlugin::new(cfg, api, tokens);

    console::run(&plugin).await
}
