use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use node::{NodeService, api, config::NodeConfig};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "titlechain-node", about = "Replicated land-transfer ledger node")]
struct Cli {
    #[arg(long, env = "TITLECHAIN_DB_PATH", default_value = "titlechain.db")]
    db_path: PathBuf,
    #[arg(long, env = "TITLECHAIN_API_ADDR", default_value = "127.0.0.1:5000")]
    api_addr: String,
    /// Address peers use to reach this node; defaults to the api address.
    #[arg(long, env = "TITLECHAIN_PUBLIC_ADDR")]
    public_addr: Option<String>,
    #[arg(long, env = "TITLECHAIN_SECRET_KEY")]
    secret_key: String,
    #[arg(long, env = "TITLECHAIN_INIT_PEER")]
    init_peer: Option<String>,
    #[arg(long, env = "TITLECHAIN_NODE_ID")]
    node_id: Option<String>,
    #[arg(long, env = "TITLECHAIN_TRANSFER_FEE", default_value_t = node::config::DEFAULT_TRANSFER_FEE)]
    transfer_fee: u64,
    #[arg(long, env = "TITLECHAIN_PEER_TIMEOUT_MS", default_value_t = 5_000)]
    peer_timeout_ms: u64,
    #[arg(long, env = "TITLECHAIN_DRAIN_INTERVAL_MS", default_value_t = 5_000)]
    drain_interval_ms: u64,
    /// How long a drain cycle waits for the first queued transaction.
    #[arg(long, env = "TITLECHAIN_DRAIN_POP_TIMEOUT_MS", default_value_t = 2_000)]
    drain_pop_timeout_ms: u64,
    #[arg(long, env = "TITLECHAIN_ALERTS_URL")]
    alerts_url: Option<String>,
    #[arg(long, env = "TITLECHAIN_FORGE_REQUIRES_PEERS")]
    forge_requires_peers: bool,
}

impl Cli {
    fn into_config(self) -> Result<NodeConfig> {
        let mut config = NodeConfig::with_db_path(&self.db_path);
        config.api_addr = self.api_addr.parse().context("invalid api address")?;
        config.public_addr = self.public_addr.unwrap_or_else(|| self.api_addr.clone());
        config.secret_key = self.secret_key;
        config.init_peer = self.init_peer;
        config.node_id = self.node_id;
        config.transfer_fee = self.transfer_fee;
        config.peer_timeout_ms = self.peer_timeout_ms;
        config.drain_interval_ms = self.drain_interval_ms;
        config.drain_pop_timeout_ms = self.drain_pop_timeout_ms;
        config.alerts_url = self.alerts_url;
        config.forge_requires_peers = self.forge_requires_peers;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let config = Cli::parse().into_config()?;

    let handle = NodeService::start(config)
        .await
        .context("failed to start node")?;
    let api_task = tokio::spawn(api::serve(handle.service.clone()));
    info!(
        api = %handle.service.config().api_addr,
        public = %handle.service.self_address(),
        "node online"
    );
    signal::ctrl_c()
        .await
        .context("failed to install signal handler")?;
    info!("shutting down");
    api_task.abort();
    handle.shutdown().await.context("failed to shut down node")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn drain_timing_flags_reach_the_config() {
        let cli = Cli::try_parse_from([
            "titlechain-node",
            "--secret-key",
            "s3cret",
            "--api-addr",
            "127.0.0.1:5100",
            "--drain-interval-ms",
            "750",
            "--drain-pop-timeout-ms",
            "250",
        ])
        .unwrap();
        let config = cli.into_config().unwrap();
        assert_eq!(config.drain_interval(), Duration::from_millis(750));
        assert_eq!(config.drain_pop_timeout(), Duration::from_millis(250));
        assert_eq!(config.public_addr, "127.0.0.1:5100");
    }

    #[test]
    fn bad_api_address_is_reported() {
        let cli = Cli::try_parse_from([
            "titlechain-node",
            "--secret-key",
            "s3cret",
            "--api-addr",
            "not-an-address",
        ])
        .unwrap();
        assert!(cli.into_config().is_err());
    }
}
