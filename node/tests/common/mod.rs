#![allow(dead_code)]

use std::time::Duration;

use consensus::derive_access_key;
use node::config::NodeConfig;
use node::{NodeHandle, NodeService, api};
use serde_json::{Value, json};
use tempfile::{TempDir, tempdir};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub const SECRET: &str = "integration-secret";

pub struct TestNode {
    pub handle: NodeHandle,
    pub address: String,
    pub base_url: String,
    server: JoinHandle<()>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    _dir: TempDir,
}

impl TestNode {
    pub async fn start(init_peer: Option<&str>) -> Self {
        let dir = tempdir().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind api listener");
        let addr = listener.local_addr().unwrap();

        let mut config = NodeConfig::with_db_path(dir.path().join("node.db"));
        config.api_addr = addr;
        config.public_addr = addr.to_string();
        config.secret_key = SECRET.to_string();
        config.init_peer = init_peer.map(str::to_string);
        config.node_id = Some(format!("node-{}", addr.port()));
        config.peer_timeout_ms = 2_000;
        config.drain_interval_ms = 60_000;
        config.drain_pop_timeout_ms = 20;

        let handle = NodeService::start(config).await.expect("start node");
        let app = api::node_router(handle.service.clone());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("api server");
        });

        TestNode {
            handle,
            address: addr.to_string(),
            base_url: format!("http://{addr}/backend/v1"),
            server,
            shutdown_tx: Some(shutdown_tx),
            _dir: dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    pub async fn shutdown(self) {
        let TestNode {
            handle,
            server,
            shutdown_tx,
            _dir,
            ..
        } = self;
        if let Some(tx) = shutdown_tx {
            let _ = tx.send(());
        }
        let _ = tokio::time::timeout(Duration::from_secs(2), server).await;
        handle.shutdown().await.expect("shutdown node");
    }
}

/// A `host:port` with nothing listening on it.
pub async fn dead_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr.to_string()
}

pub fn access_key() -> String {
    derive_access_key(SECRET)
}

pub fn transfer_body(plot: &str, seller_id: u64, buyer_id: u64) -> Value {
    json!({
        "plot_number": plot,
        "size": "0.5 acres",
        "location": "Kitengela",
        "county": "Kajiado",
        "seller_id": seller_id,
        "buyer_id": buyer_id,
        "amount": 650000,
        "original_owner": true,
        "buyer_name": "Otieno"
    })
}

/// Polls `check` until it holds or two seconds pass.
pub async fn eventually<F: FnMut() -> bool>(mut check: F) -> bool {
    for _ in 0..40 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    check()
}
