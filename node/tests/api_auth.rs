mod common;

use common::{TestNode, access_key, transfer_body};
use reqwest::StatusCode;
use serde_json::{Value, json};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn peer_routes_require_credentials() {
    let node = TestNode::start(None).await;
    let client = reqwest::Client::new();

    let missing = client.get(node.url("nodes")).send().await.unwrap();
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

    let only_key = client
        .get(node.url("blocks"))
        .header("Api-Key", access_key())
        .send()
        .await
        .unwrap();
    assert_eq!(only_key.status(), StatusCode::BAD_REQUEST);

    let wrong_key = client
        .get(node.url("nodes"))
        .header("Api-Key", "not-the-key")
        .header("Url", "127.0.0.1:9")
        .send()
        .await
        .unwrap();
    assert_eq!(wrong_key.status(), StatusCode::UNAUTHORIZED);

    let as_self = client
        .get(node.url("blocks"))
        .header("Api-Key", access_key())
        .header("Url", &node.address)
        .send()
        .await
        .unwrap();
    assert_eq!(as_self.status(), StatusCode::UNAUTHORIZED);

    assert!(node.handle.service.peers().unwrap().is_empty());
    node.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn authorized_reads_register_the_requester() {
    let node = TestNode::start(None).await;
    let client = reqwest::Client::new();

    let nodes = client
        .get(node.url("nodes"))
        .header("Api-Key", access_key())
        .header("Url", "127.0.0.1:9")
        .send()
        .await
        .unwrap();
    assert_eq!(nodes.status(), StatusCode::OK);
    let body: Value = nodes.json().await.unwrap();
    assert_eq!(body["payload"], json!(["127.0.0.1:9"]));

    let blocks = client
        .get(node.url("blocks"))
        .header("Api-Key", access_key())
        .header("Url", "127.0.0.1:9")
        .send()
        .await
        .unwrap();
    assert_eq!(blocks.status(), StatusCode::OK);
    let body: Value = blocks.json().await.unwrap();
    let chain = body["payload"].as_array().unwrap();
    assert_eq!(chain.len(), 1);
    assert_eq!(chain[0]["index"], 1);
    assert_eq!(chain[0]["proof"], 100);
    assert_eq!(chain[0]["previous_hash"], "10");
    assert_eq!(node.handle.service.peers().unwrap().len(), 1);

    node.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn ledger_view_needs_no_credentials() {
    let node = TestNode::start(None).await;
    let client = reqwest::Client::new();

    let view = client.get(node.url("blocks/demo")).send().await.unwrap();
    assert_eq!(view.status(), StatusCode::OK);
    let body: Value = view.json().await.unwrap();
    assert_eq!(body["message"], "Blockchain retrieved");
    let chain = body["payload"].as_array().unwrap();
    assert_eq!(chain.len(), 1);
    assert_eq!(chain[0]["index"], 1);
    // anonymous readers are not registered as peers
    assert!(node.handle.service.peers().unwrap().is_empty());

    node.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shorter_pushed_chain_is_refused() {
    let node = TestNode::start(None).await;
    let client = reqwest::Client::new();

    let pushed = client
        .post(node.url("blocks"))
        .header("Api-Key", access_key())
        .header("Url", "127.0.0.1:9")
        .json(&Vec::<Value>::new())
        .send()
        .await
        .unwrap();
    assert_eq!(pushed.status(), StatusCode::CONFLICT);
    assert_eq!(node.handle.service.extract_chain().unwrap().unwrap().len(), 1);

    node.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn isolated_node_commits_then_rejects_duplicate() {
    let node = TestNode::start(None).await;
    let client = reqwest::Client::new();

    let committed = client
        .post(node.url("transactions"))
        .json(&transfer_body("plt4401", 31, 32))
        .send()
        .await
        .unwrap();
    assert_eq!(committed.status(), StatusCode::CREATED);
    let body: Value = committed.json().await.unwrap();
    assert_eq!(body["payload"]["status"], "committed");
    assert_eq!(body["payload"]["block"]["index"], 2);
    assert_eq!(
        body["payload"]["block"]["transaction"]["transfer_fee"]["recipient"],
        format!("node-{}", node.address.rsplit(':').next().unwrap())
    );

    let duplicate = client
        .post(node.url("transactions"))
        .json(&transfer_body("plt4401", 31, 32))
        .send()
        .await
        .unwrap();
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    let key = json!({"plot_number": "plt4401", "seller_id": 31, "buyer_id": 32});
    let check = client
        .post(node.url("transactions/validate"))
        .json(&key)
        .send()
        .await
        .unwrap();
    assert_eq!(check.status(), StatusCode::CONFLICT);

    let unknown = json!({"plot_number": "plt4401", "seller_id": 32, "buyer_id": 33});
    let check = client
        .post(node.url("transactions/validate"))
        .json(&unknown)
        .send()
        .await
        .unwrap();
    assert_eq!(check.status(), StatusCode::OK);

    let metrics: Value = client
        .get(node.url("metrics"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(metrics["payload"]["telemetry"]["committed"], 1);
    assert_eq!(metrics["payload"]["telemetry"]["rejected"], 1);

    node.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn bootstrap_is_idempotent_and_register_accepts_urls() {
    let node = TestNode::start(None).await;
    let client = reqwest::Client::new();

    let again = client.post(node.url("bootstrap")).send().await.unwrap();
    assert_eq!(again.status(), StatusCode::OK);

    let registered = client
        .post(node.url("nodes/register"))
        .json(&json!({"address": "http://10.1.1.1:5000/"}))
        .send()
        .await
        .unwrap();
    assert_eq!(registered.status(), StatusCode::CREATED);
    let body: Value = registered.json().await.unwrap();
    assert_eq!(body["payload"], json!(["10.1.1.1:5000"]));

    let malformed = client
        .post(node.url("transactions"))
        .json(&json!({"plot_number": "plt1"}))
        .send()
        .await
        .unwrap();
    assert!(malformed.status().is_client_error());

    node.shutdown().await;
}
