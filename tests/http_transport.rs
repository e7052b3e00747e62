//! JSON over HTTP transport against mock backends.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};

use service_dispatch::config::{BalancerConfig, BalancerStrategy, DispatchConfig};
use service_dispatch::discovery::FixedInstancer;
use service_dispatch::endpoint::EndpointFactory;
use service_dispatch::error::{DispatchError, TransportError};
use service_dispatch::resilience::BreakerSettings;
use service_dispatch::transport::HttpJsonTransport;
use service_dispatch::ServiceClient;

mod common;

fn http_client(instances: Vec<String>) -> ServiceClient<Value, Value> {
    let config = DispatchConfig {
        balancer: BalancerConfig {
            strategy: BalancerStrategy::RoundRobin,
            seed: None,
        },
        ..Default::default()
    };
    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let transport = HttpJsonTransport::with_client(client, "/rpc");
    let factory = EndpointFactory::new("rpc", Arc::new(transport), BreakerSettings::default());
    ServiceClient::new(&config, &FixedInstancer::new(instances), Arc::new(factory))
}

fn url(addr: SocketAddr) -> String {
    format!("http://{addr}")
}

#[tokio::test]
async fn test_json_round_trip() {
    let addr = common::start_programmable_backend(|body| async move { (200, format!(r#"{{"echo":{body}}}"#)) }).await;
    let client = http_client(vec![url(addr)]);
    assert!(client.endpoints().wait_processed(1).await);

    let response = client.call(&json!({"n": 1})).await.unwrap();
    assert_eq!(response, json!({"echo": {"n": 1}}));
}

#[tokio::test]
async fn test_failover_to_healthy_backend() {
    let unhealthy_hits = Arc::new(AtomicU32::new(0));
    let hits = unhealthy_hits.clone();
    let unhealthy = common::start_programmable_backend(move |_body| {
        hits.fetch_add(1, Ordering::SeqCst);
        async { (503, "unavailable".to_string()) }
    })
    .await;
    let healthy = common::start_mock_backend(r#"{"ok":true}"#).await;

    let client = http_client(vec![url(unhealthy), url(healthy)]);
    assert!(client.endpoints().wait_processed(2).await);

    for _ in 0..4 {
        assert_eq!(client.call(&json!({})).await.unwrap(), json!({"ok": true}));
    }
    assert!(unhealthy_hits.load(Ordering::SeqCst) > 0);
}

#[tokio::test]
async fn test_status_error_surfaced() {
    let addr = common::start_programmable_backend(|_body| async { (503, "unavailable".to_string()) }).await;
    let client = http_client(vec![url(addr)]);
    assert!(client.endpoints().wait_processed(1).await);

    let err = client.call(&json!({})).await.unwrap_err();
    assert_eq!(
        err,
        DispatchError::Transport(TransportError::Status {
            status: 503,
            message: "unavailable".to_string(),
        })
    );
}

#[tokio::test]
async fn test_undecodable_body_is_codec_error() {
    let addr = common::start_mock_backend("not json").await;
    let client = http_client(vec![url(addr)]);
    assert!(client.endpoints().wait_processed(1).await);

    let err = client.call(&json!({})).await.unwrap_err();
    assert!(matches!(err, DispatchError::Transport(TransportError::Codec(_))), "{err:?}");
}

#[tokio::test]
async fn test_refused_connection() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = http_client(vec![url(addr)]);
    assert!(client.endpoints().wait_processed(1).await);

    let err = client.call(&json!({})).await.unwrap_err();
    assert!(matches!(err, DispatchError::Transport(TransportError::Connect(_))), "{err:?}");
}

#[tokio::test]
async fn test_malformed_instances_skipped() {
    let addr = common::start_mock_backend(r#"{"ok":true}"#).await;
    let client = http_client(vec!["not a url".to_string(), "10.0.0.1:80".to_string(), url(addr)]);
    assert!(client.endpoints().wait_processed(3).await);

    assert_eq!(common::addresses(&client), vec![url(addr)]);
    assert_eq!(client.call(&json!({})).await.unwrap(), json!({"ok": true}));
}
