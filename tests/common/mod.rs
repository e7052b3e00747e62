//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use service_dispatch::config::{BalancerConfig, BalancerStrategy, DispatchConfig};
use service_dispatch::discovery::{Instance, Instancer};
use service_dispatch::endpoint::EndpointFactory;
use service_dispatch::error::{ConstructionError, TransportError};
use service_dispatch::resilience::BreakerSettings;
use service_dispatch::transport::Transport;
use service_dispatch::ServiceClient;

/// How a scripted instance answers.
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    Succeed,
    Fail,
    /// Succeed after sleeping.
    Delay(Duration),
}

/// In-process transport whose instances follow a script.
///
/// Succeeding calls return the instance address. Unknown instances succeed.
#[derive(Default)]
pub struct ScriptedTransport {
    behaviors: Mutex<HashMap<String, Behavior>>,
    calls: Mutex<HashMap<String, u32>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, instance: &str, behavior: Behavior) {
        self.behaviors.lock().unwrap().insert(instance.to_string(), behavior);
    }

    pub fn calls(&self, instance: &str) -> u32 {
        self.calls.lock().unwrap().get(instance).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }
}

impl Transport for ScriptedTransport {
    type Request = ();
    type Response = String;
    type Target = String;

    fn prepare(&self, instance: &Instance) -> Result<String, ConstructionError> {
        if instance.as_str().is_empty() {
            return Err(ConstructionError::new(instance, "empty address"));
        }
        Ok(instance.to_string())
    }

    fn call<'a>(&'a self, target: &'a String, _request: &'a ()) -> BoxFuture<'a, Result<String, TransportError>> {
        Box::pin(async move {
            *self.calls.lock().unwrap().entry(target.clone()).or_default() += 1;
            let behavior = self
                .behaviors
                .lock()
                .unwrap()
                .get(target)
                .copied()
                .unwrap_or(Behavior::Succeed);

            match behavior {
                Behavior::Succeed => Ok(target.clone()),
                Behavior::Fail => Err(TransportError::Connect(format!("{target} refused"))),
                Behavior::Delay(delay) => {
                    tokio::time::sleep(delay).await;
                    Ok(target.clone())
                }
            }
        })
    }
}

/// Poll `condition` every 20ms until it holds or `timeout` elapses.
pub async fn eventually<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}

/// Start a simple mock backend that returns a fixed JSON body.
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    start_programmable_backend(move |_body| async move { (200, response.to_string()) }).await
}

/// Start a programmable mock backend. The handler receives the request body
/// and returns the status code and response body.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let Some(body) = read_request_body(&mut socket).await else {
                            return;
                        };
                        let (status, body) = f(body).await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            429 => "429 Too Many Requests",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Read one HTTP/1.1 request and return its body.
async fn read_request_body(socket: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
    let content_length = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let end = buf.len().min(header_end + content_length);
    Some(String::from_utf8_lossy(&buf[header_end..end]).into_owned())
}

/// Client over `transport` with round-robin selection, so attempt order is
/// deterministic (snapshot order is by address).
pub fn scripted_client(
    mut config: DispatchConfig,
    instancer: &dyn Instancer,
    transport: Arc<ScriptedTransport>,
) -> ServiceClient<(), String> {
    config.balancer = BalancerConfig {
        strategy: BalancerStrategy::RoundRobin,
        seed: None,
    };
    configured_client(config, instancer, transport)
}

/// Client over `transport` using the balancer exactly as configured.
pub fn configured_client(
    config: DispatchConfig,
    instancer: &dyn Instancer,
    transport: Arc<ScriptedTransport>,
) -> ServiceClient<(), String> {
    let factory = EndpointFactory::new(
        &config.service.operation,
        transport,
        BreakerSettings::from(&config.breaker),
    );
    ServiceClient::new(&config, instancer, Arc::new(factory))
}

/// Addresses in the current snapshot, in snapshot order.
pub fn addresses<Req, Resp>(client: &ServiceClient<Req, Resp>) -> Vec<String>
where
    Req: Send + Sync + 'static,
    Resp: Send + 'static,
{
    client
        .endpoints()
        .snapshot()
        .iter()
        .map(|endpoint| endpoint.instance().to_string())
        .collect()
}
