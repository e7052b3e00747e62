//! JSON over HTTP transport.
//!
//! Each instance address must be an absolute base URL. Requests are encoded
//! as JSON and POSTed to `instance + path`; 2xx bodies are decoded as JSON.

use std::marker::PhantomData;
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::config::TransportConfig;
use crate::discovery::Instance;
use crate::error::{ConstructionError, TransportError};
use crate::transport::Transport;

/// Generic JSON request/response client.
pub struct HttpJsonTransport<Req, Resp> {
    client: reqwest::Client,
    path: String,
    _marker: PhantomData<fn(Req) -> Resp>,
}

impl<Req, Resp> HttpJsonTransport<Req, Resp> {
    pub fn new(config: &TransportConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .build()?;
        Ok(Self::with_client(client, &config.path))
    }

    pub fn with_client(client: reqwest::Client, path: &str) -> Self {
        Self {
            client,
            path: path.to_string(),
            _marker: PhantomData,
        }
    }
}

impl<Req, Resp> Transport for HttpJsonTransport<Req, Resp>
where
    Req: Serialize + Send + Sync + 'static,
    Resp: DeserializeOwned + Send + 'static,
{
    type Request = Req;
    type Response = Resp;
    type Target = Url;

    fn prepare(&self, instance: &Instance) -> Result<Url, ConstructionError> {
        let base = Url::parse(instance.as_str())
            .map_err(|e| ConstructionError::new(instance, e.to_string()))?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(ConstructionError::new(instance, "not an http(s) base URL"));
        }
        base.join(&self.path)
            .map_err(|e| ConstructionError::new(instance, e.to_string()))
    }

    fn call<'a>(&'a self, target: &'a Url, request: &'a Req) -> BoxFuture<'a, Result<Resp, TransportError>> {
        Box::pin(async move {
            let response = self
                .client
                .post(target.clone())
                .json(request)
                .send()
                .await
                .map_err(classify)?;

            let status = response.status();
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(TransportError::Status {
                    status: status.as_u16(),
                    message,
                });
            }

            response
                .json::<Resp>()
                .await
                .map_err(|e| TransportError::Codec(e.to_string()))
        })
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_builder() || err.is_body() || err.is_decode() {
        TransportError::Codec(err.to_string())
    } else {
        TransportError::Connect(err.to_string())
    }
}
