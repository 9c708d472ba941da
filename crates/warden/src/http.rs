//! Shared HTTP plumbing for the outbound API clients.

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::error::WardenError;

/// Build the process-wide HTTP client. Every request inherits `timeout`.
pub fn build_client(timeout: Duration) -> Result<Client, WardenError> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .user_agent(concat!("warden/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| WardenError::InvalidConfig {
            reason: format!("failed to build HTTP client: {e}"),
        })
}

pub(crate) fn transport_error(endpoint: &str, err: reqwest::Error) -> WardenError {
    let transient = err.is_timeout() || err.is_connect() || err.is_request();
    WardenError::Transport {
        endpoint: endpoint.to_string(),
        reason: err.to_string(),
        transient,
        source: Some(Box::new(err)),
    }
}

/// Send a request and reject non-2xx responses.
pub(crate) async fn send(endpoint: &str, request: RequestBuilder) -> Result<Response, WardenError> {
    let response = request
        .send()
        .await
        .map_err(|e| transport_error(endpoint, e))?;
    let status = response.status();
    if !status.is_success() {
        return Err(WardenError::UnexpectedStatus {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(response)
}

/// Send a request and decode a JSON body.
pub(crate) async fn send_json<T: DeserializeOwned>(
    endpoint: &str,
    request: RequestBuilder,
) -> Result<T, WardenError> {
    let response = send(endpoint, request).await?;
    let body = response
        .bytes()
        .await
        .map_err(|e| transport_error(endpoint, e))?;
    serde_json::from_slice(&body).map_err(|e| WardenError::MalformedPayload {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
        source: Some(Box::new(e)),
    })
}
