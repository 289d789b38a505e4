//! HTTP implementation of the remote sink

use crate::config::SinkConfig;
use crate::sink::{FlushBatch, RemoteSink, SinkError, SinkReceipt};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Message used when an error response carries no usable explanation
const DEFAULT_REJECTION: &str = "Failed to save listings";

/// Success payload; the count field name differs between sink versions
#[derive(Debug, Deserialize)]
struct AcceptedBody {
    #[serde(default)]
    saved: Option<usize>,

    #[serde(default)]
    accepted: Option<usize>,
}

/// Error payload: `{ "error": ... }` or `{ "message": ... }`
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,

    #[serde(default)]
    message: Option<String>,
}

/// Sends batches as JSON `POST` requests carrying a credential header
pub struct HttpSink {
    client: Client,
    endpoint: String,
    auth_header: String,
    api_key: Option<String>,
}

impl HttpSink {
    /// Creates a sink from its configuration, resolving the credential
    pub fn from_config(config: &SinkConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            auth_header: config.auth_header.clone(),
            api_key: config.resolve_api_key(),
        })
    }

    /// Value sent in the credential header
    fn credential_value(&self, key: &str) -> String {
        if self.auth_header.eq_ignore_ascii_case("authorization") {
            format!("Bearer {}", key)
        } else {
            key.to_string()
        }
    }
}

#[async_trait]
impl RemoteSink for HttpSink {
    async fn send(&self, batch: &FlushBatch) -> Result<SinkReceipt, SinkError> {
        let key = self.api_key.as_deref().ok_or(SinkError::MissingCredential)?;

        tracing::info!(
            "Sending {} records to {}",
            batch.records.len(),
            self.endpoint
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header(self.auth_header.as_str(), self.credential_value(key))
            .json(batch)
            .send()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;

        if status.is_success() {
            let parsed: AcceptedBody = serde_json::from_str(&body)
                .map_err(|e| SinkError::MalformedResponse(e.to_string()))?;
            let accepted = parsed
                .saved
                .or(parsed.accepted)
                .unwrap_or(batch.records.len());
            return Ok(SinkReceipt { accepted });
        }

        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.error.or(b.message))
            .unwrap_or_else(|| DEFAULT_REJECTION.to_string());

        Err(SinkError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}
