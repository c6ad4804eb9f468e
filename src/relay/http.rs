//! HTTP relay client (reqwest)

use super::{AnonymousChatMessage, CardholderMessage, ErrorBody, RelayClient, RelayError};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

pub const CHAT_PATH: &str = "api/chat";
pub const CARDHOLDER_PATH: &str = "api/cardholder";

#[derive(Debug, Clone)]
pub struct HttpRelay {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpRelay {
    /// Client for the relay at `base_url`, with a per-request timeout
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RelayError> {
        let mut base_url =
            Url::parse(base_url).map_err(|e| RelayError::Config(format!("{}: {}", base_url, e)))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Config(e.to_string()))?;

        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn post<T: Serialize + Sync>(&self, path: &str, body: &T) -> Result<(), RelayError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| RelayError::Config(e.to_string()))?;

        let response = self
            .http
            .post(url.clone())
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RelayError::Timeout
                } else if e.is_builder() {
                    RelayError::Encoding(e.to_string())
                } else {
                    RelayError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status == StatusCode::OK {
            tracing::info!(url = %url, "relay accepted message");
            return Ok(());
        }

        let error = rejection_error(&url, response.text().await);
        tracing::error!(
            url = %url,
            status = status.as_u16(),
            error = error.as_deref().unwrap_or("<none>"),
            "relay rejected message"
        );

        Err(RelayError::Rejected {
            status: status.as_u16(),
            error,
        })
    }
}

/// The `{error}` field of a rejection body, if the body could be read
fn rejection_error<E: fmt::Display>(url: &Url, body: Result<String, E>) -> Option<String> {
    let body = match body {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "failed to read relay error body");
            return None;
        }
    };
    serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|parsed| parsed.error)
}

#[async_trait]
impl RelayClient for HttpRelay {
    async fn send_chat(&self, message: &AnonymousChatMessage) -> Result<(), RelayError> {
        self.post(CHAT_PATH, message).await
    }

    async fn send_cardholder(&self, message: &CardholderMessage) -> Result<(), RelayError> {
        self.post(CARDHOLDER_PATH, message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let relay = HttpRelay::new("https://relay.example/prefix", Duration::from_secs(5)).unwrap();
        assert_eq!(relay.base_url().as_str(), "https://relay.example/prefix/");
        assert_eq!(
            relay.base_url().join(CHAT_PATH).unwrap().as_str(),
            "https://relay.example/prefix/api/chat"
        );
    }

    #[test]
    fn test_rejection_error_field() {
        let url = Url::parse("https://relay.example/api/chat").unwrap();
        assert_eq!(
            rejection_error::<String>(&url, Ok(r#"{"error":"db down"}"#.to_string())),
            Some("db down".to_string())
        );
        assert_eq!(rejection_error::<String>(&url, Ok("unavailable".to_string())), None);
    }

    #[test]
    fn test_unreadable_rejection_body_has_no_error() {
        let url = Url::parse("https://relay.example/api/chat").unwrap();
        let body: Result<String, &str> = Err("connection reset mid-body");
        assert_eq!(rejection_error(&url, body), None);
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            HttpRelay::new("not a url", Duration::from_secs(5)),
            Err(RelayError::Config(_))
        ));
    }
}
