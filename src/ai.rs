//! Forwarding client for the external generative-AI API.
//!
//! The server does not interpret prompts or completions; it passes the JSON
//! request through, adding credentials and a default model.

use serde_json::Value;
use thiserror::Error;

use crate::config::AiConfig;

#[derive(Error, Debug)]
pub enum AiError {
    #[error("Request body must be a JSON object")]
    InvalidRequest,

    #[error("Request to AI provider failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("AI provider returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Client for one configured AI endpoint.
#[derive(Debug, Clone)]
pub struct GenerativeClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: Option<String>,
}

impl GenerativeClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: None,
            model: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Builds a client from config. Returns `None` when no endpoint is set.
    pub fn from_config(config: &AiConfig) -> Option<Self> {
        let endpoint = config.endpoint.as_ref()?;
        let mut client = Self::new(endpoint.clone());
        client.api_key = config.api_key.clone();
        client.model = config.model.clone();
        Some(client)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fills in the default model unless the caller picked one.
    fn prepare(&self, mut body: Value) -> Result<Value, AiError> {
        let object = body.as_object_mut().ok_or(AiError::InvalidRequest)?;
        if let Some(model) = &self.model {
            object
                .entry("model")
                .or_insert_with(|| Value::String(model.clone()));
        }
        Ok(body)
    }

    /// Sends one request to the provider and returns its JSON reply.
    pub async fn forward(&self, body: Value) -> Result<Value, AiError> {
        let body = self.prepare(body)?;

        let mut request = self.http.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("AI provider returned {}", status);
            return Err(AiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use serde_json::json;

    /// Starts a stand-in provider that echoes the request and its auth header.
    async fn spawn_upstream() -> String {
        async fn echo(headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
            let auth = headers
                .get("authorization")
                .and_then(|h| h.to_str().ok())
                .map(str::to_string);
            Json(json!({ "echo": body, "authorization": auth }))
        }

        async fn fail() -> (StatusCode, &'static str) {
            (StatusCode::TOO_MANY_REQUESTS, "slow down")
        }

        let app = Router::new()
            .route("/v1/generate", post(echo))
            .route("/v1/fail", post(fail));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_from_config_requires_endpoint() {
        assert!(GenerativeClient::from_config(&AiConfig::default()).is_none());

        let config = AiConfig {
            endpoint: Some("http://localhost/v1".into()),
            api_key: Some("k".into()),
            model: None,
        };
        let client = GenerativeClient::from_config(&config).unwrap();
        assert_eq!(client.endpoint(), "http://localhost/v1");
    }

    #[test]
    fn test_prepare_adds_default_model() {
        let client = GenerativeClient::new("http://x").with_model("small");

        let body = client.prepare(json!({ "prompt": "hi" })).unwrap();
        assert_eq!(body["model"], "small");

        let body = client
            .prepare(json!({ "prompt": "hi", "model": "large" }))
            .unwrap();
        assert_eq!(body["model"], "large");
    }

    #[test]
    fn test_prepare_rejects_non_object() {
        let client = GenerativeClient::new("http://x");
        assert!(matches!(
            client.prepare(json!(["prompt"])),
            Err(AiError::InvalidRequest)
        ));
    }

    #[tokio::test]
    async fn test_forward_passes_body_and_key() {
        let base = spawn_upstream().await;
        let client = GenerativeClient::new(format!("{}/v1/generate", base))
            .with_api_key("secret")
            .with_model("small");

        let reply = client.forward(json!({ "prompt": "hi" })).await.unwrap();

        assert_eq!(reply["echo"]["prompt"], "hi");
        assert_eq!(reply["echo"]["model"], "small");
        assert_eq!(reply["authorization"], "Bearer secret");
    }

    #[tokio::test]
    async fn test_forward_surfaces_provider_status() {
        let base = spawn_upstream().await;
        let client = GenerativeClient::new(format!("{}/v1/fail", base));

        let result = client.forward(json!({})).await;
        assert!(matches!(
            result,
            Err(AiError::Status { status: 429, ref body }) if body == "slow down"
        ));
    }
}
