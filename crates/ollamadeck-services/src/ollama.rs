use std::time::Duration;

use ollamadeck_core::ModelRecord;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
// Pulling a large model can legitimately take most of an hour.
const PULL_TIMEOUT: Duration = Duration::from_secs(3600);

#[derive(Error, Debug)]
pub enum OllamaError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("inference server returned {status}: {body}")]
    Upstream { status: StatusCode, body: String },
    #[error("malformed response from inference server: {0}")]
    Malformed(String),
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelRecord>,
}

#[derive(Serialize)]
struct DeleteRequest<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct PullRequest<'a> {
    name: &'a str,
    stream: bool,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<ResponseMessage>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

/// Async client for the local inference server's REST API.
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[instrument(skip(self), fields(host = %self.base_url))]
    pub async fn list_models(&self) -> Result<Vec<ModelRecord>, OllamaError> {
        let url = format!("{}/api/tags", self.base_url);
        debug!("fetching model list");

        let response = self.client.get(&url).send().await?;
        let response = check_status(response).await?;

        let tags: TagsResponse = response.json().await?;
        let mut models = tags.models;
        for model in &mut models {
            model.decorate();
        }
        info!(count = models.len(), "fetched model list");
        Ok(models)
    }

    #[instrument(skip(self))]
    pub async fn delete_model(&self, name: &str) -> Result<(), OllamaError> {
        let url = format!("{}/api/delete", self.base_url);
        let response = self
            .client
            .delete(&url)
            .json(&DeleteRequest { name })
            .send()
            .await?;
        check_status(response).await?;
        info!(model = name, "model deleted");
        Ok(())
    }

    /// Start a streaming pull. The caller owns the response and drives the
    /// progress stream to completion.
    #[instrument(skip(self))]
    pub async fn pull(&self, name: &str) -> Result<reqwest::Response, OllamaError> {
        let url = format!("{}/api/pull", self.base_url);
        info!(model = name, "starting model pull");
        let response = self
            .client
            .post(&url)
            .timeout(PULL_TIMEOUT)
            .json(&PullRequest { name, stream: true })
            .send()
            .await?;
        Ok(response)
    }

    /// Single-turn, non-streaming chat. Returns the assistant message body.
    #[instrument(skip(self, message))]
    pub async fn chat(&self, model: &str, message: &str) -> Result<String, OllamaError> {
        let url = format!("{}/api/chat", self.base_url);
        debug!(model, "sending chat request");

        let request = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: message,
            }],
            stream: false,
        };

        let response = self.client.post(&url).json(&request).send().await?;
        let response = check_status(response).await?;

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| OllamaError::Malformed(e.to_string()))?;
        Ok(body.message.map(|m| m.content).unwrap_or_default())
    }
}

/// Turn a non-2xx response into an Upstream error carrying the body text.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, OllamaError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(OllamaError::Upstream { status, body })
}
