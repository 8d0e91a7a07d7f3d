//! HTTP client for the assistant service

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder, Response};
use tracing::{debug, info, warn};

use super::error::{parse_error_message, ApiError};
use super::request::{ChatReply, ChatRequest};
use crate::config::ChatConfig;

/// Raw response body, chunk by chunk
pub type ByteStream = BoxStream<'static, Result<Bytes, ApiError>>;

/// Transport seam between a session and the assistant service
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Issue a streaming request and hand back the open body.
    ///
    /// Non-success statuses are errors here, before any body is read.
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, ApiError>;

    /// Issue a non-streaming request and wait for the whole reply
    async fn send(&self, request: &ChatRequest) -> Result<ChatReply, ApiError>;
}

/// reqwest-backed client for the assistant service
#[derive(Debug, Clone)]
pub struct AssistantClient {
    http: Client,
    base_url: String,
}

impl AssistantClient {
    pub fn new(config: &ChatConfig) -> Result<Self, ApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;
        info!("Assistant client created for {}", config.api_url);
        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    pub(crate) fn build_request(&self, endpoint: &str) -> RequestBuilder {
        self.http.post(self.url(endpoint))
    }

    /// Turn a non-success response into [`ApiError::Status`]
    pub(crate) async fn handle_error_response(
        &self,
        response: Response,
    ) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = parse_error_message(status, &body);
        warn!("Assistant service returned {}: {}", status, message);
        Err(ApiError::Status { status, message })
    }
}

#[async_trait]
impl ChatTransport for AssistantClient {
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, ApiError> {
        let endpoint = request.endpoint(true);
        debug!("Opening stream: POST {}", endpoint);

        let response = self
            .build_request(endpoint)
            .header(ACCEPT, "text/event-stream")
            .json(&request.body())
            .send()
            .await?;
        let response = self.handle_error_response(response).await?;

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(ApiError::from))
            .boxed())
    }

    async fn send(&self, request: &ChatRequest) -> Result<ChatReply, ApiError> {
        let endpoint = request.endpoint(false);
        debug!("Sending: POST {}", endpoint);

        let response = self
            .build_request(endpoint)
            .json(&request.body())
            .send()
            .await?;
        let response = self.handle_error_response(response).await?;

        Ok(response.json::<ChatReply>().await?)
    }
}
