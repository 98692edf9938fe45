//! Webhook transport.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::debug;

use crate::common::error::{DeliveryError, DeliveryResult};
use crate::config::EndpointConfig;

use super::failure::FailureCategory;

/// File name the payload's embed image refers to.
pub const SCREENSHOT_FILE_NAME: &str = "screenshot.png";

/// A serialized submission ready to be posted.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub event_id: u64,
    pub destination_ids: Vec<String>,
    pub payload_json: String,
    pub screenshot: Option<Bytes>,
}

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Optional out-of-band messages in a successful response body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ResponseNotice {
    pub notice: Option<String>,
    pub rank_update: Option<String>,
}

impl ResponseNotice {
    /// Parse a response body; bodies that are empty or not this shape yield `None`.
    pub fn parse(body: &str) -> Option<Self> {
        let body = body.trim();
        if body.is_empty() {
            return None;
        }
        serde_json::from_str::<ResponseNotice>(body)
            .ok()
            .filter(|n| n.notice.is_some() || n.rank_update.is_some())
    }
}

/// Something that can post a request to the endpoint.
///
/// Returns `Err` only when no HTTP response was obtained; every response,
/// whatever its status, is `Ok`.
pub trait Transport: Send + Sync + 'static {
    fn post(
        &self,
        request: &OutboundRequest,
    ) -> impl Future<Output = DeliveryResult<TransportResponse>> + Send;
}

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpTransport {
    pub fn new(config: &EndpointConfig) -> DeliveryResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(concat!("lootbridge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| transport_error(&e))?;
        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }
}

impl Transport for HttpTransport {
    async fn post(&self, request: &OutboundRequest) -> DeliveryResult<TransportResponse> {
        debug!(
            event_id = request.event_id,
            destinations = %request.destination_ids.join(","),
            screenshot = request.screenshot.is_some(),
            "Posting submission"
        );
        let builder = self.client.post(&self.url);
        let builder = match &request.screenshot {
            Some(image) => {
                let file = Part::bytes(image.to_vec())
                    .file_name(SCREENSHOT_FILE_NAME)
                    .mime_str("image/png")
                    .map_err(|e| transport_error(&e))?;
                let form = Form::new()
                    .text("payload_json", request.payload_json.clone())
                    .part("file", file);
                builder.multipart(form)
            }
            None => builder
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(request.payload_json.clone()),
        };

        let response = builder.send().await.map_err(|e| transport_error(&e))?;
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok(TransportResponse { status, body })
    }
}

fn transport_error(e: &reqwest::Error) -> DeliveryError {
    let category = if e.is_timeout() {
        FailureCategory::Timeout
    } else if e.is_connect() || e.is_request() {
        FailureCategory::Network
    } else {
        FailureCategory::Unknown
    };
    DeliveryError::Transport {
        category,
        message: e.to_string(),
    }
}
