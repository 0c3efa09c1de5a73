//! Request client with built-in retry logic and error classification.

use log::debug;
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use super::error::{ApiError, CODE_DECODE, ErrorKind, classify};
use super::payload::Payload;
use super::retry::RetryConfig;
use super::transport::{HttpRequest, Transport};
use crate::auth::TokenStore;

/// Per-call request options.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Method,
    /// Headers that override the client's defaults.
    pub headers: HeaderMap,
    pub body: Option<String>,
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Default::default()
        }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    /// A request carrying `value` serialized as JSON.
    pub fn json<T: Serialize + ?Sized>(method: Method, value: &T) -> serde_json::Result<Self> {
        Ok(Self::new(method).body(serde_json::to_string(value)?))
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Client for the marketplace API.
///
/// Cheap to clone; clones share the transport, the token store and the retry configuration.
#[derive(Clone)]
pub struct RequestClient {
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenStore>,
    retry: Arc<RetryConfig>,
    base_url: String,
}

impl RequestClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenStore>,
        retry: RetryConfig,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            tokens,
            retry: Arc::new(retry),
            base_url: base_url.into(),
        }
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolves an endpoint against the base URL. Absolute URLs are used as-is.
    pub fn url_for(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    /// Default headers merged with the caller's; caller headers win.
    fn headers_for(&self, options: &RequestOptions) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = self.tokens.get() {
            match HeaderValue::from_str(&format!("Bearer {}", token)) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => debug!("Stored token is not a valid header value, sending no Authorization"),
            }
        }

        // Extending replaces every value of a key present in the caller's map
        headers.extend(options.headers.clone());
        headers
    }

    /// Performs exactly one HTTP call and normalizes its result.
    ///
    /// Non-2xx responses are classified into an [`ApiError`] carrying the decoded body;
    /// failing to get a response at all is a [`ErrorKind::Network`] error.
    #[tracing::instrument(skip(self, options), fields(method = %options.method))]
    pub async fn send(&self, endpoint: &str, options: &RequestOptions) -> Result<Payload, ApiError> {
        let request = HttpRequest {
            method: options.method.clone(),
            url: self.url_for(endpoint),
            headers: self.headers_for(options),
            body: options.body.clone(),
        };
        debug!("{} {}...", request.method, request.url);

        let response = self
            .transport
            .execute(request)
            .await
            .map_err(|e| ApiError::network(format!("{:#}", e)))?;

        let status = response.status;
        let success = response.is_success();
        let payload = response.into_payload();

        if success {
            Ok(payload)
        } else {
            let body = match payload {
                Payload::Text(text) if text.is_empty() => None,
                other => Some(other),
            };
            Err(classify(status, body))
        }
    }

    /// Sends a request, retrying transient failures with exponential backoff.
    ///
    /// Makes at most `max_retries + 1` attempts and fails with the error of the last one.
    #[tracing::instrument(skip(self, options), fields(method = %options.method))]
    pub async fn request(&self, endpoint: &str, options: RequestOptions) -> Result<Payload, ApiError> {
        let operation_name = format!("{} {}", options.method, endpoint);
        let options = &options;
        self.retry
            .run(&operation_name, self.retry.max_retries, move || {
                self.send(endpoint, options)
            })
            .await
    }

    /// Like [`request`](Self::request), deserializing a JSON payload into `T`.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        match self.request(endpoint, options).await? {
            Payload::Json(value) => serde_json::from_value(value).map_err(|e| {
                ApiError::new(ErrorKind::Unknown, format!("Unexpected response shape: {}", e))
                    .with_code(CODE_DECODE)
            }),
            payload @ Payload::Text(_) => Err(ApiError::new(
                ErrorKind::Unknown,
                "Expected a JSON response",
            )
            .with_code(CODE_DECODE)
            .with_payload(payload)),
        }
    }
}
