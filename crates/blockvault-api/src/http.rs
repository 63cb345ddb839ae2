//! Production HTTP client.
//!
//! Implements [`HttpClientPort`] with reqwest. Requests honor per-request
//! timeouts and cancellation; blob bodies are streamed chunk by chunk so
//! progress deltas reach the caller while bytes are still arriving.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use blockvault_core::ports::http::{
    BlobRequest, HttpClientPort, HttpError, HttpMethod, JsonRequest,
};

/// Default per-request timeout when the caller does not set one.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Production HTTP backend using reqwest.
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Create the client.
    #[must_use]
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .build()
            .expect("failed to create HTTP client");
        Self { client }
    }

    fn build_request(
        &self,
        url: &str,
        method: HttpMethod,
        headers: &[(String, String)],
        timeout_ms: Option<u64>,
    ) -> reqwest::RequestBuilder {
        let mut request = match method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => self.client.post(url),
        };
        for (name, value) in headers {
            request = request.header(name, value);
        }
        request.timeout(timeout_ms.map_or(DEFAULT_TIMEOUT, Duration::from_millis))
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

fn map_send_error(err: &reqwest::Error, url: &str) -> HttpError {
    if err.is_timeout() {
        HttpError::Timeout {
            url: url.to_string(),
        }
    } else {
        HttpError::Network {
            message: err.to_string(),
        }
    }
}

fn check_status(response: &reqwest::Response, url: &str) -> Result<(), HttpError> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(HttpError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        })
    }
}

async fn send_with_cancel(
    request: reqwest::RequestBuilder,
    cancel: &CancellationToken,
    url: &str,
) -> Result<reqwest::Response, HttpError> {
    tokio::select! {
        biased;

        () = cancel.cancelled() => Err(HttpError::Cancelled),

        result = request.send() => result.map_err(|e| map_send_error(&e, url)),
    }
}

#[async_trait]
impl HttpClientPort for ReqwestHttpClient {
    async fn fetch_json(&self, request: JsonRequest) -> Result<serde_json::Value, HttpError> {
        let mut builder = self.build_request(
            &request.url,
            request.method,
            &request.headers,
            request.timeout_ms,
        );
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = send_with_cancel(builder, &request.cancel, &request.url).await?;
        check_status(&response, &request.url)?;

        tokio::select! {
            biased;

            () = request.cancel.cancelled() => Err(HttpError::Cancelled),

            body = response.json::<serde_json::Value>() => {
                body.map_err(|e| HttpError::InvalidResponse {
                    message: e.to_string(),
                })
            }
        }
    }

    async fn fetch_blob(&self, request: BlobRequest) -> Result<Vec<u8>, HttpError> {
        let builder = self.build_request(
            &request.url,
            request.method,
            &request.headers,
            request.timeout_ms,
        );

        let response = send_with_cancel(builder, &request.cancel, &request.url).await?;
        check_status(&response, &request.url)?;

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        loop {
            let chunk = tokio::select! {
                biased;

                () = request.cancel.cancelled() => return Err(HttpError::Cancelled),

                chunk = stream.next() => chunk,
            };
            match chunk {
                Some(Ok(bytes)) => {
                    body.extend_from_slice(&bytes);
                    if let Some(on_progress) = &request.on_progress {
                        on_progress(bytes.len() as u64);
                    }
                }
                Some(Err(err)) => return Err(map_send_error(&err, &request.url)),
                None => break,
            }
        }
        Ok(body)
    }
}
