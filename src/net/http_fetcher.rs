use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, CONTENT_TYPE, LAST_MODIFIED};
use reqwest::{Client, RequestBuilder};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use super::traits::{FetchResponse, Fetcher, ProgressCallback};
use crate::config::CACHE_BUST_PARAM;
use crate::error::{AvatarError, AvatarResult, FailureType};

/// Upper bound on the buffer reserved up front from a `Content-Length` header (16 MB).
const MAX_PREALLOC_BYTES: u64 = 16 * 1024 * 1024;

/// Append a unique `tail` query parameter so no intermediate cache can answer the request.
pub fn cache_bust_url(url: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!(
        "{}{}{}={}",
        url,
        separator,
        CACHE_BUST_PARAM,
        Uuid::new_v4().simple()
    )
}

fn download_error(message: String) -> AvatarError {
    AvatarError::new(FailureType::DownloadError, message)
}

fn header_string(headers: &HeaderMap, name: reqwest::header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

pub struct HttpFetcher {
    client: Client,
    headers: HashMap<String, String>,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::with_headers(HashMap::new())
    }

    /// Fetcher that sends `headers` with every request.
    pub fn with_headers(headers: HashMap<String, String>) -> Self {
        Self::with_client(Client::new(), headers)
    }

    pub fn with_client(client: Client, headers: HashMap<String, String>) -> Self {
        Self { client, headers }
    }

    fn build_request(&self, url: &str) -> RequestBuilder {
        let mut req = self.client.get(url);
        for (k, v) in &self.headers {
            req = req.header(k.as_str(), v.as_str());
        }
        req
    }

    async fn fetch(&self, url: &str, progress: Option<ProgressCallback>) -> AvatarResult<FetchResponse> {
        let resp = self
            .build_request(url)
            .send()
            .await
            .map_err(|e| download_error(format!("request to {} failed: {}", url, e)))?;

        let status = resp.status();
        if !status.is_success() {
            warn!("http download failed status={} url={}", status.as_u16(), url);
            return Err(download_error(format!(
                "request to {} failed: HTTP {}",
                url,
                status.as_u16()
            )));
        }

        let last_modified = header_string(resp.headers(), LAST_MODIFIED);
        let content_type = header_string(resp.headers(), CONTENT_TYPE);
        let total = resp.content_length().filter(|len| *len > 0);

        let mut body = BytesMut::with_capacity(total.unwrap_or(0).min(MAX_PREALLOC_BYTES) as usize);
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| download_error(format!("reading body of {} failed: {}", url, e)))?;
            body.extend_from_slice(&chunk);

            // Unknown-length responses only report completion.
            if let (Some(total), Some(progress)) = (total, progress.as_ref()) {
                progress((body.len() as f32 / total as f32).min(1.0));
            }
        }
        if let Some(progress) = progress.as_ref() {
            progress(1.0);
        }

        debug!("downloaded {} bytes from {}", body.len(), url);
        Ok(FetchResponse {
            data: body.freeze(),
            last_modified,
            content_type,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn download_into_memory(
        &self,
        url: &str,
        token: &CancellationToken,
        timeout: Option<Duration>,
        progress: Option<ProgressCallback>,
    ) -> AvatarResult<FetchResponse> {
        if token.is_cancelled() {
            return Err(AvatarError::cancelled());
        }

        let request = self.fetch(url, progress);
        let bounded = async {
            match timeout {
                Some(limit) => match tokio::time::timeout(limit, request).await {
                    Ok(result) => result,
                    Err(_) => Err(download_error(format!(
                        "request to {} timed out after {}s",
                        url,
                        limit.as_secs_f32()
                    ))),
                },
                None => request.await,
            }
        };

        // Dropping the losing branch aborts the request and releases its connection.
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!("download of {} cancelled", url);
                Err(AvatarError::cancelled())
            }
            result = bounded => result,
        }
    }
}
