use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use image::DynamicImage;
use tokio_util::sync::CancellationToken;

use crate::error::{AvatarError, AvatarResult, FailureType};

/// Receives download progress as a fraction in `[0, 1]`.
pub type ProgressCallback = Arc<dyn Fn(f32) + Send + Sync>;

#[derive(Debug)]
pub struct FetchResponse {
    pub data: Bytes,
    /// Raw `Last-Modified` response header, if the server sent one.
    pub last_modified: Option<String>,
    pub content_type: Option<String>,
}

/// Cancellable downloader used by every pipeline stage.
///
/// Implementations must fail with `Cancelled` once `token` fires and must
/// abort the in-flight request rather than let it run to completion.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn download_into_memory(
        &self,
        url: &str,
        token: &CancellationToken,
        timeout: Option<Duration>,
        progress: Option<ProgressCallback>,
    ) -> AvatarResult<FetchResponse>;

    async fn download_texture(
        &self,
        url: &str,
        token: &CancellationToken,
        timeout: Option<Duration>,
        progress: Option<ProgressCallback>,
    ) -> AvatarResult<DynamicImage> {
        let response = self
            .download_into_memory(url, token, timeout, progress)
            .await?;
        decode_texture(&response.data)
    }
}

pub fn decode_texture(data: &[u8]) -> AvatarResult<DynamicImage> {
    image::load_from_memory(data).map_err(|e| {
        AvatarError::new(
            FailureType::DownloadError,
            format!("failed to decode texture: {}", e),
        )
    })
}
