use std::sync::Arc;

use async_trait::async_trait;
use image::DynamicImage;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::render_url::{RenderParameters, RenderUrlBuilder};
use crate::avatar::{AvatarContext, AvatarPayload};
use crate::config::DEFAULT_TIMEOUT_SECS;
use crate::error::{AvatarResult, FailureType};
use crate::net::{timeout_from_secs, Fetcher, ProgressCallback};
use crate::pipeline::Operation;

/// Requests a 2D render of the avatar. Renders are never cached.
pub struct AvatarRenderDownloader {
    fetcher: Arc<dyn Fetcher>,
    url_builder: Arc<dyn RenderUrlBuilder>,
    timeout_secs: u64,
    progress: Option<ProgressCallback>,
}

impl AvatarRenderDownloader {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self::with_url_builder(fetcher, Arc::new(RenderParameters))
    }

    pub fn with_url_builder(fetcher: Arc<dyn Fetcher>, url_builder: Arc<dyn RenderUrlBuilder>) -> Self {
        Self {
            fetcher,
            url_builder,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            progress: None,
        }
    }

    pub async fn request_render(&self, url: &str, token: &CancellationToken) -> AvatarResult<DynamicImage> {
        self.fetcher
            .download_texture(
                url,
                token,
                timeout_from_secs(self.timeout_secs),
                self.progress.clone(),
            )
            .await
    }
}

#[async_trait]
impl Operation for AvatarRenderDownloader {
    fn name(&self) -> &'static str {
        "render"
    }

    fn set_timeout(&mut self, timeout_secs: u64) {
        self.timeout_secs = timeout_secs;
    }

    fn set_progress(&mut self, progress: Option<ProgressCallback>) {
        self.progress = progress;
    }

    async fn execute(
        &self,
        mut context: AvatarContext,
        token: &CancellationToken,
    ) -> AvatarResult<AvatarContext> {
        // Callers only ever see one render failure kind; cancellation stays distinct.
        let url = self
            .url_builder
            .render_url(&context)
            .map_err(|e| e.rekind(FailureType::AvatarRenderError))?;
        let image = self
            .request_render(&url, token)
            .await
            .map_err(|e| e.rekind(FailureType::AvatarRenderError))?;

        info!(
            "avatar render downloaded for {} ({}x{})",
            context.avatar_uri.guid,
            image.width(),
            image.height()
        );
        context.data = AvatarPayload::Image(image);
        Ok(context)
    }
}
