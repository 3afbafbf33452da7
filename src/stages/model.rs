// Model stage: reuse the cached .glb while it is current, otherwise download and cache it.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::avatar::{AvatarContext, AvatarPayload};
use crate::cache::AvatarCacheStore;
use crate::config::DEFAULT_TIMEOUT_SECS;
use crate::error::{AvatarError, AvatarResult, FailureType};
use crate::net::{timeout_from_secs, Connectivity, Fetcher, ProgressCallback};
use crate::pipeline::Operation;

pub struct ModelDownloader {
    fetcher: Arc<dyn Fetcher>,
    cache: Arc<dyn AvatarCacheStore>,
    connectivity: Arc<dyn Connectivity>,
    timeout_secs: u64,
    progress: Option<ProgressCallback>,
}

impl ModelDownloader {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        cache: Arc<dyn AvatarCacheStore>,
        connectivity: Arc<dyn Connectivity>,
    ) -> Self {
        Self {
            fetcher,
            cache,
            connectivity,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            progress: None,
        }
    }
}

#[async_trait]
impl Operation for ModelDownloader {
    fn name(&self) -> &'static str {
        "model"
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
        if context.avatar_uri.is_default() {
            return Err(AvatarError::new(
                FailureType::InvalidInput,
                "model stage requires a resolved avatar locator",
            ));
        }
        let uri = &context.avatar_uri;

        if !context.is_update_required {
            if let Some(data) = self.cache.load_model(&uri.local_model_path) {
                info!("loading cached model for {} ({} bytes)", uri.guid, data.len());
                context.data = AvatarPayload::Bytes(data);
                return Ok(context);
            }
        }

        if !self.connectivity.is_online() {
            return Err(AvatarError::new(
                FailureType::ModelDownloadError,
                format!(
                    "network unreachable and no cached model at {}",
                    uri.local_model_path.display()
                ),
            ));
        }

        debug!("downloading model for {} from {}", uri.guid, uri.model_url);
        let response = self
            .fetcher
            .download_into_memory(
                &uri.model_url,
                token,
                timeout_from_secs(self.timeout_secs),
                self.progress.clone(),
            )
            .await
            .map_err(|e| {
                if e.is_cancelled() {
                    e
                } else {
                    AvatarError::new(
                        FailureType::ModelDownloadError,
                        format!("Failed to download model. {}", e.message),
                    )
                }
            })?;

        if context.avatar_caching_enabled() || context.save_in_project_folder() {
            self.cache
                .save_model(
                    &uri.guid,
                    &uri.local_model_path,
                    &response.data,
                    context.save_in_project_folder(),
                )
                .map_err(|e| AvatarError::from_anyhow(FailureType::CacheError, e))?;
        }

        info!("model downloaded for {} ({} bytes)", uri.guid, response.data.len());
        context.data = AvatarPayload::Bytes(response.data);
        Ok(context)
    }
}
