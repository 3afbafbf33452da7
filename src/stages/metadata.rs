// Metadata stage: fetch (or, offline, load) avatar metadata and decide whether cached payloads are stale.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::avatar::{AvatarContext, AvatarMetadata};
use crate::cache::AvatarCacheStore;
use crate::config::DEFAULT_TIMEOUT_SECS;
use crate::error::{AvatarError, AvatarResult, FailureType};
use crate::net::{cache_bust_url, timeout_from_secs, Connectivity, Fetcher, ProgressCallback};
use crate::pipeline::Operation;

pub struct MetadataDownloader {
    fetcher: Arc<dyn Fetcher>,
    cache: Arc<dyn AvatarCacheStore>,
    connectivity: Arc<dyn Connectivity>,
    timeout_secs: u64,
    progress: Option<ProgressCallback>,
    cache_busting: bool,
}

impl MetadataDownloader {
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
            cache_busting: false,
        }
    }

    /// Append a unique query parameter to every metadata URL.
    pub fn with_cache_busting(mut self, enabled: bool) -> Self {
        self.cache_busting = enabled;
        self
    }

    /// Download and parse the metadata at `url`.
    ///
    /// Transport failures become `MetadataDownloadError`; parse failures and
    /// cancellation keep their own kind.
    pub async fn download(&self, url: &str, token: &CancellationToken) -> AvatarResult<AvatarMetadata> {
        debug!("downloading metadata into memory from {}", url);
        let url = if self.cache_busting {
            cache_bust_url(url)
        } else {
            url.to_string()
        };

        let result = match self
            .fetcher
            .download_into_memory(
                &url,
                token,
                timeout_from_secs(self.timeout_secs),
                self.progress.clone(),
            )
            .await
        {
            Ok(response) => AvatarMetadata::from_slice(&response.data),
            Err(e) => Err(e),
        };

        result.map_err(|error| {
            let error = match error.kind {
                FailureType::MetadataParseError | FailureType::Cancelled => error,
                _ => AvatarError::new(
                    FailureType::MetadataDownloadError,
                    format!("Failed to download metadata into memory. {}", error),
                ),
            };
            warn!("{}", error);
            error
        })
    }

    fn is_update_required(&self, context: &AvatarContext, metadata: &AvatarMetadata) -> bool {
        if context.save_in_project_folder() || !context.avatar_caching_enabled() {
            return true;
        }
        let previous = self
            .cache
            .load_metadata(&context.avatar_uri.local_metadata_path);
        metadata.is_updated(previous.as_ref())
    }
}

#[async_trait]
impl Operation for MetadataDownloader {
    fn name(&self) -> &'static str {
        "metadata"
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
                "metadata stage requires a resolved avatar locator",
            ));
        }
        let uri = &context.avatar_uri;

        if !self.connectivity.is_online() {
            let metadata = self.cache.load_metadata(&uri.local_metadata_path).ok_or_else(|| {
                AvatarError::new(
                    FailureType::MetadataDownloadError,
                    format!(
                        "network unreachable and no cached metadata at {}",
                        uri.local_metadata_path.display()
                    ),
                )
            })?;
            info!("offline, loaded cached {} metadata for {}", metadata.body_type(), uri.guid);
            context.metadata = Some(metadata);
            return Ok(context);
        }

        let metadata = self.download(&uri.metadata_url, token).await?;
        let update_required = self.is_update_required(&context, &metadata);

        if update_required {
            let uri = &context.avatar_uri;
            self.cache
                .save_metadata(
                    &uri.guid,
                    &uri.local_metadata_path,
                    &metadata,
                    context.save_in_project_folder(),
                )
                .map_err(|e| AvatarError::from_anyhow(FailureType::CacheError, e))?;
        }

        info!(
            "{} metadata loaded for {} (update required: {})",
            metadata.body_type(),
            context.avatar_uri.guid,
            update_required
        );
        context.metadata = Some(metadata);
        context.is_update_required = update_required;
        Ok(context)
    }
}
