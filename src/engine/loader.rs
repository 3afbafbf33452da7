// Avatar loader. Builds contexts, runs the standard pipelines and owns the cancel handle.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::avatar::{AvatarContext, AvatarUri};
use crate::cache::{AvatarCacheStore, CacheLayout, FileCacheStore};
use crate::config::LoaderConfig;
use crate::error::AvatarResult;
use crate::net::{Connectivity, Fetcher, HttpFetcher, NetworkStatus, ProgressCallback};
use crate::pipeline::Pipeline;
use crate::stages::{AvatarRenderDownloader, MetadataDownloader, ModelDownloader, RenderSettings};

pub struct AvatarLoader {
    config: LoaderConfig,
    layout: CacheLayout,
    cache: Arc<dyn AvatarCacheStore>,
    fetcher: Arc<dyn Fetcher>,
    connectivity: Arc<dyn Connectivity>,
    cancel_token: Mutex<CancellationToken>,
    progress: Mutex<Option<ProgressCallback>>,
}

impl AvatarLoader {
    pub fn new(
        config: LoaderConfig,
        layout: CacheLayout,
        cache: Arc<dyn AvatarCacheStore>,
        fetcher: Arc<dyn Fetcher>,
        connectivity: Arc<dyn Connectivity>,
    ) -> Self {
        Self {
            config,
            layout,
            cache,
            fetcher,
            connectivity,
            cancel_token: Mutex::new(CancellationToken::new()),
            progress: Mutex::new(None),
        }
    }

    /// Loader backed by the filesystem cache, the reqwest fetcher and an
    /// always-online reachability flag.
    pub fn from_config(config: LoaderConfig) -> Result<Self> {
        let layout = CacheLayout::from_config(&config)?;
        let cache = Arc::new(FileCacheStore::new(layout.clone()));
        Ok(Self::new(
            config,
            layout,
            cache,
            Arc::new(HttpFetcher::new()),
            Arc::new(NetworkStatus::online()),
        ))
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<dyn AvatarCacheStore> {
        &self.cache
    }

    /// Overall progress of subsequent loads.
    pub fn set_progress(&self, progress: Option<ProgressCallback>) {
        *self.progress.lock() = progress;
    }

    /// Cancel every in-flight load. Loads started afterwards are unaffected.
    pub fn cancel(&self) {
        let mut token = self.cancel_token.lock();
        token.cancel();
        *token = CancellationToken::new();
        info!("avatar loads cancelled");
    }

    /// Build a fresh context for `input` (model URL or avatar id) from the config.
    pub fn resolve(&self, input: &str) -> AvatarResult<AvatarContext> {
        let uri = AvatarUri::resolve(input, &self.layout, self.config.save_in_project_folder)?;
        Ok(AvatarContext::from_config(uri, &self.config))
    }

    /// Fetch metadata and the model, reusing cached copies while they are current.
    pub async fn load(&self, input: &str) -> AvatarResult<AvatarContext> {
        let progress = self.progress.lock().clone();
        self.load_with_progress(input, progress).await
    }

    /// Like [`AvatarLoader::load`], reporting overall progress to `progress` instead.
    pub async fn load_with_progress(
        &self,
        input: &str,
        progress: Option<ProgressCallback>,
    ) -> AvatarResult<AvatarContext> {
        let context = self.resolve(input)?;
        let pipeline = Pipeline::new()
            .with_stage(
                MetadataDownloader::new(
                    Arc::clone(&self.fetcher),
                    Arc::clone(&self.cache),
                    Arc::clone(&self.connectivity),
                )
                .with_cache_busting(self.config.cache_busting),
            )
            .with_stage(ModelDownloader::new(
                Arc::clone(&self.fetcher),
                Arc::clone(&self.cache),
                Arc::clone(&self.connectivity),
            ));
        self.run(pipeline, context, progress).await
    }

    /// Fetch a 2D render of the avatar.
    pub async fn load_render(
        &self,
        input: &str,
        settings: RenderSettings,
    ) -> AvatarResult<AvatarContext> {
        let context = self.resolve(input)?.with_render_settings(settings);
        let pipeline =
            Pipeline::new().with_stage(AvatarRenderDownloader::new(Arc::clone(&self.fetcher)));
        let progress = self.progress.lock().clone();
        self.run(pipeline, context, progress).await
    }

    async fn run(
        &self,
        pipeline: Pipeline,
        context: AvatarContext,
        progress: Option<ProgressCallback>,
    ) -> AvatarResult<AvatarContext> {
        let token = self.cancel_token.lock().child_token();
        let mut pipeline = pipeline.with_timeout(self.config.timeout_secs);
        pipeline.set_progress(progress);

        let guid = context.avatar_uri.guid.clone();
        let started = Instant::now();
        info!("loading avatar {} ({} stages)", guid, pipeline.len());

        let result = pipeline.execute(context, &token).await;
        match &result {
            Ok(_) => info!(
                "avatar {} loaded in {}ms",
                guid,
                started.elapsed().as_millis()
            ),
            Err(e) => warn!("avatar {} failed: {}", guid, e),
        }
        result
    }
}
