// Stage protocol and the ordered runner that chains stages under one cancellation token.

pub mod operation;

use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::avatar::AvatarContext;
use crate::error::{AvatarError, AvatarResult};
use crate::net::ProgressCallback;

pub use operation::Operation;

/// Ordered sequence of stages run strictly one after another.
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn Operation>>,
    progress: Option<ProgressCallback>,
    timeout_secs: Option<u64>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stage(mut self, stage: impl Operation + 'static) -> Self {
        self.push(Box::new(stage));
        self
    }

    pub fn push(&mut self, mut stage: Box<dyn Operation>) {
        if let Some(secs) = self.timeout_secs {
            stage.set_timeout(secs);
        }
        self.stages.push(stage);
    }

    /// Apply a per-request timeout to every stage, present and future.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        for stage in &mut self.stages {
            stage.set_timeout(timeout_secs);
        }
        self
    }

    /// Overall progress: stage `i` of `n` reporting `p` maps to `(i + p) / n`.
    pub fn set_progress(&mut self, progress: Option<ProgressCallback>) {
        self.progress = progress;
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    fn scaled_progress(
        overall: &ProgressCallback,
        high_water: &Arc<Mutex<f32>>,
        index: usize,
        count: usize,
    ) -> ProgressCallback {
        let overall = Arc::clone(overall);
        let high_water = Arc::clone(high_water);
        Arc::new(move |p: f32| {
            let value = ((index as f32 + p.clamp(0.0, 1.0)) / count as f32).min(1.0);
            let mut reported = high_water.lock();
            if value > *reported {
                *reported = value;
                overall(value);
            }
        })
    }

    /// Run every stage in order.
    ///
    /// The first failure aborts the remaining stages and is returned as is.
    /// A cancelled token yields `Cancelled` and never a context, even when the
    /// last stage had already finished.
    pub async fn execute(
        &mut self,
        mut context: AvatarContext,
        token: &CancellationToken,
    ) -> AvatarResult<AvatarContext> {
        let count = self.stages.len();
        let high_water = Arc::new(Mutex::new(0.0f32));

        for (index, stage) in self.stages.iter_mut().enumerate() {
            if token.is_cancelled() {
                info!("pipeline cancelled before stage {}", stage.name());
                return Err(AvatarError::cancelled());
            }

            let progress = self
                .progress
                .as_ref()
                .map(|overall| Self::scaled_progress(overall, &high_water, index, count));
            stage.set_progress(progress);

            debug!("running stage {} ({}/{})", stage.name(), index + 1, count);
            context = match stage.execute(context, token).await {
                Ok(context) => context,
                Err(e) => {
                    warn!("stage {} failed: {}", stage.name(), e);
                    return Err(e);
                }
            };
            context.advance();
        }

        if token.is_cancelled() {
            info!("pipeline cancelled after its last stage");
            return Err(AvatarError::cancelled());
        }

        if let Some(progress) = &self.progress {
            if *high_water.lock() < 1.0 {
                progress(1.0);
            }
        }
        Ok(context)
    }
}
