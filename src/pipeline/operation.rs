use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::avatar::AvatarContext;
use crate::error::AvatarResult;
use crate::net::ProgressCallback;

/// One unit of work in an avatar load.
///
/// A stage takes the context by value, mutates it and hands it back. It only
/// touches the context it was given and the injected cache store.
#[async_trait]
pub trait Operation: Send + Sync {
    fn name(&self) -> &'static str;

    /// Per-request timeout in seconds for every network call the stage makes. `0` disables it.
    fn set_timeout(&mut self, timeout_secs: u64);

    /// Callback receiving this stage's progress in `[0, 1]`.
    fn set_progress(&mut self, progress: Option<ProgressCallback>);

    async fn execute(
        &self,
        context: AvatarContext,
        token: &CancellationToken,
    ) -> AvatarResult<AvatarContext>;
}
