// Host notifications: a load mapped onto a channel of progress and one terminal event.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::avatar::AvatarContext;
use crate::engine::loader::AvatarLoader;
use crate::error::AvatarError;
use crate::net::ProgressCallback;

#[derive(Debug)]
pub enum LoadEvent {
    Progress(f32),
    Completed(Box<AvatarContext>),
    Failed(AvatarError),
}

impl LoadEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LoadEvent::Progress(_))
    }
}

/// Start loading `input` on the runtime. The receiver yields progress events
/// followed by exactly one `Completed` or `Failed`.
pub fn spawn_load(
    loader: Arc<AvatarLoader>,
    input: String,
) -> (mpsc::UnboundedReceiver<LoadEvent>, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let progress_tx = tx.clone();

    let handle = tokio::spawn(async move {
        let progress: ProgressCallback = Arc::new(move |p: f32| {
            let _ = progress_tx.send(LoadEvent::Progress(p));
        });
        let event = match loader.load_with_progress(&input, Some(progress)).await {
            Ok(context) => LoadEvent::Completed(Box::new(context)),
            Err(e) => LoadEvent::Failed(e),
        };
        let _ = tx.send(event);
    });

    (rx, handle)
}
