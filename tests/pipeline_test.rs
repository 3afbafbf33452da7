// Pipeline runner tests: ordering, failure propagation, cancellation and progress.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use avatar_loader_engine::cache::{CacheLayout, InMemoryCacheStore};
use avatar_loader_engine::net::{HttpFetcher, NetworkStatus, ProgressCallback};
use avatar_loader_engine::stages::MetadataDownloader;
use avatar_loader_engine::{
    AvatarContext, AvatarError, AvatarResult, AvatarUri, FailureType, Operation, Pipeline,
};

/// Fake stage that records its name, reports two progress steps and optionally fails.
struct RecordingStage {
    name: &'static str,
    log: Arc<Mutex<Vec<String>>>,
    fail_with: Option<FailureType>,
    cancel_on_finish: Option<CancellationToken>,
    progress: Option<ProgressCallback>,
    timeout: Arc<Mutex<Option<u64>>>,
}

impl RecordingStage {
    fn new(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name,
            log: Arc::clone(log),
            fail_with: None,
            cancel_on_finish: None,
            progress: None,
            timeout: Arc::new(Mutex::new(None)),
        }
    }

    fn failing(mut self, kind: FailureType) -> Self {
        self.fail_with = Some(kind);
        self
    }
}

#[async_trait]
impl Operation for RecordingStage {
    fn name(&self) -> &'static str {
        self.name
    }

    fn set_timeout(&mut self, timeout_secs: u64) {
        *self.timeout.lock() = Some(timeout_secs);
    }

    fn set_progress(&mut self, progress: Option<ProgressCallback>) {
        self.progress = progress;
    }

    async fn execute(
        &self,
        context: AvatarContext,
        _token: &CancellationToken,
    ) -> AvatarResult<AvatarContext> {
        self.log.lock().push(self.name.to_string());
        if let Some(progress) = &self.progress {
            progress(0.5);
            progress(1.0);
        }
        if let Some(kind) = self.fail_with {
            return Err(AvatarError::new(kind, format!("{} failed", self.name)));
        }
        if let Some(token) = &self.cancel_on_finish {
            token.cancel();
        }
        Ok(context)
    }
}

fn resolved_context() -> AvatarContext {
    let layout = CacheLayout::new("/cache", "/project");
    let uri = AvatarUri::resolve("6409cdd7a2eb6a2ca3bd5da8", &layout, false).unwrap();
    AvatarContext::new(uri, false, true)
}

#[tokio::test]
async fn test_stages_run_in_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut pipeline = Pipeline::new()
        .with_stage(RecordingStage::new("metadata", &log))
        .with_stage(RecordingStage::new("model", &log))
        .with_stage(RecordingStage::new("render", &log));
    let token = CancellationToken::new();

    let ctx = pipeline.execute(resolved_context(), &token).await.unwrap();

    assert_eq!(*log.lock(), vec!["metadata", "model", "render"]);
    assert_eq!(ctx.revision(), 3);
}

#[tokio::test]
async fn test_failure_aborts_remaining_stages() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut pipeline = Pipeline::new()
        .with_stage(RecordingStage::new("metadata", &log))
        .with_stage(RecordingStage::new("model", &log).failing(FailureType::ModelDownloadError))
        .with_stage(RecordingStage::new("render", &log));
    let token = CancellationToken::new();

    let err = pipeline
        .execute(resolved_context(), &token)
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureType::ModelDownloadError);
    assert_eq!(err.message, "model failed");
    assert_eq!(*log.lock(), vec!["metadata", "model"]);
}

#[tokio::test]
async fn test_cancelled_token_runs_nothing() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut pipeline = Pipeline::new().with_stage(RecordingStage::new("metadata", &log));
    let token = CancellationToken::new();
    token.cancel();

    let err = pipeline
        .execute(resolved_context(), &token)
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureType::Cancelled);
    assert!(log.lock().is_empty());
}

#[tokio::test]
async fn test_cancel_during_last_stage_produces_no_context() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let token = CancellationToken::new();
    let mut last = RecordingStage::new("render", &log);
    last.cancel_on_finish = Some(token.clone());
    let mut pipeline = Pipeline::new()
        .with_stage(RecordingStage::new("metadata", &log))
        .with_stage(last);

    let err = pipeline
        .execute(resolved_context(), &token)
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureType::Cancelled);
    assert_eq!(log.lock().len(), 2);
}

#[tokio::test]
async fn test_cancel_after_completion_is_noop() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut pipeline = Pipeline::new().with_stage(RecordingStage::new("metadata", &log));
    let token = CancellationToken::new();

    let ctx = pipeline.execute(resolved_context(), &token).await.unwrap();
    token.cancel();

    assert_eq!(ctx.revision(), 1);
    assert_eq!(ctx.avatar_uri.guid, "6409cdd7a2eb6a2ca3bd5da8");
}

#[tokio::test]
async fn test_progress_is_scaled_and_monotonic() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let mut pipeline = Pipeline::new()
        .with_stage(RecordingStage::new("metadata", &log))
        .with_stage(RecordingStage::new("model", &log));
    pipeline.set_progress(Some(Arc::new(move |p: f32| sink.lock().push(p))));
    let token = CancellationToken::new();

    pipeline.execute(resolved_context(), &token).await.unwrap();

    assert_eq!(*seen.lock(), vec![0.25, 0.5, 0.75, 1.0]);
}

#[tokio::test]
async fn test_timeout_is_pushed_into_every_stage() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let first = RecordingStage::new("metadata", &log);
    let first_timeout = Arc::clone(&first.timeout);
    let second = RecordingStage::new("model", &log);
    let second_timeout = Arc::clone(&second.timeout);

    let pipeline = Pipeline::new()
        .with_stage(first)
        .with_timeout(7)
        .with_stage(second);

    assert_eq!(pipeline.len(), 2);
    assert_eq!(*first_timeout.lock(), Some(7));
    assert_eq!(*second_timeout.lock(), Some(7));
}

async fn start_slow_server() -> SocketAddr {
    async fn slow() -> impl IntoResponse {
        tokio::time::sleep(Duration::from_secs(30)).await;
        r#"{"bodyType": 1}"#
    }
    let app = Router::new().route("/avatars/{file}", get(slow));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn test_cancel_in_flight_download_terminates_promptly() {
    let addr = start_slow_server().await;
    let log = Arc::new(Mutex::new(Vec::new()));
    let layout = CacheLayout::new("/cache", "/project");
    let uri = AvatarUri::resolve(
        &format!("http://{}/avatars/6409cdd7a2eb6a2ca3bd5da8.glb", addr),
        &layout,
        false,
    )
    .unwrap();
    let mut pipeline = Pipeline::new()
        .with_stage(MetadataDownloader::new(
            Arc::new(HttpFetcher::new()),
            Arc::new(InMemoryCacheStore::new()),
            Arc::new(NetworkStatus::online()),
        ))
        .with_stage(RecordingStage::new("model", &log));
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    let err = pipeline
        .execute(AvatarContext::new(uri, false, true), &token)
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureType::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(log.lock().is_empty());
}
