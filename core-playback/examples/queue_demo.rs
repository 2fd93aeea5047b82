//! # Queue Player Demo
//!
//! Plays a queue of remote files through the desktop adapters with a console
//! media engine that "plays" each item for a second.
//!
//! Run with:
//! ```bash
//! cargo run --example queue_demo --package core-playback -- \
//!     https://example.com/a.mp4 https://example.com/b.mp4
//!
//! # JSON logs
//! QUEUE_DEMO_LOG=json cargo run --example queue_demo --package core-playback -- <urls>
//! ```

use async_trait::async_trait;
use bridge_desktop::{DesktopPlaybackLifecycle, ReqwestHttpClient, TokioFileSystem};
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{MediaEngine, MediaEvent, MediaEventStream, MediaItemId, RenderSurface};
use core_playback::{PlayerDataSource, PlayerDelegate, PlayerEngine, PlayerState};
use core_runtime::config::CoreConfig;
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tracing::info;

const ITEM_DURATION: Duration = Duration::from_secs(1);

// ============================================================================
// Console media engine
// ============================================================================

#[derive(Default)]
struct ConsoleState {
    items: Vec<(MediaItemId, PathBuf)>,
    current: Option<MediaItemId>,
    playing: bool,
    events: Option<mpsc::UnboundedSender<MediaEvent>>,
}

/// Reports `ItemEnded` for the current item after [`ITEM_DURATION`] of
/// uninterrupted playback.
#[derive(Default)]
struct ConsoleMediaEngine {
    state: Arc<Mutex<ConsoleState>>,
}

impl ConsoleMediaEngine {
    fn send(&self, event: MediaEvent) {
        if let Some(tx) = self.state.lock().events.as_ref() {
            let _ = tx.send(event);
        }
    }

    fn start_timer(&self, id: MediaItemId) {
        println!("  play     {id}");
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            tokio::time::sleep(ITEM_DURATION).await;
            let state = state.lock();
            if state.playing && state.current == Some(id) {
                if let Some(tx) = state.events.as_ref() {
                    let _ = tx.send(MediaEvent::ItemEnded(id));
                }
            }
        });
    }
}

struct ConsoleEvents(mpsc::UnboundedReceiver<MediaEvent>);

#[async_trait]
impl MediaEventStream for ConsoleEvents {
    async fn next(&mut self) -> Option<MediaEvent> {
        self.0.recv().await
    }
}

#[async_trait]
impl MediaEngine for ConsoleMediaEngine {
    async fn enqueue(&self, path: &Path) -> BridgeResult<MediaItemId> {
        let id = MediaItemId::new();
        println!("  enqueue  {}", path.display());
        self.state.lock().items.push((id, path.to_path_buf()));
        self.send(MediaEvent::ItemReady(id));
        Ok(id)
    }

    async fn play(&self) -> BridgeResult<()> {
        let current = {
            let mut state = self.state.lock();
            if state.current.is_none() {
                state.current = state.items.first().map(|(id, _)| *id);
            }
            state.playing = state.current.is_some();
            state.current
        };
        if let Some(id) = current {
            self.start_timer(id);
        }
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        self.state.lock().playing = false;
        Ok(())
    }

    async fn skip_to(&self, id: MediaItemId) -> BridgeResult<()> {
        let playing = {
            let mut state = self.state.lock();
            state.current = Some(id);
            state.playing
        };
        if playing {
            self.start_timer(id);
        }
        Ok(())
    }

    async fn remove_all(&self) -> BridgeResult<()> {
        let mut state = self.state.lock();
        state.items.clear();
        state.current = None;
        state.playing = false;
        Ok(())
    }

    async fn volume(&self) -> BridgeResult<f32> {
        Ok(1.0)
    }

    async fn set_volume(&self, _volume: f32) -> BridgeResult<()> {
        Ok(())
    }

    async fn attach_surface(&self, _surface: Arc<dyn RenderSurface>) -> BridgeResult<()> {
        Ok(())
    }

    async fn subscribe(&self) -> BridgeResult<Box<dyn MediaEventStream>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.lock().events = Some(tx);
        Ok(Box::new(ConsoleEvents(rx)))
    }
}

// ============================================================================
// Queue and delegate
// ============================================================================

struct UrlQueue(Vec<String>);

impl PlayerDataSource for UrlQueue {
    fn item_count(&self) -> usize {
        self.0.len()
    }

    fn item_identifier(&self, index: usize) -> String {
        self.0[index].clone()
    }
}

struct ConsoleDelegate {
    finished: Arc<Notify>,
}

impl PlayerDelegate for ConsoleDelegate {
    fn on_state_changed(&self, state: PlayerState) {
        println!("state -> {state}");
    }

    fn on_queue_ended(&self) {
        println!("queue ended");
        self.finished.notify_one();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let format = match std::env::var("QUEUE_DEMO_LOG").as_deref() {
        Ok("json") => LogFormat::Json,
        Ok("pretty") => LogFormat::Pretty,
        _ => LogFormat::Compact,
    };
    init_logging(LoggingConfig::default().with_format(format))?;

    let urls: Vec<String> = std::env::args().skip(1).collect();
    if urls.is_empty() {
        eprintln!("usage: queue_demo <url> [<url> ...]");
        return Ok(());
    }

    let core = CoreConfig::builder()
        .media_engine(Arc::new(ConsoleMediaEngine::default()))
        .http_client(Arc::new(ReqwestHttpClient::with_timeout(Duration::from_secs(30))))
        .file_system(Arc::new(TokioFileSystem::new()))
        .lifecycle(Arc::new(DesktopPlaybackLifecycle::new()))
        .build()?;

    let finished = Arc::new(Notify::new());
    let engine = PlayerEngine::builder(core, Arc::new(UrlQueue(urls)))
        .with_delegate(Arc::new(ConsoleDelegate {
            finished: Arc::clone(&finished),
        }))
        .build()
        .await?;

    info!("Starting playback");
    engine.play(None).await?;
    finished.notified().await;

    engine.shutdown().await?;
    Ok(())
}
