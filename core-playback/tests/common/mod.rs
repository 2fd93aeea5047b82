//! In-memory bridge implementations shared by the integration suites.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::{
    Clock, DirectoryEntry, FileSystemAccess, HttpClient, HttpRequest, HttpResponse, MediaEngine,
    MediaEvent, MediaEventStream, MediaItemId, PlaybackLifecycle, RenderSurface,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use core_playback::{
    PlayerConfig, PlayerDataSource, PlayerDelegate, PlayerEngine, PlayerSnapshot, PlayerState,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::EventBus;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Semaphore};

pub const CACHE_ROOT: &str = "/cache";
pub const START_TIME: i64 = 1_700_000_000;
const WAIT: Duration = Duration::from_secs(5);

// ============================================================================
// Clock
// ============================================================================

pub struct ManualClock {
    now: Mutex<i64>,
}

impl ManualClock {
    pub fn new(timestamp: i64) -> Self {
        Self {
            now: Mutex::new(timestamp),
        }
    }

    pub fn set(&self, timestamp: i64) {
        *self.now.lock() = timestamp;
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by.as_secs() as i64;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(*self.now.lock(), 0).unwrap()
    }
}

// ============================================================================
// File system
// ============================================================================

struct MemoryFile {
    data: Bytes,
    accessed_at: Option<i64>,
}

pub struct MemoryFileSystem {
    clock: Arc<ManualClock>,
    files: Mutex<HashMap<PathBuf, MemoryFile>>,
    dirs: Mutex<HashSet<PathBuf>>,
    fail_create_dir: AtomicBool,
    fail_delete: AtomicBool,
}

impl MemoryFileSystem {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            files: Mutex::new(HashMap::new()),
            dirs: Mutex::new(HashSet::new()),
            fail_create_dir: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
        }
    }

    pub fn fail_create_dir(&self, fail: bool) {
        self.fail_create_dir.store(fail, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    pub fn insert(&self, path: impl Into<PathBuf>, data: &'static [u8], accessed_at: Option<i64>) {
        self.files.lock().insert(
            path.into(),
            MemoryFile {
                data: Bytes::from_static(data),
                accessed_at,
            },
        );
    }

    pub fn add_dir(&self, path: impl Into<PathBuf>) {
        self.dirs.lock().insert(path.into());
    }

    pub fn read(&self, path: impl AsRef<Path>) -> Option<Bytes> {
        self.files.lock().get(path.as_ref()).map(|f| f.data.clone())
    }

    pub fn accessed_at(&self, path: impl AsRef<Path>) -> Option<i64> {
        self.files
            .lock()
            .get(path.as_ref())
            .and_then(|f| f.accessed_at)
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.files.lock().contains_key(path.as_ref())
    }

    pub fn file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .files
            .lock()
            .keys()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        names.sort();
        names
    }
}

fn not_found(path: &Path) -> BridgeError {
    BridgeError::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        path.display().to_string(),
    ))
}

#[async_trait]
impl FileSystemAccess for MemoryFileSystem {
    async fn get_cache_directory(&self) -> BridgeResult<PathBuf> {
        Ok(PathBuf::from(CACHE_ROOT))
    }

    async fn exists(&self, path: &Path) -> BridgeResult<bool> {
        Ok(self.files.lock().contains_key(path) || self.dirs.lock().contains(path))
    }

    async fn create_dir_all(&self, path: &Path) -> BridgeResult<()> {
        if self.fail_create_dir.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed("read-only volume".into()));
        }
        self.dirs.lock().insert(path.to_path_buf());
        Ok(())
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> BridgeResult<()> {
        let accessed_at = Some(self.clock.unix_timestamp());
        self.files
            .lock()
            .insert(path.to_path_buf(), MemoryFile { data, accessed_at });
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> BridgeResult<()> {
        let mut files = self.files.lock();
        let file = files.remove(from).ok_or_else(|| not_found(from))?;
        files.insert(to.to_path_buf(), file);
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> BridgeResult<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed("file busy".into()));
        }
        self.files
            .lock()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| not_found(path))
    }

    async fn list_directory_entries(&self, path: &Path) -> BridgeResult<Vec<DirectoryEntry>> {
        if !self.dirs.lock().contains(path) {
            return Err(not_found(path));
        }

        let mut entries: Vec<DirectoryEntry> = self
            .files
            .lock()
            .iter()
            .filter(|(p, _)| p.parent() == Some(path))
            .map(|(p, f)| DirectoryEntry::file(p.clone(), f.accessed_at))
            .collect();

        entries.extend(
            self.dirs
                .lock()
                .iter()
                .filter(|d| d.parent() == Some(path))
                .map(|d| DirectoryEntry {
                    path: d.clone(),
                    accessed_at: Some(0),
                    is_directory: true,
                    is_hidden: false,
                }),
        );

        Ok(entries)
    }

    async fn touch(&self, path: &Path) -> BridgeResult<()> {
        let now = self.clock.unix_timestamp();
        let mut files = self.files.lock();
        let file = files.get_mut(path).ok_or_else(|| not_found(path))?;
        file.accessed_at = Some(now);
        Ok(())
    }
}

// ============================================================================
// HTTP
// ============================================================================

/// HTTP fake whose responses can be held back per URL.
///
/// A gated URL's request blocks until [`GatedHttp::release`] is called for it,
/// which lets tests choose the completion order of concurrent downloads.
#[derive(Default)]
pub struct GatedHttp {
    gates: Mutex<HashMap<String, Arc<Semaphore>>>,
    statuses: Mutex<HashMap<String, u16>>,
    requests: Mutex<Vec<String>>,
}

impl GatedHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gate(&self, url: &str) {
        self.gates
            .lock()
            .insert(url.to_string(), Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self, url: &str) {
        if let Some(gate) = self.gates.lock().get(url) {
            gate.add_permits(1);
        }
    }

    pub fn respond_with_status(&self, url: &str, status: u16) {
        self.statuses.lock().insert(url.to_string(), status);
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requests.lock().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl HttpClient for GatedHttp {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        self.requests.lock().push(request.url.clone());

        let gate = self.gates.lock().get(&request.url).cloned();
        if let Some(gate) = gate {
            gate.acquire()
                .await
                .map_err(|e| BridgeError::OperationFailed(e.to_string()))?
                .forget();
        }

        let status = self.statuses.lock().get(&request.url).copied().unwrap_or(200);
        Ok(HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(format!("payload of {}", request.url)),
        })
    }
}

// ============================================================================
// Media engine
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum MediaCall {
    Enqueue(PathBuf),
    Play,
    Pause,
    SkipTo(MediaItemId),
    RemoveAll,
    SetVolume(f32),
    AttachSurface,
}

struct EventChannel(mpsc::UnboundedReceiver<MediaEvent>);

#[async_trait]
impl MediaEventStream for EventChannel {
    async fn next(&mut self) -> Option<MediaEvent> {
        self.0.recv().await
    }
}

/// Media engine that records every call and reports `ItemReady` for each
/// enqueued file unless told otherwise.
pub struct FakeMediaEngine {
    calls: Mutex<Vec<MediaCall>>,
    items: Mutex<Vec<(MediaItemId, PathBuf)>>,
    events: Mutex<Option<mpsc::UnboundedSender<MediaEvent>>>,
    auto_ready: AtomicBool,
    fail_play: AtomicBool,
    volume: Mutex<f32>,
}

impl Default for FakeMediaEngine {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            items: Mutex::new(Vec::new()),
            events: Mutex::new(None),
            auto_ready: AtomicBool::new(true),
            fail_play: AtomicBool::new(false),
            volume: Mutex::new(1.0),
        }
    }
}

impl FakeMediaEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn auto_ready(&self, enabled: bool) {
        self.auto_ready.store(enabled, Ordering::SeqCst);
    }

    pub fn fail_play(&self, fail: bool) {
        self.fail_play.store(fail, Ordering::SeqCst);
    }

    pub fn emit(&self, event: MediaEvent) {
        if let Some(tx) = self.events.lock().as_ref() {
            let _ = tx.send(event);
        }
    }

    pub fn calls(&self) -> Vec<MediaCall> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: &MediaCall) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }

    pub fn id_for(&self, file_name: &str) -> Option<MediaItemId> {
        self.items
            .lock()
            .iter()
            .find(|(_, path)| path.file_name().map_or(false, |n| n == file_name))
            .map(|(id, _)| *id)
    }

    pub fn has_subscriber(&self) -> bool {
        self.events
            .lock()
            .as_ref()
            .map_or(false, |tx| !tx.is_closed())
    }

    fn record(&self, call: MediaCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl MediaEngine for FakeMediaEngine {
    async fn enqueue(&self, path: &Path) -> BridgeResult<MediaItemId> {
        self.record(MediaCall::Enqueue(path.to_path_buf()));
        let id = MediaItemId::new();
        self.items.lock().push((id, path.to_path_buf()));
        if self.auto_ready.load(Ordering::SeqCst) {
            self.emit(MediaEvent::ItemReady(id));
        }
        Ok(id)
    }

    async fn play(&self) -> BridgeResult<()> {
        self.record(MediaCall::Play);
        if self.fail_play.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed("decoder unavailable".into()));
        }
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        self.record(MediaCall::Pause);
        Ok(())
    }

    async fn skip_to(&self, id: MediaItemId) -> BridgeResult<()> {
        self.record(MediaCall::SkipTo(id));
        Ok(())
    }

    async fn remove_all(&self) -> BridgeResult<()> {
        self.record(MediaCall::RemoveAll);
        self.items.lock().clear();
        Ok(())
    }

    async fn volume(&self) -> BridgeResult<f32> {
        Ok(*self.volume.lock())
    }

    async fn set_volume(&self, volume: f32) -> BridgeResult<()> {
        self.record(MediaCall::SetVolume(volume));
        *self.volume.lock() = volume;
        Ok(())
    }

    async fn attach_surface(&self, _surface: Arc<dyn RenderSurface>) -> BridgeResult<()> {
        self.record(MediaCall::AttachSurface);
        Ok(())
    }

    async fn subscribe(&self) -> BridgeResult<Box<dyn MediaEventStream>> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.events.lock() = Some(tx);
        Ok(Box::new(EventChannel(rx)))
    }
}

// ============================================================================
// Lifecycle, delegate, data source
// ============================================================================

#[derive(Default)]
pub struct RecordingLifecycle {
    calls: Mutex<Vec<&'static str>>,
    fail: AtomicBool,
}

impl RecordingLifecycle {
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn record(&self, call: &'static str) -> BridgeResult<()> {
        self.calls.lock().push(call);
        if self.fail.load(Ordering::SeqCst) {
            return Err(BridgeError::NotAvailable(call.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PlaybackLifecycle for RecordingLifecycle {
    async fn begin_background_execution(&self) -> BridgeResult<()> {
        self.record("begin_background")
    }

    async fn end_background_execution(&self) -> BridgeResult<()> {
        self.record("end_background")
    }

    async fn activate_audio_session(&self) -> BridgeResult<()> {
        self.record("activate_audio")
    }

    async fn deactivate_audio_session(&self) -> BridgeResult<()> {
        self.record("deactivate_audio")
    }
}

#[derive(Default)]
pub struct RecordingDelegate {
    states: Mutex<Vec<PlayerState>>,
    queue_ended: AtomicUsize,
}

impl RecordingDelegate {
    pub fn states(&self) -> Vec<PlayerState> {
        self.states.lock().clone()
    }

    pub fn queue_ended(&self) -> usize {
        self.queue_ended.load(Ordering::SeqCst)
    }
}

impl PlayerDelegate for RecordingDelegate {
    fn on_state_changed(&self, state: PlayerState) {
        self.states.lock().push(state);
    }

    fn on_queue_ended(&self) {
        self.queue_ended.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct Surface;

impl RenderSurface for Surface {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

pub struct StaticDataSource {
    identifiers: Vec<String>,
    with_surface: bool,
}

impl StaticDataSource {
    pub fn new(identifiers: Vec<String>) -> Self {
        Self {
            identifiers,
            with_surface: false,
        }
    }

    pub fn with_surface(mut self) -> Self {
        self.with_surface = true;
        self
    }
}

impl PlayerDataSource for StaticDataSource {
    fn item_count(&self) -> usize {
        self.identifiers.len()
    }

    fn item_identifier(&self, index: usize) -> String {
        self.identifiers[index].clone()
    }

    fn render_surface(&self) -> Option<Arc<dyn RenderSurface>> {
        if self.with_surface {
            Some(Arc::new(Surface))
        } else {
            None
        }
    }
}

// ============================================================================
// Harness
// ============================================================================

pub fn episode_url(index: usize) -> String {
    format!("https://media.example.com/show/ep{index:02}.mp4")
}

pub fn episode_file(index: usize) -> String {
    format!("ep{index:02}.mp4")
}

pub fn cached_path(index: usize) -> PathBuf {
    Path::new(CACHE_ROOT)
        .join("queue-player")
        .join(episode_file(index))
}

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub fs: Arc<MemoryFileSystem>,
    pub http: Arc<GatedHttp>,
    pub media: Arc<FakeMediaEngine>,
    pub lifecycle: Arc<RecordingLifecycle>,
    pub delegate: Arc<RecordingDelegate>,
    pub bus: EventBus,
    pub urls: Vec<String>,
}

impl Harness {
    pub fn new(items: usize) -> Self {
        let clock = Arc::new(ManualClock::new(START_TIME));
        Self {
            fs: Arc::new(MemoryFileSystem::new(Arc::clone(&clock))),
            clock,
            http: Arc::new(GatedHttp::new()),
            media: Arc::new(FakeMediaEngine::new()),
            lifecycle: Arc::new(RecordingLifecycle::default()),
            delegate: Arc::new(RecordingDelegate::default()),
            bus: EventBus::new(256),
            urls: (0..items).map(episode_url).collect(),
        }
    }

    pub fn gate_all(&self) {
        for url in &self.urls {
            self.http.gate(url);
        }
    }

    pub fn core_config(&self) -> CoreConfig {
        CoreConfig::builder()
            .media_engine(self.media.clone())
            .http_client(self.http.clone())
            .file_system(self.fs.clone())
            .lifecycle(self.lifecycle.clone())
            .clock(self.clock.clone())
            .build()
            .unwrap()
    }

    pub async fn start(&self, window: usize) -> PlayerEngine {
        self.start_with(StaticDataSource::new(self.urls.clone()), window)
            .await
    }

    pub async fn start_with(&self, data_source: StaticDataSource, window: usize) -> PlayerEngine {
        PlayerEngine::builder(self.core_config(), Arc::new(data_source))
            .with_config(PlayerConfig::default().with_prefetch_window_size(window))
            .with_delegate(self.delegate.clone())
            .with_event_bus(self.bus.clone())
            .build()
            .await
            .unwrap()
    }
}

/// Waits until a published snapshot satisfies `predicate`.
pub async fn wait_for<F>(engine: &PlayerEngine, predicate: F) -> PlayerSnapshot
where
    F: FnMut(&PlayerSnapshot) -> bool,
{
    let mut rx: watch::Receiver<PlayerSnapshot> = engine.subscribe();
    let snapshot = tokio::time::timeout(WAIT, rx.wait_for(predicate))
        .await
        .expect("timed out waiting for player snapshot")
        .expect("player engine stopped");
    snapshot.clone()
}

/// Polls `condition` until it holds.
pub async fn eventually<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + WAIT;
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Gives background tasks time to act on something that should be ignored.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
