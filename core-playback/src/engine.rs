//! # Player Engine
//!
//! The playback state machine runs as a single tokio task that owns the
//! state, the current index, the ready item queue and the generation
//! counter. Everything that mutates them arrives as a message:
//!
//! ```text
//!   PlayerEngine ──commands──┐
//!                            ▼
//!   PrefetchScheduler ──► signals ──► engine task ──► MediaEngine
//!   DownloadCoordinator ─►   ▲                  └──► PlaybackLifecycle
//!   MediaEventStream ────────┘                  └──► PlayerDelegate / EventBus
//! ```
//!
//! Commands are applied in call order. Signals are applied in arrival order,
//! which for downloads is completion order, not queue order.
//!
//! Dropping the [`PlayerEngine`] closes the command channel; the task then
//! pauses playback, releases both resource intents, drops the media event
//! subscription and stops its workers. [`PlayerEngine::shutdown`] does the
//! same and waits for it.

use crate::cache::DiskCache;
use crate::config::PlayerConfig;
use crate::download::{DownloadCoordinator, DownloadOutcome};
use crate::error::{PlaybackError, Result};
use crate::prefetch::{PrefetchPlan, PrefetchScheduler, SlotDecision};
use crate::state::{IntentToggle, PlayerState, ResourceIntents};
use crate::traits::{PlayerDataSource, PlayerDelegate};
use bridge_traits::{MediaEngine, MediaEvent, MediaItemId, PlaybackLifecycle};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use core_runtime::logging::{redact_url, strip_path};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// A queue item whose payload is on disk and handed to the media engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyItem {
    pub slot: usize,
    pub identifier: String,
    pub path: PathBuf,
    pub media_id: MediaItemId,
}

/// Point-in-time view of the engine, published after every message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerSnapshot {
    pub state: PlayerState,
    pub current_index: Option<usize>,
    /// In arrival order.
    pub ready_items: Vec<ReadyItem>,
    /// Sorted identifiers with an outstanding download.
    pub in_flight: Vec<String>,
}

enum Command {
    Play {
        index: Option<usize>,
        respond_to: oneshot::Sender<Result<()>>,
    },
    Pause {
        respond_to: oneshot::Sender<Result<()>>,
    },
    Next {
        respond_to: oneshot::Sender<Result<()>>,
    },
    Previous {
        respond_to: oneshot::Sender<Result<()>>,
    },
    Reset {
        respond_to: oneshot::Sender<Result<()>>,
    },
    Shutdown {
        respond_to: oneshot::Sender<()>,
    },
}

enum Signal {
    Plan(PrefetchPlan),
    Downloaded(DownloadOutcome),
    Media(MediaEvent),
}

/// Builder for [`PlayerEngine`].
pub struct PlayerEngineBuilder {
    core: CoreConfig,
    data_source: Arc<dyn PlayerDataSource>,
    config: PlayerConfig,
    delegate: Option<Arc<dyn PlayerDelegate>>,
    events: Option<EventBus>,
}

impl PlayerEngineBuilder {
    pub fn with_config(mut self, config: PlayerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_delegate(mut self, delegate: Arc<dyn PlayerDelegate>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    /// Mirrors state, cache and download notifications onto `bus`.
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    /// Creates the cache root, subscribes to media events and starts the
    /// engine task. Must be called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`PlaybackError::InvalidConfig`] for an invalid [`PlayerConfig`]
    /// - [`PlaybackError::CacheRootUnavailable`] when the cache root cannot
    ///   be created
    /// - [`PlaybackError::Bridge`] when the media engine refuses the event
    ///   subscription
    pub async fn build(self) -> Result<PlayerEngine> {
        let config = self.config;
        config.validate()?;

        let base = match &self.core.cache_dir {
            Some(dir) => dir.clone(),
            None => self.core.file_system.get_cache_directory().await?,
        };
        let cache = Arc::new(DiskCache::new(
            Arc::clone(&self.core.file_system),
            Arc::clone(&self.core.clock),
            base.join(&config.cache_directory),
            config.cache_key_strategy,
        ));
        cache.ensure_root().await?;

        let mut media_events = self.core.media_engine.subscribe().await?;

        let (signal_tx, signal_rx) = mpsc::unbounded_channel();

        let download_tx = signal_tx.clone();
        let downloads = DownloadCoordinator::spawn(
            Arc::clone(&self.core.http_client),
            Arc::clone(&cache),
            self.events.clone(),
            move |outcome| {
                let _ = download_tx.send(Signal::Downloaded(outcome));
            },
        );

        let plan_tx = signal_tx.clone();
        let prefetch = PrefetchScheduler::spawn(
            Arc::clone(&cache),
            Arc::clone(&self.data_source),
            downloads.in_flight(),
            config.prefetch_window_size,
            config.cache_retention,
            self.events.clone(),
            move |plan| {
                let _ = plan_tx.send(Signal::Plan(plan));
            },
        );

        let media_forwarder = tokio::spawn(async move {
            while let Some(event) = media_events.next().await {
                if signal_tx.send(Signal::Media(event)).is_err() {
                    break;
                }
            }
        });

        let (snapshot_tx, snapshot_rx) = watch::channel(PlayerSnapshot::default());
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let actor = PlayerActor {
            state: PlayerState::Ready,
            current_index: None,
            ready: Vec::new(),
            aliases: HashMap::new(),
            generation: 0,
            intents: ResourceIntents::default(),
            window_size: config.prefetch_window_size,
            data_source: self.data_source,
            delegate: self.delegate,
            media: Arc::clone(&self.core.media_engine),
            lifecycle: Arc::clone(&self.core.lifecycle),
            downloads,
            prefetch,
            media_forwarder,
            events: self.events,
            snapshot: snapshot_tx,
        };
        tokio::spawn(actor.run(command_rx, signal_rx));

        info!(root = %cache.root().display(), "Player engine started");

        Ok(PlayerEngine {
            commands: command_tx,
            snapshot: snapshot_rx,
            media: Arc::clone(&self.core.media_engine),
            cache,
        })
    }
}

/// Handle to a running player.
///
/// All control methods are processed by the engine task in call order.
pub struct PlayerEngine {
    commands: mpsc::UnboundedSender<Command>,
    snapshot: watch::Receiver<PlayerSnapshot>,
    media: Arc<dyn MediaEngine>,
    cache: Arc<DiskCache>,
}

impl PlayerEngine {
    pub fn builder(core: CoreConfig, data_source: Arc<dyn PlayerDataSource>) -> PlayerEngineBuilder {
        PlayerEngineBuilder {
            core,
            data_source,
            config: PlayerConfig::default(),
            delegate: None,
            events: None,
        }
    }

    /// Starts an engine with the default [`PlayerConfig`].
    pub async fn new(core: CoreConfig, data_source: Arc<dyn PlayerDataSource>) -> Result<Self> {
        Self::builder(core, data_source).build().await
    }

    /// Starts or resumes playback.
    ///
    /// With `Some(index)` the player moves to that item; with `None` it
    /// resumes the current item, or starts at 0 when no index is set.
    /// A no-op while `Playing`, whatever the index: pause first to move.
    ///
    /// # Errors
    ///
    /// - [`PlaybackError::IndexOutOfBounds`] for an index outside the queue.
    /// - [`PlaybackError::PlayerFailed`] in the `Failed` state.
    ///
    /// State is left untouched in both cases.
    pub async fn play(&self, index: Option<usize>) -> Result<()> {
        self.request(|respond_to| Command::Play { index, respond_to })
            .await?
    }

    pub async fn pause(&self) -> Result<()> {
        self.request(|respond_to| Command::Pause { respond_to })
            .await?
    }

    /// `play(current + 1)`, or ends the queue when there is none.
    pub async fn next(&self) -> Result<()> {
        self.request(|respond_to| Command::Next { respond_to })
            .await?
    }

    /// `play(current - 1)`, or ends the queue at the first item.
    pub async fn previous(&self) -> Result<()> {
        self.request(|respond_to| Command::Previous { respond_to })
            .await?
    }

    /// Stops playback and clears the index, ready items and in-flight set.
    pub async fn reset(&self) -> Result<()> {
        self.request(|respond_to| Command::Reset { respond_to })
            .await?
    }

    pub async fn volume(&self) -> Result<f32> {
        self.ensure_running()?;
        Ok(self.media.volume().await?)
    }

    /// Sets the output volume.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::InvalidVolume`] outside `0.0..=1.0`.
    pub async fn set_volume(&self, volume: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&volume) {
            return Err(PlaybackError::InvalidVolume(volume));
        }
        self.ensure_running()?;
        Ok(self.media.set_volume(volume).await?)
    }

    pub fn state(&self) -> PlayerState {
        self.snapshot.borrow().state
    }

    pub fn current_index(&self) -> Option<usize> {
        self.snapshot.borrow().current_index
    }

    pub fn ready_items(&self) -> Vec<ReadyItem> {
        self.snapshot.borrow().ready_items.clone()
    }

    pub fn in_flight(&self) -> Vec<String> {
        self.snapshot.borrow().in_flight.clone()
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<PlayerSnapshot> {
        self.snapshot.clone()
    }

    /// Local path the cache uses for `identifier`.
    pub fn cached_path(&self, identifier: &str) -> PathBuf {
        self.cache.local_path(identifier)
    }

    /// Tears the engine down and waits for it.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::EngineShutDown`] if it already stopped.
    pub async fn shutdown(&self) -> Result<()> {
        let (respond_to, response) = oneshot::channel();
        self.commands
            .send(Command::Shutdown { respond_to })
            .map_err(|_| PlaybackError::EngineShutDown)?;
        response.await.map_err(|_| PlaybackError::EngineShutDown)
    }

    fn ensure_running(&self) -> Result<()> {
        if self.commands.is_closed() {
            Err(PlaybackError::EngineShutDown)
        } else {
            Ok(())
        }
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T> {
        let (respond_to, response) = oneshot::channel();
        self.commands
            .send(command(respond_to))
            .map_err(|_| PlaybackError::EngineShutDown)?;
        response.await.map_err(|_| PlaybackError::EngineShutDown)
    }
}

struct PlayerActor {
    state: PlayerState,
    current_index: Option<usize>,
    ready: Vec<ReadyItem>,
    /// Slots whose file was already queued for an earlier slot.
    aliases: HashMap<usize, MediaItemId>,
    generation: u64,
    intents: ResourceIntents,
    window_size: usize,
    data_source: Arc<dyn PlayerDataSource>,
    delegate: Option<Arc<dyn PlayerDelegate>>,
    media: Arc<dyn MediaEngine>,
    lifecycle: Arc<dyn PlaybackLifecycle>,
    downloads: DownloadCoordinator,
    prefetch: PrefetchScheduler,
    media_forwarder: JoinHandle<()>,
    events: Option<EventBus>,
    snapshot: watch::Sender<PlayerSnapshot>,
}

impl PlayerActor {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut signals: mpsc::UnboundedReceiver<Signal>,
    ) {
        loop {
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(Command::Shutdown { respond_to }) => {
                        commands.close();
                        self.teardown().await;
                        let _ = respond_to.send(());
                        return;
                    }
                    Some(command) => self.handle_command(command).await,
                    None => {
                        self.teardown().await;
                        return;
                    }
                },
                Some(signal) = signals.recv() => {
                    self.handle_signal(signal).await;
                    self.publish_snapshot();
                }
            }
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Play { index, respond_to } => {
                let result = self.play(index).await;
                self.reply(respond_to, result);
            }
            Command::Pause { respond_to } => {
                self.pause().await;
                self.reply(respond_to, Ok(()));
            }
            Command::Next { respond_to } => {
                let result = self.next().await;
                self.reply(respond_to, result);
            }
            Command::Previous { respond_to } => {
                let result = self.previous().await;
                self.reply(respond_to, result);
            }
            Command::Reset { respond_to } => {
                self.reset().await;
                self.reply(respond_to, Ok(()));
            }
            Command::Shutdown { .. } => {}
        }
    }

    fn reply<T>(&self, respond_to: oneshot::Sender<T>, value: T) {
        self.publish_snapshot();
        let _ = respond_to.send(value);
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    async fn play(&mut self, index: Option<usize>) -> Result<()> {
        match self.state {
            PlayerState::Playing => return Ok(()),
            PlayerState::Failed => return Err(PlaybackError::PlayerFailed),
            _ => {}
        }

        let count = self.data_source.item_count();
        let target = index.or(self.current_index).unwrap_or(0);
        if target >= count {
            return Err(PlaybackError::IndexOutOfBounds {
                index: target,
                count,
            });
        }

        let previous = self.current_index;
        if previous != Some(target) {
            self.pause_media().await;
            self.set_current_index(Some(target));
        }

        if self.media_for(target).is_some() {
            return self.start_playback().await;
        }

        // Only a target outside the prefetched window has to load.
        let far_jump = previous.map_or(true, |old| old.abs_diff(target) >= self.window_size);
        if far_jump {
            self.set_state(PlayerState::Loading).await;
        }

        self.schedule_prefetch()
    }

    async fn pause(&mut self) {
        self.pause_media().await;
        if self.state != PlayerState::Failed {
            self.set_state(PlayerState::Paused).await;
        }
    }

    async fn next(&mut self) -> Result<()> {
        let current = self.current_index.ok_or(PlaybackError::IndexUnset)?;
        if current + 1 < self.data_source.item_count() {
            self.play(Some(current + 1)).await
        } else {
            self.end_of_queue().await;
            Ok(())
        }
    }

    async fn previous(&mut self) -> Result<()> {
        let current = self.current_index.ok_or(PlaybackError::IndexUnset)?;
        match current.checked_sub(1) {
            Some(index) => self.play(Some(index)).await,
            None => {
                self.end_of_queue().await;
                Ok(())
            }
        }
    }

    async fn reset(&mut self) {
        self.pause_media().await;
        if let Err(e) = self.media.remove_all().await {
            warn!(error = %e, "Media engine did not clear its queue");
        }

        self.generation += 1;
        self.ready.clear();
        self.aliases.clear();
        self.downloads.clear();
        self.set_current_index(None);
        self.set_state(PlayerState::Ready).await;
        debug!(generation = self.generation, "Player reset");
    }

    async fn end_of_queue(&mut self) {
        info!("Queue ended");
        if let Some(delegate) = &self.delegate {
            delegate.on_queue_ended();
        }
        self.emit(PlaybackEvent::QueueEnded);
        self.reset().await;
    }

    // ------------------------------------------------------------------
    // Signals
    // ------------------------------------------------------------------

    async fn handle_signal(&mut self, signal: Signal) {
        match signal {
            Signal::Plan(plan) => self.apply_plan(plan).await,
            Signal::Downloaded(outcome) => self.on_downloaded(outcome).await,
            Signal::Media(event) => self.on_media_event(event).await,
        }
    }

    async fn apply_plan(&mut self, plan: PrefetchPlan) {
        if plan.generation != self.generation {
            debug!(generation = plan.generation, "Dropping stale prefetch plan");
            return;
        }

        for decision in plan.decisions {
            match decision {
                SlotDecision::Cached {
                    slot,
                    identifier,
                    path,
                } => self.make_ready(slot, identifier, path).await,
                SlotDecision::Missing { slot, identifier } => {
                    self.downloads.fetch(&identifier, slot, self.generation);
                }
            }
        }
    }

    async fn on_downloaded(&mut self, outcome: DownloadOutcome) {
        self.downloads.complete(&outcome);

        if outcome.job.generation != self.generation {
            debug!(
                identifier = %redact_url(&outcome.job.identifier),
                "Ignoring completion from before reset"
            );
            return;
        }

        match outcome.result {
            Ok((path, _)) => {
                self.make_ready(outcome.job.slot, outcome.job.identifier, path)
                    .await
            }
            Err(e) => debug!(error = %e, "Slot stays a cache miss"),
        }
    }

    async fn on_media_event(&mut self, event: MediaEvent) {
        match event {
            MediaEvent::ItemReady(id) => {
                if !self.is_known(id) {
                    return;
                }
                if !matches!(self.state, PlayerState::Playing | PlayerState::Failed) {
                    if let Err(e) = self.start_playback().await {
                        error!(error = %e, "Could not start playback");
                    }
                }
            }
            MediaEvent::ItemFailed { id, reason } => {
                if !self.is_known(id) {
                    return;
                }
                warn!(%reason, "Media item failed to load");
                if self.state == PlayerState::Playing {
                    self.pause().await;
                }
            }
            MediaEvent::ItemEnded(id) => {
                if self.is_known(id) {
                    self.on_item_ended().await;
                }
            }
            MediaEvent::Stalled => {
                if self.intents.audio_session() && self.state == PlayerState::Playing {
                    info!("Playback stalled, restarting");
                    self.pause_media().await;
                    if let Err(e) = self.media.play().await {
                        warn!(error = %e, "Resume after stall failed");
                    }
                }
            }
            MediaEvent::InterruptionBegan => {
                if self.intents.audio_session() {
                    debug!("Audio interruption began");
                    self.pause().await;
                }
            }
            MediaEvent::InterruptionEnded { should_resume } => {
                if self.intents.audio_session()
                    && should_resume
                    && !matches!(self.state, PlayerState::Playing | PlayerState::Failed)
                {
                    debug!("Audio interruption ended, resuming");
                    if let Err(e) = self.play(None).await {
                        warn!(error = %e, "Resume after interruption failed");
                    }
                }
            }
        }
    }

    async fn on_item_ended(&mut self) {
        let count = self.data_source.item_count();
        match self.current_index {
            Some(current) if current + 1 < count => {
                let next = current + 1;
                self.set_current_index(Some(next));
                if let Some(media_id) = self.media_for(next) {
                    if let Err(e) = self.media.skip_to(media_id).await {
                        warn!(error = %e, "Could not advance media engine");
                    }
                }
                if let Err(e) = self.schedule_prefetch() {
                    warn!(error = %e, "Prefetch not scheduled");
                }
            }
            _ => self.end_of_queue().await,
        }
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    /// Appends a ready item and hands its file to the media engine.
    ///
    /// A slot whose file is already queued reuses that media item instead.
    async fn make_ready(&mut self, slot: usize, identifier: String, path: PathBuf) {
        if let Some(media_id) = self
            .ready
            .iter()
            .find(|item| item.path == path)
            .map(|item| item.media_id)
        {
            if self.media_for(slot).is_none() {
                debug!(
                    slot,
                    file = %strip_path(&path.to_string_lossy()),
                    "Slot shares a queued file"
                );
                self.aliases.insert(slot, media_id);
                if self.current_index == Some(slot) && self.state != PlayerState::Failed {
                    if let Err(e) = self.start_playback().await {
                        error!(error = %e, "Could not start playback");
                    }
                }
            }
            return;
        }

        let media_id = match self.media.enqueue(&path).await {
            Ok(id) => id,
            Err(e) => {
                warn!(
                    file = %strip_path(&path.to_string_lossy()),
                    error = %e,
                    "Media engine rejected item"
                );
                return;
            }
        };

        debug!(slot, file = %strip_path(&path.to_string_lossy()), "Item ready");
        self.ready.push(ReadyItem {
            slot,
            identifier,
            path,
            media_id,
        });
    }

    /// Plays the current slot's item if it is ready, otherwise whatever the
    /// media engine has queued.
    async fn start_playback(&mut self) -> Result<()> {
        let current = self.current_index.and_then(|index| self.media_for(index));

        let started = async {
            if let Some(media_id) = current {
                self.media.skip_to(media_id).await?;
            }
            if let Some(surface) = self.data_source.render_surface() {
                self.media.attach_surface(surface).await?;
            }
            self.media.play().await
        }
        .await;

        match started {
            Ok(()) => {
                self.set_state(PlayerState::Playing).await;
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Media engine refused to play");
                self.set_state(PlayerState::Failed).await;
                Err(PlaybackError::Media(e.to_string()))
            }
        }
    }

    async fn pause_media(&self) {
        if let Err(e) = self.media.pause().await {
            warn!(error = %e, "Media engine did not pause");
        }
    }

    fn schedule_prefetch(&self) -> Result<()> {
        self.prefetch.schedule(
            self.current_index,
            self.data_source.item_count(),
            self.generation,
        )
    }

    async fn set_state(&mut self, new_state: PlayerState) {
        if self.state == new_state {
            return;
        }
        let old_state = std::mem::replace(&mut self.state, new_state);
        info!(from = %old_state, to = %new_state, "Player state changed");

        for toggle in self.intents.apply(new_state) {
            self.toggle_resource(toggle).await;
        }

        if let Some(delegate) = &self.delegate {
            delegate.on_state_changed(new_state);
        }
        self.emit(PlaybackEvent::StateChanged {
            from: old_state.as_str().to_string(),
            to: new_state.as_str().to_string(),
        });
    }

    async fn toggle_resource(&self, toggle: IntentToggle) {
        let result = match toggle {
            IntentToggle::BeginBackgroundExecution => {
                self.lifecycle.begin_background_execution().await
            }
            IntentToggle::EndBackgroundExecution => self.lifecycle.end_background_execution().await,
            IntentToggle::ActivateAudioSession => self.lifecycle.activate_audio_session().await,
            IntentToggle::DeactivateAudioSession => {
                self.lifecycle.deactivate_audio_session().await
            }
        };
        if let Err(e) = result {
            error!(?toggle, error = %e, "Resource lifecycle call failed");
        }
    }

    fn set_current_index(&mut self, index: Option<usize>) {
        if self.current_index != index {
            self.current_index = index;
            self.emit(PlaybackEvent::IndexChanged { index });
        }
    }

    fn media_for(&self, slot: usize) -> Option<MediaItemId> {
        self.ready
            .iter()
            .find(|item| item.slot == slot)
            .map(|item| item.media_id)
            .or_else(|| self.aliases.get(&slot).copied())
    }

    fn is_known(&self, id: MediaItemId) -> bool {
        self.ready.iter().any(|item| item.media_id == id)
    }

    fn emit(&self, event: PlaybackEvent) {
        if let Some(bus) = &self.events {
            let _ = bus.emit(CoreEvent::Playback(event));
        }
    }

    fn publish_snapshot(&self) {
        self.snapshot.send_replace(PlayerSnapshot {
            state: self.state,
            current_index: self.current_index,
            ready_items: self.ready.clone(),
            in_flight: self.downloads.in_flight().identifiers(),
        });
    }

    async fn teardown(&mut self) {
        self.pause_media().await;
        for toggle in self.intents.set(false) {
            self.toggle_resource(toggle).await;
        }
        self.media_forwarder.abort();
        self.prefetch.shutdown();
        self.downloads.shutdown();
        self.publish_snapshot();
        info!("Player engine stopped");
    }
}
