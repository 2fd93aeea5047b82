//! # Prefetch Scheduler
//!
//! Resolves the window of items ahead of the playhead against the disk cache
//! on a dedicated worker, so filesystem scans never block the engine task.
//! Requests are processed one at a time in submission order.
//!
//! The worker only reads shared state. It reports a [`PrefetchPlan`] and the
//! engine acts on it: cached items become ready, missing ones go to the
//! download coordinator.

use crate::cache::DiskCache;
use crate::download::InFlightSet;
use crate::error::{PlaybackError, Result};
use crate::traits::PlayerDataSource;
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use core_runtime::logging::redact_url;
use std::ops::Range;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Queue slots covered by a prefetch pass starting at `current_index`.
pub fn prefetch_window(current_index: usize, total_count: usize, window_size: usize) -> Range<usize> {
    let start = current_index.min(total_count);
    let end = current_index.saturating_add(window_size).min(total_count);
    start..end
}

/// What a prefetch pass decided for one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotDecision {
    /// The item is on disk.
    Cached {
        slot: usize,
        identifier: String,
        path: PathBuf,
    },
    /// The item must be downloaded.
    Missing { slot: usize, identifier: String },
}

/// Decisions for one window, tagged with the generation that requested it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefetchPlan {
    pub generation: u64,
    pub decisions: Vec<SlotDecision>,
}

#[derive(Debug)]
struct PrefetchRequest {
    current_index: usize,
    total_count: usize,
    generation: u64,
}

pub struct PrefetchScheduler {
    requests: mpsc::UnboundedSender<PrefetchRequest>,
    worker: JoinHandle<()>,
}

impl PrefetchScheduler {
    /// Starts the worker. Plans are delivered to `on_plan`.
    pub fn spawn<F>(
        cache: Arc<DiskCache>,
        data_source: Arc<dyn PlayerDataSource>,
        in_flight: InFlightSet,
        window_size: usize,
        cache_retention: Duration,
        events: Option<EventBus>,
        on_plan: F,
    ) -> Self
    where
        F: Fn(PrefetchPlan) + Send + Sync + 'static,
    {
        let (requests, rx) = mpsc::unbounded_channel();
        let worker = PrefetchWorker {
            cache,
            data_source,
            in_flight,
            window_size,
            cache_retention,
            events,
            has_set_up: false,
        };
        let worker = tokio::spawn(worker.run(rx, on_plan));

        Self { requests, worker }
    }

    /// Queues a pass for the window starting at `current_index`.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::IndexUnset`] when called without a current index.
    pub fn schedule(
        &self,
        current_index: Option<usize>,
        total_count: usize,
        generation: u64,
    ) -> Result<()> {
        let current_index = current_index.ok_or(PlaybackError::IndexUnset)?;
        self.requests
            .send(PrefetchRequest {
                current_index,
                total_count,
                generation,
            })
            .map_err(|_| PlaybackError::EngineShutDown)
    }

    pub fn shutdown(&self) {
        self.worker.abort();
    }
}

impl Drop for PrefetchScheduler {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

struct PrefetchWorker {
    cache: Arc<DiskCache>,
    data_source: Arc<dyn PlayerDataSource>,
    in_flight: InFlightSet,
    window_size: usize,
    cache_retention: Duration,
    events: Option<EventBus>,
    has_set_up: bool,
}

impl PrefetchWorker {
    async fn run<F>(mut self, mut requests: mpsc::UnboundedReceiver<PrefetchRequest>, on_plan: F)
    where
        F: Fn(PrefetchPlan),
    {
        while let Some(request) = requests.recv().await {
            self.set_up().await;
            let plan = self.plan(&request).await;
            if !plan.decisions.is_empty() {
                on_plan(plan);
            }
        }
    }

    /// First-use cache sweep, once per engine.
    async fn set_up(&mut self) {
        if self.has_set_up {
            return;
        }
        self.has_set_up = true;

        match self.cache.sweep(self.cache_retention).await {
            Ok(report) => self.emit(CacheEvent::Swept {
                removed: report.removed,
                retained: report.retained,
            }),
            Err(e) => warn!(error = %e, "Cache sweep skipped"),
        }
    }

    async fn plan(&self, request: &PrefetchRequest) -> PrefetchPlan {
        let window = prefetch_window(request.current_index, request.total_count, self.window_size);
        debug!(
            start = window.start,
            end = window.end,
            generation = request.generation,
            "Prefetch pass"
        );

        let mut decisions = Vec::with_capacity(window.len());
        for slot in window {
            let identifier = self.data_source.item_identifier(slot);
            if self.in_flight.contains(&identifier) {
                continue;
            }

            let cached = match self.cache.has(&identifier).await {
                Ok(cached) => cached,
                Err(e) => {
                    error!(identifier = %redact_url(&identifier), error = %e, "Cache lookup failed");
                    false
                }
            };

            if cached {
                if let Err(e) = self.cache.touch(&identifier).await {
                    debug!(error = %e, "Could not refresh access time");
                }
                self.emit(CacheEvent::Hit {
                    identifier: identifier.clone(),
                });
                decisions.push(SlotDecision::Cached {
                    slot,
                    path: self.cache.local_path(&identifier),
                    identifier,
                });
            } else {
                decisions.push(SlotDecision::Missing { slot, identifier });
            }
        }

        PrefetchPlan {
            generation: request.generation,
            decisions,
        }
    }

    fn emit(&self, event: CacheEvent) {
        if let Some(bus) = &self.events {
            let _ = bus.emit(CoreEvent::Cache(event));
        }
    }
}
