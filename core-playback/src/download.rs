//! # Download Coordinator
//!
//! Fetches cache misses and reports each completion back to the engine.
//!
//! - The in-flight set guarantees one transport request per identifier at a
//!   time. Only the engine task mutates it (`fetch`, `complete`, `clear`);
//!   the prefetch worker reads it.
//! - Requests are handed to the transport by a single issuance worker, one
//!   submission at a time. Transfers then run concurrently and may finish in
//!   any order.
//! - Every job carries the engine generation it was issued in. A reset bumps
//!   the generation, so late completions can be recognised and ignored.
//! - No retries: a failed identifier stays a cache miss and is fetched again
//!   by a later prefetch pass.

use crate::cache::DiskCache;
use crate::error::{PlaybackError, Result};
use bridge_traits::{HttpClient, HttpRequest};
use core_runtime::events::{CoreEvent, DownloadEvent, EventBus};
use core_runtime::logging::redact_url;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, instrument, trace, warn};

/// Identifiers with an outstanding fetch, mapped to the generation that
/// issued them.
#[derive(Clone, Default)]
pub struct InFlightSet {
    inner: Arc<Mutex<HashMap<String, u64>>>,
}

impl InFlightSet {
    pub fn contains(&self, identifier: &str) -> bool {
        self.inner.lock().contains_key(identifier)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Sorted snapshot of the identifiers.
    pub fn identifiers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    fn insert(&self, identifier: &str, generation: u64) -> bool {
        let mut inner = self.inner.lock();
        if inner.contains_key(identifier) {
            return false;
        }
        inner.insert(identifier.to_string(), generation);
        true
    }

    fn remove_if_generation(&self, identifier: &str, generation: u64) -> bool {
        let mut inner = self.inner.lock();
        if inner.get(identifier) == Some(&generation) {
            inner.remove(identifier);
            true
        } else {
            false
        }
    }

    fn clear(&self) {
        self.inner.lock().clear();
    }
}

/// A fetch handed to the issuance worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    pub identifier: String,
    /// Queue slot that asked for the item.
    pub slot: usize,
    pub generation: u64,
}

/// Result of a finished fetch.
#[derive(Debug)]
pub struct DownloadOutcome {
    pub job: DownloadJob,
    /// Local path and payload size on success.
    pub result: Result<(PathBuf, u64)>,
}

pub struct DownloadCoordinator {
    in_flight: InFlightSet,
    jobs: mpsc::UnboundedSender<DownloadJob>,
    worker: JoinHandle<()>,
    events: Option<EventBus>,
}

impl DownloadCoordinator {
    /// Starts the issuance worker. Outcomes are delivered on `completions`.
    pub fn spawn<F>(
        http: Arc<dyn HttpClient>,
        cache: Arc<DiskCache>,
        events: Option<EventBus>,
        completions: F,
    ) -> Self
    where
        F: Fn(DownloadOutcome) + Send + Sync + 'static,
    {
        let (jobs, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(issue_downloads(
            rx,
            http,
            cache,
            Arc::new(completions),
        ));

        Self {
            in_flight: InFlightSet::default(),
            jobs,
            worker,
            events,
        }
    }

    /// Read-only handle for the prefetch worker.
    pub fn in_flight(&self) -> InFlightSet {
        self.in_flight.clone()
    }

    /// Starts fetching `identifier` unless it is already in flight.
    ///
    /// Returns `true` when a new fetch was submitted.
    pub fn fetch(&self, identifier: &str, slot: usize, generation: u64) -> bool {
        if !self.in_flight.insert(identifier, generation) {
            trace!(identifier = %redact_url(identifier), "Already in flight");
            return false;
        }

        let job = DownloadJob {
            identifier: identifier.to_string(),
            slot,
            generation,
        };
        if self.jobs.send(job).is_err() {
            warn!(identifier = %redact_url(identifier), "Download worker stopped");
            self.in_flight.remove_if_generation(identifier, generation);
            return false;
        }

        debug!(identifier = %redact_url(identifier), slot, "Download queued");
        self.emit(DownloadEvent::Started {
            identifier: identifier.to_string(),
        });
        true
    }

    /// Records a finished fetch.
    ///
    /// Clears the in-flight entry if it still belongs to the outcome's
    /// generation and returns whether it did. A `false` return means the
    /// bookkeeping was reset since the fetch was issued.
    pub fn complete(&self, outcome: &DownloadOutcome) -> bool {
        let job = &outcome.job;
        let current = self
            .in_flight
            .remove_if_generation(&job.identifier, job.generation);

        match &outcome.result {
            Ok((_, bytes)) => self.emit(DownloadEvent::Completed {
                identifier: job.identifier.clone(),
                bytes: *bytes,
            }),
            Err(e) => self.emit(DownloadEvent::Failed {
                identifier: job.identifier.clone(),
                message: e.to_string(),
            }),
        }

        current
    }

    /// Forgets every in-flight entry without aborting the transfers.
    pub fn clear(&self) {
        self.in_flight.clear();
    }

    /// Stops the worker and drops any running transfers.
    pub fn shutdown(&self) {
        self.worker.abort();
    }

    fn emit(&self, event: DownloadEvent) {
        if let Some(bus) = &self.events {
            let _ = bus.emit(CoreEvent::Download(event));
        }
    }
}

impl Drop for DownloadCoordinator {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

async fn issue_downloads(
    mut jobs: mpsc::UnboundedReceiver<DownloadJob>,
    http: Arc<dyn HttpClient>,
    cache: Arc<DiskCache>,
    completions: Arc<dyn Fn(DownloadOutcome) + Send + Sync>,
) {
    let mut transfers = JoinSet::new();

    loop {
        tokio::select! {
            job = jobs.recv() => {
                let Some(job) = job else { break };
                let http = Arc::clone(&http);
                let cache = Arc::clone(&cache);
                let completions = Arc::clone(&completions);
                transfers.spawn(async move {
                    let result = transfer(http.as_ref(), &cache, &job).await;
                    completions(DownloadOutcome { job, result });
                });
            }
            Some(_) = transfers.join_next(), if !transfers.is_empty() => {}
        }
    }

    debug!(pending = transfers.len(), "Download worker stopping");
}

#[instrument(skip_all, fields(identifier = %redact_url(&job.identifier), slot = job.slot))]
async fn transfer(
    http: &dyn HttpClient,
    cache: &DiskCache,
    job: &DownloadJob,
) -> Result<(PathBuf, u64)> {
    let outcome = fetch_payload(http, cache, &job.identifier).await;
    match &outcome {
        Ok((_, size)) => info!(bytes = size, "Download finished"),
        Err(e) => warn!(error = %e, "Download failed"),
    }
    outcome
}

async fn fetch_payload(
    http: &dyn HttpClient,
    cache: &DiskCache,
    identifier: &str,
) -> Result<(PathBuf, u64)> {
    let response = http
        .execute(HttpRequest::get(identifier))
        .await
        .map_err(|e| PlaybackError::DownloadFailed {
            identifier: identifier.to_string(),
            reason: e.to_string(),
        })?;

    if !response.is_success() {
        return Err(PlaybackError::HttpStatus {
            identifier: identifier.to_string(),
            status: response.status,
        });
    }

    let size = response.body.len() as u64;
    let path = cache.write(identifier, response.body).await?;
    Ok((path, size))
}
