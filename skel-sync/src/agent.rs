//! Background pull loop.
//!
//! ## Cycle
//!
//! 1. Wait for the wake signal (raised by the timer or [`SyncAgentHandle::trigger`]).
//! 2. Exit if a stop was requested; otherwise clear the signal.
//! 3. Wait up to the sync interval for a stop request.
//! 4. [`SyncAgent::sync_once`]: fetch comments and names newer than the
//!    watermark, filter boilerplate, hand every record to the
//!    [`LocalApplier`], then advance the watermark to the batch maximum.
//!
//! The server filter is inclusive, so records stamped exactly at the
//! watermark come back on the next cycle. The agent keeps those records and
//! skips exact re-deliveries; a declined rename is asked once, not every
//! cycle.
//!
//! Stopping never interrupts a running `sync_once`; it only prevents the
//! next one. An error that escapes `sync_once` ends the worker.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

use skel_client::RemoteApi;
use skel_core::{Address, Annotation, AnnotationKind, LogContext, SyncWatermark};

use crate::applier::{ApplyOutcome, LocalApplier};
use crate::error::{io_err, SyncError};
use crate::filter::{is_boilerplate_comment, is_default_local_name};
use crate::signal::{StopFlag, WakeSignal};

// ---------------------------------------------------------------------------
// 1. Reports
// ---------------------------------------------------------------------------

/// Per-cycle counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub fetched: usize,
    pub applied: usize,
    pub unchanged: usize,
    pub declined: usize,
    pub filtered: usize,
    pub watermark: SyncWatermark,
}

impl SyncReport {
    fn record(&mut self, outcome: ApplyOutcome) {
        match outcome {
            ApplyOutcome::Applied => self.applied += 1,
            ApplyOutcome::Unchanged => self.unchanged += 1,
            ApplyOutcome::Declined => self.declined += 1,
            ApplyOutcome::Filtered => self.filtered += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The session has no sample id; nothing was fetched.
    Offline,
    /// A fetch failed; the watermark did not move.
    Unreachable,
    Synced(SyncReport),
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SyncOutcome::Synced(_))
    }
}

// ---------------------------------------------------------------------------
// 2. Agent
// ---------------------------------------------------------------------------

type BoundaryKey = (Address, AnnotationKind, String);

fn boundary_key(annotation: &Annotation) -> BoundaryKey {
    (annotation.address, annotation.kind, annotation.payload.clone())
}

/// Owns its own remote connection and the watermark.
pub struct SyncAgent<R> {
    remote: R,
    applier: LocalApplier,
    watermark: SyncWatermark,
    /// Records already handled whose timestamp equals the watermark.
    boundary: HashSet<BoundaryKey>,
    log: LogContext,
}

impl<R: RemoteApi> SyncAgent<R> {
    pub fn new(remote: R, applier: LocalApplier, log: LogContext) -> Self {
        Self {
            remote,
            applier,
            watermark: SyncWatermark::epoch(),
            boundary: HashSet::new(),
            log,
        }
    }

    /// Resume from a previously reached watermark.
    pub fn with_watermark(mut self, watermark: SyncWatermark) -> Self {
        self.watermark = watermark;
        self.boundary.clear();
        self
    }

    pub fn watermark(&self) -> SyncWatermark {
        self.watermark
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Give the connection back, e.g. to close it.
    pub fn into_remote(self) -> R {
        self.remote
    }

    /// One pull cycle.
    ///
    /// Offline and network failures are logged and reported through the
    /// outcome. `Err` means the workspace can no longer be written.
    pub fn sync_once(&mut self) -> Result<SyncOutcome, SyncError> {
        let span = self.log.span().clone();
        let _entered = span.enter();
        if !self.remote.is_online() {
            tracing::warn!("not connected to a sample, skipping sync");
            return Ok(SyncOutcome::Offline);
        }

        let since = self.watermark;
        let (mut comments, mut names) = match self.fetch(&since) {
            Ok(batches) => batches,
            Err(err) => {
                tracing::error!(error = %err, since = %since, "fetch failed, sync cycle abandoned");
                return Ok(SyncOutcome::Unreachable);
            }
        };
        // Replays of one address must end with its latest text.
        comments.sort_by_key(|a| a.timestamp);
        names.sort_by_key(|a| a.timestamp);

        let mut report = SyncReport {
            fetched: comments.len() + names.len(),
            ..SyncReport::default()
        };
        for annotation in comments.iter().chain(names.iter()) {
            let outcome = if self.is_redelivery(annotation) {
                ApplyOutcome::Unchanged
            } else if is_boilerplate(annotation) {
                ApplyOutcome::Filtered
            } else {
                self.applier.apply(annotation)?
            };
            report.record(outcome);
        }

        if let Some(max) = SyncWatermark::batch_max(comments.iter().chain(names.iter())) {
            if self.watermark.advance(max) {
                self.boundary.clear();
            }
        }
        let edge = self.watermark.get();
        self.boundary.extend(
            comments
                .iter()
                .chain(names.iter())
                .filter(|a| a.timestamp == Some(edge))
                .map(boundary_key),
        );
        report.watermark = self.watermark;

        if report.fetched > 0 {
            tracing::info!(
                fetched = report.fetched,
                applied = report.applied,
                declined = report.declined,
                filtered = report.filtered,
                watermark = %self.watermark,
                "sync cycle complete"
            );
        }
        Ok(SyncOutcome::Synced(report))
    }

    fn is_redelivery(&self, annotation: &Annotation) -> bool {
        annotation.timestamp == Some(self.watermark.get())
            && self.boundary.contains(&boundary_key(annotation))
    }

    fn fetch(
        &mut self,
        since: &SyncWatermark,
    ) -> Result<(Vec<Annotation>, Vec<Annotation>), skel_client::ClientError> {
        let comments = self.remote.fetch_comments_since(since)?;
        let names = self.remote.fetch_names_since(since)?;
        Ok((comments, names))
    }
}

fn is_boilerplate(annotation: &Annotation) -> bool {
    match annotation.kind {
        AnnotationKind::Comment => is_boilerplate_comment(&annotation.payload),
        AnnotationKind::Name => is_default_local_name(&annotation.payload),
        AnnotationKind::Type => annotation.payload.trim().is_empty(),
    }
}

// ---------------------------------------------------------------------------
// 3. Worker thread
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Idle,
    Syncing,
    Stopped,
}

#[derive(Debug)]
struct Control {
    wake: WakeSignal,
    stop: StopFlag,
    state: Mutex<AgentState>,
    cycles: AtomicU64,
}

impl Control {
    fn set_state(&self, state: AgentState) {
        *self.state.lock() = state;
    }
}

/// How the worker ended.
#[derive(Debug)]
pub struct AgentExit {
    pub cycles: u64,
    pub watermark: SyncWatermark,
    /// Set when the worker died on an error rather than a stop request.
    pub error: Option<SyncError>,
}

impl<R: RemoteApi + 'static> SyncAgent<R> {
    /// Move the agent onto its worker thread.
    ///
    /// `interval` is both the timer period handed out by
    /// [`SyncAgentHandle::timer_tick`] and the stop-wait window.
    pub fn spawn(self, interval: Duration) -> Result<SyncAgentHandle, SyncError> {
        let control = Arc::new(Control {
            wake: WakeSignal::new(),
            stop: StopFlag::new(),
            state: Mutex::new(AgentState::Idle),
            cycles: AtomicU64::new(0),
        });
        let shared = Arc::clone(&control);
        let worker = thread::Builder::new()
            .name("skel-sync-agent".to_string())
            .spawn(move || run_loop(self, &shared, interval))
            .map_err(|e| io_err("skel-sync-agent thread", e))?;
        Ok(SyncAgentHandle {
            control,
            interval,
            worker: Some(worker),
        })
    }
}

fn run_loop<R: RemoteApi>(mut agent: SyncAgent<R>, control: &Control, interval: Duration) -> AgentExit {
    agent.log.in_scope(|| tracing::info!(interval_ms = interval.as_millis() as u64, "sync agent started"));
    let error = loop {
        control.wake.wait();
        if control.stop.is_set() {
            break None;
        }
        control.wake.clear();
        if control.stop.wait_timeout(interval) {
            break None;
        }

        control.set_state(AgentState::Syncing);
        let result = agent.sync_once();
        control.set_state(AgentState::Idle);
        match result {
            Ok(_) => {
                control.cycles.fetch_add(1, Ordering::SeqCst);
            }
            Err(err) => {
                agent.log.in_scope(|| tracing::error!(error = %err, "sync agent stopped on error"));
                break Some(err);
            }
        }
    };

    control.stop.set();
    control.set_state(AgentState::Stopped);
    agent.remote.close();
    agent.log.in_scope(|| tracing::info!(watermark = %agent.watermark, "sync agent stopped"));
    AgentExit {
        cycles: control.cycles.load(Ordering::SeqCst),
        watermark: agent.watermark,
        error,
    }
}

/// Controls a running [`SyncAgent`].
pub struct SyncAgentHandle {
    control: Arc<Control>,
    interval: Duration,
    worker: Option<JoinHandle<AgentExit>>,
}

impl SyncAgentHandle {
    /// Host timer callback: raise the wake signal unless one is pending.
    ///
    /// Returns the delay until the next tick, or `None` once the agent is
    /// stopping so the host can unregister the timer.
    pub fn timer_tick(&self) -> Option<Duration> {
        self.ticker().tick()
    }

    /// A detached tick source for timer threads.
    pub fn ticker(&self) -> AgentTicker {
        AgentTicker {
            control: Arc::clone(&self.control),
            period: self.interval,
        }
    }

    /// Request a cycle now (still subject to the stop-wait window).
    pub fn trigger(&self) -> bool {
        self.control.wake.raise()
    }

    pub fn state(&self) -> AgentState {
        *self.control.state.lock()
    }

    /// Completed `sync_once` calls so far.
    pub fn cycles(&self) -> u64 {
        self.control.cycles.load(Ordering::SeqCst)
    }

    /// Ask the worker to exit. Also raises the wake signal so a worker
    /// parked on it notices.
    pub fn stop(&self) {
        self.control.stop.set();
        self.control.wake.raise();
    }

    /// Wait for the worker to finish.
    pub fn join(mut self) -> Result<AgentExit, SyncError> {
        let worker = self.worker.take().ok_or(SyncError::WorkerPanicked("skel-sync-agent"))?;
        worker
            .join()
            .map_err(|_| SyncError::WorkerPanicked("skel-sync-agent"))
    }

    pub fn stop_and_join(self) -> Result<AgentExit, SyncError> {
        self.stop();
        self.join()
    }
}

/// Clonable timer callback bound to one agent.
#[derive(Clone)]
pub struct AgentTicker {
    control: Arc<Control>,
    period: Duration,
}

impl AgentTicker {
    pub fn tick(&self) -> Option<Duration> {
        if self.control.stop.is_set() {
            return None;
        }
        self.control.wake.raise();
        Some(self.period)
    }
}
