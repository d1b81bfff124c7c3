//! Fixed-interval cycle scheduling.
//!
//! A [`Scheduler`] waits for its [`Ticker`], runs one [`Job`] cycle to
//! completion and repeats until shutdown. Cycles never overlap: the next
//! tick is not awaited until the current cycle has returned. Shutdown cuts
//! an in-flight cycle short.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::error::SyncError;
use crate::reconcile::CycleOutcome;

/// What the scheduler does when a cycle fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ErrorPolicy {
    /// Stop the loop and hand the error to the caller.
    #[default]
    Terminate,
    /// Log the error and wait for the next tick.
    SkipCycle,
}

/// Unit of work run once per tick.
#[async_trait]
pub trait Job: Send {
    async fn run_cycle(&mut self) -> Result<CycleOutcome, SyncError>;
}

/// Source of cycle start signals.
#[async_trait]
pub trait Ticker: Send {
    async fn tick(&mut self);
}

/// [`Ticker`] backed by `tokio::time::interval`.
///
/// The first tick completes immediately, so the first cycle runs at startup.
#[derive(Debug)]
pub struct IntervalTicker {
    inner: tokio::time::Interval,
}

impl IntervalTicker {
    /// Must be called from within a tokio runtime.
    pub fn new(period: Duration) -> Self {
        let mut inner = tokio::time::interval(period);
        // A slow cycle pushes the schedule back instead of causing a burst.
        inner.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { inner }
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) {
        self.inner.tick().await;
    }
}

/// Counters for a finished [`Scheduler::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub registered: u64,
    pub unchanged: u64,
    pub failed: u64,
}

/// Runs a job every tick with no overlap.
#[derive(Debug)]
pub struct Scheduler<T> {
    ticker: T,
    policy: ErrorPolicy,
    max_cycles: Option<u64>,
}

impl<T: Ticker> Scheduler<T> {
    pub const fn new(ticker: T, policy: ErrorPolicy) -> Self {
        Self {
            ticker,
            policy,
            max_cycles: None,
        }
    }

    /// Stop after `max` cycles (`None` = run until shutdown).
    #[must_use]
    pub const fn with_max_cycles(mut self, max: Option<u64>) -> Self {
        self.max_cycles = max;
        self
    }

    /// Drive `job` until shutdown, the cycle limit, or a terminating error.
    ///
    /// A shutdown request also abandons an in-flight cycle, so a hung
    /// endpoint cannot keep the process alive. A closed shutdown channel
    /// counts as a shutdown request.
    pub async fn run<J: Job>(
        &mut self,
        job: &mut J,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<RunSummary, SyncError> {
        let mut summary = RunSummary::default();

        loop {
            if self.max_cycles.is_some_and(|max| summary.cycles >= max) {
                break;
            }

            tokio::select! {
                biased;
                () = shutdown_requested(&mut shutdown) => {
                    info!("Shutdown requested, stopping scheduler");
                    break;
                }
                () = self.ticker.tick() => {}
            }

            summary.cycles += 1;
            let result = tokio::select! {
                biased;
                result = job.run_cycle() => result,
                () = shutdown_requested(&mut shutdown) => {
                    warn!(cycle = summary.cycles, "Shutdown requested, abandoning in-flight cycle");
                    break;
                }
            };

            match result {
                Ok(CycleOutcome::Unchanged { .. }) => summary.unchanged += 1,
                Ok(CycleOutcome::Registered { .. }) => summary.registered += 1,
                Err(e) => {
                    summary.failed += 1;
                    match self.policy {
                        ErrorPolicy::Terminate => return Err(e),
                        ErrorPolicy::SkipCycle => {
                            error!(cycle = summary.cycles, error = %e, "Cycle failed, waiting for next tick");
                        }
                    }
                }
            }
        }

        Ok(summary)
    }
}

/// Resolve once shutdown is signalled or the sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
