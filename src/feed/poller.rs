//! Background feed poller for RSSY.
//!
//! The poller runs one fetch cycle immediately after [`Poller::start`] and
//! then one per interval, until [`Poller::stop`] is called.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use super::fetcher::FeedFetcher;
use crate::db::Database;
use crate::{Result, RssyError};

/// Default polling interval in seconds (10 minutes).
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 600;

/// Poller lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerStatus {
    /// Constructed, not yet started.
    Idle,
    /// Background task is scheduling cycles.
    Running,
    /// Stopped; a poller cannot be restarted.
    Stopped,
}

#[derive(Debug)]
struct Schedule {
    status: PollerStatus,
    cycles_started: u64,
}

/// Periodic feed poller.
pub struct Poller {
    fetcher: Arc<FeedFetcher>,
    interval: Duration,
    schedule: Arc<Mutex<Schedule>>,
    shutdown_tx: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Poller {
    /// Create a poller with a default fetcher over `db`.
    pub fn new(db: Database, interval: Duration) -> Result<Self> {
        Ok(Self::with_fetcher(FeedFetcher::new(db)?, interval))
    }

    /// Create a poller around an existing fetcher.
    pub fn with_fetcher(fetcher: FeedFetcher, interval: Duration) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            fetcher: Arc::new(fetcher),
            interval,
            schedule: Arc::new(Mutex::new(Schedule {
                status: PollerStatus::Idle,
                cycles_started: 0,
            })),
            shutdown_tx,
            handle: Mutex::new(None),
        }
    }

    /// The fetcher used for each cycle, shared for on-demand refreshes.
    pub fn fetcher(&self) -> Arc<FeedFetcher> {
        Arc::clone(&self.fetcher)
    }

    /// The polling interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Current lifecycle state.
    pub fn status(&self) -> PollerStatus {
        lock(&self.schedule).status
    }

    /// Number of cycles that have begun.
    pub fn cycles_started(&self) -> u64 {
        lock(&self.schedule).cycles_started
    }

    /// Start polling in a background task.
    ///
    /// The first cycle begins right away. Must be called from within a
    /// Tokio runtime. Fails if the interval is zero or if the poller was
    /// already started or stopped.
    pub fn start(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(RssyError::Poller(
                "poll interval must be greater than zero".into(),
            ));
        }

        {
            let mut schedule = lock(&self.schedule);
            match schedule.status {
                PollerStatus::Idle => schedule.status = PollerStatus::Running,
                PollerStatus::Running => {
                    return Err(RssyError::Poller("poller is already running".into()))
                }
                PollerStatus::Stopped => {
                    return Err(RssyError::Poller("poller has been stopped".into()))
                }
            }
        }

        info!(
            "Feed poller started (interval: {} seconds)",
            self.interval.as_secs()
        );

        let task = PollTask {
            fetcher: Arc::clone(&self.fetcher),
            interval: self.interval,
            schedule: Arc::clone(&self.schedule),
            shutdown_rx: self.shutdown_tx.subscribe(),
        };
        let handle = tokio::spawn(task.run());
        *lock(&self.handle) = Some(handle);

        Ok(())
    }

    /// Stop polling.
    ///
    /// No cycle begins after this returns; a cycle already in progress
    /// finishes in the background. Stopping twice is a no-op.
    pub fn stop(&self) {
        {
            let mut schedule = lock(&self.schedule);
            if schedule.status == PollerStatus::Stopped {
                return;
            }
            schedule.status = PollerStatus::Stopped;
        }

        self.shutdown_tx.send_replace(true);
        info!("Feed poller stopped");
    }

    /// Wait for the background task to exit.
    ///
    /// Returns immediately if the poller was never started.
    pub async fn join(&self) {
        let handle = lock(&self.handle).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Feed poller task failed: {}", e);
            }
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("interval", &self.interval)
            .field("status", &self.status())
            .finish()
    }
}

/// State moved into the background task.
struct PollTask {
    fetcher: Arc<FeedFetcher>,
    interval: Duration,
    schedule: Arc<Mutex<Schedule>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl PollTask {
    async fn run(mut self) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if !self.begin_cycle() {
                break;
            }

            if let Err(e) = self.fetcher.fetch_all().await {
                error!("Feed poll cycle failed: {}", e);
            }

            tokio::select! {
                biased;
                _ = self.shutdown_rx.changed() => break,
                _ = ticker.tick() => {}
            }
        }

        debug!("Feed poller task exited");
    }

    /// Count a new cycle unless the poller has been stopped.
    ///
    /// Checked under the same lock `stop` takes.
    fn begin_cycle(&self) -> bool {
        let mut schedule = lock(&self.schedule);
        if schedule.status != PollerStatus::Running {
            return false;
        }
        schedule.cycles_started += 1;
        debug!("Starting feed poll cycle {}", schedule.cycles_started);
        true
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
