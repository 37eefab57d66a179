//! Keeps chart datasets fresh by re-running their queries on an interval.

use crate::{
    client::{MetricsSource, TimeRange},
    config::PollConfig,
    query::{all_datasets, ChartQuery, Dataset},
};
use anyhow::Result;
use log::{debug, error};
use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Condvar, Mutex, RwLock,
    },
    thread::{self, JoinHandle},
    time::Duration,
};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Refresh {
    // Poll once and stop.
    Never,
    // Wait this long after each poll before the next one.
    Every(Duration),
}

impl Default for Refresh {
    fn default() -> Self {
        Refresh::Every(Duration::from_secs(10))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ChartKind {
    // Time series over the configured range.
    #[default]
    Range,
    // Current value only.
    Instant,
}

/// Latest outcome of polling. A failed poll sets `error` and leaves the
/// previous `data` in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartState {
    pub data: Option<Vec<Dataset>>,
    pub error: Option<String>,
    // Cycle that produced this state, zero before the first poll lands.
    pub cycle: u64,
}

#[derive(Error, Debug)]
pub enum PollerError {
    #[error("poller needs at least one query")]
    NoQueries,
    #[error("failed to spawn poll thread")]
    Spawn(std::io::Error),
    #[error("poller is stopped")]
    Stopped,
}

pub struct Poller {
    inner: Arc<PollerInner>,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    pub fn start(
        source: Arc<dyn MetricsSource>,
        queries: Vec<ChartQuery>,
        kind: ChartKind,
        config: PollConfig,
    ) -> Result<Self, PollerError> {
        if queries.is_empty() {
            return Err(PollerError::NoQueries);
        }

        let refresh = config.refresh();
        let inner = Arc::new(PollerInner {
            source,
            queries,
            kind,
            config,
            state: RwLock::new(ChartState::default()),
            next_cycle: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
            wake_lock: Mutex::new(()),
            wake: Condvar::new(),
        });

        let inner_clone = inner.clone();
        let handle = thread::Builder::new()
            .name(String::from("chart-poller"))
            .spawn(move || loop {
                if inner_clone.is_stopped() {
                    break;
                }
                inner_clone.poll();
                match refresh {
                    Refresh::Never => break,
                    Refresh::Every(interval) => {
                        if inner_clone.sleep(interval) {
                            break;
                        }
                    }
                }
            })
            .map_err(PollerError::Spawn)?;

        Ok(Self {
            inner,
            handle: Some(handle),
        })
    }

    pub fn state(&self) -> ChartState {
        match self.inner.state.read() {
            Ok(state) => state.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Runs an extra poll right away without waiting for the current one.
    /// Whichever poll started last wins if both complete.
    pub fn refresh_now(&self) -> Result<(), PollerError> {
        if self.is_stopped() {
            return Err(PollerError::Stopped);
        }
        let inner = self.inner.clone();
        thread::Builder::new()
            .name(String::from("chart-refresh"))
            .spawn(move || {
                inner.poll();
            })
            .map(|_| ())
            .map_err(PollerError::Spawn)
    }

    /// Stops rescheduling. A poll already in flight finishes, but its
    /// result is dropped.
    pub fn stop(&self) {
        self.inner.stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.is_stopped()
    }

    /// Blocks until the scheduling thread exits, which happens after
    /// `stop` or after the single poll of `Refresh::Never`.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("chart poller thread panicked");
            }
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.inner.stop();
    }
}

struct PollerInner {
    source: Arc<dyn MetricsSource>,
    queries: Vec<ChartQuery>,
    kind: ChartKind,
    config: PollConfig,
    state: RwLock<ChartState>,
    next_cycle: AtomicU64,
    shutdown: AtomicBool,
    wake_lock: Mutex<()>,
    wake: Condvar,
}

impl PollerInner {
    fn poll(&self) -> u64 {
        let cycle = self.next_cycle.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("starting chart poll cycle {}", cycle);
        let result = self.fetch();
        self.publish(cycle, result);
        cycle
    }

    fn fetch(&self) -> Result<Vec<Dataset>> {
        let range = TimeRange::last(chrono::Duration::seconds(self.config.range_secs));
        let mut responses = Vec::with_capacity(self.queries.len());
        for query in &self.queries {
            let response = match self.kind {
                ChartKind::Range => self.source.query_range(
                    &query.query,
                    range,
                    query.step_or(self.config.default_step),
                )?,
                ChartKind::Instant => self.source.query(&query.query)?,
            };
            responses.push(response);
        }
        Ok(all_datasets(
            &self.queries,
            responses,
            self.config.default_step,
        )?)
    }

    fn publish(&self, cycle: u64, result: Result<Vec<Dataset>>) -> bool {
        if self.is_stopped() {
            debug!("dropping chart poll cycle {} after stop", cycle);
            return false;
        }

        let mut state = match self.state.write() {
            Ok(state) => state,
            Err(_) => {
                error!("failed to get chart state lock");
                return false;
            }
        };
        if cycle <= state.cycle {
            debug!(
                "dropping chart poll cycle {}, superseded by {}",
                cycle, state.cycle
            );
            return false;
        }

        state.cycle = cycle;
        match result {
            Ok(data) => {
                state.data = Some(data);
                state.error = None;
            }
            Err(e) => {
                error!("error polling chart queries: {:#}", e);
                state.error = Some(format!("{:#}", e));
            }
        }
        true
    }

    // Returns true if woken by `stop`.
    fn sleep(&self, interval: Duration) -> bool {
        let guard = match self.wake_lock.lock() {
            Ok(guard) => guard,
            Err(_) => return true,
        };
        match self
            .wake
            .wait_timeout_while(guard, interval, |_| !self.is_stopped())
        {
            Ok(_) => self.is_stopped(),
            Err(_) => true,
        }
    }

    fn stop(&self) {
        // Held while setting the flag so a sleeping scheduler can't miss it.
        let _guard = self.wake_lock.lock();
        self.shutdown.store(true, Ordering::SeqCst);
        self.wake.notify_all();
    }

    fn is_stopped(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}
