use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::storage::Storage;
use crate::store::StoreError;
use crate::ticker::{TickReport, Ticker};

const SLEEP_SLICE: Duration = Duration::from_millis(200);

pub trait Clock {
    fn now(&self) -> OffsetDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Always reports the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub OffsetDateTime);

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.0
    }
}

/// Drives one ticker per item kind on fixed poll and tick cadences.
pub struct Scheduler<S> {
    tickers: Vec<Ticker<S>>,
    clock: Arc<dyn Clock + Send + Sync>,
    tick_interval: Duration,
    poll_interval: Duration,
}

impl<S: Storage> Scheduler<S> {
    pub fn new(
        tickers: Vec<Ticker<S>>,
        clock: Arc<dyn Clock + Send + Sync>,
        tick_interval: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            tickers,
            clock,
            tick_interval,
            poll_interval,
        }
    }

    /// One poll and tick pass over every ticker at `now`.
    pub fn run_once(&mut self, now: OffsetDateTime) -> Result<Vec<TickReport>, StoreError> {
        let mut reports = Vec::with_capacity(self.tickers.len());
        for ticker in &mut self.tickers {
            ticker.poll(now)?;
            reports.push(ticker.tick(now)?);
        }
        Ok(reports)
    }

    /// Runs in the calling thread until `stop` is set.
    pub fn run_until(&mut self, stop: &AtomicBool) {
        info!(
            kinds = self.tickers.len(),
            tick_secs = self.tick_interval.as_secs_f64(),
            poll_secs = self.poll_interval.as_secs_f64(),
            "scheduler started"
        );
        let mut last_poll: Option<Instant> = None;
        let mut last_tick: Option<Instant> = None;

        while !stop.load(Ordering::SeqCst) {
            if last_poll.map_or(true, |at| at.elapsed() >= self.poll_interval) {
                last_poll = Some(Instant::now());
                self.poll_all();
            }
            if last_tick.map_or(true, |at| at.elapsed() >= self.tick_interval) {
                last_tick = Some(Instant::now());
                self.tick_all();
            }
            std::thread::sleep(SLEEP_SLICE.min(self.tick_interval));
        }
        info!("scheduler stopped");
    }

    fn poll_all(&mut self) {
        let now = self.clock.now();
        for ticker in &mut self.tickers {
            if let Err(err) = ticker.poll(now) {
                warn!(kind = ticker.kind().as_str(), error = %err, "poll failed");
            }
        }
    }

    fn tick_all(&mut self) {
        let now = self.clock.now();
        for ticker in &mut self.tickers {
            match ticker.tick(now) {
                Ok(report) if !report.is_quiet() => {
                    debug!(kind = ticker.kind().as_str(), ?report, "tick");
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(kind = ticker.kind().as_str(), error = %err, "tick failed");
                }
            }
        }
    }
}

impl<S: Storage + Send + 'static> Scheduler<S> {
    /// Moves the scheduler onto its own thread.
    pub fn start(mut self) -> std::io::Result<SchedulerHandle> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let thread = std::thread::Builder::new()
            .name("agenda-scheduler".to_string())
            .spawn(move || self.run_until(&flag))?;
        Ok(SchedulerHandle {
            stop,
            thread: Some(thread),
        })
    }
}

pub struct SchedulerHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Signals the loop and waits for it to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("scheduler thread panicked");
            }
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
