//! Network traffic sampler.
//!
//! Turns cumulative interface counters into per-interval deltas against a
//! baseline held in [`SamplerState`]. The state lives only as long as the
//! sampler; a restart re-seeds it, so the machine's lifetime traffic is
//! never recorded as one giant delta.

use crate::error::{HistoryError, Result};
use crate::record::NetTrafficRecord;
use crate::store::{AppendOutcome, RecordStore};
use chrono::{Local, NaiveDateTime};
use std::sync::Arc;
use std::time::Duration;
use sysinfo::Networks;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Cumulative bytes since boot, summed over interfaces
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterReading {
    pub sent: u64,
    pub recv: u64,
}

/// Last reading and when it was taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Baseline {
    pub reading: CounterReading,
    pub at: NaiveDateTime,
}

/// Traffic observed since the previous reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrafficDelta {
    pub sent: u64,
    pub recv: u64,
    pub at: NaiveDateTime,
}

impl TrafficDelta {
    pub fn is_idle(&self) -> bool {
        self.sent == 0 && self.recv == 0
    }

    pub fn to_record(&self) -> NetTrafficRecord {
        NetTrafficRecord::new(self.at, self.sent, self.recv)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SamplerState {
    #[default]
    Unseeded,
    Seeded(Baseline),
}

impl SamplerState {
    pub fn is_seeded(&self) -> bool {
        matches!(self, SamplerState::Seeded(_))
    }

    pub fn baseline(&self) -> Option<&Baseline> {
        match self {
            SamplerState::Unseeded => None,
            SamplerState::Seeded(baseline) => Some(baseline),
        }
    }

    /// Feed a reading. The first one only seeds the baseline. Later ones
    /// yield the delta, or `None` when nothing moved. Counters that went
    /// backwards (reboot, interface reset) count as zero.
    pub fn observe(&mut self, reading: CounterReading, now: NaiveDateTime) -> Option<TrafficDelta> {
        let previous = match *self {
            SamplerState::Unseeded => {
                *self = SamplerState::Seeded(Baseline { reading, at: now });
                return None;
            }
            SamplerState::Seeded(baseline) => baseline.reading,
        };

        *self = SamplerState::Seeded(Baseline { reading, at: now });

        let delta = TrafficDelta {
            sent: reading.sent.saturating_sub(previous.sent),
            recv: reading.recv.saturating_sub(previous.recv),
            at: now,
        };
        if delta.is_idle() {
            None
        } else {
            Some(delta)
        }
    }
}

/// Source of cumulative counters
pub trait CounterSource: Send + 'static {
    fn read(&mut self) -> Result<CounterReading>;
}

/// Counters from the OS via `sysinfo`
#[derive(Debug, Default)]
pub struct SystemCounters;

impl CounterSource for SystemCounters {
    fn read(&mut self) -> Result<CounterReading> {
        // Rebuilt every read so hot-plugged interfaces are picked up
        let networks = Networks::new_with_refreshed_list();

        let mut reading = CounterReading::default();
        let mut interfaces = 0usize;
        for (_name, data) in &networks {
            reading.sent = reading.sent.saturating_add(data.total_transmitted());
            reading.recv = reading.recv.saturating_add(data.total_received());
            interfaces += 1;
        }

        if interfaces == 0 {
            return Err(HistoryError::Counters("no network interfaces".to_string()));
        }
        Ok(reading)
    }
}

/// Periodic sampler feeding the network store
pub struct NetworkSampler<C> {
    store: Arc<RecordStore<NetTrafficRecord>>,
    source: C,
    state: SamplerState,
    interval: Duration,
}

impl<C: CounterSource> NetworkSampler<C> {
    pub fn new(store: Arc<RecordStore<NetTrafficRecord>>, source: C, interval: Duration) -> Self {
        Self {
            store,
            source,
            state: SamplerState::Unseeded,
            interval,
        }
    }

    pub fn state(&self) -> &SamplerState {
        &self.state
    }

    /// Read counters once and persist any delta.
    ///
    /// A failed read leaves the baseline untouched.
    pub fn tick_at(&mut self, now: NaiveDateTime) -> Result<Option<AppendOutcome>> {
        match self.observe_at(now)? {
            Some(delta) => self.store.append(delta.to_record(), delta.at).map(Some),
            None => Ok(None),
        }
    }

    fn observe_at(&mut self, now: NaiveDateTime) -> Result<Option<TrafficDelta>> {
        let reading = self.source.read()?;
        let seeded = self.state.is_seeded();
        let delta = self.state.observe(reading, now);
        if !seeded {
            debug!(sent = reading.sent, recv = reading.recv, "Traffic baseline seeded");
        }
        Ok(delta)
    }

    /// Sample every `interval` until `shutdown` turns true or its sender
    /// is dropped. The first tick fires immediately and seeds the baseline.
    /// Whatever accrued since the last tick is dropped on stop.
    ///
    /// Each tick runs on the blocking pool: interface enumeration and the
    /// history save are both synchronous.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.interval.as_secs(), "Network sampler started");

        // tokio rejects a zero period
        let mut ticker = tokio::time::interval(self.interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut sampler = self;
        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let now = Local::now().naive_local();
                    let task = tokio::task::spawn_blocking(move || {
                        let result = sampler.tick_at(now);
                        (sampler, result)
                    });
                    match task.await {
                        Ok((returned, result)) => {
                            sampler = returned;
                            log_tick(result);
                        }
                        Err(e) => {
                            warn!(error = %e, "Traffic sample task failed, sampler stopping");
                            break;
                        }
                    }
                }
            }
        }

        info!("Network sampler stopped");
    }
}

fn log_tick(result: Result<Option<AppendOutcome>>) {
    match result {
        Ok(Some(outcome)) => debug!(?outcome, "Traffic sample recorded"),
        Ok(None) => {}
        Err(e) => warn!(error = %e, kind = e.kind(), "Skipping traffic sample"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tempfile::tempdir;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn reading(sent: u64, recv: u64) -> CounterReading {
        CounterReading { sent, recv }
    }

    /// Replays readings; `None` entries simulate a failed read
    struct Scripted(Arc<Mutex<VecDeque<Option<CounterReading>>>>);

    impl Scripted {
        fn new(readings: Vec<Option<CounterReading>>) -> Self {
            Self(Arc::new(Mutex::new(readings.into())))
        }
    }

    impl CounterSource for Scripted {
        fn read(&mut self) -> Result<CounterReading> {
            match self.0.lock().unwrap().pop_front() {
                Some(Some(r)) => Ok(r),
                _ => Err(HistoryError::Counters("scripted failure".to_string())),
            }
        }
    }

    #[test]
    fn test_first_observation_only_seeds() {
        let mut state = SamplerState::default();
        assert!(state.observe(reading(9_000_000_000, 7_000_000_000), at(9, 0, 0)).is_none());
        assert!(state.is_seeded());
        assert_eq!(state.baseline().unwrap().reading, reading(9_000_000_000, 7_000_000_000));
    }

    #[test]
    fn test_delta_against_baseline() {
        let mut state = SamplerState::default();
        state.observe(reading(1000, 2000), at(9, 0, 0));

        let delta = state.observe(reading(1500, 2100), at(9, 0, 30)).unwrap();
        assert_eq!((delta.sent, delta.recv), (500, 100));
        assert_eq!(delta.at, at(9, 0, 30));
        assert_eq!(state.baseline().unwrap().at, at(9, 0, 30));
    }

    #[test]
    fn test_counter_regression_is_zero() {
        let mut state = SamplerState::default();
        state.observe(reading(1000, 1000), at(9, 0, 0));

        // Both went down: nothing to record, baseline still moves
        assert!(state.observe(reading(10, 20), at(9, 0, 30)).is_none());
        assert_eq!(state.baseline().unwrap().reading, reading(10, 20));

        // Only one went down: that side is zero, never a wrapped value
        let delta = state.observe(reading(5, 70), at(9, 1, 0)).unwrap();
        assert_eq!(delta.sent, 0);
        assert_eq!(delta.recv, 50);
    }

    #[test]
    fn test_idle_interval_emits_nothing() {
        let mut state = SamplerState::default();
        state.observe(reading(1, 1), at(9, 0, 0));
        assert!(state.observe(reading(1, 1), at(9, 0, 30)).is_none());
    }

    #[test]
    fn test_tick_persists_and_coalesces() {
        let dir = tempdir().unwrap();
        let store = Arc::new(RecordStore::<NetTrafficRecord>::new(dir.path()));
        let source = Scripted::new(vec![
            Some(reading(100, 100)),
            Some(reading(150, 130)),
            Some(reading(170, 140)),
            Some(reading(200, 200)),
        ]);
        let mut sampler = NetworkSampler::new(Arc::clone(&store), source, Duration::from_secs(30));

        assert_eq!(sampler.tick_at(at(10, 0, 0)).unwrap(), None);
        assert!(store.load().is_empty());

        assert_eq!(sampler.tick_at(at(10, 0, 20)).unwrap(), Some(AppendOutcome::Appended));
        assert_eq!(sampler.tick_at(at(10, 0, 50)).unwrap(), Some(AppendOutcome::Merged));
        assert_eq!(sampler.tick_at(at(10, 1, 20)).unwrap(), Some(AppendOutcome::Appended));

        let records = store.load();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].timestamp, "2024-05-01 10:00");
        assert_eq!((records[0].sent, records[0].recv), (70, 40));
        assert_eq!(records[1].timestamp, "2024-05-01 10:01");
        assert_eq!((records[1].sent, records[1].recv), (30, 60));
    }

    #[test]
    fn test_failed_read_keeps_baseline() {
        let dir = tempdir().unwrap();
        let store = Arc::new(RecordStore::<NetTrafficRecord>::new(dir.path()));
        let source = Scripted::new(vec![Some(reading(10, 10)), None, Some(reading(25, 10))]);
        let mut sampler = NetworkSampler::new(Arc::clone(&store), source, Duration::from_secs(30));

        sampler.tick_at(at(10, 0, 0)).unwrap();
        assert!(sampler.tick_at(at(10, 0, 30)).is_err());
        assert_eq!(sampler.state().baseline().unwrap().reading, reading(10, 10));

        sampler.tick_at(at(10, 1, 0)).unwrap();
        assert_eq!(store.load()[0].sent, 15);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_stops_on_shutdown() {
        let dir = tempdir().unwrap();
        let store = Arc::new(RecordStore::<NetTrafficRecord>::new(dir.path()));
        let readings: Vec<_> = (0..1000u64).map(|i| Some(reading(i * 10, i * 5))).collect();
        let sampler = NetworkSampler::new(
            Arc::clone(&store),
            Scripted::new(readings),
            Duration::from_millis(10),
        );

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(sampler.run(rx));

        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("sampler did not stop")
            .unwrap();

        let records = store.load();
        assert!(!records.is_empty());
        let sent: u64 = records.iter().map(|r| r.sent).sum();
        assert!(sent > 0);
    }

    /// Remembers which threads it was read on
    struct ThreadRecorder {
        threads: Arc<Mutex<Vec<std::thread::ThreadId>>>,
        next: u64,
    }

    impl CounterSource for ThreadRecorder {
        fn read(&mut self) -> Result<CounterReading> {
            self.threads.lock().unwrap().push(std::thread::current().id());
            self.next += 100;
            Ok(reading(self.next, self.next))
        }
    }

    #[tokio::test]
    async fn test_counter_reads_stay_off_the_runtime_thread() {
        let dir = tempdir().unwrap();
        let store = Arc::new(RecordStore::<NetTrafficRecord>::new(dir.path()));
        let threads = Arc::new(Mutex::new(Vec::new()));
        let source = ThreadRecorder {
            threads: Arc::clone(&threads),
            next: 0,
        };
        let sampler = NetworkSampler::new(Arc::clone(&store), source, Duration::from_millis(5));

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(sampler.run(rx));
        while threads.lock().unwrap().len() < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("sampler did not stop")
            .unwrap();

        // current_thread runtime: the test thread is the only async worker
        let runtime_thread = std::thread::current().id();
        assert!(threads.lock().unwrap().iter().all(|id| *id != runtime_thread));
        assert!(!store.load().is_empty());
    }

    #[tokio::test]
    async fn test_run_stops_when_sender_dropped() {
        let dir = tempdir().unwrap();
        let store = Arc::new(RecordStore::<NetTrafficRecord>::new(dir.path()));
        let sampler = NetworkSampler::new(store, Scripted::new(vec![]), Duration::from_secs(3600));

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(sampler.run(rx));
        drop(tx);

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("sampler did not stop")
            .unwrap();
    }
}
