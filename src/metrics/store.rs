//! Time-bounded cache of the last observed point of every series.
//!
//! Entries are sharded across a `DashMap`, so a `get`/`put` only locks the
//! shard holding its key and the background sweep never holds more than one
//! shard at a time. A `put` that lands after the sweep checked its key
//! simply re-inserts the entry, so the update is never lost.
//!
//! `max_series` is a hard bound: a new series reserves a slot in an atomic
//! count while holding its shard's entry lock, and the sweep releases slots
//! as it evicts.

use crate::core::config::StoreConfig;
use crate::core::{DeltaError, Result};
use crate::metrics::series_key::SeriesKey;
use crate::metrics::types::{NumberValue, Timestamp};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Last point seen for a series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviousPointRecord {
    /// Timestamp of the last point
    pub timestamp: Timestamp,
    /// Value of the last point
    pub value: NumberValue,
    /// When the record was last written, for eviction
    pub last_access: Instant,
}

/// Snapshot of store counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Series currently tracked
    pub entries: usize,
    /// Series removed by sweeps since creation
    pub evicted: u64,
    /// Sweeps performed
    pub sweeps: u64,
    /// New series refused because the store was full
    pub rejected: u64,
}

#[derive(Debug, Default)]
struct StoreCounters {
    series: AtomicUsize,
    evicted: AtomicU64,
    sweeps: AtomicU64,
    rejected: AtomicU64,
}

/// Shared previous-value store.
///
/// One instance is owned by the process and handed to every translator;
/// nothing else mutates it.
#[derive(Debug)]
pub struct PreviousValueStore {
    entries: DashMap<SeriesKey, PreviousPointRecord>,
    ttl: Duration,
    sweep_interval: Duration,
    max_series: usize,
    counters: StoreCounters,
}

impl PreviousValueStore {
    /// Creates an unbounded store. A zero `ttl` or `sweep_interval`
    /// disables eviction.
    pub fn new(ttl: Duration, sweep_interval: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            sweep_interval,
            max_series: usize::MAX,
            counters: StoreCounters::default(),
        }
    }

    /// Creates a store from configuration
    pub fn with_config(config: &StoreConfig) -> Self {
        Self::new(config.ttl, config.sweep_interval).with_max_series(config.max_series)
    }

    /// Bounds the number of tracked series
    pub fn with_max_series(mut self, max_series: usize) -> Self {
        self.max_series = max_series;
        self
    }

    /// Returns the record for `key` if it has not been evicted.
    ///
    /// Reading does not refresh the idle timer.
    pub fn get(&self, key: &SeriesKey) -> Option<PreviousPointRecord> {
        self.entries.get(key).map(|entry| *entry.value())
    }

    /// Inserts or overwrites the record for `key` and marks it as
    /// accessed now.
    ///
    /// Fails only when `key` is new and the store already tracks
    /// `max_series` series.
    pub fn put(&self, key: &SeriesKey, timestamp: Timestamp, value: NumberValue) -> Result<()> {
        let record = PreviousPointRecord {
            timestamp,
            value,
            last_access: Instant::now(),
        };

        if let Some(mut existing) = self.entries.get_mut(key) {
            *existing = record;
            return Ok(());
        }

        match self.entries.entry(key.clone()) {
            // inserted by another caller since the fast path
            Entry::Occupied(mut existing) => {
                existing.insert(record);
            },
            Entry::Vacant(vacant) => {
                self.reserve_slot()?;
                vacant.insert(record);
            },
        }
        Ok(())
    }

    fn reserve_slot(&self) -> Result<()> {
        let max = self.max_series;
        self.counters
            .series
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < max).then_some(n + 1)
            })
            .map(|_| ())
            .map_err(|_| {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                DeltaError::StoreFull { limit: max }
            })
    }

    /// Removes every entry idle for longer than the TTL. Returns the
    /// number of removed entries.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    /// Same as [`sweep`](Self::sweep) with an explicit notion of "now".
    pub fn sweep_at(&self, now: Instant) -> usize {
        if self.ttl.is_zero() {
            return 0;
        }

        let ttl = self.ttl;
        let mut removed = 0usize;
        self.entries.retain(|_, record| {
            let alive = now.saturating_duration_since(record.last_access) <= ttl;
            if !alive {
                removed += 1;
                self.counters.series.fetch_sub(1, Ordering::AcqRel);
            }
            alive
        });

        self.counters.sweeps.fetch_add(1, Ordering::Relaxed);
        self.counters
            .evicted
            .fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Spawns the periodic sweep on the current tokio runtime.
    ///
    /// Returns `None` when eviction is disabled. The task stops when the
    /// returned [`Sweeper`] is stopped or dropped.
    pub fn spawn_sweeper(store: &Arc<Self>) -> Option<Sweeper> {
        if store.ttl.is_zero() || store.sweep_interval.is_zero() {
            tracing::info!("Previous-value sweep disabled");
            return None;
        }

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let store = Arc::clone(store);
        let period = store.sweep_interval;

        tracing::info!(
            ttl = ?store.ttl,
            interval = ?period,
            "Starting previous-value sweep"
        );

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // first tick completes immediately
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let removed = store.sweep();
                        if removed > 0 {
                            tracing::debug!(
                                removed,
                                remaining = store.len(),
                                "Evicted idle series"
                            );
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::info!("Previous-value sweep stopped");
        });

        Some(Sweeper {
            shutdown: shutdown_tx,
            handle,
        })
    }

    /// Number of tracked series
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no series is tracked
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Configured time-to-live
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current counters
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            entries: self.entries.len(),
            evicted: self.counters.evicted.load(Ordering::Relaxed),
            sweeps: self.counters.sweeps.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
        }
    }
}

/// Handle to a running sweep task
#[derive(Debug)]
pub struct Sweeper {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Signals the sweep task and waits for it to exit
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            tracing::warn!("Sweep task ended abnormally: {}", e);
        }
    }

    /// True once the task has exited
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
