//! Upload progress counters and sampling policy.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default cadence of interactive progress samples.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(250);

/// Bytes-sent counter of one upload.
///
/// Written by the owning upload task only, read by the aggregator.
#[derive(Debug, Clone, Default)]
pub struct ByteCounter(Arc<AtomicU64>);

impl ByteCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, bytes: u64) {
        self.0.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Raise the counter to at least `bytes`
    pub fn fill_to(&self, bytes: u64) {
        self.0.fetch_max(bytes, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// How often progress samples are published
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    /// Time-based, for terminals
    Interactive { interval: Duration },

    /// One sample per crossed quarter, for logs and pipes
    Fractional,
}

impl Default for ProgressMode {
    fn default() -> Self {
        ProgressMode::Interactive {
            interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

/// Cumulative upload progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSample {
    pub uploaded: u64,
    pub total: u64,
}

impl ProgressSample {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.uploaded as f64 / self.total as f64
        }
    }

    pub fn percent(&self) -> u8 {
        (self.fraction() * 100.0).floor().min(100.0) as u8
    }

    pub fn is_complete(&self) -> bool {
        self.uploaded >= self.total
    }
}

/// Decides which aggregated readings become published samples.
///
/// The first reading and the completed reading are always published.
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    mode: ProgressMode,
    total: u64,
    last_emit: Option<Instant>,
    last_uploaded: Option<u64>,
    next_quarter: u64,
    done: bool,
}

impl ProgressThrottle {
    pub fn new(mode: ProgressMode, total: u64) -> Self {
        Self {
            mode,
            total,
            last_emit: None,
            last_uploaded: None,
            next_quarter: 0,
            done: false,
        }
    }

    /// Feed a cumulative reading; returns the sample to publish, if any
    pub fn observe(&mut self, uploaded: u64, now: Instant) -> Option<ProgressSample> {
        if self.done {
            return None;
        }
        let uploaded = uploaded.min(self.total);
        let complete = uploaded == self.total;

        let emit = match self.mode {
            ProgressMode::Fractional => {
                let quarter = if self.total == 0 { 4 } else { uploaded * 4 / self.total };
                if quarter >= self.next_quarter {
                    self.next_quarter = quarter + 1;
                    true
                } else {
                    false
                }
            }
            ProgressMode::Interactive { interval } => match (self.last_emit, self.last_uploaded) {
                (None, _) => true,
                _ if complete => true,
                (Some(at), Some(prev)) => prev != uploaded && now.duration_since(at) >= interval,
                (Some(_), None) => true,
            },
        };

        if !emit {
            return None;
        }
        self.last_emit = Some(now);
        self.last_uploaded = Some(uploaded);
        self.done = complete;
        Some(ProgressSample {
            uploaded,
            total: self.total,
        })
    }
}
