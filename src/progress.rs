//! Progress reporting and cooperative cancellation for long matches.
//!
//! The matcher reports through a [`ProgressIndicator`]: one stage at a
//! time, with a completion level in `[0, 1]` that may be updated from
//! several worker threads. [`ProgressState`] is a lock-light snapshot
//! another thread can poll, and [`CancelToken`] lets that thread stop the
//! run at the next checkpoint.

use crate::match_error::MatchError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Receives progress from a running match.
pub trait ProgressIndicator: Send + Sync {
    fn start_stage(&self, name: &str);
    /// Fraction of the current stage done; monotonic within a stage.
    fn set_level(&self, level: f64);
    fn end_stage(&self);
    fn log_message(&self, message: &str);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressIndicator for NullProgress {
    fn start_stage(&self, _name: &str) {}
    fn set_level(&self, _level: f64) {}
    fn end_stage(&self) {}
    fn log_message(&self, _message: &str) {}
}

/// Writes stages and messages through the `log` facade.
#[derive(Debug, Default)]
pub struct LogProgress {
    stage: Mutex<Option<String>>,
    /// Last reported tenth, so a stage logs at most ten level lines.
    tenth: AtomicU64,
}

impl ProgressIndicator for LogProgress {
    fn start_stage(&self, name: &str) {
        log::info!("{name}...");
        *self.stage.lock() = Some(name.to_owned());
        self.tenth.store(0, Ordering::Relaxed);
    }

    fn set_level(&self, level: f64) {
        let tenth = (level.clamp(0.0, 1.0) * 10.0) as u64;
        if self.tenth.fetch_max(tenth, Ordering::Relaxed) < tenth {
            if let Some(stage) = self.stage.lock().as_deref() {
                log::debug!("{stage}: {}%", tenth * 10);
            }
        }
    }

    fn end_stage(&self) {
        if let Some(stage) = self.stage.lock().take() {
            log::debug!("{stage}: done");
        }
    }

    fn log_message(&self, message: &str) {
        log::info!("{message}");
    }
}

/// Logs like [`LogProgress`] and also records how long each stage took.
#[derive(Debug, Default)]
pub struct ProfileProgress {
    log: LogProgress,
    current: Mutex<Option<(String, Instant)>>,
    timings: Mutex<Vec<(String, Duration)>>,
}

impl ProfileProgress {
    /// Completed stages with their wall-clock durations, in order.
    pub fn timings(&self) -> Vec<(String, Duration)> {
        self.timings.lock().clone()
    }
}

impl ProgressIndicator for ProfileProgress {
    fn start_stage(&self, name: &str) {
        self.log.start_stage(name);
        *self.current.lock() = Some((name.to_owned(), Instant::now()));
    }

    fn set_level(&self, level: f64) {
        self.log.set_level(level);
    }

    fn end_stage(&self) {
        self.log.end_stage();
        if let Some((name, start)) = self.current.lock().take() {
            let took = start.elapsed();
            log::info!("{name}: {took:.2?}");
            self.timings.lock().push((name, took));
        }
    }

    fn log_message(&self, message: &str) {
        self.log.log_message(message);
    }
}

/// Which built-in indicator a configuration asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressMode {
    #[default]
    None,
    Log,
    Profile,
}

impl ProgressMode {
    pub fn indicator(self) -> Arc<dyn ProgressIndicator> {
        match self {
            ProgressMode::None => Arc::new(NullProgress),
            ProgressMode::Log => Arc::new(LogProgress::default()),
            ProgressMode::Profile => Arc::new(ProfileProgress::default()),
        }
    }
}

impl FromStr for ProgressMode {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(ProgressMode::None),
            "log" => Ok(ProgressMode::Log),
            "profile" => Ok(ProgressMode::Profile),
            _ => Err(MatchError::Config(format!(
                "unknown progress mode `{s}` (none, log, profile)"
            ))),
        }
    }
}

impl fmt::Display for ProgressMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProgressMode::None => "none",
            ProgressMode::Log => "log",
            ProgressMode::Profile => "profile",
        })
    }
}

/// Coarse phase of a running match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    #[default]
    Idle,
    Binning,
    Scoring,
    Consolidating,
    Done,
}

impl Phase {
    fn for_stage(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if lower.contains("bin") {
            Phase::Binning
        } else if lower.contains("scor") || lower.contains("pair") {
            Phase::Scoring
        } else {
            Phase::Consolidating
        }
    }
}

/// Snapshot of a [`ProgressState`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub phase: Phase,
    pub stage: Option<String>,
    pub fraction: f64,
    pub stages_done: u64,
}

/// Shared progress that can be polled from another thread while it is
/// fed as an indicator, optionally forwarding to another indicator.
pub struct ProgressState {
    phase: Mutex<(Phase, Option<String>)>,
    level_bits: AtomicU64,
    stages_done: AtomicU64,
    forward: Arc<dyn ProgressIndicator>,
}

impl fmt::Debug for ProgressState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressState")
            .field("snapshot", &self.snapshot())
            .finish_non_exhaustive()
    }
}

impl Default for ProgressState {
    fn default() -> Self {
        Self::new(Arc::new(NullProgress))
    }
}

impl ProgressState {
    pub fn new(forward: Arc<dyn ProgressIndicator>) -> Self {
        Self {
            phase: Mutex::new((Phase::Idle, None)),
            level_bits: AtomicU64::new(0f64.to_bits()),
            stages_done: AtomicU64::new(0),
            forward,
        }
    }

    /// Mark the whole run finished.
    pub fn finish(&self) {
        *self.phase.lock() = (Phase::Done, None);
        self.level_bits.store(1f64.to_bits(), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let (phase, stage) = self.phase.lock().clone();
        ProgressSnapshot {
            phase,
            stage,
            fraction: f64::from_bits(self.level_bits.load(Ordering::Relaxed)),
            stages_done: self.stages_done.load(Ordering::Relaxed),
        }
    }
}

impl ProgressIndicator for ProgressState {
    fn start_stage(&self, name: &str) {
        *self.phase.lock() = (Phase::for_stage(name), Some(name.to_owned()));
        self.level_bits.store(0f64.to_bits(), Ordering::Relaxed);
        self.forward.start_stage(name);
    }

    fn set_level(&self, level: f64) {
        let level = level.clamp(0.0, 1.0);
        // Non-negative floats order like their bit patterns.
        self.level_bits.fetch_max(level.to_bits(), Ordering::Relaxed);
        self.forward.set_level(level);
    }

    fn end_stage(&self) {
        self.level_bits.store(1f64.to_bits(), Ordering::Relaxed);
        self.stages_done.fetch_add(1, Ordering::Relaxed);
        self.forward.end_stage();
    }

    fn log_message(&self, message: &str) {
        self.forward.log_message(message);
    }
}

/// Cloneable flag that asks a running match to stop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// `Err(Cancelled)` once [`cancel`](Self::cancel) has been called.
    #[inline]
    pub fn check(&self) -> Result<(), MatchError> {
        if self.is_cancelled() {
            Err(MatchError::Cancelled)
        } else {
            Ok(())
        }
    }
}
