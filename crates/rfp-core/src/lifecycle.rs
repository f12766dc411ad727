//! Invocation lifecycle tracking.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::Serialize;

/// States of an invocation context.
///
/// `Created → Active → Closed`; `Closed` is terminal and re-entering it is a
/// no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationState {
    /// Scratch directory allocated, database not yet connected.
    Created,
    /// Fully provisioned and usable by the handler.
    Active,
    /// Resources released.
    Closed,
}

impl InvocationState {
    /// Whether moving to `next` is a legal transition.
    pub fn can_transition_to(self, next: InvocationState) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::Active)
                | (Self::Created, Self::Closed)
                | (Self::Active, Self::Closed)
                | (Self::Closed, Self::Closed)
        )
    }
}

impl fmt::Display for InvocationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Active => write!(f, "active"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Non-fatal signals raised while provisioning an invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProvisionWarning {
    /// `DATABASE_URL` was absent; a local-file database is in use.
    LocalDatabaseFallback { path: PathBuf },
    /// No storage backend configured; a local directory is in use.
    LocalStorageFallback { dir: PathBuf },
}

impl fmt::Display for ProvisionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocalDatabaseFallback { path } => write!(
                f,
                "DATABASE_URL is not set; using non-durable local database {}",
                path.display()
            ),
            Self::LocalStorageFallback { dir } => write!(
                f,
                "no storage backend configured; using non-durable local directory {}",
                dir.display()
            ),
        }
    }
}

/// Lifecycle phases reported to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// Scratch directory allocated.
    Created,
    /// Database connected, handler may run.
    Activated,
    /// A provisioning warning was raised.
    Warning(ProvisionWarning),
    /// A logical key was mapped to durable storage.
    StorageResolved(String),
    /// The wall-clock limit elapsed.
    TimedOut,
    /// Resources were released.
    Released,
}

/// Timing context for observability.
#[derive(Debug, Clone)]
pub struct TimingContext {
    start: Instant,
    marks: HashMap<String, Instant>,
}

impl TimingContext {
    /// Create a new timing context.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            marks: HashMap::new(),
        }
    }

    /// Record a timing mark.
    pub fn mark(&mut self, name: &str) {
        self.marks.insert(name.to_string(), Instant::now());
    }

    /// Get elapsed time since start.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Get time from start to a named mark.
    pub fn since_start(&self, name: &str) -> Option<Duration> {
        self.marks.get(name).map(|t| t.duration_since(self.start))
    }

    /// Time spent provisioning (until the context became active).
    pub fn time_to_active(&self) -> Option<Duration> {
        self.since_start("active")
    }
}

impl Default for TimingContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer trait for lifecycle events.
pub trait LifecycleObserver: Send + Sync {
    /// Called when a lifecycle phase occurs.
    fn on_phase(&self, invocation: &str, phase: &LifecyclePhase, elapsed: Duration);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_transition_skips_closed() {
        use InvocationState::*;
        assert!(Created.can_transition_to(Active));
        assert!(Active.can_transition_to(Closed));
        assert!(Closed.can_transition_to(Closed));
        assert!(!Closed.can_transition_to(Active));
        assert!(!Active.can_transition_to(Created));
    }

    #[test]
    fn test_timing_marks() {
        let mut timing = TimingContext::new();
        assert!(timing.time_to_active().is_none());
        timing.mark("active");
        assert!(timing.time_to_active().unwrap() <= timing.elapsed());
    }

    #[test]
    fn test_warning_mentions_path() {
        let warning = ProvisionWarning::LocalDatabaseFallback {
            path: PathBuf::from("rfp_local.db"),
        };
        assert!(warning.to_string().contains("rfp_local.db"));
    }
}
