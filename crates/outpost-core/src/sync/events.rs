//! Status and outcome types for outbox synchronization.
//!
//! [`SyncStatus`] is the single source of truth published to collaborators:
//! one snapshot value carrying reachability, the syncing flag, pending count,
//! last sync time, and the offline-mode preference. It is derived from its
//! constituent facts on every change and never persisted on its own, so it
//! cannot drift from the store.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Snapshot of engine state published to collaborators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    /// Best-effort reachability as reported by the connectivity monitor
    pub reachable: bool,
    /// Whether a sync pass is currently in flight
    pub syncing: bool,
    /// Number of mutations currently in the durable queue
    pub pending_count: u64,
    /// Unix timestamp of the last fully-drained sync pass
    pub last_sync_at: Option<i64>,
    /// User preference forcing local-only operation
    pub offline_mode_enabled: bool,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let link = if self.reachable { "reachable" } else { "offline" };
        let activity = if self.syncing { "syncing" } else { "idle" };
        write!(f, "{}, {}, {} pending", link, activity, self.pending_count)?;
        if self.offline_mode_enabled {
            write!(f, ", offline mode")?;
        }
        Ok(())
    }
}

/// Why a requested sync pass did not run.
///
/// These are expected conditions, not faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Device is not reachable
    Offline,
    /// A pass is already in flight; the request is remembered
    AlreadySyncing,
    /// Nothing queued
    EmptyQueue,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Offline => write!(f, "offline"),
            SkipReason::AlreadySyncing => write!(f, "sync already in progress"),
            SkipReason::EmptyQueue => write!(f, "queue is empty"),
        }
    }
}

/// Aggregate result of a sync pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Mutations accepted by the server and deleted from the queue
    pub succeeded: u64,
    /// Mutations the server rejected permanently, deleted and reported
    pub dropped: u64,
    /// Mutations still queued after the pass
    pub remaining: u64,
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} dropped, {} remaining",
            self.succeeded, self.dropped, self.remaining
        )
    }
}

/// Outcome of a sync request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncOutcome {
    /// A pass ran to its conclusion
    Completed(SyncReport),
    /// The pass did not run; see the reason
    Skipped(SkipReason),
}

impl SyncOutcome {
    /// The pass report, if a pass ran
    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            SyncOutcome::Completed(report) => Some(report),
            SyncOutcome::Skipped(_) => None,
        }
    }

    /// Whether the pass was skipped
    pub fn is_skipped(&self) -> bool {
        matches!(self, SyncOutcome::Skipped(_))
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncOutcome::Completed(report) => write!(f, "completed: {}", report),
            SyncOutcome::Skipped(reason) => write!(f, "skipped: {}", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_default() {
        let status = SyncStatus::default();
        assert!(!status.reachable);
        assert!(!status.syncing);
        assert_eq!(status.pending_count, 0);
        assert!(status.last_sync_at.is_none());
        assert!(!status.offline_mode_enabled);
    }

    #[test]
    fn test_status_display() {
        let status = SyncStatus {
            reachable: true,
            syncing: false,
            pending_count: 3,
            last_sync_at: None,
            offline_mode_enabled: false,
        };
        assert_eq!(format!("{}", status), "reachable, idle, 3 pending");

        let status = SyncStatus {
            reachable: false,
            syncing: true,
            pending_count: 1,
            last_sync_at: Some(1_700_000_000),
            offline_mode_enabled: true,
        };
        assert_eq!(format!("{}", status), "offline, syncing, 1 pending, offline mode");
    }

    #[test]
    fn test_skip_reason_display() {
        assert_eq!(format!("{}", SkipReason::Offline), "offline");
        assert_eq!(
            format!("{}", SkipReason::AlreadySyncing),
            "sync already in progress"
        );
        assert_eq!(format!("{}", SkipReason::EmptyQueue), "queue is empty");
    }

    #[test]
    fn test_outcome_report() {
        let report = SyncReport {
            succeeded: 2,
            dropped: 1,
            remaining: 0,
        };
        let outcome = SyncOutcome::Completed(report);
        assert!(!outcome.is_skipped());
        assert_eq!(outcome.report(), Some(&report));

        let outcome = SyncOutcome::Skipped(SkipReason::EmptyQueue);
        assert!(outcome.is_skipped());
        assert!(outcome.report().is_none());
    }

    #[test]
    fn test_report_display() {
        let report = SyncReport {
            succeeded: 3,
            dropped: 1,
            remaining: 2,
        };
        assert_eq!(format!("{}", report), "3 succeeded, 1 dropped, 2 remaining");
    }
}
