//! End-to-end tests for the outbox engine
//!
//! These drive the full engine (store + monitor + driver) against a scripted
//! in-memory transport: offline enqueue and reconnect flush, partial-failure
//! passes, offline-mode batching, and the single-flight guard.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;

use outpost_core::{
    ConnectivityMonitor, OutboxEngine, PendingMutation, RemoteTransport, SkipReason, SyncOutcome,
    SyncStatus, TransportError, WriteMethod,
};

/// Transport scripted by endpoint:
/// - `/reject/...` is rejected terminally
/// - `/error/...` fails transiently
/// - `/slow/...` succeeds after a short delay
/// - anything else succeeds immediately
///
/// Every call is logged in order.
struct MockTransport {
    calls: Mutex<Vec<String>>,
    delay: Duration,
}

impl MockTransport {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            delay: Duration::from_millis(100),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl RemoteTransport for MockTransport {
    async fn apply(&self, mutation: &PendingMutation) -> Result<(), TransportError> {
        self.calls.lock().push(mutation.endpoint.clone());
        if mutation.endpoint.starts_with("/slow/") {
            tokio::time::sleep(self.delay).await;
        }
        if mutation.endpoint.starts_with("/reject/") {
            return Err(TransportError::Terminal {
                status: Some(422),
                message: "permanently invalid".into(),
            });
        }
        if mutation.endpoint.starts_with("/error/") {
            return Err(TransportError::Transient("HTTP 503".into()));
        }
        Ok(())
    }
}

fn open_engine(
    dir: &TempDir,
    transport: Arc<MockTransport>,
    reachable: bool,
) -> (OutboxEngine, Arc<ConnectivityMonitor>) {
    let monitor = Arc::new(ConnectivityMonitor::new(reachable));
    monitor.start();
    let engine = OutboxEngine::open(dir.path(), transport, monitor.clone()).unwrap();
    (engine, monitor)
}

fn enqueue(engine: &OutboxEngine, endpoint: &str) -> PendingMutation {
    engine
        .enqueue(
            endpoint,
            WriteMethod::Post,
            br#"{"title":"x"}"#.to_vec(),
            "application/json",
        )
        .unwrap()
}

/// Wait until the published status satisfies the predicate.
async fn wait_for_status(
    engine: &OutboxEngine,
    predicate: impl Fn(&SyncStatus) -> bool,
) -> SyncStatus {
    let mut rx = engine.subscribe_status();
    tokio::time::timeout(Duration::from_secs(5), async move {
        loop {
            let status = rx.borrow_and_update().clone();
            if predicate(&status) {
                return status;
            }
            rx.changed().await.expect("status channel closed");
        }
    })
    .await
    .expect("status condition not reached in time")
}

/// Pending count in the published status must equal the store's contents
/// whenever no pass is in flight.
fn assert_count_consistent(engine: &OutboxEngine) {
    let status = engine.status();
    assert!(!status.syncing);
    assert_eq!(
        status.pending_count,
        engine.list_pending().unwrap().len() as u64
    );
}

// ============================================================================
// Offline enqueue, reconnect, automatic flush
// ============================================================================

#[tokio::test]
async fn test_reconnect_flushes_queue() {
    let dir = TempDir::new().unwrap();
    let transport = MockTransport::new();
    let (engine, monitor) = open_engine(&dir, transport.clone(), false);
    engine.start();

    enqueue(&engine, "/tasks");
    let status = engine.status();
    assert_eq!(status.pending_count, 1);
    assert!(!status.reachable);
    assert!(status.last_sync_at.is_none());
    assert_eq!(transport.call_count(), 0);

    // Connectivity returns; the watcher triggers a pass on its own
    monitor.signal_handle().report(true);
    let status = wait_for_status(&engine, |s| s.pending_count == 0 && !s.syncing).await;

    assert!(status.reachable);
    assert!(status.last_sync_at.is_some());
    assert_eq!(transport.call_count(), 1);
    assert_count_consistent(&engine);
}

// ============================================================================
// Partial failure mid-pass
// ============================================================================

#[tokio::test]
async fn test_transient_failure_leaves_tail_queued() {
    let dir = TempDir::new().unwrap();
    let transport = MockTransport::new();
    let (engine, _monitor) = open_engine(&dir, transport.clone(), true);

    // Build the queue while a pass cannot run
    engine.set_offline_mode_enabled(true).unwrap();
    enqueue(&engine, "/accept/1");
    enqueue(&engine, "/error/2");
    enqueue(&engine, "/accept/3");

    let outcome = engine.request_sync().await.unwrap();
    let report = outcome.report().expect("pass should have run");
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.dropped, 0);
    assert_eq!(report.remaining, 2);

    // The pass stopped at the transient failure: item 3 was never attempted,
    // and the remaining queue keeps the original relative order
    assert_eq!(transport.calls(), vec!["/accept/1", "/error/2"]);
    let remaining: Vec<_> = engine
        .list_pending()
        .unwrap()
        .into_iter()
        .map(|m| m.endpoint)
        .collect();
    assert_eq!(remaining, vec!["/error/2", "/accept/3"]);

    // A stalled pass does not advance last_sync_at
    assert!(engine.status().last_sync_at.is_none());
    assert_count_consistent(&engine);
}

#[tokio::test]
async fn test_terminal_rejection_is_dropped_and_reported() {
    let dir = TempDir::new().unwrap();
    let transport = MockTransport::new();
    let (engine, _monitor) = open_engine(&dir, transport.clone(), true);

    engine.set_offline_mode_enabled(true).unwrap();
    enqueue(&engine, "/accept/1");
    enqueue(&engine, "/reject/2");
    enqueue(&engine, "/accept/3");

    let outcome = engine.request_sync().await.unwrap();
    let report = outcome.report().expect("pass should have run");
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.dropped, 1);
    assert_eq!(report.remaining, 0);

    // The rejected item did not starve the one queued behind it
    assert_eq!(transport.calls(), vec!["/accept/1", "/reject/2", "/accept/3"]);
    assert!(engine.status().last_sync_at.is_some());
    assert_count_consistent(&engine);
}

// ============================================================================
// Offline mode: flush existing work, then batch
// ============================================================================

#[tokio::test]
async fn test_offline_mode_flushes_then_accumulates() {
    let dir = TempDir::new().unwrap();
    let transport = MockTransport::new();
    let (engine, monitor) = open_engine(&dir, transport.clone(), false);
    engine.start();

    enqueue(&engine, "/tasks/1");
    enqueue(&engine, "/tasks/2");

    monitor.signal_handle().report(true);
    wait_for_status(&engine, |s| s.reachable && s.pending_count == 0).await;
    assert_eq!(transport.call_count(), 2);

    // Enable offline mode; new work accumulates without triggering passes
    engine.set_offline_mode_enabled(true).unwrap();
    enqueue(&engine, "/tasks/3");
    enqueue(&engine, "/tasks/4");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(transport.call_count(), 2);
    assert_eq!(engine.status().pending_count, 2);

    // Disabling the mode while reachable with pending work drains the batch
    engine.set_offline_mode_enabled(false).unwrap();
    wait_for_status(&engine, |s| s.pending_count == 0 && !s.syncing).await;
    assert_eq!(transport.call_count(), 4);
    assert_count_consistent(&engine);
}

#[tokio::test]
async fn test_enabling_offline_mode_flushes_existing_queue() {
    let dir = TempDir::new().unwrap();
    let transport = MockTransport::new();
    let (engine, monitor) = open_engine(&dir, transport.clone(), false);

    // Queue up work while offline (no engine.start(): no automatic passes)
    enqueue(&engine, "/tasks/1");
    enqueue(&engine, "/tasks/2");

    // Without the engine watcher, wait on the monitor itself
    monitor.signal_handle().report(true);
    let mut reachable = monitor.subscribe();
    if !*reachable.borrow_and_update() {
        tokio::time::timeout(Duration::from_secs(5), reachable.changed())
            .await
            .unwrap()
            .unwrap();
    }

    // Toggling the preference on still flushes what was already pending
    engine.set_offline_mode_enabled(true).unwrap();
    wait_for_status(&engine, |s| s.pending_count == 0 && !s.syncing).await;
    assert_eq!(transport.call_count(), 2);
}

// ============================================================================
// Single-flight guard
// ============================================================================

#[tokio::test]
async fn test_double_trigger_issues_one_call_per_item() {
    let dir = TempDir::new().unwrap();
    let transport = MockTransport::new();
    let (engine, _monitor) = open_engine(&dir, transport.clone(), true);

    engine.set_offline_mode_enabled(true).unwrap();
    enqueue(&engine, "/slow/1");
    enqueue(&engine, "/slow/2");

    // Two rapid triggers: the first acquires the guard before its first
    // suspension point, so the second is skipped, not queued
    let (first, second) = tokio::join!(engine.request_sync(), engine.request_sync());
    let first = first.unwrap();
    let second = second.unwrap();

    assert!(matches!(first, SyncOutcome::Completed(_)));
    assert_eq!(second, SyncOutcome::Skipped(SkipReason::AlreadySyncing));

    // Exactly one call per queued item for this generation of the queue
    assert_eq!(transport.calls(), vec!["/slow/1", "/slow/2"]);
    assert_eq!(engine.status().pending_count, 0);
}

#[tokio::test]
async fn test_work_enqueued_mid_pass_is_picked_up() {
    let dir = TempDir::new().unwrap();
    let transport = MockTransport::new();
    let (engine, _monitor) = open_engine(&dir, transport.clone(), true);

    // The enqueue-time trigger starts a pass over a one-item snapshot
    enqueue(&engine, "/slow/1");
    wait_for_status(&engine, |s| s.syncing).await;

    // This lands in the store but not in the running snapshot; the trigger
    // finds the guard held and leaves the remembered signal, which the
    // running cycle consumes as a follow-up pass
    enqueue(&engine, "/tasks/late");

    wait_for_status(&engine, |s| s.pending_count == 0 && !s.syncing).await;
    assert_eq!(transport.calls(), vec!["/slow/1", "/tasks/late"]);
}

// ============================================================================
// Pending count accuracy at observable points
// ============================================================================

#[tokio::test]
async fn test_pending_count_tracks_store_exactly() {
    let dir = TempDir::new().unwrap();
    let transport = MockTransport::new();
    let (engine, _monitor) = open_engine(&dir, transport.clone(), false);

    assert_count_consistent(&engine);

    let a = enqueue(&engine, "/a");
    assert_count_consistent(&engine);
    enqueue(&engine, "/b");
    assert_count_consistent(&engine);

    engine.discard(&a.id).unwrap();
    assert_count_consistent(&engine);

    // Discarding the same id again changes nothing
    engine.discard(&a.id).unwrap();
    assert_count_consistent(&engine);
    assert_eq!(engine.status().pending_count, 1);
}

// ============================================================================
// Status subscription semantics
// ============================================================================

#[tokio::test]
async fn test_subscribers_see_reachability_transitions() {
    let dir = TempDir::new().unwrap();
    let transport = MockTransport::new();
    let (engine, monitor) = open_engine(&dir, transport, false);
    engine.start();

    monitor.signal_handle().report(true);
    wait_for_status(&engine, |s| s.reachable).await;

    monitor.signal_handle().report(false);
    let status = wait_for_status(&engine, |s| !s.reachable).await;
    assert!(!status.syncing);
}

#[tokio::test]
async fn test_offline_request_sync_is_skipped_not_failed() {
    let dir = TempDir::new().unwrap();
    let transport = MockTransport::new();
    let (engine, _monitor) = open_engine(&dir, transport.clone(), false);

    enqueue(&engine, "/tasks");
    let outcome = engine.request_sync().await.unwrap();
    assert_eq!(outcome, SyncOutcome::Skipped(SkipReason::Offline));
    assert_eq!(format!("{}", outcome), "skipped: offline");
    assert_eq!(transport.call_count(), 0);
}
