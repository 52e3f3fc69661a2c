//! Main OutboxEngine - the primary entry point for Outpost
//!
//! OutboxEngine coordinates the durable queue, the connectivity monitor, and
//! the sync driver:
//! - `enqueue` persists a mutation locally and returns without touching the
//!   network
//! - a background watcher reacts to offline→online transitions by flushing
//!   the queue
//! - at most one sync pass runs at a time; triggers that arrive mid-pass are
//!   remembered (one signal, consumed once) instead of queued
//!
//! The engine is clone-cheap (all shared state behind `Arc`) and expects to
//! live inside a tokio runtime.
//!
//! # Example
//!
//! ```ignore
//! use outpost_core::{ConnectivityMonitor, HttpTransport, OutboxEngine, WriteMethod};
//!
//! let monitor = Arc::new(ConnectivityMonitor::new(true));
//! let transport = Arc::new(HttpTransport::new("https://api.example.com"));
//! let engine = OutboxEngine::open("~/.outpost/data", transport, monitor)?;
//! engine.start();
//!
//! // Queue a write; it is durable before this returns
//! engine.enqueue("/tasks", WriteMethod::Post, body, "application/json")?;
//!
//! // Manual "sync now"
//! let outcome = engine.request_sync().await?;
//! ```

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::OutboxConfig;
use crate::error::OutboxResult;
use crate::monitor::ConnectivityMonitor;
use crate::store::QueueStore;
use crate::sync::driver::SyncDriver;
use crate::sync::events::{SkipReason, SyncOutcome, SyncReport, SyncStatus};
use crate::sync::transport::RemoteTransport;
use crate::types::{MutationId, PendingMutation, WriteMethod};

/// Database file name within the data directory
const DB_FILE: &str = "outpost.redb";

/// Offline-first outbox: durable enqueue, FIFO replay, published status.
#[derive(Clone)]
pub struct OutboxEngine {
    /// Durable queue and scalar preferences
    store: QueueStore,
    /// Best-effort reachability signal
    monitor: Arc<ConnectivityMonitor>,
    /// Replay driver (transport + per-call timeout)
    driver: SyncDriver,
    config: OutboxConfig,
    /// Single source of truth published to collaborators
    status_tx: Arc<watch::Sender<SyncStatus>>,
    /// Single-flight guard: at most one sync pass in flight
    syncing: Arc<AtomicBool>,
    /// Remembered "there is more work" signal, consumed once per cycle end
    rerun: Arc<AtomicBool>,
    /// Background connectivity watcher task
    watcher: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl OutboxEngine {
    /// Open the engine with default configuration.
    ///
    /// # Errors
    ///
    /// Fails when the local store cannot be initialized. No engine value
    /// exists in that case: durability cannot be guaranteed, and the caller
    /// must surface "changes may not be saved" instead of buffering writes
    /// in volatile memory.
    pub fn open(
        data_dir: impl AsRef<Path>,
        transport: Arc<dyn RemoteTransport>,
        monitor: Arc<ConnectivityMonitor>,
    ) -> OutboxResult<Self> {
        Self::open_with_config(data_dir, transport, monitor, OutboxConfig::default())
    }

    /// Open the engine with explicit configuration.
    pub fn open_with_config(
        data_dir: impl AsRef<Path>,
        transport: Arc<dyn RemoteTransport>,
        monitor: Arc<ConnectivityMonitor>,
        config: OutboxConfig,
    ) -> OutboxResult<Self> {
        let data_dir = data_dir.as_ref();
        info!(?data_dir, "opening outbox engine");

        std::fs::create_dir_all(data_dir)?;
        let store = QueueStore::open(data_dir.join(DB_FILE))?;

        let status = SyncStatus {
            reachable: monitor.is_reachable(),
            syncing: false,
            pending_count: store.count()?,
            last_sync_at: store.load_last_sync_at()?,
            offline_mode_enabled: store.load_offline_mode()?,
        };
        let (status_tx, _) = watch::channel(status);

        let driver = SyncDriver::new(transport, config.request_timeout);

        Ok(Self {
            store,
            monitor,
            driver,
            config,
            status_tx: Arc::new(status_tx),
            syncing: Arc::new(AtomicBool::new(false)),
            rerun: Arc::new(AtomicBool::new(false)),
            watcher: Arc::new(Mutex::new(None)),
        })
    }

    /// Start the background connectivity watcher.
    ///
    /// On every offline→online transition with pending work (and offline
    /// mode disabled), a sync pass is triggered automatically. Idempotent.
    pub fn start(&self) {
        let mut watcher = self.watcher.lock();
        if watcher.is_some() {
            debug!("engine already started");
            return;
        }

        let mut rx = self.monitor.subscribe();
        let engine = self.clone();
        *watcher = Some(tokio::spawn(async move {
            loop {
                if rx.changed().await.is_err() {
                    break;
                }
                let reachable = *rx.borrow_and_update();
                engine.refresh_status();
                if reachable {
                    debug!("connectivity restored");
                    engine.maybe_auto_sync();
                }
            }
            debug!("connectivity watcher ended");
        }));
    }

    /// Stop the background connectivity watcher.
    pub fn stop(&self) {
        if let Some(task) = self.watcher.lock().take() {
            task.abort();
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Collaborator Surface
    // ═══════════════════════════════════════════════════════════════════════

    /// Queue a mutation for durable, eventually-delivered replay.
    ///
    /// The record is committed to the local store before this returns; the
    /// published pending count never shows a mutation that failed to
    /// persist. Never blocks on network activity. When reachable (and not
    /// in offline mode), a sync pass may be triggered opportunistically in
    /// the background.
    ///
    /// # Errors
    ///
    /// A store write failure propagates to the caller; the mutation is not
    /// silently dropped.
    pub fn enqueue(
        &self,
        endpoint: &str,
        method: WriteMethod,
        payload: Vec<u8>,
        content_kind: &str,
    ) -> OutboxResult<PendingMutation> {
        let mutation = PendingMutation::new(endpoint, method, payload, content_kind);
        self.store.insert(&mutation)?;
        debug!(id = %mutation.id, endpoint, %method, "mutation enqueued");
        self.refresh_status();

        if self.config.sync_on_enqueue {
            self.maybe_auto_sync();
        }
        Ok(mutation)
    }

    /// Manually trigger a sync pass.
    ///
    /// Expected conditions (offline, pass already running, empty queue)
    /// produce a [`SyncOutcome::Skipped`], not an error. A manual request
    /// runs even when offline mode is enabled: pressing "sync now" is more
    /// specific intent than the standing preference.
    pub async fn request_sync(&self) -> OutboxResult<SyncOutcome> {
        self.run_sync_cycle().await
    }

    /// Set the offline-mode preference.
    ///
    /// Distinct from actual reachability: the user may force local-only
    /// operation while connected. Toggling in either direction while
    /// reachable with pending work triggers a flush pass: enabling the mode
    /// flushes what is already queued, disabling it drains what accumulated.
    pub fn set_offline_mode_enabled(&self, enabled: bool) -> OutboxResult<()> {
        self.store.save_offline_mode(enabled)?;
        info!(enabled, "offline mode preference changed");
        self.refresh_status();

        if self.monitor.is_reachable() && self.store.count()? > 0 {
            self.spawn_sync_cycle("offline mode toggled");
        }
        Ok(())
    }

    /// Explicitly discard a queued mutation without delivering it.
    pub fn discard(&self, id: &MutationId) -> OutboxResult<()> {
        self.store.delete_by_id(id)?;
        debug!(%id, "mutation discarded");
        self.refresh_status();
        Ok(())
    }

    /// Current status snapshot.
    pub fn status(&self) -> SyncStatus {
        self.status_tx.borrow().clone()
    }

    /// Subscribe to status changes.
    ///
    /// The watch channel suppresses duplicate values, so subscribers see
    /// exactly one notification per real change.
    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.status_tx.subscribe()
    }

    /// Number of mutations currently queued.
    pub fn pending_count(&self) -> OutboxResult<u64> {
        self.store.count()
    }

    /// All queued mutations in insertion order.
    pub fn list_pending(&self) -> OutboxResult<Vec<PendingMutation>> {
        self.store.list_all()
    }

    /// Age in seconds of the oldest queued mutation, if any.
    pub fn oldest_pending_age_secs(&self) -> OutboxResult<Option<i64>> {
        Ok(self
            .store
            .oldest_enqueued_at()?
            .map(|ts| (chrono::Utc::now().timestamp() - ts).max(0)))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Sync Orchestration
    // ═══════════════════════════════════════════════════════════════════════

    /// Run a guarded sync cycle: guards, single-flight, follow-up passes.
    async fn run_sync_cycle(&self) -> OutboxResult<SyncOutcome> {
        if !self.monitor.is_reachable() {
            return Ok(SyncOutcome::Skipped(SkipReason::Offline));
        }
        if self.store.count()? == 0 {
            return Ok(SyncOutcome::Skipped(SkipReason::EmptyQueue));
        }
        if self
            .syncing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            // A pass is in flight; remember that more work may exist.
            self.rerun.store(true, Ordering::SeqCst);
            return Ok(SyncOutcome::Skipped(SkipReason::AlreadySyncing));
        }

        self.refresh_status();

        let mut total = SyncReport::default();
        let result = loop {
            match self.driver.run_pass(&self.store).await {
                Ok(report) => {
                    total.succeeded += report.succeeded;
                    total.dropped += report.dropped;
                    total.remaining = report.remaining;
                }
                Err(err) => break Err(err),
            }

            // Consume the remembered signal; run a follow-up pass only when
            // it is still worth it.
            if self.rerun.swap(false, Ordering::SeqCst) && self.monitor.is_reachable() {
                match self.store.count() {
                    Ok(n) if n > 0 => {
                        debug!("running follow-up pass for work queued mid-pass");
                        continue;
                    }
                    Ok(_) => {}
                    Err(err) => break Err(err),
                }
            }
            break Ok(SyncOutcome::Completed(total));
        };

        self.syncing.store(false, Ordering::SeqCst);
        self.refresh_status();
        result
    }

    /// Trigger a background sync cycle unless offline mode suppresses it.
    fn maybe_auto_sync(&self) {
        match self.store.load_offline_mode() {
            Ok(true) => {
                debug!("offline mode enabled, deferring automatic sync");
                return;
            }
            Ok(false) => {}
            Err(err) => {
                warn!(%err, "failed to read offline mode preference");
                return;
            }
        }
        self.spawn_sync_cycle("automatic");
    }

    /// Spawn a sync cycle in the background; the cycle's own guards decide
    /// whether it actually runs.
    fn spawn_sync_cycle(&self, reason: &'static str) {
        if !self.monitor.is_reachable() {
            return;
        }
        let engine = self.clone();
        tokio::spawn(async move {
            match engine.run_sync_cycle().await {
                Ok(outcome) => debug!(reason, %outcome, "background sync finished"),
                Err(err) => warn!(reason, %err, "background sync failed"),
            }
        });
    }

    /// Recompute the published status from its constituent facts.
    ///
    /// Keeps the store as the only authority for the pending count; on a
    /// store read failure the previous status is retained and the failure is
    /// logged, never thrown out of a task.
    fn refresh_status(&self) {
        let pending_count = match self.store.count() {
            Ok(n) => n,
            Err(err) => {
                warn!(%err, "failed to read pending count");
                return;
            }
        };
        let last_sync_at = match self.store.load_last_sync_at() {
            Ok(v) => v,
            Err(err) => {
                warn!(%err, "failed to read last sync timestamp");
                return;
            }
        };
        let offline_mode_enabled = match self.store.load_offline_mode() {
            Ok(v) => v,
            Err(err) => {
                warn!(%err, "failed to read offline mode preference");
                return;
            }
        };

        let status = SyncStatus {
            reachable: self.monitor.is_reachable(),
            syncing: self.syncing.load(Ordering::SeqCst),
            pending_count,
            last_sync_at,
            offline_mode_enabled,
        };
        self.status_tx.send_if_modified(|current| {
            if *current != status {
                *current = status;
                true
            } else {
                false
            }
        });
    }
}
