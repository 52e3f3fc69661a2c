//! FIFO replay of the durable queue.
//!
//! A pass works on the snapshot taken when it starts: mutations enqueued
//! while the pass runs are deferred to the next pass rather than racing the
//! current iteration. Per-item results are classified by the transport:
//!
//! - success: the record is deleted
//! - terminal rejection: the record is deleted and counted as dropped, so a
//!   permanently-invalid mutation cannot starve everything queued behind it
//! - transient failure (including a per-call timeout): the record stays, its
//!   attempt ordinal is bumped, and the pass stops
//!
//! Stopping at the first transient failure is a deliberate, uniform policy:
//! it keeps the remaining queue in snapshot order and avoids issuing calls
//! that are likely to fail the same way.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::OutboxResult;
use crate::store::QueueStore;
use crate::sync::events::SyncReport;
use crate::sync::transport::{RemoteTransport, TransportError};

/// Walks the queue in insertion order and applies each mutation remotely.
#[derive(Clone)]
pub struct SyncDriver {
    transport: Arc<dyn RemoteTransport>,
    request_timeout: Duration,
}

impl SyncDriver {
    /// Create a driver using the given transport and per-call timeout.
    pub fn new(transport: Arc<dyn RemoteTransport>, request_timeout: Duration) -> Self {
        Self {
            transport,
            request_timeout,
        }
    }

    /// Run a single replay pass over the current queue snapshot.
    ///
    /// `last_sync_at` advances only when the snapshot drained without a
    /// transient failure; a transiently-failed pass leaves it untouched so
    /// collaborators can see that the queue is stalled.
    ///
    /// Concurrency guards (single-flight, reachability, empty queue) belong
    /// to the caller; the driver assumes it is the only writer while running.
    pub async fn run_pass(&self, store: &QueueStore) -> OutboxResult<SyncReport> {
        let snapshot = store.list_all()?;
        debug!(items = snapshot.len(), "starting sync pass");

        let mut succeeded = 0u64;
        let mut dropped = 0u64;
        let mut drained = true;

        for mutation in &snapshot {
            let outcome =
                match tokio::time::timeout(self.request_timeout, self.transport.apply(mutation))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(TransportError::Transient("request timed out".to_string())),
                };

            match outcome {
                Ok(()) => {
                    store.delete_by_id(&mutation.id)?;
                    succeeded += 1;
                    debug!(id = %mutation.id, endpoint = %mutation.endpoint, "mutation applied");
                }
                Err(err) if err.is_transient() => {
                    store.record_attempt(&mutation.id)?;
                    debug!(
                        id = %mutation.id,
                        endpoint = %mutation.endpoint,
                        %err,
                        "transient failure, stopping pass"
                    );
                    drained = false;
                    break;
                }
                Err(err) => {
                    store.delete_by_id(&mutation.id)?;
                    dropped += 1;
                    warn!(
                        id = %mutation.id,
                        endpoint = %mutation.endpoint,
                        %err,
                        "dropping mutation rejected by server"
                    );
                }
            }
        }

        if drained {
            store.save_last_sync_at(chrono::Utc::now().timestamp())?;
        }

        let remaining = store.count()?;
        let report = SyncReport {
            succeeded,
            dropped,
            remaining,
        };
        debug!(%report, "sync pass finished");
        Ok(report)
    }
}
