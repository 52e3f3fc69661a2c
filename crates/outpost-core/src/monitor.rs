//! Connectivity monitoring with deduplicated transition events.
//!
//! The platform layer (browser events, netlink, a probe loop) feeds raw
//! online/offline signals through a [`SignalHandle`]; the monitor collapses
//! duplicates so subscribers observe exactly one notification per genuine
//! transition. The underlying signal source is best-effort: the sync driver
//! still treats each network call's own outcome as authoritative.
//!
//! The monitor has an explicit lifecycle (`start`/`stop`) instead of
//! registering process-wide listeners, which keeps tests hermetic: a test
//! holds a `SignalHandle` and plays connectivity transitions by hand.

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Cloneable handle for feeding raw reachability signals into the monitor.
///
/// Signals may be duplicated or redundant; the monitor deduplicates.
/// Reports after the monitor has stopped are silently discarded.
#[derive(Clone)]
pub struct SignalHandle {
    tx: mpsc::UnboundedSender<bool>,
}

impl SignalHandle {
    /// Report the current raw reachability state.
    pub fn report(&self, reachable: bool) {
        let _ = self.tx.send(reachable);
    }
}

/// Reachability state with a transition event stream.
///
/// This component cannot fail; it only reports.
pub struct ConnectivityMonitor {
    reachable_tx: watch::Sender<bool>,
    signal_tx: mpsc::UnboundedSender<bool>,
    signal_rx: Mutex<Option<mpsc::UnboundedReceiver<bool>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectivityMonitor {
    /// Create a monitor with the given initial reachability state.
    ///
    /// Call [`start`](Self::start) before feeding signals.
    pub fn new(initially_reachable: bool) -> Self {
        let (reachable_tx, _) = watch::channel(initially_reachable);
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        Self {
            reachable_tx,
            signal_tx,
            signal_rx: Mutex::new(Some(signal_rx)),
            task: Mutex::new(None),
        }
    }

    /// Start forwarding raw signals into the deduplicated state.
    ///
    /// Idempotent while running. A stopped monitor cannot be restarted;
    /// create a new one instead.
    pub fn start(&self) {
        let mut task = self.task.lock();
        if task.is_some() {
            debug!("connectivity monitor already started");
            return;
        }
        let Some(mut rx) = self.signal_rx.lock().take() else {
            debug!("connectivity monitor was stopped; not restarting");
            return;
        };

        let reachable_tx = self.reachable_tx.clone();
        *task = Some(tokio::spawn(async move {
            while let Some(reachable) = rx.recv().await {
                let changed = reachable_tx.send_if_modified(|current| {
                    if *current != reachable {
                        *current = reachable;
                        true
                    } else {
                        false
                    }
                });
                if changed {
                    info!(reachable, "connectivity transition");
                }
            }
            debug!("connectivity signal channel closed");
        }));
    }

    /// Stop processing signals. Final; the last observed state stays readable.
    pub fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }

    /// Get a handle for reporting raw reachability signals.
    pub fn signal_handle(&self) -> SignalHandle {
        SignalHandle {
            tx: self.signal_tx.clone(),
        }
    }

    /// Current reachability state.
    pub fn is_reachable(&self) -> bool {
        *self.reachable_tx.borrow()
    }

    /// Subscribe to reachability transitions.
    ///
    /// The receiver is notified exactly once per genuine transition; repeated
    /// identical signals produce no notification.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.reachable_tx.subscribe()
    }
}
