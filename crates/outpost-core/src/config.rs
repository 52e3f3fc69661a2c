//! Engine configuration

use std::time::Duration;

/// Tunable policy for the outbox engine.
///
/// Defaults match the behavior described in the module docs: each network
/// call carries its own timeout, and a successful enqueue opportunistically
/// kicks off a sync pass when the device is reachable.
#[derive(Debug, Clone)]
pub struct OutboxConfig {
    /// Per-call timeout for each mutation delivery. A timed-out call is a
    /// transient failure, not a drop.
    pub request_timeout: Duration,
    /// Whether `enqueue` may opportunistically trigger a sync pass when
    /// reachable and not already syncing.
    pub sync_on_enqueue: bool,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            sync_on_enqueue: true,
        }
    }
}
