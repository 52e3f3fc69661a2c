//! Queue replay layer
//!
//! ## Overview
//!
//! The sync module owns everything between the durable queue and the remote
//! service:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  SyncDriver (FIFO replay pass)                                  │
//! │  ├── snapshots the queue, applies each mutation in order        │
//! │  ├── success   → delete, count as succeeded                     │
//! │  ├── terminal  → delete, count as dropped                       │
//! │  └── transient → bump attempt, stop the pass                    │
//! │                                                                 │
//! │  RemoteTransport (delivery seam)                                │
//! │  ├── HttpTransport: reqwest, Idempotency-Key per mutation       │
//! │  └── test doubles script outcomes per endpoint                  │
//! │                                                                 │
//! │  SyncStatus / SyncOutcome / SyncReport                          │
//! │  └── the published state collaborators subscribe to             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod driver;
pub mod events;
pub mod transport;

pub use driver::SyncDriver;
pub use events::{SkipReason, SyncOutcome, SyncReport, SyncStatus};
pub use transport::{HttpTransport, RemoteTransport, TransportError};
