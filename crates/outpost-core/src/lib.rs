//! Outpost Core Library
//!
//! Offline-first outbox engine: durable local queueing of write mutations
//! with FIFO replay against a remote service.
//!
//! ## Overview
//!
//! Outpost lets an application keep accepting writes while disconnected.
//! Each write is persisted as a [`PendingMutation`] in a crash-durable local
//! queue before anything touches the network. When connectivity returns (or
//! on manual request), the queue is replayed in strict insertion order; the
//! published [`SyncStatus`] keeps the user informed of pending and failed
//! work throughout.
//!
//! ## Core Principles
//!
//! - **Durability before acknowledgment**: a mutation is committed locally
//!   before `enqueue` returns
//! - **FIFO replay**: later mutations may depend on earlier ones, so order
//!   is never changed
//! - **Single-flight sync**: at most one replay pass at a time; extra
//!   triggers collapse into one remembered signal
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use outpost_core::{ConnectivityMonitor, HttpTransport, OutboxEngine, WriteMethod};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let monitor = Arc::new(ConnectivityMonitor::new(true));
//!     monitor.start();
//!
//!     let transport = Arc::new(HttpTransport::new("https://api.example.com"));
//!     let engine = OutboxEngine::open("~/.outpost/data", transport, monitor)?;
//!     engine.start();
//!
//!     // Durable immediately, delivered when possible
//!     engine.enqueue("/tasks", WriteMethod::Post, br#"{"title":"x"}"#.to_vec(), "application/json")?;
//!
//!     // Watch the published status
//!     let mut status = engine.subscribe_status();
//!     while status.changed().await.is_ok() {
//!         println!("{}", *status.borrow());
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod monitor;
pub mod store;
pub mod sync;
pub mod types;

// Re-exports
pub use config::OutboxConfig;
pub use engine::OutboxEngine;
pub use error::{OutboxError, OutboxResult};
pub use monitor::{ConnectivityMonitor, SignalHandle};
pub use store::QueueStore;
pub use sync::{
    HttpTransport, RemoteTransport, SkipReason, SyncDriver, SyncOutcome, SyncReport, SyncStatus,
    TransportError,
};
pub use types::{MutationId, PendingMutation, WriteMethod};
