//! Core types for the Outpost engine

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::OutboxError;

/// Unique identifier for a queued mutation
///
/// Uses ULID for time-ordered unique identifiers that sort lexicographically.
/// The id doubles as the idempotency token for retried deliveries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MutationId(pub Ulid);

impl MutationId {
    /// Create a new MutationId with current timestamp
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Create a MutationId from a ULID
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    /// Get the underlying ULID
    pub fn as_ulid(&self) -> &Ulid {
        &self.0
    }

    /// Convert to string representation
    pub fn to_string_repr(&self) -> String {
        self.0.to_string()
    }

    /// Parse from string representation
    pub fn from_string(s: &str) -> Result<Self, OutboxError> {
        let ulid = Ulid::from_string(s).map_err(|e| OutboxError::InvalidMutationId(e.to_string()))?;
        Ok(Self(ulid))
    }
}

impl Default for MutationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MutationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "mut_{}", self.0)
    }
}

/// Write verb for a queued mutation
///
/// The engine is verb-agnostic: the verb is carried to the transport
/// unchanged and never interpreted locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WriteMethod {
    Post,
    Put,
    Patch,
    Delete,
}

impl WriteMethod {
    /// HTTP method name for this verb
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteMethod::Post => "POST",
            WriteMethod::Put => "PUT",
            WriteMethod::Patch => "PATCH",
            WriteMethod::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for WriteMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for WriteMethod {
    type Err = OutboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "POST" => Ok(WriteMethod::Post),
            "PUT" => Ok(WriteMethod::Put),
            "PATCH" => Ok(WriteMethod::Patch),
            "DELETE" => Ok(WriteMethod::Delete),
            other => Err(OutboxError::InvalidMethod(other.to_string())),
        }
    }
}

/// A unit of deferred work: one write queued for replay against the remote
/// service.
///
/// The payload is opaque to the engine. Collaborators serialize it themselves
/// and tag it with `content_kind` (a MIME-style string) so the transport can
/// forward it faithfully without understanding its shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingMutation {
    /// Unique identifier, assigned at enqueue time
    pub id: MutationId,
    /// Logical target resource (path + optional query)
    pub endpoint: String,
    /// Write verb, passed through to the transport
    pub method: WriteMethod,
    /// Opaque serialized body
    pub payload: Vec<u8>,
    /// Content tag supplied by the collaborator (e.g. "application/json")
    pub content_kind: String,
    /// Unix timestamp at enqueue time
    pub enqueued_at: i64,
    /// Delivery attempts that have left this record behind
    pub attempt: u32,
}

impl PendingMutation {
    /// Create a new pending mutation with a fresh id and current timestamp
    pub fn new(
        endpoint: impl Into<String>,
        method: WriteMethod,
        payload: Vec<u8>,
        content_kind: impl Into<String>,
    ) -> Self {
        Self {
            id: MutationId::new(),
            endpoint: endpoint.into(),
            method,
            payload,
            content_kind: content_kind.into(),
            enqueued_at: chrono::Utc::now().timestamp(),
            attempt: 0,
        }
    }

    /// Age of this mutation in seconds
    pub fn age_secs(&self) -> i64 {
        (chrono::Utc::now().timestamp() - self.enqueued_at).max(0)
    }
}
