//! # Sync Error Types
//!
//! Error types for the push engine.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Conversion          │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Transport      │  │  Conversion             │ │
//! │  │  ConfigLoad     │  │  RequestTimeout │  │  Serialization          │ │
//! │  │  InvalidUrl     │  │  HubRejected    │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │    Queueing     │  │     Domain      │                              │
//! │  │                 │  │                 │                              │
//! │  │  LockTimeout    │  │  Core (wrap)    │                              │
//! │  │  ShuttingDown   │  │                 │                              │
//! │  └─────────────────┘  └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Item-level push failures are NOT errors of this type: they are carried as
//! [`crate::outcome::ItemOutcome`] values inside an aggregate result, so a
//! single bad item can never abort its batch. `SyncError` is reserved for
//! whole-call failures (bad config, lock not obtained, transport plumbing).

use thiserror::Error;
use voltbridge_core::CoreError;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering whole-call push engine failures.
///
/// ## Design Principles
/// - Each variant includes enough context for debugging
/// - Errors are categorized for different handling strategies
/// - All errors are `Send + Sync` for async compatibility
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid sync configuration.
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Invalid hub URL.
    #[error("Invalid hub URL: {0}")]
    InvalidUrl(String),

    // =========================================================================
    // Queueing Errors
    // =========================================================================
    /// Could not acquire a queue lock within the configured bound.
    #[error("Could not acquire {queue} lock within {waited_ms} ms")]
    LockTimeout { queue: &'static str, waited_ms: u64 },

    /// The adapter is shutting down and no longer accepts work.
    #[error("Push adapter is shutting down")]
    ShuttingDown,

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// Network-level failure talking to the roaming hub.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The request hit the per-request timeout (or was cancelled).
    #[error("Request timed out after {0} seconds")]
    RequestTimeout(u64),

    /// The hub answered with a non-success HTTP status.
    #[error("Hub rejected request with HTTP {status}: {body}")]
    HubRejected { status: u16, body: String },

    // =========================================================================
    // Conversion Errors
    // =========================================================================
    /// A local item could not be mapped to the wire shape.
    #[error("Conversion failed: {0}")]
    Conversion(String),

    /// Failed to serialize a payload.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    // =========================================================================
    // Domain Errors
    // =========================================================================
    /// Wrapped domain error.
    #[error("Domain error: {0}")]
    Core(#[from] CoreError),
}

impl SyncError {
    /// Returns true for failures worth retrying on a later flush cycle
    /// (transient transport conditions, contested locks).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SyncError::LockTimeout { .. }
                | SyncError::Transport(_)
                | SyncError::RequestTimeout(_)
                | SyncError::HubRejected { .. }
        )
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
