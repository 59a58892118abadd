//! # Error Types
//!
//! Domain-specific error types for voltbridge-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  voltbridge-core errors (this file)                                    │
//! │  ├── CoreError        - General domain errors                          │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  voltbridge-sync errors (separate crate)                               │
//! │  └── SyncError        - Queue, timer, and transport failures           │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → SyncError → host backend          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (station id, EVSE id, etc.)
//! 3. Errors are enum variants, never String

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
///
/// These errors represent domain rule violations. They should be caught
/// and translated by the layer that owns the offending data.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Station cannot be found.
    #[error("Station not found: {0}")]
    StationNotFound(String),

    /// EVSE cannot be found on the given station.
    #[error("EVSE {evse_id} not found on station {station_id}")]
    EvseNotFound { station_id: String, evse_id: String },

    /// A charge record references a session that never ended.
    ///
    /// ## When This Occurs
    /// - The session store hands out a CDR for a session with no end time
    /// - Clock skew produced an end time before the start time
    #[error("Session {session_id} has an invalid time range")]
    InvalidSessionRange { session_id: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These occur when a snapshot or identifier does not meet the rules the
/// roaming hub enforces. Used for early validation before anything is queued.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g., disallowed characters in an id).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
