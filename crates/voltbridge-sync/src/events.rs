//! # Observer Events
//!
//! Pre-request / post-response event pairs for each push family, plus the
//! session-store correlation callback for CDR outcomes.
//!
//! ## Event Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Observer Events                                   │
//! │                                                                         │
//! │  flush begins                                                          │
//! │      │                                                                  │
//! │      ├──► request_started  { family, correlation_id, item_count }      │
//! │      │                                                                  │
//! │      │        ... uploads run ...                                      │
//! │      │                                                                  │
//! │      └──► request_finished { family, correlation_id, item_count,       │
//! │                              result, elapsed }                         │
//! │                                                                         │
//! │  per CDR, regardless of batch outcome:                                 │
//! │      session_store.record_cdr_outcome(session_id, outcome)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Enqueue-style callers only ever see an immediate acknowledgement; these
//! events are the only place eventual per-item outcomes become observable.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

use crate::outcome::{AggregateResult, ItemOutcome};

// =============================================================================
// Push Family
// =============================================================================

/// The three upload families the engine drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PushFamily {
    /// Station adds/updates plus their folded (delayed + initial) statuses.
    StationData,

    /// Fast-path EVSE status updates.
    EvseStatus,

    /// Charge detail records.
    Cdr,
}

impl std::fmt::Display for PushFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PushFamily::StationData => "station_data",
            PushFamily::EvseStatus => "evse_status",
            PushFamily::Cdr => "cdr",
        };
        write!(f, "{s}")
    }
}

// =============================================================================
// Event Payloads
// =============================================================================

/// Emitted immediately before a flush starts uploading.
#[derive(Debug, Clone, Serialize)]
pub struct RequestStarted {
    /// Which pipeline is flushing.
    pub family: PushFamily,

    /// Correlates this start with its finish event.
    pub correlation_id: Uuid,

    /// Number of drained items about to be processed.
    pub item_count: usize,

    /// When the flush started.
    pub timestamp: DateTime<Utc>,
}

/// Emitted once every upload in the batch has completed.
#[derive(Debug, Clone, Serialize)]
pub struct RequestFinished {
    /// Which pipeline flushed.
    pub family: PushFamily,

    /// Matches the corresponding [`RequestStarted`].
    pub correlation_id: Uuid,

    /// Number of drained items processed.
    pub item_count: usize,

    /// When the flush finished.
    pub timestamp: DateTime<Utc>,

    /// The aggregate result, including the failed subset.
    pub result: AggregateResult,

    /// Wall-clock runtime of the flush.
    #[serde(skip)]
    pub elapsed: Duration,
}

// =============================================================================
// Emitter Trait
// =============================================================================

/// Trait for observing flush cycles (implemented by the host's telemetry).
pub trait SyncEventEmitter: Send + Sync {
    /// A flush is about to start uploading.
    fn request_started(&self, event: &RequestStarted);

    /// A flush completed and produced an aggregate result.
    fn request_finished(&self, event: &RequestFinished);
}

/// No-op event emitter (default, and used in tests).
pub struct NoOpEmitter;

impl SyncEventEmitter for NoOpEmitter {
    fn request_started(&self, _event: &RequestStarted) {}
    fn request_finished(&self, _event: &RequestFinished) {}
}

// =============================================================================
// Session Store Callback
// =============================================================================

/// Correlation callback into the host's session store: every CDR's delivery
/// outcome is reported here individually, regardless of its batch outcome.
pub trait SessionStore: Send + Sync {
    /// Records the delivery outcome for one session's CDR.
    fn record_cdr_outcome(&self, session_id: Uuid, outcome: &ItemOutcome);
}

/// No-op session store (default, and used in tests that don't assert
/// correlation).
pub struct NoOpSessionStore;

impl SessionStore for NoOpSessionStore {
    fn record_cdr_outcome(&self, _session_id: Uuid, _outcome: &ItemOutcome) {}
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_display() {
        assert_eq!(PushFamily::StationData.to_string(), "station_data");
        assert_eq!(PushFamily::EvseStatus.to_string(), "evse_status");
        assert_eq!(PushFamily::Cdr.to_string(), "cdr");
    }

    #[test]
    fn test_finished_event_serializes_result() {
        let event = RequestFinished {
            family: PushFamily::Cdr,
            correlation_id: Uuid::new_v4(),
            item_count: 0,
            timestamp: Utc::now(),
            result: AggregateResult::no_operation(),
            elapsed: Duration::from_millis(5),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["family"], "cdr");
        assert_eq!(json["result"]["overall"], "no_operation");
    }
}
