//! # Extension Hooks
//!
//! Narrow capability traits injected at adapter construction. Each seam has
//! an identity / always-true default, so a host that needs no customization
//! builds the adapter without touching any of these.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Hook Seams                                       │
//! │                                                                         │
//! │  ScopeFilter          decides what is synchronized at all              │
//! │                       (out-of-scope items dropped at enqueue)          │
//! │  IdMapper             maps local ids to the hub's id space             │
//! │                       (None = unmappable → ConversionFailed)           │
//! │  PayloadTransformer   last-mile payload adjustments before upload      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use voltbridge_core::{ChargeRecord, EvseId, Station, StationId, StatusUpdate};

use crate::protocol::{CdrPush, EvseStatusPush, StationPush};

// =============================================================================
// Scope Filter
// =============================================================================

/// Decides whether an item is in scope for synchronization.
///
/// Out-of-scope stations and statuses are dropped at enqueue time and never
/// queued; out-of-scope CDRs classify as `Filtered` and are reported
/// separately from transport failures.
pub trait ScopeFilter: Send + Sync {
    /// Whether this station (and its EVSEs) should be pushed at all.
    fn station_in_scope(&self, _station: &Station) -> bool {
        true
    }

    /// Whether this status update should be pushed.
    fn status_in_scope(&self, _update: &StatusUpdate) -> bool {
        true
    }

    /// Whether this charge record should be delivered.
    fn cdr_in_scope(&self, _record: &ChargeRecord) -> bool {
        true
    }
}

// =============================================================================
// Id Mapper
// =============================================================================

/// Maps local ids into the hub's id space.
///
/// Returning `None` marks the id unmappable; the owning item classifies as
/// `ConversionFailed` without touching the network.
pub trait IdMapper: Send + Sync {
    /// Maps a station id. Identity by default.
    fn map_station_id(&self, id: &StationId) -> Option<String> {
        Some(id.as_str().to_string())
    }

    /// Maps an EVSE id. Identity by default.
    fn map_evse_id(&self, id: &EvseId) -> Option<String> {
        Some(id.as_str().to_string())
    }
}

// =============================================================================
// Payload Transformer
// =============================================================================

/// Last-mile payload adjustment applied after conversion, before upload.
pub trait PayloadTransformer: Send + Sync {
    /// Transforms a station payload. Identity by default.
    fn transform_station(&self, payload: StationPush) -> StationPush {
        payload
    }

    /// Transforms a status payload. Identity by default.
    fn transform_status(&self, payload: EvseStatusPush) -> EvseStatusPush {
        payload
    }

    /// Transforms a CDR payload. Identity by default.
    fn transform_cdr(&self, payload: CdrPush) -> CdrPush {
        payload
    }
}

// =============================================================================
// Defaults & Bundle
// =============================================================================

/// Identity implementation of every hook.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHooks;

impl ScopeFilter for DefaultHooks {}
impl IdMapper for DefaultHooks {}
impl PayloadTransformer for DefaultHooks {}

/// The hook set carried by the adapter.
#[derive(Clone)]
pub struct Hooks {
    /// Scope predicate.
    pub scope: Arc<dyn ScopeFilter>,

    /// Id mapping.
    pub ids: Arc<dyn IdMapper>,

    /// Payload transformation.
    pub transform: Arc<dyn PayloadTransformer>,
}

impl Default for Hooks {
    fn default() -> Self {
        let defaults = Arc::new(DefaultHooks);
        Hooks {
            scope: defaults.clone(),
            ids: defaults.clone(),
            transform: defaults,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use voltbridge_core::EvseStatus;

    #[test]
    fn test_default_scope_accepts_everything() {
        let hooks = Hooks::default();
        let update = StatusUpdate {
            evse_id: EvseId::new("DE*VLT*E001*1"),
            station_id: StationId::new("DE*VLT*S001"),
            old_status: EvseStatus::Available,
            new_status: EvseStatus::Occupied,
            timestamp: Utc::now(),
        };
        assert!(hooks.scope.status_in_scope(&update));
    }

    #[test]
    fn test_default_id_mapper_is_identity() {
        let hooks = Hooks::default();
        let id = StationId::new("DE*VLT*S001");
        assert_eq!(hooks.ids.map_station_id(&id).as_deref(), Some("DE*VLT*S001"));
    }

    #[test]
    fn test_custom_mapper_can_reject() {
        struct Unmappable;
        impl IdMapper for Unmappable {
            fn map_station_id(&self, _id: &StationId) -> Option<String> {
                None
            }
        }
        let mapper = Unmappable;
        assert!(mapper.map_station_id(&StationId::new("X")).is_none());
        // EVSE mapping keeps its identity default
        assert_eq!(
            mapper.map_evse_id(&EvseId::new("E1")).as_deref(),
            Some("E1")
        );
    }
}
