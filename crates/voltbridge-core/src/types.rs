//! # Domain Types
//!
//! Core domain types shared by the push engine and the host backend.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Station      │   │      Evse       │   │  ChargeRecord   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (StationId) │   │  id (EvseId)    │   │  session_id     │       │
//! │  │  name           │──►│  status         │   │  energy_wh      │       │
//! │  │  evses[]        │   │  connectors[]   │   │  total_cost     │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  StatusUpdate   │   │   EvseStatus    │   │    Session      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  evse_id        │   │  Available      │   │  id (UUID)      │       │
//! │  │  old → new      │   │  Occupied       │   │  started_at     │       │
//! │  │  timestamp      │   │  OutOfOrder ... │   │  cdr (Option)   │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Semantics
//! The push engine never holds references into the live domain model. A
//! `Station` here is a serializable copy taken at enqueue time; the hub
//! receives create-or-replace pushes, so a stale snapshot is simply
//! overwritten by the next one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Identifiers
// =============================================================================

/// Stable identifier for a charging station.
///
/// Roaming ids follow the `<country>*<operator>*<local>` convention,
/// e.g. `DE*VLT*S001`. The engine treats the id as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StationId(pub String);

impl StationId {
    /// Creates a station id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        StationId(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StationId {
    fn from(s: &str) -> Self {
        StationId(s.to_string())
    }
}

/// Stable identifier for an EVSE (a sub-unit of a station with its own
/// status), e.g. `DE*VLT*E001*1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvseId(pub String);

impl EvseId {
    /// Creates an EVSE id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        EvseId(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EvseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EvseId {
    fn from(s: &str) -> Self {
        EvseId(s.to_string())
    }
}

// =============================================================================
// EVSE Status
// =============================================================================

/// Operational status of an EVSE as reported to the roaming hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvseStatus {
    /// Ready for a new charging session.
    Available,

    /// A session is in progress or the EVSE is reserved.
    Occupied,

    /// Faulted or under maintenance.
    OutOfOrder,

    /// Announced but not yet installed.
    Planned,

    /// Permanently decommissioned.
    Removed,

    /// Status could not be determined (e.g. station offline).
    #[default]
    Unknown,
}

impl std::fmt::Display for EvseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EvseStatus::Available => "available",
            EvseStatus::Occupied => "occupied",
            EvseStatus::OutOfOrder => "out_of_order",
            EvseStatus::Planned => "planned",
            EvseStatus::Removed => "removed",
            EvseStatus::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

// =============================================================================
// Station / EVSE / Connector Snapshots
// =============================================================================

/// A physical connector on an EVSE (plug).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connector {
    /// Connector number within the EVSE (1-based).
    pub id: u32,

    /// Plug standard, e.g. `IEC_62196_T2`, `CHADEMO`.
    pub standard: String,

    /// Maximum power in kilowatts.
    pub power_kw: f64,
}

/// Snapshot of an EVSE at enqueue time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evse {
    /// Roaming EVSE id.
    pub id: EvseId,

    /// Owning station id.
    pub station_id: StationId,

    /// Current operational status.
    pub status: EvseStatus,

    /// Physical connectors.
    pub connectors: Vec<Connector>,

    /// When this snapshot was taken.
    pub last_updated: DateTime<Utc>,
}

/// Snapshot of a charging station at enqueue time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    /// Roaming station id.
    pub id: StationId,

    /// Display name.
    pub name: String,

    /// Operator id this station belongs to.
    pub operator_id: String,

    /// Postal address (free-form; the hub does its own geocoding).
    pub address: String,

    /// WGS84 coordinates as (latitude, longitude).
    pub coordinates: Option<(f64, f64)>,

    /// EVSEs belonging to this station.
    pub evses: Vec<Evse>,

    /// When this snapshot was taken.
    pub last_updated: DateTime<Utc>,
}

impl Station {
    /// Returns the current status of every EVSE on this station.
    ///
    /// Used to derive the "initial status" pushes that accompany a newly
    /// created station: the hub must learn the EVSEs' statuses even though
    /// no status *change* event ever fired for them.
    pub fn evse_statuses(&self) -> Vec<StatusUpdate> {
        self.evses
            .iter()
            .map(|evse| StatusUpdate {
                evse_id: evse.id.clone(),
                station_id: self.id.clone(),
                old_status: EvseStatus::Unknown,
                new_status: evse.status,
                timestamp: evse.last_updated,
            })
            .collect()
    }
}

// =============================================================================
// Status Update
// =============================================================================

/// A single EVSE status transition.
///
/// Multiple updates for the same EVSE may arrive before a flush; only the
/// most recent (by timestamp) is meaningful, and the push engine coalesces
/// accordingly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    /// The EVSE whose status changed.
    pub evse_id: EvseId,

    /// The station owning that EVSE.
    pub station_id: StationId,

    /// Status before the transition.
    pub old_status: EvseStatus,

    /// Status after the transition.
    pub new_status: EvseStatus,

    /// When the transition happened.
    pub timestamp: DateTime<Utc>,
}

// =============================================================================
// Session / Charge Record
// =============================================================================

/// A completed (or in-progress) charging session, owned by the host's
/// session store. The push engine only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Session id (UUID v4, assigned by the host backend).
    pub id: Uuid,

    /// Station where the session took place.
    pub station_id: StationId,

    /// EVSE used.
    pub evse_id: EvseId,

    /// Session start.
    pub started_at: DateTime<Utc>,

    /// Session end; `None` while the session is still running.
    pub ended_at: Option<DateTime<Utc>>,

    /// Energy delivered in watt-hours.
    pub energy_wh: i64,

    /// The charge detail record, attached once the session has been priced.
    pub cdr: Option<ChargeRecord>,
}

impl Session {
    /// Returns true once the session has ended and carries a CDR.
    pub fn is_billable(&self) -> bool {
        self.ended_at.is_some() && self.cdr.is_some()
    }
}

/// Charge detail record: the terminal usage record for one completed session.
///
/// Monetary amounts are integer cents to avoid floating point drift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeRecord {
    /// Originating session id, used to correlate delivery outcomes back to
    /// the session store.
    pub session_id: Uuid,

    /// Station where the session took place.
    pub station_id: StationId,

    /// EVSE used.
    pub evse_id: EvseId,

    /// Session start.
    pub started_at: DateTime<Utc>,

    /// Session end.
    pub ended_at: DateTime<Utc>,

    /// Energy delivered in watt-hours.
    pub energy_wh: i64,

    /// Total cost in integer cents.
    pub total_cost_cents: i64,

    /// ISO 4217 currency code.
    pub currency: String,
}

impl ChargeRecord {
    /// Session duration.
    ///
    /// Returns a zero duration if the record carries an inverted time range;
    /// range validity is checked by [`crate::validation::validate_charge_record`].
    pub fn duration(&self) -> chrono::Duration {
        (self.ended_at - self.started_at).max(chrono::Duration::zero())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_station() -> Station {
        let station_id = StationId::new("DE*VLT*S001");
        Station {
            id: station_id.clone(),
            name: "Depot North".to_string(),
            operator_id: "DE*VLT".to_string(),
            address: "Industriestr. 5, Berlin".to_string(),
            coordinates: Some((52.52, 13.40)),
            evses: vec![
                Evse {
                    id: EvseId::new("DE*VLT*E001*1"),
                    station_id: station_id.clone(),
                    status: EvseStatus::Available,
                    connectors: vec![Connector {
                        id: 1,
                        standard: "IEC_62196_T2".to_string(),
                        power_kw: 22.0,
                    }],
                    last_updated: Utc::now(),
                },
                Evse {
                    id: EvseId::new("DE*VLT*E001*2"),
                    station_id,
                    status: EvseStatus::OutOfOrder,
                    connectors: vec![],
                    last_updated: Utc::now(),
                },
            ],
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn test_station_id_display() {
        let id = StationId::new("DE*VLT*S001");
        assert_eq!(id.to_string(), "DE*VLT*S001");
        assert_eq!(id.as_str(), "DE*VLT*S001");
    }

    #[test]
    fn test_evse_status_serde_snake_case() {
        let json = serde_json::to_string(&EvseStatus::OutOfOrder).unwrap();
        assert_eq!(json, "\"out_of_order\"");
        let back: EvseStatus = serde_json::from_str("\"available\"").unwrap();
        assert_eq!(back, EvseStatus::Available);
    }

    #[test]
    fn test_evse_statuses_derives_one_update_per_evse() {
        let station = sample_station();
        let updates = station.evse_statuses();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].new_status, EvseStatus::Available);
        assert_eq!(updates[0].old_status, EvseStatus::Unknown);
        assert_eq!(updates[1].new_status, EvseStatus::OutOfOrder);
        assert!(updates.iter().all(|u| u.station_id == station.id));
    }

    #[test]
    fn test_charge_record_duration_never_negative() {
        let now = Utc::now();
        let record = ChargeRecord {
            session_id: Uuid::new_v4(),
            station_id: StationId::new("DE*VLT*S001"),
            evse_id: EvseId::new("DE*VLT*E001*1"),
            started_at: now,
            ended_at: now - chrono::Duration::seconds(10),
            energy_wh: 100,
            total_cost_cents: 50,
            currency: "EUR".to_string(),
        };
        assert_eq!(record.duration(), chrono::Duration::zero());
    }

    #[test]
    fn test_session_billable() {
        let now = Utc::now();
        let mut session = Session {
            id: Uuid::new_v4(),
            station_id: StationId::new("DE*VLT*S001"),
            evse_id: EvseId::new("DE*VLT*E001*1"),
            started_at: now,
            ended_at: None,
            energy_wh: 0,
            cdr: None,
        };
        assert!(!session.is_billable());

        session.ended_at = Some(now);
        assert!(!session.is_billable());

        session.cdr = Some(ChargeRecord {
            session_id: session.id,
            station_id: session.station_id.clone(),
            evse_id: session.evse_id.clone(),
            started_at: now,
            ended_at: now,
            energy_wh: 1000,
            total_cost_cents: 420,
            currency: "EUR".to_string(),
        });
        assert!(session.is_billable());
    }
}
