//! # Wire Protocol
//!
//! Data-transfer shapes for the roaming hub's push API, plus the conversions
//! from domain snapshots. Mechanical by design: every interesting decision
//! lives in the flush path, not here.
//!
//! ## Payload Families
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Push Payloads                                     │
//! │                                                                         │
//! │  StationPush       POST /stations     create-or-replace one station    │
//! │  EvseStatusPush    POST /statuses     set-current-status for one EVSE  │
//! │  CdrPush           POST /cdrs         deliver one charge record        │
//! │                                                                         │
//! │  PushResponse      envelope returned by every endpoint:                │
//! │                    { "status_code": 1000, "status_message": "OK" }     │
//! │                    status_code 1000 means accepted                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use voltbridge_core::validation::validate_charge_record;
use voltbridge_core::{ChargeRecord, Station, StatusUpdate};

use crate::hooks::Hooks;

// =============================================================================
// Remote Envelope
// =============================================================================

/// Status code the hub uses for "accepted".
pub const HUB_STATUS_OK: i32 = 1000;

/// Response envelope returned by every push endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushResponse {
    /// Hub-side status code; [`HUB_STATUS_OK`] means accepted.
    pub status_code: i32,

    /// Optional human-readable status message.
    #[serde(default)]
    pub status_message: Option<String>,
}

impl PushResponse {
    /// Whether the hub accepted the item.
    pub fn is_accepted(&self) -> bool {
        self.status_code == HUB_STATUS_OK
    }

    /// The remote message, or the raw status code when no message came back.
    pub fn warning(&self) -> String {
        match &self.status_message {
            Some(msg) => format!("hub status {}: {msg}", self.status_code),
            None => format!("hub status {}", self.status_code),
        }
    }
}

// =============================================================================
// Station Push
// =============================================================================

/// WGS84 coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// One connector on an EVSE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorPush {
    pub id: u32,
    pub standard: String,
    pub power_kw: f64,
}

/// One EVSE within a station push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvsePush {
    pub evse_id: String,
    pub status: String,
    pub connectors: Vec<ConnectorPush>,
}

/// Create-or-replace payload for one station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationPush {
    pub station_id: String,
    pub name: String,
    pub operator_id: String,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    pub evses: Vec<EvsePush>,
    pub last_updated: DateTime<Utc>,
}

// =============================================================================
// Status Push
// =============================================================================

/// Set-current-status payload for one EVSE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvseStatusPush {
    pub evse_id: String,
    pub station_id: String,
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

// =============================================================================
// CDR Push
// =============================================================================

/// Delivery payload for one charge detail record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CdrPush {
    pub session_id: Uuid,
    pub station_id: String,
    pub evse_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub energy_wh: i64,
    pub total_cost_cents: i64,
    pub currency: String,
}

// =============================================================================
// Conversions
// =============================================================================

/// Converts a station snapshot to its wire shape.
///
/// Fails (with a human-readable reason) when the station or one of its
/// EVSEs has no id mapping — the caller classifies that `ConversionFailed`.
pub fn to_station_push(station: &Station, hooks: &Hooks) -> Result<StationPush, String> {
    let station_id = hooks
        .ids
        .map_station_id(&station.id)
        .ok_or_else(|| format!("no hub mapping for station id {}", station.id))?;

    let mut evses = Vec::with_capacity(station.evses.len());
    for evse in &station.evses {
        let evse_id = hooks
            .ids
            .map_evse_id(&evse.id)
            .ok_or_else(|| format!("no hub mapping for EVSE id {}", evse.id))?;
        evses.push(EvsePush {
            evse_id,
            status: evse.status.to_string(),
            connectors: evse
                .connectors
                .iter()
                .map(|c| ConnectorPush {
                    id: c.id,
                    standard: c.standard.clone(),
                    power_kw: c.power_kw,
                })
                .collect(),
        });
    }

    let payload = StationPush {
        station_id,
        name: station.name.clone(),
        operator_id: station.operator_id.clone(),
        address: station.address.clone(),
        coordinates: station.coordinates.map(|(latitude, longitude)| Coordinates {
            latitude,
            longitude,
        }),
        evses,
        last_updated: station.last_updated,
    };

    Ok(hooks.transform.transform_station(payload))
}

/// Converts a status update to its wire shape.
pub fn to_status_push(update: &StatusUpdate, hooks: &Hooks) -> Result<EvseStatusPush, String> {
    let evse_id = hooks
        .ids
        .map_evse_id(&update.evse_id)
        .ok_or_else(|| format!("no hub mapping for EVSE id {}", update.evse_id))?;
    let station_id = hooks
        .ids
        .map_station_id(&update.station_id)
        .ok_or_else(|| format!("no hub mapping for station id {}", update.station_id))?;

    let payload = EvseStatusPush {
        evse_id,
        station_id,
        status: update.new_status.to_string(),
        timestamp: update.timestamp,
    };

    Ok(hooks.transform.transform_status(payload))
}

/// Converts a charge record to its wire shape.
///
/// Runs the domain validator first: an invalid record is a local bug and
/// must classify `ConversionFailed` without reaching the transport.
pub fn to_cdr_push(record: &ChargeRecord, hooks: &Hooks) -> Result<CdrPush, String> {
    validate_charge_record(record).map_err(|e| e.to_string())?;

    let station_id = hooks
        .ids
        .map_station_id(&record.station_id)
        .ok_or_else(|| format!("no hub mapping for station id {}", record.station_id))?;
    let evse_id = hooks
        .ids
        .map_evse_id(&record.evse_id)
        .ok_or_else(|| format!("no hub mapping for EVSE id {}", record.evse_id))?;

    let payload = CdrPush {
        session_id: record.session_id,
        station_id,
        evse_id,
        started_at: record.started_at,
        ended_at: record.ended_at,
        energy_wh: record.energy_wh,
        total_cost_cents: record.total_cost_cents,
        currency: record.currency.clone(),
    };

    Ok(hooks.transform.transform_cdr(payload))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::IdMapper;
    use std::sync::Arc;
    use voltbridge_core::{Connector, Evse, EvseId, EvseStatus, StationId};

    fn sample_station() -> Station {
        let station_id = StationId::new("DE*VLT*S001");
        Station {
            id: station_id.clone(),
            name: "Depot North".to_string(),
            operator_id: "DE*VLT".to_string(),
            address: "Industriestr. 5, Berlin".to_string(),
            coordinates: Some((52.52, 13.40)),
            evses: vec![Evse {
                id: EvseId::new("DE*VLT*E001*1"),
                station_id,
                status: EvseStatus::Available,
                connectors: vec![Connector {
                    id: 1,
                    standard: "IEC_62196_T2".to_string(),
                    power_kw: 22.0,
                }],
                last_updated: Utc::now(),
            }],
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn test_push_response_classification() {
        let ok = PushResponse {
            status_code: HUB_STATUS_OK,
            status_message: Some("OK".to_string()),
        };
        assert!(ok.is_accepted());

        let rejected = PushResponse {
            status_code: 2001,
            status_message: Some("unknown operator".to_string()),
        };
        assert!(!rejected.is_accepted());
        assert_eq!(rejected.warning(), "hub status 2001: unknown operator");
    }

    #[test]
    fn test_station_conversion_identity_mapping() {
        let push = to_station_push(&sample_station(), &Hooks::default()).unwrap();
        assert_eq!(push.station_id, "DE*VLT*S001");
        assert_eq!(push.evses.len(), 1);
        assert_eq!(push.evses[0].evse_id, "DE*VLT*E001*1");
        assert_eq!(push.evses[0].status, "available");
    }

    #[test]
    fn test_station_conversion_fails_on_unmappable_id() {
        struct NoMapping;
        impl IdMapper for NoMapping {
            fn map_station_id(&self, _id: &StationId) -> Option<String> {
                None
            }
        }
        let mut hooks = Hooks::default();
        hooks.ids = Arc::new(NoMapping);

        let err = to_station_push(&sample_station(), &hooks).unwrap_err();
        assert!(err.contains("no hub mapping"));
    }

    #[test]
    fn test_status_conversion_uses_new_status() {
        let update = StatusUpdate {
            evse_id: EvseId::new("DE*VLT*E001*1"),
            station_id: StationId::new("DE*VLT*S001"),
            old_status: EvseStatus::Available,
            new_status: EvseStatus::Occupied,
            timestamp: Utc::now(),
        };
        let push = to_status_push(&update, &Hooks::default()).unwrap();
        assert_eq!(push.status, "occupied");
    }

    #[test]
    fn test_cdr_conversion_rejects_invalid_record() {
        let now = Utc::now();
        let record = ChargeRecord {
            session_id: Uuid::new_v4(),
            station_id: StationId::new("DE*VLT*S001"),
            evse_id: EvseId::new("DE*VLT*E001*1"),
            started_at: now,
            ended_at: now - chrono::Duration::minutes(5), // inverted
            energy_wh: 1000,
            total_cost_cents: 100,
            currency: "EUR".to_string(),
        };
        assert!(to_cdr_push(&record, &Hooks::default()).is_err());
    }

    #[test]
    fn test_payload_serializes_snake_case() {
        let push = to_station_push(&sample_station(), &Hooks::default()).unwrap();
        let json = serde_json::to_value(&push).unwrap();
        assert!(json.get("station_id").is_some());
        assert!(json.get("last_updated").is_some());
    }
}
