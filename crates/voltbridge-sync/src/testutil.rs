//! Test doubles shared by the engine's unit tests: a scriptable transport,
//! a recording event emitter, a recording session store, and fixtures.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use voltbridge_core::{
    ChargeRecord, Connector, Evse, EvseId, EvseStatus, Station, StationId, StatusUpdate,
};

use crate::error::SyncResult;
use crate::events::{RequestFinished, RequestStarted, SessionStore, SyncEventEmitter};
use crate::outcome::ItemOutcome;
use crate::protocol::{CdrPush, EvseStatusPush, PushResponse, StationPush, HUB_STATUS_OK};
use crate::transport::PushTransport;

// =============================================================================
// Mock Transport
// =============================================================================

/// Scriptable in-memory transport. Records every call, can be told to
/// reject specific items, and tracks the in-flight high-water mark.
#[derive(Default)]
pub(crate) struct MockTransport {
    pub station_calls: Mutex<Vec<StationPush>>,
    pub status_calls: Mutex<Vec<EvseStatusPush>>,
    pub cdr_calls: Mutex<Vec<CdrPush>>,

    /// Station ids the hub should reject.
    pub reject_stations: Mutex<HashSet<String>>,
    /// EVSE ids the hub should reject.
    pub reject_evses: Mutex<HashSet<String>>,
    /// Session ids the hub should reject.
    pub reject_sessions: Mutex<HashSet<Uuid>>,

    /// Artificial per-call latency (for concurrency observation).
    pub call_delay: Option<Duration>,

    in_flight: AtomicUsize,
    high_water: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        MockTransport {
            call_delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn max_observed_concurrency(&self) -> usize {
        self.high_water.load(Ordering::SeqCst)
    }

    async fn simulate_call(&self, accepted: bool) -> PushResponse {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.high_water.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.call_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if accepted {
            PushResponse {
                status_code: HUB_STATUS_OK,
                status_message: Some("OK".to_string()),
            }
        } else {
            PushResponse {
                status_code: 2001,
                status_message: Some("rejected by hub".to_string()),
            }
        }
    }

    fn locked<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
        match mutex.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl PushTransport for MockTransport {
    async fn push_station(&self, payload: &StationPush) -> SyncResult<PushResponse> {
        let accepted = !Self::locked(&self.reject_stations).contains(&payload.station_id);
        Self::locked(&self.station_calls).push(payload.clone());
        Ok(self.simulate_call(accepted).await)
    }

    async fn push_status(&self, payload: &EvseStatusPush) -> SyncResult<PushResponse> {
        let accepted = !Self::locked(&self.reject_evses).contains(&payload.evse_id);
        Self::locked(&self.status_calls).push(payload.clone());
        Ok(self.simulate_call(accepted).await)
    }

    async fn push_cdr(&self, payload: &CdrPush) -> SyncResult<PushResponse> {
        let accepted = !Self::locked(&self.reject_sessions).contains(&payload.session_id);
        Self::locked(&self.cdr_calls).push(payload.clone());
        Ok(self.simulate_call(accepted).await)
    }

    async fn verify_token(&self, _token: &str) -> SyncResult<bool> {
        Ok(true)
    }
}

// =============================================================================
// Recording Observers
// =============================================================================

/// Event emitter that records every event for assertions.
#[derive(Default)]
pub(crate) struct RecordingEmitter {
    pub started: Mutex<Vec<RequestStarted>>,
    pub finished: Mutex<Vec<RequestFinished>>,
}

impl SyncEventEmitter for RecordingEmitter {
    fn request_started(&self, event: &RequestStarted) {
        if let Ok(mut started) = self.started.lock() {
            started.push(event.clone());
        }
    }

    fn request_finished(&self, event: &RequestFinished) {
        if let Ok(mut finished) = self.finished.lock() {
            finished.push(event.clone());
        }
    }
}

/// Session store that records every correlated CDR outcome.
#[derive(Default)]
pub(crate) struct RecordingSessionStore {
    pub outcomes: Mutex<Vec<(Uuid, ItemOutcome)>>,
}

impl SessionStore for RecordingSessionStore {
    fn record_cdr_outcome(&self, session_id: Uuid, outcome: &ItemOutcome) {
        if let Ok(mut outcomes) = self.outcomes.lock() {
            outcomes.push((session_id, outcome.clone()));
        }
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub(crate) fn station(id: &str, evses: &[(&str, EvseStatus)]) -> Station {
    let station_id = StationId::new(id);
    Station {
        id: station_id.clone(),
        name: format!("Station {id}"),
        operator_id: "DE*VLT".to_string(),
        address: "Industriestr. 5, Berlin".to_string(),
        coordinates: Some((52.52, 13.40)),
        evses: evses
            .iter()
            .map(|(evse_id, status)| Evse {
                id: EvseId::new(*evse_id),
                station_id: station_id.clone(),
                status: *status,
                connectors: vec![Connector {
                    id: 1,
                    standard: "IEC_62196_T2".to_string(),
                    power_kw: 22.0,
                }],
                last_updated: Utc::now(),
            })
            .collect(),
        last_updated: Utc::now(),
    }
}

pub(crate) fn status_update(evse: &str, owner: &str, new_status: EvseStatus) -> StatusUpdate {
    StatusUpdate {
        evse_id: EvseId::new(evse),
        station_id: StationId::new(owner),
        old_status: EvseStatus::Unknown,
        new_status,
        timestamp: Utc::now(),
    }
}

pub(crate) fn charge_record(station_id: &str, evse_id: &str) -> ChargeRecord {
    let now = Utc::now();
    ChargeRecord {
        session_id: Uuid::new_v4(),
        station_id: StationId::new(station_id),
        evse_id: EvseId::new(evse_id),
        started_at: now - chrono::Duration::minutes(45),
        ended_at: now,
        energy_wh: 18_200,
        total_cost_cents: 910,
        currency: "EUR".to_string(),
    }
}
