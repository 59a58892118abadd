//! # Pending-Change Store
//!
//! In-memory queues holding not-yet-uploaded changes, behind a single
//! bounded-wait mutex. The lock covers in-memory set operations only and is
//! never held across a network call — that discipline is what keeps a slow
//! hub from blocking new enqueues.
//!
//! ## Queue Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       PendingStore                                      │
//! │                                                                         │
//! │  to_add      { station_id → snapshot }   new stations                  │
//! │  to_update   { station_id → snapshot }   changed stations              │
//! │  to_remove   { station_id }              dropped from tracking         │
//! │                                                                         │
//! │  status_fast     [ StatusUpdate ]   owner already known to the hub     │
//! │  status_delayed  [ StatusUpdate ]   owner still waiting in to_add      │
//! │                                                                         │
//! │  INVARIANT: a status update whose owner is in to_add lives in          │
//! │  status_delayed, never status_fast, until that station has been        │
//! │  uploaded at least once. Statuses are coalesced per EVSE, keeping      │
//! │  the latest timestamp.                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tokio::time::timeout;
use tracing::debug;

use voltbridge_core::{Station, StationId, StatusUpdate};

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Snapshots
// =============================================================================

/// Immutable snapshot returned by [`PendingStore::drain_data_and_status`].
/// The backing collections are cleared atomically with the drain.
#[derive(Debug, Clone, Default)]
pub struct DataSnapshot {
    /// Stations to create on the hub.
    pub adds: Vec<Station>,

    /// Stations to update. May still contain ids also present in `adds`
    /// (a race between add and update enqueue); the flush cycle drops
    /// those before upload.
    pub updates: Vec<Station>,

    /// Stations dropped from tracking. No remote call is issued for these.
    pub removes: Vec<StationId>,

    /// Delayed statuses folded with synthetic "initial status" entries for
    /// every EVSE of every drained add, coalesced per EVSE (latest wins).
    pub statuses: Vec<StatusUpdate>,
}

impl DataSnapshot {
    /// True when nothing was drained (skip-flush optimization applies).
    pub fn is_empty(&self) -> bool {
        self.adds.is_empty()
            && self.updates.is_empty()
            && self.removes.is_empty()
            && self.statuses.is_empty()
    }
}

/// Immutable snapshot returned by [`PendingStore::drain_status_fast`].
#[derive(Debug, Clone, Default)]
pub struct StatusSnapshot {
    /// Fast-path status updates ready to upload now.
    pub updates: Vec<StatusUpdate>,
}

impl StatusSnapshot {
    /// True when nothing was drained.
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

/// Where [`PendingStore::enqueue_status`] routed an update. The caller
/// uses this to decide which flush timer to re-arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusRoute {
    /// Queued for the fast status flush.
    Fast,

    /// Owner station is still waiting in `to_add`; the update rides with
    /// the next data flush instead.
    Delayed,

    /// Superseded by a newer pending update for the same EVSE; nothing
    /// queued.
    Dropped,
}

/// Queue depths for status reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueDepths {
    pub adds: usize,
    pub updates: usize,
    pub removes: usize,
    pub status_fast: usize,
    pub status_delayed: usize,
}

// =============================================================================
// Store
// =============================================================================

#[derive(Debug, Default)]
struct StoreInner {
    to_add: HashMap<StationId, Station>,
    to_update: HashMap<StationId, Station>,
    to_remove: HashSet<StationId>,
    status_fast: Vec<StatusUpdate>,
    status_delayed: Vec<StatusUpdate>,
}

/// The pending-change store: every mutating operation acquires the store
/// lock with a bounded wait and fails with `LockTimeout` on expiry.
#[derive(Debug)]
pub struct PendingStore {
    inner: Mutex<StoreInner>,
    lock_wait: Duration,
}

impl PendingStore {
    /// Creates an empty store with the given lock-wait bound.
    pub fn new(lock_wait: Duration) -> Self {
        PendingStore {
            inner: Mutex::new(StoreInner::default()),
            lock_wait,
        }
    }

    /// Acquires the store lock within the configured bound.
    async fn lock(&self) -> SyncResult<MutexGuard<'_, StoreInner>> {
        timeout(self.lock_wait, self.inner.lock())
            .await
            .map_err(|_| SyncError::LockTimeout {
                queue: "pending store",
                waited_ms: self.lock_wait.as_millis() as u64,
            })
    }

    // -------------------------------------------------------------------------
    // Enqueue operations
    // -------------------------------------------------------------------------

    /// Queues a newly created station. Replaces any older pending add for
    /// the same id and supersedes a pending update (the add carries the
    /// freshest snapshot).
    pub async fn enqueue_add(&self, station: Station) -> SyncResult<()> {
        let mut inner = self.lock().await?;
        inner.to_update.remove(&station.id);
        inner.to_remove.remove(&station.id);
        inner.to_add.insert(station.id.clone(), station);
        Ok(())
    }

    /// Queues a station update.
    ///
    /// No-op if the id is already pending as an add: the add implies the
    /// freshest state will be uploaded anyway, so a second intent for the
    /// same id would only produce a redundant call.
    pub async fn enqueue_update(&self, station: Station) -> SyncResult<()> {
        let mut inner = self.lock().await?;
        if inner.to_add.contains_key(&station.id) {
            debug!(station_id = %station.id, "Update suppressed by pending add");
            return Ok(());
        }
        inner.to_remove.remove(&station.id);
        inner.to_update.insert(station.id.clone(), station);
        Ok(())
    }

    /// Queues a station removal and purges every other pending intent for
    /// it. Removal only drops the station from tracking; no remote delete
    /// call is issued.
    pub async fn enqueue_remove(&self, station_id: StationId) -> SyncResult<()> {
        let mut inner = self.lock().await?;
        inner.to_add.remove(&station_id);
        inner.to_update.remove(&station_id);
        inner.status_fast.retain(|u| u.station_id != station_id);
        inner.status_delayed.retain(|u| u.station_id != station_id);
        inner.to_remove.insert(station_id);
        Ok(())
    }

    /// Queues an EVSE status update.
    ///
    /// Classification: if the owning station is still waiting in `to_add`,
    /// the update goes to the delayed queue (it must not reach the hub
    /// before the station's first upload); otherwise it goes to the fast
    /// queue. Per EVSE only the latest update (by timestamp) is kept.
    pub async fn enqueue_status(&self, update: StatusUpdate) -> SyncResult<StatusRoute> {
        let mut inner = self.lock().await?;

        // Coalesce: an older pending entry for this EVSE is superseded; a
        // newer one wins over an out-of-order arrival.
        let newer_exists = inner
            .status_fast
            .iter()
            .chain(inner.status_delayed.iter())
            .any(|u| u.evse_id == update.evse_id && u.timestamp > update.timestamp);
        if newer_exists {
            debug!(evse_id = %update.evse_id, "Dropping out-of-order status update");
            return Ok(StatusRoute::Dropped);
        }
        inner.status_fast.retain(|u| u.evse_id != update.evse_id);
        inner.status_delayed.retain(|u| u.evse_id != update.evse_id);

        if inner.to_add.contains_key(&update.station_id) {
            inner.status_delayed.push(update);
            Ok(StatusRoute::Delayed)
        } else {
            inner.status_fast.push(update);
            Ok(StatusRoute::Fast)
        }
    }

    // -------------------------------------------------------------------------
    // Drain operations
    // -------------------------------------------------------------------------

    /// Atomically snapshots and clears the data queues (adds, updates,
    /// removes) plus the delayed status queue.
    ///
    /// The delayed statuses are folded with synthetic "initial status"
    /// entries derived from every EVSE of every drained add: a newly
    /// created station must also report the current status of its EVSEs,
    /// even though no status change event ever fired for them.
    pub async fn drain_data_and_status(&self) -> SyncResult<DataSnapshot> {
        let mut inner = self.lock().await?;

        let adds: Vec<Station> = inner.to_add.drain().map(|(_, s)| s).collect();
        let updates: Vec<Station> = inner.to_update.drain().map(|(_, s)| s).collect();
        let removes: Vec<StationId> = inner.to_remove.drain().collect();
        let delayed: Vec<StatusUpdate> = std::mem::take(&mut inner.status_delayed);
        drop(inner);

        // Fold synthetic initial statuses with the delayed queue, keeping
        // the latest entry per EVSE.
        let mut latest: HashMap<_, StatusUpdate> = HashMap::new();
        for update in adds
            .iter()
            .flat_map(|station| station.evse_statuses())
            .chain(delayed)
        {
            match latest.get(&update.evse_id) {
                Some(existing) if existing.timestamp >= update.timestamp => {}
                _ => {
                    latest.insert(update.evse_id.clone(), update);
                }
            }
        }
        let statuses: Vec<StatusUpdate> = latest.into_values().collect();

        Ok(DataSnapshot {
            adds,
            updates,
            removes,
            statuses,
        })
    }

    /// Atomically snapshots and clears the fast status queue.
    ///
    /// Re-partitions first: any fast entry whose owner has since entered
    /// `to_add` (a race between add and status enqueue) is moved to the
    /// delayed queue instead of being drained, preserving the ordering
    /// invariant under concurrent producers.
    pub async fn drain_status_fast(&self) -> SyncResult<StatusSnapshot> {
        let mut inner = self.lock().await?;

        let fast = std::mem::take(&mut inner.status_fast);
        let (delayed, ready): (Vec<_>, Vec<_>) = fast
            .into_iter()
            .partition(|u| inner.to_add.contains_key(&u.station_id));

        if !delayed.is_empty() {
            debug!(
                count = delayed.len(),
                "Re-partitioned fast statuses behind pending adds"
            );
            inner.status_delayed.extend(delayed);
        }

        Ok(StatusSnapshot { updates: ready })
    }

    // -------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------

    /// Current queue depths.
    pub async fn depths(&self) -> SyncResult<QueueDepths> {
        let inner = self.lock().await?;
        Ok(QueueDepths {
            adds: inner.to_add.len(),
            updates: inner.to_update.len(),
            removes: inner.to_remove.len(),
            status_fast: inner.status_fast.len(),
            status_delayed: inner.status_delayed.len(),
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use voltbridge_core::{Evse, EvseId, EvseStatus};

    fn station(id: &str, evses: &[(&str, EvseStatus)]) -> Station {
        let station_id = StationId::new(id);
        Station {
            id: station_id.clone(),
            name: format!("Station {id}"),
            operator_id: "DE*VLT".to_string(),
            address: "Somewhere 1".to_string(),
            coordinates: None,
            evses: evses
                .iter()
                .map(|(evse_id, status)| Evse {
                    id: EvseId::new(*evse_id),
                    station_id: station_id.clone(),
                    status: *status,
                    connectors: vec![],
                    last_updated: Utc::now(),
                })
                .collect(),
            last_updated: Utc::now(),
        }
    }

    fn status(evse: &str, owner: &str, new: EvseStatus) -> StatusUpdate {
        StatusUpdate {
            evse_id: EvseId::new(evse),
            station_id: StationId::new(owner),
            old_status: EvseStatus::Unknown,
            new_status: new,
            timestamp: Utc::now(),
        }
    }

    fn store() -> PendingStore {
        PendingStore::new(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_add_then_update_is_suppressed() {
        let store = store();
        store.enqueue_add(station("S1", &[])).await.unwrap();
        store.enqueue_update(station("S1", &[])).await.unwrap();

        let snapshot = store.drain_data_and_status().await.unwrap();
        assert_eq!(snapshot.adds.len(), 1);
        assert!(snapshot.updates.is_empty());
    }

    #[tokio::test]
    async fn test_update_without_add_is_queued() {
        let store = store();
        store.enqueue_update(station("S1", &[])).await.unwrap();

        let snapshot = store.drain_data_and_status().await.unwrap();
        assert!(snapshot.adds.is_empty());
        assert_eq!(snapshot.updates.len(), 1);
    }

    #[tokio::test]
    async fn test_status_for_pending_add_goes_to_delayed() {
        let store = store();
        store.enqueue_add(station("S1", &[])).await.unwrap();
        store
            .enqueue_status(status("C1", "S1", EvseStatus::Available))
            .await
            .unwrap();

        let depths = store.depths().await.unwrap();
        assert_eq!(depths.status_delayed, 1);
        assert_eq!(depths.status_fast, 0);

        // The fast flush must not see it.
        let fast = store.drain_status_fast().await.unwrap();
        assert!(fast.is_empty());
    }

    #[tokio::test]
    async fn test_status_for_known_station_goes_to_fast() {
        let store = store();
        store
            .enqueue_status(status("C1", "S1", EvseStatus::Occupied))
            .await
            .unwrap();

        let fast = store.drain_status_fast().await.unwrap();
        assert_eq!(fast.updates.len(), 1);
        assert_eq!(fast.updates[0].new_status, EvseStatus::Occupied);
    }

    #[tokio::test]
    async fn test_status_coalescing_keeps_latest() {
        let store = store();
        let mut first = status("C1", "S1", EvseStatus::Occupied);
        let mut second = status("C1", "S1", EvseStatus::Available);
        first.timestamp = Utc::now() - chrono::Duration::seconds(10);
        second.timestamp = Utc::now();

        store.enqueue_status(first).await.unwrap();
        store.enqueue_status(second).await.unwrap();

        let fast = store.drain_status_fast().await.unwrap();
        assert_eq!(fast.updates.len(), 1);
        assert_eq!(fast.updates[0].new_status, EvseStatus::Available);
    }

    #[tokio::test]
    async fn test_out_of_order_status_is_dropped() {
        let store = store();
        let mut newer = status("C1", "S1", EvseStatus::Available);
        let mut older = status("C1", "S1", EvseStatus::Occupied);
        newer.timestamp = Utc::now();
        older.timestamp = Utc::now() - chrono::Duration::seconds(10);

        store.enqueue_status(newer).await.unwrap();
        store.enqueue_status(older).await.unwrap();

        let fast = store.drain_status_fast().await.unwrap();
        assert_eq!(fast.updates.len(), 1);
        assert_eq!(fast.updates[0].new_status, EvseStatus::Available);
    }

    #[tokio::test]
    async fn test_fast_drain_repartitions_behind_new_add() {
        let store = store();
        // Status arrives while the owner is unknown → fast queue.
        store
            .enqueue_status(status("C1", "S1", EvseStatus::Available))
            .await
            .unwrap();
        // The add races in afterwards.
        store.enqueue_add(station("S1", &[])).await.unwrap();

        // The fast drain must hold the status back, not upload it.
        let fast = store.drain_status_fast().await.unwrap();
        assert!(fast.is_empty());
        let depths = store.depths().await.unwrap();
        assert_eq!(depths.status_delayed, 1);
    }

    #[tokio::test]
    async fn test_data_drain_folds_initial_statuses() {
        let store = store();
        store
            .enqueue_add(station(
                "S1",
                &[("C1", EvseStatus::Available), ("C2", EvseStatus::OutOfOrder)],
            ))
            .await
            .unwrap();

        let snapshot = store.drain_data_and_status().await.unwrap();
        assert_eq!(snapshot.adds.len(), 1);
        assert_eq!(snapshot.statuses.len(), 2);
        // Drain cleared everything.
        assert_eq!(store.depths().await.unwrap(), QueueDepths::default());
    }

    #[tokio::test]
    async fn test_data_drain_prefers_delayed_over_synthetic() {
        let store = store();
        store
            .enqueue_add(station("S1", &[("C1", EvseStatus::Available)]))
            .await
            .unwrap();
        // A real status change after creation supersedes the synthetic one.
        let mut update = status("C1", "S1", EvseStatus::Occupied);
        update.timestamp = Utc::now() + chrono::Duration::seconds(5);
        store.enqueue_status(update).await.unwrap();

        let snapshot = store.drain_data_and_status().await.unwrap();
        assert_eq!(snapshot.statuses.len(), 1);
        assert_eq!(snapshot.statuses[0].new_status, EvseStatus::Occupied);
    }

    #[tokio::test]
    async fn test_remove_purges_other_intents() {
        let store = store();
        store
            .enqueue_add(station("S1", &[("C1", EvseStatus::Available)]))
            .await
            .unwrap();
        store
            .enqueue_status(status("C1", "S1", EvseStatus::Occupied))
            .await
            .unwrap();
        store.enqueue_remove(StationId::new("S1")).await.unwrap();

        let depths = store.depths().await.unwrap();
        assert_eq!(depths.adds, 0);
        assert_eq!(depths.status_delayed, 0);
        assert_eq!(depths.removes, 1);

        let snapshot = store.drain_data_and_status().await.unwrap();
        assert!(snapshot.adds.is_empty());
        assert!(snapshot.statuses.is_empty());
        assert_eq!(snapshot.removes, vec![StationId::new("S1")]);
    }

    #[tokio::test]
    async fn test_lock_timeout_yields_error_not_hang() {
        let store = std::sync::Arc::new(PendingStore::new(Duration::from_millis(50)));

        // Hold the lock externally for longer than the bound.
        let guard = store.inner.lock().await;

        let result = store.enqueue_add(station("S1", &[])).await;
        assert!(matches!(result, Err(SyncError::LockTimeout { .. })));
        drop(guard);

        // Lock released: the store works again.
        store.enqueue_add(station("S1", &[])).await.unwrap();
    }
}
