//! # Flush Orchestrator
//!
//! Drives one debounced upload cycle per queue family: drain the store
//! under its lock, upload outside the lock with bounded concurrency, merge
//! the partial results, publish the aggregate to observers.
//!
//! ## Flush State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Flush Cycle (per family)                            │
//! │                                                                         │
//! │   Idle ──timer──► Draining ──► Uploading ──► Merging ──► Idle          │
//! │                      │             │                                    │
//! │                      │ empty       │ pipeline disabled                  │
//! │                      ▼             ▼                                    │
//! │                 NoOperation    AdminDown per item                       │
//! │                 (no network)   (snapshot consumed, no network)          │
//! │                                                                         │
//! │  ORDERING: within one data flush, station uploads complete BEFORE      │
//! │  any folded status upload starts — a status can never reach the hub    │
//! │  ahead of the add that creates its owner.                              │
//! │                                                                         │
//! │  A flush NEVER panics or returns an error: every failure is folded     │
//! │  into the aggregate, so the timer-driven scheduler survives any batch. │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use voltbridge_core::{Station, StatusUpdate};

use crate::config::SyncConfig;
use crate::events::{PushFamily, RequestFinished, RequestStarted, SyncEventEmitter};
use crate::hooks::Hooks;
use crate::outcome::{AggregateResult, ItemOutcome, ItemResult};
use crate::protocol::{to_station_push, to_status_push};
use crate::store::{DataSnapshot, PendingStore};
use crate::transport::{classify_push, PushTransport};
use crate::uploader::upload_bounded;

// =============================================================================
// Flusher
// =============================================================================

/// Per-family flush driver. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Flusher {
    config: Arc<SyncConfig>,
    store: Arc<PendingStore>,
    transport: Arc<dyn PushTransport>,
    hooks: Arc<Hooks>,
    emitter: Arc<dyn SyncEventEmitter>,
}

impl Flusher {
    /// Creates a flusher over the shared store and transport.
    pub fn new(
        config: Arc<SyncConfig>,
        store: Arc<PendingStore>,
        transport: Arc<dyn PushTransport>,
        hooks: Arc<Hooks>,
        emitter: Arc<dyn SyncEventEmitter>,
    ) -> Self {
        Flusher {
            config,
            store,
            transport,
            hooks,
            emitter,
        }
    }

    // -------------------------------------------------------------------------
    // Station data + delayed statuses
    // -------------------------------------------------------------------------

    /// Flushes the data queues: station adds and updates, removals, and the
    /// delayed statuses folded with initial statuses for new stations.
    pub async fn flush_data_and_status(&self) -> AggregateResult {
        let correlation_id = Uuid::new_v4();
        let started = Instant::now();

        // Draining: snapshot + clear under the store lock. No request has
        // started yet, so these early exits stay silent toward observers
        // (a finish event without its start would break the pairing).
        let snapshot = match self.store.drain_data_and_status().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(%correlation_id, error = %e, "Data flush could not drain");
                return AggregateResult::lock_timeout();
            }
        };

        // Skip-flush optimization: empty snapshot, no network activity.
        if snapshot.is_empty() {
            return AggregateResult::no_operation();
        }

        if !snapshot.removes.is_empty() {
            // Removal degrades to being dropped from local tracking; the
            // hub is not told (no delete endpoint in the push API yet).
            debug!(
                count = snapshot.removes.len(),
                "Stations dropped from tracking without remote delete"
            );
        }

        let item_count =
            snapshot.adds.len() + snapshot.updates.len() + snapshot.statuses.len();
        self.emit_started(PushFamily::StationData, correlation_id, item_count);

        // Uploading: stations first, then their statuses — never the other
        // way around.
        let station_part = self.upload_stations(&snapshot).await;
        let status_part = self.upload_statuses(snapshot.statuses).await;

        // Merging: combine partial results and publish.
        let result = AggregateResult::merge([station_part, status_part]);
        self.log_result(PushFamily::StationData, correlation_id, &result);
        self.emit_finished(
            PushFamily::StationData,
            correlation_id,
            item_count,
            started,
            &result,
        );
        result
    }

    /// Uploads the drained adds plus updates (minus ids shadowed by adds).
    async fn upload_stations(&self, snapshot: &DataSnapshot) -> AggregateResult {
        let add_ids: HashSet<_> = snapshot.adds.iter().map(|s| s.id.clone()).collect();

        // An add already implies the freshest snapshot; an update for the
        // same id in the same cycle is redundant and dropped silently.
        let stations: Vec<Station> = snapshot
            .adds
            .iter()
            .cloned()
            .chain(
                snapshot
                    .updates
                    .iter()
                    .filter(|s| !add_ids.contains(&s.id))
                    .cloned(),
            )
            .collect();

        if stations.is_empty() {
            return AggregateResult::from_items(Vec::new());
        }

        if !self.config.pipelines.station_push {
            info!(count = stations.len(), "Station push disabled - dropping drained snapshot");
            return AggregateResult::admin_down(
                stations.into_iter().map(|s| s.id.to_string()),
            );
        }

        let transport = Arc::clone(&self.transport);
        let hooks = Arc::clone(&self.hooks);
        let results = upload_bounded(
            stations,
            self.config.upload.max_parallel,
            |station| station.id.to_string(),
            move |station| {
                let transport = Arc::clone(&transport);
                let hooks = Arc::clone(&hooks);
                async move {
                    match to_station_push(&station, &hooks) {
                        Ok(payload) => classify_push(transport.push_station(&payload).await),
                        Err(reason) => ItemOutcome::ConversionFailed(reason),
                    }
                }
            },
        )
        .await;

        AggregateResult::from_items(results)
    }

    /// Uploads a set of status updates with bounded concurrency.
    async fn upload_statuses(&self, statuses: Vec<StatusUpdate>) -> AggregateResult {
        if statuses.is_empty() {
            return AggregateResult::from_items(Vec::new());
        }

        if !self.config.pipelines.status_push {
            info!(count = statuses.len(), "Status push disabled - dropping drained snapshot");
            return AggregateResult::admin_down(
                statuses.into_iter().map(|u| u.evse_id.to_string()),
            );
        }

        let transport = Arc::clone(&self.transport);
        let hooks = Arc::clone(&self.hooks);
        let results = upload_bounded(
            statuses,
            self.config.upload.max_parallel,
            |update| update.evse_id.to_string(),
            move |update| {
                let transport = Arc::clone(&transport);
                let hooks = Arc::clone(&hooks);
                async move {
                    match to_status_push(&update, &hooks) {
                        Ok(payload) => classify_push(transport.push_status(&payload).await),
                        Err(reason) => ItemOutcome::ConversionFailed(reason),
                    }
                }
            },
        )
        .await;

        AggregateResult::from_items(results)
    }

    // -------------------------------------------------------------------------
    // Fast statuses
    // -------------------------------------------------------------------------

    /// Flushes the fast status queue. Entries whose owner has since entered
    /// `to_add` are re-partitioned back to the delayed queue by the drain
    /// and never appear here.
    pub async fn flush_fast_status(&self) -> AggregateResult {
        let correlation_id = Uuid::new_v4();
        let started = Instant::now();

        let snapshot = match self.store.drain_status_fast().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(%correlation_id, error = %e, "Fast status flush could not drain");
                return AggregateResult::lock_timeout();
            }
        };

        if snapshot.is_empty() {
            return AggregateResult::no_operation();
        }

        let item_count = snapshot.updates.len();
        self.emit_started(PushFamily::EvseStatus, correlation_id, item_count);

        let result = self.upload_statuses(snapshot.updates).await;
        self.log_result(PushFamily::EvseStatus, correlation_id, &result);
        self.emit_finished(
            PushFamily::EvseStatus,
            correlation_id,
            item_count,
            started,
            &result,
        );
        result
    }

    // -------------------------------------------------------------------------
    // Events & logging
    // -------------------------------------------------------------------------

    fn emit_started(&self, family: PushFamily, correlation_id: Uuid, item_count: usize) {
        self.emitter.request_started(&RequestStarted {
            family,
            correlation_id,
            item_count,
            timestamp: Utc::now(),
        });
    }

    fn emit_finished(
        &self,
        family: PushFamily,
        correlation_id: Uuid,
        item_count: usize,
        started: Instant,
        result: &AggregateResult,
    ) {
        self.emitter.request_finished(&RequestFinished {
            family,
            correlation_id,
            item_count,
            timestamp: Utc::now(),
            result: result.clone(),
            elapsed: started.elapsed(),
        });
    }

    fn log_result(&self, family: PushFamily, correlation_id: Uuid, result: &AggregateResult) {
        let failed = result.failed();
        if failed.is_empty() {
            debug!(
                %family,
                %correlation_id,
                items = result.items.len(),
                "Flush completed"
            );
        } else {
            for item in &failed {
                warn!(
                    %family,
                    %correlation_id,
                    item_id = %item.item_id,
                    outcome = %item.outcome,
                    "Push item failed"
                );
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
