//! # Push Adapter
//!
//! The public facade over the whole engine: the host backend hands it
//! station lifecycle events, EVSE status changes, and completed sessions,
//! and gets an immediate acknowledgement back while the actual hub traffic
//! happens behind debounce timers.
//!
//! ## Wiring
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           PushAdapter                                   │
//! │                                                                         │
//! │  notify_station_*  ──► scope filter ──► PendingStore ──► data timer    │
//! │  notify_status_change ──► scope filter ──► PendingStore ──┬► fast timer│
//! │                                         (delayed route) ──┴► data timer│
//! │  notify_session_completed ──► CdrPipeline ──► cdr timer (Enqueue)      │
//! │                                                                         │
//! │  timer fires ──► Flusher / CdrPipeline ──► PushTransport ──► hub       │
//! │                                                                         │
//! │  flush_*_now()           bypass the timers for tests and shutdown      │
//! │  status()                queue depths + timer states                    │
//! │  shutdown()              disarm timers, one final flush of everything   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! There is no ambient singleton: the host constructs an adapter via
//! [`PushAdapterBuilder`], owns it, and drops it when done.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use voltbridge_core::{ChargeRecord, Session, Station, StationId, StatusUpdate};

use crate::cdr::{CdrPipeline, DeliveryMode};
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::events::{NoOpEmitter, NoOpSessionStore, SessionStore, SyncEventEmitter};
use crate::flusher::Flusher;
use crate::hooks::Hooks;
use crate::outcome::{AggregateResult, ItemOutcome, ItemResult};
use crate::scheduler::DebounceTimer;
use crate::store::{PendingStore, QueueDepths, StatusRoute};
use crate::transport::{HttpPushTransport, PushTransport, UnconfiguredTransport};

// =============================================================================
// Builder
// =============================================================================

/// Builds a [`PushAdapter`], wiring defaults for everything not injected:
/// an HTTP transport from the hub endpoint config, a no-op event emitter,
/// a no-op session store, and identity hooks.
pub struct PushAdapterBuilder {
    config: SyncConfig,
    transport: Option<Arc<dyn PushTransport>>,
    emitter: Option<Arc<dyn SyncEventEmitter>>,
    session_store: Option<Arc<dyn SessionStore>>,
    hooks: Option<Hooks>,
}

impl PushAdapterBuilder {
    pub fn new(config: SyncConfig) -> Self {
        PushAdapterBuilder {
            config,
            transport: None,
            emitter: None,
            session_store: None,
            hooks: None,
        }
    }

    /// Overrides the transport (tests inject a mock here).
    pub fn transport(mut self, transport: Arc<dyn PushTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Subscribes an event emitter to request lifecycle events.
    pub fn emitter(mut self, emitter: Arc<dyn SyncEventEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// Connects the session store that receives per-CDR outcomes.
    pub fn session_store(mut self, session_store: Arc<dyn SessionStore>) -> Self {
        self.session_store = Some(session_store);
        self
    }

    /// Installs scope filter / id mapper / payload transformer hooks.
    pub fn hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Validates the configuration and assembles the adapter.
    pub fn build(self) -> SyncResult<PushAdapter> {
        self.config.validate()?;
        let config = Arc::new(self.config);

        // A fully disabled adapter is valid without a hub endpoint; only
        // build the HTTP transport when some pipeline can actually use it.
        let transport: Arc<dyn PushTransport> = match self.transport {
            Some(transport) => transport,
            None if config.pipelines.any_enabled() => Arc::new(HttpPushTransport::new(
                &config.hub,
                config.request_timeout(),
            )?),
            None => Arc::new(UnconfiguredTransport),
        };
        let emitter = self.emitter.unwrap_or_else(|| Arc::new(NoOpEmitter));
        let session_store = self
            .session_store
            .unwrap_or_else(|| Arc::new(NoOpSessionStore));
        let hooks = Arc::new(self.hooks.unwrap_or_default());

        let store = Arc::new(PendingStore::new(config.store_lock_wait()));
        let flusher = Flusher::new(
            Arc::clone(&config),
            Arc::clone(&store),
            Arc::clone(&transport),
            Arc::clone(&hooks),
            Arc::clone(&emitter),
        );
        let cdr = CdrPipeline::new(
            Arc::clone(&config),
            Arc::clone(&transport),
            Arc::clone(&hooks),
            emitter,
            session_store,
        );

        info!(
            hub = %config.hub.base_url,
            station_push = config.pipelines.station_push,
            status_push = config.pipelines.status_push,
            cdr_push = config.pipelines.cdr_push,
            "Push adapter ready"
        );

        Ok(PushAdapter {
            config,
            store,
            flusher,
            cdr,
            hooks,
            transport,
            data_timer: DebounceTimer::new("data"),
            fast_timer: DebounceTimer::new("status-fast"),
            cdr_timer: DebounceTimer::new("cdr"),
            shutting_down: Arc::new(AtomicBool::new(false)),
        })
    }
}

// =============================================================================
// Adapter
// =============================================================================

/// Point-in-time view of the adapter's internal state.
#[derive(Debug, Clone, Copy)]
pub struct AdapterStatus {
    /// Pending-change queue depths.
    pub depths: QueueDepths,

    /// CDRs waiting for the timer flush.
    pub cdr_queued: usize,

    /// Timer states.
    pub data_timer_armed: bool,
    pub fast_timer_armed: bool,
    pub cdr_timer_armed: bool,
}

/// The outbound sync adapter. All methods return an immediate
/// acknowledgement; hub traffic runs on the timers.
pub struct PushAdapter {
    config: Arc<SyncConfig>,
    store: Arc<PendingStore>,
    flusher: Flusher,
    cdr: CdrPipeline,
    hooks: Arc<Hooks>,
    transport: Arc<dyn PushTransport>,

    data_timer: DebounceTimer,
    fast_timer: DebounceTimer,
    cdr_timer: DebounceTimer,

    shutting_down: Arc<AtomicBool>,
}

impl PushAdapter {
    /// Entry point for configuration-driven construction.
    pub fn builder(config: SyncConfig) -> PushAdapterBuilder {
        PushAdapterBuilder::new(config)
    }

    fn check_running(&self) -> SyncResult<()> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(SyncError::ShuttingDown);
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Station lifecycle
    // -------------------------------------------------------------------------

    /// A station was created on the host side.
    pub async fn notify_station_created(&self, station: Station) -> SyncResult<AggregateResult> {
        self.check_running()?;
        if !self.hooks.scope.station_in_scope(&station) {
            debug!(station_id = %station.id, "Station out of scope - dropped at enqueue");
            return Ok(AggregateResult::no_operation());
        }

        let station_id = station.id.to_string();
        self.store.enqueue_add(station).await?;
        self.arm_data_timer();
        Ok(AggregateResult::enqueued([station_id]))
    }

    /// A station's master data changed on the host side.
    pub async fn notify_station_updated(&self, station: Station) -> SyncResult<AggregateResult> {
        self.check_running()?;
        if !self.hooks.scope.station_in_scope(&station) {
            debug!(station_id = %station.id, "Station out of scope - dropped at enqueue");
            return Ok(AggregateResult::no_operation());
        }

        let station_id = station.id.to_string();
        self.store.enqueue_update(station).await?;
        self.arm_data_timer();
        Ok(AggregateResult::enqueued([station_id]))
    }

    /// A station was removed on the host side. Purges every pending intent
    /// for it; no remote delete is issued.
    pub async fn notify_station_removed(&self, station_id: StationId) -> SyncResult<AggregateResult> {
        self.check_running()?;
        let id = station_id.to_string();
        self.store.enqueue_remove(station_id).await?;
        self.arm_data_timer();
        Ok(AggregateResult::enqueued([id]))
    }

    // -------------------------------------------------------------------------
    // EVSE status
    // -------------------------------------------------------------------------

    /// An EVSE changed status on the host side.
    pub async fn notify_status_change(&self, update: StatusUpdate) -> SyncResult<AggregateResult> {
        self.check_running()?;
        if !self.hooks.scope.status_in_scope(&update) {
            debug!(evse_id = %update.evse_id, "Status out of scope - dropped at enqueue");
            return Ok(AggregateResult::no_operation());
        }

        let evse_id = update.evse_id.to_string();
        match self.store.enqueue_status(update).await? {
            StatusRoute::Fast => {
                self.arm_fast_timer();
                Ok(AggregateResult::enqueued([evse_id]))
            }
            StatusRoute::Delayed => {
                // Rides with the owner station's first upload.
                self.arm_data_timer();
                Ok(AggregateResult::enqueued([evse_id]))
            }
            StatusRoute::Dropped => Ok(AggregateResult::no_operation()),
        }
    }

    // -------------------------------------------------------------------------
    // CDRs
    // -------------------------------------------------------------------------

    /// A charging session completed on the host side. The attached charge
    /// record is delivered in the requested mode; a session without one
    /// classifies `ConversionFailed`.
    pub async fn notify_session_completed(
        &self,
        session: Session,
        mode: DeliveryMode,
    ) -> SyncResult<AggregateResult> {
        self.check_running()?;
        match (session.cdr, mode) {
            (Some(record), DeliveryMode::Enqueue) => {
                let result = self.cdr.deliver(vec![record], DeliveryMode::Enqueue).await;
                self.arm_cdr_timer();
                Ok(result)
            }
            (Some(record), DeliveryMode::Immediate) => {
                Ok(self.cdr.deliver(vec![record], DeliveryMode::Immediate).await)
            }
            (None, _) => Ok(AggregateResult::from_items(vec![ItemResult::new(
                session.id.to_string(),
                ItemOutcome::ConversionFailed("session carries no charge record".to_string()),
            )])),
        }
    }

    /// Delivers a batch of already-priced charge records.
    pub async fn deliver_charge_records(
        &self,
        records: Vec<ChargeRecord>,
        mode: DeliveryMode,
    ) -> SyncResult<AggregateResult> {
        self.check_running()?;
        let result = self.cdr.deliver(records, mode).await;
        if mode == DeliveryMode::Enqueue {
            self.arm_cdr_timer();
        }
        Ok(result)
    }

    /// Immediate, ordered delivery for a caller-supplied session list.
    pub async fn deliver_sessions(&self, sessions: &[Session]) -> SyncResult<AggregateResult> {
        self.check_running()?;
        Ok(self.cdr.deliver_sessions(sessions).await)
    }

    // -------------------------------------------------------------------------
    // Manual flushes
    // -------------------------------------------------------------------------

    /// Flushes the data queues now, bypassing the debounce timer.
    pub async fn flush_data_now(&self) -> AggregateResult {
        self.data_timer.disarm();
        self.flusher.flush_data_and_status().await
    }

    /// Flushes the fast status queue now.
    pub async fn flush_fast_now(&self) -> AggregateResult {
        self.fast_timer.disarm();
        self.flusher.flush_fast_status().await
    }

    /// Flushes the CDR queue now.
    pub async fn flush_cdrs_now(&self) -> AggregateResult {
        self.cdr_timer.disarm();
        self.cdr.flush_queued().await
    }

    // -------------------------------------------------------------------------
    // Introspection / lifecycle
    // -------------------------------------------------------------------------

    /// Verifies the configured hub token against the hub.
    pub async fn verify_hub_token(&self) -> SyncResult<bool> {
        self.transport
            .verify_token(&self.config.hub.auth_token)
            .await
    }

    /// Snapshot of queue depths and timer states.
    pub async fn status(&self) -> SyncResult<AdapterStatus> {
        Ok(AdapterStatus {
            depths: self.store.depths().await?,
            cdr_queued: self.cdr.queued_count().await,
            data_timer_armed: self.data_timer.is_armed(),
            fast_timer_armed: self.fast_timer.is_armed(),
            cdr_timer_armed: self.cdr_timer.is_armed(),
        })
    }

    /// Stops accepting new work, disarms every timer and runs one final
    /// flush of everything still queued.
    pub async fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        self.data_timer.disarm();
        self.fast_timer.disarm();
        self.cdr_timer.disarm();

        let data = self.flusher.flush_data_and_status().await;
        let fast = self.flusher.flush_fast_status().await;
        let cdrs = self.cdr.flush_queued().await;
        info!(
            data = ?data.overall,
            fast = ?fast.overall,
            cdrs = ?cdrs.overall,
            "Push adapter shut down"
        );
    }

    // -------------------------------------------------------------------------
    // Timer wiring
    // -------------------------------------------------------------------------

    fn arm_data_timer(&self) {
        let flusher = self.flusher.clone();
        self.data_timer
            .arm(self.config.data_debounce(), move || async move {
                flusher.flush_data_and_status().await;
            });
    }

    fn arm_fast_timer(&self) {
        let flusher = self.flusher.clone();
        self.fast_timer
            .arm(self.config.fast_status_debounce(), move || async move {
                flusher.flush_fast_status().await;
            });
    }

    fn arm_cdr_timer(&self) {
        let cdr = self.cdr.clone();
        self.cdr_timer
            .arm(self.config.cdr_flush_interval(), move || async move {
                cdr.flush_queued().await;
            });
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
