//! # CDR Delivery Pipeline
//!
//! A separate queue/lock/timer triple for charge detail records. Delivery is
//! ordered best-effort per record: CDRs are sent one at a time, never fanned
//! out, and every record's outcome is correlated back to the session store
//! regardless of what happened to the rest of its batch.
//!
//! ## Delivery Modes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      CDR Delivery Pipeline                              │
//! │                                                                         │
//! │  ENQUEUE MODE                                                          │
//! │  ────────────                                                          │
//! │  filter ──► convert ──► append to queue ──► re-arm timer               │
//! │  (conversion failure classifies immediately and is never queued)       │
//! │  caller gets an Enqueued acknowledgement, no network I/O               │
//! │                                                                         │
//! │  IMMEDIATE MODE / TIMER FLUSH                                          │
//! │  ────────────────────────────                                          │
//! │  acquire CDR lock (bounded wait, 60s default)                          │
//! │      │ timeout ──► whole batch LockTimeout, nothing attempted          │
//! │      ▼                                                                  │
//! │  send records ONE AT A TIME, in order                                  │
//! │      │                                                                  │
//! │      └─► per record: Success / TransportError / ConversionFailed       │
//! │              └─► forwarded to SessionStore individually                 │
//! │                                                                         │
//! │  A record that fails its timer flush is reported and NOT requeued:     │
//! │  the session store owns durable retry policy, this queue does not.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The CDR lock deliberately spans the sends (unlike the pending store
//! lock): it is what serializes deliveries and keeps per-record order. Its
//! wait is bounded, so a stuck delivery degrades to `LockTimeout` for
//! later callers instead of an unbounded hang.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use voltbridge_core::{ChargeRecord, Session};

use crate::config::SyncConfig;
use crate::events::{PushFamily, RequestFinished, RequestStarted, SessionStore, SyncEventEmitter};
use crate::hooks::Hooks;
use crate::outcome::{AggregateResult, BatchOutcome, ItemOutcome, ItemResult};
use crate::protocol::{to_cdr_push, CdrPush};
use crate::transport::{classify_push, PushTransport};

// =============================================================================
// Delivery Mode
// =============================================================================

/// Caller intent for [`CdrPipeline::deliver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Append to the CDR queue; a later timer-driven flush delivers.
    Enqueue,

    /// Send now, one record at a time, under the CDR lock.
    Immediate,
}

// =============================================================================
// Queued Record
// =============================================================================

/// A record already converted to wire shape, waiting for the timer flush.
#[derive(Debug, Clone)]
struct QueuedCdr {
    session_id: Uuid,
    payload: CdrPush,
}

/// Result of the per-record filter/convert step.
enum Prepared {
    /// Ready to send.
    Ready(QueuedCdr),

    /// Classified before reaching the transport (filtered or unconvertible).
    Done(ItemResult),
}

// =============================================================================
// Pipeline
// =============================================================================

/// The CDR delivery pipeline. Cheap to clone; clones share the queue.
#[derive(Clone)]
pub struct CdrPipeline {
    config: Arc<SyncConfig>,
    transport: Arc<dyn PushTransport>,
    hooks: Arc<Hooks>,
    emitter: Arc<dyn SyncEventEmitter>,
    session_store: Arc<dyn SessionStore>,

    /// THE CDR lock: guards the queue and serializes deliveries.
    queue: Arc<Mutex<Vec<QueuedCdr>>>,
}

impl CdrPipeline {
    /// Creates an empty pipeline.
    pub fn new(
        config: Arc<SyncConfig>,
        transport: Arc<dyn PushTransport>,
        hooks: Arc<Hooks>,
        emitter: Arc<dyn SyncEventEmitter>,
        session_store: Arc<dyn SessionStore>,
    ) -> Self {
        CdrPipeline {
            config,
            transport,
            hooks,
            emitter,
            session_store,
            queue: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Acquires the CDR lock within its configured bound.
    async fn lock(&self) -> Option<MutexGuard<'_, Vec<QueuedCdr>>> {
        timeout(self.config.cdr_lock_wait(), self.queue.lock())
            .await
            .ok()
    }

    /// Number of records waiting for the timer flush.
    pub async fn queued_count(&self) -> usize {
        match self.lock().await {
            Some(queue) => queue.len(),
            None => 0,
        }
    }

    // -------------------------------------------------------------------------
    // Delivery entry points
    // -------------------------------------------------------------------------

    /// Delivers a batch of charge records in the requested mode.
    ///
    /// Enqueue mode returns an `Enqueued` acknowledgement without blocking
    /// on network I/O; immediate mode sends under the CDR lock and returns
    /// the real aggregate.
    pub async fn deliver(&self, records: Vec<ChargeRecord>, mode: DeliveryMode) -> AggregateResult {
        if !self.config.pipelines.cdr_push {
            info!(count = records.len(), "CDR push disabled - batch not accepted");
            return AggregateResult::admin_down(
                records.into_iter().map(|r| r.session_id.to_string()),
            );
        }

        if records.is_empty() {
            return AggregateResult::no_operation();
        }

        let prepared: Vec<Prepared> = records.iter().map(|r| self.prepare(r)).collect();

        match mode {
            DeliveryMode::Enqueue => self.enqueue_prepared(prepared).await,
            DeliveryMode::Immediate => self.send_prepared(prepared).await,
        }
    }

    /// Timer-driven flush: re-delivers everything accumulated in Enqueue
    /// mode. One extra delivery attempt per record; failures are reported
    /// to the session store and not requeued.
    pub async fn flush_queued(&self) -> AggregateResult {
        let correlation_id = Uuid::new_v4();
        let started = Instant::now();

        // No request has started before the drain, so the early exits stay
        // silent toward observers (no finish event without its start).
        let mut queue = match self.lock().await {
            Some(queue) => queue,
            None => {
                warn!(%correlation_id, "CDR flush could not acquire the CDR lock");
                return AggregateResult::lock_timeout();
            }
        };

        if queue.is_empty() {
            return AggregateResult::no_operation();
        }

        let batch: Vec<QueuedCdr> = queue.drain(..).collect();
        let item_count = batch.len();
        self.emit_started(correlation_id, item_count);

        // Still under the CDR lock: sends stay serialized and ordered.
        let mut items = Vec::with_capacity(item_count);
        for queued in batch {
            items.push(self.send_one(queued).await);
        }
        drop(queue);

        let result = AggregateResult::from_items(items);
        self.emit_finished(correlation_id, item_count, started, &result);
        result
    }

    /// Immediate delivery for a caller-supplied list of sessions; each
    /// record is resolved back from the session's attached state. Sessions
    /// without a charge record classify `ConversionFailed`.
    pub async fn deliver_sessions(&self, sessions: &[Session]) -> AggregateResult {
        if !self.config.pipelines.cdr_push {
            info!(count = sessions.len(), "CDR push disabled - batch not accepted");
            return AggregateResult::admin_down(sessions.iter().map(|s| s.id.to_string()));
        }

        if sessions.is_empty() {
            return AggregateResult::no_operation();
        }

        let prepared: Vec<Prepared> = sessions
            .iter()
            .map(|session| match &session.cdr {
                Some(record) => self.prepare(record),
                None => Prepared::Done(ItemResult::new(
                    session.id.to_string(),
                    ItemOutcome::ConversionFailed(
                        "session carries no charge record".to_string(),
                    ),
                )),
            })
            .collect();

        self.send_prepared(prepared).await
    }

    // -------------------------------------------------------------------------
    // Per-record steps
    // -------------------------------------------------------------------------

    /// Filter + convert one record. Runs before either mode touches the
    /// queue or the network.
    fn prepare(&self, record: &ChargeRecord) -> Prepared {
        let item_id = record.session_id.to_string();

        if !self.hooks.scope.cdr_in_scope(record) {
            debug!(session_id = %record.session_id, "CDR filtered out of scope");
            return Prepared::Done(ItemResult::new(item_id, ItemOutcome::Filtered));
        }

        match to_cdr_push(record, &self.hooks) {
            Ok(payload) => Prepared::Ready(QueuedCdr {
                session_id: record.session_id,
                payload,
            }),
            Err(reason) => {
                warn!(session_id = %record.session_id, %reason, "CDR conversion failed");
                Prepared::Done(ItemResult::new(
                    item_id,
                    ItemOutcome::ConversionFailed(reason),
                ))
            }
        }
    }

    /// Enqueue mode: append ready records, classify the rest immediately.
    async fn enqueue_prepared(&self, prepared: Vec<Prepared>) -> AggregateResult {
        let mut items = Vec::with_capacity(prepared.len());
        let mut ready = Vec::new();
        for entry in prepared {
            match entry {
                Prepared::Ready(queued) => {
                    items.push(ItemResult::new(
                        queued.session_id.to_string(),
                        ItemOutcome::Enqueued,
                    ));
                    ready.push(queued);
                }
                Prepared::Done(result) => {
                    // Never queued: the session store learns now.
                    self.forward(&result);
                    items.push(result);
                }
            }
        }

        if !ready.is_empty() {
            let mut queue = match self.lock().await {
                Some(queue) => queue,
                None => {
                    warn!("CDR enqueue could not acquire the CDR lock");
                    return AggregateResult::lock_timeout();
                }
            };
            queue.extend(ready);
        }

        let has_failures = items.iter().any(|r| r.outcome.is_failure());
        AggregateResult {
            overall: if has_failures {
                BatchOutcome::Error
            } else {
                BatchOutcome::Enqueued
            },
            items,
        }
    }

    /// Immediate mode: send ready records one at a time under the CDR lock.
    async fn send_prepared(&self, prepared: Vec<Prepared>) -> AggregateResult {
        let correlation_id = Uuid::new_v4();
        let started = Instant::now();
        let item_count = prepared.len();

        let queue_guard = match self.lock().await {
            Some(guard) => guard,
            None => {
                // Nothing started, nothing attempted: no events.
                warn!(%correlation_id, "CDR delivery could not acquire the CDR lock");
                return AggregateResult::lock_timeout();
            }
        };

        self.emit_started(correlation_id, item_count);

        let mut items = Vec::with_capacity(item_count);
        for entry in prepared {
            match entry {
                Prepared::Ready(queued) => items.push(self.send_one(queued).await),
                Prepared::Done(result) => {
                    self.forward(&result);
                    items.push(result);
                }
            }
        }
        drop(queue_guard);

        let result = AggregateResult::from_items(items);
        self.emit_finished(correlation_id, item_count, started, &result);
        result
    }

    /// Sends one record and forwards its outcome to the session store.
    async fn send_one(&self, queued: QueuedCdr) -> ItemResult {
        let outcome = classify_push(self.transport.push_cdr(&queued.payload).await);
        let result = ItemResult::new(queued.session_id.to_string(), outcome);
        self.forward(&result);
        result
    }

    /// Correlates one record's outcome back to the session store.
    fn forward(&self, result: &ItemResult) {
        if let Ok(session_id) = result.item_id.parse::<Uuid>() {
            self.session_store
                .record_cdr_outcome(session_id, &result.outcome);
        }
    }

    // -------------------------------------------------------------------------
    // Events
    // -------------------------------------------------------------------------

    fn emit_started(&self, correlation_id: Uuid, item_count: usize) {
        self.emitter.request_started(&RequestStarted {
            family: PushFamily::Cdr,
            correlation_id,
            item_count,
            timestamp: Utc::now(),
        });
    }

    fn emit_finished(
        &self,
        correlation_id: Uuid,
        item_count: usize,
        started: Instant,
        result: &AggregateResult,
    ) {
        self.emitter.request_finished(&RequestFinished {
            family: PushFamily::Cdr,
            correlation_id,
            item_count,
            timestamp: Utc::now(),
            result: result.clone(),
            elapsed: started.elapsed(),
        });
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
