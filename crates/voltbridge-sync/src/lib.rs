//! # voltbridge-sync: Outbound Hub Synchronization Engine
//!
//! The push engine that keeps a roaming hub in sync with the host CPO
//! backend: station master data, EVSE statuses and charge detail records
//! flow out through debounced, batched, bounded-concurrency HTTP pushes.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     voltbridge-sync (THIS CRATE)                        │
//! │                                                                         │
//! │   host backend events                                                   │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌─────────────┐   enqueue    ┌──────────────┐   arm   ┌────────────┐  │
//! │  │   adapter   │─────────────►│    store     │────────►│ scheduler  │  │
//! │  │ PushAdapter │              │ PendingStore │         │ debounce   │  │
//! │  └──────┬──────┘              └──────┬───────┘         └─────┬──────┘  │
//! │         │                           drain ◄──────────────── fires      │
//! │         │ sessions                    │                                 │
//! │         ▼                             ▼                                 │
//! │  ┌─────────────┐              ┌──────────────┐                          │
//! │  │     cdr     │              │   flusher    │──► uploader (bounded    │
//! │  │ CdrPipeline │              │ drain/upload │    fan-out / fan-in)    │
//! │  └──────┬──────┘              └──────┬───────┘                          │
//! │         │  ordered, serialized       │                                  │
//! │         └──────────┬─────────────────┘                                  │
//! │                    ▼                                                    │
//! │           ┌──────────────────┐      ┌───────────────────┐              │
//! │           │    transport     │─────►│    roaming hub    │              │
//! │           │ HttpPushTransport│ HTTP │  (remote, OCPI-   │              │
//! │           └──────────────────┘      │   style envelope) │              │
//! │                                     └───────────────────┘              │
//! │                                                                         │
//! │   observability: events (emitter) • outcome taxonomy • tracing logs    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Rules
//!
//! - Callers get an **immediate acknowledgement**; network I/O happens on
//!   debounce timers (or explicitly via the `flush_*_now` bypasses).
//! - The pending store coalesces: one add per station, one status per
//!   EVSE, latest wins. A station's statuses never reach the hub before
//!   the station itself.
//! - Failures are isolated per item; one rejected station never blocks
//!   its batch siblings.
//! - Every lock wait is bounded. A stuck queue degrades to `LockTimeout`,
//!   never to an unbounded hang.
//! - CDRs are delivered in order, one at a time, and every outcome is
//!   correlated back to the host's session store.

pub mod adapter;
pub mod cdr;
pub mod config;
pub mod error;
pub mod events;
pub mod flusher;
pub mod hooks;
pub mod outcome;
pub mod protocol;
pub mod scheduler;
pub mod store;
pub mod transport;
pub mod uploader;

#[cfg(test)]
pub(crate) mod testutil;

pub use adapter::{AdapterStatus, PushAdapter, PushAdapterBuilder};
pub use cdr::{CdrPipeline, DeliveryMode};
pub use config::SyncConfig;
pub use error::{SyncError, SyncResult};
pub use events::{
    NoOpEmitter, NoOpSessionStore, PushFamily, RequestFinished, RequestStarted, SessionStore,
    SyncEventEmitter,
};
pub use hooks::{DefaultHooks, Hooks, IdMapper, PayloadTransformer, ScopeFilter};
pub use outcome::{AggregateResult, BatchOutcome, ItemOutcome, ItemResult};
pub use protocol::{PushResponse, HUB_STATUS_OK};
pub use store::{QueueDepths, StatusRoute};
pub use transport::{HttpPushTransport, PushTransport, UnconfiguredTransport};
