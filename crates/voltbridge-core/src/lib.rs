//! # voltbridge-core: Pure Domain Types for VoltBridge
//!
//! This crate is the **foundation** of VoltBridge. It contains the domain
//! model shared by the push engine and the host CPO backend, with zero I/O
//! dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       VoltBridge Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  Host CPO Backend (external)                    │   │
//! │  │    Station registry ──► OCPP frontends ──► Session store       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ change notifications                   │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ voltbridge-core (THIS CRATE) ★                   │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌────────────┐  ┌────────────┐                │   │
//! │  │   │   types   │  │ validation │  │   error    │                │   │
//! │  │   │  Station  │  │  id rules  │  │ CoreError  │                │   │
//! │  │   │  Evse/CDR │  │  checks    │  │ Validation │                │   │
//! │  │   └───────────┘  └────────────┘  └────────────┘                │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE TYPES               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               voltbridge-sync (Push Engine)                     │   │
//! │  │        Queues, debounce timers, hub uploads, CDR delivery       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Station, Evse, StatusUpdate, ChargeRecord)
//! - [`error`] - Domain error types
//! - [`validation`] - Id and snapshot validation rules
//!
//! ## Design Principles
//!
//! 1. **Pure Types**: No I/O, no async, no side effects
//! 2. **Snapshots**: The push engine carries serializable copies, never
//!    references into the live domain model
//! 3. **Explicit Errors**: All errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use types::{
    ChargeRecord, Connector, Evse, EvseId, EvseStatus, Session, Station, StationId, StatusUpdate,
};

// =============================================================================
// Constants
// =============================================================================

/// Maximum length for station and EVSE identifiers.
pub const MAX_ID_LENGTH: usize = 48;

/// Maximum energy in watt-hours accepted for a single charge record.
/// 10 MWh comfortably exceeds any single charging session.
pub const MAX_SESSION_ENERGY_WH: i64 = 10_000_000;
