//! # Validation Module
//!
//! Input validation for ids and snapshots before they enter the push queues.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Host backend                                                 │
//! │  ├── Owns the canonical station registry                               │
//! │  └── Rejects malformed input at its own API boundary                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE (enqueue boundary)                               │
//! │  ├── Id charset / length rules the roaming hub enforces                │
//! │  └── Snapshot sanity (time ranges, energy bounds)                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Roaming hub                                                  │
//! │  └── Final authority; rejects at upload, surfaced per item             │
//! │                                                                         │
//! │  Rejecting here keeps unmappable records out of the queues entirely    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use voltbridge_core::validation::validate_station_id;
//!
//! assert!(validate_station_id("DE*VLT*S001").is_ok());
//! assert!(validate_station_id("").is_err());
//! ```

use crate::error::ValidationError;
use crate::types::ChargeRecord;
use crate::{MAX_ID_LENGTH, MAX_SESSION_ENERGY_WH};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Id Validators
// =============================================================================

/// Validates a roaming station id.
///
/// ## Rules
/// - Must not be empty
/// - Must be at most 48 characters
/// - Only uppercase alphanumerics, `*` and `-` (roaming id convention)
pub fn validate_station_id(id: &str) -> ValidationResult<()> {
    validate_roaming_id("station_id", id)
}

/// Validates a roaming EVSE id. Same charset rules as station ids.
pub fn validate_evse_id(id: &str) -> ValidationResult<()> {
    validate_roaming_id("evse_id", id)
}

fn validate_roaming_id(field: &str, id: &str) -> ValidationResult<()> {
    let id = id.trim();

    if id.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if id.len() > MAX_ID_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_ID_LENGTH,
        });
    }

    // Uppercase alphanumeric plus the two separators the hub accepts
    if !id
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '*' || c == '-')
    {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must contain only uppercase letters, digits, '*' and '-'".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Charge Record Validators
// =============================================================================

/// Validates a charge record before it is queued for delivery.
///
/// ## Rules
/// - Time range must not be inverted
/// - Energy must be non-negative and below [`MAX_SESSION_ENERGY_WH`]
/// - Currency must be a 3-letter ISO 4217 code
pub fn validate_charge_record(record: &ChargeRecord) -> ValidationResult<()> {
    validate_station_id(record.station_id.as_str())?;
    validate_evse_id(record.evse_id.as_str())?;

    if record.ended_at < record.started_at {
        return Err(ValidationError::InvalidFormat {
            field: "ended_at".to_string(),
            reason: "session end precedes session start".to_string(),
        });
    }

    if record.energy_wh < 0 || record.energy_wh > MAX_SESSION_ENERGY_WH {
        return Err(ValidationError::OutOfRange {
            field: "energy_wh".to_string(),
            min: 0,
            max: MAX_SESSION_ENERGY_WH,
        });
    }

    if record.currency.len() != 3 || !record.currency.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(ValidationError::InvalidFormat {
            field: "currency".to_string(),
            reason: "must be a 3-letter ISO 4217 code".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EvseId, StationId};
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_record() -> ChargeRecord {
        let now = Utc::now();
        ChargeRecord {
            session_id: Uuid::new_v4(),
            station_id: StationId::new("DE*VLT*S001"),
            evse_id: EvseId::new("DE*VLT*E001*1"),
            started_at: now - chrono::Duration::minutes(30),
            ended_at: now,
            energy_wh: 12_500,
            total_cost_cents: 625,
            currency: "EUR".to_string(),
        }
    }

    #[test]
    fn test_valid_station_id() {
        assert!(validate_station_id("DE*VLT*S001").is_ok());
        assert!(validate_station_id("NL-ALF-99").is_ok());
    }

    #[test]
    fn test_empty_station_id_rejected() {
        assert!(matches!(
            validate_station_id(""),
            Err(ValidationError::Required { .. })
        ));
        assert!(matches!(
            validate_station_id("   "),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_overlong_station_id_rejected() {
        let id = "A".repeat(MAX_ID_LENGTH + 1);
        assert!(matches!(
            validate_station_id(&id),
            Err(ValidationError::TooLong { .. })
        ));
    }

    #[test]
    fn test_lowercase_id_rejected() {
        assert!(matches!(
            validate_evse_id("de*vlt*e001"),
            Err(ValidationError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_valid_charge_record() {
        assert!(validate_charge_record(&sample_record()).is_ok());
    }

    #[test]
    fn test_inverted_time_range_rejected() {
        let mut record = sample_record();
        record.ended_at = record.started_at - chrono::Duration::seconds(1);
        assert!(matches!(
            validate_charge_record(&record),
            Err(ValidationError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_negative_energy_rejected() {
        let mut record = sample_record();
        record.energy_wh = -1;
        assert!(matches!(
            validate_charge_record(&record),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_bad_currency_rejected() {
        let mut record = sample_record();
        record.currency = "eur".to_string();
        assert!(validate_charge_record(&record).is_err());

        record.currency = "EURO".to_string();
        assert!(validate_charge_record(&record).is_err());
    }
}
