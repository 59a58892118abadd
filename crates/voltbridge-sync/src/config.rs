//! # Sync Configuration
//!
//! Configuration for the push engine. The adapter consumes this surface but
//! does not own it: the host backend decides where values come from.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     VOLTBRIDGE_HUB_URL=https://hub.example.com/push/v1                 │
//! │     VOLTBRIDGE_HUB_TOKEN=secret                                        │
//! │     VOLTBRIDGE_STATION_PUSH=false                                      │
//! │                                                                         │
//! │  2. TOML Config File (path supplied by the host)                       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     30s data debounce, 2s fast debounce, 4 parallel uploads            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # voltbridge.toml
//! [pipelines]
//! station_push = true
//! status_push = true
//! cdr_push = true
//!
//! [timing]
//! data_debounce_secs = 30
//! fast_status_debounce_ms = 2000
//! cdr_flush_secs = 60
//!
//! [upload]
//! max_parallel = 4
//! request_timeout_secs = 30
//!
//! [locks]
//! store_wait_secs = 10
//! cdr_wait_secs = 60
//!
//! [hub]
//! base_url = "https://hub.example.com/push/v1"
//! auth_token = "secret"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Defaults
// =============================================================================

/// Default debounce for station data and delayed statuses (coarse).
pub const DEFAULT_DATA_DEBOUNCE_SECS: u64 = 30;

/// Default debounce for fast-path status updates (fine).
pub const DEFAULT_FAST_STATUS_DEBOUNCE_MS: u64 = 2_000;

/// Default interval for the deferred CDR flush.
pub const DEFAULT_CDR_FLUSH_SECS: u64 = 60;

/// Default maximum concurrent uploads.
pub const DEFAULT_MAX_PARALLEL: usize = 4;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default bounded wait on the pending store lock.
pub const DEFAULT_STORE_WAIT_SECS: u64 = 10;

/// Default bounded wait on the CDR delivery lock.
pub const DEFAULT_CDR_WAIT_SECS: u64 = 60;

// =============================================================================
// Config Sections
// =============================================================================

/// Administrative on/off switches, one per pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineToggles {
    /// Station data pushes (adds / updates).
    pub station_push: bool,

    /// EVSE status pushes (fast and delayed).
    pub status_push: bool,

    /// Charge detail record delivery.
    pub cdr_push: bool,
}

impl PipelineToggles {
    /// True when at least one pipeline is switched on.
    pub fn any_enabled(&self) -> bool {
        self.station_push || self.status_push || self.cdr_push
    }
}

impl Default for PipelineToggles {
    fn default() -> Self {
        PipelineToggles {
            station_push: true,
            status_push: true,
            cdr_push: true,
        }
    }
}

/// Debounce intervals and flush periods.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Quiet period after the last data enqueue before a data flush fires.
    pub data_debounce_secs: u64,

    /// Quiet period after the last fast status enqueue before a status
    /// flush fires.
    pub fast_status_debounce_ms: u64,

    /// Delay before queued CDRs are re-delivered.
    pub cdr_flush_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            data_debounce_secs: DEFAULT_DATA_DEBOUNCE_SECS,
            fast_status_debounce_ms: DEFAULT_FAST_STATUS_DEBOUNCE_MS,
            cdr_flush_secs: DEFAULT_CDR_FLUSH_SECS,
        }
    }
}

/// Upload fan-out limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Maximum concurrent in-flight upload calls (≥ 1).
    pub max_parallel: usize,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        UploadConfig {
            max_parallel: DEFAULT_MAX_PARALLEL,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

/// Bounded waits for the two queue locks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Maximum wait for the pending store lock, in seconds.
    pub store_wait_secs: u64,

    /// Maximum wait for the CDR delivery lock, in seconds.
    pub cdr_wait_secs: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        LockConfig {
            store_wait_secs: DEFAULT_STORE_WAIT_SECS,
            cdr_wait_secs: DEFAULT_CDR_WAIT_SECS,
        }
    }
}

/// Roaming hub endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HubEndpoint {
    /// Base URL of the hub's push API.
    pub base_url: String,

    /// Bearer token presented on every push call.
    pub auth_token: String,
}

// =============================================================================
// Sync Config
// =============================================================================

/// Full configuration surface consumed by the push engine.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SyncConfig {
    /// Per-pipeline administrative switches.
    pub pipelines: PipelineToggles,

    /// Debounce intervals.
    pub timing: TimingConfig,

    /// Upload fan-out limits.
    pub upload: UploadConfig,

    /// Queue lock bounds.
    pub locks: LockConfig,

    /// Hub endpoint.
    pub hub: HubEndpoint,
}

impl SyncConfig {
    /// Loads configuration from a TOML file, then applies environment
    /// variable overrides. Missing file fields fall back to defaults.
    pub fn load(path: &Path) -> SyncResult<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SyncError::ConfigLoadFailed(format!("{}: {e}", path.display())))?;

        let mut config: SyncConfig = toml::from_str(&contents)
            .map_err(|e| SyncError::ConfigLoadFailed(format!("{}: {e}", path.display())))?;

        config.apply_env_overrides();
        config.validate()?;

        debug!(path = %path.display(), "Loaded sync configuration");
        Ok(config)
    }

    /// Builds a config from defaults plus environment overrides (no file).
    pub fn from_env() -> SyncResult<Self> {
        let mut config = SyncConfig::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Applies `VOLTBRIDGE_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("VOLTBRIDGE_HUB_URL") {
            self.hub.base_url = url;
        }
        if let Ok(token) = std::env::var("VOLTBRIDGE_HUB_TOKEN") {
            self.hub.auth_token = token;
        }
        if let Ok(v) = std::env::var("VOLTBRIDGE_STATION_PUSH") {
            self.pipelines.station_push = parse_bool(&v, self.pipelines.station_push);
        }
        if let Ok(v) = std::env::var("VOLTBRIDGE_STATUS_PUSH") {
            self.pipelines.status_push = parse_bool(&v, self.pipelines.status_push);
        }
        if let Ok(v) = std::env::var("VOLTBRIDGE_CDR_PUSH") {
            self.pipelines.cdr_push = parse_bool(&v, self.pipelines.cdr_push);
        }
        if let Ok(v) = std::env::var("VOLTBRIDGE_MAX_PARALLEL") {
            match v.parse::<usize>() {
                Ok(n) if n >= 1 => self.upload.max_parallel = n,
                _ => warn!(value = %v, "Ignoring invalid VOLTBRIDGE_MAX_PARALLEL"),
            }
        }
    }

    /// Validates the configuration.
    ///
    /// The hub URL is only required when a pipeline is enabled: a fully
    /// disabled adapter (all switches off) is a valid configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.upload.max_parallel < 1 {
            return Err(SyncError::InvalidConfig(
                "upload.max_parallel must be at least 1".to_string(),
            ));
        }

        if self.upload.request_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "upload.request_timeout_secs must be positive".to_string(),
            ));
        }

        if self.pipelines.any_enabled() {
            Url::parse(&self.hub.base_url)
                .map_err(|e| SyncError::InvalidUrl(format!("{}: {e}", self.hub.base_url)))?;
        }

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Duration accessors
    // -------------------------------------------------------------------------

    /// Coarse debounce for station data + delayed statuses.
    pub fn data_debounce(&self) -> Duration {
        Duration::from_secs(self.timing.data_debounce_secs)
    }

    /// Fine debounce for fast-path status updates.
    pub fn fast_status_debounce(&self) -> Duration {
        Duration::from_millis(self.timing.fast_status_debounce_ms)
    }

    /// Delay before queued CDRs are re-delivered.
    pub fn cdr_flush_interval(&self) -> Duration {
        Duration::from_secs(self.timing.cdr_flush_secs)
    }

    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.upload.request_timeout_secs)
    }

    /// Bounded wait for the pending store lock.
    pub fn store_lock_wait(&self) -> Duration {
        Duration::from_secs(self.locks.store_wait_secs)
    }

    /// Bounded wait for the CDR delivery lock.
    pub fn cdr_lock_wait(&self) -> Duration {
        Duration::from_secs(self.locks.cdr_wait_secs)
    }
}

fn parse_bool(value: &str, fallback: bool) -> bool {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => true,
        "false" | "0" | "no" | "off" => false,
        _ => {
            warn!(value, "Ignoring invalid boolean override");
            fallback
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
