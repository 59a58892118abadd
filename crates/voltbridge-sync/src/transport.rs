//! # Hub Transport
//!
//! The seam between the push engine and the roaming hub's HTTP API.
//!
//! ## Transport Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Hub Transport                                     │
//! │                                                                         │
//! │  Flusher / CdrPipeline                                                 │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  PushTransport (trait)          ◄── MockTransport in tests             │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  HttpPushTransport (reqwest)                                           │
//! │    • POST {base}/stations       one station per call                   │
//! │    • POST {base}/statuses       one status per call                    │
//! │    • POST {base}/cdrs           one record per call                    │
//! │    • POST {base}/token/verify   authorization check                    │
//! │    • Bearer auth, JSON bodies, per-request timeout                     │
//! │                                                                         │
//! │  Outcome mapping:                                                      │
//! │    HTTP ok + envelope 1000  ──► Success                                │
//! │    HTTP ok + envelope ≠1000 ──► TransportError(remote message)         │
//! │    HTTP error / timeout     ──► TransportError (never silently dropped)│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::HubEndpoint;
use crate::error::{SyncError, SyncResult};
use crate::outcome::ItemOutcome;
use crate::protocol::{CdrPush, EvseStatusPush, PushResponse, StationPush};

// =============================================================================
// Transport Trait
// =============================================================================

/// One upload call per item; idempotent create-or-replace semantics are
/// expected from every endpoint.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Pushes one station snapshot (create-or-replace).
    async fn push_station(&self, payload: &StationPush) -> SyncResult<PushResponse>;

    /// Pushes one EVSE status (set-current-status).
    async fn push_status(&self, payload: &EvseStatusPush) -> SyncResult<PushResponse>;

    /// Delivers one charge record.
    async fn push_cdr(&self, payload: &CdrPush) -> SyncResult<PushResponse>;

    /// Verifies a roaming authorization token. Shares the client with the
    /// push calls but is driven by the host's authorization path, not by
    /// the flush engine.
    async fn verify_token(&self, token: &str) -> SyncResult<bool>;
}

/// Maps a transport call result to a per-item outcome.
///
/// Success requires both a healthy transport AND an accepting envelope;
/// everything else carries the remote message (or the transport error) as
/// the item's warning. A cancelled or timed-out call lands here as an
/// error, never as a silent drop.
pub fn classify_push(result: SyncResult<PushResponse>) -> ItemOutcome {
    match result {
        Ok(response) if response.is_accepted() => ItemOutcome::Success,
        Ok(response) => ItemOutcome::TransportError(response.warning()),
        Err(e) => ItemOutcome::TransportError(e.to_string()),
    }
}

// =============================================================================
// Unconfigured Placeholder
// =============================================================================

/// Transport installed when every pipeline is administratively off and no
/// hub endpoint was configured. All pushes classify as AdminDown before
/// reaching a transport, so these methods are only reachable through the
/// token verification path; they report the missing endpoint instead of
/// hanging or panicking.
pub struct UnconfiguredTransport;

impl UnconfiguredTransport {
    fn not_configured<T>() -> SyncResult<T> {
        Err(SyncError::Transport(
            "hub endpoint not configured".to_string(),
        ))
    }
}

#[async_trait]
impl PushTransport for UnconfiguredTransport {
    async fn push_station(&self, _payload: &StationPush) -> SyncResult<PushResponse> {
        Self::not_configured()
    }

    async fn push_status(&self, _payload: &EvseStatusPush) -> SyncResult<PushResponse> {
        Self::not_configured()
    }

    async fn push_cdr(&self, _payload: &CdrPush) -> SyncResult<PushResponse> {
        Self::not_configured()
    }

    async fn verify_token(&self, _token: &str) -> SyncResult<bool> {
        Self::not_configured()
    }
}

// =============================================================================
// HTTP Implementation
// =============================================================================

/// `reqwest`-backed transport for the hub's push API.
pub struct HttpPushTransport {
    /// Shared HTTP client with connect + request timeouts baked in.
    client: Client,

    /// Base URL of the push API.
    base_url: Url,

    /// Bearer token presented on every call.
    auth_token: String,

    /// Per-request timeout, kept for error messages.
    request_timeout: Duration,
}

impl std::fmt::Debug for HttpPushTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPushTransport")
            .field("base_url", &self.base_url.as_str())
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl HttpPushTransport {
    /// Builds the transport from the hub endpoint config.
    pub fn new(hub: &HubEndpoint, request_timeout: Duration) -> SyncResult<Self> {
        // Url::join resolves against the parent of a slash-less base, so
        // "…/push/v1" would send requests to "…/push/stations". Normalize
        // before parsing.
        let mut base = hub.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| SyncError::InvalidUrl(format!("{}: {e}", hub.base_url)))?;

        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| SyncError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(HttpPushTransport {
            client,
            base_url,
            auth_token: hub.auth_token.clone(),
            request_timeout,
        })
    }

    /// Resolves an endpoint path against the base URL.
    fn endpoint(&self, path: &str) -> SyncResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| SyncError::InvalidUrl(format!("{path}: {e}")))
    }

    /// POSTs a JSON body and decodes the hub's response envelope.
    async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> SyncResult<PushResponse> {
        let url = self.endpoint(path)?;

        let response = self
            .client
            .post(url.clone())
            .bearer_auth(&self.auth_token)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SyncError::RequestTimeout(self.request_timeout.as_secs())
                } else {
                    SyncError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%url, %status, "Hub rejected push");
            return Err(SyncError::HubRejected {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: PushResponse = response
            .json()
            .await
            .map_err(|e| SyncError::Transport(format!("invalid hub envelope: {e}")))?;

        debug!(%url, status_code = envelope.status_code, "Push call completed");
        Ok(envelope)
    }
}

#[async_trait]
impl PushTransport for HttpPushTransport {
    async fn push_station(&self, payload: &StationPush) -> SyncResult<PushResponse> {
        self.post_json("stations", payload).await
    }

    async fn push_status(&self, payload: &EvseStatusPush) -> SyncResult<PushResponse> {
        self.post_json("statuses", payload).await
    }

    async fn push_cdr(&self, payload: &CdrPush) -> SyncResult<PushResponse> {
        self.post_json("cdrs", payload).await
    }

    async fn verify_token(&self, token: &str) -> SyncResult<bool> {
        #[derive(Serialize)]
        struct VerifyRequest<'a> {
            token: &'a str,
        }

        let url = self.endpoint("token/verify")?;
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.auth_token)
            .json(&VerifyRequest { token })
            .send()
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(SyncError::HubRejected {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::HUB_STATUS_OK;

    #[test]
    fn test_classify_accepted_envelope() {
        let outcome = classify_push(Ok(PushResponse {
            status_code: HUB_STATUS_OK,
            status_message: None,
        }));
        assert_eq!(outcome, ItemOutcome::Success);
    }

    #[test]
    fn test_classify_rejecting_envelope_carries_remote_message() {
        let outcome = classify_push(Ok(PushResponse {
            status_code: 2100,
            status_message: Some("unknown EVSE".to_string()),
        }));
        match outcome {
            ItemOutcome::TransportError(msg) => assert!(msg.contains("unknown EVSE")),
            other => panic!("expected TransportError, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_timeout_is_an_error_not_a_drop() {
        let outcome = classify_push(Err(SyncError::RequestTimeout(30)));
        assert!(matches!(outcome, ItemOutcome::TransportError(_)));
    }

    #[test]
    fn test_endpoint_resolution() {
        let transport = HttpPushTransport::new(
            &HubEndpoint {
                base_url: "https://hub.example.com/push/v1/".to_string(),
                auth_token: "secret".to_string(),
            },
            Duration::from_secs(30),
        )
        .unwrap();

        let url = transport.endpoint("stations").unwrap();
        assert_eq!(url.as_str(), "https://hub.example.com/push/v1/stations");
    }

    #[test]
    fn test_endpoint_resolution_without_trailing_slash() {
        let transport = HttpPushTransport::new(
            &HubEndpoint {
                base_url: "https://hub.example.com/push/v1".to_string(),
                auth_token: "secret".to_string(),
            },
            Duration::from_secs(30),
        )
        .unwrap();

        // The last path segment of the base must survive resolution.
        let url = transport.endpoint("stations").unwrap();
        assert_eq!(url.as_str(), "https://hub.example.com/push/v1/stations");
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let result = HttpPushTransport::new(
            &HubEndpoint {
                base_url: "not a url".to_string(),
                auth_token: String::new(),
            },
            Duration::from_secs(30),
        );
        assert!(matches!(result, Err(SyncError::InvalidUrl(_))));
    }
}
