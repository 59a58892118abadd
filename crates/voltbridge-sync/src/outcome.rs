//! # Push Outcomes
//!
//! Per-item and per-batch result classification for flush cycles.
//!
//! ## Classification Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Outcome Classification                              │
//! │                                                                         │
//! │  per item:                                                             │
//! │    in scope? ──no──► Filtered                                          │
//! │    converts? ──no──► ConversionFailed                                  │
//! │    sent ok?  ──no──► TransportError                                    │
//! │    hub ok?   ──no──► TransportError (remote message)                   │
//! │                └──►  Success                                           │
//! │                                                                         │
//! │  per batch:                                                            │
//! │    nothing drained        ──► NoOperation                              │
//! │    pipeline disabled      ──► AdminDown (items consumed, no I/O)       │
//! │    lock not obtained      ──► LockTimeout                              │
//! │    all items succeeded    ──► Success                                  │
//! │    any item failed        ──► Error (carrying only the failed subset)  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

// =============================================================================
// Item Outcome
// =============================================================================

/// Outcome for a single pushed item.
///
/// Replaces exception-based per-item signaling: every item in a batch gets
/// exactly one of these, and failures never abort siblings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ItemOutcome {
    /// The hub accepted the item.
    Success,

    /// Network failure, request timeout, or hub-side rejection.
    /// Carries the remote message or raw body as a warning.
    TransportError(String),

    /// The item could not be mapped to the wire shape (unmappable id,
    /// invalid snapshot). Isolated to this item.
    ConversionFailed(String),

    /// Administratively excluded by the scope filter. Not an error.
    Filtered,

    /// Accepted into a queue; delivery deferred to a later flush.
    Enqueued,

    /// The pipeline is administratively disabled; no I/O was attempted.
    AdminDown,

    /// A queue lock could not be acquired within its bound.
    LockTimeout,

    /// Nothing to do.
    NoOperation,
}

impl ItemOutcome {
    /// Returns true for outcomes that count toward the batch's failed subset.
    ///
    /// `Filtered` is administrative exclusion, not failure; `Enqueued`,
    /// `AdminDown` and `NoOperation` are accepted-but-deferred or no-I/O
    /// classifications.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ItemOutcome::TransportError(_)
                | ItemOutcome::ConversionFailed(_)
                | ItemOutcome::LockTimeout
        )
    }
}

impl std::fmt::Display for ItemOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemOutcome::Success => write!(f, "success"),
            ItemOutcome::TransportError(msg) => write!(f, "transport_error: {msg}"),
            ItemOutcome::ConversionFailed(msg) => write!(f, "conversion_failed: {msg}"),
            ItemOutcome::Filtered => write!(f, "filtered"),
            ItemOutcome::Enqueued => write!(f, "enqueued"),
            ItemOutcome::AdminDown => write!(f, "admin_down"),
            ItemOutcome::LockTimeout => write!(f, "lock_timeout"),
            ItemOutcome::NoOperation => write!(f, "no_operation"),
        }
    }
}

/// Outcome for one item, tagged with the item's id (station id, EVSE id,
/// or session id depending on the push family).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemResult {
    /// Identifier of the pushed item.
    pub item_id: String,

    /// What happened to it.
    pub outcome: ItemOutcome,
}

impl ItemResult {
    /// Convenience constructor.
    pub fn new(item_id: impl Into<String>, outcome: ItemOutcome) -> Self {
        ItemResult {
            item_id: item_id.into(),
            outcome,
        }
    }

    /// Success result for an item.
    pub fn success(item_id: impl Into<String>) -> Self {
        ItemResult::new(item_id, ItemOutcome::Success)
    }
}

// =============================================================================
// Batch Outcome
// =============================================================================

/// Overall classification of a flush cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOutcome {
    /// Every item succeeded (or was filtered).
    Success,

    /// At least one item failed.
    Error,

    /// All items were accepted into a queue for later delivery.
    Enqueued,

    /// The queue lock could not be acquired; nothing was drained.
    LockTimeout,

    /// The pipeline is administratively disabled.
    AdminDown,

    /// Nothing was queued.
    NoOperation,
}

// =============================================================================
// Aggregate Result
// =============================================================================

/// Combined outcome of one flush cycle: the overall classification plus
/// every per-item result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateResult {
    /// Overall classification.
    pub overall: BatchOutcome,

    /// Per-item results, in drain order.
    pub items: Vec<ItemResult>,
}

impl AggregateResult {
    /// Empty batch: nothing queued, no network activity.
    pub fn no_operation() -> Self {
        AggregateResult {
            overall: BatchOutcome::NoOperation,
            items: Vec::new(),
        }
    }

    /// Lock not obtained: nothing drained, nothing attempted.
    pub fn lock_timeout() -> Self {
        AggregateResult {
            overall: BatchOutcome::LockTimeout,
            items: Vec::new(),
        }
    }

    /// Pipeline disabled: every drained item classified `AdminDown`,
    /// no I/O attempted.
    pub fn admin_down(item_ids: impl IntoIterator<Item = String>) -> Self {
        AggregateResult {
            overall: BatchOutcome::AdminDown,
            items: item_ids
                .into_iter()
                .map(|id| ItemResult::new(id, ItemOutcome::AdminDown))
                .collect(),
        }
    }

    /// Items accepted into a queue for later delivery.
    pub fn enqueued(item_ids: impl IntoIterator<Item = String>) -> Self {
        AggregateResult {
            overall: BatchOutcome::Enqueued,
            items: item_ids
                .into_iter()
                .map(|id| ItemResult::new(id, ItemOutcome::Enqueued))
                .collect(),
        }
    }

    /// Derives the overall classification from per-item results:
    /// all succeeded ⇒ `Success`, any failed ⇒ `Error`, empty ⇒ `NoOperation`.
    pub fn from_items(items: Vec<ItemResult>) -> Self {
        let overall = if items.is_empty() {
            BatchOutcome::NoOperation
        } else if items.iter().any(|r| r.outcome.is_failure()) {
            BatchOutcome::Error
        } else {
            BatchOutcome::Success
        };
        AggregateResult { overall, items }
    }

    /// Merges partial results from multiple upload phases into one
    /// aggregate, re-deriving the overall classification.
    pub fn merge(parts: impl IntoIterator<Item = AggregateResult>) -> Self {
        let mut items = Vec::new();
        let mut saw_lock_timeout = false;
        let mut saw_admin_down = false;
        for part in parts {
            match part.overall {
                BatchOutcome::LockTimeout => saw_lock_timeout = true,
                BatchOutcome::AdminDown => saw_admin_down = true,
                _ => {}
            }
            items.extend(part.items);
        }
        if saw_lock_timeout && items.is_empty() {
            return AggregateResult::lock_timeout();
        }
        let mut merged = AggregateResult::from_items(items);
        // A phase that was skipped administratively keeps its AdminDown
        // overall only when no other phase produced real work.
        if merged.items.iter().all(|r| r.outcome == ItemOutcome::AdminDown)
            && saw_admin_down
            && !merged.items.is_empty()
        {
            merged.overall = BatchOutcome::AdminDown;
        }
        merged
    }

    /// The failed subset (what an `Error` batch "carries").
    pub fn failed(&self) -> Vec<&ItemResult> {
        self.items.iter().filter(|r| r.outcome.is_failure()).collect()
    }

    /// Count of successful items.
    pub fn success_count(&self) -> usize {
        self.items
            .iter()
            .filter(|r| r.outcome == ItemOutcome::Success)
            .count()
    }

    /// True if the batch finished without any item-level failure.
    pub fn is_success(&self) -> bool {
        matches!(
            self.overall,
            BatchOutcome::Success | BatchOutcome::NoOperation | BatchOutcome::Enqueued
        )
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_success_derives_success() {
        let result = AggregateResult::from_items(vec![
            ItemResult::success("S1"),
            ItemResult::success("S2"),
        ]);
        assert_eq!(result.overall, BatchOutcome::Success);
        assert!(result.failed().is_empty());
    }

    #[test]
    fn test_any_failure_derives_error_with_failed_subset() {
        let result = AggregateResult::from_items(vec![
            ItemResult::success("S1"),
            ItemResult::new("S2", ItemOutcome::TransportError("503".into())),
            ItemResult::success("S3"),
        ]);
        assert_eq!(result.overall, BatchOutcome::Error);
        let failed = result.failed();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].item_id, "S2");
    }

    #[test]
    fn test_filtered_is_not_failure() {
        let result = AggregateResult::from_items(vec![
            ItemResult::success("S1"),
            ItemResult::new("S2", ItemOutcome::Filtered),
        ]);
        assert_eq!(result.overall, BatchOutcome::Success);
    }

    #[test]
    fn test_empty_derives_no_operation() {
        let result = AggregateResult::from_items(vec![]);
        assert_eq!(result.overall, BatchOutcome::NoOperation);
    }

    #[test]
    fn test_admin_down_carries_all_items() {
        let result =
            AggregateResult::admin_down(vec!["S1".to_string(), "S2".to_string()]);
        assert_eq!(result.overall, BatchOutcome::AdminDown);
        assert_eq!(result.items.len(), 2);
        assert!(result
            .items
            .iter()
            .all(|r| r.outcome == ItemOutcome::AdminDown));
    }

    #[test]
    fn test_merge_rederives_overall() {
        let ok = AggregateResult::from_items(vec![ItemResult::success("S1")]);
        let bad = AggregateResult::from_items(vec![ItemResult::new(
            "E1",
            ItemOutcome::ConversionFailed("no mapping".into()),
        )]);
        let merged = AggregateResult::merge(vec![ok, bad]);
        assert_eq!(merged.overall, BatchOutcome::Error);
        assert_eq!(merged.items.len(), 2);
        assert_eq!(merged.failed().len(), 1);
    }

    #[test]
    fn test_merge_of_empty_lock_timeout_is_lock_timeout() {
        let merged = AggregateResult::merge(vec![AggregateResult::lock_timeout()]);
        assert_eq!(merged.overall, BatchOutcome::LockTimeout);
    }

    #[test]
    fn test_merge_mixed_admin_down_and_work() {
        // One phase disabled, the other did real work: overall follows work.
        let down = AggregateResult::admin_down(vec!["S1".to_string()]);
        let ok = AggregateResult::from_items(vec![ItemResult::success("E1")]);
        let merged = AggregateResult::merge(vec![down, ok]);
        assert_eq!(merged.overall, BatchOutcome::Success);
        assert_eq!(merged.items.len(), 2);
    }
}
