//! # Bounded-Concurrency Uploader
//!
//! Fan-out / fan-in upload driver: one call per item, at most `max_parallel`
//! in flight, and the batch returns only after every call has completed.
//!
//! ## Fan-out / Fan-in
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Bounded Upload Batch                                 │
//! │                                                                         │
//! │  items ──► spawn task per item ──► Semaphore(max_parallel)             │
//! │                                        │                                │
//! │                 ┌──────────┬───────────┼───────────┐                    │
//! │                 ▼          ▼           ▼           ▼                    │
//! │              item 1     item 2      item 3      item 4   (≤ P at once) │
//! │                 │          │           │           │                    │
//! │                 └──────────┴─────┬─────┴───────────┘                    │
//! │                                  ▼                                      │
//! │                         join_all (barrier)                              │
//! │                                  │                                      │
//! │                                  ▼                                      │
//! │                      Vec<ItemResult> (input order)                      │
//! │                                                                         │
//! │  FAILURE ISOLATION: a panicking or failing item maps to its own        │
//! │  TransportError / ConversionFailed result; siblings are unaffected.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, error};

use crate::outcome::{ItemOutcome, ItemResult};

/// Runs one upload operation per item with bounded concurrency and waits
/// for the whole batch (no partial return).
///
/// `op` does everything item-scoped: conversion, the network call, and the
/// outcome mapping. A panic inside `op` is caught at the task boundary and
/// becomes that item's `TransportError`; it never aborts the batch.
pub async fn upload_bounded<T, F, Fut>(
    items: Vec<T>,
    max_parallel: usize,
    id_of: impl Fn(&T) -> String,
    op: F,
) -> Vec<ItemResult>
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = ItemOutcome> + Send + 'static,
{
    if items.is_empty() {
        return Vec::new();
    }

    let max_parallel = max_parallel.max(1);
    let semaphore = Arc::new(Semaphore::new(max_parallel));
    let op = Arc::new(op);

    debug!(
        count = items.len(),
        max_parallel, "Starting bounded upload batch"
    );

    let mut ids = Vec::with_capacity(items.len());
    let mut handles = Vec::with_capacity(items.len());
    for item in items {
        let item_id = id_of(&item);
        let semaphore = Arc::clone(&semaphore);
        let op = Arc::clone(&op);
        ids.push(item_id);
        handles.push(tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                // The semaphore is never closed; treat it as a shutdown race.
                Err(_) => return ItemOutcome::TransportError("uploader shut down".to_string()),
            };
            op(item).await
        }));
    }

    // Fan-in barrier: the batch result exists only once every call finished.
    let joined = join_all(handles).await;

    ids.into_iter()
        .zip(joined)
        .map(|(item_id, joined)| match joined {
            Ok(outcome) => ItemResult::new(item_id, outcome),
            Err(e) => {
                error!(item_id = %item_id, error = %e, "Upload task failed");
                ItemResult::new(
                    item_id,
                    ItemOutcome::TransportError(format!("upload task failed: {e}")),
                )
            }
        })
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
