//! Sequential batch scheduler.
//!
//! Remote quotas are counted in requests per minute, not in concurrent
//! requests, so work is paced rather than parallelized: items run one at a
//! time with a pause between items and a longer pause between batches.

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;

use crate::retry::millis;
use crate::sync::{DEFAULT_BATCH_DELAY_MS, DEFAULT_BATCH_SIZE, DEFAULT_ITEM_DELAY_MS};

/// Pacing for [`run_batched`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Items per batch. Zero is treated as one.
    pub batch_size: usize,
    #[serde(with = "millis")]
    pub delay_between_batches: Duration,
    #[serde(with = "millis")]
    pub delay_between_items: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            delay_between_batches: Duration::from_millis(DEFAULT_BATCH_DELAY_MS),
            delay_between_items: Duration::from_millis(DEFAULT_ITEM_DELAY_MS),
        }
    }
}

impl BatchConfig {
    #[must_use]
    pub fn new(batch_size: usize, delay_between_batches: Duration, delay_between_items: Duration) -> Self {
        Self {
            batch_size,
            delay_between_batches,
            delay_between_items,
        }
    }

    /// No pauses at all.
    #[must_use]
    pub fn immediate() -> Self {
        Self::new(usize::MAX, Duration::ZERO, Duration::ZERO)
    }
}

/// Run `worker` over `items` strictly one after another.
///
/// Sleeps `delay_between_items` between items of the same batch and
/// `delay_between_batches` between batches; nothing after the last item.
/// The first worker error is returned immediately and the remaining items
/// are not processed.
pub async fn run_batched<T, R, E, F, Fut>(
    items: Vec<T>,
    mut worker: F,
    config: &BatchConfig,
) -> Result<Vec<R>, E>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    let batch_size = config.batch_size.max(1);
    let total = items.len();
    let mut results = Vec::with_capacity(total);

    for (index, item) in items.into_iter().enumerate() {
        if index > 0 {
            let delay = if index % batch_size == 0 {
                tracing::debug!(
                    completed = index,
                    total,
                    "Batch complete, pausing {:?}",
                    config.delay_between_batches
                );
                config.delay_between_batches
            } else {
                config.delay_between_items
            };
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        results.push(worker(item).await?);
    }

    Ok(results)
}
