//! Stabilization detection for asynchronously rendered listings
//!
//! Listings often arrive in bursts after the page loads. The stabilizer samples the
//! rendered listing count until it stops changing, trading completeness for a
//! bounded wait: it never waits longer than `max_attempts * sample_interval`.

use crate::harvest::Clock;
use crate::page::{DomError, DomSource};
use std::time::Duration;

/// Bounded polling policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StabilizationPolicy {
    /// Delay between two samples
    pub sample_interval: Duration,

    /// Consecutive equal samples required before returning
    pub stability_threshold: u32,

    /// Upper bound on samples taken before giving up
    pub max_attempts: u32,
}

impl Default for StabilizationPolicy {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_millis(500),
            stability_threshold: 2,
            max_attempts: 30,
        }
    }
}

/// Waits for the rendered listing count to settle
#[derive(Debug, Clone)]
pub struct Stabilizer {
    policy: StabilizationPolicy,
}

impl Stabilizer {
    pub fn new(policy: StabilizationPolicy) -> Self {
        Self { policy }
    }

    /// Samples the listing count until it is stable and non-zero
    ///
    /// Each sample equal to the previous non-zero sample increments a stability
    /// counter; any change resets it. The count is returned as soon as the counter
    /// reaches the threshold. If attempts run out first, the last observed count
    /// is returned instead: partial data is acceptable, an unbounded wait is not.
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - The stable count, or the last count if it never settled
    /// * `Err(DomError)` - The page could not be queried
    pub async fn await_stable_count(
        &self,
        dom: &dyn DomSource,
        clock: &dyn Clock,
    ) -> Result<usize, DomError> {
        let mut last_count = 0;
        let mut stable_samples = 0;

        for attempt in 1..=self.policy.max_attempts {
            let count = dom.listing_count().await?;

            if count > 0 && count == last_count {
                stable_samples += 1;
                if stable_samples >= self.policy.stability_threshold {
                    tracing::debug!("Listing count stable at {} after {} samples", count, attempt);
                    return Ok(count);
                }
            } else {
                stable_samples = 0;
                tracing::trace!("Listing count {} (sample {})", count, attempt);
            }
            last_count = count;

            clock.sleep(self.policy.sample_interval).await;
        }

        let final_count = dom.listing_count().await?;
        tracing::info!(
            "Listing count did not stabilize after {} samples, continuing with {}",
            self.policy.max_attempts,
            final_count
        );
        Ok(final_count)
    }
}
