//! Quota guard for the restricted tier

use crate::state::{Record, RunState};

/// Outcome of admitting one page of candidates
#[derive(Debug, Clone, PartialEq)]
pub struct Admission {
    /// Candidates allowed into the result set, in encounter order
    pub admitted: Vec<Record>,

    /// True once the cumulative count has reached the limit
    pub limit_reached: bool,
}

/// Admits a page of candidate records against the run's quota
///
/// The unrestricted tier admits everything. The restricted tier admits a stable
/// prefix of at most `limit - used` candidates, so the cumulative count can never
/// pass the limit. `state.quota.used` must already reflect the persisted result set.
///
/// # Arguments
///
/// * `candidates` - Records extracted from the current page
/// * `state` - The run checkpoint carrying tier and quota
///
/// # Returns
///
/// The admitted prefix and whether the limit is now reached
pub fn admit(candidates: Vec<Record>, state: &RunState) -> Admission {
    if !state.tier.is_restricted() {
        return Admission {
            admitted: candidates,
            limit_reached: false,
        };
    }

    let remaining = state.quota.remaining();
    if remaining == 0 {
        return Admission {
            admitted: Vec::new(),
            limit_reached: true,
        };
    }

    let mut admitted = candidates;
    if admitted.len() > remaining {
        tracing::info!(
            "Quota allows {} of {} listings on this page",
            remaining,
            admitted.len()
        );
        admitted.truncate(remaining);
    }

    let limit_reached = state.quota.used + admitted.len() >= state.quota.limit;
    Admission {
        admitted,
        limit_reached,
    }
}
