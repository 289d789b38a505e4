//! Scroll-driven hydration of lazily loaded listings
//!
//! Infinite-scroll listings only render what has been scrolled into view. The
//! hydrator walks the results container down in fixed steps, activating any
//! "load more" control on the way, until the content stops growing at the bottom
//! or the step budget runs out. It then returns to the top so extraction sees a
//! consistent viewport.

use crate::harvest::Clock;
use crate::page::{DomError, DomSource, ScrollSurface};
use std::time::Duration;

/// Scroll and settle policy for hydration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HydrationPolicy {
    /// Pixels advanced per step
    pub scroll_step: u64,

    /// Wait after each step
    pub settle_delay: Duration,

    /// Wait after activating a "load more" control
    pub load_more_delay: Duration,

    /// Upper bound on steps
    pub max_steps: u32,

    /// Distance from the end of the content that still counts as the bottom
    pub bottom_tolerance: u64,

    /// Wait after scrolling back to the top
    pub return_settle: Duration,

    /// Extra wait for late rendering before extraction
    pub render_settle: Duration,

    /// Case-insensitive labels of "load more" controls
    pub load_more_labels: Vec<String>,
}

impl Default for HydrationPolicy {
    fn default() -> Self {
        Self {
            scroll_step: 1000,
            settle_delay: Duration::from_millis(1200),
            load_more_delay: Duration::from_millis(1200),
            max_steps: 30,
            bottom_tolerance: 100,
            return_settle: Duration::from_millis(2000),
            render_settle: Duration::from_millis(4000),
            load_more_labels: vec!["see more".to_string(), "load more".to_string()],
        }
    }
}

/// What a hydration pass did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HydrationSummary {
    pub surface: ScrollSurface,
    pub steps: u32,
    pub load_more_clicks: u32,
    pub final_height: u64,
}

/// Forces lazily loaded listings into the page
#[derive(Debug, Clone)]
pub struct Hydrator {
    policy: HydrationPolicy,
}

impl Hydrator {
    pub fn new(policy: HydrationPolicy) -> Self {
        Self { policy }
    }

    /// Scrolls the listing to its end, then back to the top
    ///
    /// The results container is preferred; when it reports no overflow (small
    /// viewports hand scrolling to the whole page) the viewport is used instead.
    pub async fn hydrate(
        &self,
        dom: &dyn DomSource,
        clock: &dyn Clock,
    ) -> Result<HydrationSummary, DomError> {
        let container = dom.scroll_metrics(ScrollSurface::Container).await?;
        let surface = if container.is_scrollable() {
            ScrollSurface::Container
        } else {
            ScrollSurface::Viewport
        };

        let mut last_height = dom.scroll_metrics(surface).await?.scroll_height;
        let mut steps = 0;
        let mut load_more_clicks = 0;

        while steps < self.policy.max_steps {
            let current = dom.scroll_metrics(surface).await?;
            let target = (current.top + self.policy.scroll_step).min(current.scroll_height);

            dom.scroll_to(surface, target).await?;
            clock.sleep(self.policy.settle_delay).await;

            if dom.trigger_load_more(&self.policy.load_more_labels).await? {
                load_more_clicks += 1;
                clock.sleep(self.policy.load_more_delay).await;
            }

            let after = dom.scroll_metrics(surface).await?;
            steps += 1;

            let grew = after.scroll_height != last_height;
            let at_bottom =
                after.top + after.client_height + self.policy.bottom_tolerance >= after.scroll_height;

            tracing::debug!(
                "Scroll {}: position {}px, height {}px",
                steps,
                after.top,
                after.scroll_height
            );

            if !grew && at_bottom {
                break;
            }
            last_height = after.scroll_height;
        }

        if steps >= self.policy.max_steps {
            tracing::info!("Hydration stopped at the {} step limit", self.policy.max_steps);
        }

        dom.scroll_to(surface, 0).await?;
        clock.sleep(self.policy.return_settle).await;
        clock.sleep(self.policy.render_settle).await;

        Ok(HydrationSummary {
            surface,
            steps,
            load_more_clicks,
            final_height: last_height,
        })
    }
}
