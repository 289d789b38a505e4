/// Run checkpoint and controller phase definitions
///
/// The run checkpoint is the only thing that carries a multi-page run across a
/// navigation; everything held in memory is lost when the page is replaced.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Account class controlling whether a quota applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Cumulative record count is capped at the quota limit
    Restricted,

    /// No quota applies
    Unrestricted,
}

impl Tier {
    pub fn is_restricted(&self) -> bool {
        matches!(self, Self::Restricted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Restricted => "restricted",
            Self::Unrestricted => "unrestricted",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    /// Accepts the engine names as well as the `free`/`premium` plan names
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "restricted" | "free" => Ok(Self::Restricted),
            "unrestricted" | "premium" => Ok(Self::Unrestricted),
            other => Err(format!("unknown tier '{}'", other)),
        }
    }
}

/// Consumption quota for the restricted tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quota {
    /// Records already committed to the accumulated result set
    pub used: usize,

    /// Maximum cumulative records for the run
    pub limit: usize,
}

impl Quota {
    pub fn new(limit: usize) -> Self {
        Self { used: 0, limit }
    }

    /// Records that may still be admitted
    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.used)
    }

    pub fn is_exhausted(&self) -> bool {
        self.used >= self.limit
    }
}

/// Quota information supplied by the caller of a control operation
///
/// Only `limit` is honoured. `used` is accepted for compatibility but the engine
/// always recomputes it from the persisted result set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaSnapshot {
    #[serde(default)]
    pub used: Option<usize>,

    #[serde(default)]
    pub limit: Option<usize>,
}

impl QuotaSnapshot {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            used: None,
            limit: Some(limit),
        }
    }
}

/// The resumable cursor of a multi-page run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    /// 1-based index of the page to process next
    pub page_index: u32,

    /// Page budget for the run
    pub max_pages: u32,

    pub tier: Tier,

    pub quota: Quota,
}

impl RunState {
    /// Creates the checkpoint for a fresh run starting at page 1
    pub fn new(max_pages: u32, tier: Tier, limit: usize) -> Self {
        Self {
            page_index: 1,
            max_pages: max_pages.max(1),
            tier,
            quota: Quota::new(limit),
        }
    }

    /// Returns true while the page budget allows moving past the current page
    pub fn has_page_budget(&self) -> bool {
        self.page_index < self.max_pages
    }

    /// Returns true if the restricted quota has already been consumed
    pub fn quota_exhausted(&self) -> bool {
        self.tier.is_restricted() && self.quota.is_exhausted()
    }
}

/// Phase of the pagination controller within one process instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunPhase {
    /// No invocation in progress
    Idle,

    /// Hydrating, extracting and admitting the current page
    Running,

    /// Navigation to the next page was triggered; this instance is done
    Continuing,

    /// Deduplicating and flushing the accumulated result set
    Finalizing,
}

impl RunPhase {
    /// Returns true if moving from `self` to `to` is a legal controller step
    pub fn can_transition_to(&self, to: RunPhase) -> bool {
        matches!(
            (self, to),
            (Self::Idle, Self::Running)
                | (Self::Idle, Self::Finalizing)
                | (Self::Running, Self::Continuing)
                | (Self::Running, Self::Finalizing)
                | (Self::Running, Self::Idle)
                | (Self::Finalizing, Self::Idle)
                | (Self::Continuing, Self::Idle)
        )
    }

    /// Returns true once this instance has nothing more to do for the run
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Idle | Self::Continuing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Continuing => "continuing",
            Self::Finalizing => "finalizing",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
