//! Typed request/response boundary over the control surface

use crate::harvest::{Harvester, InvocationReport, PersistedSummary};
use crate::state::{QuotaSnapshot, ResultSet, Tier};
use crate::Result;
use serde::{Deserialize, Serialize};

/// A request to the engine
///
/// Deserializes from messages such as
/// `{"action": "startRun", "maxPages": 3, "tier": "restricted", "quota": {"limit": 10}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Command {
    #[serde(rename_all = "camelCase")]
    StartRun {
        max_pages: u32,
        tier: Tier,
        #[serde(default)]
        quota: QuotaSnapshot,
    },

    ScrapePage {
        tier: Tier,
        #[serde(default)]
        quota: QuotaSnapshot,
    },

    ClearState,

    GetSummary,

    /// Reads the records awaiting a flush
    GetResults,

    FlushPending,

    Resume,
}

impl Command {
    /// Name used in log lines
    pub fn name(&self) -> &'static str {
        match self {
            Self::StartRun { .. } => "startRun",
            Self::ScrapePage { .. } => "scrapePage",
            Self::ClearState => "clearState",
            Self::GetSummary => "getSummary",
            Self::GetResults => "getResults",
            Self::FlushPending => "flushPending",
            Self::Resume => "resume",
        }
    }
}

/// The engine's answer to a `Command`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Response {
    Invocation(InvocationReport),

    Summary(PersistedSummary),

    Results(ResultSet),

    Cleared,

    /// `Resume` found no persisted run
    Idle,
}

impl Harvester {
    /// Runs `command` against the matching control-surface operation
    pub async fn dispatch(&self, command: Command) -> Result<Response> {
        tracing::debug!("Dispatching {}", command.name());

        match command {
            Command::StartRun {
                max_pages,
                tier,
                quota,
            } => self
                .start_multi_page_run(max_pages, tier, quota)
                .await
                .map(Response::Invocation),
            Command::ScrapePage { tier, quota } => self
                .scrape_single_page(tier, quota)
                .await
                .map(Response::Invocation),
            Command::ClearState => self.clear_state().await.map(|_| Response::Cleared),
            Command::GetSummary => self.persisted_summary().await.map(Response::Summary),
            Command::GetResults => self.persisted_results().await.map(Response::Results),
            Command::FlushPending => self.flush_pending().await.map(Response::Invocation),
            Command::Resume => Ok(match self.resume().await? {
                Some(report) => Response::Invocation(report),
                None => Response::Idle,
            }),
        }
    }
}
