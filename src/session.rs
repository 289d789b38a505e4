//! Host driver for server-rendered listings
//!
//! Plays the part of the page lifecycle around the engine. Every page gets a fresh
//! `Harvester`; when that engine requests navigation it is dropped together with
//! everything it held in memory, the target page is fetched, and a new engine
//! resumes the run from the store.

use crate::config::Config;
use crate::harvest::{
    Clock, Command, EngineConfig, FieldMapping, Harvester, Response, RunOutcome, TokioClock,
};
use crate::page::{build_http_client, fetch_page, HtmlPage, PendingNavigation};
use crate::sink::RemoteSink;
use crate::storage::KeyValueStore;
use crate::{HarvestError, Result};
use reqwest::Client;
use std::sync::Arc;

/// Runs commands against fetched pages, following navigation until the run
/// stops continuing
pub struct Session {
    config: Config,
    engine_config: EngineConfig,
    client: Client,
    store: Arc<dyn KeyValueStore>,
    sink: Arc<dyn RemoteSink>,
    clock: Arc<dyn Clock>,
}

impl Session {
    /// Creates a session sharing `store` and `sink` across all pages
    pub fn new(
        config: Config,
        store: Arc<dyn KeyValueStore>,
        sink: Arc<dyn RemoteSink>,
    ) -> Result<Self> {
        let client = build_http_client(&config.user_agent)?;
        let engine_config = config.engine_config();

        Ok(Self {
            config,
            engine_config,
            client,
            store,
            sink,
            clock: Arc::new(TokioClock),
        })
    }

    /// Replaces the clock handed to every engine
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the engine timing policy taken from the configuration
    pub fn with_engine_config(mut self, engine_config: EngineConfig) -> Self {
        self.engine_config = engine_config;
        self
    }

    /// Executes `command`, starting on the page at `url`
    ///
    /// Commands that read the page require `url`. Others run against an empty
    /// page whose address, if given, is used as the flush source context.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<Response>)` - One response per page visited, in order
    /// * `Err(HarvestError)` - A page, the store or navigation failed
    pub async fn execute(&self, url: Option<&str>, command: Command) -> Result<Vec<Response>> {
        let reads_page = matches!(
            command,
            Command::StartRun { .. } | Command::ScrapePage { .. } | Command::Resume
        );

        let page = match (reads_page, url) {
            (true, Some(url)) => self.load_page(url).await?,
            (true, None) => return Err(HarvestError::MissingUrl(command.name().to_string())),
            (false, url) => HtmlPage::empty(url.unwrap_or_default()),
        };

        let navigation = Arc::new(PendingNavigation::new());
        let response = self
            .engine(page, navigation.clone())
            .dispatch(command)
            .await?;

        let mut responses = Vec::new();
        let mut next = continuation(&response, &navigation);
        responses.push(response);

        while let Some(target) = next {
            let page = self.load_page(&target).await?;
            let navigation = Arc::new(PendingNavigation::new());

            let report = self
                .engine(page, navigation.clone())
                .resume()
                .await?
                .ok_or(HarvestError::NoPersistedRun)?;

            let response = Response::Invocation(report);
            next = continuation(&response, &navigation);
            responses.push(response);
        }

        Ok(responses)
    }

    async fn load_page(&self, url: &str) -> Result<HtmlPage> {
        let (final_url, body) = fetch_page(&self.client, url).await?;
        let page = HtmlPage::parse(&body, &final_url, &self.config.listing)?;
        tracing::info!("Loaded {} ({} listings)", final_url, page.nodes().len());
        Ok(page)
    }

    fn engine(&self, page: HtmlPage, navigation: Arc<PendingNavigation>) -> Harvester {
        Harvester::new(
            self.engine_config.clone(),
            Arc::new(page),
            self.store.clone(),
            self.sink.clone(),
            navigation,
        )
        .with_clock(self.clock.clone())
        .with_mapper(Arc::new(FieldMapping::new(
            self.config.listing.required_fields.clone(),
        )))
    }
}

/// The page to load next, if the engine requested navigation
fn continuation(response: &Response, navigation: &PendingNavigation) -> Option<String> {
    match response {
        Response::Invocation(report) => match &report.outcome {
            RunOutcome::Continuing { next_url } => {
                navigation.take().or_else(|| Some(next_url.clone()))
            }
            _ => None,
        },
        _ => None,
    }
}
