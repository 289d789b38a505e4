use crate::page::{NavigationError, Navigator};
use async_trait::async_trait;
use std::sync::Mutex;
use url::Url;

/// Navigator that records the requested target instead of acting on it
///
/// The host driver owns the page lifecycle: after the engine returns it takes the
/// recorded target, discards the engine, and loads the new page itself.
#[derive(Debug, Default)]
pub struct PendingNavigation {
    target: Mutex<Option<String>>,
}

impl PendingNavigation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the recorded target, leaving nothing pending
    pub fn take(&self) -> Option<String> {
        self.target.lock().ok().and_then(|mut t| t.take())
    }
}

#[async_trait]
impl Navigator for PendingNavigation {
    async fn navigate(&self, url: &str) -> Result<(), NavigationError> {
        Url::parse(url).map_err(|_| NavigationError::InvalidTarget(url.to_string()))?;

        let mut target = self
            .target
            .lock()
            .map_err(|_| NavigationError::Failed("navigation slot poisoned".to_string()))?;
        *target = Some(url.to_string());

        tracing::info!("Navigation requested: {}", url);
        Ok(())
    }
}
