use crate::state::Record;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Records gathered so far in the current run, in encounter order
///
/// This is persisted separately from the run checkpoint and survives navigation.
/// It is only removed after the remote sink confirms a flush.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub records: Vec<Record>,

    /// Number of records at the time of the last save
    #[serde(default)]
    pub total_count: usize,

    /// When records were last appended
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,

    /// Run page whose records were appended last
    ///
    /// Saved together with the records, so a page is never appended twice even
    /// when the checkpoint write after it fails.
    #[serde(default)]
    pub last_page: Option<u32>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Appends admitted records, keeping their order, and stamps the update time
    pub fn append(&mut self, records: Vec<Record>) {
        self.records.extend(records);
        self.total_count = self.records.len();
        self.last_updated = Some(Utc::now());
    }

    /// Appends the admitted records of run page `page`
    pub fn append_page(&mut self, records: Vec<Record>, page: u32) {
        self.append(records);
        self.last_page = Some(page);
    }

    /// Returns true if the records of run page `page` are already included
    pub fn contains_page(&self, page: u32) -> bool {
        self.last_page == Some(page)
    }
}
