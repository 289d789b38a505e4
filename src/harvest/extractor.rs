//! Page extraction with per-record failure isolation

use crate::page::{DomError, DomSource, ListingNode};
use crate::state::Record;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while turning one listing node into a record
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("Listing {index} has no readable fields")]
    EmptyNode { index: usize },

    #[error("Listing {index} is missing required field '{field}'")]
    MissingField { index: usize, field: String },
}

/// Turns a listing node into a record
///
/// Field heuristics for a particular markup live behind this trait; the engine only
/// needs the resulting identity fields.
pub trait RecordMapper: Send + Sync {
    fn map(&self, node: &ListingNode) -> Result<Record, ExtractError>;
}

/// Default mapper: `id`, `link` and `address` become identity fields and every
/// other field is kept as an attribute
#[derive(Debug, Clone, Default)]
pub struct FieldMapping {
    required_fields: Vec<String>,
}

impl FieldMapping {
    pub fn new(required_fields: Vec<String>) -> Self {
        Self { required_fields }
    }
}

impl RecordMapper for FieldMapping {
    fn map(&self, node: &ListingNode) -> Result<Record, ExtractError> {
        let values: Vec<(&String, &str)> = node
            .fields
            .iter()
            .map(|(name, value)| (name, value.trim()))
            .filter(|(_, value)| !value.is_empty())
            .collect();

        if values.is_empty() {
            return Err(ExtractError::EmptyNode { index: node.index });
        }

        for field in &self.required_fields {
            if !values.iter().any(|(name, _)| *name == field) {
                return Err(ExtractError::MissingField {
                    index: node.index,
                    field: field.clone(),
                });
            }
        }

        let mut record = Record::default();
        for (name, value) in values {
            match name.as_str() {
                "id" => record.id = Some(value.to_string()),
                "link" => record.link = Some(value.to_string()),
                "address" => record.address = Some(value.to_string()),
                _ => {
                    record.attributes.insert(name.clone(), value.to_string());
                }
            }
        }

        Ok(record)
    }
}

/// Reads the current page into records
#[derive(Clone)]
pub struct PageExtractor {
    mapper: Arc<dyn RecordMapper>,
}

impl PageExtractor {
    pub fn new(mapper: Arc<dyn RecordMapper>) -> Self {
        Self { mapper }
    }

    /// Extracts every listing on the page in encounter order
    ///
    /// A listing that fails to map is logged and skipped; only a failure to query
    /// the page itself aborts extraction.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<Record>)` - Records for every listing that mapped cleanly
    /// * `Err(DomError)` - The page could not be queried
    pub async fn extract_page(&self, dom: &dyn DomSource) -> Result<Vec<Record>, DomError> {
        let nodes = dom.listing_nodes().await?;
        let total = nodes.len();

        let mut records = Vec::with_capacity(total);
        for node in &nodes {
            match self.mapper.map(node) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!("Skipping listing: {}", e),
            }
        }

        tracing::debug!("Extracted {} of {} listings", records.len(), total);
        Ok(records)
    }
}

impl Default for PageExtractor {
    fn default() -> Self {
        Self::new(Arc::new(FieldMapping::default()))
    }
}
