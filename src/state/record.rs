//! Extracted listing records and their identity keys

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Separator between the parts of a composite identity key
const KEY_SEPARATOR: &str = "|";

/// One extracted listing
///
/// The three identity fields are optional because listing cards are frequently
/// incomplete; every other extracted field lands in `attributes`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Identifier assigned by the listing source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Canonical link to the listing detail page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,

    /// Display address of the listing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    /// Any additional extracted fields
    #[serde(flatten)]
    pub attributes: BTreeMap<String, String>,
}

impl Record {
    /// Creates a record from its identity fields
    pub fn new(id: Option<&str>, link: Option<&str>, address: Option<&str>) -> Self {
        Self {
            id: id.map(str::to_string),
            link: link.map(str::to_string),
            address: address.map(str::to_string),
            attributes: BTreeMap::new(),
        }
    }

    /// Adds an extra attribute, builder style
    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    /// Computes the deterministic identity key of this record
    ///
    /// The key joins the trimmed, non-empty values of `id`, `link` and `address`
    /// with `|`, so `id-7`, `link-x` and `addr-y` yield `id-7|link-x|addr-y`.
    /// A record with none of the three falls back to a SHA-256 digest of its
    /// canonical JSON form, which is stable because attributes are kept sorted.
    ///
    /// # Examples
    ///
    /// ```
    /// use listing_harvester::state::Record;
    ///
    /// let record = Record::new(Some(" id-7 "), None, Some("addr-y"));
    /// assert_eq!(record.identity_key(), "id-7|addr-y");
    /// ```
    pub fn identity_key(&self) -> String {
        let parts: Vec<&str> = [&self.id, &self.link, &self.address]
            .into_iter()
            .filter_map(|field| field.as_deref())
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();

        if !parts.is_empty() {
            return parts.join(KEY_SEPARATOR);
        }

        let canonical = serde_json::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        format!("sha256:{}", hex::encode(hasher.finalize()))
    }
}
