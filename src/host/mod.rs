//! Contracts with the hosting game server.
//!
//! The ledger core never reaches into host internals; it consumes these
//! narrow interfaces and the host feeds it lifecycle events. Implementations
//! live host-side (or in tests), except for [`JsonPriceCatalog`], a
//! file-backed catalog the offline CLI uses.

use std::collections::HashMap;
use std::path::Path;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::record::errors::RecordError;
use crate::record::types::{ItemRecord, MatchStats, RaidOutcome, Side};

/// Item price and classification lookup.
pub trait PriceCatalog {
    /// Catalog price for a template, `None` when the host has no price.
    fn price_of(&self, template_id: &str) -> Option<f64>;

    /// Whether the template is-a member of any of the given base classes.
    fn is_of_base_class(&self, template_id: &str, base_classes: &[&str]) -> bool;

    /// Whether the template is a real, tradeable item (filters out synthetic
    /// placeholder entries the host keeps in its tables).
    fn is_valid_item(&self, template_id: &str) -> bool;
}

/// Access to a player's profile inventory.
pub trait ProfileProvider {
    /// Root container id plus the flat list of all items owned by the
    /// player's inventory. Fails with [`RecordError::NotFound`] when the
    /// session or player is unknown.
    fn inventory_root(&self, player_id: &str) -> Result<(String, Vec<ItemRecord>), RecordError>;
}

/// Inbound event: the host started a local match for a player.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaidStart {
    pub player_id: String,
    pub raid_id: String,
    pub side: Side,
}

/// Inbound event: the host finished a local match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaidEnd {
    pub player_id: String,
    /// Missing when the host lost track of the match (crash, desync).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raid_id: Option<String>,
    pub side: Side,
    pub outcome: RaidOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<MatchStats>,
}

/// Published by the host whenever it reassigns item instance ids (insurance
/// resolution and similar). Maps old id to new id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdsRemapped {
    pub player_id: String,
    pub mapping: HashMap<String, String>,
}

/// On-disk shape of `catalog.json`, the offline price/class table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    prices: HashMap<String, f64>,
    /// Template id -> base classes it belongs to.
    #[serde(default)]
    classes: HashMap<String, Vec<String>>,
}

/// File-backed [`PriceCatalog`] for offline queries (`status`, `recheck`).
///
/// A missing file is not an error: every lookup just misses, which the
/// valuation engine already treats as price 0.
#[derive(Debug, Clone, Default)]
pub struct JsonPriceCatalog {
    file: CatalogFile,
}

impl JsonPriceCatalog {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, RecordError> {
        let path = path.as_ref();
        let file = match tokio::fs::read_to_string(path).await {
            Ok(data) => serde_json::from_str(&data).map_err(|e| {
                RecordError::PersistenceCorruption {
                    path: path.display().to_string(),
                    detail: e.to_string(),
                }
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    "no catalog at {}, all prices will resolve to 0",
                    path.display()
                );
                CatalogFile::default()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self { file })
    }

    pub fn is_empty(&self) -> bool {
        self.file.prices.is_empty() && self.file.classes.is_empty()
    }
}

impl PriceCatalog for JsonPriceCatalog {
    fn price_of(&self, template_id: &str) -> Option<f64> {
        self.file.prices.get(template_id).copied()
    }

    fn is_of_base_class(&self, template_id: &str, base_classes: &[&str]) -> bool {
        self.file
            .classes
            .get(template_id)
            .map(|classes| classes.iter().any(|c| base_classes.contains(&c.as_str())))
            .unwrap_or(false)
    }

    fn is_valid_item(&self, template_id: &str) -> bool {
        self.file.prices.contains_key(template_id) || self.file.classes.contains_key(template_id)
    }
}
