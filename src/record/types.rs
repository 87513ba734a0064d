//! Core data model: item records, inventory snapshots, raid records and the
//! compact archive form they are reduced to after reconciliation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Faction the player entered the raid as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Pmc,
    Scav,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Pmc => write!(f, "PMC"),
            Side::Scav => write!(f, "SCAV"),
        }
    }
}

/// Lifecycle state of one raid attempt.
///
/// `Pending` records carry full inventories and are mutable; the other three
/// states are terminal and only ever observed on the compact archive form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RaidStatus {
    /// Raid started, end event not yet seen.
    Pending,
    /// Raid ended normally and was reconciled.
    Archived,
    /// A new raid started while this one was still pending; force-closed
    /// without an end inventory.
    Abandoned,
    /// Raid-end arrived with no matching pending record; reconstructed from
    /// whatever data was available.
    Inferred,
}

impl std::fmt::Display for RaidStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RaidStatus::Pending => "pending",
            RaidStatus::Archived => "archived",
            RaidStatus::Abandoned => "abandoned",
            RaidStatus::Inferred => "inferred",
        };
        write!(f, "{}", s)
    }
}

/// One concrete item instance inside an inventory snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    /// Instance id, unique within one snapshot.
    pub id: String,
    /// Catalog reference shared by all instances of this item type.
    #[serde(rename = "tpl")]
    pub template_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Named attachment or container point on the parent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    /// Condition/durability/charge fraction applied to the catalog price.
    #[serde(default = "default_quality")]
    pub quality_modifier: f64,
}

fn default_quantity() -> u32 {
    1
}

fn default_quality() -> f64 {
    1.0
}

impl ItemRecord {
    pub fn new(id: impl Into<String>, template_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            template_id: template_id.into(),
            parent_id: None,
            slot: None,
            quantity: 1,
            quality_modifier: 1.0,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_slot(mut self, slot: impl Into<String>) -> Self {
        self.slot = Some(slot.into());
        self
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn with_quality(mut self, quality_modifier: f64) -> Self {
        self.quality_modifier = quality_modifier;
        self
    }
}

/// Flat mapping of item instance id to item record, captured at one instant
/// for one player. `BTreeMap` keeps iteration deterministic, which the
/// archive compressor relies on for stable index assignment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InventorySnapshot(pub BTreeMap<String, ItemRecord>);

impl InventorySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, item: ItemRecord) -> Option<ItemRecord> {
        self.0.insert(item.id.clone(), item)
    }

    pub fn get(&self, id: &str) -> Option<&ItemRecord> {
        self.0.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn items(&self) -> impl Iterator<Item = &ItemRecord> {
        self.0.values()
    }
}

impl FromIterator<ItemRecord> for InventorySnapshot {
    fn from_iter<T: IntoIterator<Item = ItemRecord>>(iter: T) -> Self {
        let mut snap = Self::new();
        for item in iter {
            snap.insert(item);
        }
        snap
    }
}

/// How the raid actually ended: exit status, killer identity, extraction
/// point and elapsed play time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RaidOutcome {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub killer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub killer_aid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_name: Option<String>,
    #[serde(default)]
    pub play_time_secs: i64,
}

/// One kill scored by the player during the raid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Victim {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side: Option<String>,
    #[serde(default)]
    pub level: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weapon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_part: Option<String>,
    #[serde(default)]
    pub distance: f64,
}

/// Whoever eliminated the player, when the raid ended in death.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggressor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weapon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_part: Option<String>,
}

/// Raw match statistics payload, trimmed of the bulky per-tick counters the
/// host also reports. Only the fields the chat surface renders survive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchStats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub survivor_class: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub victims: Vec<Victim>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggressor: Option<Aggressor>,
    #[serde(default)]
    pub total_sessions: u32,
}

/// In-progress form of one raid attempt. Created at raid-start, mutated by
/// id-remap events while pending, finalized at raid-end and immediately
/// reduced to a [`RaidArchive`] — the full form is never persisted after
/// archival.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaidRecord {
    pub raid_id: String,
    pub player_id: String,
    pub created_at: DateTime<Utc>,
    pub status: RaidStatus,
    pub side: Side,
    pub begin_inventory: InventorySnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_inventory: Option<InventorySnapshot>,
    /// Item ids present only in the end inventory.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub added: Vec<String>,
    /// Item ids present only in the begin inventory.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed: Vec<String>,
    /// Item ids present in both with a quality modifier change.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changed: Vec<String>,
    pub entry_value: i64,
    pub equipment_value: i64,
    pub secured_value: i64,
    pub gross_profit: i64,
    pub combat_losses: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<MatchStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<RaidOutcome>,
}

impl RaidRecord {
    pub fn new(
        raid_id: impl Into<String>,
        player_id: impl Into<String>,
        side: Side,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            raid_id: raid_id.into(),
            player_id: player_id.into(),
            created_at,
            status: RaidStatus::Pending,
            side,
            begin_inventory: InventorySnapshot::new(),
            end_inventory: None,
            added: Vec::new(),
            removed: Vec::new(),
            changed: Vec::new(),
            entry_value: 0,
            equipment_value: 0,
            secured_value: 0,
            gross_profit: 0,
            combat_losses: 0,
            stats: None,
            outcome: None,
        }
    }
}

/// Compact persisted form of a reconciled raid. Item instances are gone;
/// `items_in`/`items_out` map template id to the summed
/// `quality_modifier x quantity` of all instances of that template. The
/// aggregation is intentionally lossy: archives answer aggregate monetary
/// questions, never per-instance ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaidArchive {
    pub raid_id: String,
    pub player_id: String,
    pub created_at: DateTime<Utc>,
    pub status: RaidStatus,
    pub side: Side,
    #[serde(default)]
    pub items_in: BTreeMap<String, f64>,
    #[serde(default)]
    pub items_out: BTreeMap<String, f64>,
    pub entry_value: i64,
    pub equipment_value: i64,
    pub secured_value: i64,
    pub gross_profit: i64,
    pub combat_losses: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<MatchStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<RaidOutcome>,
}

/// One entry in a player's ledger: either an in-flight raid or a finished,
/// compacted one. The tagged form makes it impossible to read archive-only
/// fields off a pending record or vice versa.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RaidEntry {
    #[serde(rename = "info")]
    Pending(RaidRecord),
    #[serde(rename = "archive")]
    Archived(RaidArchive),
}

impl RaidEntry {
    pub fn is_pending(&self) -> bool {
        matches!(self, RaidEntry::Pending(_))
    }

    pub fn as_pending(&self) -> Option<&RaidRecord> {
        match self {
            RaidEntry::Pending(record) => Some(record),
            RaidEntry::Archived(_) => None,
        }
    }

    pub fn as_pending_mut(&mut self) -> Option<&mut RaidRecord> {
        match self {
            RaidEntry::Pending(record) => Some(record),
            RaidEntry::Archived(_) => None,
        }
    }

    pub fn as_archive(&self) -> Option<&RaidArchive> {
        match self {
            RaidEntry::Pending(_) => None,
            RaidEntry::Archived(archive) => Some(archive),
        }
    }

    pub fn raid_id(&self) -> &str {
        match self {
            RaidEntry::Pending(record) => &record.raid_id,
            RaidEntry::Archived(archive) => &archive.raid_id,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            RaidEntry::Pending(record) => record.created_at,
            RaidEntry::Archived(archive) => archive.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_serializes_with_wrapper_tag() {
        let record = RaidRecord::new("factory.1", "p1", Side::Pmc, Utc::now());
        let json = serde_json::to_value(RaidEntry::Pending(record)).unwrap();
        assert!(json.get("info").is_some());
        assert!(json.get("archive").is_none());
    }

    #[test]
    fn item_defaults_apply_on_deserialize() {
        let item: ItemRecord =
            serde_json::from_str(r#"{"id":"a","tpl":"tpl-knife"}"#).unwrap();
        assert_eq!(item.quantity, 1);
        assert!((item.quality_modifier - 1.0).abs() < f64::EPSILON);
        assert!(item.parent_id.is_none());
    }

    #[test]
    fn snapshot_iterates_in_id_order() {
        let snap: InventorySnapshot = vec![
            ItemRecord::new("b", "t"),
            ItemRecord::new("a", "t"),
            ItemRecord::new("c", "t"),
        ]
        .into_iter()
        .collect();
        let ids: Vec<&String> = snap.ids().collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }
}
