//! Raid record state machine.
//!
//! Owns the lifecycle of one raid attempt per player: a raid-start event
//! creates a pending record with a begin-inventory snapshot, a raid-end
//! event reconciles it against the end snapshot and archives it. Two
//! degraded paths keep the ledger honest when the host misbehaves: a second
//! raid-start abandons the stale pending record, and a raid-end with no
//! matching pending record synthesizes an inferred one from whatever data is
//! left. The core invariant, enforced here: at most one pending record per
//! player at any time.

use chrono::{Duration, Utc};
use log::{debug, error, info, warn};
use uuid::Uuid;

use crate::host::{IdsRemapped, PriceCatalog, ProfileProvider, RaidEnd, RaidStart};
use crate::record::archive::compress;
use crate::record::errors::RecordError;
use crate::record::remap::apply_id_remap;
use crate::record::snapshot::snapshot_inventory;
use crate::record::store::RecordStore;
use crate::record::types::{InventorySnapshot, ItemRecord, RaidEntry, RaidRecord, RaidStatus, Side};
use crate::record::valuation::{
    item_value, items_in_container, items_value_all, items_value_filtered,
    items_value_with_base_classes, valid_item_count, EQUIPMENT_CLASSES, SLOT_SECURED_CONTAINER,
};

/// Quality-modifier difference below which an item counts as untouched.
pub const QUALITY_EPSILON: f64 = 1e-6;

/// Assumed elapsed time for inferred records when the host reports none.
const INFERRED_DEFAULT_ELAPSED_SECS: i64 = 3600;

/// Drives raid records through their lifecycle and persists every step.
pub struct RaidTracker {
    store: RecordStore,
    track_scav_raids: bool,
}

impl RaidTracker {
    pub fn new(store: RecordStore, track_scav_raids: bool) -> Self {
        Self {
            store,
            track_scav_raids,
        }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut RecordStore {
        &mut self.store
    }

    fn skip_side(&self, side: Side) -> bool {
        side == Side::Scav && !self.track_scav_raids
    }

    /// Handle a raid-start event.
    ///
    /// Any pending record the player still has is force-closed as abandoned
    /// and archived first; then a fresh pending record is created with the
    /// begin-inventory snapshot and its entry/equipment/secured values. If
    /// the inventory cannot be obtained nothing is created or mutated.
    pub async fn on_raid_start<P, C>(
        &mut self,
        event: &RaidStart,
        profiles: &P,
        catalog: &C,
    ) -> Result<(), RecordError>
    where
        P: ProfileProvider,
        C: PriceCatalog,
    {
        if self.skip_side(event.side) {
            debug!("ignoring scav raid {} for {}", event.raid_id, event.player_id);
            return Ok(());
        }

        let begin = match self.capture_inventory(&event.player_id, profiles) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(
                    "raid start {} for {}: inventory unavailable, no record created: {}",
                    event.raid_id, event.player_id, e
                );
                return Err(e);
            }
        };

        let mut record = RaidRecord::new(
            event.raid_id.clone(),
            event.player_id.clone(),
            event.side,
            Utc::now(),
        );
        record.begin_inventory = begin;
        compute_entry_values(&mut record, catalog);

        let item_count = valid_item_count(record.begin_inventory.items(), catalog);
        info!(
            "{} started raid {} as {}: {} items, entry value {} (equipment {}, secured {})",
            event.player_id,
            event.raid_id,
            event.side,
            item_count,
            record.entry_value,
            record.equipment_value,
            record.secured_value
        );

        let player_id = event.player_id.clone();
        let abandoned = self
            .store
            .update(&player_id, |entries| {
                let abandoned = abandon_pending(entries, catalog);
                entries.push(RaidEntry::Pending(record));
                abandoned
            })
            .await?;
        for raid_id in abandoned {
            warn!(
                "{} abandoned raid {} mid-raid, archived without end inventory",
                player_id, raid_id
            );
        }
        Ok(())
    }

    /// Handle a raid-end event.
    ///
    /// Reconciles the matching pending record, or synthesizes an inferred
    /// one when nothing matches, then compresses and persists the archive.
    /// If the end inventory cannot be obtained the pending record is left
    /// untouched for a later retry.
    pub async fn on_raid_end<P, C>(
        &mut self,
        event: &RaidEnd,
        profiles: &P,
        catalog: &C,
    ) -> Result<(), RecordError>
    where
        P: ProfileProvider,
        C: PriceCatalog,
    {
        if self.skip_side(event.side) {
            debug!("ignoring scav raid end for {}", event.player_id);
            return Ok(());
        }

        let end = match self.capture_inventory(&event.player_id, profiles) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(
                    "raid end for {}: inventory unavailable, pending record left as-is: {}",
                    event.player_id, e
                );
                return Err(e);
            }
        };

        let player_id = event.player_id.clone();
        let event = event.clone();
        let summary = self
            .store
            .update(&player_id, move |entries| {
                let matching = entries.iter().position(|entry| {
                    entry.is_pending()
                        && event.raid_id.as_deref() == Some(entry.raid_id())
                });
                let mut record = match matching {
                    Some(idx) => match entries.remove(idx) {
                        RaidEntry::Pending(record) => record,
                        RaidEntry::Archived(_) => unreachable!("position matched pending"),
                    },
                    None => {
                        warn!(
                            "raid end for {} has no matching pending record, inferring one",
                            event.player_id
                        );
                        synthesize_inferred(&event)
                    }
                };

                record.end_inventory = Some(end);
                record.outcome = Some(event.outcome.clone());
                record.stats = event.stats.clone();
                reconcile(&mut record, catalog);
                if record.status != RaidStatus::Inferred {
                    record.status = RaidStatus::Archived;
                }

                let archive = compress(&record, catalog);
                let summary = (
                    archive.raid_id.clone(),
                    archive.gross_profit,
                    archive.combat_losses,
                    record.added.len(),
                );
                entries.push(RaidEntry::Archived(archive));
                summary
            })
            .await?;

        let (raid_id, gross, losses, gained) = summary;
        info!(
            "{} finished raid {}: {} items gained, gross profit {}, combat losses {}, net {}",
            player_id,
            raid_id,
            gained,
            gross,
            losses,
            gross - losses
        );
        Ok(())
    }

    /// Handle an id-remap event published by the host: rewrite every pending
    /// record of the player so later reconciliation sees consistent ids.
    pub async fn on_ids_remapped(&mut self, event: &IdsRemapped) -> Result<(), RecordError> {
        if event.mapping.is_empty() {
            return Ok(());
        }
        let mapping = event.mapping.clone();
        let touched = self
            .store
            .update(&event.player_id, move |entries| {
                let mut touched = 0usize;
                for entry in entries.iter_mut() {
                    if let Some(record) = entry.as_pending_mut() {
                        apply_id_remap(record, &mapping);
                        touched += 1;
                    }
                }
                touched
            })
            .await?;
        if touched > 0 {
            info!(
                "propagated id remap ({} ids) into {} pending record(s) for {}",
                event.mapping.len(),
                touched,
                event.player_id
            );
        }
        Ok(())
    }

    fn capture_inventory<P: ProfileProvider>(
        &self,
        player_id: &str,
        profiles: &P,
    ) -> Result<InventorySnapshot, RecordError> {
        let (root_id, items) = profiles
            .inventory_root(player_id)
            .map_err(|e| RecordError::InputUnavailable(e.to_string()))?;
        Ok(snapshot_inventory(&root_id, &items))
    }
}

/// Force-close every pending record as abandoned and archive it. Returns the
/// raid ids that were abandoned (normally zero or one).
fn abandon_pending<C: PriceCatalog>(entries: &mut Vec<RaidEntry>, catalog: &C) -> Vec<String> {
    let mut abandoned = Vec::new();
    for entry in entries.iter_mut() {
        if let Some(record) = entry.as_pending_mut() {
            record.status = RaidStatus::Abandoned;
            reconcile(record, catalog);
            abandoned.push(record.raid_id.clone());
            let archive = compress(record, catalog);
            *entry = RaidEntry::Archived(archive);
        }
    }
    abandoned
}

/// Build a best-effort record for a raid whose start was never seen.
fn synthesize_inferred(event: &RaidEnd) -> RaidRecord {
    let raid_id = event
        .raid_id
        .clone()
        .unwrap_or_else(|| format!("sandbox.{}", Uuid::new_v4().simple()));
    let elapsed = match event.outcome.play_time_secs {
        secs if secs > 0 => secs,
        _ => INFERRED_DEFAULT_ELAPSED_SECS,
    };
    let created_at = Utc::now() - Duration::seconds(elapsed);
    let mut record = RaidRecord::new(raid_id, event.player_id.clone(), event.side, created_at);
    record.status = RaidStatus::Inferred;
    record
}

/// Set the start-of-raid value fields from the begin inventory.
fn compute_entry_values<C: PriceCatalog>(record: &mut RaidRecord, catalog: &C) {
    let catalog_items: Vec<&ItemRecord> = record.begin_inventory.items().collect();
    record.entry_value = items_value_all(catalog_items.iter().copied(), catalog);
    record.equipment_value =
        items_value_with_base_classes(catalog_items.iter().copied(), EQUIPMENT_CLASSES, catalog);
    let secured = items_in_container(SLOT_SECURED_CONTAINER, &catalog_items);
    record.secured_value = items_value_all(secured.iter().copied(), catalog);
}

/// Diff the begin inventory against the end inventory and fill in the
/// added/removed/changed partition plus gross profit and combat losses.
///
/// With no end inventory (abandoned raids) the diff is empty and profit and
/// losses are zero. Zero is a legitimate value throughout: a raid where
/// nothing changed reports 0/0.
pub fn reconcile<C: PriceCatalog>(record: &mut RaidRecord, catalog: &C) {
    record.added.clear();
    record.removed.clear();
    record.changed.clear();
    record.gross_profit = 0;
    record.combat_losses = 0;

    let Some(end) = record.end_inventory.as_ref() else {
        return;
    };

    if record.begin_inventory.is_empty() && end.is_empty() {
        record.entry_value = 0;
        record.equipment_value = 0;
        record.secured_value = 0;
        return;
    }

    for (id, item) in record.begin_inventory.0.iter() {
        match end.get(id) {
            Some(after) => {
                if (after.quality_modifier - item.quality_modifier).abs() >= QUALITY_EPSILON {
                    record.changed.push(id.clone());
                }
            }
            None => record.removed.push(id.clone()),
        }
    }
    for id in end.ids() {
        if !record.begin_inventory.contains(id) {
            record.added.push(id.clone());
        }
    }

    let mut gross = items_value_filtered(end.items(), &record.added, catalog);
    let mut losses =
        items_value_filtered(record.begin_inventory.items(), &record.removed, catalog);

    for id in &record.changed {
        let Some(before) = record.begin_inventory.get(id) else {
            continue;
        };
        let Some(after) = end.get(id) else {
            warn!(
                "item {} marked changed but missing from end inventory",
                id
            );
            continue;
        };
        let old_value = item_value(before, catalog);
        let new_value = item_value(after, catalog);
        if new_value > old_value {
            gross += new_value - old_value;
        } else {
            losses += old_value - new_value;
        }
    }

    record.gross_profit = gross;
    record.combat_losses = losses;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::types::ItemRecord;
    use std::collections::HashMap;

    struct FlatCatalog(HashMap<String, f64>);

    impl FlatCatalog {
        fn new(pairs: &[(&str, f64)]) -> Self {
            Self(pairs.iter().map(|(t, p)| (t.to_string(), *p)).collect())
        }
    }

    impl PriceCatalog for FlatCatalog {
        fn price_of(&self, template_id: &str) -> Option<f64> {
            self.0.get(template_id).copied()
        }

        fn is_of_base_class(&self, _t: &str, _b: &[&str]) -> bool {
            false
        }

        fn is_valid_item(&self, template_id: &str) -> bool {
            self.0.contains_key(template_id)
        }
    }

    fn record(begin: Vec<ItemRecord>, end: Option<Vec<ItemRecord>>) -> RaidRecord {
        let mut rec = RaidRecord::new("woods.1", "p1", Side::Pmc, Utc::now());
        rec.begin_inventory = begin.into_iter().collect();
        rec.end_inventory = end.map(|items| items.into_iter().collect());
        rec
    }

    #[test]
    fn lost_item_counts_as_combat_loss() {
        let catalog = FlatCatalog::new(&[("tpl-weapon", 45_000.0)]);
        let mut rec = record(vec![ItemRecord::new("itemA", "tpl-weapon")], Some(vec![]));
        reconcile(&mut rec, &catalog);
        assert_eq!(rec.removed, ["itemA"]);
        assert!(rec.added.is_empty());
        assert_eq!(rec.gross_profit, 0);
        assert_eq!(rec.combat_losses, 45_000);
    }

    #[test]
    fn gained_item_counts_as_gross_profit() {
        let catalog = FlatCatalog::new(&[("tpl-ammo", 120.0)]);
        let mut rec = record(vec![], Some(vec![ItemRecord::new("itemB", "tpl-ammo")]));
        reconcile(&mut rec, &catalog);
        assert_eq!(rec.added, ["itemB"]);
        assert_eq!(rec.gross_profit, 120);
        assert_eq!(rec.combat_losses, 0);
    }

    #[test]
    fn durability_loss_lands_in_losses() {
        let catalog = FlatCatalog::new(&[("tpl-armor", 1000.0)]);
        let mut rec = record(
            vec![ItemRecord::new("armor", "tpl-armor").with_quality(0.9)],
            Some(vec![ItemRecord::new("armor", "tpl-armor").with_quality(0.3)]),
        );
        reconcile(&mut rec, &catalog);
        assert_eq!(rec.changed, ["armor"]);
        assert_eq!(rec.combat_losses, 600);
        assert_eq!(rec.gross_profit, 0);
    }

    #[test]
    fn sub_epsilon_quality_change_is_untouched() {
        let catalog = FlatCatalog::new(&[("tpl-armor", 1000.0)]);
        let mut rec = record(
            vec![ItemRecord::new("armor", "tpl-armor").with_quality(0.9)],
            Some(vec![
                ItemRecord::new("armor", "tpl-armor").with_quality(0.9 + 1e-9)
            ]),
        );
        reconcile(&mut rec, &catalog);
        assert!(rec.changed.is_empty());
        assert_eq!(rec.gross_profit, 0);
        assert_eq!(rec.combat_losses, 0);
    }

    #[test]
    fn unchanged_raid_reports_zero_not_sentinel() {
        let catalog = FlatCatalog::new(&[("tpl-gun", 500.0)]);
        let items = vec![ItemRecord::new("gun", "tpl-gun")];
        let mut rec = record(items.clone(), Some(items));
        reconcile(&mut rec, &catalog);
        assert_eq!(rec.gross_profit, 0);
        assert_eq!(rec.combat_losses, 0);
    }

    #[test]
    fn partition_covers_all_ids_disjointly() {
        let catalog = FlatCatalog::new(&[]);
        let mut rec = record(
            vec![
                ItemRecord::new("kept", "t"),
                ItemRecord::new("lost", "t"),
                ItemRecord::new("worn", "t").with_quality(1.0),
            ],
            Some(vec![
                ItemRecord::new("kept", "t"),
                ItemRecord::new("worn", "t").with_quality(0.5),
                ItemRecord::new("found", "t"),
            ]),
        );
        reconcile(&mut rec, &catalog);

        let mut all: Vec<&str> = Vec::new();
        all.extend(rec.added.iter().map(String::as_str));
        all.extend(rec.removed.iter().map(String::as_str));
        all.extend(rec.changed.iter().map(String::as_str));
        // "kept" is the only untouched id.
        assert_eq!(all.len(), 3);
        assert!(!all.contains(&"kept"));
        let unique: std::collections::HashSet<&str> = all.iter().copied().collect();
        assert_eq!(unique.len(), all.len(), "partition sets must be disjoint");
        let mut union: std::collections::HashSet<&str> = unique;
        union.insert("kept");
        let expected: std::collections::HashSet<&str> =
            ["kept", "lost", "worn", "found"].into_iter().collect();
        assert_eq!(union, expected);
    }

    #[test]
    fn no_end_inventory_degrades_to_zero() {
        let catalog = FlatCatalog::new(&[("tpl-gun", 500.0)]);
        let mut rec = record(vec![ItemRecord::new("gun", "tpl-gun")], None);
        rec.entry_value = 500;
        reconcile(&mut rec, &catalog);
        assert!(rec.added.is_empty() && rec.removed.is_empty() && rec.changed.is_empty());
        assert_eq!(rec.gross_profit, 0);
        assert_eq!(rec.combat_losses, 0);
        // Start-of-raid values survive the degraded path.
        assert_eq!(rec.entry_value, 500);
    }
}
