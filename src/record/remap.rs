//! Identifier remap propagation.
//!
//! The host occasionally reassigns item instance ids mid-raid (insurance
//! resolution swaps items back under fresh ids). Any pending record still
//! holding the old ids must be rewritten before its next reconciliation, or
//! valuation would treat the renamed items as lost-and-gained.

use std::collections::{BTreeMap, HashMap};

use log::warn;

use crate::record::types::{InventorySnapshot, RaidRecord};

/// Rewrite every id reference inside `record` according to `mapping`.
///
/// Pure rename: cardinality and values never change. Unmapped ids and
/// identity mappings are no-ops, so applying the same mapping twice is safe.
/// If two old ids collide on one new id the last write wins and a warning is
/// the only observable effect.
pub fn apply_id_remap(record: &mut RaidRecord, mapping: &HashMap<String, String>) {
    remap_snapshot(&mut record.begin_inventory, mapping);
    if let Some(end) = record.end_inventory.as_mut() {
        remap_snapshot(end, mapping);
    }
    for list in [&mut record.added, &mut record.removed, &mut record.changed] {
        for id in list.iter_mut() {
            if let Some(new_id) = mapping.get(id) {
                if new_id != id {
                    *id = new_id.clone();
                }
            }
        }
    }
}

fn remap_snapshot(snapshot: &mut InventorySnapshot, mapping: &HashMap<String, String>) {
    let old = std::mem::take(&mut snapshot.0);
    let mut rebuilt: BTreeMap<String, crate::record::types::ItemRecord> = BTreeMap::new();
    for (id, mut item) in old {
        let key = match mapping.get(&id) {
            Some(new_id) if new_id != &id => {
                item.id = new_id.clone();
                new_id.clone()
            }
            _ => id,
        };
        // Parent links use the same id space and must follow the rename.
        if let Some(parent) = item.parent_id.as_mut() {
            if let Some(new_parent) = mapping.get(parent) {
                if new_parent != parent {
                    *parent = new_parent.clone();
                }
            }
        }
        if rebuilt.insert(key.clone(), item).is_some() {
            warn!("id remap collision on {}, keeping last write", key);
        }
    }
    snapshot.0 = rebuilt;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::types::{ItemRecord, RaidStatus, Side};
    use chrono::Utc;

    fn record_with(items: Vec<ItemRecord>) -> RaidRecord {
        let mut record = RaidRecord::new("factory.1", "p1", Side::Pmc, Utc::now());
        record.begin_inventory = items.into_iter().collect();
        record
    }

    fn mapping(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect()
    }

    #[test]
    fn renames_keys_items_and_lists() {
        let mut record = record_with(vec![
            ItemRecord::new("old-1", "tpl-a"),
            ItemRecord::new("kid", "tpl-b").with_parent("old-1"),
        ]);
        record.added = vec!["old-1".into()];
        apply_id_remap(&mut record, &mapping(&[("old-1", "new-1")]));

        assert!(record.begin_inventory.contains("new-1"));
        assert!(!record.begin_inventory.contains("old-1"));
        assert_eq!(record.begin_inventory.get("new-1").unwrap().id, "new-1");
        assert_eq!(
            record.begin_inventory.get("kid").unwrap().parent_id.as_deref(),
            Some("new-1")
        );
        assert_eq!(record.added, ["new-1"]);
    }

    #[test]
    fn applying_twice_is_idempotent() {
        let mut once = record_with(vec![ItemRecord::new("a", "tpl")]);
        once.removed = vec!["a".into()];
        let map = mapping(&[("a", "b")]);
        apply_id_remap(&mut once, &map);
        let mut twice = once.clone();
        apply_id_remap(&mut twice, &map);
        assert_eq!(once, twice);
    }

    #[test]
    fn identity_and_unmapped_ids_untouched() {
        let mut record = record_with(vec![
            ItemRecord::new("same", "tpl"),
            ItemRecord::new("other", "tpl"),
        ]);
        apply_id_remap(&mut record, &mapping(&[("same", "same")]));
        assert!(record.begin_inventory.contains("same"));
        assert!(record.begin_inventory.contains("other"));
        assert_eq!(record.status, RaidStatus::Pending);
    }

    #[test]
    fn collision_keeps_last_write_without_panicking() {
        let mut record = record_with(vec![
            ItemRecord::new("a", "tpl-a"),
            ItemRecord::new("b", "tpl-b"),
        ]);
        apply_id_remap(&mut record, &mapping(&[("a", "x"), ("b", "x")]));
        assert_eq!(record.begin_inventory.len(), 1);
        assert!(record.begin_inventory.contains("x"));
    }
}
