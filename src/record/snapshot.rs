//! Inventory snapshotting: turn a player's live inventory tree into a flat,
//! defensively copied id -> item map.

use std::collections::{HashMap, HashSet};

use log::warn;

use crate::record::types::{InventorySnapshot, ItemRecord};

/// Capture a snapshot of everything hanging off `root_id`.
///
/// `items` is the host's flat list of all items owned by the inventory,
/// possibly deeply nested via `parent_id` chains. The result contains the
/// root container (when present in the list) plus every transitive child,
/// each cloned so later live mutations cannot touch the snapshot.
///
/// Items that cannot be captured (empty id, duplicate id) are logged and
/// skipped; a bad item never aborts the whole snapshot. An empty inventory
/// yields an empty snapshot.
pub fn snapshot_inventory(root_id: &str, items: &[ItemRecord]) -> InventorySnapshot {
    let mut snapshot = InventorySnapshot::new();
    if items.is_empty() {
        return snapshot;
    }

    let mut children: HashMap<&str, Vec<&ItemRecord>> = HashMap::new();
    for item in items {
        if let Some(parent) = item.parent_id.as_deref() {
            children.entry(parent).or_default().push(item);
        }
    }

    let mut skipped = 0usize;
    let mut seen: HashSet<&str> = HashSet::new();
    let mut queue: Vec<&ItemRecord> = Vec::new();

    if let Some(root) = items.iter().find(|i| i.id == root_id) {
        queue.push(root);
    } else if let Some(direct) = children.get(root_id) {
        // Root container itself not in the list; start from its children.
        queue.extend(direct.iter().copied());
    }

    while let Some(item) = queue.pop() {
        if item.id.is_empty() {
            skipped += 1;
            continue;
        }
        if !seen.insert(item.id.as_str()) {
            skipped += 1;
            continue;
        }
        let mut copy = item.clone();
        if copy.quantity == 0 {
            warn!(
                "item {} ({}) has zero quantity, clamping to 1",
                copy.id, copy.template_id
            );
            copy.quantity = 1;
        }
        snapshot.insert(copy);
        if let Some(kids) = children.get(item.id.as_str()) {
            queue.extend(kids.iter().copied());
        }
    }

    if skipped > 0 {
        warn!("snapshot of {} skipped {} uncopyable item(s)", root_id, skipped);
    }
    snapshot
}
