//! Monetary valuation of items and item sets.
//!
//! All prices come from the host's [`PriceCatalog`]; an unknown price is a
//! valuation gap, not an error, and contributes 0. A handful of slots and
//! parents are deterministically excluded: their contents are either
//! non-tradeable or accounting-neutral and would distort entry value.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::host::PriceCatalog;
use crate::record::types::ItemRecord;

/// Slot whose contents survive the raid regardless of outcome.
pub const SLOT_SECURED_CONTAINER: &str = "SecuredContainer";
/// Fixed blade sheath; the knife in it is never lost and never sold.
pub const SLOT_SCABBARD: &str = "Scabbard";
/// Dog-tag slot.
pub const SLOT_DOGTAG: &str = "Dogtag";

/// Template id of the pockets base item. Pocket containers themselves can
/// carry a price in the catalog and must not count toward entry value.
pub const POCKETS_BASE_ID: &str = "557596e64bdc2dc2118b4571";
/// Instance id of the synthetic default/root inventory slot.
pub const DEFAULT_ROOT_SLOT_ID: &str = "68e2c9a23d4d3dc9e403545f";
/// Template id of the default inventory item; its instance id varies per
/// profile and is resolved from the item list when present.
pub const DEFAULT_INVENTORY_TPL: &str = "55d7217a4bdc2d86028b456d";

/// Base classes counted as "equipment" for the equipment-value breakdown:
/// weapons, armor, rigs, backpacks and every attachment family. Closed set,
/// mirrored from the host's class table.
pub const EQUIPMENT_CLASSES: &[&str] = &[
    "weapon",
    "ubgl",
    "armor",
    "armored-equipment",
    "headwear",
    "face-cover",
    "vest",
    "backpack",
    "visors",
    "gas-block",
    "rail-cover",
    "mod",
    "functional-mod",
    "gear-mod",
    "stock",
    "foregrip",
    "master-mod",
    "mount",
    "muzzle",
    "sights",
    "assault-scope",
    "tactical-combo",
    "flashlight",
    "magazine",
    "light-laser-designator",
    "flash-hider",
    "collimator",
    "iron-sight",
    "compact-collimator",
    "compensator",
    "optic-scope",
    "special-scope",
    "silencer",
    "auxiliary-mod",
    "bipod",
    "built-in-inserts",
    "armor-plate",
    "handguard",
    "pistol-grip",
    "receiver",
    "barrel",
    "charging-handle",
    "combined-muzzle-device",
];

/// Value of a single item: catalog price scaled by the quality modifier,
/// clamped at zero. Excluded slots and parents always value to 0.
pub fn item_value<C: PriceCatalog>(item: &ItemRecord, catalog: &C) -> i64 {
    if matches!(
        item.slot.as_deref(),
        Some(SLOT_SECURED_CONTAINER) | Some(SLOT_SCABBARD) | Some(SLOT_DOGTAG)
    ) {
        return 0;
    }
    if matches!(
        item.parent_id.as_deref(),
        Some(POCKETS_BASE_ID) | Some(DEFAULT_ROOT_SLOT_ID)
    ) {
        return 0;
    }
    let Some(price) = catalog.price_of(&item.template_id) else {
        debug!("no price for template {}", item.template_id);
        return 0;
    };
    (item.quality_modifier.max(0.0) * price).round() as i64
}

/// Total value of an item list, excluding anything parented directly to the
/// default root slot (prevents counting the root container twice).
pub fn items_value_all<'a, C, I>(items: I, catalog: &C) -> i64
where
    C: PriceCatalog,
    I: IntoIterator<Item = &'a ItemRecord> + Clone,
{
    let root_slot_id = items
        .clone()
        .into_iter()
        .find(|i| i.template_id == DEFAULT_INVENTORY_TPL)
        .map(|i| i.id.as_str())
        .unwrap_or(DEFAULT_ROOT_SLOT_ID);
    items
        .into_iter()
        .filter(|i| i.parent_id.as_deref() != Some(root_slot_id))
        .map(|i| item_value(i, catalog))
        .sum()
}

/// Total value of the subset of `items` matched by id. Consumes the
/// iterator once, so any `impl Iterator` source works.
pub fn items_value_filtered<'a, C, I>(items: I, filter: &[String], catalog: &C) -> i64
where
    C: PriceCatalog,
    I: IntoIterator<Item = &'a ItemRecord>,
{
    let wanted: HashSet<&str> = filter.iter().map(String::as_str).collect();
    let selected: Vec<&ItemRecord> = items
        .into_iter()
        .filter(|i| wanted.contains(i.id.as_str()))
        .collect();
    items_value_all(selected.iter().copied(), catalog)
}

/// Total value of items belonging to any of the given base classes.
pub fn items_value_with_base_classes<'a, C, I>(
    items: I,
    base_classes: &[&str],
    catalog: &C,
) -> i64
where
    C: PriceCatalog,
    I: IntoIterator<Item = &'a ItemRecord> + Clone,
{
    let selected: Vec<&ItemRecord> = items
        .into_iter()
        .filter(|i| catalog.is_of_base_class(&i.template_id, base_classes))
        .collect();
    items_value_all(selected.iter().copied(), catalog)
}

/// All items whose nearest ancestor sits in the named container slot.
///
/// Walks `parent_id` upward until a parent in `slot_name` is found or the
/// chain dead-ends. Inventory trees are assumed acyclic.
pub fn items_in_container<'a>(slot_name: &str, items: &'a [&'a ItemRecord]) -> Vec<&'a ItemRecord> {
    let by_id: HashMap<&str, &ItemRecord> =
        items.iter().map(|i| (i.id.as_str(), *i)).collect();
    let mut found: Vec<&ItemRecord> = Vec::new();
    let mut pushed: HashSet<&str> = HashSet::new();

    for item in items {
        let mut current: &ItemRecord = item;
        while let Some(parent_id) = current.parent_id.as_deref() {
            let Some(parent) = by_id.get(parent_id) else {
                break;
            };
            if parent.slot.as_deref() == Some(slot_name) {
                if pushed.insert(item.id.as_str()) {
                    found.push(item);
                }
                break;
            }
            current = parent;
        }
    }
    found
}

/// Count of valid, priceable items (used for raid-start log lines).
pub fn valid_item_count<'a, C, I>(items: I, catalog: &C) -> usize
where
    C: PriceCatalog,
    I: IntoIterator<Item = &'a ItemRecord>,
{
    items
        .into_iter()
        .filter(|i| {
            catalog.is_valid_item(&i.template_id)
                && i.parent_id.as_deref() != Some(DEFAULT_ROOT_SLOT_ID)
        })
        .count()
}
