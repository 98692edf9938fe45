//! Item names and prices for loot callbacks.

use std::collections::HashMap;

use tracing::warn;

use crate::common::types::DroppedItem;
use crate::config::ItemConfig;

/// Name and unit price of an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemInfo {
    pub name: String,
    pub price: u64,
}

/// Lookup of item metadata by id.
pub trait ItemCatalog: Send + Sync {
    fn lookup(&self, id: u32) -> Option<ItemInfo>;

    /// Price one stack. Unknown items keep a placeholder name and no value.
    fn describe(&self, id: u32, quantity: u32) -> DroppedItem {
        match self.lookup(id) {
            Some(info) => DroppedItem {
                id,
                name: info.name,
                quantity,
                price: info.price,
            },
            None => DroppedItem {
                id,
                name: format!("Item {}", id),
                quantity,
                price: 0,
            },
        }
    }
}

/// Catalog built from the `items` configuration section.
#[derive(Debug, Clone, Default)]
pub struct ConfigItemCatalog {
    items: HashMap<u32, ItemInfo>,
}

impl ConfigItemCatalog {
    pub fn new(items: &HashMap<String, ItemConfig>) -> Self {
        let items = items
            .iter()
            .filter_map(|(id, item)| match id.trim().parse::<u32>() {
                Ok(id) => Some((
                    id,
                    ItemInfo {
                        name: item.name.clone(),
                        price: item.price,
                    },
                )),
                Err(_) => {
                    warn!("Ignoring item with non-numeric id '{}'", id);
                    None
                }
            })
            .collect();
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl ItemCatalog for ConfigItemCatalog {
    fn lookup(&self, id: u32) -> Option<ItemInfo> {
        self.items.get(&id).cloned()
    }
}
