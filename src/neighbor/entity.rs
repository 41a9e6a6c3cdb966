use chrono::Utc;

use crate::neighbor::errors::NeighborError;
use crate::neighbor::item::Item;
use crate::neighbor::leveling::level_from_xp;
use crate::neighbor::store::NeighborStore;
use crate::neighbor::types::{NeighborKey, Resolved};

/// Level before and after an XP grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelChange {
    pub xp: i64,
    pub before: i64,
    pub after: i64,
}

impl LevelChange {
    pub fn leveled_up(&self) -> bool {
        self.after > self.before
    }
}

/// A player as seen by the command layer. Holds no data of its own: every
/// accessor goes to the store, so two `Neighbor`s never share state.
pub struct Neighbor<'s, S: NeighborStore + ?Sized> {
    store: &'s S,
    key: NeighborKey,
}

impl<'s, S: NeighborStore + ?Sized> Neighbor<'s, S> {
    /// Neighbor looked up through the store's default family.
    pub fn new(store: &'s S, id: i64) -> Self {
        Self {
            store,
            key: NeighborKey::new(id),
        }
    }

    /// Neighbor the caller already places in `family`.
    pub fn in_family(store: &'s S, id: i64, family: i64) -> Self {
        Self {
            store,
            key: NeighborKey::in_family(id, family),
        }
    }

    pub fn id(&self) -> i64 {
        self.key.id
    }

    pub fn key(&self) -> &NeighborKey {
        &self.key
    }

    pub fn snapshot(&self) -> Result<Resolved, NeighborError> {
        self.store.get_or_default(&self.key)
    }

    pub fn xp(&self) -> Result<i64, NeighborError> {
        self.store.get_xp(&self.key)
    }

    pub fn set_xp(&self, xp: i64) -> Result<(), NeighborError> {
        self.store.set_xp(&self.key, xp)
    }

    /// Add `delta` XP and report the level transition.
    pub fn add_xp(&self, delta: i64) -> Result<LevelChange, NeighborError> {
        if delta < 0 {
            return Err(NeighborError::InvalidArgument(format!(
                "XP grants cannot be negative (got {delta})"
            )));
        }
        let current = self.xp()?;
        let xp = current.checked_add(delta).ok_or_else(|| {
            NeighborError::InvalidArgument(format!("XP overflow adding {delta} to {current}"))
        })?;
        self.set_xp(xp)?;
        Ok(LevelChange {
            xp,
            before: level_from_xp(current)?,
            after: level_from_xp(xp)?,
        })
    }

    pub fn level(&self) -> Result<i64, NeighborError> {
        level_from_xp(self.xp()?)
    }

    /// Levels are derived from XP; this always fails.
    pub fn set_level(&self, _level: i64) -> Result<(), NeighborError> {
        Err(NeighborError::UnsupportedOperation(
            "cannot directly set level; level is derived from XP".to_string(),
        ))
    }

    pub fn family(&self) -> Result<i64, NeighborError> {
        self.store.get_family(&self.key)
    }

    /// Persist a new family and follow it for later lookups.
    pub fn set_family(&mut self, family: i64) -> Result<(), NeighborError> {
        self.store.set_family(&self.key, family)?;
        self.key.family = Some(family);
        Ok(())
    }

    pub fn inventory(&self) -> Result<Vec<Item>, NeighborError> {
        self.store.get_inventory(&self.key)
    }

    pub fn set_inventory(&self, items: Vec<Item>) -> Result<(), NeighborError> {
        self.store.set_inventory(&self.key, items)
    }

    /// Add `item`, replacing any item with the same name.
    pub fn give_item(&self, item: Item) -> Result<(), NeighborError> {
        let mut inventory = self.inventory()?;
        inventory.push(item);
        self.set_inventory(inventory)
    }

    pub fn take_item(&self, name: &str) -> Result<Option<Item>, NeighborError> {
        let mut inventory = self.inventory()?;
        let Some(index) = inventory.iter().position(|item| item.name == name) else {
            return Ok(None);
        };
        let item = inventory.remove(index);
        self.set_inventory(inventory)?;
        Ok(Some(item))
    }

    pub fn purge_expired_items(&self) -> Result<Vec<Item>, NeighborError> {
        self.purge_expired_items_at(Utc::now().timestamp())
    }

    /// Drop items expired at `now`; returns what was removed. Nothing is
    /// written when no item has expired.
    pub fn purge_expired_items_at(&self, now: i64) -> Result<Vec<Item>, NeighborError> {
        let (expired, live): (Vec<Item>, Vec<Item>) = self
            .inventory()?
            .into_iter()
            .partition(|item| item.is_expired_at(now));
        if !expired.is_empty() {
            self.set_inventory(live)?;
        }
        Ok(expired)
    }
}
