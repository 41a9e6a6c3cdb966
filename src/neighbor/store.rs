//! Dual-backend Neighbor store.
//!
//! Reads consult the relational backend first and fall back to the legacy
//! family file; writes always land in the relational backend and strip the
//! legacy line so a record never lives in both places.
use log::{debug, info};

use crate::config::Config;
use crate::neighbor::errors::NeighborError;
use crate::neighbor::item::Item;
use crate::neighbor::legacy::LegacyFiles;
use crate::neighbor::relational::SqliteBackend;
use crate::neighbor::types::{
    normalize_inventory, NeighborKey, NeighborRecord, Resolved, UNASSIGNED_FAMILY,
};

/// Storage contract behind the [`Neighbor`](crate::neighbor::Neighbor) facade.
///
/// Implementors only need the tagged lookup and the three writers; the plain
/// getters are derived from [`NeighborStore::get_or_default`].
pub trait NeighborStore {
    /// Resolve `key` without persisting anything.
    fn get_or_default(&self, key: &NeighborKey) -> Result<Resolved, NeighborError>;

    fn set_xp(&self, key: &NeighborKey, xp: i64) -> Result<(), NeighborError>;

    fn set_family(&self, key: &NeighborKey, family: i64) -> Result<(), NeighborError>;

    fn set_inventory(&self, key: &NeighborKey, items: Vec<Item>) -> Result<(), NeighborError>;

    fn get_xp(&self, key: &NeighborKey) -> Result<i64, NeighborError> {
        Ok(self.get_or_default(key)?.record().xp)
    }

    fn get_family(&self, key: &NeighborKey) -> Result<i64, NeighborError> {
        Ok(self.get_or_default(key)?.record().family)
    }

    fn get_inventory(&self, key: &NeighborKey) -> Result<Vec<Item>, NeighborError> {
        Ok(self.get_or_default(key)?.into_record().inventory)
    }
}

enum Change {
    Xp(i64),
    Family(i64),
    Inventory(Vec<Item>),
}

impl Change {
    fn apply_to(self, record: &mut NeighborRecord) {
        match self {
            Change::Xp(xp) => record.xp = xp,
            Change::Family(family) => record.family = family,
            Change::Inventory(items) => record.inventory = items,
        }
    }
}

/// SQLite first, legacy family files second.
#[derive(Debug, Clone)]
pub struct DualStore {
    relational: SqliteBackend,
    legacy: LegacyFiles,
    default_family: Option<i64>,
}

impl DualStore {
    pub fn new(relational: SqliteBackend, legacy: LegacyFiles, default_family: Option<i64>) -> Self {
        Self {
            relational,
            legacy,
            default_family,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, NeighborError> {
        let relational = SqliteBackend::open(&config.storage.database_path)?;
        let legacy = LegacyFiles::new(
            &config.storage.legacy_dir,
            config.storage.legacy_file_template.clone(),
        );
        Ok(Self::new(
            relational,
            legacy,
            config.families.default_family,
        ))
    }

    pub fn relational(&self) -> &SqliteBackend {
        &self.relational
    }

    pub fn legacy(&self) -> &LegacyFiles {
        &self.legacy
    }

    pub fn default_family(&self) -> Option<i64> {
        self.default_family
    }

    /// Family whose legacy file is consulted for `key`.
    fn lookup_family(&self, key: &NeighborKey) -> Option<i64> {
        key.family.or(self.default_family)
    }

    fn write(&self, key: &NeighborKey, change: Change) -> Result<(), NeighborError> {
        let lookup_family = self.lookup_family(key);
        match self.get_or_default(key)? {
            Resolved::Relational(_) => match change {
                Change::Xp(xp) => self.relational.update_xp(key.id, xp)?,
                Change::Family(family) => self.relational.update_family(key.id, family)?,
                Change::Inventory(items) => self.relational.replace_items(key.id, &items)?,
            },
            Resolved::Legacy { mut record, .. } | Resolved::Fresh(mut record) => {
                change.apply_to(&mut record);
                if record.family == UNASSIGNED_FAMILY {
                    record.family = lookup_family.ok_or_else(|| {
                        NeighborError::InvalidState(format!(
                            "neighbor {} has no family and no default family is configured",
                            key.id
                        ))
                    })?;
                }
                self.relational.save(&record)?;
                debug!(
                    "saved neighbor {} (family {}) to the database",
                    record.id, record.family
                );
            }
        }

        if let Some(family) = lookup_family {
            if self.legacy.remove(key.id, family, self.default_family)? {
                info!(
                    "Migrated neighbor {} out of legacy family {} file",
                    key.id, family
                );
            }
        }
        Ok(())
    }
}

impl NeighborStore for DualStore {
    fn get_or_default(&self, key: &NeighborKey) -> Result<Resolved, NeighborError> {
        if let Some(record) = self.relational.load(key.id)? {
            return Ok(Resolved::Relational(record));
        }
        if let Some(family) = self.lookup_family(key) {
            if let Some(line) = self.legacy.find(key.id, family, self.default_family)? {
                debug!(
                    "neighbor {} resolved from legacy family {} file",
                    key.id, family
                );
                return Ok(Resolved::Legacy {
                    record: line.into_record(family),
                    source_family: family,
                });
            }
        }
        Ok(Resolved::Fresh(NeighborRecord::fresh(key.id)))
    }

    fn set_xp(&self, key: &NeighborKey, xp: i64) -> Result<(), NeighborError> {
        if xp < 0 {
            return Err(NeighborError::InvalidArgument(format!(
                "XP cannot be lower than 0 (got {xp})"
            )));
        }
        self.write(key, Change::Xp(xp))
    }

    fn set_family(&self, key: &NeighborKey, family: i64) -> Result<(), NeighborError> {
        if family == UNASSIGNED_FAMILY {
            return Err(NeighborError::InvalidState(format!(
                "family can't be {UNASSIGNED_FAMILY}"
            )));
        }
        self.write(key, Change::Family(family))
    }

    fn set_inventory(&self, key: &NeighborKey, items: Vec<Item>) -> Result<(), NeighborError> {
        let items = normalize_inventory(items)?;
        self.write(key, Change::Inventory(items))
    }
}
