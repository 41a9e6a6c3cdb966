use serde::{Deserialize, Serialize};

use crate::neighbor::errors::NeighborError;
use crate::neighbor::item::Item;

/// Reserved family value: "no record found" or "not yet assigned". Never persisted.
pub const UNASSIGNED_FAMILY: i64 = 0;

/// The caller's view of a Neighbor: its identity plus the family the caller
/// believes it belongs to. `family: None` falls back to the deployment's
/// configured default family when a legacy file has to be consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NeighborKey {
    pub id: i64,
    pub family: Option<i64>,
}

impl NeighborKey {
    pub fn new(id: i64) -> Self {
        Self { id, family: None }
    }

    pub fn in_family(id: i64, family: i64) -> Self {
        Self {
            id,
            family: Some(family),
        }
    }
}

/// Plain snapshot of everything stored for one Neighbor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborRecord {
    pub id: i64,
    pub family: i64,
    pub xp: i64,
    #[serde(default)]
    pub inventory: Vec<Item>,
}

impl NeighborRecord {
    /// Defaults handed out for an identity nobody has written yet.
    pub fn fresh(id: i64) -> Self {
        Self {
            id,
            family: UNASSIGNED_FAMILY,
            xp: 0,
            inventory: Vec::new(),
        }
    }
}

/// Where a lookup found its answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// Row present in the relational backend; authoritative.
    Relational(NeighborRecord),
    /// Only present in the legacy file of `source_family`; migrates on next write.
    Legacy {
        record: NeighborRecord,
        source_family: i64,
    },
    /// Unknown identity; defaults, nothing persisted.
    Fresh(NeighborRecord),
}

impl Resolved {
    pub fn record(&self) -> &NeighborRecord {
        match self {
            Resolved::Relational(record)
            | Resolved::Legacy { record, .. }
            | Resolved::Fresh(record) => record,
        }
    }

    pub fn into_record(self) -> NeighborRecord {
        match self {
            Resolved::Relational(record)
            | Resolved::Legacy { record, .. }
            | Resolved::Fresh(record) => record,
        }
    }

    pub fn needs_migration(&self) -> bool {
        matches!(self, Resolved::Legacy { .. })
    }

    pub fn source(&self) -> &'static str {
        match self {
            Resolved::Relational(_) => "database",
            Resolved::Legacy { .. } => "legacy file",
            Resolved::Fresh(_) => "new",
        }
    }
}

/// Validate an inventory and collapse duplicate names. The first occurrence
/// keeps its position, the last occurrence supplies the item.
pub fn normalize_inventory(items: Vec<Item>) -> Result<Vec<Item>, NeighborError> {
    let mut out: Vec<Item> = Vec::with_capacity(items.len());
    for item in items {
        if item.name.is_empty() {
            return Err(NeighborError::InvalidArgument(
                "item name cannot be empty".to_string(),
            ));
        }
        match out.iter_mut().find(|existing| existing.name == item.name) {
            Some(existing) => *existing = item,
            None => out.push(item),
        }
    }
    Ok(out)
}
