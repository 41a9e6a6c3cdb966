// Bulk legacy migration
// Moves a whole family file into the relational backend in one pass instead of
// waiting for each Neighbor to be written.

use log::{info, warn};

use crate::logutil::preview_line;
use crate::neighbor::errors::NeighborError;
use crate::neighbor::legacy::LegacyRecord;
use crate::neighbor::store::DualStore;

/// Outcome of migrating one family file
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub migrated: usize,
    /// Lines whose Neighbor already had a database row; dropped from the file.
    pub already_migrated: usize,
    /// Valid lines belonging to another family; left in place.
    pub foreign: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

impl MigrationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_failure(&mut self, error: String) {
        self.failed += 1;
        self.errors.push(error);
    }

    /// Lines consumed by this pass (removed from the file unless dry-run).
    pub fn consumed(&self) -> usize {
        self.migrated + self.already_migrated
    }
}

/// Import every Neighbor in `family`'s legacy file that has no database row
/// yet. Lines that fail to decode, and lines of other families, stay in the
/// file. The file stays locked for the whole pass. With `dry_run` nothing is
/// written anywhere.
pub fn migrate_family_file(
    store: &DualStore,
    family: i64,
    dry_run: bool,
) -> Result<MigrationReport, NeighborError> {
    let mut report = MigrationReport::new();
    store.legacy().edit(family, |lines| {
        let mut kept = Vec::new();
        for (number, line) in lines.into_iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record = match LegacyRecord::decode(&line) {
                Ok(record) => record,
                Err(e) => {
                    warn!(
                        "Legacy family {} line {} not migrated: {} ({})",
                        family,
                        number + 1,
                        e,
                        preview_line(&line)
                    );
                    report.add_failure(format!("line {}: {}", number + 1, e));
                    kept.push(line);
                    continue;
                }
            };

            if !record.matches(record.id, family, store.default_family()) {
                report.foreign += 1;
                kept.push(line);
                continue;
            }

            if store.relational().contains(record.id)? {
                report.already_migrated += 1;
                continue;
            }

            if !dry_run {
                store.relational().save(&record.into_record(family))?;
            }
            report.migrated += 1;
        }
        Ok((!dry_run && report.consumed() > 0).then_some(kept))
    })?;

    info!(
        "Legacy family {}{}: {} migrated, {} already in database, {} foreign, {} failed",
        family,
        if dry_run { " (dry run)" } else { "" },
        report.migrated,
        report.already_migrated,
        report.foreign,
        report.failed
    );
    Ok(report)
}
