//! Legacy flat-file backend (bot versions 2.x and 3.x).
//!
//! Each family owns one text file with one Neighbor per line:
//!
//! ```text
//! ID;FAMILY;XP;LEGACY_XP;INVENTORY
//! ```
//!
//! `INVENTORY` is everything after the fourth `;` and holds zero or more
//! [`Item`] encodings joined by `|`. [`Item::encode`] strips the delimiter
//! characters from item text, so a written line always decodes back.
//!
//! The format has no random access, so removing a record rewrites the whole
//! file. Every read-modify-write holds one exclusive advisory lock from the
//! read to the rename of the replacement; readers take the lock shared.
//! Processes that ignore the `.<file>.lock` sidecar get no protection.
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use log::{debug, warn};

use crate::logutil::preview_line;
use crate::neighbor::errors::NeighborError;
use crate::neighbor::item::Item;
use crate::neighbor::types::{normalize_inventory, NeighborRecord, UNASSIGNED_FAMILY};

/// Separator between items inside the inventory segment.
pub const ITEM_SEPARATOR: &str = "|";

/// Placeholder replaced by the family id in file name templates.
pub const FAMILY_PLACEHOLDER: &str = "{family}";

/// One decoded legacy line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyRecord {
    pub id: i64,
    pub family: i64,
    pub xp: i64,
    /// Pre-4.0 season XP. Round-trips through the file but has no relational column.
    pub legacy_xp: i64,
    pub inventory: Vec<Item>,
}

impl LegacyRecord {
    pub fn encode(&self) -> String {
        let inventory = self
            .inventory
            .iter()
            .map(Item::encode)
            .collect::<Vec<_>>()
            .join(ITEM_SEPARATOR);
        format!(
            "{};{};{};{};{}",
            self.id, self.family, self.xp, self.legacy_xp, inventory
        )
    }

    pub fn decode(line: &str) -> Result<Self, NeighborError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let fields: Vec<&str> = line.splitn(5, ';').collect();
        if fields.len() < 4 {
            return Err(NeighborError::Format(format!(
                "neighbor line needs at least 4 fields, found {}",
                fields.len()
            )));
        }
        let id = parse_field(fields[0], "id")?;
        let family = parse_field(fields[1], "family")?;
        let xp = parse_xp(fields[2], "xp")?;
        let legacy_xp = parse_xp(fields[3], "legacy xp")?;

        let inventory = match fields.get(4) {
            Some(blob) if !blob.is_empty() => blob
                .split(ITEM_SEPARATOR)
                .filter(|segment| !segment.is_empty())
                .map(Item::decode)
                .collect::<Result<Vec<_>, _>>()?,
            _ => Vec::new(),
        };
        // Older bot versions could append an item twice; the last copy wins.
        let inventory = normalize_inventory(inventory)?;

        Ok(Self {
            id,
            family,
            xp,
            legacy_xp,
            inventory,
        })
    }

    /// Whether this line belongs to `id` as seen from `family`. Lines written
    /// before families existed carry family 0 and belong to the default family.
    pub fn matches(&self, id: i64, family: i64, default_family: Option<i64>) -> bool {
        self.id == id
            && (self.family == family
                || (self.family == UNASSIGNED_FAMILY && default_family == Some(family)))
    }

    /// Convert into a relational record, giving unassigned lines `family`.
    pub fn into_record(self, family: i64) -> NeighborRecord {
        NeighborRecord {
            id: self.id,
            family: if self.family == UNASSIGNED_FAMILY {
                family
            } else {
                self.family
            },
            xp: self.xp,
            inventory: self.inventory,
        }
    }
}

fn parse_field(raw: &str, what: &str) -> Result<i64, NeighborError> {
    raw.trim()
        .parse()
        .map_err(|_| NeighborError::Format(format!("{what} '{raw}' is not an integer")))
}

fn parse_xp(raw: &str, what: &str) -> Result<i64, NeighborError> {
    let value = parse_field(raw, what)?;
    if value < 0 {
        return Err(NeighborError::Format(format!("{what} cannot be negative (got {value})")));
    }
    Ok(value)
}

/// Directory of per-family legacy files.
#[derive(Debug, Clone)]
pub struct LegacyFiles {
    dir: PathBuf,
    template: String,
}

impl LegacyFiles {
    pub fn new(dir: impl Into<PathBuf>, template: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            template: template.into(),
        }
    }

    pub fn path_for(&self, family: i64) -> PathBuf {
        self.dir
            .join(self.template.replace(FAMILY_PLACEHOLDER, &family.to_string()))
    }

    /// Raw lines of a family file. A missing file means "no legacy data".
    pub fn read_lines(&self, family: i64) -> Result<Vec<String>, NeighborError> {
        let path = self.path_for(family);
        let _lock = match FamilyLock::acquire(&path, false) {
            Ok(lock) => lock,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(read_content(&path)?
            .map(|content| content.lines().map(str::to_string).collect())
            .unwrap_or_default())
    }

    /// First line in `family`'s file that matches `id`. Malformed lines are
    /// logged and skipped.
    pub fn find(
        &self,
        id: i64,
        family: i64,
        default_family: Option<i64>,
    ) -> Result<Option<LegacyRecord>, NeighborError> {
        for (number, line) in self.read_lines(family)?.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match LegacyRecord::decode(line) {
                Ok(record) if record.matches(id, family, default_family) => {
                    debug!(
                        "legacy hit for neighbor {} in family {} file (line {})",
                        id,
                        family,
                        number + 1
                    );
                    return Ok(Some(record));
                }
                Ok(_) => {}
                Err(e) => warn!(
                    "Skipping malformed line {} in {}: {} ({})",
                    number + 1,
                    self.path_for(family).display(),
                    e,
                    preview_line(line)
                ),
            }
        }
        Ok(None)
    }

    /// Drop every line matching `id` from `family`'s file. Other lines,
    /// malformed ones included, are kept verbatim. Returns whether anything
    /// was removed; the file is only rewritten in that case.
    pub fn remove(
        &self,
        id: i64,
        family: i64,
        default_family: Option<i64>,
    ) -> Result<bool, NeighborError> {
        self.edit(family, |lines| {
            let before = lines.len();
            let kept: Vec<String> = lines
                .into_iter()
                .filter(|line| {
                    !matches!(
                        LegacyRecord::decode(line),
                        Ok(record) if record.matches(id, family, default_family)
                    )
                })
                .collect();
            Ok((kept.len() != before).then_some(kept))
        })
    }

    /// Read-modify-write of `family`'s file under one exclusive lock.
    ///
    /// `f` receives the current lines (empty when the file does not exist)
    /// and returns the replacement, or `None` to leave the file untouched.
    /// Returns whether the file was rewritten.
    pub fn edit<F>(&self, family: i64, f: F) -> Result<bool, NeighborError>
    where
        F: FnOnce(Vec<String>) -> Result<Option<Vec<String>>, NeighborError>,
    {
        let path = self.path_for(family);
        let _lock = match FamilyLock::acquire(&path, true) {
            Ok(lock) => lock,
            // No directory: there is no file to edit and nowhere to create one.
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return match f(Vec::new())? {
                    Some(lines) if !lines.is_empty() => Err(e.into()),
                    _ => Ok(false),
                };
            }
            Err(e) => return Err(e.into()),
        };
        let lines = read_content(&path)?
            .map(|content| content.lines().map(str::to_string).collect())
            .unwrap_or_default();
        match f(lines)? {
            Some(kept) => {
                replace_file(&path, &join_lines(&kept))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Replace the content of `family`'s file with `lines`.
    pub fn rewrite(&self, family: i64, lines: &[String]) -> Result<(), NeighborError> {
        let path = self.path_for(family);
        let _lock = FamilyLock::acquire(&path, true)?;
        replace_file(&path, &join_lines(lines))
    }
}

fn join_lines(lines: &[String]) -> String {
    let mut content = lines.join("\n");
    if !content.is_empty() {
        content.push('\n');
    }
    content
}

/// Whole content of `path`, or `None` when it does not exist.
fn read_content(path: &Path) -> std::io::Result<Option<String>> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    Ok(Some(content))
}

/// Advisory lock for one family file.
///
/// Held on a hidden `.<file>.lock` sibling rather than the data file itself:
/// rewrites rename a new inode into place, and a lock on the old inode would
/// not exclude writers that open the path afterwards. Released on drop.
struct FamilyLock {
    file: File,
}

impl FamilyLock {
    fn acquire(path: &Path, exclusive: bool) -> std::io::Result<Self> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let base = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("neighbors.txt");
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(dir.join(format!(".{}.lock", base)))?;
        if exclusive {
            file.lock_exclusive()?;
        } else {
            file.lock_shared()?;
        }
        Ok(Self { file })
    }
}

impl Drop for FamilyLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Write `content` to a sibling temp file and rename it over `path`. The
/// temp file is removed on every failure path. Callers hold the family lock.
fn replace_file(path: &Path, content: &str) -> Result<(), NeighborError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let base = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("neighbors.txt");
    let mut counter = 0u32;
    let (tmp_path, mut tmp) = loop {
        let candidate = dir.join(format!(".{}.tmp-{}-{}", base, std::process::id(), counter));
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(file) => break (candidate, file),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                counter = counter.saturating_add(1);
            }
            Err(e) => return Err(e.into()),
        }
    };

    let written = tmp
        .write_all(content.as_bytes())
        .and_then(|_| tmp.flush())
        .and_then(|_| tmp.sync_all());
    drop(tmp);
    if let Err(e) = written.and_then(|_| fs::rename(&tmp_path, path)) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    if let Ok(dir_file) = File::open(dir) {
        let _ = dir_file.sync_all();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> LegacyRecord {
        LegacyRecord {
            id: 42,
            family: 7,
            xp: 950,
            legacy_xp: 120,
            inventory: vec![
                Item::never_expires("Sword", "weapon").with_value("damage", "12"),
                Item::new("Potion", "consumable", 1_700_000_000),
            ],
        }
    }

    #[test]
    fn line_layout() {
        assert_eq!(
            sample().encode(),
            "42;7;950;120;Sword;weapon;-1;damage=12|Potion;consumable;1700000000;"
        );
    }

    #[test]
    fn line_round_trips() {
        let record = sample();
        assert_eq!(LegacyRecord::decode(&record.encode()).unwrap(), record);

        let empty = LegacyRecord {
            inventory: Vec::new(),
            ..sample()
        };
        assert_eq!(LegacyRecord::decode(&empty.encode()).unwrap(), empty);
    }

    #[test]
    fn decode_tolerates_missing_inventory_and_crlf() {
        let record = LegacyRecord::decode("5;0;300;10\r\n").unwrap();
        assert_eq!(record.id, 5);
        assert_eq!(record.family, 0);
        assert!(record.inventory.is_empty());
    }

    #[test]
    fn decode_rejects_bad_numbers_and_items() {
        assert!(matches!(
            LegacyRecord::decode("abc;7;1;0;"),
            Err(NeighborError::Format(_))
        ));
        assert!(matches!(
            LegacyRecord::decode("1;7;1"),
            Err(NeighborError::Format(_))
        ));
        assert!(matches!(
            LegacyRecord::decode("1;7;1;0;Sword;weapon;never;"),
            Err(NeighborError::Format(_))
        ));
    }

    #[test]
    fn decode_rejects_negative_xp() {
        for line in ["43;7;-50;0;", "43;7;50;-1;"] {
            assert!(
                matches!(LegacyRecord::decode(line), Err(NeighborError::Format(_))),
                "{line} should not decode"
            );
        }
    }

    #[test]
    fn decode_collapses_duplicate_item_names() {
        let record =
            LegacyRecord::decode("42;7;100;0;Sword;weapon;-1;damage=1|Map;quest;-1;|Sword;weapon;-1;damage=9")
                .unwrap();
        let names: Vec<&str> = record.inventory.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Sword", "Map"]);
        assert_eq!(record.inventory[0].get_value("damage").unwrap(), "9");
    }

    #[test]
    fn matching_honours_default_family() {
        let unassigned = LegacyRecord {
            family: 0,
            ..sample()
        };
        assert!(unassigned.matches(42, 7, Some(7)));
        assert!(!unassigned.matches(42, 7, Some(8)));
        assert!(!unassigned.matches(42, 7, None));
        assert!(sample().matches(42, 7, None));
        assert!(!sample().matches(42, 8, Some(8)));
        assert!(!sample().matches(43, 7, None));
    }

    #[test]
    fn unassigned_lines_take_the_lookup_family() {
        let record = LegacyRecord {
            family: 0,
            ..sample()
        }
        .into_record(7);
        assert_eq!(record.family, 7);
        assert_eq!(record.xp, 950);
    }

    #[test]
    fn path_uses_template() {
        let files = LegacyFiles::new("/srv/legacy", "neighbors_{family}.txt");
        assert_eq!(
            files.path_for(12),
            PathBuf::from("/srv/legacy/neighbors_12.txt")
        );
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = TempDir::new().expect("tempdir");
        let files = LegacyFiles::new(dir.path(), "neighbors_{family}.txt");
        assert!(files.read_lines(3).unwrap().is_empty());
        assert!(files.find(1, 3, None).unwrap().is_none());
        assert!(!files.remove(1, 3, None).unwrap());
    }

    #[test]
    fn find_skips_malformed_lines() {
        let dir = TempDir::new().expect("tempdir");
        let files = LegacyFiles::new(dir.path(), "neighbors_{family}.txt");
        std::fs::write(
            files.path_for(7),
            "garbage line\n\n42;7;950;0;Sword;weapon;-1;\n",
        )
        .unwrap();
        let found = files.find(42, 7, None).unwrap().expect("record");
        assert_eq!(found.xp, 950);
        assert_eq!(found.inventory.len(), 1);
    }

    #[test]
    fn remove_keeps_other_lines_verbatim() {
        let dir = TempDir::new().expect("tempdir");
        let files = LegacyFiles::new(dir.path(), "neighbors_{family}.txt");
        std::fs::write(
            files.path_for(7),
            "1;7;10;0;\nnot a record\n42;7;950;0;\n2;7;20;0;\n",
        )
        .unwrap();

        assert!(files.remove(42, 7, None).unwrap());
        let content = std::fs::read_to_string(files.path_for(7)).unwrap();
        assert_eq!(content, "1;7;10;0;\nnot a record\n2;7;20;0;\n");

        assert!(!files.remove(42, 7, None).unwrap());
    }

    #[test]
    fn find_skips_negative_xp_lines() {
        let dir = TempDir::new().expect("tempdir");
        let files = LegacyFiles::new(dir.path(), "neighbors_{family}.txt");
        std::fs::write(files.path_for(7), "43;7;-50;0;\n").unwrap();
        assert!(files.find(43, 7, None).unwrap().is_none());
    }

    #[test]
    fn edit_without_changes_leaves_file_alone() {
        let dir = TempDir::new().expect("tempdir");
        let files = LegacyFiles::new(dir.path(), "neighbors_{family}.txt");
        std::fs::write(files.path_for(7), "1;7;10;0;").unwrap();
        let rewritten = files
            .edit(7, |lines| {
                assert_eq!(lines, vec!["1;7;10;0;".to_string()]);
                Ok(None)
            })
            .unwrap();
        assert!(!rewritten);
        assert_eq!(std::fs::read_to_string(files.path_for(7)).unwrap(), "1;7;10;0;");
    }

    #[test]
    fn edit_in_missing_directory_is_a_no_op() {
        let dir = TempDir::new().expect("tempdir");
        let files = LegacyFiles::new(dir.path().join("absent"), "neighbors_{family}.txt");
        assert!(!files.remove(1, 7, None).unwrap());
        assert!(files.read_lines(7).unwrap().is_empty());
    }

    #[test]
    fn concurrent_edits_do_not_lose_lines() {
        let dir = TempDir::new().expect("tempdir");
        let files = LegacyFiles::new(dir.path(), "neighbors_{family}.txt");
        std::thread::scope(|scope| {
            for worker in 0..4i64 {
                let files = &files;
                scope.spawn(move || {
                    for n in 0..25i64 {
                        files
                            .edit(7, |mut lines| {
                                lines.push(format!("{};7;{};0;", worker * 100 + n, n));
                                Ok(Some(lines))
                            })
                            .unwrap();
                    }
                });
            }
        });
        assert_eq!(files.read_lines(7).unwrap().len(), 100);
    }

    #[test]
    fn failed_rewrite_removes_temp_file() {
        let dir = TempDir::new().expect("tempdir");
        let files = LegacyFiles::new(dir.path(), "neighbors_{family}.txt");
        // A directory in place of the family file makes the final rename fail.
        std::fs::create_dir(files.path_for(7)).unwrap();

        let err = files.rewrite(7, &["1;7;10;0;".to_string()]).unwrap_err();
        assert!(matches!(err, NeighborError::StorageUnavailable(_)));
        let leftovers: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| name.contains(".tmp-"))
            .collect();
        assert!(leftovers.is_empty(), "temp files left behind: {leftovers:?}");
    }
}
