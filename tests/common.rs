//! Test utilities & fixtures.
//! Builds a `DualStore` over a temp dir laid out like a real deployment.

use std::path::PathBuf;

use neighbors::neighbor::{DualStore, LegacyFiles, SqliteBackend};

pub const TEMPLATE: &str = "neighbors_{family}.txt";

/// Fresh store rooted in `tmp`: `players.db` plus an empty `legacy/` dir.
pub fn store_in(tmp: &tempfile::TempDir, default_family: Option<i64>) -> DualStore {
    let relational = SqliteBackend::open(tmp.path().join("players.db")).expect("open db");
    let legacy_dir = tmp.path().join("legacy");
    std::fs::create_dir_all(&legacy_dir).expect("legacy dir");
    DualStore::new(
        relational,
        LegacyFiles::new(legacy_dir, TEMPLATE),
        default_family,
    )
}

/// Path of `family`'s legacy file inside `tmp`.
pub fn legacy_path(tmp: &tempfile::TempDir, family: i64) -> PathBuf {
    tmp.path()
        .join("legacy")
        .join(format!("neighbors_{}.txt", family))
}

/// Seed a legacy family file with `content`.
#[allow(dead_code)] // Not every test binary seeds legacy data.
pub fn write_legacy(tmp: &tempfile::TempDir, family: i64, content: &str) {
    std::fs::write(legacy_path(tmp, family), content).expect("write legacy file");
}
