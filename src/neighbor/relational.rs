//! SQLite backend. Authoritative for every Neighbor it holds a row for.
//!
//! Each operation opens its own connection and drops it before returning, so
//! no handle outlives a single property access.
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};

use crate::neighbor::errors::NeighborError;
use crate::neighbor::item::Item;
use crate::neighbor::types::NeighborRecord;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS Neighbors (
        ID INTEGER PRIMARY KEY,
        XP INTEGER NOT NULL DEFAULT 0,
        FAMILY INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS Items (
        NeighborID INTEGER NOT NULL REFERENCES Neighbors(ID) ON DELETE CASCADE,
        POSITION INTEGER NOT NULL,
        NAME TEXT NOT NULL,
        TYPE TEXT NOT NULL,
        EXPIRATION INTEGER NOT NULL,
        ATTRIBUTES TEXT NOT NULL DEFAULT '{}',
        PRIMARY KEY (NeighborID, NAME)
    );
    CREATE INDEX IF NOT EXISTS idx_items_neighbor ON Items(NeighborID, POSITION);
";

#[derive(Debug, Clone)]
pub struct SqliteBackend {
    path: PathBuf,
}

impl SqliteBackend {
    /// Point at the database at `path`, creating the file and schema if needed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, NeighborError> {
        let backend = Self { path: path.into() };
        if let Some(parent) = backend.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        backend.init_schema()?;
        Ok(backend)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection, NeighborError> {
        let conn = Connection::open(&self.path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }

    pub fn init_schema(&self) -> Result<(), NeighborError> {
        self.connect()?.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Full record for `id`, or `None` when the database has no row.
    pub fn load(&self, id: i64) -> Result<Option<NeighborRecord>, NeighborError> {
        let conn = self.connect()?;
        let row = conn.query_row(
            "SELECT n.XP, n.FAMILY FROM Neighbors n WHERE n.ID = ?1",
            [id],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
        );
        let (xp, family) = match row {
            Ok(values) => values,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let inventory = load_items(&conn, id)?;
        Ok(Some(NeighborRecord {
            id,
            family,
            xp,
            inventory,
        }))
    }

    pub fn contains(&self, id: i64) -> Result<bool, NeighborError> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM Neighbors WHERE ID = ?1",
            [id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn count(&self) -> Result<i64, NeighborError> {
        let conn = self.connect()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM Neighbors", [], |row| row.get(0))?)
    }

    /// Upsert the row and replace all items in one transaction.
    pub fn save(&self, record: &NeighborRecord) -> Result<(), NeighborError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO Neighbors (ID, XP, FAMILY) VALUES (?1, ?2, ?3)
             ON CONFLICT(ID) DO UPDATE SET XP = excluded.XP, FAMILY = excluded.FAMILY",
            params![record.id, record.xp, record.family],
        )?;
        write_items(&tx, record.id, &record.inventory)?;
        tx.commit()?;
        Ok(())
    }

    pub fn update_xp(&self, id: i64, xp: i64) -> Result<(), NeighborError> {
        self.connect()?.execute(
            "UPDATE Neighbors SET XP = ?1 WHERE ID = ?2",
            params![xp, id],
        )?;
        Ok(())
    }

    pub fn update_family(&self, id: i64, family: i64) -> Result<(), NeighborError> {
        self.connect()?.execute(
            "UPDATE Neighbors SET FAMILY = ?1 WHERE ID = ?2",
            params![family, id],
        )?;
        Ok(())
    }

    pub fn replace_items(&self, id: i64, items: &[Item]) -> Result<(), NeighborError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        write_items(&tx, id, items)?;
        tx.commit()?;
        Ok(())
    }
}

fn load_items(conn: &Connection, id: i64) -> Result<Vec<Item>, NeighborError> {
    let mut stmt = conn.prepare(
        "SELECT i.NAME, i.TYPE, i.EXPIRATION, i.ATTRIBUTES FROM Items i
         WHERE i.NeighborID = ?1 ORDER BY i.POSITION",
    )?;
    let rows = stmt
        .query_map([id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(name, kind, expiration, attributes)| -> Result<Item, NeighborError> {
            let values = serde_json::from_str(&attributes).map_err(|e| {
                NeighborError::Format(format!(
                    "attributes of item '{name}' (neighbor {id}) are not a JSON object of strings: {e}"
                ))
            })?;
            let mut item = Item::new(name, kind, expiration);
            item.values = values;
            Ok(item)
        })
        .collect()
}

fn write_items(conn: &Connection, id: i64, items: &[Item]) -> Result<(), NeighborError> {
    conn.execute("DELETE FROM Items WHERE NeighborID = ?1", [id])?;
    let mut stmt = conn.prepare(
        "INSERT INTO Items (NeighborID, POSITION, NAME, TYPE, EXPIRATION, ATTRIBUTES)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for (position, item) in items.iter().enumerate() {
        let attributes = serde_json::to_string(&item.values)?;
        stmt.execute(params![
            id,
            position as i64,
            item.name,
            item.kind,
            item.expiration,
            attributes
        ])?;
    }
    Ok(())
}
