//! Neighbor data model and persistence.
//! Records live in SQLite; Neighbors that only exist in the pre-4.0 family
//! text files are found there and moved into the database on their next write.

pub mod entity;
pub mod errors;
pub mod item;
pub mod legacy;
pub mod leveling;
pub mod migration;
pub mod relational;
pub mod store;
pub mod types;

pub use entity::{LevelChange, Neighbor};
pub use errors::{NeighborError, StorageFault};
pub use item::{Item, NEVER_EXPIRES};
pub use legacy::{LegacyFiles, LegacyRecord};
pub use leveling::{level_from_xp, xp_threshold, xp_to_next_level};
pub use migration::{migrate_family_file, MigrationReport};
pub use relational::SqliteBackend;
pub use store::{DualStore, NeighborStore};
pub use types::{NeighborKey, NeighborRecord, Resolved, UNASSIGNED_FAMILY};
