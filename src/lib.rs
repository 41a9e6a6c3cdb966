//! # Neighbors - Player persistence for the Neighbors bot
//!
//! Stores what the bot knows about each Neighbor (player): experience points,
//! the level derived from them, the family (cohort) they belong to, and an
//! inventory of time-limited items.
//!
//! ## Features
//!
//! - **Leveling Curve**: Memoized cumulative XP thresholds and level lookup.
//! - **Items**: Inventory entries with expiration and free-form attributes, plus
//!   the single-line text encoding used by older bot versions.
//! - **Dual Backend**: SQLite is authoritative; Neighbors missing from it are
//!   looked up in the legacy per-family text files and moved over on their next write.
//! - **Bulk Migration**: One-shot import of a whole legacy family file.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use neighbors::config::Config;
//! use neighbors::neighbor::{DualStore, Neighbor};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let store = DualStore::from_config(&config)?;
//!
//!     let neighbor = Neighbor::in_family(&store, 42, 7);
//!     let change = neighbor.add_xp(250)?;
//!     if change.leveled_up() {
//!         println!("Neighbor 42 reached level {}", change.after);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`neighbor`] - Data model, leveling, backends and the `Neighbor` facade
//! - [`config`] - Configuration loading and validation
//! - [`logutil`] - Log formatting helpers
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │    Neighbor     │ ← Accessors used by the command layer
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │   DualStore     │ ← Resolution and write-through migration
//! └─────────────────┘
//!     │          │
//! ┌────────┐ ┌──────────────┐
//! │ SQLite │ │ Legacy files │
//! └────────┘ └──────────────┘
//! ```

pub mod config;
pub mod logutil;
pub mod neighbor;
