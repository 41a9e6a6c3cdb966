//! Binary entrypoint for the Neighbors CLI.
//!
//! Commands:
//! - `init` - write a starter `config.toml` and create the database schema
//! - `show <id> [--family <f>] [--json]` - print a Neighbor and where it was found
//! - `set-xp <id> <xp>` / `add-xp <id> <delta>` - change XP
//! - `set-family <id> <family>` - move a Neighbor to another family
//! - `levels [--up-to <n>]` - print the XP threshold table
//! - `migrate --family <f> [--dry-run]` - import a whole legacy family file
//!
//! See the library crate docs for module-level details: `neighbors::`.
use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;

use neighbors::config::Config;
use neighbors::neighbor::{
    level_from_xp, migrate_family_file, xp_threshold, xp_to_next_level, DualStore, Neighbor,
    SqliteBackend,
};

#[derive(Parser)]
#[command(name = "neighbors")]
#[command(about = "Inspect and maintain Neighbor player records")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a default configuration file and the database schema
    Init,
    /// Show a Neighbor's XP, level, family and inventory
    Show {
        id: i64,
        /// Family the Neighbor is expected in (defaults to the configured default family)
        #[arg(short, long)]
        family: Option<i64>,
        /// Print the record as JSON
        #[arg(long)]
        json: bool,
    },
    /// Overwrite a Neighbor's XP
    SetXp {
        id: i64,
        xp: i64,
        #[arg(short, long)]
        family: Option<i64>,
    },
    /// Grant XP to a Neighbor
    AddXp {
        id: i64,
        delta: i64,
        #[arg(short, long)]
        family: Option<i64>,
    },
    /// Assign a Neighbor to a family
    SetFamily {
        id: i64,
        family: i64,
        /// Family the Neighbor is currently in
        #[arg(long)]
        from: Option<i64>,
    },
    /// Print cumulative XP thresholds
    Levels {
        #[arg(long, default_value_t = 20)]
        up_to: i64,
    },
    /// Move every Neighbor of a legacy family file into the database
    Migrate {
        #[arg(short, long)]
        family: i64,
        /// Report what would happen without writing anything
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            init_logging(&None, cli.verbose);
            info!("Initializing new Neighbors configuration");
            let config = Config::default();
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
            tokio::fs::create_dir_all(&config.storage.legacy_dir).await?;
            let backend = SqliteBackend::open(&config.storage.database_path)?;
            info!("Database schema ready at {}", backend.path().display());
        }
        Commands::Show { id, family, json } => {
            let store = open_store(&cli.config, cli.verbose).await?;
            let neighbor = neighbor_for(&store, id, family);
            let resolved = neighbor.snapshot()?;
            let record = resolved.record();
            if json {
                println!("{}", serde_json::to_string_pretty(record)?);
                return Ok(());
            }
            println!("Neighbor {} ({})", record.id, resolved.source());
            println!(
                "  XP: {}  Level: {}  Next level in: {} XP",
                record.xp,
                level_from_xp(record.xp)?,
                xp_to_next_level(record.xp)?
            );
            println!("  Family: {}", record.family);
            if record.inventory.is_empty() {
                println!("  Inventory: (empty)");
            } else {
                println!("  Inventory:");
                for item in &record.inventory {
                    println!("    - {} [{}]", item, item.kind);
                }
            }
        }
        Commands::SetXp { id, xp, family } => {
            let store = open_store(&cli.config, cli.verbose).await?;
            neighbor_for(&store, id, family).set_xp(xp)?;
            println!("Neighbor {} now has {} XP.", id, xp);
        }
        Commands::AddXp { id, delta, family } => {
            let store = open_store(&cli.config, cli.verbose).await?;
            let change = neighbor_for(&store, id, family).add_xp(delta)?;
            println!("Neighbor {} now has {} XP.", id, change.xp);
            if change.leveled_up() {
                println!("Level up! {} -> {}", change.before, change.after);
            }
        }
        Commands::SetFamily { id, family, from } => {
            let store = open_store(&cli.config, cli.verbose).await?;
            let mut neighbor = neighbor_for(&store, id, from);
            neighbor.set_family(family)?;
            println!("Neighbor {} moved to family {}.", id, family);
        }
        Commands::Levels { up_to } => {
            for level in 1..=up_to.max(1) {
                println!("{:>4} {:>12}", level, xp_threshold(level)?);
            }
        }
        Commands::Migrate { family, dry_run } => {
            let store = open_store(&cli.config, cli.verbose).await?;
            let report = migrate_family_file(&store, family, dry_run)?;
            println!(
                "Family {}{}: {} migrated, {} already in database, {} other family, {} failed",
                family,
                if dry_run { " (dry run)" } else { "" },
                report.migrated,
                report.already_migrated,
                report.foreign,
                report.failed
            );
            for error in &report.errors {
                println!("  {}", error);
            }
        }
    }

    Ok(())
}

/// Load config, start logging and open both backends.
async fn open_store(config_path: &str, verbosity: u8) -> Result<DualStore> {
    let config = Config::load(config_path).await?;
    init_logging(&Some(config.clone()), verbosity);
    Ok(DualStore::from_config(&config)?)
}

fn neighbor_for(store: &DualStore, id: i64, family: Option<i64>) -> Neighbor<'_, DualStore> {
    match family {
        Some(family) => Neighbor::in_family(store, id, family),
        None => Neighbor::new(store, id),
    }
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let base_level = match (verbosity, config) {
        (0, Some(cfg)) => cfg.log_level(),
        (0, None) => log::LevelFilter::Info,
        (1, _) => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config
        .as_ref()
        .and_then(|cfg| cfg.logging.file.as_ref())
        .and_then(|file| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
                .ok()
        });

    if let Some(f) = log_file {
        let file = std::sync::Mutex::new(f);
        // Foreground runs also echo to the console
        let is_tty = atty::is(atty::Stream::Stdout);
        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());
            if let Ok(mut guard) = file.lock() {
                let _ = writeln!(guard, "{}", line);
            }
            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
        });
    }
    let _ = builder.try_init();
}
