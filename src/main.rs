//! Binary entrypoint for the raidledger CLI.
//!
//! Commands:
//! - `init` - create a starter `config.toml`
//! - `status` - summarize the record store (players, pending, archived)
//! - `list --player <id>` - list a player's archived raids
//! - `show --player <id> (--raid <id> | --index <n>)` - dump one archive as JSON
//! - `recheck --player <id> (--raid <id> | --index <n> | --all)` - re-verify
//!   profit/loss numbers against the offline price catalog
//!
//! See the library crate docs for module-level details: `raidledger::`.
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::info;

use raidledger::config::Config;
use raidledger::host::JsonPriceCatalog;
use raidledger::record::{archive, ArchiveSelector, RecordStore};

#[derive(Parser)]
#[command(name = "raidledger")]
#[command(about = "Raid history ledger for local match servers")]
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
    /// Initialize a new configuration file
    Init,
    /// Show record store status and statistics
    Status,
    /// List a player's archived raids
    List {
        /// Player id (profile id)
        #[arg(short, long)]
        player: String,
        /// Maximum number of rows
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Print one archived raid as pretty JSON
    Show {
        /// Player id (profile id)
        #[arg(short, long)]
        player: String,
        /// Raid id to select
        #[arg(short, long)]
        raid: Option<String>,
        /// Index into the created-at-ordered archive list
        #[arg(short, long)]
        index: Option<usize>,
    },
    /// Re-verify archived profit/loss numbers against the price catalog
    Recheck {
        /// Player id (profile id)
        #[arg(short, long)]
        player: String,
        /// Raid id to select
        #[arg(short, long)]
        raid: Option<String>,
        /// Index into the created-at-ordered archive list
        #[arg(short, long)]
        index: Option<usize>,
        /// Recheck every archive of the player
        #[arg(short, long)]
        all: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Init writes the config this would load, so skip the early load for it.
    let pre_config = match cli.command {
        Commands::Init => None,
        _ => Config::load(&cli.config).await.ok(),
    };
    init_logging(&pre_config, cli.verbose);

    match cli.command {
        Commands::Init => {
            if tokio::fs::try_exists(&cli.config).await.unwrap_or(false) {
                return Err(anyhow!(
                    "{} already exists, refusing to overwrite",
                    cli.config
                ));
            }
            Config::create_default(&cli.config).await?;
            println!("Wrote default configuration to {}", cli.config);
            Ok(())
        }
        Commands::Status => {
            let config = require_config(pre_config, &cli.config)?;
            let mut store = RecordStore::open(&config.ledger.data_dir).await?;
            let players = store.list_players().await?;
            println!("Data directory: {}", config.ledger.data_dir);
            println!("Players with records: {}", players.len());
            let mut pending = 0usize;
            let mut archived = 0usize;
            for player in &players {
                for entry in store.entries(player).await? {
                    if entry.is_pending() {
                        pending += 1;
                    } else {
                        archived += 1;
                    }
                }
            }
            println!("Pending records: {}", pending);
            println!("Archived records: {}", archived);
            Ok(())
        }
        Commands::List { player, limit } => {
            let config = require_config(pre_config, &cli.config)?;
            let mut store = RecordStore::open(&config.ledger.data_dir).await?;
            let archives = store.list_archives(&player).await?;
            if archives.is_empty() {
                println!("No archived raids for {}", player);
                return Ok(());
            }
            println!("index | raid | created | entry | gross | losses | status");
            for (index, archive) in archives.iter().take(limit).enumerate() {
                println!(
                    "{} | {} | {} | {} | {} | {} | {}",
                    index,
                    archive.raid_id,
                    archive.created_at.format("%Y-%m-%d %H:%M:%S"),
                    archive.entry_value,
                    archive.gross_profit,
                    archive.combat_losses,
                    archive.status
                );
            }
            Ok(())
        }
        Commands::Show {
            player,
            raid,
            index,
        } => {
            let config = require_config(pre_config, &cli.config)?;
            let mut store = RecordStore::open(&config.ledger.data_dir).await?;
            let selector = selector_from(raid, index)?;
            let archive = store.get_archive(&player, &selector).await?;
            println!("{}", serde_json::to_string_pretty(&archive)?);
            Ok(())
        }
        Commands::Recheck {
            player,
            raid,
            index,
            all,
        } => {
            let config = require_config(pre_config, &cli.config)?;
            let mut store = RecordStore::open(&config.ledger.data_dir).await?;
            let catalog_path = std::path::Path::new(&config.ledger.data_dir).join("catalog.json");
            let catalog = JsonPriceCatalog::load(&catalog_path).await?;
            if catalog.is_empty() {
                return Err(anyhow!(
                    "price catalog {} is empty, recheck would zero every archive",
                    catalog_path.display()
                ));
            }

            let selectors: Vec<ArchiveSelector> = if all {
                let count = store.list_archives(&player).await?.len();
                (0..count).map(ArchiveSelector::Index).collect()
            } else {
                vec![selector_from(raid, index)?]
            };

            let mut corrected = 0usize;
            for selector in &selectors {
                let report = store
                    .update_archive(&player, selector, |archive| {
                        archive::recheck(archive, &catalog)
                    })
                    .await?;
                if report.corrected {
                    corrected += 1;
                    println!(
                        "{}: gross {} -> {}, losses {} -> {}",
                        selector,
                        report.old_gross_profit,
                        report.new_gross_profit,
                        report.old_combat_losses,
                        report.new_combat_losses
                    );
                }
            }
            info!(
                "rechecked {} archive(s) for {}, corrected {}",
                selectors.len(),
                player,
                corrected
            );
            println!("Rechecked {}, corrected {}", selectors.len(), corrected);
            Ok(())
        }
    }
}

fn require_config(pre_config: Option<Config>, path: &str) -> Result<Config> {
    pre_config.ok_or_else(|| anyhow!("could not load {}, run 'raidledger init' first", path))
}

fn selector_from(raid: Option<String>, index: Option<usize>) -> Result<ArchiveSelector> {
    match (raid, index) {
        (Some(raid), _) => Ok(ArchiveSelector::RaidId(raid)),
        (None, Some(index)) => Ok(ArchiveSelector::Index(index)),
        (None, None) => Err(anyhow!("need either --raid <id> or --index <n>")),
    }
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|c| c.logging.level.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(level);
    let _ = builder.try_init();
}
