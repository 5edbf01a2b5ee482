use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use fishwiki_rs::config::Config;
use fishwiki_rs::engine::catalog::ChangeHook;
use fishwiki_rs::engine::database::Database;
use fishwiki_rs::engine::imaging::{self, ImageSpec};
use fishwiki_rs::engine::records::RecordKind;
use fishwiki_rs::engine::wiki::Wiki;
use fishwiki_rs::remote::events::{self as weekly, WeeklyEvent};
use fishwiki_rs::remote::settings::{self, GuideText, SharedSettings};
use fishwiki_rs::remote::DocumentStore;

#[derive(Parser)]
#[command(name = "headless", version, about = "Fish wiki catalog tools without the terminal UI")]
struct Cli {
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the cards of one catalog
    List {
        kind: RecordKind,
        #[arg(long, default_value = "ALL")]
        category: String,
        #[arg(long, default_value = "")]
        query: String,
    },
    /// Write a catalog as JSON to stdout
    Export { kind: RecordKind },
    /// Replace a catalog with the JSON array in a file
    Import { kind: RecordKind, file: PathBuf },
    /// Process an image and print it as a data URI
    Image {
        path: PathBuf,
        #[arg(long)]
        banner: bool,
        #[arg(long)]
        pixel_art: bool,
    },
    /// Show the shared settings from the remote store
    Settings,
    /// Replace the shared guide text with the contents of a file
    SetGuide { file: PathBuf },
    /// Merge a shared setting document (guide, shopLinks, foodCategories,
    /// tackleRates) from a JSON file
    SetSetting { doc: String, file: PathBuf },
    /// List weekly events, newest first
    Events,
    /// Create a weekly event from a JSON file, or update it with --id
    SaveEvent {
        file: PathBuf,
        #[arg(long)]
        id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load_or_create(&cli.config)?;

    env_logger::Builder::new().filter_level(config.log_level()).init();
    tracing::subscriber::set_global_default(
        tracing_subscriber::fmt().with_max_level(tracing_level(&config)).with_writer(std::io::stderr).finish(),
    )?;

    match cli.command {
        Command::List { kind, category, query } => {
            let wiki = Wiki::load(&Database::new(&config.storage.db_path).await?, None).await?;
            for card in wiki.view(kind, &category, &query) {
                println!("{:<10} {:<28} {:<12} {}", card.id, card.title, card.badge, card.summary);
            }
        }
        Command::Export { kind } => {
            let wiki = Wiki::load(&Database::new(&config.storage.db_path).await?, None).await?;
            println!("{}", wiki.export(kind)?);
        }
        Command::Import { kind, file } => {
            let blob = tokio::fs::read_to_string(&file).await?;
            let db = Arc::new(Database::new(&config.storage.db_path).await?);
            let (tx, rx) = mpsc::unbounded_channel();
            let writer = db.clone().spawn_writer(rx);

            let mut wiki = Wiki::load(&db, Some(ChangeHook::new(tx))).await?;
            wiki.set_dev_mode(true);
            let count = wiki.import(kind, &blob)?;
            drop(wiki);
            writer.await?;

            if let Some(e) = db.last_error() {
                bail!("import was not saved: {}", e);
            }
            info!("Imported {} {} records from {}", count, kind, file.display());
        }
        Command::Image { path, banner, pixel_art } => {
            let spec = if banner {
                ImageSpec::banner(config.images.banner_max_dimension, config.images.jpeg_quality)
            } else {
                ImageSpec::icon(config.images.icon_size)
            };
            let processed = imaging::process_file(&path, &spec.pixel_art(pixel_art || (!banner && config.images.pixel_art)))?;
            info!("{} -> {}x{}", path.display(), processed.width, processed.height);
            println!("{}", processed.data_uri);
        }
        Command::Settings => {
            let settings = SharedSettings::load_all(&remote_store(&config)?).await?;
            println!("== Guide ==\n{}\n", settings.guide.content);
            println!("== Shop links ==");
            for link in &settings.shop_links.links {
                println!("{:<24} {}", link.title, link.url);
            }
            println!("\n== Food categories ==");
            for (id, category) in &settings.food_categories.categories {
                println!("{:<12} {}", id, category);
            }
            println!("\n== Tackle rates ==");
            for row in &settings.tackle_rates.rows {
                let cells = row.rates.iter().map(|(k, v)| format!("{}={}", k, v)).collect::<Vec<_>>().join(" ");
                println!("{:<12} {}", row.tier, cells);
            }
        }
        Command::SetGuide { file } => {
            let content = tokio::fs::read_to_string(&file).await?;
            settings::save(&remote_store(&config)?, &GuideText { content }).await?;
            info!("Guide updated from {}", file.display());
        }
        Command::SetSetting { doc, file } => {
            let json = tokio::fs::read_to_string(&file).await?;
            settings::save_from_json(&remote_store(&config)?, &doc, &json).await?;
            info!("Setting {} updated from {}", doc, file.display());
        }
        Command::SaveEvent { file, id } => {
            let json = tokio::fs::read_to_string(&file).await?;
            let mut event: WeeklyEvent = serde_json::from_str(&json)?;
            event.id = id.unwrap_or_default();
            let id = weekly::save_event(&remote_store(&config)?, &event).await?;
            println!("{}", id);
        }
        Command::Events => {
            let now = chrono::Utc::now();
            for event in weekly::list_events(&remote_store(&config)?).await? {
                let span = |d: Option<chrono::DateTime<chrono::Utc>>| d.map(|d| d.to_rfc3339()).unwrap_or_else(|| "?".into());
                println!(
                    "{} {:<20} {} .. {} x{} {}",
                    if event.is_active(now) { "*" } else { " " },
                    event.id,
                    span(event.start_date),
                    span(event.end_date),
                    event.rate_multiplier,
                    event.title
                );
            }
        }
    }

    Ok(())
}

fn remote_store(config: &Config) -> Result<DocumentStore> {
    if !config.remote.enabled {
        bail!("remote store is disabled; set remote.enabled = true in the config");
    }
    Ok(DocumentStore::new(&config.remote)?)
}

fn tracing_level(config: &Config) -> tracing::Level {
    if config.system.debug { tracing::Level::DEBUG } else { tracing::Level::INFO }
}
