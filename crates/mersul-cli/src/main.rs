use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mersul_client::InfoferOrigin;
use mersul_core::schema::{self, SchemaKind, TrainSchemaVersion};
use mersul_core::{KnowledgeStore, ScrapeService, ServiceConfig};

#[derive(Parser)]
#[command(name = "mersul", version, about = "CFR train and station timetables as JSON")]
struct Cli {
    /// Directory of the knowledge store
    #[arg(long, global = true, env = "DB_DIR")]
    db_dir: Option<PathBuf>,

    /// Base URL used in the `$schema` field of printed documents
    #[arg(
        long,
        global = true,
        env = "MERSUL_PUBLIC_URL",
        default_value = "http://localhost:5000"
    )]
    schema_base: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape a train's itinerary and live status
    Train {
        /// Train number, e.g. 1538
        number: String,

        /// Look up the service that started yesterday
        #[arg(long, default_value_t = false)]
        yesterday: bool,

        /// Service date (YYYY-MM-DD); wins over --yesterday
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Print the legacy layout with H:MM schedule times
        #[arg(long, default_value_t = false)]
        v1: bool,
    },

    /// Scrape a station's departures and arrivals
    Station {
        /// Station name, e.g. "Brașov"
        name: String,

        /// Board date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Search itineraries between two stations
    Itineraries {
        /// Departure station, e.g. "Cluj Napoca"
        from: String,

        /// Arrival station, e.g. "Brașov"
        to: String,

        /// Departure date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// List every train recorded in the knowledge store
    Trains,

    /// List every station recorded in the knowledge store, busiest first
    Stations,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr so stdout stays pure JSON
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("mersul=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = ServiceConfig::from_env()?;
    if let Some(dir) = cli.db_dir {
        config.db_dir = dir;
    }
    let store = KnowledgeStore::open(config.db_dir.clone())
        .with_context(|| format!("Failed to open store at {}", config.db_dir.display()))?;

    match cli.command {
        Commands::Train {
            number,
            yesterday,
            date,
            v1,
        } => {
            let version = if v1 {
                TrainSchemaVersion::V1
            } else {
                TrainSchemaVersion::V2
            };
            let service = scrape_service(store, &config)?;
            cmd_train(&service, &number, yesterday, date, version, &cli.schema_base).await?;
        }
        Commands::Station { name, date } => {
            let service = scrape_service(store, &config)?;
            cmd_station(&service, &name, date, &cli.schema_base).await?;
        }
        Commands::Itineraries { from, to, date } => {
            let service = scrape_service(store, &config)?;
            cmd_itineraries(&service, &from, &to, date, &cli.schema_base).await?;
        }
        Commands::Trains => print_json(&store.trains())?,
        Commands::Stations => print_json(&store.stations())?,
    }

    Ok(())
}

fn scrape_service(
    store: KnowledgeStore,
    config: &ServiceConfig,
) -> Result<ScrapeService<InfoferOrigin>> {
    let origin = InfoferOrigin::from_env().context("Failed to configure origin")?;
    Ok(ScrapeService::new(origin, store, config))
}

async fn cmd_train(
    service: &ScrapeService<InfoferOrigin>,
    number: &str,
    yesterday: bool,
    date: Option<NaiveDate>,
    version: TrainSchemaVersion,
    schema_base: &str,
) -> Result<()> {
    let cached = service
        .train(number, yesterday, date)
        .await
        .with_context(|| format!("Failed to scrape train {number}"))?;

    let record = &cached.value;
    tracing::info!(
        rank = %record.rank,
        date = %record.date,
        stops = record.stations.len(),
        "Scraped train {}",
        record.number
    );

    let document = schema::train_document(record, version, &version.kind().url(schema_base))?;
    print_json(&document)
}

async fn cmd_station(
    service: &ScrapeService<InfoferOrigin>,
    name: &str,
    date: Option<NaiveDate>,
    schema_base: &str,
) -> Result<()> {
    let cached = service
        .station(name, date)
        .await
        .with_context(|| format!("Failed to scrape station {name}"))?;

    let record = &cached.value;
    tracing::info!(
        departures = record.departures.as_ref().map_or(0, Vec::len),
        arrivals = record.arrivals.as_ref().map_or(0, Vec::len),
        "Scraped station {}",
        record.station_name
    );

    let document = schema::station_document(record, &SchemaKind::StationV2.url(schema_base))?;
    print_json(&document)
}

async fn cmd_itineraries(
    service: &ScrapeService<InfoferOrigin>,
    from: &str,
    to: &str,
    date: Option<NaiveDate>,
    schema_base: &str,
) -> Result<()> {
    let cached = service
        .itineraries(from, to, date)
        .await
        .with_context(|| format!("Failed to search itineraries from {from} to {to}"))?;

    let record = &cached.value;
    tracing::info!(
        date = %record.date,
        count = record.itineraries.len(),
        "Found itineraries from {} to {}",
        record.from,
        record.to
    );

    let document =
        schema::itineraries_document(record, &SchemaKind::ItinerariesV3.url(schema_base))?;
    print_json(&document)
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
