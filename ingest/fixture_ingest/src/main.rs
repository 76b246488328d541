use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fixture_ingest::config::IngestConfig;
use fixture_ingest::import_to_postgres::{self, connect, load_pitches, load_registry};
use fixture_ingest::types::ImportSummary;
use fixture_ingest::Ingestor;
use std::fs;
use tracing::info;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Organization whose teams, pitches and fixtures to work with
    #[arg(short, long, default_value_t = 1)]
    organization: i64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Parse and resolve fixture text without writing anything
    ParseText {
        /// Path to the text file to parse
        #[arg(short, long)]
        file: String,
    },
    /// Import fixture text into the database
    ImportText {
        /// Path to the text file to import
        #[arg(short, long)]
        file: String,
    },
    /// Import a CSV fixture export into the database
    ImportCsv {
        /// Path to the CSV file to import
        #[arg(short, long)]
        file: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = IngestConfig::from_env();
    let pool = connect(&config.database.url)
        .await
        .context("failed to connect to database")?;

    let summary = match cli.command {
        Commands::ParseText { file } => {
            let text = fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file))?;
            let registry = load_registry(&pool, cli.organization).await?;
            let pitches = load_pitches(&pool, cli.organization).await?;
            let ingestor = Ingestor::new(cli.organization, registry, pitches, &config);

            let mut summary = ImportSummary::default();
            for row in ingestor.resolve_text(&text, &mut summary) {
                match row.outcome {
                    Ok(resolved) => {
                        println!("{}", serde_json::to_string_pretty(&resolved)?);
                    }
                    Err(error) => summary.record_error(&row.row_reference, error.to_string()),
                }
            }
            info!("dry run, nothing written");
            summary
        }
        Commands::ImportText { file } => {
            let text = fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file))?;
            import_to_postgres::import_text(&pool, cli.organization, &text, &config).await?
        }
        Commands::ImportCsv { file } => {
            import_to_postgres::import_csv_file(&pool, cli.organization, &file, &config).await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
