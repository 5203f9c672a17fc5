//! exam-portal: serves question bank files and manages a local exam database.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use app::bank_dir::BankDirectory;
use app::routes::{AppState, create_router};
use app::tools::{NormalizeStatus, normalize_dir, write_manifest};
use clap::{Parser, Subcommand};
use services::{AppServices, BankSourceConfig, Clock, HttpBankSource};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "exam-portal", version, about = "Question bank server and exam tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve bank files over HTTP
    Serve {
        /// Directory holding bank JSON files
        #[arg(long, env = "EXAM_BANK_DIR", default_value = "bank")]
        bank_dir: PathBuf,

        /// Address to listen on
        #[arg(long, env = "EXAM_BIND_ADDR", default_value = "127.0.0.1:5000")]
        bind: SocketAddr,
    },

    /// Write manifest.json for static hosting
    Manifest {
        #[arg(long, env = "EXAM_BANK_DIR", default_value = "bank")]
        bank_dir: PathBuf,
    },

    /// Rewrite bank files in canonical form
    Normalize {
        #[arg(long, env = "EXAM_BANK_DIR", default_value = "bank")]
        bank_dir: PathBuf,

        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Add banks from a remote source to the local database
    Sync {
        /// Base URL of the bank server or static site
        #[arg(long, env = "EXAM_BANK_SOURCE_URL")]
        source_url: String,

        #[arg(long, env = "EXAM_DB_URL", default_value = "sqlite://exam.db?mode=rwc")]
        db: String,
    },

    /// Upload a bank file into the local database
    Upload {
        file: PathBuf,

        #[arg(long, env = "EXAM_DB_URL", default_value = "sqlite://exam.db?mode=rwc")]
        db: String,
    },

    /// Write a backup of banks, attempts and stats
    Export {
        /// Output file (stdout when omitted)
        #[arg(long)]
        output: Option<PathBuf>,

        #[arg(long, env = "EXAM_DB_URL", default_value = "sqlite://exam.db?mode=rwc")]
        db: String,
    },

    /// Restore a backup, replacing stored banks and attempts
    Import {
        file: PathBuf,

        #[arg(long, env = "EXAM_DB_URL", default_value = "sqlite://exam.db?mode=rwc")]
        db: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve { bank_dir, bind } => serve(bank_dir, bind).await,
        Commands::Manifest { bank_dir } => {
            let entries = write_manifest(&BankDirectory::new(&bank_dir))
                .await
                .with_context(|| format!("writing manifest in {}", bank_dir.display()))?;
            println!("manifest lists {} bank(s)", entries.len());
            Ok(())
        }
        Commands::Normalize { bank_dir, dry_run } => normalize(bank_dir, dry_run).await,
        Commands::Sync { source_url, db } => {
            let clock = Clock::default();
            let source = HttpBankSource::new(BankSourceConfig::new(source_url), clock);
            let app = AppServices::new_sqlite(&db, clock)
                .await?
                .with_source(Some(source));
            let added = app.sync_banks().await?;
            println!("added {added} bank(s)");
            Ok(())
        }
        Commands::Upload { file, db } => {
            let contents = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            let name = file
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_owned();
            let app = AppServices::new_sqlite(&db, Clock::default()).await?;
            let bank = app.banks().upload(&name, &contents).await?;
            println!("stored \"{}\" ({} questions) as {}", bank.name(), bank.len(), bank.id());
            Ok(())
        }
        Commands::Export { output, db } => {
            let app = AppServices::new_sqlite(&db, Clock::default()).await?;
            let backup = app.transfer().export_all().await?;
            match output {
                Some(path) => tokio::fs::write(&path, backup)
                    .await
                    .with_context(|| format!("writing {}", path.display()))?,
                None => println!("{backup}"),
            }
            Ok(())
        }
        Commands::Import { file, db } => {
            let contents = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            let app = AppServices::new_sqlite(&db, Clock::default()).await?;
            let summary = app.transfer().import_all(&contents).await?;
            println!(
                "imported {} bank(s), {} attempt(s)",
                summary.banks.unwrap_or(0),
                summary.attempts.unwrap_or(0)
            );
            Ok(())
        }
    }
}

async fn serve(bank_dir: PathBuf, bind: SocketAddr) -> anyhow::Result<()> {
    let state = AppState {
        banks: Arc::new(BankDirectory::new(bank_dir)),
    };
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("binding {bind}"))?;
    tracing::info!(%bind, "listening");
    axum::serve(listener, router).await?;
    Ok(())
}

async fn normalize(bank_dir: PathBuf, dry_run: bool) -> anyhow::Result<()> {
    let outcomes = normalize_dir(&BankDirectory::new(&bank_dir), dry_run)
        .await
        .with_context(|| format!("reading {}", bank_dir.display()))?;
    for outcome in &outcomes {
        let verdict = match &outcome.status {
            NormalizeStatus::Rewritten if dry_run => "would rewrite".to_owned(),
            NormalizeStatus::Rewritten => "rewritten".to_owned(),
            NormalizeStatus::Unchanged => "already normalized".to_owned(),
            NormalizeStatus::Failed(e) => format!("failed: {e}"),
        };
        println!("{}: {verdict}", outcome.path.display());
    }
    Ok(())
}
