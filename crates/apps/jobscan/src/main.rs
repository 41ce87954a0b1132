//! jobscan - job-search mail triage from the command line
//!
//! Scans a Gmail label for recruiter outreach, tracks one row per thread
//! in a local table, and sends each sender domain at most one
//! autoresponse.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, warn};

use triage::{
    GmailAuth, GmailClient, GoogleCredentials, RunConfig, SETTINGS_FILE, Settings,
    SqliteTableStore, TableStore, run_scan, tables,
};

/// Tracking database filename in the jobscan data directory
const TRACKING_DB: &str = "tracking.db";

#[derive(Parser)]
#[command(name = "jobscan", version, about = "Job-search mail triage")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan the configured label and update the tracking table
    Run,
    /// Write a skeleton settings file to edit
    Init,
    /// Show tracked-thread and suppression counts
    Status,
    /// Clear stored Gmail tokens
    Logout,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Run => run(),
        Command::Init => init(),
        Command::Status => status(),
        Command::Logout => logout(),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let settings = Settings::load().with_context(|| {
        format!("No usable settings; run 'jobscan init' and edit {}", SETTINGS_FILE)
    })?;
    let run_config = RunConfig::from_settings(&settings)?;

    let credentials = GoogleCredentials::load()?;
    let auth = GmailAuth::new(credentials.client_id, credentials.client_secret)?;
    let client = GmailClient::new(auth);

    let table = open_table()?;
    let stats = run_scan(&client, &table, &run_config)?;

    println!(
        "Scanned {} threads: {} new, {} updated, {} suppressed, {} duplicate",
        stats.threads_scanned,
        stats.inserted,
        stats.updated,
        stats.skipped_suppressed,
        stats.skipped_duplicate,
    );
    println!("Sent {} autoresponses", stats.responses_sent);
    if stats.errors > 0 {
        warn!("{} threads or sends failed; re-run to retry", stats.errors);
    }
    if !stats.compensation.is_empty() {
        println!("Compensation mentions:");
        for (span, count) in &stats.compensation {
            match triage::extract::compensation_midpoint(span) {
                Some(mid) => println!("  {} x{} (~{}k)", span, count, mid),
                None => println!("  {} x{}", span, count),
            }
        }
    }
    Ok(())
}

fn init() -> Result<()> {
    if config::config_exists(SETTINGS_FILE) {
        let path = config::config_path(SETTINGS_FILE).context("No config directory")?;
        println!("Settings already exist at {}", path.display());
        return Ok(());
    }
    Settings::skeleton().save()?;
    let path = config::config_path(SETTINGS_FILE).context("No config directory")?;
    println!("Wrote {}; edit it before running 'jobscan run'", path.display());

    if let Some(creds) = GoogleCredentials::default_credentials_path()
        && !creds.exists()
    {
        println!(
            "Place your Google OAuth credentials at {} (or set GMAIL_CLIENT_ID / GMAIL_CLIENT_SECRET)",
            creds.display()
        );
    }
    Ok(())
}

fn status() -> Result<()> {
    let table = open_table()?;
    let threads = table.read_all(tables::THREADS)?;
    let exclusions = table.read_all(tables::TRACK_EXCLUSIONS)?;
    let responses = table.read_all(tables::DOMAIN_RESPONSES)?;

    println!("Tracked threads:    {}", threads.len());
    println!("Exclusion patterns: {}", exclusions.len());
    println!("Responded domains:  {}", responses.len());
    Ok(())
}

fn logout() -> Result<()> {
    let credentials = GoogleCredentials::load()?;
    let auth = GmailAuth::new(credentials.client_id, credentials.client_secret)?;
    auth.logout()?;
    println!("Cleared stored Gmail tokens");
    Ok(())
}

fn open_table() -> Result<SqliteTableStore> {
    let path = config::data_path(TRACKING_DB).context("Could not determine data directory")?;
    SqliteTableStore::open(&path)
        .with_context(|| format!("Failed to open tracking database at {}", path.display()))
}
