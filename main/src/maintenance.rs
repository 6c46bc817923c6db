use std::{path::PathBuf, time::Duration};

use clap::{Parser, Subcommand};
use common::{
    storage::db::SurrealDbClient,
    utils::config::{get_config, AppConfig},
};
use site_maintenance::{
    reports::export_department_reports, roster::import_roster, HttpTransport, LivenessSweep,
    UrlProbe,
};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Batch jobs over the site inventory. Each run performs one job and exits.
#[derive(Parser, Debug)]
#[command(name = "maintenance", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Probe every candidate URL, mark unreachable sites inactive and export
    /// both partitions as CSV
    Sweep,
    /// Flag the sites listed in a Pope Tech roster export as scanned
    ImportRoster {
        /// Roster CSV with a "Primary URL (Site folder name)" column
        path: PathBuf,
    },
    /// Write one report folder per department
    ExportReports {
        /// Root folder of the bundles (defaults to `report_dir` from config)
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
}

/// Runs one job and returns the lines to print for the operator.
async fn run(
    command: Command,
    db: &SurrealDbClient,
    config: &AppConfig,
) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    match command {
        Command::Sweep => {
            let transport = HttpTransport::new(Duration::from_secs(config.probe_timeout_secs))?;
            let outcome = LivenessSweep::new(db, UrlProbe::new(transport), &config.export_dir)
                .with_concurrency(config.probe_concurrency)
                .run()
                .await?;
            Ok(outcome.summary_lines().to_vec())
        }
        Command::ImportRoster { path } => {
            let import = import_roster(db, &path).await?;
            Ok(vec![format!(
                "Read {} roster URLs, marked {} sites as in Pope Tech",
                import.urls, import.matched
            )])
        }
        Command::ExportReports { out_dir } => {
            let root = out_dir.unwrap_or_else(|| PathBuf::from(&config.report_dir));
            let reports = export_department_reports(db, &root).await?;
            Ok(reports
                .iter()
                .map(|report| {
                    format!(
                        "{}: {} sites -> {}",
                        report.department,
                        report.counts.total(),
                        report.folder.display()
                    )
                })
                .collect())
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();
    let config = get_config()?;

    let db = SurrealDbClient::connect_with_retry(&config).await?;
    db.ensure_initialized().await?;

    info!(command = ?cli.command, "Running maintenance job");
    for line in run(cli.command, &db, &config).await? {
        println!("{line}");
    }

    Ok(())
}
