//! Command line surface.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tokio::sync::oneshot;
use tracing::warn;

use crate::config::Config;
use crate::export::export;
use crate::ident::{ChallengeId, Schedule};
use crate::process::{fetch_challenge, process_batch};
use crate::request::NejmClient;
use crate::store::Store;
use crate::{Result, DEFAULT_EXPORT_PATH, DEFAULT_STORE_PATH, ORIGIN_ID};

#[derive(Debug, Parser)]
#[command(name = "nejm_scrap", version)]
#[command(about = "Download NEJM Image Challenges into an incrementally updated JSON file")]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true, env = "NEJM_SCRAP_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Download a single challenge and print it as JSON
    Fetch {
        /// Challenge id (YYYYMMDD)
        id: String,
        /// Directory the image is written under
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
    /// Download a range or list of challenges into the store
    Batch(BatchArgs),
    /// Show the challenge calendar and example commands
    Info,
    /// Show what a store file contains
    Status {
        #[arg(short, long, default_value = DEFAULT_STORE_PATH)]
        file: PathBuf,
    },
    /// Render a store file as a LaTeX quiz book
    Export {
        #[arg(short, long, default_value = DEFAULT_STORE_PATH)]
        input: PathBuf,
        #[arg(short, long, default_value = DEFAULT_EXPORT_PATH)]
        output: PathBuf,
    },
}

#[derive(Debug, Args)]
pub struct BatchArgs {
    /// First challenge (YYYYMMDD), defaults to the first one ever published
    #[arg(short, long, conflicts_with = "dates")]
    pub start_date: Option<String>,
    /// Last challenge (YYYYMMDD), defaults to today
    #[arg(short, long, conflicts_with = "dates")]
    pub end_date: Option<String>,
    /// Comma separated challenge ids instead of a range
    #[arg(short, long)]
    pub dates: Option<String>,
    /// Store file, read and then updated in place
    #[arg(short, long, default_value = DEFAULT_STORE_PATH)]
    pub output: PathBuf,
    /// Pause between requests in milliseconds
    #[arg(long)]
    pub delay_ms: Option<u64>,
    /// Save after this many updated challenges (0: only at the end)
    #[arg(long)]
    pub checkpoint_every: Option<usize>,
}

impl BatchArgs {
    pub fn schedule(&self) -> Result<Schedule> {
        match &self.dates {
            Some(list) => Schedule::parse_list(list),
            None => Schedule::from_bounds(self.start_date.as_deref(), self.end_date.as_deref()),
        }
    }
}

pub async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Fetch { id, output } => {
            let id: ChallengeId = id.parse()?;
            let client = NejmClient::new(&config, output)?;
            let challenge = fetch_challenge(id, &client, false).await?;
            let json = serde_json::to_string_pretty(&challenge).map_err(std::io::Error::from)?;
            println!("{json}");
            Ok(ExitCode::SUCCESS)
        }
        Command::Batch(args) => {
            // Bad dates fail here, before anything touches the network.
            let schedule = args.schedule()?;
            if let Some(delay) = args.delay_ms {
                config.request_delay_ms = delay;
            }
            if let Some(every) = args.checkpoint_every {
                config.checkpoint_every = every;
            }
            run_batch(&schedule, &args.output, &config).await
        }
        Command::Info => {
            print_info();
            Ok(ExitCode::SUCCESS)
        }
        Command::Status { file } => print_status(&file),
        Command::Export { input, output } => run_export(&input, &output),
    }
}

async fn run_batch(schedule: &Schedule, store_path: &Path, config: &Config) -> Result<ExitCode> {
    let mut store = Store::load(store_path)?;
    let image_root = store_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let client = NejmClient::new(config, image_root)?;

    let (stop_tx, mut stop_rx) = oneshot::channel();
    let signal_handle = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("received Ctrl-C, stopping after the current challenge");
            let _ = stop_tx.send(());
        }
    });

    let report =
        process_batch(schedule, &mut store, store_path, &client, config, &mut stop_rx).await;
    signal_handle.abort();
    let report = report?;

    println!("{report}");
    println!("Total: {}", store.len());

    Ok(if report.is_total_failure() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn print_info() {
    let origin = ChallengeId::origin();
    let today = ChallengeId::today();
    let total = Schedule::weekly(origin, today)
        .map(|s| s.iter().count())
        .unwrap_or(0);
    let sample: Vec<String> = Schedule::weekly(origin, today)
        .map(|s| s.iter().take(3).map(|id| id.to_string()).collect())
        .unwrap_or_default();

    println!("NEJM Image Challenge");
    println!();
    println!("  First challenge: {} ({origin})", origin.display_date());
    println!("  Today:           {} ({today})", today.display_date());
    println!("  Challenges:      {total} (one per week)");
    println!();
    println!("Ids are dates in YYYYMMDD format, e.g. {ORIGIN_ID}.");
    println!();
    println!("Examples:");
    println!("  nejm_scrap batch                          # everything up to today");
    println!("  nejm_scrap batch -s 20240101              # from 2024 on");
    println!("  nejm_scrap batch -s {ORIGIN_ID} -e 20051110");
    println!("  nejm_scrap batch -d {}", sample.join(","));
    println!("  nejm_scrap fetch {ORIGIN_ID} -o out");
    println!("  nejm_scrap status -f {DEFAULT_STORE_PATH}");
    println!("  nejm_scrap export -i {DEFAULT_STORE_PATH} -o {DEFAULT_EXPORT_PATH}");
}

fn print_status(file: &Path) -> Result<ExitCode> {
    if !file.exists() {
        eprintln!("File not found: {}", file.display());
        return Ok(ExitCode::FAILURE);
    }
    let stats = Store::load(file)?.stats();

    println!("File: {}", file.display());
    println!("Total challenges: {}", stats.total);
    if let (Some(first), Some(last)) = (stats.first, stats.last) {
        println!("Range: {first} to {last}");
    }
    println!("With answers: {}/{}", stats.answered, stats.total);
    println!("With images: {}/{}", stats.with_image, stats.total);
    println!("Fully resolved: {}/{}", stats.resolved, stats.total);
    Ok(ExitCode::SUCCESS)
}

fn run_export(input: &Path, output: &Path) -> Result<ExitCode> {
    if !input.exists() {
        eprintln!("File not found: {}", input.display());
        return Ok(ExitCode::FAILURE);
    }
    let count = export(input, output)?;
    println!("Wrote {count} challenges to {}", output.display());
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("nejm_scrap").chain(args.iter().copied())).unwrap()
    }

    fn batch_args(cli: Cli) -> BatchArgs {
        match cli.command {
            Command::Batch(args) => args,
            other => panic!("expected batch, got {other:?}"),
        }
    }

    #[test]
    fn test_batch_defaults() {
        let args = batch_args(parse(&["batch"]));
        assert_eq!(args.output, PathBuf::from(DEFAULT_STORE_PATH));
        match args.schedule().unwrap() {
            Schedule::Weekly { start, .. } => assert_eq!(start, ChallengeId::origin()),
            other => panic!("expected weekly schedule, got {other:?}"),
        }
    }

    #[test]
    fn test_batch_date_list() {
        let args = batch_args(parse(&["batch", "-d", "20051013,20051020", "-o", "q.json"]));
        let ids: Vec<String> = args.schedule().unwrap().iter().map(|i| i.to_string()).collect();
        assert_eq!(ids, ["20051013", "20051020"]);
    }

    #[test]
    fn test_dates_conflict_with_range() {
        let res = Cli::try_parse_from(["nejm_scrap", "batch", "-d", "20051013", "-s", "20051013"]);
        assert!(res.is_err());
    }

    #[test]
    fn test_bad_boundary_fails_before_fetching() {
        let args = batch_args(parse(&["batch", "-s", "2020-01-01"]));
        let err = args.schedule().unwrap_err();
        assert!(matches!(err, Error::InvalidDateFormat(ref s) if s == "2020-01-01"));
        assert!(err.to_string().contains("YYYYMMDD"));
    }

    #[test]
    fn test_config_flag_is_global() {
        let cli = parse(&["status", "--config", "scrap.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("scrap.toml")));
    }

    #[test]
    fn test_status_of_missing_file_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let code = print_status(&dir.path().join("missing.json")).unwrap();
        assert_eq!(code, ExitCode::FAILURE);
    }

    #[test]
    fn test_export_defaults() {
        match parse(&["export"]).command {
            Command::Export { input, output } => {
                assert_eq!(input, PathBuf::from(DEFAULT_STORE_PATH));
                assert_eq!(output, PathBuf::from(DEFAULT_EXPORT_PATH));
            }
            other => panic!("expected export, got {other:?}"),
        }
    }

    #[test]
    fn test_export_of_missing_store_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let output = dir.path().join("out.tex");
        let code = run_export(&dir.path().join("missing.json"), &output).unwrap();
        assert_eq!(code, ExitCode::FAILURE);
        assert!(!output.exists());
    }
}
