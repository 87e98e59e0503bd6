use std::fs;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use lobby_kraken::config::{
    self, DEFAULT_RANDOM_STATE, DEFAULT_TEST_SIZE, DEFAULT_WATCH_INTERVAL, DataPaths,
};
use lobby_kraken::coverage;
use lobby_kraken::features::AblationMode;
use lobby_kraken::gbdt::GbdtParams;
use lobby_kraken::source::ParquetSource;
use lobby_kraken::train::{self, EvaluationReport, TrainConfig};
use lobby_kraken::validate::{self, CheckOptions, CheckSelection};

#[derive(Parser, Debug)]
#[command(name = "kraken")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Dataset checks, coverage monitoring and win-model training for lobby telemetry")]
struct Cli {
    /// Data root holding parquet/ and ml/ (defaults to KRAKEN_DATA_DIR or ./data)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate player_profile, team_outcome and lobby_outcome tables
    Check(CheckArgs),
    /// Report dataset coverage and sufficiency for training
    Monitor(MonitorArgs),
    /// Train and evaluate the lobby win model under one ablation mode
    Train(TrainArgs),
    /// Train the team-outcome baseline
    TrainTeam(TrainTeamArgs),
}

#[derive(Args, Debug)]
struct CheckArgs {
    #[arg(long)]
    player_profile: Option<PathBuf>,
    #[arg(long)]
    team_outcome: Option<PathBuf>,
    #[arg(long)]
    lobby_outcome: Option<PathBuf>,

    #[arg(long)]
    check_player_profile: bool,
    #[arg(long)]
    check_team_outcome: bool,
    #[arg(long)]
    check_lobby_outcome: bool,
    /// Run every check (the default when none is selected)
    #[arg(long)]
    all: bool,

    /// Shapes and column lists only
    #[arg(long)]
    form: bool,
    /// history_size used when building player_profile
    #[arg(long)]
    history_size: Option<i64>,
    /// min_matches used when building player_profile
    #[arg(long)]
    min_matches: Option<i64>,
}

#[derive(Args, Debug)]
struct MonitorArgs {
    /// Re-run until stopped (type q + Enter)
    #[arg(long)]
    watch: bool,
    /// Seconds between passes in watch mode
    #[arg(long, default_value_t = DEFAULT_WATCH_INTERVAL.as_secs())]
    interval: u64,
    /// Stop after this many passes
    #[arg(long)]
    iterations: Option<usize>,
}

#[derive(Args, Debug)]
struct ModelArgs {
    #[arg(long, default_value_t = DEFAULT_TEST_SIZE)]
    test_size: f64,
    #[arg(long, default_value_t = DEFAULT_RANDOM_STATE)]
    random_state: u64,
    /// JSON file overriding model parameters
    #[arg(long)]
    params: Option<PathBuf>,
    /// Also write the evaluation report as JSON
    #[arg(long)]
    json: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct TrainArgs {
    #[arg(long)]
    lobby_parquet: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = AblationMode::Full)]
    mode: AblationMode,
    #[command(flatten)]
    model: ModelArgs,
}

#[derive(Args, Debug)]
struct TrainTeamArgs {
    #[arg(long)]
    team_parquet: Option<PathBuf>,
    /// Only side and champion ids; no post-game aggregates
    #[arg(long)]
    draft_only: bool,
    #[command(flatten)]
    model: ModelArgs,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let paths = match &cli.data_dir {
        Some(root) => DataPaths::under(root),
        None => DataPaths::from_env(),
    };

    match cli.command {
        Command::Check(args) => run_check(paths, args),
        Command::Monitor(args) => run_monitor(&paths, args),
        Command::Train(args) => run_train(&paths, args),
        Command::TrainTeam(args) => run_train_team(&paths, args),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn run_check(mut paths: DataPaths, args: CheckArgs) -> Result<()> {
    if let Some(p) = args.player_profile {
        paths.player_profile = p;
    }
    if let Some(p) = args.team_outcome {
        paths.team_outcome = p;
    }
    if let Some(p) = args.lobby_outcome {
        paths.lobby_outcome = p;
    }
    let selection = if args.all {
        CheckSelection::all()
    } else {
        CheckSelection {
            player_profile: args.check_player_profile,
            team_outcome: args.check_team_outcome,
            lobby_outcome: args.check_lobby_outcome,
        }
    };
    let options = CheckOptions {
        form_only: args.form,
        history_size: args.history_size,
        min_matches: args.min_matches,
    };

    for report in validate::run_checks(&ParquetSource, &paths, selection, &options) {
        print!("{report}");
    }
    Ok(())
}

fn run_monitor(paths: &DataPaths, args: MonitorArgs) -> Result<()> {
    for path in paths.all() {
        if !path.exists() {
            info!("file not found: {} (run the pipeline first)", path.display());
        }
    }

    if !args.watch {
        println!("Coverage at {}", Utc::now().format("%Y-%m-%d %H:%M:%S UTC"));
        print!("{}", coverage::analyze(&ParquetSource, paths));
        return Ok(());
    }

    let (stop_tx, stop_rx) = mpsc::channel();
    let stdin_tx = stop_tx.clone();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().eq_ignore_ascii_case("q") {
                let _ = stdin_tx.send(());
                break;
            }
        }
    });

    println!(
        "Monitoring every {}s; type q + Enter to stop",
        args.interval
    );
    coverage::watch(
        &ParquetSource,
        paths,
        Duration::from_secs(args.interval),
        &stop_rx,
        args.iterations,
        |report| {
            println!("Coverage at {}", Utc::now().format("%Y-%m-%d %H:%M:%S UTC"));
            print!("{report}");
        },
    );
    drop(stop_tx);
    println!("Stopping monitor");
    Ok(())
}

fn model_config(
    parquet: PathBuf,
    args: &ModelArgs,
    defaults: GbdtParams,
) -> Result<TrainConfig> {
    let params = match &args.params {
        Some(path) => config::load_model_params(path)?,
        None => defaults,
    };
    let mut config = TrainConfig::new(parquet, params);
    config.test_size = args.test_size;
    config.random_state = args.random_state;
    info!(
        parquet = %config.parquet.display(),
        test_size = config.test_size,
        random_state = config.random_state,
        "training config"
    );
    Ok(config)
}

fn write_json(report: &EvaluationReport, path: &Option<PathBuf>) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let body = report.to_json().context("serialize evaluation report")?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(path, body).with_context(|| format!("write {}", path.display()))?;
    info!("wrote {}", path.display());
    Ok(())
}

fn run_train(paths: &DataPaths, args: TrainArgs) -> Result<()> {
    let parquet = args
        .lobby_parquet
        .unwrap_or_else(|| paths.lobby_outcome.clone());
    let config = model_config(parquet, &args.model, GbdtParams::default())?;
    let report = train::run_lobby_ablation(&ParquetSource, &config, args.mode)
        .with_context(|| format!("lobby training ({} mode) failed", args.mode))?;
    print!("{report}");
    write_json(&report, &args.model.json)
}

fn run_train_team(paths: &DataPaths, args: TrainTeamArgs) -> Result<()> {
    let parquet = args
        .team_parquet
        .unwrap_or_else(|| paths.team_outcome.clone());
    let config = model_config(parquet, &args.model, GbdtParams::team_baseline())?;
    let report = train::run_team_baseline(&ParquetSource, &config, args.draft_only)
        .context("team baseline training failed")?;
    print!("{report}");
    write_json(&report, &args.model.json)
}
