use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use fairway::{
    scenario::{Scenario, ScenarioLoader},
    web::{self, WebServerConfig},
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Golf course simulation runner")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run headless for a fixed number of ticks
    Run(RunArgs),
    /// Tick in real time and stream state over HTTP
    Serve(ServeArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Path to the scenario YAML file
    #[arg(long, default_value = "scenarios/pond_course.yaml")]
    scenario: PathBuf,

    /// Override tick count (uses scenario default when omitted)
    #[arg(long)]
    ticks: Option<u64>,

    /// Override snapshot interval in ticks
    #[arg(long)]
    snapshot_interval: Option<u64>,

    /// Directory for snapshots
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ServeArgs {
    /// Path to the scenario YAML file
    #[arg(long, default_value = "scenarios/pond_course.yaml")]
    scenario: PathBuf,

    /// Stop ticking after this many ticks (runs until Ctrl-C when omitted)
    #[arg(long)]
    ticks: Option<u64>,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 8080)]
    port: u16,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let loader = ScenarioLoader::new(".");
    match cli.command {
        Command::Run(args) => {
            let scenario = loader.load(&args.scenario)?;
            init_tracing(&scenario);
            run_headless(&scenario, args)
        }
        Command::Serve(args) => {
            let scenario = loader.load(&args.scenario)?;
            init_tracing(&scenario);
            serve(&scenario, args)
        }
    }
}

fn init_tracing(scenario: &Scenario) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&scenario.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_headless(scenario: &Scenario, args: RunArgs) -> Result<()> {
    let ticks = scenario.ticks(args.ticks);
    let snapshot_interval = args
        .snapshot_interval
        .unwrap_or(scenario.snapshot_interval_ticks);
    let snapshot_dir = args
        .snapshot_dir
        .unwrap_or_else(|| PathBuf::from("snapshots"));

    let settings = scenario.engine_settings(snapshot_dir, snapshot_interval);
    let mut engine = scenario.engine_builder(settings)?.build();
    let executed = engine.run(ticks).context("simulation failed")?;

    info!(
        scenario = %scenario.name,
        ticks = executed,
        groups_spawned = engine.groups_spawned(),
        groups_finished = engine.groups_finished(),
        "run complete"
    );
    println!(
        "Scenario '{}' ran {} ticks. Groups finished: {} of {} spawned.",
        scenario.name,
        executed,
        engine.groups_finished(),
        engine.groups_spawned()
    );
    Ok(())
}

fn serve(scenario: &Scenario, args: ServeArgs) -> Result<()> {
    let settings = scenario.engine_settings(PathBuf::from("snapshots"), 0);
    let engine = scenario.engine_builder(settings)?.build();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(web::run(WebServerConfig {
        engine,
        ticks: args.ticks,
        tick_interval: Duration::from_millis(scenario.tick_interval_ms.max(1)),
        host: args.host,
        port: args.port,
    }))
}
