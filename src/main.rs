use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use flate2::read::GzDecoder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indoor_nav_rs::pdr::{StepRecord, TrackedPath};
use indoor_nav_rs::{
    DeadReckoningTracker, Destination, FloorCatalog, NavConfig, RouteCoordinator, RouteUpdate,
    WorldPoint,
};

#[derive(Parser, Debug)]
#[command(name = "indoor_nav")]
#[command(about = "Indoor routing and dead-reckoning engine", long_about = None)]
struct Cli {
    /// NavConfig JSON; missing fields use defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override grid cell size (raw units)
    #[arg(long, global = true)]
    cell_size: Option<f64>,

    /// Pretty-print JSON output
    #[arg(long, global = true, default_value_t = false)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Plan a route from a rendered-space point to a room entrance
    Route {
        #[command(flatten)]
        target: Target,

        /// Start position in rendered space, "x,y"
        #[arg(long, value_parser = parse_point)]
        from: WorldPoint,
    },
    /// Replay a step log through the tracker, optionally routing from the end point
    Replay {
        /// Step log JSON[.gz]
        #[arg(long)]
        steps: PathBuf,

        /// Walker height override, centimetres
        #[arg(long)]
        height_cm: Option<f64>,

        /// Include every step record in the output
        #[arg(long, default_value_t = false)]
        records: bool,

        #[command(flatten)]
        target: OptionalTarget,
    },
}

#[derive(Args, Debug)]
struct Target {
    /// Floor catalog JSON[.gz]
    #[arg(long)]
    floors: PathBuf,

    #[arg(long)]
    floor: String,

    #[arg(long)]
    room: Option<String>,

    /// Room name, matched case-insensitively when the number does not match
    #[arg(long, default_value = "")]
    name: String,
}

#[derive(Args, Debug)]
struct OptionalTarget {
    #[arg(long, requires = "floor")]
    floors: Option<PathBuf>,

    #[arg(long, requires = "floors")]
    floor: Option<String>,

    #[arg(long)]
    room: Option<String>,

    #[arg(long, default_value = "")]
    name: String,
}

#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StepEvent {
    Step { interval_ms: i64, heading: f64 },
    Heading { value: f64 },
}

#[derive(Deserialize, Debug)]
struct StepLog {
    origin: WorldPoint,
    events: Vec<StepEvent>,
}

#[derive(Serialize)]
struct ReplaySummary {
    steps: u64,
    heading_updates: usize,
    final_position: Option<WorldPoint>,
    final_heading: f64,
    path: TrackedPath,
    #[serde(skip_serializing_if = "Option::is_none")]
    records: Option<Vec<StepRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    route: Option<RouteUpdate>,
}

fn parse_point(s: &str) -> Result<WorldPoint, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected \"x,y\", got {:?}", s))?;
    let x: f64 = x.trim().parse().map_err(|e| format!("bad x: {}", e))?;
    let y: f64 = y.trim().parse().map_err(|e| format!("bad y: {}", e))?;
    Ok(WorldPoint { x, y })
}

fn open_json(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    if path.extension().map(|e| e == "gz").unwrap_or(false) {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let reader = open_json(path)?;
    serde_json::from_reader(reader).with_context(|| format!("parsing {}", path.display()))
}

fn load_catalog(path: &Path) -> Result<Arc<FloorCatalog>> {
    let catalog = FloorCatalog::from_json_reader(open_json(path)?)
        .with_context(|| format!("loading floors from {}", path.display()))?;
    log::info!("Loaded {} floors from {}", catalog.len(), path.display());
    Ok(Arc::new(catalog))
}

fn load_config(cli: &Cli) -> Result<NavConfig> {
    let mut config = match &cli.config {
        Some(path) => NavConfig::from_json_file(path)?,
        None => NavConfig::default(),
    };
    if let Some(cell_size) = cli.cell_size {
        config.grid.cell_size = cell_size;
    }
    if let Command::Replay {
        height_cm: Some(height_cm),
        ..
    } = &cli.command
    {
        config.stride.height_cm = *height_cm;
    }
    config.validate()?;
    Ok(config)
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", out);
    Ok(())
}

async fn run_route(
    config: NavConfig,
    target: &Target,
    from: WorldPoint,
    pretty: bool,
) -> Result<()> {
    let catalog = load_catalog(&target.floors)?;
    let coordinator = RouteCoordinator::new(catalog, config)?;
    let destination =
        Destination::new(target.floor.as_str(), target.room.as_deref(), &target.name);

    let result = coordinator.route(destination, from).await;
    if let Some(update) = coordinator.latest() {
        print_json(&update, pretty)?;
    }
    result.context("route failed")?;
    Ok(())
}

async fn run_replay(
    config: NavConfig,
    steps: &Path,
    keep_records: bool,
    target: &OptionalTarget,
    pretty: bool,
) -> Result<()> {
    let log: StepLog = load_json(steps)?;
    let mut tracker = DeadReckoningTracker::new(config.stride.clone(), config.tracker.clone());
    let observer = tracker.observer();

    tracker.set_origin(log.origin);
    let mut records = Vec::new();
    let mut heading_updates = 0;
    for event in &log.events {
        match *event {
            StepEvent::Step {
                interval_ms,
                heading,
            } => {
                if let Some(record) = tracker.process_step(interval_ms, heading) {
                    records.push(record);
                }
            }
            StepEvent::Heading { value } => {
                tracker.update_heading(value);
                heading_updates += 1;
            }
        }
    }
    log::info!(
        "Replayed {} steps, {:.1} units travelled",
        records.len(),
        observer.path_snapshot().distance
    );

    let route = match (&target.floors, &target.floor) {
        (Some(floors), Some(floor)) => {
            let coordinator = RouteCoordinator::new(load_catalog(floors)?, config)?;
            let destination =
                Destination::new(floor.as_str(), target.room.as_deref(), &target.name);
            let ticket = coordinator.request_route_from_tracker(destination, &observer)?;
            if let Err(e) = ticket.wait().await {
                log::warn!("Route from replay end point failed: {}", e);
            }
            coordinator.latest()
        }
        _ => None,
    };

    let summary = ReplaySummary {
        steps: tracker.cadence().step_count,
        heading_updates,
        final_position: observer.position(),
        final_heading: observer.heading(),
        path: observer.path_snapshot(),
        records: keep_records.then_some(records),
        route,
    };
    print_json(&summary, pretty)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match &cli.command {
        Command::Route { target, from } => run_route(config, target, *from, cli.pretty).await,
        Command::Replay {
            steps,
            records,
            target,
            ..
        } => run_replay(config, steps, *records, target, cli.pretty).await,
    }
}
