#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter for inspecting layouts and running spawn passes.

mod config;
mod layout_transfer;

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use stowage_core::{ContainerId, HostGrid, ItemId};
use stowage_system_occupancy::OccupancyAnalyzer;
use stowage_system_spawn_state::{FileStore, SpawnStateStore, SystemClock};
use stowage_system_spawning::{Config, SpawnOutcome, SpawnService};
use stowage_world::Container;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{config::SpawnConfig, layout_transfer::LayoutSnapshot};

#[derive(Debug, Parser)]
#[command(name = "stowage", about = "Grid placement and spawn-once tooling")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the occupancy bitmap, occupancy rate and ranked free regions.
    Analyze {
        /// Layout transfer file to inspect.
        #[arg(long)]
        layout: PathBuf,
    },
    /// Run one spawn pass and write the resulting layout back.
    Spawn {
        /// TOML spawn configuration.
        #[arg(long)]
        config: PathBuf,
        /// Directory holding the persisted spawn state.
        #[arg(long)]
        state: PathBuf,
        /// Layout transfer file; created empty when missing.
        #[arg(long)]
        layout: PathBuf,
    },
    /// Remove one item from a layout.
    Take {
        /// Layout transfer file to edit.
        #[arg(long)]
        layout: PathBuf,
        /// Identity of the item to remove.
        #[arg(long)]
        item: String,
    },
    /// Clear persisted spawn state.
    Reset {
        /// Directory holding the persisted spawn state.
        #[arg(long)]
        state: PathBuf,
        /// Only clear this container.
        #[arg(long)]
        container: Option<String>,
    },
}

/// Entry point for the Stowage command-line interface.
fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Analyze { layout } => analyze(&layout),
        Command::Spawn {
            config,
            state,
            layout,
        } => spawn(&config, &state, &layout),
        Command::Take { layout, item } => take(&layout, &ItemId::new(item)),
        Command::Reset { state, container } => reset(&state, container.map(ContainerId::new)),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn analyze(layout: &Path) -> Result<()> {
    let container = read_layout(layout)?;
    let mut analyzer = OccupancyAnalyzer::new(&container);
    let model = analyzer
        .analyze(false)
        .context("failed to analyze layout")?;

    println!("{}", model.render());
    println!(
        "occupancy: {:.1}% ({} of {} cells free)",
        model.occupancy_rate() * 100.0,
        model.free_count(),
        u64::from(model.width()) * u64::from(model.height())
    );
    for (rank, region) in model.regions().iter().enumerate() {
        println!(
            "region {}: origin {} bounds {} free cells {}",
            rank + 1,
            region.position,
            region.size,
            region.area
        );
    }
    Ok(())
}

fn spawn(config_path: &Path, state: &Path, layout: &Path) -> Result<()> {
    let config = SpawnConfig::load(config_path)?;
    let mut container = if layout.exists() {
        read_layout(layout)?
    } else {
        Container::new(config.container.columns, config.container.rows)
    };
    if container.width() != config.container.columns
        || container.height() != config.container.rows
    {
        bail!(
            "layout is {}x{} but container `{}` is configured as {}x{}",
            container.width(),
            container.height(),
            config.container.id,
            config.container.columns,
            config.container.rows
        );
    }

    let persistence = FileStore::open(state)
        .with_context(|| format!("failed to open spawn state at {}", state.display()))?;
    let mut service = SpawnService::init(persistence, SystemClock, Config::new(config.respawn));
    service
        .store_mut()
        .set_container_type(&config.container.id, config.container.kind.as_str());

    let report = service
        .spawn_templates(
            &config.container.id,
            &mut container,
            &config.templates,
            |_| true,
        )
        .context("spawn pass failed")?;
    for (template, outcome) in report.iter() {
        println!("{template}: {}", describe(outcome));
    }

    write_layout(layout, &container)?;
    let _ = service.shutdown().context("failed to save spawn state")?;
    Ok(())
}

fn take(layout: &Path, item: &ItemId) -> Result<()> {
    let mut container = read_layout(layout)?;
    let removed = container
        .remove(item)
        .with_context(|| format!("cannot take `{item}`"))?;
    write_layout(layout, &container)?;
    info!(item = %removed.id, origin = %removed.origin, "item taken");
    Ok(())
}

fn reset(state: &Path, container: Option<ContainerId>) -> Result<()> {
    let persistence = FileStore::open(state)
        .with_context(|| format!("failed to open spawn state at {}", state.display()))?;
    let mut store = SpawnStateStore::open(persistence, SystemClock);
    match container {
        Some(container) => store
            .reset_container(&container)
            .with_context(|| format!("failed to reset container `{container}`"))?,
        None => store.reset_all().context("failed to reset spawn state")?,
    }
    Ok(())
}

fn describe(outcome: &SpawnOutcome) -> String {
    match outcome {
        SpawnOutcome::Spawned { item, placement } => {
            let rotated = if placement.rotated { ", rotated" } else { "" };
            format!(
                "spawned `{item}` at {} ({}{rotated})",
                placement.origin, placement.size
            )
        }
        SpawnOutcome::AlreadyPresent => "already present".to_owned(),
        SpawnOutcome::Exhausted => "exhausted".to_owned(),
        SpawnOutcome::ConditionNotMet => "condition not met".to_owned(),
        SpawnOutcome::NoFit => "no room".to_owned(),
        SpawnOutcome::MaterializeFailed(error) => format!("host refused: {error}"),
    }
}

fn read_layout(path: &Path) -> Result<Container> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read layout at {}", path.display()))?;
    let snapshot = LayoutSnapshot::decode(&contents)
        .with_context(|| format!("failed to decode layout at {}", path.display()))?;
    snapshot
        .restore()
        .with_context(|| format!("layout at {} is inconsistent", path.display()))
}

fn write_layout(path: &Path, container: &Container) -> Result<()> {
    let encoded = LayoutSnapshot::capture(container)
        .encode()
        .context("failed to encode layout")?;
    fs::write(path, format!("{encoded}\n"))
        .with_context(|| format!("failed to write layout to {}", path.display()))
}
