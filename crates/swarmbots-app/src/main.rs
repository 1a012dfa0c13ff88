//! Headless shell for the SwarmBots simulation.
//!
//! Stands in for the rendering/input loop: it selects a behavior, steps the
//! world for a fixed number of ticks, and reports aggregate state through
//! tracing instead of drawing it.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use swarmbots_behavior::{Behavior, BehaviorKind};
use swarmbots_core::{ObstacleField, SwarmBotsConfig, WorldState};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "swarmbots",
    version,
    about = "Step the SwarmBots behavior engine headlessly"
)]
struct Cli {
    /// Behavior policy to run for the whole session.
    #[arg(long, value_enum, default_value = "avoid")]
    behavior: BehaviorArg,

    /// Number of ticks to simulate.
    #[arg(long, default_value_t = 600)]
    ticks: u64,

    /// Roster size; defaults to 1 for solo behaviors and 20 for swarm ones.
    #[arg(long)]
    robots: Option<usize>,

    /// Arena width in world units.
    #[arg(long, default_value_t = 1000)]
    width: u32,

    /// Arena height in world units.
    #[arg(long, default_value_t = 800)]
    height: u32,

    /// RNG seed for a reproducible run.
    #[arg(long)]
    seed: Option<u64>,

    /// Ticks between progress reports.
    #[arg(long, default_value_t = 60)]
    report_interval: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BehaviorArg {
    Avoid,
    Wall,
    Sweep,
    Stop,
    Timed,
    Aggregate,
}

impl BehaviorArg {
    fn kind(self) -> BehaviorKind {
        match self {
            Self::Avoid => BehaviorKind::Avoid,
            Self::Wall => BehaviorKind::WallFollow,
            Self::Sweep => BehaviorKind::Sweep,
            Self::Stop => BehaviorKind::BasicStop,
            Self::Timed => BehaviorKind::TimedStop,
            Self::Aggregate => BehaviorKind::Aggregate,
        }
    }

    fn is_swarm(self) -> bool {
        matches!(self, Self::Stop | Self::Timed | Self::Aggregate)
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let mut world = bootstrap_world(&cli)?;

    info!(
        behavior = world.policy().name(),
        robots = world.agent_count(),
        width = cli.width,
        height = cli.height,
        ticks = cli.ticks,
        "Starting SwarmBots session"
    );

    for _ in 0..cli.ticks {
        let events = world.step();
        if cli.report_interval > 0 && events.tick.0.is_multiple_of(cli.report_interval) {
            report(&world);
        }
    }

    if let Some(summary) = world.history().last() {
        info!(
            tick = summary.tick.0,
            agents = summary.agent_count,
            clusters = summary.cluster_count,
            largest_cluster = summary.largest_cluster,
            stopped = summary.stopped,
            "Session complete"
        );
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn bootstrap_world(cli: &Cli) -> Result<WorldState> {
    let roster_size = cli
        .robots
        .unwrap_or(if cli.behavior.is_swarm() { 20 } else { 1 });
    let config = SwarmBotsConfig {
        arena_width: cli.width,
        arena_height: cli.height,
        roster_size,
        rng_seed: cli.seed,
        ..SwarmBotsConfig::default()
    };
    let obstacles = if cli.behavior.is_swarm() {
        // Swarm agents bounce off the arena edges; interior walls are a solo
        // sensing concern.
        ObstacleField::bounded(cli.width as f32, cli.height as f32, 10.0)
    } else {
        ObstacleField::demo(cli.width as f32, cli.height as f32)
    };
    let policy = Behavior::boxed(cli.behavior.kind());
    let mut world =
        WorldState::new(config, obstacles, policy).context("world configuration rejected")?;
    world.reset();
    Ok(world)
}

fn report(world: &WorldState) {
    let Some(summary) = world.history().last() else {
        return;
    };
    info!(
        tick = summary.tick.0,
        moving = summary.moving,
        stopped = summary.stopped,
        leaving = summary.leaving,
        searching = summary.searching,
        following = summary.following,
        clusters = summary.cluster_count,
        largest_cluster = summary.largest_cluster,
        "tick report"
    );
}
