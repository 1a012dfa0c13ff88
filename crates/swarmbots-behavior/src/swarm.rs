//! Swarm aggregation policies driven by the sensed neighbor list.

use rand::{Rng, RngCore};
use std::f32::consts::PI;
use swarmbots_core::{
    AgentBody, AgentMode, AgentRuntime, BehaviorPolicy, BoundaryBehavior, NeighborSample,
    SwarmBotsConfig,
};

const MOVE_JITTER: f32 = 0.1;

// Timed stop.
const SMALL_CLUSTER: usize = 3;
const RESTLESS_CHANCE: f32 = 0.1;
const DEPART_SPEED_FACTOR: f32 = 1.5;

// Tuned aggregation.
const JOIN_CLUSTER_CAP: usize = 5;
const STOP_DISTANCE: f32 = 20.0;
const CROWD_SLOWDOWN: f32 = 0.5;
const CENTER_PULL: f32 = 0.1;
const CENTER_JITTER: f32 = 0.2;
const BIG_CLUSTER: usize = 10;
const REJOIN_CLUSTER: usize = 8;
const REJOIN_CHANCE: f32 = 0.3;
const EXIT_TICKS: u32 = 20;
const EXIT_SPEED_FACTOR: f32 = 1.2;

fn nearest_within(runtime: &AgentRuntime, threshold: f32) -> bool {
    runtime
        .neighbors
        .first()
        .is_some_and(|sample| sample.distance < threshold)
}

fn mean_bearing(neighbors: &[NeighborSample]) -> Option<f32> {
    if neighbors.is_empty() {
        return None;
    }
    Some(neighbors.iter().map(|sample| sample.bearing).sum::<f32>() / neighbors.len() as f32)
}

/// Mean neighbor offset relative to self, from the sensed distance/bearing
/// pairs. `None` when there are no neighbors, so callers skip the turn-away
/// adjustment instead of dividing by zero.
fn centroid_offset(neighbors: &[NeighborSample]) -> Option<(f32, f32)> {
    if neighbors.is_empty() {
        return None;
    }
    let n = neighbors.len() as f32;
    let cx = neighbors
        .iter()
        .map(|sample| sample.distance * sample.bearing.cos())
        .sum::<f32>()
        / n;
    let cy = neighbors
        .iter()
        .map(|sample| sample.distance * sample.bearing.sin())
        .sum::<f32>()
        / n;
    Some((cx, cy))
}

/// Purely reactive proximity stop: freeze next to the nearest neighbor, walk
/// randomly otherwise. No memory between ticks.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicStop;

impl BehaviorPolicy for BasicStop {
    fn name(&self) -> &'static str {
        "basic-stop"
    }

    fn initial_mode(&self) -> AgentMode {
        AgentMode::Moving
    }

    fn boundary(&self) -> BoundaryBehavior {
        BoundaryBehavior::Reflect
    }

    fn decide(
        &self,
        config: &SwarmBotsConfig,
        body: &mut AgentBody,
        runtime: &mut AgentRuntime,
        rng: &mut dyn RngCore,
    ) -> bool {
        if nearest_within(runtime, config.aggregation_distance) {
            runtime.mode = AgentMode::Stopped;
            body.speed = 0.0;
        } else {
            runtime.mode = AgentMode::Moving;
            body.speed = config.max_speed;
            body.heading += rng.random_range(-MOVE_JITTER..MOVE_JITTER);
        }
        true
    }
}

/// Proximity stop with a countdown and a departure state.
///
/// Stopped agents reconsider when the countdown expires: a small local
/// cluster, or plain restlessness, sends them off opposite the mean neighbor
/// bearing at elevated speed for a short while.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimedStop;

impl BehaviorPolicy for TimedStop {
    fn name(&self) -> &'static str {
        "timed-stop"
    }

    fn initial_mode(&self) -> AgentMode {
        AgentMode::Moving
    }

    fn boundary(&self) -> BoundaryBehavior {
        BoundaryBehavior::Reflect
    }

    fn decide(
        &self,
        config: &SwarmBotsConfig,
        body: &mut AgentBody,
        runtime: &mut AgentRuntime,
        rng: &mut dyn RngCore,
    ) -> bool {
        match runtime.mode {
            AgentMode::Moving => {
                if nearest_within(runtime, config.aggregation_distance) {
                    runtime.mode = AgentMode::Stopped;
                    runtime.timer = config.wait_ticks;
                    body.speed = 0.0;
                } else {
                    body.heading += rng.random_range(-MOVE_JITTER..MOVE_JITTER);
                    body.speed = config.max_speed;
                }
            }
            AgentMode::Stopped => {
                body.speed = 0.0;
                runtime.timer = runtime.timer.saturating_sub(1);
                if runtime.timer == 0 {
                    let cluster = runtime
                        .close_neighbors(config.aggregation_distance)
                        .count();
                    if cluster < SMALL_CLUSTER || rng.random::<f32>() < RESTLESS_CHANCE {
                        runtime.mode = AgentMode::Leaving;
                        runtime.timer = config.leave_ticks;
                        if let Some(bearing) = mean_bearing(&runtime.neighbors) {
                            body.heading = bearing + PI;
                        }
                    } else {
                        runtime.timer = config.wait_ticks;
                    }
                }
            }
            AgentMode::Leaving => {
                body.speed = config.max_speed * DEPART_SPEED_FACTOR;
                runtime.timer = runtime.timer.saturating_sub(1);
                if runtime.timer == 0 {
                    runtime.mode = AgentMode::Moving;
                    body.speed = config.max_speed;
                }
            }
            // Stale tag from a previously selected behavior.
            _ => runtime.mode = AgentMode::Moving,
        }
        true
    }
}

/// Aggregation with cluster-size sensitivity.
///
/// Small clusters attract movers and shed members readily; large clusters
/// merely slow passers-by and hold on to members with a departure chance that
/// shrinks with size but never fully vanishes. Isolated agents drift back
/// toward the arena center.
#[derive(Debug, Clone, Copy, Default)]
pub struct TunedAggregation;

impl BehaviorPolicy for TunedAggregation {
    fn name(&self) -> &'static str {
        "aggregate"
    }

    fn initial_mode(&self) -> AgentMode {
        AgentMode::Moving
    }

    fn boundary(&self) -> BoundaryBehavior {
        BoundaryBehavior::Reflect
    }

    fn decide(
        &self,
        config: &SwarmBotsConfig,
        body: &mut AgentBody,
        runtime: &mut AgentRuntime,
        rng: &mut dyn RngCore,
    ) -> bool {
        let close: Vec<NeighborSample> = runtime
            .close_neighbors(config.aggregation_distance)
            .copied()
            .collect();
        let cluster = close.len();

        match runtime.mode {
            AgentMode::Moving => {
                if let Some(nearest) = close.first() {
                    if cluster < JOIN_CLUSTER_CAP {
                        body.heading = nearest.bearing;
                        body.speed = config.max_speed;
                        if nearest.distance < STOP_DISTANCE {
                            runtime.mode = AgentMode::Stopped;
                            runtime.timer = config.wait_ticks * 2;
                        }
                    } else {
                        body.speed = config.max_speed * CROWD_SLOWDOWN;
                    }
                } else {
                    let center_bearing = (config.arena_height as f32 * 0.5 - body.position.y)
                        .atan2(config.arena_width as f32 * 0.5 - body.position.x);
                    body.heading = (1.0 - CENTER_PULL) * body.heading
                        + CENTER_PULL * center_bearing
                        + rng.random_range(-CENTER_JITTER..CENTER_JITTER);
                    body.speed = config.max_speed;
                }
            }
            AgentMode::Stopped => {
                body.speed = 0.0;
                runtime.timer = runtime.timer.saturating_sub(1);
                let leave_chance = if cluster > BIG_CLUSTER {
                    config.leave_probability * 0.1
                } else {
                    config.leave_probability / (cluster as f32 + 1.0)
                };
                if runtime.timer == 0 || rng.random::<f32>() < leave_chance {
                    runtime.mode = AgentMode::Leaving;
                    runtime.timer = EXIT_TICKS;
                    if let Some((cx, cy)) = centroid_offset(&close) {
                        body.heading = (-cy).atan2(-cx);
                    }
                }
            }
            AgentMode::Leaving => {
                body.speed = config.max_speed * EXIT_SPEED_FACTOR;
                runtime.timer = runtime.timer.saturating_sub(1);
                if cluster > REJOIN_CLUSTER && rng.random::<f32>() < REJOIN_CHANCE {
                    runtime.mode = AgentMode::Moving;
                } else if runtime.timer == 0 {
                    runtime.mode = AgentMode::Moving;
                }
            }
            // Stale tag from a previously selected behavior.
            _ => runtime.mode = AgentMode::Moving,
        }
        true
    }
}
