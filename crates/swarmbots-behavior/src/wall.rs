//! Wall following: wander until a wall is found, then hold a fixed offset.

use rand::{Rng, RngCore};
use swarmbots_core::{
    AgentBody, AgentMode, AgentRuntime, BehaviorPolicy, BoundaryBehavior, SwarmBotsConfig,
};

const ESCAPE_TURN: f32 = 0.1;
const TRIM_TURN: f32 = 0.05;
const SEARCH_JITTER: f32 = 0.05;

/// Two-state follower keeping the wall on the right side.
///
/// `Searching` wanders until any sensor drops below the wall-found threshold;
/// `Following` turns away from imminent front obstacles and trims toward or
/// away from the wall whenever the right sensor drifts out of the desired
/// offset band. Turn-in-place corrections do not advance the agent.
#[derive(Debug, Clone, Copy, Default)]
pub struct WallFollow;

impl BehaviorPolicy for WallFollow {
    fn name(&self) -> &'static str {
        "wall-follow"
    }

    fn initial_mode(&self) -> AgentMode {
        AgentMode::Searching
    }

    fn boundary(&self) -> BoundaryBehavior {
        BoundaryBehavior::Clamp
    }

    fn decide(
        &self,
        config: &SwarmBotsConfig,
        body: &mut AgentBody,
        runtime: &mut AgentRuntime,
        rng: &mut dyn RngCore,
    ) -> bool {
        body.speed = config.robot_speed;
        match runtime.mode {
            AgentMode::Searching => {
                let closest = runtime
                    .readings
                    .iter()
                    .copied()
                    .fold(f32::INFINITY, f32::min);
                if closest < config.wall_found_threshold {
                    runtime.mode = AgentMode::Following;
                    false
                } else {
                    body.heading += rng.random_range(-SEARCH_JITTER..SEARCH_JITTER);
                    true
                }
            }
            AgentMode::Following => {
                let front = config.front_index();
                let front_reading = runtime.readings[front];
                let right_reading = runtime.readings[front + 2];
                if front_reading < config.front_obstacle_threshold {
                    body.heading -= ESCAPE_TURN;
                    false
                } else if right_reading > config.wall_follow_distance + config.wall_follow_band {
                    body.heading += TRIM_TURN;
                    false
                } else if right_reading < config.wall_follow_distance - config.wall_follow_band {
                    body.heading -= TRIM_TURN;
                    false
                } else {
                    true
                }
            }
            // Stale tag from a previously selected behavior.
            _ => {
                runtime.mode = AgentMode::Searching;
                false
            }
        }
    }
}
