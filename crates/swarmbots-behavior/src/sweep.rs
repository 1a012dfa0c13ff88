//! Coverage sweep: an expanding spiral with quarter-turn obstacle escapes.

use rand::{Rng, RngCore};
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};
use swarmbots_core::{
    AgentBody, AgentMode, AgentRuntime, BehaviorPolicy, BoundaryBehavior, SwarmBotsConfig,
};

const SPIRAL_BASE: f32 = 0.02;
const SPIRAL_GROWTH: f32 = 0.0001;
const KICK_CHANCE: f32 = 0.05;

/// Vacuum-style coverage pattern.
///
/// Each tick the visited position is pushed onto the bounded trail (display
/// data only — it never feeds back into the decision beyond its length). An
/// imminent front obstacle triggers a quarter turn; otherwise the heading
/// drifts into a slowly widening spiral, with a small chance of a larger
/// random kick to escape local stalls.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoverageSweep;

impl BehaviorPolicy for CoverageSweep {
    fn name(&self) -> &'static str {
        "sweep"
    }

    fn initial_mode(&self) -> AgentMode {
        AgentMode::Moving
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
        runtime.push_trail(body.position, config.trail_capacity);

        let front_reading = runtime.readings[config.front_index()];
        if front_reading < config.front_obstacle_threshold {
            body.heading += FRAC_PI_2;
        } else {
            body.heading += SPIRAL_BASE + runtime.trail.len() as f32 * SPIRAL_GROWTH;
            if rng.random::<f32>() < KICK_CHANCE {
                body.heading += rng.random_range(-FRAC_PI_4..FRAC_PI_4);
            }
        }
        body.speed = config.robot_speed;
        true
    }
}
