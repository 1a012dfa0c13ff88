//! Collision avoidance: steer away from the closer side, wander otherwise.

use rand::{Rng, RngCore};
use swarmbots_core::{
    AgentBody, AgentMode, AgentRuntime, BehaviorPolicy, BoundaryBehavior, SwarmBotsConfig,
};

const TURN_STEP: f32 = 0.1;
const WANDER_JITTER: f32 = 0.02;

fn side_average(readings: &[f32]) -> f32 {
    readings.iter().sum::<f32>() / readings.len() as f32
}

/// Turns by a fixed increment toward the side with more clearance whenever the
/// front sensor triplet reads below the collision threshold, otherwise wanders
/// with light heading jitter. Turning and advancing happen in the same tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollisionAvoidance;

impl BehaviorPolicy for CollisionAvoidance {
    fn name(&self) -> &'static str {
        "avoid"
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
        let front = config.front_index();
        let front_min = runtime.readings[front - 1..=front + 1]
            .iter()
            .copied()
            .fold(f32::INFINITY, f32::min);

        if front_min < config.collision_threshold {
            let left = side_average(&runtime.readings[..front]);
            let right = side_average(&runtime.readings[front + 1..]);
            if left < right {
                body.heading += TURN_STEP;
            } else {
                body.heading -= TURN_STEP;
            }
        } else {
            body.heading += rng.random_range(-WANDER_JITTER..WANDER_JITTER);
        }
        body.speed = config.robot_speed;
        true
    }
}
