//! Behavior policy implementations for SwarmBots agents.
//!
//! Solo policies (collision avoidance, wall following, coverage sweep) read
//! the ray-cast sensor array; swarm policies (basic stop, timed stop, tuned
//! aggregation) read the sensed neighbor list. The closed [`Behavior`] enum is
//! the full selectable set — shells construct one on each mode switch and
//! install it into the world, so dispatch is a plain match rather than a
//! per-tick name comparison.

mod avoid;
mod swarm;
mod sweep;
mod wall;

pub use avoid::CollisionAvoidance;
pub use swarm::{BasicStop, TimedStop, TunedAggregation};
pub use sweep::CoverageSweep;
pub use wall::WallFollow;

use rand::RngCore;
use swarmbots_core::{
    AgentBody, AgentMode, AgentRuntime, BehaviorPolicy, BoundaryBehavior, SwarmBotsConfig,
};

/// Discriminant for the closed behavior set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BehaviorKind {
    Avoid,
    WallFollow,
    Sweep,
    BasicStop,
    TimedStop,
    Aggregate,
}

impl BehaviorKind {
    /// Every selectable behavior, in menu order.
    pub const ALL: [Self; 6] = [
        Self::Avoid,
        Self::WallFollow,
        Self::Sweep,
        Self::BasicStop,
        Self::TimedStop,
        Self::Aggregate,
    ];
}

/// Closed tagged set of behavior policies, one variant per policy.
pub enum Behavior {
    Avoid(CollisionAvoidance),
    WallFollow(WallFollow),
    Sweep(CoverageSweep),
    BasicStop(BasicStop),
    TimedStop(TimedStop),
    Aggregate(TunedAggregation),
}

impl Behavior {
    /// Construct the policy for a discriminant.
    #[must_use]
    pub fn new(kind: BehaviorKind) -> Self {
        match kind {
            BehaviorKind::Avoid => Self::Avoid(CollisionAvoidance),
            BehaviorKind::WallFollow => Self::WallFollow(WallFollow),
            BehaviorKind::Sweep => Self::Sweep(CoverageSweep),
            BehaviorKind::BasicStop => Self::BasicStop(BasicStop),
            BehaviorKind::TimedStop => Self::TimedStop(TimedStop),
            BehaviorKind::Aggregate => Self::Aggregate(TunedAggregation),
        }
    }

    /// The discriminant of this policy.
    #[must_use]
    pub fn kind(&self) -> BehaviorKind {
        match self {
            Self::Avoid(_) => BehaviorKind::Avoid,
            Self::WallFollow(_) => BehaviorKind::WallFollow,
            Self::Sweep(_) => BehaviorKind::Sweep,
            Self::BasicStop(_) => BehaviorKind::BasicStop,
            Self::TimedStop(_) => BehaviorKind::TimedStop,
            Self::Aggregate(_) => BehaviorKind::Aggregate,
        }
    }

    /// Boxed policy ready to install into a world.
    #[must_use]
    pub fn boxed(kind: BehaviorKind) -> Box<dyn BehaviorPolicy> {
        Box::new(Self::new(kind))
    }

    fn inner(&self) -> &dyn BehaviorPolicy {
        match self {
            Self::Avoid(policy) => policy,
            Self::WallFollow(policy) => policy,
            Self::Sweep(policy) => policy,
            Self::BasicStop(policy) => policy,
            Self::TimedStop(policy) => policy,
            Self::Aggregate(policy) => policy,
        }
    }
}

impl BehaviorPolicy for Behavior {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn initial_mode(&self) -> AgentMode {
        self.inner().initial_mode()
    }

    fn boundary(&self) -> BoundaryBehavior {
        self.inner().boundary()
    }

    fn decide(
        &self,
        config: &SwarmBotsConfig,
        body: &mut AgentBody,
        runtime: &mut AgentRuntime,
        rng: &mut dyn RngCore,
    ) -> bool {
        self.inner().decide(config, body, runtime, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_round_trips_through_the_enum() {
        for kind in BehaviorKind::ALL {
            let behavior = Behavior::new(kind);
            assert_eq!(behavior.kind(), kind);
            assert!(!behavior.name().is_empty());
        }
    }

    #[test]
    fn swarm_policies_reflect_and_solo_policies_clamp() {
        for kind in BehaviorKind::ALL {
            let behavior = Behavior::new(kind);
            let expected = match kind {
                BehaviorKind::Avoid | BehaviorKind::WallFollow | BehaviorKind::Sweep => {
                    BoundaryBehavior::Clamp
                }
                _ => BoundaryBehavior::Reflect,
            };
            assert_eq!(behavior.boundary(), expected, "{:?}", kind);
        }
    }
}
