use swarmbots_behavior::{BasicStop, Behavior, BehaviorKind, TunedAggregation, WallFollow};
use swarmbots_core::{
    AgentId, AgentMode, ObstacleField, Position, Rect, SwarmBotsConfig, WorldState,
};

fn world_with(
    config: SwarmBotsConfig,
    obstacles: ObstacleField,
    kind: BehaviorKind,
) -> WorldState {
    let mut world =
        WorldState::new(config, obstacles, Behavior::boxed(kind)).expect("world");
    world.reset();
    world
}

fn place(world: &mut WorldState, id: AgentId, x: f32, y: f32, heading: f32) {
    let body = world.body_mut(id).expect("body");
    body.position = Position::new(x, y);
    body.heading = heading;
}

#[test]
fn agent_facing_a_wall_turns_instead_of_driving_into_it() {
    let config = SwarmBotsConfig {
        arena_width: 300,
        arena_height: 300,
        roster_size: 1,
        rng_seed: Some(1),
        ..SwarmBotsConfig::default()
    };
    // A single interior wall ten units ahead of the agent; the arena edges are
    // left open so only that wall registers.
    let obstacles = ObstacleField::open().with_obstacle(Rect::new(60.0, 100.0, 20.0, 100.0));
    let mut world = world_with(config, obstacles, BehaviorKind::Avoid);
    let id = world.roster()[0];
    place(&mut world, id, 50.0, 150.0, 0.0);

    world.step();

    let runtime = world.agent_runtime(id).expect("runtime");
    let front = world.config().front_index();
    assert_eq!(runtime.readings[front], 10.0);

    // Clearances are symmetric, so the tie breaks toward a left turn of
    // exactly the fixed increment.
    let body = world.body(id).expect("body");
    assert!((body.heading - (-0.1)).abs() < 1e-6);
}

#[test]
fn two_close_swarm_agents_stop_in_one_tick() {
    let config = SwarmBotsConfig {
        roster_size: 2,
        rng_seed: Some(2),
        ..SwarmBotsConfig::default()
    };
    let obstacles = ObstacleField::bounded(1000.0, 800.0, 10.0);
    let mut world = world_with(config, obstacles, BehaviorKind::BasicStop);
    let ids: Vec<AgentId> = world.roster().to_vec();
    place(&mut world, ids[0], 100.0, 100.0, 0.0);
    place(&mut world, ids[1], 105.0, 100.0, 0.0);

    world.step();

    for &id in &ids {
        let runtime = world.agent_runtime(id).expect("runtime");
        assert_eq!(runtime.mode, AgentMode::Stopped);
        let body = world.body(id).expect("body");
        assert_eq!(body.speed, 0.0);
    }
    // Stopped agents did not move.
    assert_eq!(
        world.body(ids[0]).expect("body").position,
        Position::new(100.0, 100.0)
    );
    assert_eq!(
        world.body(ids[1]).expect("body").position,
        Position::new(105.0, 100.0)
    );
}

#[test]
fn cluster_detector_reports_the_five_agent_blob_only() {
    let config = SwarmBotsConfig {
        roster_size: 6,
        rng_seed: Some(3),
        ..SwarmBotsConfig::default()
    };
    let obstacles = ObstacleField::bounded(1000.0, 800.0, 10.0);
    let mut world = world_with(config, obstacles, BehaviorKind::BasicStop);
    let ids: Vec<AgentId> = world.roster().to_vec();
    // Five agents chained ten units apart, one agent far away.
    for (i, &id) in ids[..5].iter().enumerate() {
        place(&mut world, id, 100.0 + 10.0 * i as f32, 100.0, 0.0);
    }
    place(&mut world, ids[5], 800.0, 600.0, 0.0);

    world.step();

    assert_eq!(world.clusters().len(), 1);
    let cluster = &world.clusters()[0];
    assert_eq!(cluster.len(), 5);
    for id in &ids[..5] {
        assert!(cluster.contains(id));
    }
    assert!(!cluster.contains(&ids[5]));
}

#[test]
fn wall_follower_stays_searching_until_a_wall_registers() {
    // Phase one: no obstacles anywhere, so every reading pins at max range and
    // the agent keeps searching.
    let config = SwarmBotsConfig {
        arena_width: 300,
        arena_height: 300,
        roster_size: 1,
        rng_seed: Some(4),
        ..SwarmBotsConfig::default()
    };
    let mut world = world_with(config.clone(), ObstacleField::open(), BehaviorKind::WallFollow);
    let id = world.roster()[0];
    place(&mut world, id, 150.0, 150.0, 0.0);

    for _ in 0..30 {
        world.step();
        assert_eq!(
            world.agent_runtime(id).expect("runtime").mode,
            AgentMode::Searching
        );
    }

    // Phase two: a bounded arena with the agent close to the left wall flips
    // the mode exactly once, and it stays flipped.
    let obstacles = ObstacleField::bounded(300.0, 300.0, 10.0);
    let mut world = world_with(config, obstacles, BehaviorKind::WallFollow);
    let id = world.roster()[0];
    place(&mut world, id, 55.0, 150.0, std::f32::consts::PI);

    world.step();
    assert_eq!(
        world.agent_runtime(id).expect("runtime").mode,
        AgentMode::Following
    );
    for _ in 0..20 {
        world.step();
        assert_eq!(
            world.agent_runtime(id).expect("runtime").mode,
            AgentMode::Following
        );
    }
}

#[test]
fn tuned_aggregation_runs_deterministically_under_a_fixed_seed() {
    let build = || {
        let config = SwarmBotsConfig {
            arena_width: 400,
            arena_height: 300,
            roster_size: 20,
            rng_seed: Some(0xACE),
            ..SwarmBotsConfig::default()
        };
        let obstacles = ObstacleField::bounded(400.0, 300.0, 10.0);
        let mut world =
            WorldState::new(config, obstacles, Box::new(TunedAggregation)).expect("world");
        world.reset();
        world
    };

    let mut world_a = build();
    let mut world_b = build();
    for _ in 0..150 {
        world_a.step();
        world_b.step();
    }

    for (&id_a, &id_b) in world_a.roster().iter().zip(world_b.roster()) {
        assert_eq!(world_a.body(id_a), world_b.body(id_b));
        assert_eq!(
            world_a.agent_runtime(id_a).expect("runtime").mode,
            world_b.agent_runtime(id_b).expect("runtime").mode
        );
    }

    let counts = world_a.history().last().expect("summary");
    assert_eq!(
        counts.moving + counts.stopped + counts.leaving,
        counts.agent_count
    );
}

#[test]
fn basic_stop_swarm_settles_into_clusters() {
    let config = SwarmBotsConfig {
        arena_width: 400,
        arena_height: 300,
        roster_size: 20,
        rng_seed: Some(5),
        ..SwarmBotsConfig::default()
    };
    let obstacles = ObstacleField::bounded(400.0, 300.0, 10.0);
    let mut world = world_with(config, obstacles, BehaviorKind::BasicStop);

    for _ in 0..400 {
        world.step();
    }

    // Every mode tag is still drawn from the swarm set, and any reported
    // cluster has at least two members.
    for &id in world.roster() {
        let mode = world.agent_runtime(id).expect("runtime").mode;
        assert!(matches!(mode, AgentMode::Moving | AgentMode::Stopped));
    }
    for cluster in world.clusters() {
        assert!(cluster.len() > 1);
    }
}

#[test]
fn switching_policy_mid_run_resets_agent_state() {
    let config = SwarmBotsConfig {
        arena_width: 400,
        arena_height: 300,
        roster_size: 12,
        rng_seed: Some(6),
        ..SwarmBotsConfig::default()
    };
    let obstacles = ObstacleField::bounded(400.0, 300.0, 10.0);
    let mut world = world_with(config, obstacles, BehaviorKind::TimedStop);
    for _ in 0..200 {
        world.step();
    }

    world.set_policy(Box::new(WallFollow));
    for &id in world.roster() {
        assert_eq!(
            world.agent_runtime(id).expect("runtime").mode,
            AgentMode::Searching
        );
        assert_eq!(world.agent_runtime(id).expect("runtime").timer, 0);
    }

    world.set_policy(Box::new(BasicStop));
    world.step();
    for &id in world.roster() {
        let mode = world.agent_runtime(id).expect("runtime").mode;
        assert!(matches!(mode, AgentMode::Moving | AgentMode::Stopped));
    }
}
