//! Core types shared across the SwarmBots workspace.
//!
//! The world owns the agent roster, the obstacle field, and the per-tick
//! pipeline: sense all agents from a settled snapshot, let the active policy
//! decide for each agent, apply movement with boundary handling, then extract
//! proximity clusters. Rendering shells consume the read-only accessors and
//! never mutate agent internals directly.

use ordered_float::OrderedFloat;
use rand::{Rng, RngCore, SeedableRng, rngs::SmallRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use slotmap::{SecondaryMap, SlotMap, new_key_type};
use std::collections::{HashSet, VecDeque};
use std::fmt;
use swarmbots_index::{NeighborhoodIndex, UniformGridIndex};
use thiserror::Error;

new_key_type! {
    /// Stable handle for agents backed by a generational slot map.
    pub struct AgentId;
}

/// Convenience alias for associating side data with agents.
pub type AgentMap<T> = SecondaryMap<AgentId, T>;

const FULL_TURN: f32 = std::f32::consts::TAU;

/// High level simulation clock (ticks processed since boot or reset).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tick(pub u64);

impl Tick {
    /// Returns the next sequential tick.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Resets the tick counter back to zero.
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }
}

/// Axis-aligned 2D position.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    /// Construct a new position.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle used for walls and interior obstacles.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    /// Construct a new rectangle from its top-left corner and extents.
    #[must_use]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether the point lies inside the rectangle (edges inclusive).
    #[must_use]
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }
}

/// Immutable obstacle regions shared read-only by all agents' sensing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObstacleField {
    rects: Vec<Rect>,
}

impl ObstacleField {
    /// An empty field with no walls at all.
    #[must_use]
    pub fn open() -> Self {
        Self::default()
    }

    /// Four boundary walls of the given thickness around the arena.
    #[must_use]
    pub fn bounded(width: f32, height: f32, thickness: f32) -> Self {
        Self {
            rects: vec![
                Rect::new(0.0, 0.0, width, thickness),
                Rect::new(0.0, height - thickness, width, thickness),
                Rect::new(0.0, 0.0, thickness, height),
                Rect::new(width - thickness, 0.0, thickness, height),
            ],
        }
    }

    /// Boundary walls plus the stock interior obstacle arrangement.
    #[must_use]
    pub fn demo(width: f32, height: f32) -> Self {
        Self::bounded(width, height, 10.0)
            .with_obstacle(Rect::new(200.0, 200.0, 100.0, 20.0))
            .with_obstacle(Rect::new(500.0, 300.0, 20.0, 100.0))
            .with_obstacle(Rect::new(300.0, 400.0, 80.0, 80.0))
    }

    /// Add an interior obstacle.
    #[must_use]
    pub fn with_obstacle(mut self, rect: Rect) -> Self {
        self.rects.push(rect);
        self
    }

    /// The obstacle rectangles, for rendering shells.
    #[must_use]
    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    /// Whether any obstacle covers the point.
    #[must_use]
    pub fn is_occupied(&self, x: f32, y: f32) -> bool {
        self.rects.iter().any(|rect| rect.contains(x, y))
    }

    /// March a ray outward in unit steps and return the distance to the first
    /// occupied point, or `range` when nothing is hit.
    ///
    /// First hit wins; the march stops one step short of `range` so the
    /// reading always lies in `[0, range]`.
    #[must_use]
    pub fn raycast(&self, x: f32, y: f32, angle: f32, range: f32) -> f32 {
        let cos = angle.cos();
        let sin = angle.sin();
        let steps = range as u32;
        for step in 1..steps {
            let distance = step as f32;
            if self.is_occupied(x + distance * cos, y + distance * sin) {
                return distance;
            }
        }
        range
    }
}

/// Per-agent behavior state tag.
///
/// Solo policies use `Searching`/`Following` (wall following) or stay in
/// `Moving`; swarm policies cycle `Moving`/`Stopped`/`Leaving`. Policies reset
/// any tag left over from a previously selected behavior.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum AgentMode {
    Searching,
    Following,
    #[default]
    Moving,
    Stopped,
    Leaving,
}

/// One sensed neighbor: identity, distance, and bearing from self to it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct NeighborSample {
    pub id: AgentId,
    pub distance: f32,
    pub bearing: f32,
}

/// Dense kinematic state of a single agent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AgentBody {
    pub position: Position,
    /// Heading in radians; any real value, interpreted modulo a full turn.
    pub heading: f32,
    pub speed: f32,
}

/// Per-agent side data recomputed or mutated by the tick pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRuntime {
    /// Most recent range reading per configured sensor angle, each clamped to
    /// `[0, sensor_range]`.
    pub readings: Vec<f32>,
    /// Neighbors within `neighbor_range`, sorted ascending by distance.
    /// Recomputed every tick, never persisted.
    pub neighbors: Vec<NeighborSample>,
    pub mode: AgentMode,
    /// Countdown used by time-gated transitions; decremented only by the
    /// owning agent's policy step.
    pub timer: u32,
    /// Bounded trail of visited positions, oldest evicted first.
    /// Visualization-only.
    pub trail: VecDeque<Position>,
}

impl AgentRuntime {
    /// Fresh runtime with all sensors reporting max range.
    #[must_use]
    pub fn new(sensor_count: usize, sensor_range: f32, mode: AgentMode) -> Self {
        Self {
            readings: vec![sensor_range; sensor_count],
            neighbors: Vec::new(),
            mode,
            timer: 0,
            trail: VecDeque::new(),
        }
    }

    /// Append a trail point, evicting the oldest once `capacity` is reached.
    pub fn push_trail(&mut self, position: Position, capacity: usize) {
        if self.trail.len() >= capacity {
            self.trail.pop_front();
        }
        self.trail.push_back(position);
    }

    /// Neighbors closer than the aggregation threshold (a prefix, since the
    /// list is sorted ascending).
    pub fn close_neighbors(&self, threshold: f32) -> impl Iterator<Item = &NeighborSample> {
        self.neighbors
            .iter()
            .take_while(move |sample| sample.distance < threshold)
    }
}

/// How the move stage treats the arena boundary for the active policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryBehavior {
    /// Clamp position components into `[radius, dimension - radius]`.
    Clamp,
    /// Negate the heading component perpendicular to the wall, then clamp.
    Reflect,
}

/// A reactive behavior evaluated once per agent per tick.
///
/// Implementations mutate only the supplied agent's heading, speed, mode tag,
/// and timer; they never observe another agent beyond the sensed data already
/// written into the runtime. The returned flag states whether the agent
/// advances along its heading this tick.
pub trait BehaviorPolicy: Send {
    /// Static identifier of the policy (for logs and shells).
    fn name(&self) -> &'static str;

    /// Mode tag assigned to every agent when this policy is (re)selected.
    fn initial_mode(&self) -> AgentMode;

    /// Boundary handling applied by the move stage.
    fn boundary(&self) -> BoundaryBehavior;

    /// Turn sensed data into a motion command for one agent.
    fn decide(
        &self,
        config: &SwarmBotsConfig,
        body: &mut AgentBody,
        runtime: &mut AgentRuntime,
        rng: &mut dyn RngCore,
    ) -> bool;
}

/// How the roster is laid out on reset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum SpawnDistribution {
    #[default]
    Random,
    Grid,
    Circle,
}

/// Errors raised when validating world configuration.
#[derive(Debug, Error, PartialEq)]
pub enum WorldStateError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Static configuration for a SwarmBots world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmBotsConfig {
    /// Width of the arena in world units.
    pub arena_width: u32,
    /// Height of the arena in world units.
    pub arena_height: u32,
    /// Body radius; positions are kept within `[radius, dimension - radius]`.
    pub robot_radius: f32,
    /// Cruise speed for solo policies and the post-reset default.
    pub robot_speed: f32,
    /// Top speed used by swarm policies while moving.
    pub max_speed: f32,
    /// Maximum ray-cast sensing distance.
    pub sensor_range: f32,
    /// Fixed sensor offsets in degrees relative to heading, ordered
    /// left-to-right. Must be an odd count of at least five so the front
    /// triplet and the right-side sensors exist.
    pub sensor_angles: Vec<f32>,
    /// Radius for neighbor detection in swarm modes.
    pub neighbor_range: f32,
    /// Distance below which two agents count as neighbors/clustered.
    pub aggregation_distance: f32,
    /// Front reading below this triggers an avoidance turn.
    pub collision_threshold: f32,
    /// Any reading below this flips a searching wall follower to following.
    pub wall_found_threshold: f32,
    /// Front reading below this means an imminent obstacle.
    pub front_obstacle_threshold: f32,
    /// Desired offset from the wall while following.
    pub wall_follow_distance: f32,
    /// Half-width of the acceptable band around `wall_follow_distance`.
    pub wall_follow_band: f32,
    /// Ticks a swarm agent stays stopped before reconsidering.
    pub wait_ticks: u32,
    /// Ticks spent in the leaving state before resuming movement.
    pub leave_ticks: u32,
    /// Baseline departure probability for the tuned aggregation policy.
    pub leave_probability: f32,
    /// Coverage trail capacity; oldest points evicted beyond this.
    pub trail_capacity: usize,
    /// Maximum number of recent tick summaries retained in-memory.
    pub history_capacity: usize,
    /// Roster size created on reset.
    pub roster_size: usize,
    /// Roster layout used on reset.
    pub spawn_distribution: SpawnDistribution,
    /// Optional RNG seed for reproducible runs.
    pub rng_seed: Option<u64>,
}

impl Default for SwarmBotsConfig {
    fn default() -> Self {
        Self {
            arena_width: 1_000,
            arena_height: 800,
            robot_radius: 10.0,
            robot_speed: 2.0,
            max_speed: 3.0,
            sensor_range: 100.0,
            sensor_angles: vec![-45.0, -30.0, -15.0, 0.0, 15.0, 30.0, 45.0],
            neighbor_range: 50.0,
            aggregation_distance: 30.0,
            collision_threshold: 40.0,
            wall_found_threshold: 50.0,
            front_obstacle_threshold: 30.0,
            wall_follow_distance: 40.0,
            wall_follow_band: 10.0,
            wait_ticks: 120,
            leave_ticks: 30,
            leave_probability: 0.01,
            trail_capacity: 500,
            history_capacity: 256,
            roster_size: 20,
            spawn_distribution: SpawnDistribution::Random,
            rng_seed: None,
        }
    }
}

impl SwarmBotsConfig {
    /// Index of the center (front-facing) sensor.
    #[must_use]
    pub fn front_index(&self) -> usize {
        self.sensor_angles.len() / 2
    }

    /// Validates the configuration.
    ///
    /// A sensor layout that cannot satisfy the fixed front/side indices is a
    /// construction defect, not a runtime condition to recover from.
    pub fn validate(&self) -> Result<(), WorldStateError> {
        if self.arena_width == 0 || self.arena_height == 0 {
            return Err(WorldStateError::InvalidConfig(
                "arena dimensions must be non-zero",
            ));
        }
        if self.robot_radius <= 0.0
            || 2.0 * self.robot_radius >= self.arena_width.min(self.arena_height) as f32
        {
            return Err(WorldStateError::InvalidConfig(
                "robot_radius must be positive and fit inside the arena",
            ));
        }
        if self.robot_speed <= 0.0 || self.max_speed <= 0.0 {
            return Err(WorldStateError::InvalidConfig("speeds must be positive"));
        }
        if self.sensor_range < 1.0 {
            return Err(WorldStateError::InvalidConfig(
                "sensor_range must be at least one unit step",
            ));
        }
        if self.sensor_angles.len() < 5 || self.sensor_angles.len() % 2 == 0 {
            return Err(WorldStateError::InvalidConfig(
                "sensor_angles must hold an odd count of at least five angles",
            ));
        }
        if self.neighbor_range <= 0.0 {
            return Err(WorldStateError::InvalidConfig(
                "neighbor_range must be positive",
            ));
        }
        if self.aggregation_distance <= 0.0 || self.aggregation_distance > self.neighbor_range {
            return Err(WorldStateError::InvalidConfig(
                "aggregation_distance must be positive and within neighbor_range",
            ));
        }
        if self.collision_threshold <= 0.0
            || self.wall_found_threshold <= 0.0
            || self.front_obstacle_threshold <= 0.0
            || self.wall_follow_distance <= 0.0
            || self.wall_follow_band <= 0.0
        {
            return Err(WorldStateError::InvalidConfig(
                "sensing thresholds must be positive",
            ));
        }
        if self.wait_ticks == 0 || self.leave_ticks == 0 {
            return Err(WorldStateError::InvalidConfig(
                "wait_ticks and leave_ticks must be non-zero",
            ));
        }
        if !(0.0..=1.0).contains(&self.leave_probability) {
            return Err(WorldStateError::InvalidConfig(
                "leave_probability must lie in [0, 1]",
            ));
        }
        if self.trail_capacity == 0 || self.history_capacity == 0 || self.roster_size == 0 {
            return Err(WorldStateError::InvalidConfig(
                "trail, history, and roster sizes must be non-zero",
            ));
        }
        Ok(())
    }

    /// Returns the configured RNG, seeding from entropy when no seed is set.
    fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }
}

/// Per-tick aggregate counters retained in the bounded history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TickSummary {
    pub tick: Tick,
    pub agent_count: usize,
    pub searching: usize,
    pub following: usize,
    pub moving: usize,
    pub stopped: usize,
    pub leaving: usize,
    pub cluster_count: usize,
    pub largest_cluster: usize,
}

/// Events emitted after processing a world tick.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TickEvents {
    pub tick: Tick,
    pub cluster_count: usize,
    pub largest_cluster: usize,
}

struct SenseResult {
    readings: Vec<f32>,
    neighbors: Vec<NeighborSample>,
}

/// Aggregate world state shared by the simulation and its shell.
pub struct WorldState {
    config: SwarmBotsConfig,
    obstacles: ObstacleField,
    tick: Tick,
    rng: SmallRng,
    bodies: SlotMap<AgentId, AgentBody>,
    runtime: AgentMap<AgentRuntime>,
    roster: Vec<AgentId>,
    index: UniformGridIndex,
    policy: Box<dyn BehaviorPolicy>,
    clusters: Vec<Vec<AgentId>>,
    history: VecDeque<TickSummary>,
}

impl fmt::Debug for WorldState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorldState")
            .field("config", &self.config)
            .field("tick", &self.tick)
            .field("agent_count", &self.roster.len())
            .field("policy", &self.policy.name())
            .finish()
    }
}

impl WorldState {
    /// Instantiate an empty world; call [`WorldState::reset`] to seed the
    /// roster.
    pub fn new(
        config: SwarmBotsConfig,
        obstacles: ObstacleField,
        policy: Box<dyn BehaviorPolicy>,
    ) -> Result<Self, WorldStateError> {
        config.validate()?;
        let rng = config.seeded_rng();
        let index = UniformGridIndex::new(
            config.neighbor_range,
            config.arena_width as f32,
            config.arena_height as f32,
        );
        let history_capacity = config.history_capacity;
        Ok(Self {
            config,
            obstacles,
            tick: Tick::zero(),
            rng,
            bodies: SlotMap::with_key(),
            runtime: AgentMap::new(),
            roster: Vec::new(),
            index,
            policy,
            clusters: Vec::new(),
            history: VecDeque::with_capacity(history_capacity),
        })
    }

    /// Replace the roster wholesale: fresh positions per the configured spawn
    /// distribution, random headings, the active policy's initial mode, and a
    /// zeroed clock.
    pub fn reset(&mut self) {
        self.bodies.clear();
        self.runtime.clear();
        self.roster.clear();
        self.clusters.clear();
        self.history.clear();
        self.tick = Tick::zero();

        let positions = self.spawn_positions();
        let sensor_count = self.config.sensor_angles.len();
        let sensor_range = self.config.sensor_range;
        let speed = self.config.robot_speed;
        let mode = self.policy.initial_mode();
        for position in positions {
            let heading = self.rng.random_range(0.0..FULL_TURN);
            let id = self.bodies.insert(AgentBody {
                position,
                heading,
                speed,
            });
            self.runtime
                .insert(id, AgentRuntime::new(sensor_count, sensor_range, mode));
            self.roster.push(id);
        }
    }

    fn spawn_positions(&mut self) -> Vec<Position> {
        let count = self.config.roster_size;
        let width = self.config.arena_width as f32;
        let height = self.config.arena_height as f32;
        let margin = 2.0 * self.config.robot_radius;
        match self.config.spawn_distribution {
            SpawnDistribution::Random => (0..count)
                .map(|_| {
                    Position::new(
                        self.rng.random_range(margin..width - margin),
                        self.rng.random_range(margin..height - margin),
                    )
                })
                .collect(),
            SpawnDistribution::Grid => {
                let cols = (count as f32).sqrt().ceil() as usize;
                let rows = count.div_ceil(cols);
                let step_x = (width - 2.0 * margin) / cols as f32;
                let step_y = (height - 2.0 * margin) / rows as f32;
                (0..count)
                    .map(|i| {
                        let col = (i % cols) as f32;
                        let row = (i / cols) as f32;
                        Position::new(
                            margin + (col + 0.5) * step_x,
                            margin + (row + 0.5) * step_y,
                        )
                    })
                    .collect()
            }
            SpawnDistribution::Circle => {
                let ring = 0.25 * width.min(height);
                let center_x = width * 0.5;
                let center_y = height * 0.5;
                (0..count)
                    .map(|i| {
                        let angle = i as f32 / count as f32 * FULL_TURN;
                        Position::new(
                            center_x + ring * angle.cos(),
                            center_y + ring * angle.sin(),
                        )
                    })
                    .collect()
            }
        }
    }

    /// Install a new behavior policy, effective in full on the next tick.
    ///
    /// Every agent's mode, timer, trail, and sensed neighbors are reset so no
    /// stale state from the previous policy leaks through.
    pub fn set_policy(&mut self, policy: Box<dyn BehaviorPolicy>) {
        self.policy = policy;
        let mode = self.policy.initial_mode();
        let speed = self.config.robot_speed;
        for &id in &self.roster {
            if let Some(runtime) = self.runtime.get_mut(id) {
                runtime.mode = mode;
                runtime.timer = 0;
                runtime.trail.clear();
                runtime.neighbors.clear();
            }
            if let Some(body) = self.bodies.get_mut(id) {
                body.speed = speed;
            }
        }
    }

    /// Execute one simulation tick: sense, decide, move, cluster, summarize.
    pub fn step(&mut self) -> TickEvents {
        let next_tick = self.tick.next();
        self.stage_sense();
        let advances = self.stage_decide();
        self.stage_move(&advances);
        self.stage_clusters();
        self.stage_summary(next_tick);
        self.tick = next_tick;
        TickEvents {
            tick: next_tick,
            cluster_count: self.clusters.len(),
            largest_cluster: self.clusters.iter().map(Vec::len).max().unwrap_or(0),
        }
    }

    /// Compute every agent's sensor readings and neighbor list from a snapshot
    /// of the settled positions, before any decision runs.
    fn stage_sense(&mut self) {
        let count = self.roster.len();
        if count == 0 {
            return;
        }

        let mut snapshot = Vec::with_capacity(count);
        let mut headings = Vec::with_capacity(count);
        for &id in &self.roster {
            if let Some(body) = self.bodies.get(id) {
                snapshot.push((body.position.x, body.position.y));
                headings.push(body.heading);
            } else {
                snapshot.push((0.0, 0.0));
                headings.push(0.0);
            }
        }

        if self.index.rebuild(&snapshot).is_err() {
            return;
        }

        let index = &self.index;
        let obstacles = &self.obstacles;
        let config = &self.config;
        let roster = &self.roster;
        let radius_sq = config.neighbor_range * config.neighbor_range;

        let results: Vec<SenseResult> = (0..count)
            .into_par_iter()
            .map(|idx| {
                let (x, y) = snapshot[idx];
                let heading = headings[idx];
                let readings: Vec<f32> = config
                    .sensor_angles
                    .iter()
                    .map(|offset| {
                        obstacles.raycast(x, y, heading + offset.to_radians(), config.sensor_range)
                    })
                    .collect();

                let mut neighbors = Vec::new();
                index.neighbors_within(idx, radius_sq, &mut |other, dist_sq| {
                    let (ox, oy) = snapshot[other];
                    neighbors.push(NeighborSample {
                        id: roster[other],
                        distance: dist_sq.into_inner().sqrt(),
                        bearing: (oy - y).atan2(ox - x),
                    });
                });
                neighbors.sort_by_key(|sample| OrderedFloat(sample.distance));

                SenseResult {
                    readings,
                    neighbors,
                }
            })
            .collect();

        for (idx, &id) in self.roster.iter().enumerate() {
            if let Some(runtime) = self.runtime.get_mut(id) {
                let result = &results[idx];
                runtime.readings.clone_from(&result.readings);
                runtime.neighbors.clone_from(&result.neighbors);
            }
        }
    }

    /// Run the active policy for every agent against its own sensed data.
    fn stage_decide(&mut self) -> Vec<bool> {
        let mut advances = Vec::with_capacity(self.roster.len());
        for idx in 0..self.roster.len() {
            let id = self.roster[idx];
            let Some(body) = self.bodies.get_mut(id) else {
                advances.push(false);
                continue;
            };
            let Some(runtime) = self.runtime.get_mut(id) else {
                advances.push(false);
                continue;
            };
            advances.push(self.policy.decide(&self.config, body, runtime, &mut self.rng));
        }
        advances
    }

    /// Advance agents along their headings and apply boundary handling.
    fn stage_move(&mut self, advances: &[bool]) {
        let width = self.config.arena_width as f32;
        let height = self.config.arena_height as f32;
        let radius = self.config.robot_radius;
        let boundary = self.policy.boundary();
        for (idx, &id) in self.roster.iter().enumerate() {
            let Some(body) = self.bodies.get_mut(id) else {
                continue;
            };
            if advances.get(idx).copied().unwrap_or(false) && body.speed > 0.0 {
                body.position.x += body.speed * body.heading.cos();
                body.position.y += body.speed * body.heading.sin();
            }
            if boundary == BoundaryBehavior::Reflect {
                if body.position.x < radius || body.position.x > width - radius {
                    body.heading = std::f32::consts::PI - body.heading;
                }
                if body.position.y < radius || body.position.y > height - radius {
                    body.heading = -body.heading;
                }
            }
            body.position.x = body.position.x.clamp(radius, width - radius);
            body.position.y = body.position.y.clamp(radius, height - radius);
        }
    }

    /// Rebuild the proximity clusters from this tick's neighbor lists.
    ///
    /// Adjacency is the aggregation-distance relation treated as symmetric;
    /// components are extracted with an explicit stack, and only groups with
    /// more than one member are reported. No cluster identity carries across
    /// ticks.
    fn stage_clusters(&mut self) {
        let threshold = self.config.aggregation_distance;
        let mut adjacency: AgentMap<Vec<AgentId>> = AgentMap::new();
        for &id in &self.roster {
            adjacency.insert(id, Vec::new());
        }
        for &id in &self.roster {
            let Some(runtime) = self.runtime.get(id) else {
                continue;
            };
            for sample in runtime.close_neighbors(threshold) {
                if let Some(edges) = adjacency.get_mut(id) {
                    edges.push(sample.id);
                }
                if let Some(edges) = adjacency.get_mut(sample.id) {
                    edges.push(id);
                }
            }
        }

        let mut visited: HashSet<AgentId> = HashSet::with_capacity(self.roster.len());
        let mut clusters = Vec::new();
        for &start in &self.roster {
            if visited.contains(&start) {
                continue;
            }
            let mut group = Vec::new();
            let mut stack = vec![start];
            while let Some(current) = stack.pop() {
                if !visited.insert(current) {
                    continue;
                }
                group.push(current);
                if let Some(edges) = adjacency.get(current) {
                    for &next in edges {
                        if !visited.contains(&next) {
                            stack.push(next);
                        }
                    }
                }
            }
            if group.len() > 1 {
                clusters.push(group);
            }
        }
        self.clusters = clusters;
    }

    fn stage_summary(&mut self, tick: Tick) {
        let mut summary = TickSummary {
            tick,
            agent_count: self.roster.len(),
            searching: 0,
            following: 0,
            moving: 0,
            stopped: 0,
            leaving: 0,
            cluster_count: self.clusters.len(),
            largest_cluster: self.clusters.iter().map(Vec::len).max().unwrap_or(0),
        };
        for &id in &self.roster {
            let Some(runtime) = self.runtime.get(id) else {
                continue;
            };
            match runtime.mode {
                AgentMode::Searching => summary.searching += 1,
                AgentMode::Following => summary.following += 1,
                AgentMode::Moving => summary.moving += 1,
                AgentMode::Stopped => summary.stopped += 1,
                AgentMode::Leaving => summary.leaving += 1,
            }
        }
        if self.history.len() >= self.config.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(summary);
    }

    /// Returns an immutable reference to configuration.
    #[must_use]
    pub fn config(&self) -> &SwarmBotsConfig {
        &self.config
    }

    /// The obstacle field shared read-only by sensing.
    #[must_use]
    pub fn obstacles(&self) -> &ObstacleField {
        &self.obstacles
    }

    /// Current simulation tick.
    #[must_use]
    pub const fn tick(&self) -> Tick {
        self.tick
    }

    /// The active behavior policy.
    #[must_use]
    pub fn policy(&self) -> &dyn BehaviorPolicy {
        self.policy.as_ref()
    }

    /// Agent handles in stable iteration order.
    #[must_use]
    pub fn roster(&self) -> &[AgentId] {
        &self.roster
    }

    /// Number of live agents.
    #[must_use]
    pub fn agent_count(&self) -> usize {
        self.roster.len()
    }

    /// Borrow the kinematic state of a specific agent.
    #[must_use]
    pub fn body(&self, id: AgentId) -> Option<&AgentBody> {
        self.bodies.get(id)
    }

    /// Borrow runtime data for a specific agent.
    #[must_use]
    pub fn agent_runtime(&self, id: AgentId) -> Option<&AgentRuntime> {
        self.runtime.get(id)
    }

    /// Mutably borrow a specific agent's kinematic state (shell reset hooks
    /// and tests only; the tick pipeline never needs this).
    #[must_use]
    pub fn body_mut(&mut self, id: AgentId) -> Option<&mut AgentBody> {
        self.bodies.get_mut(id)
    }

    /// Mutably borrow runtime data for a specific agent.
    #[must_use]
    pub fn agent_runtime_mut(&mut self, id: AgentId) -> Option<&mut AgentRuntime> {
        self.runtime.get_mut(id)
    }

    /// Clusters extracted on the most recent tick.
    #[must_use]
    pub fn clusters(&self) -> &[Vec<AgentId>] {
        &self.clusters
    }

    /// Iterate over retained tick summaries, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &TickSummary> {
        self.history.iter()
    }

    /// Borrow the world RNG mutably for deterministic sampling.
    #[must_use]
    pub fn rng(&mut self) -> &mut SmallRng {
        &mut self.rng
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal policy: jitter the heading and keep moving.
    struct Drift;

    impl BehaviorPolicy for Drift {
        fn name(&self) -> &'static str {
            "test.drift"
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
            _runtime: &mut AgentRuntime,
            rng: &mut dyn RngCore,
        ) -> bool {
            body.heading += rng.random_range(-0.1..0.1);
            body.speed = config.robot_speed;
            true
        }
    }

    fn test_config() -> SwarmBotsConfig {
        SwarmBotsConfig {
            arena_width: 400,
            arena_height: 300,
            roster_size: 8,
            rng_seed: Some(7),
            ..SwarmBotsConfig::default()
        }
    }

    fn test_world(config: SwarmBotsConfig) -> WorldState {
        let obstacles = ObstacleField::bounded(
            config.arena_width as f32,
            config.arena_height as f32,
            10.0,
        );
        let mut world = WorldState::new(config, obstacles, Box::new(Drift)).expect("world");
        world.reset();
        world
    }

    #[test]
    fn rect_contains_edges_inclusive() {
        let rect = Rect::new(10.0, 10.0, 20.0, 5.0);
        assert!(rect.contains(10.0, 10.0));
        assert!(rect.contains(30.0, 15.0));
        assert!(!rect.contains(30.1, 12.0));
        assert!(!rect.contains(20.0, 9.9));
    }

    #[test]
    fn raycast_reports_first_hit_distance() {
        let field = ObstacleField::open().with_obstacle(Rect::new(60.0, 0.0, 10.0, 100.0));
        let reading = field.raycast(50.0, 50.0, 0.0, 100.0);
        assert_eq!(reading, 10.0);
    }

    #[test]
    fn raycast_returns_range_when_clear() {
        let field = ObstacleField::open();
        assert_eq!(field.raycast(0.0, 0.0, 1.2, 100.0), 100.0);
    }

    #[test]
    fn config_rejects_even_sensor_layout() {
        let config = SwarmBotsConfig {
            sensor_angles: vec![-30.0, -15.0, 15.0, 30.0],
            ..SwarmBotsConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(WorldStateError::InvalidConfig(
                "sensor_angles must hold an odd count of at least five angles"
            ))
        );
    }

    #[test]
    fn config_rejects_aggregation_beyond_neighbor_range() {
        let config = SwarmBotsConfig {
            aggregation_distance: 80.0,
            neighbor_range: 50.0,
            ..SwarmBotsConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn trail_evicts_oldest_beyond_capacity() {
        let mut runtime = AgentRuntime::new(7, 100.0, AgentMode::Moving);
        for i in 0..6 {
            runtime.push_trail(Position::new(i as f32, 0.0), 4);
        }
        assert_eq!(runtime.trail.len(), 4);
        assert_eq!(runtime.trail.front().copied(), Some(Position::new(2.0, 0.0)));
        assert_eq!(runtime.trail.back().copied(), Some(Position::new(5.0, 0.0)));
    }

    #[test]
    fn reset_populates_roster_with_initial_mode() {
        let mut world = test_world(test_config());
        assert_eq!(world.agent_count(), 8);
        for &id in world.roster() {
            let runtime = world.agent_runtime(id).expect("runtime");
            assert_eq!(runtime.mode, AgentMode::Moving);
            assert_eq!(runtime.timer, 0);
            assert_eq!(runtime.readings.len(), 7);
        }
    }

    #[test]
    fn reset_is_idempotent_in_size_and_mode() {
        let mut world = test_world(test_config());
        world.step();
        world.reset();
        world.reset();
        assert_eq!(world.agent_count(), 8);
        assert_eq!(world.tick(), Tick::zero());
        for &id in world.roster() {
            assert_eq!(
                world.agent_runtime(id).expect("runtime").mode,
                AgentMode::Moving
            );
        }
    }

    #[test]
    fn grid_and_circle_spawns_stay_inside_bounds() {
        for distribution in [SpawnDistribution::Grid, SpawnDistribution::Circle] {
            let config = SwarmBotsConfig {
                spawn_distribution: distribution,
                ..test_config()
            };
            let width = config.arena_width as f32;
            let height = config.arena_height as f32;
            let radius = config.robot_radius;
            let world = test_world(config);
            for &id in world.roster() {
                let body = world.body(id).expect("body");
                assert!(body.position.x >= radius && body.position.x <= width - radius);
                assert!(body.position.y >= radius && body.position.y <= height - radius);
            }
        }
    }

    #[test]
    fn sense_clamps_readings_to_range() {
        let mut world = test_world(test_config());
        world.step();
        let range = world.config().sensor_range;
        for &id in world.roster() {
            let runtime = world.agent_runtime(id).expect("runtime");
            assert!(runtime.readings.iter().all(|&r| (0.0..=range).contains(&r)));
        }
    }

    #[test]
    fn neighbor_lists_are_sorted_and_exclude_self() {
        let config = SwarmBotsConfig {
            spawn_distribution: SpawnDistribution::Grid,
            ..test_config()
        };
        let mut world = test_world(config);
        world.step();
        for &id in world.roster() {
            let runtime = world.agent_runtime(id).expect("runtime");
            assert!(runtime.neighbors.iter().all(|sample| sample.id != id));
            assert!(
                runtime
                    .neighbors
                    .windows(2)
                    .all(|pair| pair[0].distance <= pair[1].distance)
            );
        }
    }

    /// Naive all-pairs partition used as the oracle for cluster traversal.
    fn naive_partition(points: &[(f32, f32)], threshold: f32) -> Vec<HashSet<usize>> {
        let mut labels: Vec<usize> = (0..points.len()).collect();
        loop {
            let mut changed = false;
            for i in 0..points.len() {
                for j in 0..points.len() {
                    if i == j {
                        continue;
                    }
                    let dx = points[i].0 - points[j].0;
                    let dy = points[i].1 - points[j].1;
                    if (dx * dx + dy * dy).sqrt() < threshold && labels[j] < labels[i] {
                        labels[i] = labels[j];
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }
        let mut groups: Vec<HashSet<usize>> = Vec::new();
        let roots: HashSet<usize> = labels.iter().copied().collect();
        for root in roots {
            let members: HashSet<usize> = labels
                .iter()
                .enumerate()
                .filter(|&(_, &label)| label == root)
                .map(|(idx, _)| idx)
                .collect();
            if members.len() > 1 {
                groups.push(members);
            }
        }
        groups
    }

    /// Holds every agent in place so cluster output can be compared against
    /// the same snapshot the sense stage saw.
    struct Freeze;

    impl BehaviorPolicy for Freeze {
        fn name(&self) -> &'static str {
            "test.freeze"
        }

        fn initial_mode(&self) -> AgentMode {
            AgentMode::Moving
        }

        fn boundary(&self) -> BoundaryBehavior {
            BoundaryBehavior::Clamp
        }

        fn decide(
            &self,
            _config: &SwarmBotsConfig,
            _body: &mut AgentBody,
            _runtime: &mut AgentRuntime,
            _rng: &mut dyn RngCore,
        ) -> bool {
            false
        }
    }

    #[test]
    fn cluster_traversal_matches_naive_partition() {
        let config = SwarmBotsConfig {
            roster_size: 24,
            ..test_config()
        };
        let obstacles = ObstacleField::bounded(400.0, 300.0, 10.0);
        let mut world = WorldState::new(config, obstacles, Box::new(Freeze)).expect("world");
        world.reset();
        world.step();

        let points: Vec<(f32, f32)> = world
            .roster()
            .iter()
            .map(|&id| {
                let body = world.body(id).expect("body");
                (body.position.x, body.position.y)
            })
            .collect();
        let mut expected = naive_partition(&points, world.config().aggregation_distance);

        let index_of = |id: AgentId| world.roster().iter().position(|&r| r == id).expect("roster");
        let mut actual: Vec<HashSet<usize>> = world
            .clusters()
            .iter()
            .map(|group| group.iter().map(|&id| index_of(id)).collect())
            .collect();

        let key = |set: &HashSet<usize>| *set.iter().min().expect("non-empty");
        expected.sort_by_key(key);
        actual.sort_by_key(key);
        assert_eq!(actual, expected);
    }

    #[test]
    fn step_records_bounded_history() {
        let config = SwarmBotsConfig {
            history_capacity: 4,
            ..test_config()
        };
        let mut world = test_world(config);
        for _ in 0..10 {
            world.step();
        }
        let history: Vec<_> = world.history().cloned().collect();
        assert_eq!(history.len(), 4);
        assert_eq!(history.last().expect("entry").tick, Tick(10));
        assert_eq!(history.first().expect("entry").tick, Tick(7));
    }

    #[test]
    fn set_policy_clears_stale_agent_state() {
        let mut world = test_world(test_config());
        world.step();
        let id = world.roster()[0];
        {
            let runtime = world.agent_runtime_mut(id).expect("runtime");
            runtime.mode = AgentMode::Stopped;
            runtime.timer = 55;
            runtime.push_trail(Position::new(1.0, 2.0), 10);
        }
        world.set_policy(Box::new(Drift));
        let runtime = world.agent_runtime(id).expect("runtime");
        assert_eq!(runtime.mode, AgentMode::Moving);
        assert_eq!(runtime.timer, 0);
        assert!(runtime.trail.is_empty());
    }
}
