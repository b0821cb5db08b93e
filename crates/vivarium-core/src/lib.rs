//! Core simulation engine for the vivarium creature arena.
//!
//! A [`World`] owns a population of [`Creature`]s wandering a bounded 2D
//! arena. Each call to [`World::tick`] runs a fixed five-phase pipeline:
//! targeting against a tick-start snapshot, per-creature updates, interaction
//! resolution (feeding on corpses or fighting), a removal sweep, and a
//! generation increment. All randomness flows through a single seedable
//! [`SmallRng`] owned by the world, so seeded runs are reproducible.

use rand::{Rng, SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;

/// Energy ceiling shared by every creature.
pub const MAX_ENERGY: f32 = 100.0;
/// Libido gained per tick while alive.
pub const LIBIDO_RATE: f32 = 0.001;
/// Fear gained per tick while energy is critically low.
pub const FEAR_GAIN: f32 = 0.02;
/// Fear shed per tick once energy recovers.
pub const FEAR_DECAY: f32 = 0.01;
/// Energy ratio below which fear starts building.
pub const LOW_ENERGY_RATIO: f32 = 0.1;
/// Multiplier applied to speed per unit of fear, each tick.
pub const FEAR_SPEED_FACTOR: f32 = 0.5;
/// Hunger level above which a creature starts hunting.
pub const HUNT_HUNGER_THRESHOLD: f32 = 0.1;
/// Libido level above which a creature starts seeking company.
pub const HUNT_LIBIDO_THRESHOLD: f32 = 0.3;
/// Half-width of the uniform heading perturbation (radians).
pub const HEADING_JITTER: f32 = std::f32::consts::FRAC_PI_8;
/// Combat power weight on the energy ratio.
const POWER_ENERGY_WEIGHT: f32 = 0.6;
/// Combat power weight on remaining lifespan.
const POWER_YOUTH_WEIGHT: f32 = 0.3;
/// Gender bonus applied to male combat power.
const MALE_POWER_BONUS: f32 = 1.15;
/// Gender bonus applied to female combat power.
const FEMALE_POWER_BONUS: f32 = 1.0;
/// Range of the random multiplier applied to each side's power in a fight.
const FIGHT_LUCK_MIN: f32 = 0.8;
const FIGHT_LUCK_MAX: f32 = 1.2;

/// Display palette sampled for newly spawned creatures. Color is a display
/// hint only and has no behavioral effect.
const SPAWN_COLORS: &[&str] = &[
    "#4CAF50", "#8BC34A", "#CDDC39", "#FFC107", "#FF9800", "#03A9F4", "#9C27B0", "#E91E63",
];

fn clamp01(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

/// Stable integer identifier for a creature, unique within a world.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct CreatureId(pub u64);

impl fmt::Display for CreatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fixed at creation; affects combat power only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    const fn power_bonus(self) -> f32 {
        match self {
            Gender::Male => MALE_POWER_BONUS,
            Gender::Female => FEMALE_POWER_BONUS,
        }
    }
}

/// Non-owning reference to another creature plus a position snapshot taken
/// when the target was acquired or last revalidated. The coordinates are used
/// only for heading computation and are never treated as authoritative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetLock {
    pub id: CreatureId,
    pub x: f32,
    pub y: f32,
}

/// Position and identity of a creature captured at tick start, used by the
/// targeting phase so scan results do not depend on in-tick mutation order.
#[derive(Debug, Clone, Copy)]
pub struct TargetCandidate {
    pub id: CreatureId,
    pub x: f32,
    pub y: f32,
    pub is_dead: bool,
}

/// One simulated agent.
#[derive(Debug, Clone, PartialEq)]
pub struct Creature {
    pub id: CreatureId,
    pub x: f32,
    pub y: f32,
    /// Heading in radians.
    pub angle: f32,
    pub max_speed: f32,
    pub current_speed: f32,
    pub energy: f32,
    pub max_energy: f32,
    /// Ticks alive.
    pub age: u32,
    /// Randomized at creation; reaching it marks the creature non-viable but
    /// does not by itself trigger decay.
    pub max_age: f32,
    pub gender: Gender,
    /// Display hint only.
    pub color: String,
    pub sight_range: f32,
    pub libido: f32,
    pub fear: f32,
    pub hunger: f32,
    pub target: Option<TargetLock>,
    pub is_dead: bool,
    /// Dual-purpose timer: counts ticks at zero energy while alive, then is
    /// reused to count decay ticks once dead.
    pub death_counter: u32,
    /// Terminal flag; the removal sweep deletes the creature afterwards.
    pub is_removed: bool,
    direction_change_counter: u32,
    direction_change_interval: u32,
}

impl Creature {
    /// Construct a creature at `(x, y)` with randomized spawn attributes.
    pub fn spawn(id: CreatureId, x: f32, y: f32, config: &WorldConfig, rng: &mut SmallRng) -> Self {
        let gender = if rng.random_bool(0.5) {
            Gender::Male
        } else {
            Gender::Female
        };
        let color_index = rng.random_range(0..SPAWN_COLORS.len());
        Self {
            id,
            x,
            y,
            angle: rng.random_range(-std::f32::consts::PI..std::f32::consts::PI),
            max_speed: rng.random_range(config.speed_min..=config.speed_max),
            current_speed: 0.0,
            energy: MAX_ENERGY,
            max_energy: MAX_ENERGY,
            age: 0,
            max_age: rng.random_range(config.lifespan_min..=config.lifespan_max),
            gender,
            color: SPAWN_COLORS[color_index].to_string(),
            sight_range: rng.random_range(config.sight_min..=config.sight_max),
            libido: 0.0,
            fear: 0.0,
            hunger: 0.0,
            target: None,
            is_dead: false,
            death_counter: 0,
            is_removed: false,
            direction_change_counter: 0,
            direction_change_interval: rng
                .random_range(config.direction_interval_min..=config.direction_interval_max),
        }
    }

    /// Whether the creature is still within its natural lifespan and alive.
    /// Outliving `max_age` does not force decay; callers may act on this
    /// predicate but the engine itself does not.
    #[must_use]
    pub fn is_viable(&self) -> bool {
        !self.is_dead && (self.age as f32) < self.max_age
    }

    /// Combat score: energetic, young creatures fight better, males get a
    /// fixed bonus.
    #[must_use]
    pub fn power(&self) -> f32 {
        let energy_ratio = self.energy / self.max_energy;
        let age_ratio = self.age as f32 / self.max_age;
        (POWER_ENERGY_WEIGHT * energy_ratio + POWER_YOUTH_WEIGHT * (1.0 - age_ratio))
            * self.gender.power_bonus()
    }

    /// Drop any held target reference.
    pub fn clear_target(&mut self) {
        self.target = None;
    }

    /// Targeting pass, run against the tick-start candidate list before the
    /// per-creature update.
    ///
    /// A held target is only revalidated for existence; if it still exists the
    /// cached coordinates are refreshed from the snapshot and the lock is kept
    /// unconditionally. Otherwise a new target is sought only when hunger or
    /// libido cross their hunting thresholds: the nearest other creature
    /// strictly within sight range wins, corpses included, with ties resolved
    /// by scan order.
    pub fn update_target(&mut self, candidates: &[TargetCandidate]) {
        if let Some(lock) = self.target {
            match candidates.iter().find(|c| c.id == lock.id) {
                Some(current) => {
                    self.target = Some(TargetLock {
                        id: current.id,
                        x: current.x,
                        y: current.y,
                    });
                }
                None => self.target = None,
            }
            return;
        }

        // Corpses hold no appetites; they keep a stale lock above but never
        // acquire a fresh one.
        if self.is_dead {
            return;
        }

        let should_hunt =
            self.hunger > HUNT_HUNGER_THRESHOLD || self.libido > HUNT_LIBIDO_THRESHOLD;
        if !should_hunt {
            return;
        }

        let mut best: Option<(f32, TargetLock)> = None;
        for candidate in candidates {
            if candidate.id == self.id {
                continue;
            }
            let dx = candidate.x - self.x;
            let dy = candidate.y - self.y;
            let distance = (dx * dx + dy * dy).sqrt();
            if distance >= self.sight_range {
                continue;
            }
            let closer = match best {
                Some((best_distance, _)) => distance < best_distance,
                None => true,
            };
            if closer {
                best = Some((
                    distance,
                    TargetLock {
                        id: candidate.id,
                        x: candidate.x,
                        y: candidate.y,
                    },
                ));
            }
        }
        self.target = best.map(|(_, lock)| lock);
    }

    /// Per-tick update: speed/energy coupling, lifecycle timers, emotions,
    /// heading, movement integration, movement cost, aging.
    pub fn update(&mut self, config: &WorldConfig, rng: &mut SmallRng) {
        // Speed coupling and the starvation/decay timers share one counter.
        if self.is_dead {
            self.current_speed = 0.0;
            self.death_counter += 1;
            if self.death_counter >= config.decay_ticks {
                self.is_removed = true;
            }
        } else if self.energy <= 0.0 {
            self.current_speed = 0.0;
            self.death_counter += 1;
            if self.death_counter >= config.starvation_ticks {
                self.is_dead = true;
                self.death_counter = 0;
            }
        } else {
            self.current_speed = self.max_speed * self.energy / self.max_energy;
            self.death_counter = 0;
        }

        if !self.is_dead {
            self.libido = (self.libido + LIBIDO_RATE).min(1.0);
            self.hunger = (1.0 - self.energy / self.max_energy).max(0.0);
            if self.energy / self.max_energy < LOW_ENERGY_RATIO {
                self.fear = (self.fear + FEAR_GAIN).min(1.0);
            } else {
                self.fear = (self.fear - FEAR_DECAY).max(0.0);
            }
            // Fear boosts speed this tick only; current_speed is recomputed
            // from scratch next tick.
            self.current_speed *= 1.0 + FEAR_SPEED_FACTOR * self.fear;

            self.direction_change_counter += 1;
            if self.direction_change_counter >= self.direction_change_interval {
                self.angle += rng.random_range(-HEADING_JITTER..=HEADING_JITTER);
                self.direction_change_counter = 0;
                self.direction_change_interval = rng
                    .random_range(config.direction_interval_min..=config.direction_interval_max);
            }
            if let Some(lock) = self.target {
                let dx = lock.x - self.x;
                let dy = lock.y - self.y;
                let engagement_sq = config.engagement_radius * config.engagement_radius;
                if dx * dx + dy * dy >= engagement_sq {
                    // Chasing overrides the wander timer outright.
                    self.angle = dy.atan2(dx);
                }
            }
        }

        self.x += self.angle.cos() * self.current_speed;
        self.y += self.angle.sin() * self.current_speed;

        let margin = config.boundary_margin;
        let max_x = config.width as f32 - margin;
        let max_y = config.height as f32 - margin;
        if self.x < margin {
            self.x = margin;
            self.angle = std::f32::consts::PI - self.angle;
        } else if self.x > max_x {
            self.x = max_x;
            self.angle = std::f32::consts::PI - self.angle;
        }
        if self.y < margin {
            self.y = margin;
            self.angle = -self.angle;
        } else if self.y > max_y {
            self.y = max_y;
            self.angle = -self.angle;
        }

        if !self.is_dead {
            self.energy = (self.energy - config.movement_cost).max(0.0);
        }

        self.age = self.age.saturating_add(1);
    }

    /// Produce the wire representation of this creature.
    #[must_use]
    pub fn to_snapshot(&self) -> CreatureSnapshot {
        CreatureSnapshot {
            id: self.id.0,
            x: self.x,
            y: self.y,
            angle: self.angle,
            max_speed: self.max_speed,
            current_speed: self.current_speed,
            energy: self.energy,
            max_energy: self.max_energy,
            gender: self.gender,
            color: self.color.clone(),
            age: self.age,
            max_age: self.max_age,
            is_dead: self.is_dead,
            death_counter: self.death_counter,
            sight_range: self.sight_range,
            libido: self.libido,
            fear: self.fear,
            hunger: self.hunger,
            target_id: self.target.map(|lock| lock.id.0),
        }
    }

    /// Rebuild a creature from its wire representation.
    ///
    /// Scalars are defensively clamped back into their invariant ranges so a
    /// hand-edited snapshot cannot drive the model out of bounds. Fields
    /// outside the schema are reconstructed: the wander timer restarts with a
    /// fresh interval drawn from the world RNG, and cached target coordinates
    /// start at the creature's own position until the next targeting phase
    /// refreshes them.
    pub fn from_snapshot(
        snapshot: &CreatureSnapshot,
        config: &WorldConfig,
        rng: &mut SmallRng,
    ) -> Self {
        let max_energy = if snapshot.max_energy > 0.0 {
            snapshot.max_energy
        } else {
            MAX_ENERGY
        };
        Self {
            id: CreatureId(snapshot.id),
            x: snapshot.x,
            y: snapshot.y,
            angle: snapshot.angle,
            max_speed: snapshot.max_speed.max(0.0),
            current_speed: snapshot.current_speed.max(0.0),
            energy: snapshot.energy.clamp(0.0, max_energy),
            max_energy,
            age: snapshot.age,
            max_age: snapshot.max_age,
            gender: snapshot.gender,
            color: snapshot.color.clone(),
            sight_range: snapshot.sight_range.max(0.0),
            libido: clamp01(snapshot.libido),
            fear: clamp01(snapshot.fear),
            hunger: clamp01(snapshot.hunger),
            target: snapshot.target_id.map(|raw| TargetLock {
                id: CreatureId(raw),
                x: snapshot.x,
                y: snapshot.y,
            }),
            is_dead: snapshot.is_dead,
            death_counter: snapshot.death_counter,
            is_removed: false,
            direction_change_counter: 0,
            direction_change_interval: rng
                .random_range(config.direction_interval_min..=config.direction_interval_max),
        }
    }
}

/// Errors raised when constructing or mutating world state.
#[derive(Debug, Error)]
pub enum WorldError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// Creature ids are caller-assigned and must be unique within a world.
    #[error("creature id {0} already present")]
    DuplicateId(u64),
}

/// Errors raised while decoding a serialized world snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The payload was not a structurally valid world snapshot (missing
    /// required field, wrong type, truncated JSON).
    #[error("malformed world snapshot: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Static configuration for a vivarium world.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorldConfig {
    /// Width of the arena in world units.
    pub width: u32,
    /// Height of the arena in world units.
    pub height: u32,
    /// Optional RNG seed for reproducible worlds.
    pub rng_seed: Option<u64>,
    /// Energy subtracted per tick of movement.
    pub movement_cost: f32,
    /// Distance below which a held target triggers interaction resolution.
    pub engagement_radius: f32,
    /// Energy gained from one bite of a corpse.
    pub consumption_energy: f32,
    /// Fraction of the loser's pre-fight energy awarded to the winner.
    pub fight_spoils_ratio: f32,
    /// Consecutive zero-energy ticks before a creature dies.
    pub starvation_ticks: u32,
    /// Ticks a corpse persists before it is removed.
    pub decay_ticks: u32,
    /// Reflective margin kept clear along every arena edge.
    pub boundary_margin: f32,
    /// Spawn range for `max_speed`.
    pub speed_min: f32,
    pub speed_max: f32,
    /// Spawn range for `sight_range`.
    pub sight_min: f32,
    pub sight_max: f32,
    /// Spawn range for `max_age`.
    pub lifespan_min: f32,
    pub lifespan_max: f32,
    /// Spawn range for the wander-timer interval.
    pub direction_interval_min: u32,
    pub direction_interval_max: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            rng_seed: None,
            movement_cost: 0.05,
            engagement_radius: 20.0,
            consumption_energy: 50.0,
            fight_spoils_ratio: 0.5,
            starvation_ticks: 600,
            decay_ticks: 600,
            boundary_margin: 10.0,
            speed_min: 1.0,
            speed_max: 3.0,
            sight_min: 60.0,
            sight_max: 160.0,
            lifespan_min: 1_000.0,
            lifespan_max: 1_500.0,
            direction_interval_min: 20,
            direction_interval_max: 50,
        }
    }
}

impl WorldConfig {
    /// Convenience constructor for an arena of the given dimensions.
    #[must_use]
    pub fn sized(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    /// Validate parameter ranges.
    pub fn validate(&self) -> Result<(), WorldError> {
        if self.width == 0 || self.height == 0 {
            return Err(WorldError::InvalidConfig(
                "world dimensions must be non-zero",
            ));
        }
        if self.boundary_margin < 0.0
            || self.width as f32 <= 2.0 * self.boundary_margin
            || self.height as f32 <= 2.0 * self.boundary_margin
        {
            return Err(WorldError::InvalidConfig(
                "world dimensions must exceed twice the boundary margin",
            ));
        }
        if self.movement_cost < 0.0 {
            return Err(WorldError::InvalidConfig(
                "movement_cost must be non-negative",
            ));
        }
        if self.engagement_radius <= 0.0 {
            return Err(WorldError::InvalidConfig(
                "engagement_radius must be positive",
            ));
        }
        if self.consumption_energy < 0.0 {
            return Err(WorldError::InvalidConfig(
                "consumption_energy must be non-negative",
            ));
        }
        if !(0.0..=1.0).contains(&self.fight_spoils_ratio) {
            return Err(WorldError::InvalidConfig(
                "fight_spoils_ratio must be within [0, 1]",
            ));
        }
        if self.starvation_ticks == 0 || self.decay_ticks == 0 {
            return Err(WorldError::InvalidConfig(
                "lifecycle timers must be non-zero",
            ));
        }
        if self.speed_min < 0.0
            || self.speed_min > self.speed_max
            || self.sight_min < 0.0
            || self.sight_min > self.sight_max
            || self.lifespan_min <= 0.0
            || self.lifespan_min > self.lifespan_max
            || self.direction_interval_min == 0
            || self.direction_interval_min > self.direction_interval_max
        {
            return Err(WorldError::InvalidConfig(
                "spawn ranges must be non-negative with min <= max",
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

/// Dense, insertion-ordered creature storage with id lookup.
///
/// Iteration order is insertion order; the targeting scan and the interaction
/// phase both rely on it as the canonical tie-break. Removal compacts the
/// dense vector without reordering survivors.
#[derive(Debug, Default)]
pub struct CreatureArena {
    index: HashMap<CreatureId, usize>,
    creatures: Vec<Creature>,
}

impl CreatureArena {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored creatures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.creatures.len()
    }

    /// Returns true when no creatures are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.creatures.is_empty()
    }

    /// Returns true if `id` refers to a stored creature.
    #[must_use]
    pub fn contains(&self, id: CreatureId) -> bool {
        self.index.contains_key(&id)
    }

    /// Insert a creature, rejecting duplicate ids.
    pub fn insert(&mut self, creature: Creature) -> Result<(), WorldError> {
        if self.index.contains_key(&creature.id) {
            return Err(WorldError::DuplicateId(creature.id.0));
        }
        self.index.insert(creature.id, self.creatures.len());
        self.creatures.push(creature);
        Ok(())
    }

    /// Remove `id`, preserving the order of the survivors.
    pub fn remove(&mut self, id: CreatureId) -> Option<Creature> {
        let position = self.index.remove(&id)?;
        let removed = self.creatures.remove(position);
        for (offset, creature) in self.creatures[position..].iter().enumerate() {
            self.index.insert(creature.id, position + offset);
        }
        Some(removed)
    }

    /// Remove every creature whose id is in `dead`, preserving order.
    /// Returns the number removed.
    pub fn remove_many(&mut self, dead: &HashSet<CreatureId>) -> usize {
        if dead.is_empty() {
            return 0;
        }
        let before = self.creatures.len();
        self.creatures.retain(|creature| !dead.contains(&creature.id));
        self.index.clear();
        for (position, creature) in self.creatures.iter().enumerate() {
            self.index.insert(creature.id, position);
        }
        before - self.creatures.len()
    }

    /// Borrow a creature by id.
    #[must_use]
    pub fn get(&self, id: CreatureId) -> Option<&Creature> {
        self.index.get(&id).map(|&position| &self.creatures[position])
    }

    /// Mutably borrow a creature by id.
    pub fn get_mut(&mut self, id: CreatureId) -> Option<&mut Creature> {
        let position = *self.index.get(&id)?;
        Some(&mut self.creatures[position])
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Creature> {
        self.creatures.iter()
    }

    /// Mutably iterate in insertion order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Creature> {
        self.creatures.iter_mut()
    }

    /// Ids in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = CreatureId> + '_ {
        self.creatures.iter().map(|creature| creature.id)
    }

    /// Remove all stored creatures.
    pub fn clear(&mut self) {
        self.index.clear();
        self.creatures.clear();
    }
}

/// Counters emitted after processing a world tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickEvents {
    /// Generation counter after the tick completed.
    pub generation: u64,
    /// Fights resolved this tick.
    pub fights: usize,
    /// Corpse meals resolved this tick.
    pub meals: usize,
    /// Fully decayed creatures deleted by the removal sweep.
    pub removed: usize,
}

/// The bounded arena and authoritative owner of all creatures.
pub struct World {
    config: WorldConfig,
    generation: u64,
    rng: SmallRng,
    creatures: CreatureArena,
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("config", &self.config)
            .field("generation", &self.generation)
            .field("creature_count", &self.creatures.len())
            .finish()
    }
}

impl World {
    /// Instantiate an empty world using the supplied configuration.
    pub fn new(config: WorldConfig) -> Result<Self, WorldError> {
        config.validate()?;
        let rng = config.seeded_rng();
        Ok(Self {
            config,
            generation: 0,
            rng,
            creatures: CreatureArena::new(),
        })
    }

    /// Restore a world from a snapshot. Arena dimensions come from the
    /// snapshot; the remaining tunables and the RNG seed come from `config`.
    pub fn from_snapshot(snapshot: &WorldSnapshot, config: WorldConfig) -> Result<Self, WorldError> {
        let config = WorldConfig {
            width: snapshot.width,
            height: snapshot.height,
            ..config
        };
        let mut world = Self::new(config)?;
        world.generation = snapshot.generation;
        for creature_snapshot in &snapshot.creatures {
            let creature =
                Creature::from_snapshot(creature_snapshot, &world.config, &mut world.rng);
            world.creatures.insert(creature)?;
        }
        Ok(world)
    }

    /// Immutable access to the configuration.
    #[must_use]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Generation counter: number of completed ticks.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of creatures currently stored, corpses included.
    #[must_use]
    pub fn creature_count(&self) -> usize {
        self.creatures.len()
    }

    /// Borrow a creature by id.
    #[must_use]
    pub fn creature(&self, id: CreatureId) -> Option<&Creature> {
        self.creatures.get(id)
    }

    /// Mutably borrow a creature by id.
    pub fn creature_mut(&mut self, id: CreatureId) -> Option<&mut Creature> {
        self.creatures.get_mut(id)
    }

    /// Iterate over creatures in insertion order.
    pub fn creatures(&self) -> impl Iterator<Item = &Creature> {
        self.creatures.iter()
    }

    /// Spawn a creature with randomized attributes at the given position.
    pub fn spawn_creature(&mut self, id: CreatureId, x: f32, y: f32) -> Result<(), WorldError> {
        let creature = Creature::spawn(id, x, y, &self.config, &mut self.rng);
        self.creatures.insert(creature)
    }

    /// Remove a creature by id, returning its final state.
    pub fn remove_creature(&mut self, id: CreatureId) -> Option<Creature> {
        self.creatures.remove(id)
    }

    /// Execute one simulation tick.
    ///
    /// Phases, in order: (A) targeting against a tick-start snapshot, (B)
    /// per-creature updates using target coordinates captured in A, (C)
    /// interaction resolution against post-update positions, (D) removal
    /// sweep, (E) generation increment. Phases A/B deliberately read stale
    /// snapshot data while C reads live positions.
    pub fn tick(&mut self) -> TickEvents {
        let candidates: Vec<TargetCandidate> = self
            .creatures
            .iter()
            .map(|creature| TargetCandidate {
                id: creature.id,
                x: creature.x,
                y: creature.y,
                is_dead: creature.is_dead,
            })
            .collect();

        for creature in self.creatures.iter_mut() {
            creature.update_target(&candidates);
        }

        let Self {
            config,
            rng,
            creatures,
            ..
        } = self;
        for creature in creatures.iter_mut() {
            creature.update(config, rng);
        }

        let (fights, meals) = self.resolve_interactions();

        let removable: HashSet<CreatureId> = self
            .creatures
            .iter()
            .filter(|creature| creature.is_removed)
            .map(|creature| creature.id)
            .collect();
        let removed = self.creatures.remove_many(&removable);

        self.generation += 1;
        TickEvents {
            generation: self.generation,
            fights,
            meals,
            removed,
        }
    }

    /// Phase C: for every living creature holding a target within the
    /// engagement radius of the target's current position, resolve either a
    /// corpse meal or a fight. A creature resolved as winner, loser, or eater
    /// participates in at most one interaction per tick; a corpse being eaten
    /// spends no such budget, so several creatures may feed from it in the
    /// same tick.
    fn resolve_interactions(&mut self) -> (usize, usize) {
        let order: Vec<CreatureId> = self.creatures.ids().collect();
        let mut resolved: HashSet<CreatureId> = HashSet::new();
        let mut fights = 0;
        let mut meals = 0;
        let engagement_sq = self.config.engagement_radius * self.config.engagement_radius;

        for id in order {
            if resolved.contains(&id) {
                continue;
            }
            let (target_id, actor_x, actor_y) = match self.creatures.get(id) {
                Some(actor) if !actor.is_dead => match actor.target {
                    Some(lock) => (lock.id, actor.x, actor.y),
                    None => continue,
                },
                _ => continue,
            };

            let (target_x, target_y, target_dead) =
                match self.creatures.get(target_id) {
                    Some(target) => (target.x, target.y, target.is_dead),
                    None => {
                        // Target lost mid-tick; degrade gracefully.
                        if let Some(actor) = self.creatures.get_mut(id) {
                            actor.clear_target();
                        }
                        continue;
                    }
                };

            let dx = target_x - actor_x;
            let dy = target_y - actor_y;
            if dx * dx + dy * dy >= engagement_sq {
                continue;
            }

            if target_dead {
                let gain = self.config.consumption_energy;
                if let Some(actor) = self.creatures.get_mut(id) {
                    actor.energy = (actor.energy + gain).min(actor.max_energy);
                    actor.clear_target();
                }
                resolved.insert(id);
                meals += 1;
            } else {
                if resolved.contains(&target_id) {
                    continue;
                }
                let actor_power = self.creatures.get(id).map_or(0.0, Creature::power)
                    * self.rng.random_range(FIGHT_LUCK_MIN..=FIGHT_LUCK_MAX);
                let target_power = self.creatures.get(target_id).map_or(0.0, Creature::power)
                    * self.rng.random_range(FIGHT_LUCK_MIN..=FIGHT_LUCK_MAX);
                // Exact ties fall to the attacker.
                let (winner_id, loser_id) = if actor_power >= target_power {
                    (id, target_id)
                } else {
                    (target_id, id)
                };
                let spoils = match self.creatures.get(loser_id) {
                    Some(loser) => loser.energy * self.config.fight_spoils_ratio,
                    None => 0.0,
                };
                if let Some(winner) = self.creatures.get_mut(winner_id) {
                    winner.energy = (winner.energy + spoils).min(winner.max_energy);
                    winner.clear_target();
                }
                if let Some(loser) = self.creatures.get_mut(loser_id) {
                    loser.energy = 0.0;
                    loser.clear_target();
                }
                resolved.insert(id);
                resolved.insert(target_id);
                fights += 1;
            }
        }
        (fights, meals)
    }

    /// Produce the full wire representation of the world, creatures in
    /// insertion order.
    #[must_use]
    pub fn to_snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            width: self.config.width,
            height: self.config.height,
            generation: self.generation,
            creatures: self.creatures.iter().map(Creature::to_snapshot).collect(),
        }
    }
}

/// Wire representation of a single creature (spec'd key names, camelCase).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatureSnapshot {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub max_speed: f32,
    pub current_speed: f32,
    pub energy: f32,
    pub max_energy: f32,
    pub gender: Gender,
    pub color: String,
    pub age: u32,
    pub max_age: f32,
    pub is_dead: bool,
    pub death_counter: u32,
    pub sight_range: f32,
    pub libido: f32,
    pub fear: f32,
    pub hunger: f32,
    /// Absent for creatures holding no target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<u64>,
}

/// Wire representation of the whole world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldSnapshot {
    pub width: u32,
    pub height: u32,
    pub generation: u64,
    pub creatures: Vec<CreatureSnapshot>,
}

impl WorldSnapshot {
    /// Decode a snapshot from JSON.
    pub fn from_json(payload: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(payload)?)
    }

    /// Encode this snapshot as JSON.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }
}
