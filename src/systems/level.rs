//! Level progression.
//!
//! `config_for(level, mode)` is a pure mapping from a 1-indexed level to a
//! [`LevelConfig`]. The [`LevelManager`] adds the mutable part: the current
//! level, the persisted high-water mark and listener notifications.
//!
//! Classic mode uses ten hand-tuned levels. Beyond level 10 the curve is
//! procedural with `difficulty = min(1 + 0.05·(level − 10), 2)`; every derived
//! quantity is capped so the ramp stays bounded for any level.

use std::cell::RefCell;
use std::rc::Rc;

use bevy_prng::WyRand;
use rand_core::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::mechanics::{angle, stoch};
use crate::store::{KeyValueStore, get_json, keys, set_json};
use crate::systems::perturbation::PerturbationProfile;
use crate::systems::physics::PhysicsParams;
use crate::systems::sdk::LevelListener;

pub const BASE_BALANCE_THRESHOLD: f64 = 0.35;
pub const BASE_REQUIRED_TIME: f64 = 1.5;
pub const BASE_MASS: f64 = 1.0;
pub const BASE_LENGTH: f64 = 1.0;
pub const BASE_DAMPING: f64 = 0.4;
pub const BASE_GRAVITY: f64 = 9.81;
pub const BASE_SPRING: f64 = 0.2;
/// Initial offset from upright, degrees.
pub const BASE_PERTURBATION: f64 = 8.0;

pub const PREDEFINED_LEVELS: u32 = 10;
pub const MAX_REQUIRED_TIME: f64 = 8.0;
pub const MAX_DIFFICULTY_FACTOR: f64 = 2.0;
pub const MAX_MASS_MULTIPLIER: f64 = 2.6;
pub const MAX_LENGTH_MULTIPLIER: f64 = 2.4;
pub const MAX_GRAVITY_MULTIPLIER: f64 = 2.6;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    #[default]
    Classic,
    FreePlay,
    Progressive,
    Spatial,
    Jiggle,
    Timed,
    Random,
    Golden,
}

/// Difficulty parameters for one level. Immutable once built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelConfig {
    pub number: u32,
    /// Max |θ − π| (rad) that counts as balanced.
    pub balance_threshold: f64,
    /// Seconds of continuous balance needed to complete the level.
    pub balance_required_time: f64,
    /// Initial offset from upright, degrees.
    pub initial_perturbation: f64,
    pub mass_multiplier: f64,
    pub length_multiplier: f64,
    pub damping_value: f64,
    pub gravity_multiplier: f64,
    pub spring_constant_value: f64,
    pub description: String,
    /// Timed mode: seconds available to complete the level.
    pub countdown_time: Option<f64>,
    /// Jiggle mode: random-noise amplitude, 0 when unused.
    pub jiggle_intensity: f64,
}

impl LevelConfig {
    fn base(number: u32, description: impl Into<String>) -> Self {
        Self {
            number,
            balance_threshold: BASE_BALANCE_THRESHOLD,
            balance_required_time: BASE_REQUIRED_TIME,
            initial_perturbation: BASE_PERTURBATION,
            mass_multiplier: 1.0,
            length_multiplier: 1.0,
            damping_value: BASE_DAMPING,
            gravity_multiplier: 1.0,
            spring_constant_value: BASE_SPRING,
            description: description.into(),
            countdown_time: None,
            jiggle_intensity: 0.0,
        }
    }

    pub fn balance_threshold_degrees(&self) -> f64 {
        angle::rad_to_deg(self.balance_threshold)
    }

    /// Physical parameters for this level; drive and step cap come from `base`.
    pub fn physics(&self, base: &PhysicsParams) -> PhysicsParams {
        PhysicsParams {
            mass: BASE_MASS * self.mass_multiplier,
            length: BASE_LENGTH * self.length_multiplier,
            gravity: BASE_GRAVITY * self.gravity_multiplier,
            damping: self.damping_value,
            spring_constant: self.spring_constant_value,
            ..*base
        }
    }

    /// Perturbation profile that goes with this level in `mode`.
    pub fn perturbation_profile(&self, mode: GameMode) -> PerturbationProfile {
        match mode {
            GameMode::Classic | GameMode::Random => PerturbationProfile::for_level(self.number),
            GameMode::FreePlay => PerturbationProfile::zen(),
            GameMode::Jiggle => PerturbationProfile::jiggle(self.jiggle_intensity),
            GameMode::Progressive | GameMode::Spatial | GameMode::Timed | GameMode::Golden => {
                PerturbationProfile::for_progressive_level(self.number)
            }
        }
    }
}

/// Level → config for `mode`. `seed` only matters for [`GameMode::Random`].
pub fn config_for(level: u32, mode: GameMode, seed: u64) -> LevelConfig {
    let level = level.max(1);
    match mode {
        GameMode::Classic if level <= PREDEFINED_LEVELS => predefined(level),
        GameMode::Classic => procedural(level),
        GameMode::FreePlay => free_play(level),
        GameMode::Progressive => progressive(level),
        GameMode::Spatial => spatial(level),
        GameMode::Jiggle => jiggle(level),
        GameMode::Timed => timed(level),
        GameMode::Random => randomized(level, seed),
        GameMode::Golden => golden(level),
    }
}

// (threshold scale, required time, perturbation scale, mass, length, damping scale, gravity, spring scale, description)
type Row = (f64, f64, f64, f64, f64, f64, f64, f64, &'static str);

const CLASSIC: [Row; 10] = [
    (1.00, 1.00, 1.00, 1.00, 1.00, 1.00, 1.00, 1.00, "Beginner - Just get upright briefly"),
    (0.98, 1.00, 1.00, 1.00, 1.00, 1.00, 1.00, 0.95, "Novice - Getting the hang of it"),
    (0.95, 1.25, 1.05, 1.02, 1.00, 0.95, 1.00, 0.90, "Apprentice - Find your balance"),
    (0.92, 1.50, 1.10, 1.05, 1.00, 0.90, 1.02, 0.85, "Adept - Gentle balancing"),
    (0.89, 1.75, 1.15, 1.08, 1.02, 0.85, 1.05, 0.80, "Practiced - Controlled movement"),
    (0.85, 2.00, 1.20, 1.10, 1.05, 0.80, 1.08, 0.75, "Expert - Steady hands"),
    (0.80, 2.25, 1.25, 1.15, 1.08, 0.75, 1.10, 0.70, "Master - Precise control"),
    (0.75, 2.50, 1.30, 1.20, 1.10, 0.70, 1.15, 0.65, "Champion - Delicate balance"),
    (0.70, 2.75, 1.35, 1.25, 1.15, 0.65, 1.20, 0.60, "Legend - Zen focus"),
    (0.65, 3.00, 1.40, 1.30, 1.20, 0.60, 1.25, 0.55, "Perfect Balance - Mastery achieved"),
];

fn predefined(level: u32) -> LevelConfig {
    let idx = (level.clamp(1, PREDEFINED_LEVELS) - 1) as usize;
    let (th, time, pert, mass, len, damp, grav, spring, desc) = CLASSIC[idx];
    LevelConfig {
        number: level,
        balance_threshold: BASE_BALANCE_THRESHOLD * th,
        balance_required_time: time,
        initial_perturbation: BASE_PERTURBATION * pert,
        mass_multiplier: mass,
        length_multiplier: len,
        damping_value: BASE_DAMPING * damp,
        gravity_multiplier: grav,
        spring_constant_value: BASE_SPRING * spring,
        ..LevelConfig::base(level, desc)
    }
}

fn procedural(level: u32) -> LevelConfig {
    let beyond = (level - PREDEFINED_LEVELS) as f64;
    let factor = (1.0 + 0.05 * beyond).min(MAX_DIFFICULTY_FACTOR);

    let description = match level - PREDEFINED_LEVELS {
        n @ 0..=5 => format!("Elite Level {n} - Beyond the basics"),
        n @ 6..=10 => format!("Pro Level {n} - True dedication"),
        n @ 11..=20 => format!("Guru Level {n} - Path to enlightenment"),
        n => format!("Legendary {n} - Pendulum whisperer"),
    };

    LevelConfig {
        balance_threshold: BASE_BALANCE_THRESHOLD * (0.6 / factor),
        balance_required_time: (3.5 + beyond * 0.25).min(MAX_REQUIRED_TIME),
        initial_perturbation: (BASE_PERTURBATION * (1.0 + factor * 0.05)).min(BASE_PERTURBATION * 2.0),
        mass_multiplier: (1.3 + beyond * 0.05).min(MAX_MASS_MULTIPLIER),
        length_multiplier: (1.2 + beyond * 0.03).min(MAX_LENGTH_MULTIPLIER),
        damping_value: (BASE_DAMPING * (0.55 / factor)).max(0.2),
        gravity_multiplier: (1.3 + beyond * 0.03).min(MAX_GRAVITY_MULTIPLIER),
        spring_constant_value: (BASE_SPRING * (0.5 / factor)).max(0.05),
        ..LevelConfig::base(level, description)
    }
}

fn free_play(level: u32) -> LevelConfig {
    LevelConfig { initial_perturbation: 5.0, ..LevelConfig::base(level, "Free Play - Balance freely") }
}

fn progressive(level: u32) -> LevelConfig {
    let time = BASE_REQUIRED_TIME + (level - 1) as f64 * 0.5;
    LevelConfig {
        balance_required_time: time,
        initial_perturbation: 5.0,
        ..LevelConfig::base(level, format!("Level {level} - Hold balance for {time:.1}s"))
    }
}

fn spatial(level: u32) -> LevelConfig {
    let threshold = (BASE_BALANCE_THRESHOLD - (level - 1) as f64 * 0.04).max(0.10);
    let degrees = angle::rad_to_deg(threshold) as i64;
    LevelConfig {
        balance_threshold: threshold,
        balance_required_time: 2.0,
        initial_perturbation: 5.0,
        ..LevelConfig::base(level, format!("Level {level} - Balance within {degrees}°"))
    }
}

fn jiggle(level: u32) -> LevelConfig {
    let time = BASE_REQUIRED_TIME + (level - 1) as f64 * 0.5;
    let intensity = (0.3 + (level - 1) as f64 * 0.2).min(1.5);
    LevelConfig {
        balance_required_time: time,
        initial_perturbation: 5.0,
        jiggle_intensity: intensity,
        ..LevelConfig::base(level, format!("Level {level} - Jiggle intensity {intensity:.1}"))
    }
}

fn timed(level: u32) -> LevelConfig {
    let countdown = (30.0 - (level - 1) as f64 * 3.0).max(10.0);
    LevelConfig {
        balance_threshold: (BASE_BALANCE_THRESHOLD - (level - 1) as f64 * 0.02).max(0.20),
        balance_required_time: if level < 4 { 1.5 } else { 2.0 },
        initial_perturbation: 5.0,
        countdown_time: Some(countdown),
        ..LevelConfig::base(level, format!("Level {level} - {countdown:.0}s countdown"))
    }
}

/// Uniformly drawn physics, reproducible from `(seed, level)`.
fn randomized(level: u32, seed: u64) -> LevelConfig {
    let mixed = seed ^ u64::from(level).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    let mut rng = WyRand::from_seed(mixed.to_le_bytes());
    LevelConfig {
        balance_required_time: 2.0,
        mass_multiplier: stoch::uniform_in(&mut rng, 0.7, 1.5),
        length_multiplier: stoch::uniform_in(&mut rng, 0.7, 1.5),
        gravity_multiplier: stoch::uniform_in(&mut rng, 7.0, 13.0) / BASE_GRAVITY,
        damping_value: stoch::uniform_in(&mut rng, 0.15, 0.6),
        spring_constant_value: stoch::uniform_in(&mut rng, 0.05, 0.35),
        ..LevelConfig::base(level, format!("Level {level} - Randomized physics"))
    }
}

/// Baseline only; a Golden Mode recommendation overrides physics at session start.
fn golden(level: u32) -> LevelConfig {
    LevelConfig {
        balance_threshold: (BASE_BALANCE_THRESHOLD - (level - 1) as f64 * 0.025).max(0.15),
        balance_required_time: BASE_REQUIRED_TIME + (level - 1) as f64 * 0.4,
        ..LevelConfig::base(level, format!("Golden Level {level}"))
    }
}

/// Current level, persisted high-water mark and listeners.
pub struct LevelManager {
    current: u32,
    max_reached: u32,
    mode: GameMode,
    seed: u64,
    store: Option<Rc<dyn KeyValueStore>>,
    listeners: Vec<Rc<RefCell<dyn LevelListener>>>,
}

impl LevelManager {
    pub fn new(mode: GameMode, seed: u64) -> Self {
        Self { current: 1, max_reached: 1, mode, seed, store: None, listeners: Vec::new() }
    }

    /// Loads the high-water mark from `store`; a missing or unreadable key means 1.
    pub fn with_store(mode: GameMode, seed: u64, store: Rc<dyn KeyValueStore>) -> Self {
        let max_reached = match get_json::<u32>(store.as_ref(), keys::MAX_LEVEL) {
            Ok(v) => v.unwrap_or(1).max(1),
            Err(e) => {
                warn!(error = %e, "could not load max reached level");
                1
            }
        };
        Self { max_reached, store: Some(store), ..Self::new(mode, seed) }
    }

    pub fn add_listener(&mut self, listener: Rc<RefCell<dyn LevelListener>>) {
        self.listeners.push(listener);
    }

    pub fn current_level(&self) -> u32 {
        self.current
    }

    pub fn max_reached_level(&self) -> u32 {
        self.max_reached
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: GameMode) {
        self.mode = mode;
    }

    pub fn config_for(&self, level: u32) -> LevelConfig {
        config_for(level, self.mode, self.seed)
    }

    pub fn current_config(&self) -> LevelConfig {
        self.config_for(self.current)
    }

    /// Jump to `level`. Level 0 is rejected as a no-op.
    pub fn set_level(&mut self, level: u32) {
        if level == 0 {
            debug!("ignoring level 0");
            return;
        }
        self.current = level;
        if level > self.max_reached {
            self.max_reached = level;
            self.save_max_level();
        }

        let config = self.config_for(level);
        info!(level, mode = ?self.mode, threshold = config.balance_threshold, "level started");
        for l in &self.listeners {
            let mut l = l.borrow_mut();
            l.did_start_new_level(level, &config);
            l.update_difficulty_parameters(&config);
        }
    }

    /// Notify completion, then move to the next level.
    pub fn advance_to_next_level(&mut self) {
        let completed = self.current_config();
        for l in &self.listeners {
            l.borrow_mut().did_complete_level(self.current, &completed);
        }
        self.set_level(self.current.saturating_add(1));
    }

    pub fn reset_to_level_1(&mut self) {
        self.set_level(1);
    }

    /// One level down, floor 1.
    pub fn demote_one_level(&mut self) {
        if self.current > 1 {
            self.set_level(self.current - 1);
        }
    }

    fn save_max_level(&self) {
        if let Some(store) = self.store.as_ref() {
            if let Err(e) = set_json(store.as_ref(), keys::MAX_LEVEL, &self.max_reached) {
                warn!(error = %e, level = self.max_reached, "could not persist max reached level");
            }
        }
    }
}
