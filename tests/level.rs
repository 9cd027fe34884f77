// tests/level.rs
use std::cell::RefCell;
use std::rc::Rc;

use pendulum_core::store::{KeyValueStore, MemoryStore, get_json, keys};
use pendulum_core::systems::level::{
    self, BASE_BALANCE_THRESHOLD, BASE_PERTURBATION, GameMode, LevelConfig, LevelManager, MAX_GRAVITY_MULTIPLIER,
    MAX_LENGTH_MULTIPLIER, MAX_MASS_MULTIPLIER, MAX_REQUIRED_TIME, PREDEFINED_LEVELS,
};
use pendulum_core::systems::perturbation::PerturbationKind;
use pendulum_core::systems::sdk::LevelListener;
use proptest::prelude::*;

/* ──────────────────────────────────────────────────────────────────────────
1) Difficulty curve
────────────────────────────────────────────────────────────────────────── */

#[test]
fn predefined_levels_tighten_monotonically() {
    let configs: Vec<LevelConfig> =
        (1..=PREDEFINED_LEVELS).map(|l| level::config_for(l, GameMode::Classic, 0)).collect();
    for pair in configs.windows(2) {
        assert!(pair[1].balance_threshold <= pair[0].balance_threshold, "{} -> {}", pair[0].number, pair[1].number);
        assert!(pair[1].balance_required_time >= pair[0].balance_required_time);
    }
    assert_eq!(configs[0].balance_threshold, BASE_BALANCE_THRESHOLD);
}

#[test]
fn procedural_ramp_continues_from_level_ten() {
    let ten = level::config_for(10, GameMode::Classic, 0);
    let eleven = level::config_for(11, GameMode::Classic, 0);
    assert!(eleven.balance_threshold <= ten.balance_threshold);
    assert!(eleven.balance_required_time >= ten.balance_required_time);
}

proptest! {
    #[test]
    fn procedural_levels_stay_within_caps(level in 11u32..=10_000) {
        let c = level::config_for(level, GameMode::Classic, 0);
        prop_assert!(c.balance_threshold > 0.0);
        prop_assert!(c.balance_threshold <= BASE_BALANCE_THRESHOLD);
        prop_assert!(c.balance_required_time <= MAX_REQUIRED_TIME);
        prop_assert!(c.initial_perturbation <= 2.0 * BASE_PERTURBATION);
        prop_assert!(c.mass_multiplier <= MAX_MASS_MULTIPLIER);
        prop_assert!(c.length_multiplier <= MAX_LENGTH_MULTIPLIER);
        prop_assert!(c.gravity_multiplier <= MAX_GRAVITY_MULTIPLIER);
        prop_assert!(c.damping_value > 0.0 && c.spring_constant_value > 0.0);
    }

    #[test]
    fn procedural_threshold_never_loosens(level in 11u32..10_000) {
        let a = level::config_for(level, GameMode::Classic, 0);
        let b = level::config_for(level + 1, GameMode::Classic, 0);
        prop_assert!(b.balance_threshold <= a.balance_threshold);
        prop_assert!(b.balance_required_time >= a.balance_required_time);
    }

    #[test]
    fn random_mode_is_reproducible(level in 1u32..500, seed in any::<u64>()) {
        let a = level::config_for(level, GameMode::Random, seed);
        let b = level::config_for(level, GameMode::Random, seed);
        prop_assert_eq!(a, b);
    }
}

#[test]
fn modes_map_to_their_perturbation_profiles() {
    let free = level::config_for(3, GameMode::FreePlay, 0);
    assert!(free.perturbation_profile(GameMode::FreePlay).has(PerturbationKind::None));

    let jiggle = level::config_for(3, GameMode::Jiggle, 0);
    let profile = jiggle.perturbation_profile(GameMode::Jiggle);
    assert!(profile.has(PerturbationKind::Random));
    assert_eq!(profile.strength, jiggle.jiggle_intensity);

    let prog = level::config_for(4, GameMode::Progressive, 0);
    assert!(prog.perturbation_profile(GameMode::Progressive).has(PerturbationKind::Impulse));
}

#[test]
fn timed_mode_has_a_shrinking_countdown() {
    let first = level::config_for(1, GameMode::Timed, 0).countdown_time.unwrap();
    let later = level::config_for(6, GameMode::Timed, 0).countdown_time.unwrap();
    let floor = level::config_for(100, GameMode::Timed, 0).countdown_time.unwrap();
    assert_eq!(first, 30.0);
    assert!(later < first);
    assert_eq!(floor, 10.0);
    assert!(level::config_for(1, GameMode::Classic, 0).countdown_time.is_none());
}

#[test]
fn physics_multipliers_apply_to_base_params() {
    let c = level::config_for(10, GameMode::Classic, 0);
    let base = pendulum_core::systems::physics::PhysicsParams { max_dt: 0.02, ..Default::default() };
    let p = c.physics(&base);
    assert!((p.mass - c.mass_multiplier).abs() < 1e-12);
    assert!((p.gravity - 9.81 * c.gravity_multiplier).abs() < 1e-12);
    assert_eq!(p.damping, c.damping_value);
    assert_eq!(p.max_dt, 0.02);
}

#[test]
fn spatial_levels_state_their_tolerance_in_degrees() {
    let first = level::config_for(1, GameMode::Spatial, 0);
    assert!((first.balance_threshold_degrees() - BASE_BALANCE_THRESHOLD.to_degrees()).abs() < 1e-9);
    assert!(first.description.contains("20°"), "{}", first.description);

    let third = level::config_for(3, GameMode::Spatial, 0);
    assert!((third.balance_threshold_degrees() - 0.27f64.to_degrees()).abs() < 1e-9);
    assert!(third.description.contains("15°"), "{}", third.description);
    assert!((pendulum_core::mechanics::angle::rad_to_deg(std::f64::consts::PI) - 180.0).abs() < 1e-12);
}

/* ──────────────────────────────────────────────────────────────────────────
2) Manager: progression, persistence, listeners
────────────────────────────────────────────────────────────────────────── */

#[derive(Default)]
struct Log(Vec<String>);

impl LevelListener for Log {
    fn did_complete_level(&mut self, level: u32, _config: &LevelConfig) {
        self.0.push(format!("complete {level}"));
    }
    fn did_start_new_level(&mut self, level: u32, _config: &LevelConfig) {
        self.0.push(format!("start {level}"));
    }
    fn update_difficulty_parameters(&mut self, config: &LevelConfig) {
        self.0.push(format!("difficulty {}", config.number));
    }
}

#[test]
fn level_zero_is_rejected() {
    let mut m = LevelManager::new(GameMode::Classic, 0);
    m.set_level(4);
    m.set_level(0);
    assert_eq!(m.current_level(), 4);
}

#[test]
fn completion_is_announced_before_the_next_level_starts() {
    let log = Rc::new(RefCell::new(Log::default()));
    let mut m = LevelManager::new(GameMode::Classic, 0);
    m.add_listener(log.clone());

    m.advance_to_next_level();

    assert_eq!(m.current_level(), 2);
    assert_eq!(log.borrow().0, vec!["complete 1", "start 2", "difficulty 2"]);
}

#[test]
fn max_level_persists_across_managers() {
    let store: Rc<dyn KeyValueStore> = Rc::new(MemoryStore::new());

    let mut m = LevelManager::with_store(GameMode::Classic, 0, store.clone());
    assert_eq!(m.max_reached_level(), 1);
    m.set_level(7);
    m.demote_one_level();
    m.demote_one_level();
    assert_eq!(m.current_level(), 5);
    assert_eq!(m.max_reached_level(), 7);
    assert_eq!(get_json::<u32>(store.as_ref(), keys::MAX_LEVEL).unwrap(), Some(7));

    let reloaded = LevelManager::with_store(GameMode::Classic, 0, store);
    assert_eq!(reloaded.max_reached_level(), 7);
    assert_eq!(reloaded.current_level(), 1);
}

#[test]
fn corrupt_max_level_falls_back_to_one() {
    let store = Rc::new(MemoryStore::new());
    store.set(keys::MAX_LEVEL, b"not json").unwrap();
    let m = LevelManager::with_store(GameMode::Classic, 0, store);
    assert_eq!(m.max_reached_level(), 1);
}

#[test]
fn demote_and_reset_floor_at_one() {
    let mut m = LevelManager::new(GameMode::Progressive, 0);
    m.demote_one_level();
    assert_eq!(m.current_level(), 1);
    m.set_level(3);
    m.reset_to_level_1();
    assert_eq!(m.current_level(), 1);
    assert_eq!(m.max_reached_level(), 3);
}
