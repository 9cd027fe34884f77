// tests/physics.rs
use std::f64::consts::PI;

use pendulum_core::mechanics::{self, angle};
use pendulum_core::systems::physics::{PendulumModel, PhysicsParams};
use proptest::prelude::*;

fn undamped() -> PhysicsParams {
    PhysicsParams { damping: 0.0, ..PhysicsParams::default() }
}

/* ──────────────────────────────────────────────────────────────────────────
1) Energy: RK4 keeps the first integral of the undamped equation
────────────────────────────────────────────────────────────────────────── */

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn undamped_unforced_motion_conserves_energy(
        theta0 in 0.3f64..6.0,
        dt in (1.0 / 240.0)..(1.0 / 30.0),
        steps in 10usize..300,
    ) {
        let mut model = PendulumModel::new(undamped());
        model.reset_with_angle(theta0);
        let e0 = model.normalized_energy();

        for _ in 0..steps {
            model.step(dt);
        }

        let drift = (model.normalized_energy() - e0).abs();
        prop_assert!(drift <= 1e-4 * e0.abs().max(1.0), "drift {drift} from {e0}");
    }
}

#[test]
fn damping_bleeds_energy() {
    let mut model = PendulumModel::new(PhysicsParams { spring_constant: 0.0, ..PhysicsParams::default() });
    model.reset_with_angle(1.0);
    let e0 = model.normalized_energy();
    for _ in 0..600 {
        model.step(1.0 / 60.0);
    }
    assert!(model.normalized_energy() < e0);
}

/* ──────────────────────────────────────────────────────────────────────────
2) Stepping contract
────────────────────────────────────────────────────────────────────────── */

#[test]
fn upright_with_no_spring_is_an_equilibrium() {
    let mut model = PendulumModel::new(PhysicsParams { spring_constant: 0.0, ..undamped() });
    model.reset_with_angle(PI);
    for _ in 0..60 {
        model.step(1.0 / 60.0);
    }
    assert!(angle::deviation(model.state().theta).abs() < 1e-9);
}

#[test]
fn impulse_changes_velocity_by_its_magnitude() {
    // gravity and spring off: the impulse is the only acceleration
    let params = PhysicsParams { gravity: 0.0, spring_constant: 0.0, ..undamped() };
    let mut model = PendulumModel::new(params);
    model.reset_with_angle(PI);

    model.apply_force(0.4);
    model.apply_force(0.1);
    assert!((model.pending_impulse() - 0.5).abs() < 1e-12);

    model.step(1.0 / 60.0);
    assert!((model.state().theta_dot - 0.5).abs() < 1e-9);
    assert_eq!(model.pending_impulse(), 0.0);
}

#[test]
fn non_finite_forces_are_ignored() {
    let mut model = PendulumModel::default();
    model.apply_force(f64::NAN);
    model.apply_force(f64::INFINITY);
    assert_eq!(model.pending_impulse(), 0.0);
}

#[test]
fn non_positive_dt_is_a_no_op_that_keeps_the_impulse() {
    let mut model = PendulumModel::default();
    model.reset_with_angle(PI + 0.1);
    model.apply_force(0.2);
    let before = model.state();

    model.step(0.0);
    model.step(-0.5);

    assert_eq!(model.state(), before);
    assert_eq!(model.pending_impulse(), 0.2);
}

#[test]
fn dt_is_capped_at_max_dt() {
    let mut model = PendulumModel::default();
    model.reset_with_angle(PI + 0.05);
    model.step(1.0);
    assert!((model.state().time - model.params().max_dt).abs() < 1e-12);
}

#[test]
fn reset_returns_to_hanging_rest() {
    let mut model = PendulumModel::default();
    model.reset_with_angle(2.0);
    model.apply_force(1.0);
    model.step(1.0 / 60.0);

    model.reset();
    let s = model.state();
    assert_eq!((s.theta, s.theta_dot, s.time), (0.0, 0.0, 0.0));
    assert_eq!(model.pending_impulse(), 0.0);
    assert_eq!(model.total_energy(), 0.0);
}

#[test]
fn total_energy_matches_point_mass_formula_at_upright() {
    let model = {
        let mut m = PendulumModel::default();
        m.reset_with_angle(PI);
        m
    };
    let p = model.params();
    let expected = mechanics::mechanical_energy(p.mass, p.length, p.gravity, PI, 0.0);
    assert!((model.total_energy() - expected).abs() < 1e-12);
    assert!((expected - 2.0 * p.mass * p.gravity * p.length).abs() < 1e-9);
}

#[test]
fn drive_moves_a_resting_pendulum() {
    let params = PhysicsParams { drive_amplitude: 2.0, drive_frequency: 1.0, ..PhysicsParams::default() };
    let mut model = PendulumModel::new(params);
    model.reset();
    for _ in 0..30 {
        model.step(1.0 / 60.0);
    }
    assert!(model.state().theta.abs() > 1e-4);
}
