//! Inverted pendulum model.
//!
//! Equation of motion, with `J = m·L² + I`:
//!
//! ```text
//! θ'' = -ka·sin θ + ks·θ - kb·ω + drive(t) + F(t)
//! ka = m·L·g / J,  ks = k / J,  kb = b / J
//! ```
//!
//! `F(t)` is the impulse accumulated through [`PendulumModel::apply_force`]
//! since the previous step, delivered as a constant acceleration over the
//! next step so that it changes ω by exactly its magnitude.

use serde::{Deserialize, Serialize};

use crate::mechanics::{energy, ode};

/// Instantaneous physical state. θ = π is upright.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PendulumState {
    pub theta: f64,
    pub theta_dot: f64,
    pub time: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsParams {
    pub mass: f64,
    pub length: f64,
    pub gravity: f64,
    pub damping: f64,
    pub spring_constant: f64,
    pub moment_of_inertia: f64,
    /// External sinusoidal drive (Hz); zero disables it.
    pub drive_frequency: f64,
    pub drive_amplitude: f64,
    /// Upper bound on a single integration step (s).
    pub max_dt: f64,
}

impl Default for PhysicsParams {
    fn default() -> Self {
        Self {
            mass: 1.0,
            length: 1.0,
            gravity: 9.81,
            damping: 0.4,
            spring_constant: 0.2,
            moment_of_inertia: 1.0,
            drive_frequency: 0.0,
            drive_amplitude: 0.0,
            max_dt: 1.0 / 30.0,
        }
    }
}

impl PhysicsParams {
    /// m·L² + I, kept away from zero.
    #[inline]
    pub fn effective_inertia(&self) -> f64 {
        (self.mass * self.length * self.length + self.moment_of_inertia).max(1e-9)
    }

    #[inline]
    pub fn ka(&self) -> f64 {
        self.mass * self.length * self.gravity / self.effective_inertia()
    }

    #[inline]
    pub fn ks(&self) -> f64 {
        self.spring_constant / self.effective_inertia()
    }

    #[inline]
    pub fn kb(&self) -> f64 {
        self.damping / self.effective_inertia()
    }

    /// Unforced angular acceleration at (t, θ, ω), drive included.
    #[inline]
    pub fn acceleration(&self, t: f64, theta: f64, theta_dot: f64) -> f64 {
        let drive = if self.drive_amplitude != 0.0 {
            self.drive_amplitude * (2.0 * std::f64::consts::PI * self.drive_frequency * t).sin()
        } else {
            0.0
        };
        -self.ka() * theta.sin() + self.ks() * theta - self.kb() * theta_dot + drive
    }
}

/// Pendulum integrator. Owned exclusively by the session loop.
#[derive(Clone, Debug)]
pub struct PendulumModel {
    params: PhysicsParams,
    state: PendulumState,
    pending_impulse: f64,
}

impl Default for PendulumModel {
    fn default() -> Self {
        Self::new(PhysicsParams::default())
    }
}

impl PendulumModel {
    pub fn new(params: PhysicsParams) -> Self {
        Self { params, state: PendulumState::default(), pending_impulse: 0.0 }
    }

    pub fn params(&self) -> &PhysicsParams {
        &self.params
    }

    /// Replace physical parameters; state is kept.
    pub fn set_params(&mut self, params: PhysicsParams) {
        self.params = params;
    }

    pub fn state(&self) -> PendulumState {
        self.state
    }

    pub fn pending_impulse(&self) -> f64 {
        self.pending_impulse
    }

    /// Accumulate an impulse (rad/s) for the next step.
    pub fn apply_force(&mut self, magnitude: f64) {
        if magnitude.is_finite() {
            self.pending_impulse += magnitude;
        }
    }

    /// Advance by `dt` (capped at `max_dt`) with one RK4 step.
    /// A non-positive `dt` does nothing and keeps the pending impulse.
    pub fn step(&mut self, dt: f64) {
        if !(dt > 0.0) {
            return;
        }
        let h = dt.min(self.params.max_dt.max(1e-6));
        let forcing = self.pending_impulse / h;
        self.pending_impulse = 0.0;

        let p = self.params;
        let y = ode::rk4(
            |t, y| [y[1], p.acceleration(t, y[0], y[1]) + forcing],
            self.state.time,
            [self.state.theta, self.state.theta_dot],
            h,
        );

        self.state = PendulumState { theta: y[0], theta_dot: y[1], time: self.state.time + h };
    }

    /// Hanging at rest, clock at zero.
    pub fn reset(&mut self) {
        self.state = PendulumState::default();
        self.pending_impulse = 0.0;
    }

    /// At rest at `theta`, clock at zero.
    pub fn reset_with_angle(&mut self, theta: f64) {
        self.state = PendulumState { theta, theta_dot: 0.0, time: 0.0 };
        self.pending_impulse = 0.0;
    }

    /// Kinetic + potential energy of the bob (J).
    pub fn total_energy(&self) -> f64 {
        energy::mechanical_energy(
            self.params.mass,
            self.params.length,
            self.params.gravity,
            self.state.theta,
            self.state.theta_dot,
        )
    }

    /// Conserved quantity of the undamped, unforced equation.
    pub fn normalized_energy(&self) -> f64 {
        energy::normalized_energy(self.params.ka(), self.params.ks(), self.state.theta, self.state.theta_dot)
    }
}
