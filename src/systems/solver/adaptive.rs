//! Built-in control solver.
//!
//! Corrective modes cancel the modelled dynamics and impose a critically
//! damped PD response around upright:
//!
//! ```text
//! u = ka·sin θ − ks·θ + kb·ω − (kp·e + kd·ω),   e = wrap(θ − π)
//! ```
//!
//! Competition pushes the other way, proportionally to how far the pendulum
//! already leans. Assistance and aggression drift toward targets derived
//! from the latest [`PlayerMetrics`].

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::mechanics::{angle, control};
use crate::systems::physics::{PendulumState, PhysicsParams};

use super::metrics::PlayerMetrics;
use super::{AiMode, ControlSolver};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveGains {
    /// Closed-loop natural frequency (rad/s).
    pub natural_freq: f64,
    pub damping_ratio: f64,
    /// |u| cap (rad/s²).
    pub max_accel: f64,
    /// Per-flush step toward the metrics-derived targets.
    pub adapt_rate: f64,
    pub min_assistance: f64,
    pub max_assistance: f64,
    pub min_aggression: f64,
    pub max_aggression: f64,
}

impl Default for AdaptiveGains {
    fn default() -> Self {
        Self {
            natural_freq: 4.0,
            damping_ratio: 1.0,
            max_accel: 40.0,
            adapt_rate: 0.2,
            min_assistance: 0.3,
            max_assistance: 1.0,
            min_aggression: 0.2,
            max_aggression: 1.5,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AdaptiveSolver {
    gains: AdaptiveGains,
    physics: PhysicsParams,
    mode: AiMode,
    difficulty: f64,
    assistance: f64,
    aggression: f64,
    last_metrics: Option<PlayerMetrics>,
}

impl Default for AdaptiveSolver {
    fn default() -> Self {
        Self::new(AdaptiveGains::default())
    }
}

impl AdaptiveSolver {
    pub fn new(gains: AdaptiveGains) -> Self {
        Self {
            gains,
            physics: PhysicsParams::default(),
            mode: AiMode::Off,
            difficulty: 0.5,
            assistance: gains.max_assistance,
            aggression: 0.5,
            last_metrics: None,
        }
    }

    pub fn assistance(&self) -> f64 {
        self.assistance
    }

    pub fn aggression(&self) -> f64 {
        self.aggression
    }

    pub fn last_metrics(&self) -> Option<&PlayerMetrics> {
        self.last_metrics.as_ref()
    }

    fn corrective(&self, state: &PendulumState) -> f64 {
        let p = &self.physics;
        let (kp, kd) = control::pd_gains(self.gains.natural_freq, self.gains.damping_ratio);
        let e = angle::deviation(state.theta);
        let cancel = p.ka() * state.theta.sin() - p.ks() * state.theta + p.kb() * state.theta_dot;
        cancel + control::pd(e, state.theta_dot, kp, kd)
    }

    fn adversarial(&self, state: &PendulumState) -> f64 {
        let e = angle::deviation(state.theta);
        let sign = if e != 0.0 {
            e.signum()
        } else if state.theta_dot != 0.0 {
            state.theta_dot.signum()
        } else {
            1.0
        };
        sign * self.aggression * (1.5 + 6.0 * e.abs())
    }
}

impl ControlSolver for AdaptiveSolver {
    fn set_mode(&mut self, mode: AiMode, difficulty: f64) {
        self.mode = mode;
        self.difficulty = difficulty.clamp(0.0, 1.0);
        let g = &self.gains;
        self.aggression = g.min_aggression + (g.max_aggression - g.min_aggression) * self.difficulty;
        self.assistance = g.max_assistance - (g.max_assistance - g.min_assistance) * self.difficulty;
    }

    fn mode(&self) -> AiMode {
        self.mode
    }

    fn difficulty(&self) -> f64 {
        self.difficulty
    }

    fn configure_physics(&mut self, params: PhysicsParams) {
        self.physics = params;
    }

    fn compute_control(&mut self, state: &PendulumState, _player_input: Option<f64>, dt: f64) -> f64 {
        if !(dt > 0.0) {
            return 0.0;
        }
        let accel = match self.mode {
            AiMode::Off => 0.0,
            AiMode::Competition => self.adversarial(state),
            AiMode::Helper => self.corrective(state) * self.assistance,
            AiMode::Tutorial | AiMode::Demo => self.corrective(state),
        };
        let cap = self.gains.max_accel;
        accel.clamp(-cap, cap) * dt
    }

    fn update_from_player_metrics(&mut self, metrics: &PlayerMetrics) {
        let g = self.gains;
        let skill = (metrics.stability_score / 100.0).clamp(0.0, 1.0);
        let quality = 0.5 * skill + 0.25 * metrics.force_efficiency + 0.25 * (1.0 - metrics.overcorrection_rate);

        // Struggling players get more help and a softer opponent.
        let assist_target = g.max_assistance - (g.max_assistance - g.min_assistance) * quality;
        let aggr_target = g.min_aggression + (g.max_aggression - g.min_aggression) * quality * (0.5 + self.difficulty);

        self.assistance = control::approach(self.assistance, assist_target, g.adapt_rate, g.min_assistance, g.max_assistance);
        self.aggression = control::approach(self.aggression, aggr_target, g.adapt_rate, g.min_aggression, g.max_aggression);
        self.last_metrics = Some(*metrics);

        debug!(
            stability = metrics.stability_score,
            assistance = self.assistance,
            aggression = self.aggression,
            "solver adapted"
        );
    }
}
