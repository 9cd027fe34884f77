//! AI control.
//!
//! [`ControlSolver`] is the pluggable seam (one force per frame from the
//! pendulum state); [`AiController`] wraps a solver with everything
//! mode-specific: helper dead zone and scaling, tutorial lessons, metrics
//! buffering and flushes, session counters and the training export.

pub mod adaptive;
pub mod metrics;
pub mod tutorial;

pub use adaptive::*;
pub use metrics::*;
pub use tutorial::*;

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::mechanics::angle;
use crate::store::Uploader;
use crate::systems::physics::{PendulumState, PhysicsParams};
use crate::systems::sdk::{ForceQueue, ForceSource};

pub const AI_MODELS_NAMESPACE: &str = "ai_models";

/// User-facing AI behavior. Modes are mutually exclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiMode {
    #[default]
    Off,
    /// Adversarial: tries to knock the player off balance.
    Competition,
    /// Assists only outside the dead zone, at reduced strength.
    Helper,
    /// Full-strength guidance plus lessons and hints.
    Tutorial,
    /// Full autonomous control.
    Demo,
}

impl AiMode {
    pub fn label(self) -> &'static str {
        match self {
            AiMode::Off => "Off",
            AiMode::Competition => "Competition",
            AiMode::Helper => "Helper",
            AiMode::Tutorial => "Tutorial",
            AiMode::Demo => "Demo",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            AiMode::Off => "AI disabled",
            AiMode::Competition => "AI opponent tries to knock you off balance",
            AiMode::Helper => "AI assists when you struggle",
            AiMode::Tutorial => "Step-by-step lessons with guided hints",
            AiMode::Demo => "AI fully controls the pendulum",
        }
    }
}

/// A controller producing one impulse per frame.
pub trait ControlSolver {
    fn set_mode(&mut self, mode: AiMode, difficulty: f64);
    fn mode(&self) -> AiMode;
    fn difficulty(&self) -> f64;
    /// Keep the solver's plant model in sync with the game.
    fn configure_physics(&mut self, params: PhysicsParams);
    /// Impulse (rad/s) to apply over the next step of length `dt`.
    fn compute_control(&mut self, state: &PendulumState, player_input: Option<f64>, dt: f64) -> f64;
    fn update_from_player_metrics(&mut self, metrics: &PlayerMetrics);
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Helper stays silent within this |θ − π| (rad).
    pub helper_dead_zone: f64,
    pub helper_scale: f64,
    /// Forces at or below this are not emitted.
    pub force_epsilon: f64,
    pub metrics_capacity: usize,
    pub flush_interval: f64,
    pub training_capacity: usize,
    /// Step assumed for the first frame and cap on later ones (s).
    pub default_dt: f64,
    pub max_dt: f64,
    pub gains: AdaptiveGains,
    pub tutorial: TutorialConfig,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            helper_dead_zone: 0.15,
            helper_scale: 0.55,
            force_epsilon: 0.001,
            metrics_capacity: 300,
            flush_interval: 1.0,
            training_capacity: 18_000,
            default_dt: 1.0 / 60.0,
            max_dt: 1.0 / 30.0,
            gains: AdaptiveGains::default(),
            tutorial: TutorialConfig::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    pub theta: f64,
    pub theta_dot: f64,
    pub player_force: f64,
    pub ai_force: f64,
    pub time: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub control_calls: u64,
    pub interventions: u64,
    pub mode: AiMode,
    pub difficulty: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingExport {
    pub exported_at: DateTime<Utc>,
    pub summary: SessionSummary,
    pub final_metrics: Option<PlayerMetrics>,
    pub samples: Vec<TrainingSample>,
}

/// Per-session AI wrapper around a [`ControlSolver`].
pub struct AiController<S: ControlSolver = AdaptiveSolver> {
    cfg: SolverConfig,
    solver: S,
    mode: AiMode,
    difficulty: f64,
    level: u32,
    metrics: MetricsBuffer,
    latest_metrics: Option<PlayerMetrics>,
    last_flush: f64,
    last_time: Option<f64>,
    session_start: Option<f64>,
    tutorial: Tutorial,
    current_hint: Option<Hint>,
    last_force: f64,
    control_calls: u64,
    interventions: u64,
    training: VecDeque<TrainingSample>,
    uploader: Option<Uploader>,
}

impl AiController<AdaptiveSolver> {
    pub fn new(cfg: SolverConfig) -> Self {
        Self::with_solver(cfg, AdaptiveSolver::new(cfg.gains))
    }
}

impl<S: ControlSolver> AiController<S> {
    pub fn with_solver(cfg: SolverConfig, solver: S) -> Self {
        Self {
            cfg,
            solver,
            mode: AiMode::Off,
            difficulty: 0.5,
            level: 1,
            metrics: MetricsBuffer::new(cfg.metrics_capacity),
            latest_metrics: None,
            last_flush: 0.0,
            last_time: None,
            session_start: None,
            tutorial: Tutorial::new(cfg.tutorial),
            current_hint: None,
            last_force: 0.0,
            control_calls: 0,
            interventions: 0,
            training: VecDeque::new(),
            uploader: None,
        }
    }

    pub fn set_uploader(&mut self, uploader: Uploader) {
        self.uploader = Some(uploader);
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    pub fn mode(&self) -> AiMode {
        self.mode
    }

    pub fn difficulty(&self) -> f64 {
        self.difficulty
    }

    pub fn is_active(&self) -> bool {
        self.mode != AiMode::Off
    }

    pub fn current_hint(&self) -> Option<&Hint> {
        self.current_hint.as_ref()
    }

    pub fn last_force(&self) -> f64 {
        self.last_force
    }

    pub fn latest_metrics(&self) -> Option<&PlayerMetrics> {
        self.latest_metrics.as_ref()
    }

    pub fn tutorial(&self) -> &Tutorial {
        &self.tutorial
    }

    pub fn training_len(&self) -> usize {
        self.training.len()
    }

    pub fn set_level(&mut self, level: u32) {
        self.level = level.max(1);
    }

    pub fn configure_physics(&mut self, params: PhysicsParams) {
        self.solver.configure_physics(params);
    }

    /// Switch mode. Any scheduled tutorial advance is dropped.
    pub fn set_mode(&mut self, mode: AiMode, difficulty: f64) {
        let difficulty = difficulty.clamp(0.0, 1.0);
        self.tutorial.cancel_pending();
        if mode == AiMode::Tutorial && self.mode != AiMode::Tutorial {
            self.tutorial.restart();
        }
        self.mode = mode;
        self.difficulty = difficulty;
        self.solver.set_mode(mode, difficulty);
        if mode == AiMode::Off {
            self.current_hint = None;
            self.last_force = 0.0;
        }
        info!(mode = mode.label(), difficulty, "ai mode set");
    }

    pub fn restart_tutorial(&mut self) {
        self.tutorial.restart();
        self.current_hint = None;
    }

    /// One frame of AI: compute, scale, emit into `queue`, buffer metrics.
    pub fn update(
        &mut self,
        theta: f64,
        theta_dot: f64,
        time: f64,
        player_force: f64,
        balance_threshold: f64,
        queue: &mut ForceQueue,
    ) {
        if self.mode == AiMode::Off {
            self.last_force = 0.0;
            self.current_hint = None;
            return;
        }
        if self.session_start.is_none() {
            self.session_start = Some(time);
        }

        let dt = match self.last_time {
            Some(prev) if time > prev => (time - prev).min(self.cfg.max_dt),
            Some(_) => 0.0,
            None => self.cfg.default_dt,
        };
        self.last_time = Some(time);

        let state = PendulumState { theta, theta_dot, time };
        let input = (player_force != 0.0).then_some(player_force);
        let raw = self.solver.compute_control(&state, input, dt);
        let force = self.scale_for_mode(raw, theta);

        if force.abs() > self.cfg.force_epsilon {
            queue.push(ForceSource::Ai, force);
            self.interventions += 1;
        }
        self.control_calls += 1;
        self.last_force = force;

        self.current_hint = if self.mode == AiMode::Tutorial {
            self.tutorial.update(theta, theta_dot, time, player_force, balance_threshold)
        } else {
            None
        };

        self.metrics.push(MetricSample { theta, theta_dot, player_force, time });
        if self.training.len() == self.cfg.training_capacity.max(1) {
            self.training.pop_front();
        }
        self.training.push_back(TrainingSample { theta, theta_dot, player_force, ai_force: force, time });

        if time - self.last_flush >= self.cfg.flush_interval {
            self.flush_metrics(time, balance_threshold);
            self.last_flush = time;
        }
    }

    fn scale_for_mode(&self, raw: f64, theta: f64) -> f64 {
        match self.mode {
            AiMode::Off => 0.0,
            AiMode::Helper => {
                if angle::deviation(theta).abs() <= self.cfg.helper_dead_zone {
                    0.0
                } else {
                    raw * self.cfg.helper_scale
                }
            }
            AiMode::Tutorial => raw * self.tutorial.ai_scale(),
            AiMode::Competition | AiMode::Demo => raw,
        }
    }

    fn flush_metrics(&mut self, time: f64, threshold: f64) {
        let duration = self.session_start.map_or(time, |s| time - s);
        if let Some(m) = self.metrics.reduce(threshold, duration, self.level) {
            debug!(stability = m.stability_score, efficiency = m.force_efficiency, "metrics flushed");
            self.solver.update_from_player_metrics(&m);
            self.latest_metrics = Some(m);
        }
    }

    pub fn on_session_start(&mut self) {
        self.session_start = None;
        self.control_calls = 0;
        self.interventions = 0;
        self.metrics.clear();
        self.latest_metrics = None;
        self.training.clear();
        self.last_flush = 0.0;
        self.last_time = None;
        self.tutorial.cancel_pending();
    }

    pub fn session_summary(&self) -> SessionSummary {
        SessionSummary {
            control_calls: self.control_calls,
            interventions: self.interventions,
            mode: self.mode,
            difficulty: self.difficulty,
        }
    }

    /// Snapshot of the training buffer.
    pub fn training_export(&self, now: DateTime<Utc>) -> TrainingExport {
        TrainingExport {
            exported_at: now,
            summary: self.session_summary(),
            final_metrics: self.latest_metrics,
            samples: self.training.iter().copied().collect(),
        }
    }

    /// Close the session. When the AI ran, the training buffer is exported
    /// and queued for upload; failures are logged. Returns the export.
    pub fn on_session_end(&mut self, now: DateTime<Utc>) -> Option<TrainingExport> {
        self.tutorial.cancel_pending();
        let export = (self.is_active() && self.control_calls > 0).then(|| self.training_export(now));

        if let Some(export) = export.as_ref() {
            match self.uploader.as_ref() {
                Some(up) => {
                    let name = format!("training_{}.json", now.format("%Y-%m-%dT%H:%M:%SZ"));
                    match up.upload_json(AI_MODELS_NAMESPACE, &name, export) {
                        Ok(path) => info!(%path, samples = export.samples.len(), "training data queued"),
                        Err(e) => warn!(error = %e, "could not queue training data"),
                    }
                }
                None => debug!("no uploader configured, training export kept local"),
            }
        }

        self.session_start = None;
        self.metrics.clear();
        self.training.clear();
        self.last_flush = 0.0;
        self.last_time = None;
        export
    }
}
