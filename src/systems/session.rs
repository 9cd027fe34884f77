//! One balance session, driven one frame at a time.
//!
//! Frame order inside [`SessionLoop::tick`]:
//!
//! 1. drain the [`ForceQueue`] into the pendulum and step physics;
//! 2. fall, balance and countdown checks (level completion advances);
//! 3. AI update, then perturbation update (both enqueue for the next step);
//! 4. throttled state recording;
//! 5. session adapter consultation and delta application.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::f64::consts::{FRAC_PI_2, PI};
use std::rc::Rc;

use bevy_prng::WyRand;
use chrono::{DateTime, Utc};
use rand_core::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::mechanics::{angle, stoch};
use crate::systems::level::{GameMode, LevelConfig, LevelManager};
use crate::systems::perturbation::{PerturbationConfig, PerturbationManager, PerturbationProfile};
use crate::systems::physics::{PendulumModel, PendulumState, PhysicsParams};
use crate::systems::sdk::{AdaptationDelta, ForceQueue, ForceSource, SessionAdapter, StateRecorder, StateSample};
use crate::systems::solver::{AdaptiveSolver, AiController, ControlSolver, TrainingExport};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub seed: u64,
    /// |θ − π| beyond which the pendulum has fallen.
    pub fall_threshold: f64,
    /// Minimum seconds between recorder samples.
    pub record_interval: f64,
    /// Rolling stability window (s).
    pub stability_window: f64,
    pub min_damping: f64,
    pub max_damping: f64,
    pub min_threshold: f64,
    pub max_threshold: f64,
    pub physics: PhysicsParams,
    pub perturbation: PerturbationConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            seed: 0x5EED,
            fall_threshold: FRAC_PI_2,
            record_interval: 0.1,
            stability_window: 10.0,
            min_damping: 0.05,
            max_damping: 1.0,
            min_threshold: 0.05,
            max_threshold: 0.6,
            physics: PhysicsParams::default(),
            perturbation: PerturbationConfig::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Idle,
    Running,
    Paused,
    /// Fell past the fall threshold; simulation paused.
    Fallen,
    /// Timed-mode countdown expired.
    TimedOut,
    Ended,
}

/// What happened during one tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameReport {
    pub state: PendulumState,
    pub status: SessionStatus,
    pub elapsed: f64,
    pub balanced: bool,
    pub balance_progress: f64,
    pub score: u64,
    /// Impulses applied during this step, by source.
    pub player_force: f64,
    pub ai_force: f64,
    pub perturbation_force: f64,
    /// Level just completed, if any.
    pub completed_level: Option<u32>,
    pub adaptation: Option<AdaptationDelta>,
}

pub struct SessionLoop<S: ControlSolver = AdaptiveSolver> {
    cfg: SessionConfig,
    rng: WyRand,
    model: PendulumModel,
    perturbation: PerturbationManager,
    levels: LevelManager,
    ai: AiController<S>,
    queue: ForceQueue,
    status: SessionStatus,
    score: u64,
    elapsed: f64,
    level_elapsed: f64,
    balanced_for: f64,
    balance_progress: f64,
    threshold: f64,
    required_time: f64,
    countdown: Option<f64>,
    window: VecDeque<(f64, bool)>,
    last_record: Option<f64>,
    recorder: Option<Box<dyn StateRecorder>>,
    adapter: Option<Rc<RefCell<dyn SessionAdapter>>>,
}

impl<S: ControlSolver> SessionLoop<S> {
    pub fn new(cfg: SessionConfig, levels: LevelManager, ai: AiController<S>) -> Self {
        let level = levels.current_config();
        Self {
            cfg,
            rng: WyRand::from_seed(cfg.seed.to_le_bytes()),
            model: PendulumModel::new(cfg.physics),
            perturbation: PerturbationManager::new(cfg.perturbation, cfg.seed.rotate_left(17) ^ 0xA5A5_A5A5),
            levels,
            ai,
            queue: ForceQueue::new(),
            status: SessionStatus::Idle,
            score: 0,
            elapsed: 0.0,
            level_elapsed: 0.0,
            balanced_for: 0.0,
            balance_progress: 0.0,
            threshold: level.balance_threshold,
            required_time: level.balance_required_time,
            countdown: level.countdown_time,
            window: VecDeque::new(),
            last_record: None,
            recorder: None,
            adapter: None,
        }
    }

    pub fn set_recorder(&mut self, recorder: Box<dyn StateRecorder>) {
        self.recorder = Some(recorder);
    }

    pub fn set_adapter(&mut self, adapter: Rc<RefCell<dyn SessionAdapter>>) {
        self.adapter = Some(adapter);
    }

    pub fn clear_adapter(&mut self) {
        self.adapter = None;
    }

    pub fn state(&self) -> PendulumState {
        self.model.state()
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn balance_progress(&self) -> f64 {
        self.balance_progress
    }

    pub fn balance_threshold(&self) -> f64 {
        self.threshold
    }

    pub fn required_time(&self) -> f64 {
        self.required_time
    }

    pub fn model(&self) -> &PendulumModel {
        &self.model
    }

    pub fn levels(&self) -> &LevelManager {
        &self.levels
    }

    pub fn levels_mut(&mut self) -> &mut LevelManager {
        &mut self.levels
    }

    pub fn ai(&self) -> &AiController<S> {
        &self.ai
    }

    pub fn ai_mut(&mut self) -> &mut AiController<S> {
        &mut self.ai
    }

    pub fn perturbation(&self) -> &PerturbationManager {
        &self.perturbation
    }

    pub fn perturbation_mut(&mut self) -> &mut PerturbationManager {
        &mut self.perturbation
    }

    /// Percent of frames balanced over the rolling window.
    pub fn recent_stability(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        let balanced = self.window.iter().filter(|(_, b)| *b).count();
        balanced as f64 / self.window.len() as f64 * 100.0
    }

    /// Replace the active disturbance (e.g. a Golden Mode override).
    pub fn set_perturbation_profile(&mut self, profile: PerturbationProfile) {
        // rejection is logged by the manager; the old profile stays
        let _ = self.perturbation.activate_profile(profile);
    }

    /// Load physics, thresholds and perturbation for `config` and place the
    /// pendulum at upright ± the level's initial offset.
    pub fn apply_level_config(&mut self, config: &LevelConfig) {
        let params = config.physics(&self.cfg.physics);
        self.model.set_params(params);
        self.ai.configure_physics(params);
        self.ai.set_level(config.number);

        self.threshold = config.balance_threshold;
        self.required_time = config.balance_required_time;
        self.countdown = config.countdown_time;
        self.level_elapsed = 0.0;
        self.balanced_for = 0.0;
        self.balance_progress = 0.0;

        let offset = angle::deg_to_rad(config.initial_perturbation) * stoch::random_sign(&mut self.rng);
        self.model.reset_with_angle(PI + offset);
        self.queue.clear();

        let _ = self.perturbation.activate_profile(config.perturbation_profile(self.levels.mode()));
    }

    /// Fresh session at the level manager's current level.
    pub fn start(&mut self) {
        self.score = 0;
        self.elapsed = 0.0;
        self.window.clear();
        self.last_record = None;
        self.ai.on_session_start();
        let config = self.levels.current_config();
        self.apply_level_config(&config);
        self.status = SessionStatus::Running;
        info!(level = config.number, mode = ?self.levels.mode(), "session started");
    }

    pub fn pause(&mut self) {
        if self.status == SessionStatus::Running {
            self.status = SessionStatus::Paused;
            self.perturbation.stop();
        }
    }

    pub fn resume(&mut self) {
        if self.status == SessionStatus::Paused {
            self.status = SessionStatus::Running;
            self.perturbation.resume();
        }
    }

    /// Stop for good; hands back the AI's training export when there is one.
    pub fn end(&mut self, now: DateTime<Utc>) -> Option<TrainingExport> {
        self.status = SessionStatus::Ended;
        self.perturbation.stop();
        self.queue.clear();
        info!(score = self.score, elapsed = self.elapsed, "session ended");
        self.ai.on_session_end(now)
    }

    /// A player push; scores a point while running.
    pub fn apply_player_force(&mut self, magnitude: f64) {
        if self.status != SessionStatus::Running || !magnitude.is_finite() {
            return;
        }
        self.queue.push(ForceSource::Player, magnitude);
        self.score += 1;
    }

    /// Advance one frame of `dt` seconds.
    pub fn tick(&mut self, dt: f64) -> FrameReport {
        let mut report = self.report();
        if self.status != SessionStatus::Running || !(dt > 0.0) {
            return report;
        }
        let dt = dt.min(self.cfg.physics.max_dt);

        let (mut player, mut ai, mut pert) = (0.0, 0.0, 0.0);
        for event in self.queue.drain() {
            self.model.apply_force(event.magnitude);
            match event.source {
                ForceSource::Player => player += event.magnitude,
                ForceSource::Ai => ai += event.magnitude,
                ForceSource::Perturbation => pert += event.magnitude,
            }
        }
        self.model.step(dt);
        self.elapsed += dt;
        self.level_elapsed += dt;

        let state = self.model.state();
        let dev = angle::deviation(state.theta);

        if dev.abs() > self.cfg.fall_threshold {
            self.status = SessionStatus::Fallen;
            self.perturbation.stop();
            info!(elapsed = self.elapsed, level = self.levels.current_level(), "pendulum fell");
            return FrameReport { player_force: player, ai_force: ai, perturbation_force: pert, ..self.report() };
        }

        let balanced = dev.abs() < self.threshold;
        let completed_level = self.check_balance(balanced, dt);

        if let Some(limit) = self.countdown {
            if completed_level.is_none() && self.level_elapsed >= limit {
                self.status = SessionStatus::TimedOut;
                self.perturbation.stop();
                info!(limit, level = self.levels.current_level(), "countdown expired");
            }
        }

        self.window.push_back((self.elapsed, balanced));
        let horizon = self.elapsed - self.cfg.stability_window;
        while self.window.front().is_some_and(|(t, _)| *t < horizon) {
            self.window.pop_front();
        }
        let recent = self.recent_stability();

        let state = self.model.state();
        if self.status == SessionStatus::Running {
            self.ai.update(state.theta, state.theta_dot, self.elapsed, player, self.threshold, &mut self.queue);
            self.perturbation
                .update_into(self.elapsed, angle::deviation(state.theta), &mut self.queue);
        }

        self.record(state, balanced);

        let adaptation = match self.adapter.as_ref() {
            Some(a) if self.status == SessionStatus::Running => {
                a.borrow_mut().on_frame_update(state.theta, state.theta_dot, self.elapsed, recent)
            }
            _ => None,
        };
        if let Some(delta) = adaptation {
            self.apply_adaptation(delta);
        }

        report = self.report();
        FrameReport {
            balanced,
            player_force: player,
            ai_force: ai,
            perturbation_force: pert,
            completed_level,
            adaptation,
            ..report
        }
    }

    /// Apply a mid-session nudge within the configured safe bounds.
    pub fn apply_adaptation(&mut self, delta: AdaptationDelta) {
        let mut params = *self.model.params();
        params.damping = (params.damping + delta.damping_delta).clamp(self.cfg.min_damping, self.cfg.max_damping);
        self.model.set_params(params);
        self.ai.configure_physics(params);

        if delta.perturbation_scale != 1.0 {
            self.perturbation.scale_intensity(delta.perturbation_scale);
        }
        self.threshold = (self.threshold + delta.threshold_delta).clamp(self.cfg.min_threshold, self.cfg.max_threshold);

        info!(
            damping = params.damping,
            perturbation_scale = delta.perturbation_scale,
            threshold = self.threshold,
            "mid-session adaptation applied"
        );
    }

    fn check_balance(&mut self, balanced: bool, dt: f64) -> Option<u32> {
        if !balanced {
            self.balanced_for = 0.0;
            self.balance_progress = 0.0;
            return None;
        }
        self.balanced_for += dt;
        self.balance_progress = (self.balanced_for / self.required_time.max(1e-6)).min(1.0);

        // free play has no level progression
        if self.balanced_for < self.required_time || self.levels.mode() == GameMode::FreePlay {
            return None;
        }

        let level = self.levels.current_level();
        self.score += 100 * u64::from(level);
        self.levels.advance_to_next_level();
        let next = self.levels.current_config();
        self.apply_level_config(&next);
        debug!(completed = level, next = next.number, "level advanced");
        Some(level)
    }

    fn record(&mut self, state: PendulumState, balanced: bool) {
        let Some(recorder) = self.recorder.as_mut() else {
            return;
        };
        let due = self.last_record.is_none_or(|t| self.elapsed - t >= self.cfg.record_interval);
        if !due {
            return;
        }
        self.last_record = Some(self.elapsed);
        recorder.record_state(&StateSample {
            time: self.elapsed,
            angle: state.theta,
            angle_velocity: state.theta_dot,
            is_balanced: balanced,
            energy: self.model.total_energy(),
            ai_mode: self.ai.mode(),
            ai_force: self.ai.last_force(),
        });
    }

    fn report(&self) -> FrameReport {
        FrameReport {
            state: self.model.state(),
            status: self.status,
            elapsed: self.elapsed,
            balanced: angle::within(self.model.state().theta, self.threshold),
            balance_progress: self.balance_progress,
            score: self.score,
            player_force: 0.0,
            ai_force: 0.0,
            perturbation_force: 0.0,
            completed_level: None,
            adaptation: None,
        }
    }
}
