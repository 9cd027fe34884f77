// src/systems/sdk.rs

//! # Systems SDK
//!
//! Shared protocol for the per-frame **systems** (physics, perturbation,
//! level, solver, session). A system owns a small piece of state, is driven
//! synchronously from the host's frame callback, and talks to its neighbours
//! through the types in this module rather than through captured callbacks.
//!
//! ## Force events
//! Anything that wants to push the pendulum (the player, the AI controller,
//! the perturbation generator) emits a [`ForceEvent`] into the frame's
//! [`ForceQueue`]. The session loop drains the queue exactly once per physics
//! step, so ordering and attribution are explicit:
//!
//! - events are applied in push order;
//! - each event keeps its [`ForceSource`], so a frame report can say how much
//!   of the push came from the AI and how much from a gust;
//! - non-finite magnitudes are dropped at the door.
//!
//! ## Hooks into the loop
//! Optional collaborators implement one of the small traits below. Every
//! method has a no-op default where that makes sense, so a host only writes
//! what it needs:
//!
//! - [`StateRecorder`]: outbound, rate-limited state samples (recording,
//!   rendering, export). Purely a notification.
//! - [`LevelListener`]: level start / completion / difficulty changes.
//! - [`SessionAdapter`]: a session-external policy that may return an
//!   [`AdaptationDelta`] while the session runs (Golden Mode implements it).
//!
//! ## Determinism
//! Systems never read wall-clock time; they are handed the session clock.
//! Randomness is seeded explicitly by the caller.

use crate::systems::solver::AiMode;

/// Who produced a force.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ForceSource {
    Player,
    Ai,
    Perturbation,
}

/// One impulse request (rad/s of angular velocity change).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ForceEvent {
    pub source: ForceSource,
    pub magnitude: f64,
}

/// Small per-frame queue of force events, drained once per physics step.
#[derive(Clone, Debug, Default)]
pub struct ForceQueue {
    events: Vec<ForceEvent>,
}

impl ForceQueue {
    pub fn new() -> Self {
        Self { events: Vec::with_capacity(4) }
    }

    /// Queue an impulse; non-finite magnitudes are ignored.
    pub fn push(&mut self, source: ForceSource, magnitude: f64) {
        if magnitude.is_finite() {
            self.events.push(ForceEvent { source, magnitude });
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Pending events in push order, without consuming them.
    pub fn pending(&self) -> &[ForceEvent] {
        &self.events
    }

    /// Sum of pending magnitudes from one source.
    pub fn total_from(&self, source: ForceSource) -> f64 {
        self.events
            .iter()
            .filter(|e| e.source == source)
            .map(|e| e.magnitude)
            .sum()
    }

    /// Take every pending event, leaving the queue empty.
    pub fn drain(&mut self) -> Vec<ForceEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

/// A throttled state sample handed to a [`StateRecorder`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StateSample {
    pub time: f64,
    pub angle: f64,
    pub angle_velocity: f64,
    pub is_balanced: bool,
    pub energy: f64,
    pub ai_mode: AiMode,
    pub ai_force: f64,
}

/// Outbound state notifications; no return value is expected.
pub trait StateRecorder {
    fn record_state(&mut self, sample: &StateSample);
}

/// Level progression notifications.
pub trait LevelListener {
    fn did_complete_level(&mut self, _level: u32, _config: &crate::systems::level::LevelConfig) {}
    fn did_start_new_level(&mut self, _level: u32, _config: &crate::systems::level::LevelConfig) {}
    fn update_difficulty_parameters(&mut self, _config: &crate::systems::level::LevelConfig) {}
}

/// Mid-session parameter nudge. Only constructed when something changes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AdaptationDelta {
    /// Added to the current damping.
    pub damping_delta: f64,
    /// Multiplied into the current perturbation strength.
    pub perturbation_scale: f64,
    /// Added to the current balance threshold (rad).
    pub threshold_delta: f64,
}

impl AdaptationDelta {
    /// `None` when every field is the identity.
    pub fn new(damping_delta: f64, perturbation_scale: f64, threshold_delta: f64) -> Option<Self> {
        let changed = damping_delta != 0.0 || perturbation_scale != 1.0 || threshold_delta != 0.0;
        changed.then_some(Self { damping_delta, perturbation_scale, threshold_delta })
    }
}

/// Session-external policy consulted every frame.
pub trait SessionAdapter {
    fn on_frame_update(
        &mut self,
        theta: f64,
        theta_dot: f64,
        elapsed: f64,
        recent_stability: f64,
    ) -> Option<AdaptationDelta>;
}
