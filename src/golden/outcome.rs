use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::systems::level::GameMode;
use crate::systems::solver::AiMode;

use super::features::FeatureVector;
use super::recommendation::{FocusArea, Recommendation};

/// Host-measured facts about a finished session.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    /// Seconds.
    pub duration: f64,
    pub completed: bool,
    pub levels_completed: u32,
    /// Percent, [0, 100].
    pub final_stability: f64,
    /// Seconds.
    pub final_reaction_time: f64,
    pub score: u64,
}

/// Durable record of one Golden Mode session. Never mutated once built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GoldenModeOutcome {
    pub id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub recommendation: Option<Recommendation>,
    pub was_recommendation_followed: bool,
    pub actual_game_mode: GameMode,
    pub actual_ai_mode: AiMode,
    pub pre_session_features: FeatureVector,
    pub session_duration: f64,
    pub session_completed: bool,
    /// Final minus pre-session stability, percentage points.
    pub stability_improvement: f64,
    /// Pre-session minus final reaction time; positive is faster.
    pub reaction_time_improvement: f64,
    pub levels_completed: u32,
    /// Duration over target, capped at 1.5, discounted when abandoned.
    pub enjoyment_proxy: f64,
    pub coherence_score_end: f64,
}

impl GoldenModeOutcome {
    pub fn focus_area(&self) -> Option<FocusArea> {
        self.recommendation.as_ref().map(|r| r.focus_area)
    }

    /// How well the session went, [-1, 1].
    pub fn reward(&self) -> f64 {
        let stability = (self.stability_improvement / 10.0).tanh();
        let reaction = (self.reaction_time_improvement * 10.0).tanh();
        let enjoyment = self.enjoyment_proxy.clamp(0.0, 1.0) * 2.0 - 1.0;
        let r = 0.4 * stability + 0.2 * reaction + 0.4 * enjoyment;
        if r.is_finite() { r.clamp(-1.0, 1.0) } else { 0.0 }
    }
}

/// Duration ratio against the target, ×0.6 when the session was abandoned.
pub fn enjoyment_proxy(duration_secs: f64, target_minutes: f64, completed: bool) -> f64 {
    let target = if target_minutes > 0.0 { target_minutes } else { 10.0 };
    let ratio = (duration_secs.max(0.0) / 60.0 / target).min(1.5);
    if completed { ratio } else { ratio * 0.6 }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingEntry {
    pub date: DateTime<Utc>,
    pub samples: usize,
    pub accuracy: f64,
}

/// Remote metadata snapshot at `model_state.json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelState {
    pub version: u32,
    pub last_trained_date: DateTime<Utc>,
    pub session_count: usize,
    pub outcome_count: usize,
    pub classifier_available: bool,
    pub training_history: Vec<TrainingEntry>,
}
