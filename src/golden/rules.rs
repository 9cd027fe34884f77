//! Tier 1: deterministic rules over the feature vector.
//!
//! Always available. Rules are checked in order; the first that matches
//! picks the focus area. Confidence reflects how much data the rule saw.

use chrono::{DateTime, Utc};

use super::features::FeatureVector;
use super::recommendation::{FocusArea, Recommendation, Tier};
use super::sdk::TrainingGoal;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RuleParams {
    /// Below this many hours of sleep the player is steered to recovery.
    pub short_sleep_hours: f64,
    /// HRV (ms) under which the player counts as stressed.
    pub low_hrv: f64,
    pub low_stability: f64,
    pub high_stability: f64,
    /// Reaction time (s) above which reaction drills are suggested.
    pub slow_reaction: f64,
    pub high_overcorrection: f64,
    pub high_frustration: f64,
}

impl Default for RuleParams {
    fn default() -> Self {
        Self {
            short_sleep_hours: 6.0,
            low_hrv: 30.0,
            low_stability: 40.0,
            high_stability: 75.0,
            slow_reaction: 0.5,
            high_overcorrection: 0.4,
            high_frustration: 0.7,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct RuleEngine {
    params: RuleParams,
}

impl RuleEngine {
    pub fn new(params: RuleParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &RuleParams {
        &self.params
    }

    /// Focus area and the rule that chose it.
    pub fn classify(&self, fv: &FeatureVector) -> (FocusArea, &'static str) {
        let p = &self.params;

        if fv.sleep_hours.is_some_and(|h| h < p.short_sleep_hours) {
            return (FocusArea::Recovery, "short sleep last night");
        }
        if fv.heart_rate_variability.is_some_and(|h| h < p.low_hrv)
            || fv.maze_frustration.is_some_and(|f| f > p.high_frustration)
        {
            return (FocusArea::Calm, "elevated stress signals");
        }
        if fv.session_count == 0 {
            return match fv.training_goal {
                Some(TrainingGoal::Relaxation) => (FocusArea::Calm, "first session, relaxation goal"),
                _ => (FocusArea::Stability, "first session"),
            };
        }
        if fv.stability_score.is_some_and(|s| s < p.low_stability) {
            return (FocusArea::Stability, "stability below target");
        }
        if fv.overcorrection_rate.is_some_and(|o| o > p.high_overcorrection) {
            return (FocusArea::Precision, "frequent overcorrection");
        }
        if fv.average_reaction_time.is_some_and(|r| r > p.slow_reaction) {
            return (FocusArea::Reaction, "slow reactions");
        }
        if fv.stability_score.is_some_and(|s| s > p.high_stability) {
            return (FocusArea::Endurance, "stable play, ready for longer sessions");
        }
        match fv.training_goal {
            Some(TrainingGoal::Focus) => (FocusArea::Precision, "focus goal"),
            Some(TrainingGoal::Relaxation) => (FocusArea::Calm, "relaxation goal"),
            Some(TrainingGoal::Research) => (FocusArea::Endurance, "research goal"),
            Some(TrainingGoal::Curiosity) | None => (FocusArea::Stability, "default"),
        }
    }

    pub fn recommend(&self, fv: &FeatureVector, now: DateTime<Utc>) -> Recommendation {
        let (focus, reason) = self.classify(fv);
        let confidence = 0.4 + 0.4 * fv.completeness();
        Recommendation::new(focus, confidence, fv.current_max_level, Tier::RuleEngine, reason, now)
    }
}
