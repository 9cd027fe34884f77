//! Cross-system feature vector.
//!
//! Built fresh for every recommendation from whatever providers are wired.
//! Optional fields stay `None` when their source is absent; they are never
//! filled with guesses. Non-finite provider readings count as absent, so a
//! built vector always survives a JSON round trip.
//! [`FeatureVector::model_input`] is the one place that maps missing values
//! to a neutral 0.5 for the learned tiers.

use chrono::{Datelike, Timelike};
use serde::{Deserialize, Serialize};

use crate::mechanics::stats;

use super::sdk::{Providers, TrainingGoal};

/// Minimum paired samples for a health/performance correlation.
pub const MIN_CORRELATION_SAMPLES: usize = 5;

fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite())
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    // health
    pub resting_heart_rate: Option<f64>,
    pub heart_rate_variability: Option<f64>,
    pub sleep_hours: Option<f64>,
    pub steps: Option<u32>,
    pub active_calories: Option<f64>,
    pub mindful_minutes: Option<u32>,
    /// Hours since the health snapshot was taken.
    pub health_age_hours: Option<f64>,

    // skill and sessions
    pub session_count: usize,
    pub stability_score: Option<f64>,
    pub average_reaction_time: Option<f64>,
    pub force_efficiency: Option<f64>,
    pub overcorrection_rate: Option<f64>,
    pub current_max_level: u32,
    pub days_since_last_session: Option<i64>,
    pub learning_curve_slope: f64,

    // cross-app
    pub maze_motor_score: Option<f64>,
    pub maze_cognitive_score: Option<f64>,
    pub maze_flow_state: Option<f64>,
    pub maze_frustration: Option<f64>,
    pub maze_confidence: Option<f64>,
    pub maze_focus_level: Option<f64>,
    pub maze_decision_latency: Option<f64>,
    pub maze_efficiency: Option<f64>,
    pub maze_session_count: usize,
    pub maze_digital_signature: Option<Vec<f64>>,

    // context
    pub training_goal: Option<TrainingGoal>,
    pub hour_of_day: u32,
    /// 1 = Monday.
    pub day_of_week: u32,
    pub hrv_performance_correlation: Option<f64>,
    pub sleep_performance_correlation: Option<f64>,
}

impl FeatureVector {
    pub const MODEL_DIM: usize = 12;

    pub fn has_maze_data(&self) -> bool {
        self.maze_session_count > 0
    }

    pub fn has_health_data(&self) -> bool {
        self.health_age_hours.is_some()
    }

    /// Fraction of optional signals present, [0, 1].
    pub fn completeness(&self) -> f64 {
        let present = [
            self.resting_heart_rate.is_some(),
            self.heart_rate_variability.is_some(),
            self.sleep_hours.is_some(),
            self.steps.is_some(),
            self.stability_score.is_some(),
            self.average_reaction_time.is_some(),
            self.has_maze_data(),
            self.training_goal.is_some(),
            self.hrv_performance_correlation.is_some(),
        ];
        present.iter().filter(|p| **p).count() as f64 / present.len() as f64
    }

    /// Fixed-width numeric view in roughly [0, 1]; missing values are 0.5.
    pub fn model_input(&self) -> [f64; Self::MODEL_DIM] {
        let norm = |v: Option<f64>, scale: f64| v.map_or(0.5, |x| (x / scale).clamp(0.0, 2.0));
        [
            norm(self.sleep_hours, 8.0),
            norm(self.heart_rate_variability, 100.0),
            norm(self.resting_heart_rate, 100.0),
            norm(self.steps.map(f64::from), 10_000.0),
            norm(self.stability_score, 100.0),
            norm(self.average_reaction_time, 1.0),
            norm(self.force_efficiency, 1.0),
            norm(self.overcorrection_rate, 1.0),
            (self.current_max_level as f64 / 20.0).clamp(0.0, 2.0),
            norm(self.maze_flow_state, 1.0),
            norm(self.maze_frustration, 1.0),
            self.hour_of_day as f64 / 24.0,
        ]
    }

    /// Read every wired provider.
    pub fn build(providers: &Providers) -> Self {
        let now = providers.clock.now();
        let mut fv = FeatureVector {
            current_max_level: 1,
            hour_of_day: now.hour(),
            day_of_week: now.weekday().number_from_monday(),
            ..Default::default()
        };

        if let Some(snap) = providers.health.as_ref().and_then(|h| h.latest_snapshot()) {
            fv.resting_heart_rate = finite(snap.resting_heart_rate);
            fv.heart_rate_variability = finite(snap.heart_rate_variability);
            fv.sleep_hours = finite(snap.sleep_duration.map(|s| s / 3600.0));
            fv.steps = snap.steps;
            fv.active_calories = finite(snap.active_calories);
            fv.mindful_minutes = Some(snap.mindful_minutes);
            let age = (now - snap.date).num_seconds() as f64 / 3600.0;
            fv.health_age_hours = Some(age.max(0.0));
        }

        if let Some(history) = providers.history.as_ref() {
            fv.session_count = history.session_count();
            fv.current_max_level = history.max_level().max(1);
            let slope = history.learning_curve_slope();
            fv.learning_curve_slope = if slope.is_finite() { slope } else { 0.0 };
            fv.days_since_last_session = history.last_session_at().map(|t| (now - t).num_days().max(0));
            if let Some(m) = history.latest_metrics() {
                fv.stability_score = finite(Some(m.stability_score));
                fv.average_reaction_time = finite(Some(m.average_reaction_time));
                fv.force_efficiency = finite(Some(m.force_efficiency));
                fv.overcorrection_rate = finite(Some(m.overcorrection_rate));
            }

            let samples = history.correlation_samples(20);
            if samples.len() >= MIN_CORRELATION_SAMPLES {
                let paired = |pick: fn(&super::sdk::CorrelationSample) -> Option<f64>| {
                    let (xs, ys): (Vec<f64>, Vec<f64>) =
                        samples
                        .iter()
                        .filter_map(|s| finite(pick(s)).zip(finite(Some(s.session_score))))
                        .unzip();
                    stats::pearson(&xs, &ys, MIN_CORRELATION_SAMPLES)
                };
                fv.hrv_performance_correlation = paired(|s| s.heart_rate_variability);
                fv.sleep_performance_correlation = paired(|s| s.sleep_duration.map(|d| d / 3600.0));
            }
        }

        if let Some(maze) = providers.maze.as_ref().and_then(|m| m.load()) {
            if let Some(latest) = maze.sessions.last() {
                fv.maze_motor_score = finite(Some(latest.motor_score));
                fv.maze_cognitive_score = finite(Some(latest.cognitive_score));
                fv.maze_flow_state = finite(Some(latest.flow_state));
                fv.maze_frustration = finite(Some(latest.frustration));
                fv.maze_confidence = finite(Some(latest.confidence));
                fv.maze_focus_level = finite(Some(latest.focus_level));
                fv.maze_decision_latency = finite(Some(latest.decision_latency));
                fv.maze_efficiency = finite(Some(latest.movement_efficiency));
            }
            fv.maze_session_count = maze.sessions.len();
            fv.maze_digital_signature = maze.digital_signature.filter(|sig| sig.iter().all(|x| x.is_finite()));
        }

        if let Some(profile) = providers.profile.as_ref().and_then(|p| p.profile()) {
            fv.training_goal = Some(profile.training_goal);
        }

        fv
    }
}
