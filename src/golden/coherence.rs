//! Coherence score: a 0–100 composite of health freshness, health and
//! performance alignment, skill trajectory, cross-app strength, and play
//! consistency.

use serde::{Deserialize, Serialize};

use super::features::FeatureVector;

/// Overcorrection assumed when no metrics exist yet.
const DEFAULT_OVERCORRECTION: f64 = 0.3;
/// Cross-app component when no maze data exists, percent.
const NO_MAZE_BASELINE: f64 = 30.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoherenceLabel {
    Diverging,
    Aligning,
    Resonant,
    Coherent,
}

impl CoherenceLabel {
    pub fn for_score(score: f64) -> Self {
        if score < 31.0 {
            CoherenceLabel::Diverging
        } else if score < 61.0 {
            CoherenceLabel::Aligning
        } else if score < 86.0 {
            CoherenceLabel::Resonant
        } else {
            CoherenceLabel::Coherent
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CoherenceLabel::Diverging => "Diverging",
            CoherenceLabel::Aligning => "Aligning",
            CoherenceLabel::Resonant => "Resonant",
            CoherenceLabel::Coherent => "Coherent",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoherenceWeights {
    pub health_freshness: f64,
    pub health_alignment: f64,
    pub skill_trajectory: f64,
    pub cross_app: f64,
    pub consistency: f64,
}

impl CoherenceWeights {
    /// Cross-app data, when present, takes weight from the health terms.
    pub fn for_maze(has_maze: bool) -> Self {
        if has_maze {
            Self { health_freshness: 0.15, health_alignment: 0.20, skill_trajectory: 0.15, cross_app: 0.30, consistency: 0.20 }
        } else {
            Self { health_freshness: 0.20, health_alignment: 0.25, skill_trajectory: 0.20, cross_app: 0.15, consistency: 0.20 }
        }
    }
}

/// Each component on [0, 1] before weighting.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoherenceBreakdown {
    pub health_freshness: f64,
    pub health_alignment: f64,
    pub skill_trajectory: f64,
    pub cross_app: f64,
    pub consistency: f64,
    pub score: f64,
}

pub fn breakdown(fv: &FeatureVector) -> CoherenceBreakdown {
    let w = CoherenceWeights::for_maze(fv.has_maze_data());

    let health_freshness = fv.health_age_hours.map_or(0.0, |h| (-h.max(0.0) / 24.0).exp());
    let health_alignment = fv.hrv_performance_correlation.map_or(0.5, |r| (r + 1.0) / 2.0);
    let skill_trajectory = (fv.learning_curve_slope + 0.5).clamp(0.0, 1.0);

    let cross_app = match (&fv.maze_digital_signature, fv.has_maze_data()) {
        (Some(sig), true) if !sig.is_empty() => {
            let strength = sig.iter().map(|x| x.abs()).sum::<f64>() / sig.len() as f64;
            strength.min(1.0)
        }
        (_, true) => (fv.maze_flow_state.unwrap_or(0.5) + fv.maze_confidence.unwrap_or(0.5)) / 2.0,
        (_, false) => NO_MAZE_BASELINE / 100.0,
    };

    let consistency = (1.0 - fv.overcorrection_rate.unwrap_or(DEFAULT_OVERCORRECTION)).max(0.0);

    let raw = 100.0
        * (health_freshness * w.health_freshness
            + health_alignment * w.health_alignment
            + skill_trajectory * w.skill_trajectory
            + cross_app * w.cross_app
            + consistency * w.consistency);
    let score = if raw.is_finite() { raw.clamp(0.0, 100.0) } else { 0.0 };

    CoherenceBreakdown { health_freshness, health_alignment, skill_trajectory, cross_app, consistency, score }
}

/// Coherence in [0, 100]; non-finite inputs collapse to 0.
pub fn compute_coherence(fv: &FeatureVector) -> f64 {
    breakdown(fv).score
}
