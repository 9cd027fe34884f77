//! Tier 2: linear scorer over [`FeatureVector::model_input`].
//!
//! One weight row per focus area plus a bias. Confidence is the softmax
//! probability of the winning row. Every recorded outcome nudges the row of
//! the recommended focus area toward (or away from) the pre-session input,
//! proportional to the outcome reward.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PersistError;
use crate::mechanics::stats;

use super::features::FeatureVector;
use super::outcome::GoldenModeOutcome;
use super::recommendation::{FocusArea, Recommendation, Tier};

const DIM: usize = FeatureVector::MODEL_DIM;
const AREAS: usize = FocusArea::ALL.len();
const WEIGHTS_VERSION: u32 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorerParams {
    pub learning_rate: f64,
    /// Multiplies raw scores before the softmax.
    pub temperature: f64,
    /// Absolute bound on any weight.
    pub weight_limit: f64,
}

impl Default for ScorerParams {
    fn default() -> Self {
        Self { learning_rate: 0.05, temperature: 3.0, weight_limit: 5.0 }
    }
}

/// Serialized form used for local and remote persistence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScorerWeights {
    pub version: u32,
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
    pub updates: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WeightedScorer {
    params: ScorerParams,
    weights: [[f64; DIM]; AREAS],
    bias: [f64; AREAS],
    updates: u64,
}

impl Default for WeightedScorer {
    fn default() -> Self {
        Self::new(ScorerParams::default())
    }
}

impl WeightedScorer {
    /// Starts from hand-set priors so an untrained scorer already leans the
    /// same way the rule engine does.
    pub fn new(params: ScorerParams) -> Self {
        // inputs: sleep hrv rhr steps stab react eff overc level flow frust hour
        let weights = [
            [0.0, 0.0, 0.0, 0.0, -1.0, 0.0, -0.3, 0.2, -0.2, 0.0, 0.0, 0.0],
            [0.0, 0.0, 0.0, 0.2, 0.2, 1.2, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            [0.0, 0.0, 0.0, 0.0, 0.3, 0.0, -0.5, 1.2, 0.2, 0.0, 0.0, 0.0],
            [0.3, 0.2, 0.0, 0.0, 0.8, -0.3, 0.3, -0.3, 0.4, 0.2, 0.0, 0.0],
            [0.0, -0.8, 0.3, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, -0.2, 1.0, 0.3],
            [-1.2, -0.3, 0.5, -0.2, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.3, 0.0],
        ];
        Self { params, weights, bias: [0.0; AREAS], updates: 0 }
    }

    pub fn params(&self) -> &ScorerParams {
        &self.params
    }

    pub fn updates(&self) -> u64 {
        self.updates
    }

    pub fn scores(&self, fv: &FeatureVector) -> [f64; AREAS] {
        let x = fv.model_input();
        let mut out = self.bias;
        for (row, score) in self.weights.iter().zip(out.iter_mut()) {
            *score += row.iter().zip(x.iter()).map(|(w, xi)| w * xi).sum::<f64>();
        }
        out
    }

    /// Softmax over the scaled scores, indexed like [`FocusArea::ALL`].
    pub fn probabilities(&self, fv: &FeatureVector) -> Vec<f64> {
        let scaled: Vec<f64> = self.scores(fv).iter().map(|s| s * self.params.temperature).collect();
        stats::softmax(&scaled)
    }

    pub fn recommend(&self, fv: &FeatureVector, now: DateTime<Utc>) -> Recommendation {
        let probs = self.probabilities(fv);
        let (best, confidence) = probs
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |acc, (i, p)| if p > acc.1 { (i, p) } else { acc });
        let focus = FocusArea::from_index(best).unwrap_or(FocusArea::Stability);
        let rationale = format!("highest weighted score after {} updates", self.updates);
        Recommendation::new(focus, confidence, fv.current_max_level, Tier::WeightedScorer, rationale, now)
    }

    /// Online update from one outcome. Outcomes without a recommendation or
    /// that did not follow it carry no signal.
    pub fn update_from_outcome(&mut self, outcome: &GoldenModeOutcome) {
        let Some(focus) = outcome.focus_area() else { return };
        if !outcome.was_recommendation_followed {
            return;
        }
        let reward = outcome.reward();
        if reward == 0.0 {
            return;
        }
        let x = outcome.pre_session_features.model_input();
        let lr = self.params.learning_rate;
        let limit = self.params.weight_limit;
        let row = &mut self.weights[focus.index()];
        for (w, xi) in row.iter_mut().zip(x.iter()) {
            *w = (*w + lr * reward * xi).clamp(-limit, limit);
        }
        let b = &mut self.bias[focus.index()];
        *b = (*b + lr * reward).clamp(-limit, limit);
        self.updates += 1;
    }

    pub fn to_weights(&self) -> ScorerWeights {
        ScorerWeights {
            version: WEIGHTS_VERSION,
            weights: self.weights.iter().map(|r| r.to_vec()).collect(),
            bias: self.bias.to_vec(),
            updates: self.updates,
        }
    }

    pub fn export_weights(&self) -> Result<Vec<u8>, PersistError> {
        Ok(serde_json::to_vec(&self.to_weights())?)
    }

    pub fn from_weights(w: &ScorerWeights, params: ScorerParams) -> Result<Self, PersistError> {
        if w.weights.len() != AREAS || w.bias.len() != AREAS {
            return Err(PersistError::Corrupt(format!(
                "scorer weights have {} rows and {} biases, expected {AREAS}",
                w.weights.len(),
                w.bias.len()
            )));
        }
        let mut scorer = Self::new(params);
        for (dst, src) in scorer.weights.iter_mut().zip(&w.weights) {
            if src.len() != DIM {
                return Err(PersistError::Corrupt(format!("scorer row has {} inputs, expected {DIM}", src.len())));
            }
            dst.copy_from_slice(src);
        }
        scorer.bias.copy_from_slice(&w.bias);
        let all_finite = scorer.weights.iter().flatten().chain(scorer.bias.iter()).all(|v| v.is_finite());
        if !all_finite {
            return Err(PersistError::Corrupt("scorer weights contain non-finite values".into()));
        }
        scorer.updates = w.updates;
        Ok(scorer)
    }

    pub fn import_weights(bytes: &[u8], params: ScorerParams) -> Result<Self, PersistError> {
        let w: ScorerWeights = serde_json::from_slice(bytes)?;
        Self::from_weights(&w, params)
    }
}
