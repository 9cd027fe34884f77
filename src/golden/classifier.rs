//! Tier 3: outcome classifier.
//!
//! [`OutcomeClassifier`] is the seam; [`CentroidClassifier`] is the built-in
//! nearest-centroid model. Samples accumulate on every outcome, but training
//! runs only when a caller invokes [`CentroidClassifier::train`] (an offline
//! or background job); the manager merely logs when a retrain is due.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PersistError;
use crate::mechanics::stats;

use super::features::FeatureVector;
use super::outcome::{GoldenModeOutcome, TrainingEntry};
use super::recommendation::{FocusArea, Recommendation, Tier};

pub trait OutcomeClassifier {
    fn is_model_available(&self) -> bool;

    /// `None` when no model is trained.
    fn recommend(&self, fv: &FeatureVector, now: DateTime<Utc>) -> Option<Recommendation>;

    fn add_sample(&mut self, _outcome: &GoldenModeOutcome) {}

    fn sample_count(&self) -> usize {
        0
    }

    fn should_retrain(&self) -> bool {
        false
    }

    fn training_history(&self) -> &[TrainingEntry] {
        &[]
    }

    /// Bytes to persist locally, `None` when there is nothing to keep.
    fn export_data(&self) -> Result<Option<Vec<u8>>, PersistError> {
        Ok(None)
    }

    fn import_data(&mut self, _bytes: &[u8]) -> Result<(), PersistError> {
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierParams {
    /// Samples needed before the first training.
    pub min_samples: usize,
    /// New samples since the last training that make a retrain due.
    pub retrain_every: usize,
    pub max_samples: usize,
    /// Distance sharpness for the confidence softmax.
    pub sharpness: f64,
}

impl Default for ClassifierParams {
    fn default() -> Self {
        Self { min_samples: 20, retrain_every: 10, max_samples: 1000, sharpness: 8.0 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassifierSample {
    pub input: Vec<f64>,
    pub focus_area: FocusArea,
    pub reward: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Centroid {
    pub focus_area: FocusArea,
    pub center: Vec<f64>,
    pub support: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct ClassifierData {
    samples: Vec<ClassifierSample>,
    centroids: Vec<Centroid>,
    training_history: Vec<TrainingEntry>,
    samples_at_last_train: usize,
}

#[derive(Clone, Debug, Default)]
pub struct CentroidClassifier {
    params: ClassifierParams,
    data: ClassifierData,
}

impl CentroidClassifier {
    pub fn new(params: ClassifierParams) -> Self {
        Self { params, data: ClassifierData::default() }
    }

    pub fn params(&self) -> &ClassifierParams {
        &self.params
    }

    pub fn samples(&self) -> &[ClassifierSample] {
        &self.data.samples
    }

    pub fn centroids(&self) -> &[Centroid] {
        &self.data.centroids
    }

    /// Rebuild centroids from positively rewarded samples.
    ///
    /// Returns `None` (and leaves the model untouched) when fewer than
    /// `min_samples` samples exist or fewer than two focus areas have
    /// positive support.
    pub fn train(&mut self, now: DateTime<Utc>) -> Option<TrainingEntry> {
        if self.data.samples.len() < self.params.min_samples {
            return None;
        }
        let mut centroids = Vec::new();
        for focus in FocusArea::ALL {
            let members: Vec<&ClassifierSample> =
                self.data.samples.iter().filter(|s| s.focus_area == focus && s.reward > 0.0).collect();
            if members.is_empty() {
                continue;
            }
            let mut center = vec![0.0; FeatureVector::MODEL_DIM];
            for m in &members {
                for (c, x) in center.iter_mut().zip(&m.input) {
                    *c += x;
                }
            }
            center.iter_mut().for_each(|c| *c /= members.len() as f64);
            centroids.push(Centroid { focus_area: focus, center, support: members.len() });
        }
        if centroids.len() < 2 {
            debug!(areas = centroids.len(), "not enough positive focus areas to train");
            return None;
        }

        let positives: Vec<&ClassifierSample> = self.data.samples.iter().filter(|s| s.reward > 0.0).collect();
        let hits = positives
            .iter()
            .filter(|s| nearest(&centroids, &s.input).map(|(i, _)| centroids[i].focus_area) == Some(s.focus_area))
            .count();
        let accuracy = hits as f64 / positives.len().max(1) as f64;

        self.data.centroids = centroids;
        self.data.samples_at_last_train = self.data.samples.len();
        let entry = TrainingEntry { date: now, samples: self.data.samples.len(), accuracy };
        self.data.training_history.push(entry.clone());
        Some(entry)
    }
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f64>().sqrt()
}

fn nearest(centroids: &[Centroid], x: &[f64]) -> Option<(usize, f64)> {
    centroids
        .iter()
        .enumerate()
        .map(|(i, c)| (i, distance(&c.center, x)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

impl OutcomeClassifier for CentroidClassifier {
    fn is_model_available(&self) -> bool {
        self.data.centroids.len() >= 2
    }

    fn recommend(&self, fv: &FeatureVector, now: DateTime<Utc>) -> Option<Recommendation> {
        if !self.is_model_available() {
            return None;
        }
        let x = fv.model_input();
        let logits: Vec<f64> =
            self.data.centroids.iter().map(|c| -self.params.sharpness * distance(&c.center, &x)).collect();
        let probs = stats::softmax(&logits);
        let (best, _) = nearest(&self.data.centroids, &x)?;
        let centroid = &self.data.centroids[best];
        let rationale = format!("closest to {} successful sessions", centroid.support);
        Some(Recommendation::new(centroid.focus_area, probs[best], fv.current_max_level, Tier::Classifier, rationale, now))
    }

    fn add_sample(&mut self, outcome: &GoldenModeOutcome) {
        let Some(focus_area) = outcome.focus_area() else { return };
        self.data.samples.push(ClassifierSample {
            input: outcome.pre_session_features.model_input().to_vec(),
            focus_area,
            reward: outcome.reward(),
        });
        let excess = self.data.samples.len().saturating_sub(self.params.max_samples);
        if excess > 0 {
            self.data.samples.drain(..excess);
            self.data.samples_at_last_train = self.data.samples_at_last_train.saturating_sub(excess);
        }
    }

    fn sample_count(&self) -> usize {
        self.data.samples.len()
    }

    fn should_retrain(&self) -> bool {
        let n = self.data.samples.len();
        n >= self.params.min_samples && n - self.data.samples_at_last_train.min(n) >= self.params.retrain_every
    }

    fn training_history(&self) -> &[TrainingEntry] {
        &self.data.training_history
    }

    fn export_data(&self) -> Result<Option<Vec<u8>>, PersistError> {
        Ok(Some(serde_json::to_vec(&self.data)?))
    }

    fn import_data(&mut self, bytes: &[u8]) -> Result<(), PersistError> {
        let data: ClassifierData = serde_json::from_slice(bytes)?;
        let dim = FeatureVector::MODEL_DIM;
        let bad_sample = data.samples.iter().any(|s| s.input.len() != dim);
        let bad_centroid = data.centroids.iter().any(|c| c.center.len() != dim);
        if bad_sample || bad_centroid {
            return Err(PersistError::Corrupt(format!("classifier data is not {dim}-dimensional")));
        }
        self.data = data;
        Ok(())
    }
}
