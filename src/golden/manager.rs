use std::collections::VecDeque;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::PersistError;
use crate::store::{KeyValueStore, Uploader, get_json, keys, set_json, user_path};
use crate::systems::sdk::{AdaptationDelta, SessionAdapter};

use super::classifier::{CentroidClassifier, ClassifierParams, OutcomeClassifier};
use super::coherence::{self, CoherenceLabel};
use super::features::FeatureVector;
use super::outcome::{GoldenModeOutcome, ModelState, SessionResult, TrainingEntry, enjoyment_proxy};
use super::recommendation::{
    CLASSIFIER_MIN_CONFIDENCE, Recommendation, Tier, scorer_blend, select_tier,
};
use super::rules::{RuleEngine, RuleParams};
use super::scorer::{ScorerParams, WeightedScorer};
use super::sdk::Providers;

pub const GOLDEN_MODE_NAMESPACE: &str = "golden_mode";
const MODEL_STATE_FILE: &str = "model_state.json";
const SCORER_WEIGHTS_FILE: &str = "scorer_weights.json";
const MODEL_STATE_VERSION: u32 = 1;

fn finite_or_zero(x: f64) -> f64 {
    if x.is_finite() { x } else { 0.0 }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoldenConfig {
    /// Seconds of session time between adaptation checks.
    pub adaptation_interval: f64,
    /// Stability trend (points) beyond which damping is nudged.
    pub stability_trend_band: f64,
    pub damping_step: f64,
    pub perturbation_step: f64,
    pub threshold_step: f64,
    /// Outcomes kept in memory.
    pub max_outcomes: usize,
    /// Outcomes written to the local store.
    pub local_outcomes: usize,
    pub default_target_minutes: f64,
    /// Stability assumed before any metrics exist, percent.
    pub baseline_stability: f64,
    /// Reaction time assumed before any metrics exist, seconds.
    pub baseline_reaction_time: f64,
    pub scorer: ScorerParams,
    pub classifier: ClassifierParams,
}

impl Default for GoldenConfig {
    fn default() -> Self {
        Self {
            adaptation_interval: 30.0,
            stability_trend_band: 10.0,
            damping_step: 0.03,
            perturbation_step: 0.05,
            threshold_step: 0.015,
            max_outcomes: 200,
            local_outcomes: 50,
            default_target_minutes: 10.0,
            baseline_stability: 50.0,
            baseline_reaction_time: 0.3,
            scorer: ScorerParams::default(),
            classifier: ClassifierParams::default(),
        }
    }
}

/// Which data sources are connected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DataReadiness {
    pub health_connected: bool,
    pub profile_complete: bool,
    pub has_play_history: bool,
    pub maze_connected: bool,
    pub session_count: usize,
}

impl DataReadiness {
    /// Play history is the only hard requirement.
    pub fn is_ready(&self) -> bool {
        self.has_play_history
    }

    pub fn connected_source_count(&self) -> usize {
        [self.health_connected, self.profile_complete, self.has_play_history, self.maze_connected]
            .iter()
            .filter(|c| **c)
            .count()
    }
}

/// Tiered recommender, coherence tracker, and mid-session adapter.
///
/// Single writer of the scorer weights, classifier samples and outcome
/// history. Constructed once by the host and handed to the session loop as
/// its [`SessionAdapter`].
pub struct GoldenModeManager<C: OutcomeClassifier = CentroidClassifier> {
    cfg: GoldenConfig,
    providers: Providers,
    rules: RuleEngine,
    scorer: WeightedScorer,
    classifier: C,
    store: Option<Rc<dyn KeyValueStore>>,
    uploader: Option<Uploader>,

    current_recommendation: Option<Recommendation>,
    current_tier: Tier,
    coherence_score: f64,
    coherence_label: Option<CoherenceLabel>,

    active: bool,
    pre_session_features: Option<FeatureVector>,
    pre_session_stability: f64,
    pre_session_reaction_time: f64,
    session_started_at: Option<DateTime<Utc>>,
    adaptation_count: u32,
    last_adaptation_time: f64,

    outcomes: VecDeque<GoldenModeOutcome>,
}

impl GoldenModeManager<CentroidClassifier> {
    pub fn new(cfg: GoldenConfig, providers: Providers) -> Self {
        let classifier = CentroidClassifier::new(cfg.classifier);
        Self::with_classifier(cfg, providers, classifier)
    }

    /// Run the external training step on the built-in classifier and
    /// persist the result.
    pub fn train_classifier(&mut self) -> Option<TrainingEntry> {
        let entry = self.classifier.train(self.providers.clock.now())?;
        info!(samples = entry.samples, accuracy = entry.accuracy, "classifier trained");
        self.save_local_state();
        Some(entry)
    }
}

impl<C: OutcomeClassifier> GoldenModeManager<C> {
    pub fn with_classifier(cfg: GoldenConfig, providers: Providers, classifier: C) -> Self {
        Self {
            rules: RuleEngine::new(RuleParams::default()),
            scorer: WeightedScorer::new(cfg.scorer),
            classifier,
            store: None,
            uploader: None,
            current_recommendation: None,
            current_tier: Tier::RuleEngine,
            coherence_score: 0.0,
            coherence_label: None,
            active: false,
            pre_session_features: None,
            pre_session_stability: cfg.baseline_stability,
            pre_session_reaction_time: cfg.baseline_reaction_time,
            session_started_at: None,
            adaptation_count: 0,
            last_adaptation_time: 0.0,
            outcomes: VecDeque::new(),
            cfg,
            providers,
        }
    }

    /// Attach the local store and load whatever state it holds. Unreadable
    /// entries are logged and skipped.
    pub fn with_store(mut self, store: Rc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self.load_local_state();
        self
    }

    pub fn set_uploader(&mut self, uploader: Option<Uploader>) {
        self.uploader = uploader;
    }

    pub fn config(&self) -> &GoldenConfig {
        &self.cfg
    }

    pub fn providers(&self) -> &Providers {
        &self.providers
    }

    pub fn set_providers(&mut self, providers: Providers) {
        self.providers = providers;
    }

    pub fn scorer(&self) -> &WeightedScorer {
        &self.scorer
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    pub fn classifier_mut(&mut self) -> &mut C {
        &mut self.classifier
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn current_recommendation(&self) -> Option<&Recommendation> {
        self.current_recommendation.as_ref()
    }

    /// Tier gate used for the latest recommendation.
    pub fn current_tier(&self) -> Tier {
        self.current_tier
    }

    pub fn coherence_score(&self) -> f64 {
        self.coherence_score
    }

    /// `None` until a coherence score has been computed.
    pub fn coherence_label(&self) -> Option<CoherenceLabel> {
        self.coherence_label
    }

    pub fn adaptation_count(&self) -> u32 {
        self.adaptation_count
    }

    pub fn session_started_at(&self) -> Option<DateTime<Utc>> {
        self.session_started_at
    }

    pub fn outcome_count(&self) -> usize {
        self.outcomes.len()
    }

    /// Up to the 50 newest outcomes, newest first.
    pub fn recent_outcomes(&self) -> Vec<&GoldenModeOutcome> {
        self.outcomes.iter().rev().take(self.cfg.local_outcomes).collect()
    }

    pub fn build_features(&self) -> FeatureVector {
        FeatureVector::build(&self.providers)
    }

    /// One recommendation from exactly one tier.
    pub fn generate_recommendation(&mut self) -> Recommendation {
        let fv = self.build_features();
        let now = self.providers.clock.now();
        let tier = select_tier(fv.session_count, self.classifier.is_model_available());
        self.current_tier = tier;

        let rec = match tier {
            Tier::RuleEngine => self.rules.recommend(&fv, now),
            Tier::WeightedScorer => {
                if scorer_blend(fv.session_count) > 0.5 {
                    self.scorer.recommend(&fv, now)
                } else {
                    self.rules.recommend(&fv, now)
                }
            }
            Tier::Classifier => match self.classifier.recommend(&fv, now) {
                Some(rec) if rec.confidence_score >= CLASSIFIER_MIN_CONFIDENCE => rec,
                Some(rec) => {
                    debug!(confidence = rec.confidence_score, "classifier not confident, using scorer");
                    self.scorer.recommend(&fv, now)
                }
                None => self.scorer.recommend(&fv, now),
            },
        };
        debug!(
            tier = tier.label(),
            source = rec.tier.label(),
            focus = ?rec.focus_area,
            confidence = rec.confidence_score,
            sessions = fv.session_count,
            "recommendation generated"
        );

        self.pre_session_features = Some(fv);
        self.current_recommendation = Some(rec.clone());
        rec
    }

    /// Coherence over a fresh feature vector.
    pub fn compute_coherence(&mut self) -> f64 {
        let fv = self.build_features();
        self.update_coherence(&fv)
    }

    /// Coherence over `fv`; also refreshes the stored score and label.
    pub fn update_coherence(&mut self, fv: &FeatureVector) -> f64 {
        let score = coherence::compute_coherence(fv);
        self.coherence_score = score;
        self.coherence_label = Some(CoherenceLabel::for_score(score));
        score
    }

    /// Begin a Golden Mode session. Pass the recommendation the player
    /// accepted, or `None` to keep the latest generated one.
    pub fn on_session_start(&mut self, recommendation: Option<Recommendation>) {
        if let Some(rec) = recommendation {
            self.current_recommendation = Some(rec);
        }
        self.active = true;
        self.session_started_at = Some(self.providers.clock.now());
        self.adaptation_count = 0;
        self.last_adaptation_time = 0.0;

        let fv = self.build_features();
        self.pre_session_stability = fv.stability_score.unwrap_or(self.cfg.baseline_stability);
        self.pre_session_reaction_time = fv.average_reaction_time.unwrap_or(self.cfg.baseline_reaction_time);
        self.update_coherence(&fv);
        info!(
            stability = self.pre_session_stability,
            coherence = self.coherence_score,
            "golden session started"
        );
        self.pre_session_features = Some(fv);
    }

    /// Close the session and record its outcome. `None` when no session
    /// was active.
    pub fn on_session_end(&mut self, result: SessionResult) -> Option<GoldenModeOutcome> {
        if !self.active {
            return None;
        }
        self.active = false;

        let coherence_end = self.compute_coherence();
        let rec = self.current_recommendation.clone();
        let target = rec.as_ref().map_or(self.cfg.default_target_minutes, |r| r.config.target_duration_minutes);

        let outcome = GoldenModeOutcome {
            id: uuid::Uuid::new_v4(),
            recorded_at: self.providers.clock.now(),
            actual_game_mode: rec.as_ref().map(|r| r.config.game_mode).unwrap_or_default(),
            actual_ai_mode: rec.as_ref().map(|r| r.config.ai_mode).unwrap_or_default(),
            was_recommendation_followed: rec.is_some(),
            recommendation: rec,
            pre_session_features: self.pre_session_features.clone().unwrap_or_default(),
            session_duration: finite_or_zero(result.duration),
            session_completed: result.completed,
            stability_improvement: finite_or_zero(result.final_stability - self.pre_session_stability),
            reaction_time_improvement: finite_or_zero(self.pre_session_reaction_time - result.final_reaction_time),
            levels_completed: result.levels_completed,
            enjoyment_proxy: enjoyment_proxy(result.duration, target, result.completed),
            coherence_score_end: coherence_end,
        };
        self.record_outcome(outcome.clone());
        Some(outcome)
    }

    /// Append an outcome: update the scorer, feed the classifier, check
    /// retraining, persist locally, and queue the remote copy.
    pub fn record_outcome(&mut self, outcome: GoldenModeOutcome) {
        self.scorer.update_from_outcome(&outcome);
        self.classifier.add_sample(&outcome);
        if self.classifier.should_retrain() {
            info!(samples = self.classifier.sample_count(), "classifier retrain due");
        }

        if let Some(up) = self.uploader.as_ref() {
            let rest = format!("outcomes/{}.json", outcome.id);
            match up.upload_json(GOLDEN_MODE_NAMESPACE, &rest, &outcome) {
                Ok(path) => debug!(%path, "outcome queued"),
                Err(e) => warn!(error = %e, id = %outcome.id, "could not queue outcome upload"),
            }
        }

        self.outcomes.push_back(outcome);
        while self.outcomes.len() > self.cfg.max_outcomes {
            self.outcomes.pop_front();
        }
        self.save_local_state();
    }

    pub fn data_readiness(&self) -> DataReadiness {
        let p = &self.providers;
        let session_count = p.history.as_ref().map_or(0, |h| h.session_count());
        DataReadiness {
            health_connected: p.health.as_ref().is_some_and(|h| h.is_authorized()),
            profile_complete: p.profile.as_ref().and_then(|s| s.profile()).is_some_and(|u| u.completed),
            has_play_history: session_count > 0,
            maze_connected: p.maze.as_ref().and_then(|m| m.load()).is_some(),
            session_count,
        }
    }

    pub fn model_state(&self) -> ModelState {
        let history = self.classifier.training_history();
        ModelState {
            version: MODEL_STATE_VERSION,
            last_trained_date: history.last().map_or_else(|| self.providers.clock.now(), |e| e.date),
            session_count: self.providers.history.as_ref().map_or(0, |h| h.session_count()),
            outcome_count: self.outcomes.len(),
            classifier_available: self.classifier.is_model_available(),
            training_history: history.to_vec(),
        }
    }

    /// Queue `model_state.json` and `scorer_weights.json`.
    pub fn upload_model_state(&self) -> Result<(), PersistError> {
        let up = self.uploader.as_ref().ok_or(PersistError::NotSignedIn)?;
        up.upload_json(GOLDEN_MODE_NAMESPACE, MODEL_STATE_FILE, &self.model_state())?;
        up.upload_json(GOLDEN_MODE_NAMESPACE, SCORER_WEIGHTS_FILE, &self.scorer.to_weights())?;
        Ok(())
    }

    /// Best-effort pull of remote scorer weights, then push of the current
    /// model state. Every failure is logged; nothing here is fatal.
    pub fn sync_from_remote(&mut self) {
        let Some(up) = self.uploader.clone() else {
            debug!("no uploader configured, skipping golden mode sync");
            return;
        };
        let Some(uid) = up.uid() else {
            debug!("not signed in, skipping golden mode sync");
            return;
        };
        let remote = up.queue().remote();

        let weights_path = user_path(uid, GOLDEN_MODE_NAMESPACE, SCORER_WEIGHTS_FILE);
        match remote.get(&weights_path) {
            Ok(Some(bytes)) => match WeightedScorer::import_weights(&bytes, self.cfg.scorer) {
                Ok(scorer) => {
                    info!(updates = scorer.updates(), "synced scorer weights");
                    self.scorer = scorer;
                }
                Err(e) => warn!(error = %e, "remote scorer weights unreadable"),
            },
            Ok(None) => debug!("no remote scorer weights yet"),
            Err(e) => warn!(error = %e, "could not fetch scorer weights"),
        }

        let state_path = user_path(uid, GOLDEN_MODE_NAMESPACE, MODEL_STATE_FILE);
        match remote.get(&state_path) {
            Ok(Some(bytes)) => match serde_json::from_slice::<ModelState>(&bytes) {
                Ok(state) if state.outcome_count > self.outcomes.len() => info!(
                    remote = state.outcome_count,
                    local = self.outcomes.len(),
                    "remote holds more outcomes than local"
                ),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "remote model state unreadable"),
            },
            Ok(None) => debug!("no remote model state yet"),
            Err(e) => warn!(error = %e, "could not fetch model state"),
        }

        if let Err(e) = self.upload_model_state() {
            warn!(error = %e, "could not queue model state upload");
        }
    }

    fn save_local_state(&self) {
        let Some(store) = self.store.as_deref() else { return };

        let weights = self.scorer.export_weights().and_then(|b| store.set(keys::SCORER_WEIGHTS, &b));
        if let Err(e) = weights {
            warn!(error = %e, "could not save scorer weights");
        }

        let skip = self.outcomes.len().saturating_sub(self.cfg.local_outcomes);
        let recent: Vec<&GoldenModeOutcome> = self.outcomes.iter().skip(skip).collect();
        if let Err(e) = set_json(store, keys::OUTCOMES, &recent) {
            warn!(error = %e, "could not save outcomes");
        }

        match self.classifier.export_data() {
            Ok(Some(bytes)) => {
                if let Err(e) = store.set(keys::CLASSIFIER_SAMPLES, &bytes) {
                    warn!(error = %e, "could not save classifier samples");
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "could not encode classifier samples"),
        }
    }

    fn load_local_state(&mut self) {
        let Some(store) = self.store.clone() else { return };
        let store: &dyn KeyValueStore = &*store;

        match store.get(keys::SCORER_WEIGHTS) {
            Ok(Some(bytes)) => match WeightedScorer::import_weights(&bytes, self.cfg.scorer) {
                Ok(scorer) => self.scorer = scorer,
                Err(e) => warn!(error = %e, "stored scorer weights unreadable"),
            },
            Ok(None) => {}
            Err(e) => warn!(error = %e, "could not read scorer weights"),
        }

        // entries decode one by one so a single bad record cannot cost the rest
        match get_json::<Vec<serde_json::Value>>(store, keys::OUTCOMES) {
            Ok(Some(raw)) => {
                let total = raw.len();
                self.outcomes = raw.into_iter().filter_map(|v| serde_json::from_value(v).ok()).collect();
                if self.outcomes.len() < total {
                    warn!(dropped = total - self.outcomes.len(), "skipped unreadable stored outcomes");
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "stored outcomes unreadable"),
        }

        match store.get(keys::CLASSIFIER_SAMPLES) {
            Ok(Some(bytes)) => {
                if let Err(e) = self.classifier.import_data(&bytes) {
                    warn!(error = %e, "stored classifier samples unreadable");
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "could not read classifier samples"),
        }
        debug!(outcomes = self.outcomes.len(), "golden mode state loaded");
    }
}

impl<C: OutcomeClassifier> SessionAdapter for GoldenModeManager<C> {
    fn on_frame_update(
        &mut self,
        _theta: f64,
        _theta_dot: f64,
        elapsed: f64,
        recent_stability: f64,
    ) -> Option<AdaptationDelta> {
        if !self.active || elapsed - self.last_adaptation_time < self.cfg.adaptation_interval {
            return None;
        }
        self.last_adaptation_time = elapsed;
        self.adaptation_count += 1;

        let cfg = &self.cfg;
        let trend = recent_stability - self.pre_session_stability;
        let damping_delta = if trend < -cfg.stability_trend_band {
            cfg.damping_step
        } else if trend > cfg.stability_trend_band {
            -cfg.damping_step
        } else {
            0.0
        };
        let perturbation_scale = if recent_stability > 70.0 {
            1.0 + cfg.perturbation_step
        } else if recent_stability < 30.0 {
            1.0 - cfg.perturbation_step
        } else {
            1.0
        };
        let threshold_delta = if recent_stability < 25.0 {
            cfg.threshold_step
        } else if recent_stability > 80.0 {
            -cfg.threshold_step
        } else {
            0.0
        };

        let delta = AdaptationDelta::new(damping_delta, perturbation_scale, threshold_delta);
        if let Some(d) = delta.as_ref() {
            info!(
                elapsed,
                recent_stability,
                damping = d.damping_delta,
                perturbation = d.perturbation_scale,
                threshold = d.threshold_delta,
                "golden mode adaptation"
            );
        }
        delta
    }
}
