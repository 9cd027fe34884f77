// src/golden/sdk.rs

//! # Golden Mode SDK
//!
//! Read-only collaborator interfaces the recommender pulls its features
//! from. Every source is optional: a missing provider, or a provider that
//! returns `None`, leaves the matching feature fields empty. Nothing here
//! errors.
//!
//! - [`HealthSource`]: latest health snapshot (heart rate, HRV, sleep, ...).
//! - [`MazeSource`]: cross-app performance snapshot and digital signature.
//! - [`ProfileSource`]: training goal and demographics.
//! - [`SessionHistory`]: play history, latest player metrics, and
//!   health/performance pairs for correlations.
//! - [`Clock`]: wall time, so tests can pin it.
//!
//! Closures implement the single-method traits, so a host can write
//! `Rc::new(|| Some(snapshot.clone()))` instead of a named type.

use std::cell::Cell;
use std::rc::Rc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::systems::solver::PlayerMetrics;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub date: DateTime<Utc>,
    pub steps: Option<u32>,
    pub resting_heart_rate: Option<f64>,
    /// SDNN, milliseconds.
    pub heart_rate_variability: Option<f64>,
    /// Seconds.
    pub sleep_duration: Option<f64>,
    pub active_calories: Option<f64>,
    pub mindful_minutes: u32,
}

impl HealthSnapshot {
    pub fn empty(date: DateTime<Utc>) -> Self {
        Self {
            date,
            steps: None,
            resting_heart_rate: None,
            heart_rate_variability: None,
            sleep_duration: None,
            active_calories: None,
            mindful_minutes: 0,
        }
    }
}

/// One cross-app session; scores are in [0, 1].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MazeSession {
    pub motor_score: f64,
    pub cognitive_score: f64,
    pub flow_state: f64,
    pub frustration: f64,
    pub confidence: f64,
    pub focus_level: f64,
    /// Seconds.
    pub decision_latency: f64,
    pub movement_efficiency: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MazeSnapshot {
    pub sessions: Vec<MazeSession>,
    pub digital_signature: Option<Vec<f64>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingGoal {
    Focus,
    Relaxation,
    Research,
    Curiosity,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub training_goal: TrainingGoal,
    pub age: Option<u32>,
    pub completed: bool,
}

/// A past session score paired with the health readings of that day.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CorrelationSample {
    pub heart_rate_variability: Option<f64>,
    /// Seconds.
    pub sleep_duration: Option<f64>,
    pub session_score: f64,
}

pub trait HealthSource {
    fn latest_snapshot(&self) -> Option<HealthSnapshot>;
    fn is_authorized(&self) -> bool {
        self.latest_snapshot().is_some()
    }
}

pub trait MazeSource {
    fn load(&self) -> Option<MazeSnapshot>;
}

pub trait ProfileSource {
    fn profile(&self) -> Option<UserProfile>;
}

impl<F: Fn() -> Option<HealthSnapshot>> HealthSource for F {
    fn latest_snapshot(&self) -> Option<HealthSnapshot> {
        self()
    }
}

impl<F: Fn() -> Option<MazeSnapshot>> MazeSource for F {
    fn load(&self) -> Option<MazeSnapshot> {
        self()
    }
}

impl<F: Fn() -> Option<UserProfile>> ProfileSource for F {
    fn profile(&self) -> Option<UserProfile> {
        self()
    }
}

pub trait SessionHistory {
    fn session_count(&self) -> usize;
    fn last_session_at(&self) -> Option<DateTime<Utc>>;
    fn latest_metrics(&self) -> Option<PlayerMetrics> {
        None
    }
    fn max_level(&self) -> u32 {
        1
    }
    /// Stability points gained per session, recent trend.
    fn learning_curve_slope(&self) -> f64 {
        0.0
    }
    /// Most recent `limit` samples, oldest first.
    fn correlation_samples(&self, _limit: usize) -> Vec<CorrelationSample> {
        Vec::new()
    }
}

/// Plain-data history for hosts that keep their own bookkeeping.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemoryHistory {
    pub session_count: usize,
    pub last_session_at: Option<DateTime<Utc>>,
    pub latest_metrics: Option<PlayerMetrics>,
    pub max_level: u32,
    pub learning_curve_slope: f64,
    pub correlation_samples: Vec<CorrelationSample>,
}

impl SessionHistory for MemoryHistory {
    fn session_count(&self) -> usize {
        self.session_count
    }

    fn last_session_at(&self) -> Option<DateTime<Utc>> {
        self.last_session_at
    }

    fn latest_metrics(&self) -> Option<PlayerMetrics> {
        self.latest_metrics
    }

    fn max_level(&self) -> u32 {
        self.max_level.max(1)
    }

    fn learning_curve_slope(&self) -> f64 {
        self.learning_curve_slope
    }

    fn correlation_samples(&self, limit: usize) -> Vec<CorrelationSample> {
        let skip = self.correlation_samples.len().saturating_sub(limit);
        self.correlation_samples[skip..].to_vec()
    }
}

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    now: Cell<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Cell::new(now) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        self.now.set(now);
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }
}

/// Everything the feature builder reads from.
#[derive(Clone)]
pub struct Providers {
    pub health: Option<Rc<dyn HealthSource>>,
    pub maze: Option<Rc<dyn MazeSource>>,
    pub profile: Option<Rc<dyn ProfileSource>>,
    pub history: Option<Rc<dyn SessionHistory>>,
    pub clock: Rc<dyn Clock>,
}

impl Default for Providers {
    fn default() -> Self {
        Self { health: None, maze: None, profile: None, history: None, clock: Rc::new(SystemClock) }
    }
}

impl Providers {
    pub fn with_clock(clock: Rc<dyn Clock>) -> Self {
        Self { clock, ..Self::default() }
    }
}
