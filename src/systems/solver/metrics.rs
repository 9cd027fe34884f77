//! Rolling player metrics.
//!
//! A bounded ring of per-frame samples reduced about once a second into a
//! [`PlayerMetrics`] snapshot that the solver adapts to.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::mechanics::angle;

/// Pushes smaller than this are treated as "no push".
pub const PUSH_EPSILON: f64 = 0.01;

const DEFAULT_REACTION_TIME: f64 = 0.3;
const DEFAULT_EFFICIENCY: f64 = 0.5;
const DEFAULT_OVERCORRECTION: f64 = 0.3;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerMetrics {
    /// Percent of buffered samples inside the balance threshold, [0, 100].
    pub stability_score: f64,
    /// Mean seconds from instability onset to the next push.
    pub average_reaction_time: f64,
    /// Fraction of pushes opposing the deviation, [0, 1].
    pub force_efficiency: f64,
    /// Fraction of pushes followed by an overshoot, [0, 1].
    pub overcorrection_rate: f64,
    pub session_duration: f64,
    pub level: u32,
}

impl Default for PlayerMetrics {
    fn default() -> Self {
        Self {
            stability_score: 0.0,
            average_reaction_time: DEFAULT_REACTION_TIME,
            force_efficiency: DEFAULT_EFFICIENCY,
            overcorrection_rate: DEFAULT_OVERCORRECTION,
            session_duration: 0.0,
            level: 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MetricSample {
    pub theta: f64,
    pub theta_dot: f64,
    pub player_force: f64,
    pub time: f64,
}

#[derive(Clone, Debug)]
pub struct MetricsBuffer {
    samples: VecDeque<MetricSample>,
    capacity: usize,
}

impl MetricsBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { samples: VecDeque::with_capacity(capacity), capacity }
    }

    /// Append, evicting the oldest sample when full.
    pub fn push(&mut self, sample: MetricSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Reduce the buffer; `None` when empty.
    pub fn reduce(&self, threshold: f64, session_duration: f64, level: u32) -> Option<PlayerMetrics> {
        if self.samples.is_empty() {
            return None;
        }
        let n = self.samples.len() as f64;

        let balanced = self
            .samples
            .iter()
            .filter(|s| angle::within(s.theta, threshold))
            .count() as f64;

        let mut reactions = Vec::new();
        let mut onset: Option<f64> = None;
        let mut pushes = 0usize;
        let mut effective = 0usize;
        for s in &self.samples {
            let dev = angle::deviation(s.theta);
            if dev.abs() > threshold && onset.is_none() {
                onset = Some(s.time);
            }
            if s.player_force.abs() > PUSH_EPSILON {
                pushes += 1;
                if dev * s.player_force < 0.0 {
                    effective += 1;
                }
                if let Some(start) = onset.take() {
                    reactions.push(s.time - start);
                }
            }
        }

        let overcorrections = self
            .samples
            .iter()
            .zip(self.samples.iter().skip(1))
            .filter(|(prev, curr)| {
                if prev.player_force.abs() <= PUSH_EPSILON {
                    return false;
                }
                let a = angle::deviation(prev.theta);
                let b = angle::deviation(curr.theta);
                a * b < 0.0 && b.abs() > threshold * 0.5
            })
            .count();

        let (efficiency, overcorrection) = if pushes > 0 {
            (
                effective as f64 / pushes as f64,
                (overcorrections as f64 / pushes as f64).min(1.0),
            )
        } else {
            (DEFAULT_EFFICIENCY, DEFAULT_OVERCORRECTION)
        };

        Some(PlayerMetrics {
            stability_score: balanced / n * 100.0,
            average_reaction_time: if reactions.is_empty() {
                DEFAULT_REACTION_TIME
            } else {
                reactions.iter().sum::<f64>() / reactions.len() as f64
            },
            force_efficiency: efficiency,
            overcorrection_rate: overcorrection,
            session_duration,
            level,
        })
    }
}
