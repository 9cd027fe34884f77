//! Tutorial lesson state machine: `lesson → phase → hint`, ending in
//! [`TutorialStatus::Finished`].
//!
//! Lesson completion schedules an advance after a fixed display delay. The
//! deadline lives in session time and is dropped by [`Tutorial::cancel_pending`]
//! (mode change, session end) so nothing stale fires after a reset.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::mechanics::angle;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LessonPhase {
    Observation,
    GuidedPractice,
    AssistedPractice,
    FreePractice,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Lesson {
    pub title: &'static str,
    pub phase: LessonPhase,
    /// Seconds of accumulated balance needed (0 = not a criterion).
    pub balance_goal: f64,
    /// Credited hint follows needed (0 = not a criterion).
    pub follow_goal: u32,
    pub explanation: &'static str,
}

pub const LESSONS: [Lesson; 4] = [
    Lesson {
        title: "Watch",
        phase: LessonPhase::Observation,
        balance_goal: 5.0,
        follow_goal: 0,
        explanation: "Watch how small, early pushes keep the pendulum upright.",
    },
    Lesson {
        title: "Follow",
        phase: LessonPhase::GuidedPractice,
        balance_goal: 0.0,
        follow_goal: 3,
        explanation: "Push in the direction of the arrow when it appears.",
    },
    Lesson {
        title: "Assisted",
        phase: LessonPhase::AssistedPractice,
        balance_goal: 8.0,
        follow_goal: 0,
        explanation: "Balance on your own; the guide still helps when you drift.",
    },
    Lesson {
        title: "Solo",
        phase: LessonPhase::FreePractice,
        balance_goal: 5.0,
        follow_goal: 0,
        explanation: "No help now. Keep it inside the green zone.",
    },
];

/// A per-frame suggestion for the player.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hint {
    /// -1.0, 0.0 or +1.0.
    pub direction: f64,
    /// [0, 1].
    pub urgency: f64,
    pub explanation: String,
    pub phase: LessonPhase,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TutorialStatus {
    Lesson { index: usize, phase: LessonPhase },
    Finished,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TutorialConfig {
    /// Minimum seconds between two credited hint follows.
    pub follow_cooldown: f64,
    /// Delay between completing a lesson and starting the next.
    pub advance_delay: f64,
    /// Look-ahead (s) used to predict where the pendulum is heading.
    pub lookahead: f64,
}

impl Default for TutorialConfig {
    fn default() -> Self {
        Self { follow_cooldown: 1.5, advance_delay: 2.0, lookahead: 0.3 }
    }
}

#[derive(Clone, Debug)]
pub struct Tutorial {
    cfg: TutorialConfig,
    index: usize,
    balanced_time: f64,
    follows: u32,
    last_follow: Option<f64>,
    last_time: Option<f64>,
    pending_advance: Option<f64>,
}

impl Tutorial {
    pub fn new(cfg: TutorialConfig) -> Self {
        Self {
            cfg,
            index: 0,
            balanced_time: 0.0,
            follows: 0,
            last_follow: None,
            last_time: None,
            pending_advance: None,
        }
    }

    pub fn status(&self) -> TutorialStatus {
        match LESSONS.get(self.index) {
            Some(l) => TutorialStatus::Lesson { index: self.index, phase: l.phase },
            None => TutorialStatus::Finished,
        }
    }

    pub fn lesson(&self) -> Option<&'static Lesson> {
        LESSONS.get(self.index)
    }

    pub fn is_finished(&self) -> bool {
        self.index >= LESSONS.len()
    }

    pub fn follows(&self) -> u32 {
        self.follows
    }

    pub fn pending_advance(&self) -> Option<f64> {
        self.pending_advance
    }

    /// Overall progress across every lesson, [0, 1].
    pub fn progress(&self) -> f64 {
        let Some(lesson) = self.lesson() else {
            return 1.0;
        };
        let mut parts = Vec::with_capacity(2);
        if lesson.balance_goal > 0.0 {
            parts.push((self.balanced_time / lesson.balance_goal).min(1.0));
        }
        if lesson.follow_goal > 0 {
            parts.push((self.follows as f64 / lesson.follow_goal as f64).min(1.0));
        }
        let within = if parts.is_empty() { 0.0 } else { parts.iter().sum::<f64>() / parts.len() as f64 };
        ((self.index as f64 + within) / LESSONS.len() as f64).clamp(0.0, 1.0)
    }

    pub fn restart(&mut self) {
        *self = Self::new(self.cfg);
        info!("tutorial restarted");
    }

    /// Drop a scheduled advance and the time base.
    pub fn cancel_pending(&mut self) {
        if self.pending_advance.take().is_some() {
            debug!(lesson = self.index, "tutorial advance cancelled");
        }
        self.last_time = None;
    }

    /// AI output multiplier for the current lesson; the solo lesson gets none.
    pub fn ai_scale(&self) -> f64 {
        match self.lesson().map(|l| l.phase) {
            Some(LessonPhase::FreePractice) | None => 0.0,
            Some(_) => 1.0,
        }
    }

    /// Advance one frame and return the hint to show, if any.
    pub fn update(&mut self, theta: f64, theta_dot: f64, time: f64, player_force: f64, threshold: f64) -> Option<Hint> {
        if let Some(deadline) = self.pending_advance {
            if time >= deadline {
                self.advance();
            }
        }
        let lesson = *self.lesson()?;

        let dt = self.last_time.map_or(0.0, |t| (time - t).clamp(0.0, 1.0));
        self.last_time = Some(time);

        let dev = angle::deviation(theta);
        let predicted = dev + theta_dot * self.cfg.lookahead;
        let direction = if predicted.abs() > threshold * 0.25 { -predicted.signum() } else { 0.0 };
        let urgency = (predicted.abs() / (2.0 * threshold.max(1e-6))).clamp(0.0, 1.0);

        if direction != 0.0 && player_force.abs() > super::metrics::PUSH_EPSILON && player_force.signum() == direction {
            let cooled = self.last_follow.is_none_or(|t| time - t >= self.cfg.follow_cooldown);
            if cooled {
                self.follows += 1;
                self.last_follow = Some(time);
                debug!(follows = self.follows, "hint followed");
            }
        }

        if dev.abs() < threshold {
            self.balanced_time += dt;
        }

        if self.pending_advance.is_none() && self.lesson_complete(&lesson) {
            self.pending_advance = Some(time + self.cfg.advance_delay);
            info!(lesson = lesson.title, "lesson complete");
        }

        let explanation = if direction == 0.0 {
            lesson.explanation.to_string()
        } else if direction > 0.0 {
            format!("{} Push right.", lesson.explanation)
        } else {
            format!("{} Push left.", lesson.explanation)
        };
        Some(Hint { direction, urgency, explanation, phase: lesson.phase })
    }

    fn lesson_complete(&self, lesson: &Lesson) -> bool {
        let balance_ok = lesson.balance_goal <= 0.0 || self.balanced_time >= lesson.balance_goal;
        let follow_ok = lesson.follow_goal == 0 || self.follows >= lesson.follow_goal;
        balance_ok && follow_ok
    }

    fn advance(&mut self) {
        self.pending_advance = None;
        self.index += 1;
        self.balanced_time = 0.0;
        self.follows = 0;
        self.last_follow = None;
        match self.lesson() {
            Some(l) => info!(lesson = l.title, "next lesson"),
            None => info!("tutorial finished"),
        }
    }
}
