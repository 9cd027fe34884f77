use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::systems::level::GameMode;
use crate::systems::solver::AiMode;

/// Sessions below this use the rule engine only.
pub const RULE_TIER_SESSIONS: usize = 5;
/// Sessions at or above this may use the classifier.
pub const CLASSIFIER_TIER_SESSIONS: usize = 20;
/// Classifier answers below this confidence fall back to the scorer.
pub const CLASSIFIER_MIN_CONFIDENCE: f64 = 0.6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusArea {
    Stability,
    Reaction,
    Precision,
    Endurance,
    Calm,
    Recovery,
}

impl FocusArea {
    pub const ALL: [FocusArea; 6] = [
        FocusArea::Stability,
        FocusArea::Reaction,
        FocusArea::Precision,
        FocusArea::Endurance,
        FocusArea::Calm,
        FocusArea::Recovery,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn from_index(i: usize) -> Option<Self> {
        Self::ALL.get(i).copied()
    }

    pub fn display_name(self) -> &'static str {
        match self {
            FocusArea::Stability => "Stability Training",
            FocusArea::Reaction => "Reaction Speed",
            FocusArea::Precision => "Precision Control",
            FocusArea::Endurance => "Endurance Session",
            FocusArea::Calm => "Calm Focus",
            FocusArea::Recovery => "Gentle Recovery",
        }
    }

    pub fn benefit(self) -> &'static str {
        match self {
            FocusArea::Stability => "Builds steady postural control under light disturbance.",
            FocusArea::Reaction => "Sharpens response to sudden pushes.",
            FocusArea::Precision => "Trains small, well-timed corrections in a tight window.",
            FocusArea::Endurance => "Sustains attention over a longer session.",
            FocusArea::Calm => "Low-pressure balancing paired with slow breathing.",
            FocusArea::Recovery => "Easy practice for low-energy days.",
        }
    }
}

/// Which tier produced a recommendation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    RuleEngine,
    WeightedScorer,
    Classifier,
}

impl Tier {
    pub fn label(self) -> &'static str {
        match self {
            Tier::RuleEngine => "Rule Engine",
            Tier::WeightedScorer => "Weighted Scorer",
            Tier::Classifier => "ML Classifier",
        }
    }
}

/// Concrete session configuration handed to the host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    pub game_mode: GameMode,
    pub ai_mode: AiMode,
    /// [0, 1].
    pub ai_difficulty: f64,
    pub suggested_level: u32,
    pub target_duration_minutes: f64,
    pub perturbation_scale: f64,
}

impl GameConfig {
    /// Default configuration for a focus area at the player's level.
    pub fn for_focus(focus: FocusArea, max_level: u32) -> Self {
        let level = max_level.max(1);
        let (game_mode, ai_mode, ai_difficulty, suggested_level, minutes, scale) = match focus {
            FocusArea::Stability => (GameMode::Classic, AiMode::Helper, 0.4, level, 10.0, 1.0),
            FocusArea::Reaction => (GameMode::Jiggle, AiMode::Off, 0.5, level, 8.0, 1.2),
            FocusArea::Precision => (GameMode::Progressive, AiMode::Off, 0.6, level + 1, 10.0, 1.0),
            FocusArea::Endurance => (GameMode::Timed, AiMode::Competition, 0.5, level, 15.0, 1.1),
            FocusArea::Calm => (GameMode::FreePlay, AiMode::Off, 0.2, level, 10.0, 0.6),
            FocusArea::Recovery => {
                (GameMode::FreePlay, AiMode::Helper, 0.2, level.saturating_sub(1).max(1), 5.0, 0.5)
            }
        };
        Self {
            game_mode,
            ai_mode,
            ai_difficulty,
            suggested_level,
            target_duration_minutes: minutes,
            perturbation_scale: scale,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: Uuid,
    pub focus_area: FocusArea,
    /// [0, 1].
    pub confidence_score: f64,
    pub config: GameConfig,
    pub tier: Tier,
    pub rationale: String,
    pub created_at: DateTime<Utc>,
}

impl Recommendation {
    pub fn new(
        focus_area: FocusArea,
        confidence_score: f64,
        max_level: u32,
        tier: Tier,
        rationale: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let confidence_score = if confidence_score.is_finite() { confidence_score.clamp(0.0, 1.0) } else { 0.0 };
        Self {
            id: Uuid::new_v4(),
            focus_area,
            confidence_score,
            config: GameConfig::for_focus(focus_area, max_level),
            tier,
            rationale: rationale.into(),
            created_at,
        }
    }
}

/// Tier gate from history volume alone.
///
/// Inside the scorer tier the rule engine still answers until
/// [`scorer_blend`] passes 0.5. `Classifier` means "ask the classifier"; a
/// low-confidence answer falls back to the scorer.
pub fn select_tier(session_count: usize, model_available: bool) -> Tier {
    if session_count < RULE_TIER_SESSIONS {
        Tier::RuleEngine
    } else if session_count < CLASSIFIER_TIER_SESSIONS || !model_available {
        Tier::WeightedScorer
    } else {
        Tier::Classifier
    }
}

/// Scorer share of the tier-2 blend, [0, 1].
#[inline]
pub fn scorer_blend(session_count: usize) -> f64 {
    (session_count.saturating_sub(RULE_TIER_SESSIONS) as f64 / 15.0).min(1.0)
}
