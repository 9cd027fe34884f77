//! Exogenous disturbance generation.
//!
//! A [`PerturbationProfile`] is a declarative description; the
//! [`PerturbationManager`] turns it into at most one summed force per update.
//! Activating a profile starts a grace ramp: for `grace_period` seconds every
//! force is scaled by `elapsed / grace_period`.

use std::f64::consts::{FRAC_PI_2, PI};

use bevy_prng::WyRand;
use rand_core::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::ProfileError;
use crate::mechanics::stoch;
use crate::systems::sdk::{ForceQueue, ForceSource};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerturbationKind {
    /// Kick of `strength × U(0.8, 1.2)` with random sign when a countdown expires.
    Impulse,
    /// `sin(2π·f·t) × strength × 0.5`.
    Sine,
    /// Per-update noise, attenuated near the fall threshold.
    Random,
    /// Sum of the sub-profiles.
    Compound,
    /// Zen.
    None,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PerturbationProfile {
    pub name: String,
    pub kinds: Vec<PerturbationKind>,
    pub strength: f64,
    pub frequency: f64,
    /// Seconds between impulses, drawn uniformly from `lo..=hi`.
    pub random_interval: (f64, f64),
    #[serde(default)]
    pub sub_profiles: Vec<PerturbationProfile>,
}

impl PerturbationProfile {
    pub fn new(name: impl Into<String>, kinds: &[PerturbationKind], strength: f64, frequency: f64, random_interval: (f64, f64)) -> Self {
        Self {
            name: name.into(),
            kinds: kinds.to_vec(),
            strength,
            frequency,
            random_interval,
            sub_profiles: Vec::new(),
        }
    }

    pub fn with_sub_profiles(mut self, subs: Vec<PerturbationProfile>) -> Self {
        self.sub_profiles = subs;
        self
    }

    #[inline]
    pub fn has(&self, kind: PerturbationKind) -> bool {
        self.kinds.contains(&kind)
    }

    /// Strength must be non-negative, frequency finite and non-negative, and
    /// impulse profiles need a usable interval. Sub-profiles are checked too.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if !(self.strength >= 0.0) || !self.strength.is_finite() {
            return Err(ProfileError::NegativeStrength(self.strength));
        }
        if !(self.frequency >= 0.0) || !self.frequency.is_finite() {
            return Err(ProfileError::InvalidFrequency(self.frequency));
        }
        if self.has(PerturbationKind::Impulse) {
            let (lo, hi) = self.random_interval;
            let usable = lo.is_finite() && hi.is_finite() && lo >= 0.0 && hi >= lo && hi > 0.0;
            if !usable {
                return Err(ProfileError::EmptyInterval(lo, hi));
            }
        }
        self.sub_profiles.iter().try_for_each(PerturbationProfile::validate)
    }

    /// Classic-mode profile for a level (1-indexed).
    pub fn for_level(level: u32) -> Self {
        use PerturbationKind::*;
        let level = level.max(1);
        match level {
            1 => Self::new("Gentle Breeze", &[Impulse], 0.3, 0.0, (4.0, 6.0)),
            2 => Self::new("Moderate Wind", &[Impulse], 0.5, 0.0, (3.0, 5.0)),
            3 => Self::new("Rhythmic Current", &[Impulse, Sine], 0.6, 0.2, (3.0, 5.0)),
            4 => Self::new("Ocean Waves", &[Sine], 0.7, 0.3, (3.0, 4.0)),
            5 => Self::new("Stormy Waters", &[Sine, Impulse], 0.8, 0.4, (2.5, 4.0)),
            6 => Self::new("Seismic Tremors", &[Random, Impulse], 0.9, 0.0, (2.0, 3.5)),
            7 => Self::new("Chaotic Turbulence", &[Random], 1.0, 0.0, (1.5, 3.0)),
            8..=10 => Self::new("Perfect Storm", &[Compound], 1.0 + (level - 8) as f64 * 0.2, 0.5, (1.0, 2.0))
                .with_sub_profiles(vec![
                    Self::new("Base Sine", &[Sine], 0.8, 0.3, (0.0, 0.0)),
                    Self::new("Random Gusts", &[Impulse], 1.2, 0.0, (1.5, 3.0)),
                ]),
            _ => {
                let beyond = (level - 10) as f64;
                let strength = (1.0 + beyond * 0.1).min(2.0);
                let frequency = (0.5 + beyond * 0.05).min(1.0);
                Self::new(
                    format!("Extreme Challenge {level}"),
                    &[Compound],
                    strength,
                    frequency,
                    ((3.0 - beyond * 0.1).max(0.5), (3.5 - beyond * 0.1).max(1.0)),
                )
                .with_sub_profiles(vec![
                    Self::new("Primary Wave", &[Sine], strength * 0.8, frequency, (0.0, 0.0)),
                    Self::new(
                        "Impulse Bursts",
                        &[Impulse],
                        strength * 1.2,
                        0.0,
                        ((2.0 - beyond * 0.1).max(0.5), (3.0 - beyond * 0.1).max(1.0)),
                    ),
                ])
            }
        }
    }

    /// Impulse-only ramp used by Progressive mode.
    pub fn for_progressive_level(level: u32) -> Self {
        let level = level.max(1);
        let n = level as f64;
        let strength = (0.2 + (n - 1.0) * 0.05).min(0.8);
        let lo = (5.0 - n * 0.3).max(2.0);
        let hi = (7.0 - n * 0.3).max(3.0);
        Self::new(format!("Progressive L{level}"), &[PerturbationKind::Impulse], strength, 0.0, (lo, hi))
    }

    pub fn zen() -> Self {
        Self::new("Zen", &[PerturbationKind::None], 0.0, 0.0, (0.0, 0.0))
    }

    /// Continuous noise; ~0.3 is gentle, ~1.5 intense.
    pub fn jiggle(intensity: f64) -> Self {
        Self::new(format!("Jiggle ({intensity:.1})"), &[PerturbationKind::Random], intensity, 0.0, (0.0, 0.0))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerturbationConfig {
    /// Ramp length after activation (s); zero disables the ramp.
    pub grace_period: f64,
    /// Forces with |f| at or below this are not emitted.
    pub emit_epsilon: f64,
    /// Attenuation floor for random noise at the fall threshold.
    pub random_floor: f64,
    /// Deviation (rad) at which random noise reaches its floor.
    pub fall_threshold: f64,
    pub min_strength: f64,
    pub max_strength: f64,
}

impl Default for PerturbationConfig {
    fn default() -> Self {
        Self {
            grace_period: 2.0,
            emit_epsilon: 0.001,
            random_floor: 0.15,
            fall_threshold: FRAC_PI_2,
            min_strength: 0.05,
            max_strength: 5.0,
        }
    }
}

/// Profile-driven force generator; `inactive → active(profile) → inactive`.
pub struct PerturbationManager {
    cfg: PerturbationConfig,
    rng: WyRand,
    profile: Option<PerturbationProfile>,
    active: bool,
    last_update: Option<f64>,
    elapsed: f64,
    countdown: f64,
    sub_countdowns: Vec<f64>,
}

impl PerturbationManager {
    pub fn new(cfg: PerturbationConfig, seed: u64) -> Self {
        Self {
            cfg,
            rng: WyRand::from_seed(seed.to_le_bytes()),
            profile: None,
            active: false,
            last_update: None,
            elapsed: 0.0,
            countdown: 0.0,
            sub_countdowns: Vec::new(),
        }
    }

    pub fn config(&self) -> &PerturbationConfig {
        &self.cfg
    }

    pub fn profile(&self) -> Option<&PerturbationProfile> {
        self.profile.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.active && self.profile.is_some()
    }

    /// Seconds since the current profile was activated.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Current grace multiplier in [0, 1].
    pub fn grace_scale(&self) -> f64 {
        if self.cfg.grace_period <= 0.0 {
            1.0
        } else {
            (self.elapsed / self.cfg.grace_period).clamp(0.0, 1.0)
        }
    }

    /// Replace the active profile. Invalid profiles are refused and the
    /// previous state is kept.
    pub fn activate_profile(&mut self, profile: PerturbationProfile) -> Result<(), ProfileError> {
        if let Err(e) = profile.validate() {
            warn!(profile = %profile.name, error = %e, "rejecting perturbation profile");
            return Err(e);
        }
        info!(profile = %profile.name, strength = profile.strength, "perturbation profile activated");
        self.profile = Some(profile);
        self.elapsed = 0.0;
        self.last_update = None;
        self.reset_impulse_timing();
        self.active = true;
        Ok(())
    }

    pub fn stop(&mut self) {
        self.active = false;
    }

    /// Re-arm after `stop`; impulse timing is redrawn and the time base reset.
    pub fn resume(&mut self) {
        self.active = true;
        self.reset_impulse_timing();
        self.last_update = None;
    }

    pub fn deactivate(&mut self) {
        self.profile = None;
        self.active = false;
        self.sub_countdowns.clear();
    }

    /// Multiply strengths in place, clamped to the safe range.
    pub fn scale_intensity(&mut self, factor: f64) {
        if !factor.is_finite() || factor < 0.0 {
            debug!(factor, "ignoring invalid intensity factor");
            return;
        }
        let (lo, hi) = (self.cfg.min_strength, self.cfg.max_strength);
        if let Some(p) = self.profile.as_mut() {
            p.strength = (p.strength * factor).clamp(lo, hi);
            for sub in &mut p.sub_profiles {
                sub.strength = (sub.strength * factor).clamp(lo, hi);
            }
            debug!(strength = p.strength, factor, "perturbation intensity scaled");
        }
    }

    /// Advance to session time `now`. `deviation` is the signed angle from
    /// upright, used to attenuate random noise. Returns the force to apply.
    pub fn update(&mut self, now: f64, deviation: f64) -> Option<f64> {
        if !self.active {
            return None;
        }
        let profile = self.profile.as_ref()?;
        if profile.has(PerturbationKind::None) {
            return None;
        }

        let dt = match self.last_update.replace(now) {
            Some(prev) => now - prev,
            None => return None,
        };
        if !(dt > 0.0 && dt < 1.0) {
            return None;
        }
        self.elapsed += dt;

        let attenuation = self.attenuation(deviation);
        let t = self.elapsed;
        let mut total = 0.0;

        for kind in profile.kinds.iter().copied() {
            match kind {
                PerturbationKind::Impulse => {
                    self.countdown -= dt;
                    if self.countdown <= 0.0 {
                        total += impulse(&mut self.rng, profile.strength);
                        self.countdown = draw_interval(&mut self.rng, profile.random_interval);
                    }
                }
                PerturbationKind::Sine => total += sine(profile.frequency, profile.strength, t),
                PerturbationKind::Random => {
                    total += stoch::uniform_in(&mut self.rng, -1.0, 1.0) * profile.strength * attenuation;
                }
                PerturbationKind::Compound => {
                    for (i, sub) in profile.sub_profiles.iter().enumerate() {
                        for kind in sub.kinds.iter().copied() {
                            match kind {
                                PerturbationKind::Sine => total += sine(sub.frequency, sub.strength, t),
                                PerturbationKind::Random => {
                                    total += stoch::uniform_in(&mut self.rng, -1.0, 1.0) * sub.strength * attenuation;
                                }
                                PerturbationKind::Impulse => {
                                    if let Some(c) = self.sub_countdowns.get_mut(i) {
                                        *c -= dt;
                                        if *c <= 0.0 {
                                            total += impulse(&mut self.rng, sub.strength);
                                            *c = draw_interval(&mut self.rng, sub.random_interval);
                                        }
                                    }
                                }
                                PerturbationKind::Compound | PerturbationKind::None => {}
                            }
                        }
                    }
                }
                PerturbationKind::None => {}
            }
        }

        let force = total * self.grace_scale();
        (force.abs() > self.cfg.emit_epsilon).then_some(force)
    }

    /// [`update`](Self::update) and push the result as a perturbation event.
    pub fn update_into(&mut self, now: f64, deviation: f64, queue: &mut ForceQueue) -> Option<f64> {
        let force = self.update(now, deviation)?;
        queue.push(ForceSource::Perturbation, force);
        Some(force)
    }

    /// 1.0 upright, falling linearly to the floor at the fall threshold.
    fn attenuation(&self, deviation: f64) -> f64 {
        let floor = self.cfg.random_floor.clamp(0.0, 1.0);
        let limit = self.cfg.fall_threshold.clamp(1e-6, PI);
        let frac = (deviation.abs() / limit).clamp(0.0, 1.0);
        (1.0 - (1.0 - floor) * frac).clamp(floor, 1.0)
    }

    fn reset_impulse_timing(&mut self) {
        let Some(profile) = self.profile.as_ref() else {
            return;
        };
        self.countdown = if profile.has(PerturbationKind::Impulse) {
            draw_interval(&mut self.rng, profile.random_interval)
        } else {
            0.0
        };
        self.sub_countdowns = profile
            .sub_profiles
            .iter()
            .map(|sub| {
                if sub.has(PerturbationKind::Impulse) {
                    draw_interval(&mut self.rng, sub.random_interval)
                } else {
                    0.0
                }
            })
            .collect();
    }
}

#[inline]
fn impulse(rng: &mut WyRand, strength: f64) -> f64 {
    let sign = stoch::random_sign(rng);
    sign * strength * stoch::uniform_in(rng, 0.8, 1.2)
}

#[inline]
fn sine(frequency: f64, strength: f64, t: f64) -> f64 {
    (2.0 * PI * frequency * t).sin() * strength * 0.5
}

#[inline]
fn draw_interval(rng: &mut WyRand, (lo, hi): (f64, f64)) -> f64 {
    stoch::uniform_in(rng, lo, hi)
}
