/// Angle mechanics. θ = π is upright, θ = 0 hangs down.
use std::f64::consts::PI;

/// Upright (unstable) equilibrium.
pub const UPRIGHT: f64 = PI;

/// Wrap an angle into (-π, π].
#[inline]
pub fn wrap_angle(a: f64) -> f64 {
    let w = a.sin().atan2(a.cos());
    if w <= -PI { w + 2.0 * PI } else { w }
}

/// Signed deviation from upright, wrapped.
#[inline]
pub fn deviation(theta: f64) -> f64 {
    wrap_angle(theta - UPRIGHT)
}

/// Whether θ lies within `threshold` of upright.
#[inline]
pub fn within(theta: f64, threshold: f64) -> bool {
    deviation(theta).abs() < threshold
}

#[inline]
pub fn deg_to_rad(deg: f64) -> f64 {
    deg * PI / 180.0
}

#[inline]
pub fn rad_to_deg(rad: f64) -> f64 {
    rad * 180.0 / PI
}
