/// Control mechanics: proportional updates and PD laws.

/// Proportional approach: x' = clamp(x + k * (target - x)).
#[inline]
pub fn approach(x: f64, target: f64, k: f64, lo: f64, hi: f64) -> f64 {
    (x + k * (target - x)).clamp(lo, hi)
}

/// PD law toward zero error: u = -(kp * e + kd * de).
#[inline]
pub fn pd(error: f64, rate: f64, kp: f64, kd: f64) -> f64 {
    -(kp * error + kd * rate)
}

/// Gains for a critically-shaped second-order response: (ωn², 2ζωn).
#[inline]
pub fn pd_gains(natural_freq: f64, damping_ratio: f64) -> (f64, f64) {
    (natural_freq * natural_freq, 2.0 * damping_ratio * natural_freq)
}
