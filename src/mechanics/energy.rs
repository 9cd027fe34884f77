/// Energy mechanics for the pendulum.

/// Mechanical energy of a point mass: ½m(Lω)² + mgL(1 - cos θ).
#[inline]
pub fn mechanical_energy(mass: f64, length: f64, gravity: f64, theta: f64, theta_dot: f64) -> f64 {
    let ke = 0.5 * mass * (length * theta_dot).powi(2);
    let pe = mass * gravity * length * (1.0 - theta.cos());
    ke + pe
}

/// First integral of θ'' = -ka·sin θ + ks·θ (undamped, unforced):
/// E = ½ω² - ka·cos θ - ½ks·θ².
#[inline]
pub fn normalized_energy(ka: f64, ks: f64, theta: f64, theta_dot: f64) -> f64 {
    0.5 * theta_dot * theta_dot - ka * theta.cos() - 0.5 * ks * theta * theta
}
