/// Fixed-step integrators for two-dimensional first-order systems.

/// One classical Runge–Kutta step of y' = f(t, y).
#[inline]
pub fn rk4<F>(f: F, t: f64, y: [f64; 2], h: f64) -> [f64; 2]
where
    F: Fn(f64, [f64; 2]) -> [f64; 2],
{
    let at = |y: [f64; 2], k: [f64; 2], s: f64| [y[0] + s * k[0], y[1] + s * k[1]];

    let k1 = f(t, y);
    let k2 = f(t + 0.5 * h, at(y, k1, 0.5 * h));
    let k3 = f(t + 0.5 * h, at(y, k2, 0.5 * h));
    let k4 = f(t + h, at(y, k3, h));

    [
        y[0] + h / 6.0 * (k1[0] + 2.0 * k2[0] + 2.0 * k3[0] + k4[0]),
        y[1] + h / 6.0 * (k1[1] + 2.0 * k2[1] + 2.0 * k3[1] + k4[1]),
    ]
}
