//! Small statistics over slices: mean, Pearson correlation, softmax.

/// Arithmetic mean, `None` when empty.
#[inline]
pub fn mean(xs: &[f64]) -> Option<f64> {
    if xs.is_empty() {
        None
    } else {
        Some(xs.iter().sum::<f64>() / xs.len() as f64)
    }
}

/// Pearson correlation. Needs equal lengths, at least `min_len` points and
/// non-zero variance on both sides.
pub fn pearson(x: &[f64], y: &[f64], min_len: usize) -> Option<f64> {
    if x.len() != y.len() || x.len() < min_len.max(2) {
        return None;
    }
    let mx = mean(x)?;
    let my = mean(y)?;
    let (mut cov, mut vx, mut vy) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        let dx = a - mx;
        let dy = b - my;
        cov += dx * dy;
        vx += dx * dx;
        vy += dy * dy;
    }
    if vx <= 0.0 || vy <= 0.0 {
        return None;
    }
    Some((cov / (vx * vy).sqrt()).clamp(-1.0, 1.0))
}

/// Numerically stable softmax; empty in, empty out.
pub fn softmax(xs: &[f64]) -> Vec<f64> {
    let max = xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return vec![1.0 / xs.len().max(1) as f64; xs.len()];
    }
    let exps: Vec<f64> = xs.iter().map(|x| (x - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}
