//! Smoothing primitives shared by the indicator implementations.
//!
//! Each function maps an input slice to an output of the same length, `None`
//! until the lookback is satisfied. `None` inputs restart nothing: a gap in the
//! input before the seed simply delays the seed.

/// Simple moving average over `period` values.
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    let mut sum: f64 = values[..period].iter().sum();
    out[period - 1] = Some(sum / period as f64);
    for i in period..values.len() {
        sum += values[i] - values[i - period];
        out[i] = Some(sum / period as f64);
    }
    out
}

/// EMA with k = 2/(n+1), seeded with the SMA of the first `period` values.
pub fn ema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    let k = 2.0 / (period as f64 + 1.0);
    let mut current = values[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(current);
    for i in period..values.len() {
        current = values[i] * k + current * (1.0 - k);
        out[i] = Some(current);
    }
    out
}

/// Wilder's smoothing: seed = mean of the first `period` values, then
/// avg = (prev * (n-1) + x) / n.
pub fn wilder(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    let mut current = values[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(current);
    for i in period..values.len() {
        current = (current * (period - 1) as f64 + values[i]) / period as f64;
        out[i] = Some(current);
    }
    out
}

/// Applies a smoother to the defined tail of a partially-defined series.
/// Leading `None`s are carried through; the smoother sees only defined values.
pub fn smooth_defined(
    values: &[Option<f64>],
    period: usize,
    smoother: fn(&[f64], usize) -> Vec<Option<f64>>,
) -> Vec<Option<f64>> {
    let start = match values.iter().position(|v| v.is_some()) {
        Some(s) => s,
        None => return vec![None; values.len()],
    };
    let tail: Vec<f64> = values[start..].iter().map(|v| v.unwrap_or(0.0)).collect();
    let mut out = vec![None; start];
    out.extend(smoother(&tail, period));
    out
}

/// Highest value over the trailing `period` window ending at `end` (inclusive).
pub fn highest(values: &[f64], end: usize, period: usize) -> f64 {
    values[end + 1 - period..=end]
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max)
}

/// Lowest value over the trailing `period` window ending at `end` (inclusive).
pub fn lowest(values: &[f64], end: usize, period: usize) -> f64 {
    values[end + 1 - period..=end]
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min)
}
