//! Exponential Moving Average indicator.
//!
//! alpha = 2/(span+1), EMA[0] = C[0], then EMA[i] = C[i]*alpha + EMA[i-1]*(1-alpha).
//! Seeded on the first value rather than an SMA, so every point is valid.

/// Raw EMA recurrence over an arbitrary series.
pub fn ema_values(input: &[f64], span: usize) -> Vec<f64> {
    if span == 0 || input.is_empty() {
        return Vec::new();
    }

    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(input.len());
    let mut ema = input[0];
    out.push(ema);
    for &x in &input[1..] {
        ema = x * alpha + ema * (1.0 - alpha);
        out.push(ema);
    }
    out
}
