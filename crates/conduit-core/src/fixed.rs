use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
pub type Fixed64 = I32F32;

/// Convert an f64 to Fixed64. Use only for initialization, never in sim loop.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

/// Convert Fixed64 to f64. Use only for display, never in sim loop.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// Checked division for Fixed64 that returns None on zero divisor.
#[inline]
pub fn checked_div_64(a: Fixed64, b: Fixed64) -> Option<Fixed64> {
    a.checked_div(b)
}

/// Divide `total` into shares proportional to `weights`.
///
/// The shares always sum to exactly `total`: each share is rounded down and
/// the rounding remainder is credited to the heaviest weight (first one on
/// ties). A zero or empty weight list hands everything to index 0, if any.
pub fn split_proportional(total: Fixed64, weights: &[usize]) -> Vec<Fixed64> {
    let mut shares = vec![Fixed64::ZERO; weights.len()];
    if shares.is_empty() {
        return shares;
    }

    let sum: usize = weights.iter().sum();
    let heaviest = weights
        .iter()
        .enumerate()
        .max_by(|(ia, a), (ib, b)| a.cmp(b).then(ib.cmp(ia)))
        .map(|(i, _)| i)
        .unwrap_or(0);

    if sum == 0 {
        shares[heaviest] = total;
        return shares;
    }

    let sum = Fixed64::from_num(sum);
    let mut handed_out = Fixed64::ZERO;
    for (share, &weight) in shares.iter_mut().zip(weights) {
        let weight = Fixed64::from_num(weight);
        // Multiply first for precision; fall back to divide-first near the range limit.
        let portion = total
            .checked_mul(weight)
            .and_then(|scaled| checked_div_64(scaled, sum))
            .unwrap_or_else(|| checked_div_64(total, sum).unwrap_or(Fixed64::ZERO) * weight);
        *share = portion;
        handed_out += portion;
    }
    shares[heaviest] += total - handed_out;
    shares
}
