//! Weighted, median-filtered consensus over disagreeing rate sources.

use rust_decimal::Decimal;

/// Default relative deviation from the median beyond which a point is an outlier (5%).
pub const DEFAULT_MAX_DEVIATION: Decimal = Decimal::from_parts(5, 0, 0, false, 2);

/// One provider's report for one currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataPoint {
    pub price: Decimal,
    pub weight: u8,
}

impl DataPoint {
    pub fn new(price: Decimal, weight: u8) -> Self {
        Self { price, weight }
    }
}

/// Median of `prices`; the midpoint of the two middle values for even counts.
pub fn median(prices: &[Decimal]) -> Option<Decimal> {
    if prices.is_empty() {
        return None;
    }
    let mut sorted = prices.to_vec();
    sorted.sort();
    let mid = sorted.len() / 2;

    if sorted.len() % 2 == 0 {
        let (lo, hi) = (sorted[mid - 1], sorted[mid]);
        let half_gap = hi.checked_sub(lo)? / Decimal::TWO;
        lo.checked_add(half_gap)
    } else {
        Some(sorted[mid])
    }
}

/// `None` if the weighted sum does not fit in a `Decimal`.
fn weighted_mean(points: &[DataPoint]) -> Option<Decimal> {
    let total_weight: Decimal = points.iter().map(|p| Decimal::from(p.weight)).sum();
    if total_weight.is_zero() {
        return None;
    }
    let weighted = points.iter().try_fold(Decimal::ZERO, |acc, p| {
        acc.checked_add(p.price.checked_mul(Decimal::from(p.weight))?)
    })?;
    weighted.checked_div(total_weight)
}

/// Points whose relative deviation from `median` is below `max_deviation`.
pub fn filter_outliers(points: &[DataPoint], median: Decimal, max_deviation: Decimal) -> Vec<DataPoint> {
    if median <= Decimal::ZERO {
        return points.to_vec();
    }
    points
        .iter()
        .filter(|p| {
            // A deviation too large to represent is an outlier.
            p.price
                .checked_sub(median)
                .and_then(|gap| gap.abs().checked_div(median))
                .is_some_and(|deviation| deviation < max_deviation)
        })
        .copied()
        .collect()
}

/// Consensus rate for one currency.
///
/// A single point passes through unfiltered. Otherwise points deviating
/// from the median by `max_deviation` or more are dropped, falling back to
/// the full set if nothing survives, and the survivors are averaged by
/// weight. Returns `None` when the average overflows.
pub fn consensus_rate(points: &[DataPoint], max_deviation: Decimal) -> Option<Decimal> {
    match points {
        [] => None,
        [only] => Some(only.price),
        _ => {
            let prices: Vec<Decimal> = points.iter().map(|p| p.price).collect();
            let median = median(&prices)?;
            let survivors = filter_outliers(points, median, max_deviation);

            if survivors.is_empty() {
                weighted_mean(points)
            } else {
                weighted_mean(&survivors)
            }
        }
    }
}
