//! Crossover-point estimation from marginal charge distributions.
//!
//! The acquisition switches gain ranges at charge values where the
//! neighbouring ranges' populations trade dominance. Each populated
//! sub-range's log-charge sample is smoothed into a kernel density
//! estimate, rescaled to an approximate count-per-bin curve with the
//! frozen reference binning, and the threshold is the charge at which two
//! adjacent curves cross between their medians.

use crate::common::constants::LOG_CHARGE_BIN_WIDTH;
use crate::domain::{RangeBoundary, RawPairBuffer, SubRange};
use crate::numerics::kde::GaussianKde;
use crate::numerics::median;
use crate::numerics::rootfind::find_root_brent;
use serde::Serialize;

/// Charge thresholds at which the acquisition switches gain ranges, in
/// linear charge units. A threshold is NaN when the two weighted densities
/// never cross between the sub-range medians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CrossoverResult {
    pub low_mid: f64,
    pub mid_high: f64,
}

impl CrossoverResult {
    pub fn threshold(&self, boundary: RangeBoundary) -> f64 {
        match boundary {
            RangeBoundary::LowMid => self.low_mid,
            RangeBoundary::MidHigh => self.mid_high,
        }
    }
}

/// Outcome of the crossover computation for one channel.
#[derive(Debug, Clone, PartialEq)]
pub enum CrossoverOutcome {
    /// All three sub-ranges were populated; both thresholds computed.
    Thresholds(CrossoverResult),
    /// Not fully populated and the channel is on the known-bad list;
    /// skipped without a result entry.
    Excluded,
    /// Not fully populated on a channel that is not known-bad: counts per
    /// sub-range after the log transform and contamination guard.
    Sparse {
        populated: [usize; SubRange::COUNT],
    },
}

struct RangeDensity {
    kde: GaussianKde,
    weight: f64,
    median: f64,
}

/// Estimate both gain-range thresholds for one channel from its pooled
/// raw pair buffers.
///
/// The population check runs before the bad-list check: a fully populated
/// channel always yields thresholds, bad-listed or not.
pub fn solve(
    buffers: &[RawPairBuffer; SubRange::COUNT],
    bad_listed: bool,
) -> CrossoverOutcome {
    // zero charges drop out of the log transform as non-finite
    let mut log_values: [Vec<f64>; SubRange::COUNT] = [
        finite_log10(buffers[0].slc_values()),
        finite_log10(buffers[1].slc_values()),
        finite_log10(buffers[2].slc_values()),
    ];

    // An apparent high-range population sitting entirely below the mid
    // range is contamination, not real high-range data.
    if let (Some(high_max), Some(mid_min)) = (
        max_value(&log_values[SubRange::High.index()]),
        min_value(&log_values[SubRange::Mid.index()]),
    ) {
        if high_max < mid_min {
            log_values[SubRange::High.index()].clear();
        }
    }

    let populated = [
        log_values[0].len(),
        log_values[1].len(),
        log_values[2].len(),
    ];
    if populated.iter().any(|&count| count < 2) {
        return if bad_listed {
            CrossoverOutcome::Excluded
        } else {
            CrossoverOutcome::Sparse { populated }
        };
    }

    let densities: [Option<RangeDensity>; SubRange::COUNT] = [
        range_density(&log_values[0], buffers[0].len()),
        range_density(&log_values[1], buffers[1].len()),
        range_density(&log_values[2], buffers[2].len()),
    ];

    let low_mid = intersect(&densities[0], &densities[1]);
    let mid_high = intersect(&densities[1], &densities[2]);

    CrossoverOutcome::Thresholds(CrossoverResult {
        low_mid: 10.0_f64.powf(low_mid),
        mid_high: 10.0_f64.powf(mid_high),
    })
}

fn finite_log10(values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .map(|value| value.log10())
        .filter(|value| value.is_finite())
        .collect()
}

fn max_value(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

fn min_value(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min)
}

/// Weighted density of one populated sub-range. The weight uses the raw
/// pair count, zero charges included, so the rescaled curves of unevenly
/// populated sub-ranges stay comparable; `None` when the sample has no
/// spread to estimate a bandwidth from.
fn range_density(log_values: &[f64], raw_count: usize) -> Option<RangeDensity> {
    let kde = GaussianKde::from_samples(log_values).ok()?;
    let median = median(log_values)?;
    Some(RangeDensity {
        kde,
        weight: raw_count as f64 * LOG_CHARGE_BIN_WIDTH,
        median,
    })
}

/// Log-charge at which the weighted densities of two adjacent sub-ranges
/// cross, searched between their medians; NaN when they never do.
fn intersect(lower: &Option<RangeDensity>, upper: &Option<RangeDensity>) -> f64 {
    let (Some(lower), Some(upper)) = (lower, upper) else {
        return f64::NAN;
    };

    find_root_brent(
        |x| lower.weight * lower.kde.density(x) - upper.weight * upper.kde.density(x),
        lower.median,
        upper.median,
    )
    .unwrap_or(f64::NAN)
}
