//! Fixed-enumeration calibration driver.
//!
//! The cells visited are fixed by the registered geometry, never by which
//! cells happened to see data: zero-count cells flow through the
//! degenerate fit path so "no data" stays visible in the output. A cell
//! whose fit fails outright is reported in the diagnostics and left
//! empty; the rest of the run proceeds.

use crate::common::config::CalibrationConfig;
use crate::domain::{
    CellKey, ChannelKey, Diagnostic, RangeBoundary, SubPath, SubRange, SufficientStatistics,
};
use crate::modules::collector::ChargePairCollector;
use crate::modules::crossover::{self, CrossoverOutcome};
use crate::modules::fitter::{self, FitError, FitQuality};
use crate::modules::record::{CalibrationRecord, CalibrationSet};

/// Calibration records plus every data-quality finding raised while
/// producing them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationOutput {
    pub records: CalibrationSet,
    pub diagnostics: Vec<Diagnostic>,
}

/// Fit every cell of every registered channel and solve every channel's
/// crossover thresholds.
///
/// Per channel and sub-range, both collected sub-paths are fitted from
/// their own sums and the combined sub-path from their field-wise sum.
pub fn run_calibration(
    collector: &ChargePairCollector,
    config: &CalibrationConfig,
) -> CalibrationOutput {
    let mut records = CalibrationSet::default();
    let mut diagnostics = Vec::new();

    for (&channel, aggregates) in collector.channels() {
        let mut record = CalibrationRecord::new(channel);

        for range in SubRange::ALL {
            let (path_a, path_b) = aggregates.path_statistics(range);
            fit_cell(channel, SubPath::A, range, path_a, &mut record, &mut diagnostics);
            fit_cell(channel, SubPath::B, range, path_b, &mut record, &mut diagnostics);

            let combined = SufficientStatistics::combined(path_a, path_b);
            fit_cell(
                channel,
                SubPath::Combined,
                range,
                &combined,
                &mut record,
                &mut diagnostics,
            );
        }

        let bad_listed = config.bad_channels.contains(&channel);
        match crossover::solve(aggregates.pair_buffers(), bad_listed) {
            CrossoverOutcome::Thresholds(result) => {
                if result.low_mid.is_nan() {
                    diagnostics.push(Diagnostic::MissingIntersection {
                        channel,
                        boundary: RangeBoundary::LowMid,
                    });
                }
                if result.mid_high.is_nan() {
                    diagnostics.push(Diagnostic::MissingIntersection {
                        channel,
                        boundary: RangeBoundary::MidHigh,
                    });
                }
                record.set_crossover(result);
            }
            CrossoverOutcome::Excluded => {}
            CrossoverOutcome::Sparse { populated } => {
                diagnostics.push(Diagnostic::SparseCrossover { channel, populated });
            }
        }

        records.insert(record);
    }

    CalibrationOutput {
        records,
        diagnostics,
    }
}

fn fit_cell(
    channel: ChannelKey,
    path: SubPath,
    range: SubRange,
    statistics: &SufficientStatistics,
    record: &mut CalibrationRecord,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let cell = CellKey {
        channel,
        path,
        range,
    };
    match fitter::fit(statistics) {
        Ok(result) => {
            match result.quality {
                FitQuality::Degenerate => {
                    diagnostics.push(Diagnostic::DegenerateFit { cell, n: result.n });
                }
                FitQuality::Underdetermined => {
                    diagnostics.push(Diagnostic::UnderdeterminedFit { cell, n: result.n });
                }
                FitQuality::WellDetermined => {}
            }
            if result.chi2_is_anomalous() {
                diagnostics.push(Diagnostic::NegativeChiSquare {
                    cell,
                    chi2: result.chi2,
                    n: result.n,
                });
            }
            record.set_fit(path, range, result);
        }
        Err(error) => {
            let FitError::NegativeChiSquare { chi2, n } = error;
            diagnostics.push(Diagnostic::NegativeChiSquare { cell, chi2, n });
            diagnostics.push(Diagnostic::FitFailed {
                cell,
                message: error.to_string(),
            });
        }
    }
}
