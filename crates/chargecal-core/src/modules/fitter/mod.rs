//! Closed-form least-squares calibration fit.

use crate::domain::SufficientStatistics;
use serde::Serialize;

/// Sentinel reported for parameter uncertainties that cannot be estimated.
pub const ERROR_SENTINEL: f64 = -1.0;

/// How much of the fit is trustworthy for a given cell population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FitQuality {
    /// Parameters and their uncertainties are both defined.
    WellDetermined,
    /// Exactly two observations: parameters are valid, uncertainties are
    /// sentineled.
    Underdetermined,
    /// Fewer than two observations or a non-positive normal determinant;
    /// parameters are zeroed and uncertainties sentineled.
    Degenerate,
}

/// Fitted line and goodness of fit for one calibration cell, with the
/// originating sums retained for auditing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FitResult {
    pub p0: f64,
    pub p1: f64,
    pub p0_error: f64,
    pub p1_error: f64,
    pub chi2: f64,
    pub n: u64,
    pub quality: FitQuality,
    pub statistics: SufficientStatistics,
}

impl FitResult {
    /// True when chi-square came out negative: expected rounding noise at
    /// n <= 2, corrupted input sums otherwise.
    pub fn chi2_is_anomalous(&self) -> bool {
        self.chi2 < 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum FitError {
    #[error("chi-square {chi2} is negative with n={n}; parameter uncertainties would be undefined")]
    NegativeChiSquare { chi2: f64, n: u64 },
}

/// Ordinary least squares in closed form over accumulated sums.
///
/// A population of n <= 1, or a non-positive determinant of the normal
/// equations, zeroes the parameters; n <= 2 leaves the uncertainties at
/// the -1 sentinel. A negative chi-square with n > 2 aborts the cell:
/// algebraically impossible, it signals inconsistent sums, and an
/// uncertainty scaled by its square root would be meaningless.
pub fn fit(statistics: &SufficientStatistics) -> Result<FitResult, FitError> {
    let s = statistics;
    let n = s.n as f64;
    let delta = n * s.xx - s.x * s.x;

    let degenerate = s.n <= 1 || delta <= 0.0;
    let (p0, p1, p0_coeff, p1_coeff) = if degenerate {
        (0.0, 0.0, ERROR_SENTINEL, ERROR_SENTINEL)
    } else {
        (
            (s.xx * s.y - s.x * s.xy) / delta,
            (n * s.xy - s.x * s.y) / delta,
            (s.xx / delta).sqrt(),
            (n / delta).sqrt(),
        )
    };

    let chi2 = s.yy - 2.0 * p0 * s.y - 2.0 * p1 * s.xy
        + p0 * p0 * n
        + 2.0 * p0 * p1 * s.x
        + p1 * p1 * s.xx;

    if chi2 < 0.0 && s.n > 2 {
        return Err(FitError::NegativeChiSquare { chi2, n: s.n });
    }

    let (p0_error, p1_error, quality) = if degenerate {
        (ERROR_SENTINEL, ERROR_SENTINEL, FitQuality::Degenerate)
    } else if s.n <= 2 {
        (ERROR_SENTINEL, ERROR_SENTINEL, FitQuality::Underdetermined)
    } else {
        let scale = (chi2 / (n - 2.0)).sqrt();
        (
            p0_coeff * scale,
            p1_coeff * scale,
            FitQuality::WellDetermined,
        )
    };

    Ok(FitResult {
        p0,
        p1,
        p0_error,
        p1_error,
        chi2,
        n: s.n,
        quality,
        statistics: *s,
    })
}

#[cfg(test)]
mod tests {
    use super::{fit, FitError, FitQuality, ERROR_SENTINEL};
    use crate::domain::SufficientStatistics;

    fn statistics_from_pairs(pairs: &[(f64, f64)]) -> SufficientStatistics {
        let mut statistics = SufficientStatistics::default();
        for &(x, y) in pairs {
            statistics.fold(x, y);
        }
        statistics
    }

    #[test]
    fn empty_and_single_observation_cells_fit_degenerately() {
        for statistics in [
            SufficientStatistics::default(),
            statistics_from_pairs(&[(2.0, 4.1)]),
        ] {
            let result = fit(&statistics).expect("degenerate fit is not an error");
            assert_eq!(result.p0, 0.0);
            assert_eq!(result.p1, 0.0);
            assert_eq!(result.p0_error, ERROR_SENTINEL);
            assert_eq!(result.p1_error, ERROR_SENTINEL);
            assert_eq!(result.quality, FitQuality::Degenerate);
            assert!(result.chi2 >= 0.0);
        }
    }

    #[test]
    fn constant_abscissa_cells_fit_degenerately_regardless_of_population() {
        let statistics = statistics_from_pairs(&[(3.0, 1.0), (3.0, 2.0), (3.0, 3.0), (3.0, 4.0)]);

        let result = fit(&statistics).expect("degenerate fit is not an error");
        assert_eq!(result.quality, FitQuality::Degenerate);
        assert_eq!(result.p0, 0.0);
        assert_eq!(result.p1, 0.0);
    }

    #[test]
    fn two_observations_fix_the_line_but_not_its_uncertainties() {
        let statistics = statistics_from_pairs(&[(1.0, 2.05), (3.0, 6.05)]);

        let result = fit(&statistics).expect("two-point fit should succeed");
        assert_eq!(result.quality, FitQuality::Underdetermined);
        assert!((result.p0 - 0.05).abs() <= 1.0e-9);
        assert!((result.p1 - 2.0).abs() <= 1.0e-9);
        assert_eq!(result.p0_error, ERROR_SENTINEL);
        assert_eq!(result.p1_error, ERROR_SENTINEL);
    }

    #[test]
    fn noiseless_lines_are_recovered_exactly() {
        let pairs: Vec<(f64, f64)> = (1..=20)
            .map(|index| {
                let x = index as f64;
                (x, 0.05 + 2.0 * x)
            })
            .collect();
        let statistics = statistics_from_pairs(&pairs);

        let result = fit(&statistics).expect("fit should succeed");
        assert_eq!(result.quality, FitQuality::WellDetermined);
        assert!((result.p0 - 0.05).abs() <= 1.0e-9);
        assert!((result.p1 - 2.0).abs() <= 1.0e-9);
        assert!(result.chi2.abs() <= 1.0e-8);
        assert!(result.p0_error >= 0.0);
        assert!(result.p1_error >= 0.0);
    }

    #[test]
    fn uncertainties_scale_with_the_residual_chi_square() {
        let pairs = [(1.0, 2.0), (2.0, 4.3), (3.0, 5.8), (4.0, 8.2), (5.0, 9.9)];
        let statistics = statistics_from_pairs(&pairs);

        let result = fit(&statistics).expect("fit should succeed");
        assert_eq!(result.quality, FitQuality::WellDetermined);
        assert!(result.chi2 > 0.0);

        let n = statistics.n as f64;
        let delta = n * statistics.xx - statistics.x * statistics.x;
        let expected_p1_error = (n / delta).sqrt() * (result.chi2 / (n - 2.0)).sqrt();
        assert!((result.p1_error - expected_p1_error).abs() <= 1.0e-12);
    }

    #[test]
    fn combined_statistics_fit_like_the_pooled_observations() {
        let first = statistics_from_pairs(&[(1.0, 2.1), (2.0, 4.0), (3.0, 6.2)]);
        let second = statistics_from_pairs(&[(4.0, 8.1), (5.0, 10.0), (6.0, 12.3)]);
        let pooled = statistics_from_pairs(&[
            (1.0, 2.1),
            (2.0, 4.0),
            (3.0, 6.2),
            (4.0, 8.1),
            (5.0, 10.0),
            (6.0, 12.3),
        ]);

        let combined = fit(&SufficientStatistics::combined(&first, &second))
            .expect("combined fit should succeed");
        let direct = fit(&pooled).expect("pooled fit should succeed");

        assert_eq!(combined.n, direct.n);
        assert!((combined.p0 - direct.p0).abs() <= 1.0e-12);
        assert!((combined.p1 - direct.p1).abs() <= 1.0e-12);
        assert!((combined.chi2 - direct.chi2).abs() <= 1.0e-10);
    }

    #[test]
    fn negative_chi_square_is_fatal_only_above_two_observations() {
        // perfect line, then corrupt the squared-residual sum
        let mut corrupted = statistics_from_pairs(&[(1.0, 2.0), (2.0, 4.0), (3.0, 6.0)]);
        corrupted.yy -= 1.0;
        let error = fit(&corrupted).expect_err("corrupted sums should abort the cell");
        assert!(matches!(error, FitError::NegativeChiSquare { n: 3, .. }));

        let mut two_point = statistics_from_pairs(&[(1.0, 2.0), (2.0, 4.0)]);
        two_point.yy -= 1.0e-6;
        let result = fit(&two_point).expect("rounding noise at n=2 is tolerated");
        assert!(result.chi2_is_anomalous());
        assert_eq!(result.p0_error, ERROR_SENTINEL);
    }
}
