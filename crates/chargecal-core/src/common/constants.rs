//! Fixed reference binning of the log-charge axis.
//!
//! The crossover solver rescales each sub-range's density estimate to an
//! approximate count-per-bin curve using this binning, so differently
//! populated sub-ranges stay comparable at their intersection. The binning
//! is part of the produced calibration's compatibility surface: changing it
//! moves every crossover threshold relative to prior calibration epochs.

/// Lower edge of the reference log10-charge histogram.
pub const LOG_CHARGE_MIN: f64 = -1.0;

/// Upper edge of the reference log10-charge histogram.
pub const LOG_CHARGE_MAX: f64 = 6.0;

/// Number of edges of the reference histogram (70 bins).
pub const LOG_CHARGE_EDGE_COUNT: usize = 71;

/// Width of one reference bin in log10-charge units.
pub const LOG_CHARGE_BIN_WIDTH: f64 =
    (LOG_CHARGE_MAX - LOG_CHARGE_MIN) / (LOG_CHARGE_EDGE_COUNT as f64 - 1.0);
