pub mod errors;

pub use errors::{CalError, CalResult};

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// One physical sensor readout position, identified by its string and the
/// module slot on that string. Stable for the lifetime of the array.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ChannelKey {
    pub string_id: u32,
    pub module_id: u32,
}

impl ChannelKey {
    pub const fn new(string_id: u32, module_id: u32) -> Self {
        Self {
            string_id,
            module_id,
        }
    }
}

impl Display for ChannelKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{})", self.string_id, self.module_id)
    }
}

/// One of the two independent digitization circuits reading the same analog
/// signal, plus their derived merge.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SubPath {
    A,
    B,
    Combined,
}

impl SubPath {
    /// Sub-paths that receive direct observations.
    pub const COLLECTED: [SubPath; 2] = [SubPath::A, SubPath::B];
    pub const ALL: [SubPath; 3] = [SubPath::A, SubPath::B, SubPath::Combined];
    pub const COLLECTED_COUNT: usize = 2;
    pub const COUNT: usize = 3;

    pub const fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
            Self::Combined => 2,
        }
    }

    pub const fn is_collected(self) -> bool {
        !matches!(self, Self::Combined)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::A => "a",
            Self::B => "b",
            Self::Combined => "combined",
        }
    }
}

impl Display for SubPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// One of the three gain stages of the digitizer, each covering a different
/// amplitude band of the input signal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SubRange {
    Low,
    Mid,
    High,
}

impl SubRange {
    pub const ALL: [SubRange; 3] = [SubRange::Low, SubRange::Mid, SubRange::High];
    pub const COUNT: usize = 3;

    pub const fn index(self) -> usize {
        match self {
            Self::Low => 0,
            Self::Mid => 1,
            Self::High => 2,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Mid => "mid",
            Self::High => "high",
        }
    }
}

impl Display for SubRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// Boundary between two adjacent gain ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeBoundary {
    LowMid,
    MidHigh,
}

impl RangeBoundary {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LowMid => "low-mid",
            Self::MidHigh => "mid-high",
        }
    }
}

impl Display for RangeBoundary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// Address of one calibration cell.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct CellKey {
    pub channel: ChannelKey,
    pub path: SubPath,
    pub range: SubRange,
}

impl Display for CellKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.channel, self.path, self.range)
    }
}

/// One paired charge reading delivered by the observation source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChargeObservation {
    pub channel: ChannelKey,
    pub path: SubPath,
    pub range: SubRange,
    pub slc_charge: f64,
    pub hlc_charge: f64,
}

/// Running sums sufficient for the least-squares fit of one calibration
/// cell: `x` is the SLC-side charge, `y` its paired HLC-side reading.
///
/// Mutable and append-only while the stream is consumed, frozen once
/// fitting begins.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SufficientStatistics {
    pub n: u64,
    pub x: f64,
    pub xx: f64,
    pub y: f64,
    pub yy: f64,
    pub xy: f64,
}

impl SufficientStatistics {
    /// Fold one paired observation into the sums.
    pub fn fold(&mut self, slc_charge: f64, hlc_charge: f64) {
        self.n += 1;
        self.x += slc_charge;
        self.xx += slc_charge * slc_charge;
        self.y += hlc_charge;
        self.yy += hlc_charge * hlc_charge;
        self.xy += slc_charge * hlc_charge;
    }

    /// Fold another cell's sums into this one (shard merge).
    pub fn merge(&mut self, other: &SufficientStatistics) {
        self.n += other.n;
        self.x += other.x;
        self.xx += other.xx;
        self.y += other.y;
        self.yy += other.yy;
        self.xy += other.xy;
    }

    /// Field-wise sum of two cells' statistics, used to derive the combined
    /// sub-path from the two collected sub-paths of the same sub-range.
    pub fn combined(lhs: &SufficientStatistics, rhs: &SufficientStatistics) -> Self {
        let mut combined = *lhs;
        combined.merge(rhs);
        combined
    }
}

/// Pooled raw charge pairs for one (channel, sub-range), both sub-paths
/// together: the crossover depends on the acquisition gain range, not on
/// which circuit captured the signal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPairBuffer {
    slc: Vec<f64>,
    hlc: Vec<f64>,
}

impl RawPairBuffer {
    pub fn from_pairs(pairs: impl IntoIterator<Item = (f64, f64)>) -> Self {
        let mut buffer = Self::default();
        for (slc_charge, hlc_charge) in pairs {
            buffer.push(slc_charge, hlc_charge);
        }
        buffer
    }

    pub fn push(&mut self, slc_charge: f64, hlc_charge: f64) {
        self.slc.push(slc_charge);
        self.hlc.push(hlc_charge);
    }

    pub fn extend_from(&mut self, other: &RawPairBuffer) {
        self.slc.extend_from_slice(&other.slc);
        self.hlc.extend_from_slice(&other.hlc);
    }

    pub fn len(&self) -> usize {
        self.slc.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slc.is_empty()
    }

    pub fn slc_values(&self) -> &[f64] {
        &self.slc
    }

    pub fn hlc_values(&self) -> &[f64] {
        &self.hlc
    }
}

/// How serious a diagnostic is for the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticSeverity {
    Warning,
    Error,
}

/// Structured data-quality finding, attributable to the channel or cell
/// that produced it. Non-fatal conditions degrade locally; these entries
/// are how the degradation is surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Fewer than two observations or a non-positive normal determinant;
    /// the cell's parameters were zeroed.
    DegenerateFit { cell: CellKey, n: u64 },
    /// Exactly two observations: parameters are valid but their
    /// uncertainties are sentineled.
    UnderdeterminedFit { cell: CellKey, n: u64 },
    /// Chi-square came out negative; rounding noise at this population.
    NegativeChiSquare { cell: CellKey, chi2: f64, n: u64 },
    /// The fit for this cell failed outright; its record slot is empty.
    FitFailed { cell: CellKey, message: String },
    /// Crossover requested with fewer than three populated sub-ranges on a
    /// channel that is not known-bad; result omitted.
    SparseCrossover {
        channel: ChannelKey,
        populated: [usize; SubRange::COUNT],
    },
    /// The weighted densities of the two adjacent sub-ranges never cross
    /// between their medians; the threshold is NaN.
    MissingIntersection {
        channel: ChannelKey,
        boundary: RangeBoundary,
    },
}

impl Diagnostic {
    pub fn severity(&self) -> DiagnosticSeverity {
        match self {
            Self::FitFailed { .. } => DiagnosticSeverity::Error,
            _ => DiagnosticSeverity::Warning,
        }
    }

    pub fn channel(&self) -> ChannelKey {
        match self {
            Self::DegenerateFit { cell, .. }
            | Self::UnderdeterminedFit { cell, .. }
            | Self::NegativeChiSquare { cell, .. }
            | Self::FitFailed { cell, .. } => cell.channel,
            Self::SparseCrossover { channel, .. }
            | Self::MissingIntersection { channel, .. } => *channel,
        }
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DegenerateFit { cell, n } => {
                write!(f, "cell {cell} has a degenerate fit (n={n})")
            }
            Self::UnderdeterminedFit { cell, n } => write!(
                f,
                "cell {cell} has n={n} observations; parameter uncertainties are undefined"
            ),
            Self::NegativeChiSquare { cell, chi2, n } => write!(
                f,
                "cell {cell} produced a negative chi-square {chi2} at n={n}"
            ),
            Self::FitFailed { cell, message } => {
                write!(f, "fit for cell {cell} failed: {message}")
            }
            Self::SparseCrossover { channel, populated } => write!(
                f,
                "channel {channel} has populated sub-range counts {populated:?}; crossover omitted"
            ),
            Self::MissingIntersection { channel, boundary } => write!(
                f,
                "channel {channel} has no density intersection at the {boundary} boundary"
            ),
        }
    }
}
