//! Charge calibration engine for dual-readout sensor arrays.
//!
//! Accumulates paired HLC/SLC charge observations per readout channel,
//! fits the linear relationship between the two digitizations in closed
//! form with propagated uncertainties, and locates the charge thresholds
//! at which the acquisition switches gain ranges from the marginal charge
//! distributions. The library is the batch core; reading observation
//! streams and persisting results belong to the surrounding tooling.

pub mod common;
pub mod domain;
pub mod modules;
pub mod numerics;

pub use common::config::{CalibrationConfig, Geometry, UnknownChannelPolicy};
pub use domain::{
    CalError, CalResult, CellKey, ChannelKey, ChargeObservation, Diagnostic, DiagnosticSeverity,
    RangeBoundary, RawPairBuffer, SubPath, SubRange, SufficientStatistics,
};
pub use modules::collector::{ChannelAggregates, ChargePairCollector};
pub use modules::crossover::{solve, CrossoverOutcome, CrossoverResult};
pub use modules::engine::{run_calibration, CalibrationOutput};
pub use modules::fitter::{fit, FitError, FitQuality, FitResult, ERROR_SENTINEL};
pub use modules::record::{CalibrationRecord, CalibrationSet};
