//! JSONL observation and result record shapes.

use chargecal_core::{ChannelKey, ChargeObservation, SubPath, SubRange};
use serde::{Deserialize, Serialize};

/// One observation line of the input stream. `time` is an optional event
/// timestamp (MJD) used only to stamp the run's recording window into the
/// output.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub(super) struct ObservationRecord {
    pub string: u32,
    pub module: u32,
    pub path: u8,
    pub range: u8,
    pub slc_charge: f64,
    pub hlc_charge: f64,
    #[serde(default)]
    pub time: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub(super) enum RecordError {
    #[error("sub-path index {0} is not 0 or 1")]
    SubPath(u8),
    #[error("sub-range index {0} is not 0, 1 or 2")]
    SubRange(u8),
}

impl ObservationRecord {
    pub fn to_observation(self) -> Result<ChargeObservation, RecordError> {
        Ok(ChargeObservation {
            channel: ChannelKey::new(self.string, self.module),
            path: sub_path_from_index(self.path)?,
            range: sub_range_from_index(self.range)?,
            slc_charge: self.slc_charge,
            hlc_charge: self.hlc_charge,
        })
    }
}

fn sub_path_from_index(index: u8) -> Result<SubPath, RecordError> {
    match index {
        0 => Ok(SubPath::A),
        1 => Ok(SubPath::B),
        other => Err(RecordError::SubPath(other)),
    }
}

fn sub_range_from_index(index: u8) -> Result<SubRange, RecordError> {
    match index {
        0 => Ok(SubRange::Low),
        1 => Ok(SubRange::Mid),
        2 => Ok(SubRange::High),
        other => Err(RecordError::SubRange(other)),
    }
}

pub(super) fn path_index(path: SubPath) -> u8 {
    path.index() as u8
}

pub(super) fn range_index(range: SubRange) -> u8 {
    range.index() as u8
}

/// Sentinel written for a missing, inapplicable or uncrossed threshold.
pub(super) const CROSSOVER_SENTINEL: f64 = -1.0;

/// One monitoring-style output line per calibration cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub(super) struct ResultRecord {
    pub varname: &'static str,
    pub string: u32,
    pub module: u32,
    pub path: u8,
    pub range: u8,
    pub run_number: u64,
    pub recording_start_time: Option<f64>,
    pub recording_stop_time: Option<f64>,
    pub result: CellResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub(super) struct CellResult {
    pub n: u64,
    pub p0: f64,
    pub p1: f64,
    pub p0_error: f64,
    pub p1_error: f64,
    pub chi2: f64,
    pub sum_x: f64,
    pub sum_xx: f64,
    pub sum_xy: f64,
    pub sum_y: f64,
    pub sum_yy: f64,
    pub crossover: f64,
}
