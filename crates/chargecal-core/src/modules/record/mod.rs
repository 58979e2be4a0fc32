//! Assembled calibration results for downstream consumers.
//!
//! Pure aggregation: no computation happens here. Serialization adapters
//! read these records through the keyed accessors.

use crate::domain::{ChannelKey, SubPath, SubRange};
use crate::modules::crossover::CrossoverResult;
use crate::modules::fitter::FitResult;
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-channel calibration: one fit slot per sub-path x sub-range plus
/// the channel's crossover thresholds. A slot stays empty when its fit
/// failed; the crossover stays empty when it was excluded or omitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationRecord {
    channel: ChannelKey,
    fits: [[Option<FitResult>; SubRange::COUNT]; SubPath::COUNT],
    crossover: Option<CrossoverResult>,
}

impl CalibrationRecord {
    pub(crate) fn new(channel: ChannelKey) -> Self {
        Self {
            channel,
            fits: Default::default(),
            crossover: None,
        }
    }

    pub(crate) fn set_fit(&mut self, path: SubPath, range: SubRange, fit: FitResult) {
        self.fits[path.index()][range.index()] = Some(fit);
    }

    pub(crate) fn set_crossover(&mut self, crossover: CrossoverResult) {
        self.crossover = Some(crossover);
    }

    pub fn channel(&self) -> ChannelKey {
        self.channel
    }

    pub fn fit(&self, path: SubPath, range: SubRange) -> Option<&FitResult> {
        self.fits[path.index()][range.index()].as_ref()
    }

    pub fn crossover(&self) -> Option<&CrossoverResult> {
        self.crossover.as_ref()
    }

    /// All populated fit slots in sub-path-major order.
    pub fn fits(&self) -> impl Iterator<Item = (SubPath, SubRange, &FitResult)> {
        SubPath::ALL.into_iter().flat_map(move |path| {
            SubRange::ALL.into_iter().filter_map(move |range| {
                self.fit(path, range).map(|fit| (path, range, fit))
            })
        })
    }
}

/// All channels' calibration records for one run, keyed by channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationSet {
    records: BTreeMap<ChannelKey, CalibrationRecord>,
}

impl CalibrationSet {
    pub(crate) fn insert(&mut self, record: CalibrationRecord) {
        self.records.insert(record.channel(), record);
    }

    pub fn get(&self, channel: ChannelKey) -> Option<&CalibrationRecord> {
        self.records.get(&channel)
    }

    pub fn fit(
        &self,
        channel: ChannelKey,
        path: SubPath,
        range: SubRange,
    ) -> Option<&FitResult> {
        self.records
            .get(&channel)
            .and_then(|record| record.fit(path, range))
    }

    pub fn iter(&self) -> impl Iterator<Item = &CalibrationRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
