//! Streaming accumulation of paired charge observations.
//!
//! Every registered channel starts with empty aggregates, so a channel
//! that never appears in the stream still yields zero-count cells instead
//! of being indistinguishable from one outside the array. Updates are
//! purely additive; folding the same observations in any order, or split
//! across any partition of input sources, produces the same aggregates up
//! to floating-point rounding.

use crate::common::config::{Geometry, UnknownChannelPolicy};
use crate::domain::{
    CalError, CalResult, ChannelKey, ChargeObservation, RawPairBuffer, SubPath, SubRange,
    SufficientStatistics,
};
use std::collections::BTreeMap;

/// Per-channel aggregates: one sufficient-statistics cell per collected
/// sub-path x sub-range, and one pooled raw-pair buffer per sub-range.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelAggregates {
    sums: [[SufficientStatistics; SubRange::COUNT]; SubPath::COLLECTED_COUNT],
    pairs: [RawPairBuffer; SubRange::COUNT],
}

impl ChannelAggregates {
    /// Sums for one collected sub-path cell; `None` for the derived
    /// combined sub-path, which has no stored statistics of its own.
    pub fn statistics(&self, path: SubPath, range: SubRange) -> Option<&SufficientStatistics> {
        if !path.is_collected() {
            return None;
        }
        Some(&self.sums[path.index()][range.index()])
    }

    /// Both collected sub-paths' sums for one sub-range.
    pub fn path_statistics(
        &self,
        range: SubRange,
    ) -> (&SufficientStatistics, &SufficientStatistics) {
        (
            &self.sums[SubPath::A.index()][range.index()],
            &self.sums[SubPath::B.index()][range.index()],
        )
    }

    pub fn pairs(&self, range: SubRange) -> &RawPairBuffer {
        &self.pairs[range.index()]
    }

    pub fn pair_buffers(&self) -> &[RawPairBuffer; SubRange::COUNT] {
        &self.pairs
    }

    fn fold(&mut self, path: SubPath, range: SubRange, slc_charge: f64, hlc_charge: f64) {
        self.sums[path.index()][range.index()].fold(slc_charge, hlc_charge);
        self.pairs[range.index()].push(slc_charge, hlc_charge);
    }

    fn merge(&mut self, other: &ChannelAggregates) {
        for path_index in 0..SubPath::COLLECTED_COUNT {
            for range_index in 0..SubRange::COUNT {
                self.sums[path_index][range_index].merge(&other.sums[path_index][range_index]);
            }
        }
        for range_index in 0..SubRange::COUNT {
            self.pairs[range_index].extend_from(&other.pairs[range_index]);
        }
    }
}

/// Collects the full observation stream for one calibration run.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargePairCollector {
    channels: BTreeMap<ChannelKey, ChannelAggregates>,
    unknown_channels: UnknownChannelPolicy,
}

impl ChargePairCollector {
    pub fn new(geometry: &Geometry, unknown_channels: UnknownChannelPolicy) -> Self {
        let channels = geometry
            .iter()
            .map(|channel| (channel, ChannelAggregates::default()))
            .collect();
        Self {
            channels,
            unknown_channels,
        }
    }

    /// Fold one paired observation into the aggregates of its cell.
    ///
    /// Only the two collected sub-paths accept observations, and both
    /// charges must be finite and non-negative. A channel outside the
    /// registered set is refused or registered on the spot, per the
    /// configured policy.
    pub fn observe(&mut self, observation: &ChargeObservation) -> CalResult<()> {
        let ChargeObservation {
            channel,
            path,
            range,
            slc_charge,
            hlc_charge,
        } = *observation;

        if !path.is_collected() {
            return Err(CalError::CombinedPathObservation { path });
        }
        if !slc_charge.is_finite() || !hlc_charge.is_finite() || slc_charge < 0.0 || hlc_charge < 0.0
        {
            return Err(CalError::InvalidCharge {
                channel,
                slc_charge,
                hlc_charge,
            });
        }

        if !self.channels.contains_key(&channel) {
            if self.unknown_channels == UnknownChannelPolicy::Reject {
                return Err(CalError::UnknownChannel { channel });
            }
            self.channels.insert(channel, ChannelAggregates::default());
        }
        let aggregates = self
            .channels
            .get_mut(&channel)
            .ok_or(CalError::UnknownChannel { channel })?;
        aggregates.fold(path, range, slc_charge, hlc_charge);
        Ok(())
    }

    /// Fold a shard collected independently (one per input source or
    /// worker) into this collector: statistics merge field-wise and raw
    /// buffers concatenate.
    ///
    /// Under the reject policy both shards must have been built from the
    /// same geometry; under lazy registration the channel sets union.
    pub fn merge(&mut self, shard: &ChargePairCollector) -> CalResult<()> {
        if self.unknown_channels == UnknownChannelPolicy::Reject {
            let matching = self.channels.len() == shard.channels.len()
                && shard
                    .channels
                    .keys()
                    .all(|channel| self.channels.contains_key(channel));
            if !matching {
                return Err(CalError::ShardGeometryMismatch {
                    left: self.channels.len(),
                    right: shard.channels.len(),
                });
            }
        }

        for (channel, aggregates) in &shard.channels {
            self.channels
                .entry(*channel)
                .or_default()
                .merge(aggregates);
        }
        Ok(())
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channels(&self) -> impl Iterator<Item = (&ChannelKey, &ChannelAggregates)> {
        self.channels.iter()
    }

    pub fn aggregates(&self, channel: ChannelKey) -> Option<&ChannelAggregates> {
        self.channels.get(&channel)
    }

    pub fn statistics(
        &self,
        channel: ChannelKey,
        path: SubPath,
        range: SubRange,
    ) -> Option<&SufficientStatistics> {
        self.channels
            .get(&channel)
            .and_then(|aggregates| aggregates.statistics(path, range))
    }
}
