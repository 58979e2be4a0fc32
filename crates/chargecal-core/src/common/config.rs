//! Run configuration: the registered detector geometry and channel
//! policies. The geometry is always injected by the caller so the engine
//! stays decoupled from any particular array layout.

use crate::domain::ChannelKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ops::RangeInclusive;

/// The channel identities pre-registered with empty aggregates at the
/// start of a run, so "zero observations" is distinguishable from "never
/// part of the array".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    channels: BTreeSet<ChannelKey>,
}

impl Geometry {
    pub fn from_channels(channels: impl IntoIterator<Item = ChannelKey>) -> Self {
        Self {
            channels: channels.into_iter().collect(),
        }
    }

    /// Rectangular string x module grid, both ranges inclusive.
    pub fn grid(strings: RangeInclusive<u32>, modules: RangeInclusive<u32>) -> Self {
        let mut channels = BTreeSet::new();
        for string_id in strings {
            for module_id in modules.clone() {
                channels.insert(ChannelKey::new(string_id, module_id));
            }
        }
        Self { channels }
    }

    pub fn contains(&self, channel: ChannelKey) -> bool {
        self.channels.contains(&channel)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ChannelKey> + '_ {
        self.channels.iter().copied()
    }
}

/// How the collector treats an observation for a channel outside the
/// registered geometry. Either way the aggregates of other channels are
/// untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownChannelPolicy {
    /// Refuse the observation with an unknown-channel error.
    #[default]
    Reject,
    /// Register the channel with empty aggregates and accept it.
    RegisterLazily,
}

/// Caller-supplied settings for one calibration run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    pub unknown_channels: UnknownChannelPolicy,
    /// Channels known to be non-functional. A bad-listed channel skips the
    /// crossover computation only when its sub-ranges are not all
    /// populated; full population always wins.
    pub bad_channels: BTreeSet<ChannelKey>,
}
