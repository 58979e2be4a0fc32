use super::{ChannelKey, SubPath};

pub type CalResult<T> = Result<T, CalError>;

/// Errors raised while folding observations into the collector. Everything
/// that degrades to a sentinel, a NaN, or an omitted result is data, not an
/// error; only conditions that would corrupt an aggregate land here.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalError {
    #[error("channel {channel} is outside the registered geometry")]
    UnknownChannel { channel: ChannelKey },
    #[error(
        "sub-path '{path}' is derived, not collected; only the two digitization sub-paths accept charge pairs"
    )]
    CombinedPathObservation { path: SubPath },
    #[error(
        "charge pair (slc={slc_charge}, hlc={hlc_charge}) for channel {channel} must be finite and non-negative"
    )]
    InvalidCharge {
        channel: ChannelKey,
        slc_charge: f64,
        hlc_charge: f64,
    },
    #[error(
        "collector shards disagree on the registered geometry: {left} channels here, {right} in the shard"
    )]
    ShardGeometryMismatch { left: usize, right: usize },
}
