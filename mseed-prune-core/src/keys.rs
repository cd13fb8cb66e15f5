//! The (network, station, location, channel) identifier and its extension
//! into a per-trace key used for grouping and sorting.
use std::fmt;

use crate::quality::Quality;

/// The (network, station, location, channel) identifier for a channel.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChannelKey {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
}

impl ChannelKey {
    pub fn new(
        network: impl Into<String>,
        station: impl Into<String>,
        location: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        ChannelKey {
            network: network.into(),
            station: station.into(),
            location: location.into(),
            channel: channel.into(),
        }
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}",
            self.network, self.station, self.location, self.channel
        )
    }
}

/// A [`ChannelKey`] extended with the nominal sample rate (and, in
/// quality-sensitive mode, the data-quality code) that together identify
/// one logical [`crate::trace::Trace`].
///
/// Sample rate is not part of [`Eq`]/[`Hash`]: two keys are compared for
/// grouping purposes with [`TraceKey::matches`], which applies a rate
/// tolerance, not bit-for-bit equality.
#[derive(Debug, Clone)]
pub struct TraceKey {
    pub channel: ChannelKey,
    pub sample_rate: f64,
    pub quality: Option<Quality>,
}

impl TraceKey {
    pub fn new(channel: ChannelKey, sample_rate: f64, quality: Option<Quality>) -> Self {
        TraceKey {
            channel,
            sample_rate,
            quality,
        }
    }

    /// Whether `self` and `other` describe the same logical trace, given a
    /// sample-rate tolerance in Hz.
    pub fn matches(&self, other: &TraceKey, rate_tolerance: f64) -> bool {
        self.channel == other.channel
            && (self.sample_rate - other.sample_rate).abs() <= rate_tolerance
            && self.quality == other.quality
    }

    /// The key string used for regex matching: `NET_STA_LOC_CHAN_QUAL`.
    pub fn match_string(&self) -> String {
        match self.quality {
            Some(q) => format!("{}_{}", self.channel, q),
            None => self.channel.to_string(),
        }
    }
}

impl fmt::Display for TraceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}Hz", self.channel, self.sample_rate)
    }
}
