//! Channel descriptors and the channel-number → frequency map

/// Role a decode channel plays in the trunked system
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelType {
    /// A fixed channel, usually the control channel
    Standard,

    /// A dynamically-allocated voice channel
    Traffic,
}

impl AsRef<str> for ChannelType {
    fn as_ref(&self) -> &str {
        match self {
            ChannelType::Standard => "STANDARD",
            ChannelType::Traffic => "TRAFFIC",
        }
    }
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

/// One contiguous run of channel numbers at a fixed spacing
///
/// Channel `n` within `[first, last]` maps to
/// `base_hz + (n − first) · step_hz`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelRange {
    first: u16,
    last: u16,
    base_hz: u64,
    step_hz: u64,
}

impl ChannelRange {
    /// New channel range
    ///
    /// `first` and `last` are inclusive channel numbers; `base_hz`
    /// is the frequency of channel `first` and `step_hz` the spacing
    /// between adjacent channels.
    pub fn new(first: u16, last: u16, base_hz: u64, step_hz: u64) -> Self {
        Self {
            first: first.min(last),
            last: last.max(first),
            base_hz,
            step_hz,
        }
    }

    /// True if `channel` falls within this range
    pub fn contains(&self, channel: u16) -> bool {
        (self.first..=self.last).contains(&channel)
    }

    /// Frequency of `channel`, which must be within this range
    fn frequency(&self, channel: u16) -> u64 {
        self.base_hz + (channel - self.first) as u64 * self.step_hz
    }
}

/// Pure mapping from channel number to frequency
///
/// Built from an ordered list of [`ChannelRange`]s. The first range
/// containing a channel number wins. No component in the decode path
/// mutates a channel map once built.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelMap {
    name: String,
    ranges: Vec<ChannelRange>,
}

impl ChannelMap {
    /// New, empty channel map
    pub fn new<S>(name: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            name: name.into(),
            ranges: Vec::new(),
        }
    }

    /// Append a channel range
    pub fn with_range(mut self, range: ChannelRange) -> Self {
        self.ranges.push(range);
        self
    }

    /// Map name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Frequency for `channel`, in Hz
    ///
    /// Returns 0 when no range covers the channel number.
    pub fn frequency(&self, channel: u16) -> u64 {
        self.ranges
            .iter()
            .find(|range| range.contains(channel))
            .map(|range| range.frequency(channel))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_frequency() {
        let map = ChannelMap::new("test")
            .with_range(ChannelRange::new(1, 100, 154_800_000, 12_500))
            .with_range(ChannelRange::new(200, 250, 460_000_000, 25_000));

        assert_eq!(154_800_000, map.frequency(1));
        assert_eq!(154_875_000, map.frequency(7));
        assert_eq!(460_025_000, map.frequency(201));
    }

    #[test]
    fn test_absent_channel_is_zero() {
        let map = ChannelMap::new("sparse").with_range(ChannelRange::new(10, 20, 100_000_000, 12_500));

        assert_eq!(0, map.frequency(9));
        assert_eq!(0, map.frequency(21));
        assert_eq!(0, ChannelMap::default().frequency(1));
    }

    #[test]
    fn test_first_matching_range_wins() {
        let map = ChannelMap::new("overlap")
            .with_range(ChannelRange::new(1, 50, 100_000_000, 12_500))
            .with_range(ChannelRange::new(40, 60, 200_000_000, 12_500));

        assert_eq!(100_487_500, map.frequency(40));
    }
}
