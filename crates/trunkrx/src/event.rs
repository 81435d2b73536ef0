//! Channel-state event vocabulary
//!
//! Every event which crosses the channel bus is one variant of
//! [`DecoderEvent`]. Decoder modules broadcast state transitions as
//! [`DecoderStateEvent`], higher-level activity as [`CallEvent`],
//! and bookkeeping as the remaining variants. Consumers match
//! exhaustively; there is no dynamic listener-interface dispatch.

use chrono::{DateTime, Utc};

use crate::channel::ChannelType;

/// Identity token for an event source within one channel
///
/// Obtained from
/// [`DecoderStateBus::register_source`](crate::bus::DecoderStateBus::register_source).
/// Lets a subscriber distinguish its own broadcasts from those of
/// its peers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SourceId(pub(crate) u32);

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "source-{}", self.0)
    }
}

/// Logical state of a decode channel
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelState {
    /// No activity
    Idle,

    /// Voice or data call in progress
    Call,

    /// Decoding a trunking control channel
    Control,

    /// Call has ended; channel is fading back to idle
    Fade,
}

impl AsRef<str> for ChannelState {
    fn as_ref(&self) -> &str {
        match self {
            ChannelState::Idle => "IDLE",
            ChannelState::Call => "CALL",
            ChannelState::Control => "CONTROL",
            ChannelState::Fade => "FADE",
        }
    }
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

/// What a [`DecoderStateEvent`] announces
#[derive(Clone, Debug, PartialEq)]
pub enum StateEventKind {
    /// Activity has started
    Start,

    /// Activity continues
    Continuation,

    /// Activity has ended
    End,

    /// Request that per-call channel state be cleared
    Reset,

    /// Request a full decoder reset
    RequestReset,

    /// The channel's tuned frequency, in Hz
    SourceFrequency(u64),

    /// A traffic channel has been allocated for the wrapped call
    TrafficChannelAllocation(CallEvent),
}

impl AsRef<str> for StateEventKind {
    fn as_ref(&self) -> &str {
        match self {
            StateEventKind::Start => "START",
            StateEventKind::Continuation => "CONTINUATION",
            StateEventKind::End => "END",
            StateEventKind::Reset => "RESET",
            StateEventKind::RequestReset => "REQUEST_RESET",
            StateEventKind::SourceFrequency(_) => "SOURCE_FREQUENCY",
            StateEventKind::TrafficChannelAllocation(_) => "TRAFFIC_CHANNEL_ALLOCATION",
        }
    }
}

/// A decoder state transition
#[derive(Clone, Debug, PartialEq)]
pub struct DecoderStateEvent {
    /// Who broadcast the event
    pub source: SourceId,

    /// What happened
    pub kind: StateEventKind,

    /// Logical channel state after the event
    pub state: ChannelState,
}

impl DecoderStateEvent {
    /// New state event
    pub fn new(source: SourceId, kind: StateEventKind, state: ChannelState) -> Self {
        Self {
            source,
            kind,
            state,
        }
    }
}

impl std::fmt::Display for DecoderStateEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{} from {}", self.kind.as_ref(), self.state, self.source)
    }
}

/// Category of decoded call activity
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallEventKind {
    /// Unit registration on the network
    Register,

    /// Acknowledgement response
    Response,

    /// Command directed at a unit
    Command,

    /// Status report
    Status,

    /// Voice call
    Call,

    /// Short data message
    Sdm,
}

impl AsRef<str> for CallEventKind {
    fn as_ref(&self) -> &str {
        match self {
            CallEventKind::Register => "REGISTER",
            CallEventKind::Response => "RESPONSE",
            CallEventKind::Command => "COMMAND",
            CallEventKind::Status => "STATUS",
            CallEventKind::Call => "CALL",
            CallEventKind::Sdm => "SDM",
        }
    }
}

impl std::fmt::Display for CallEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

/// A decoded call or call-like activity record
///
/// Construct with [`CallEvent::builder`]. The "current" call for a
/// decoder may be updated and re-broadcast; publishing it with
/// [`end()`](CallEvent::end) applied terminates it.
#[derive(Clone, Debug, PartialEq)]
pub struct CallEvent {
    kind: CallEventKind,
    channel: Option<String>,
    frequency: u64,
    from: Option<String>,
    to: Option<String>,
    details: Option<String>,
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
}

impl CallEvent {
    /// Start building a call event of the given kind
    pub fn builder(kind: CallEventKind) -> CallEventBuilder {
        CallEventBuilder {
            event: CallEvent {
                kind,
                channel: None,
                frequency: 0,
                from: None,
                to: None,
                details: None,
                start: Utc::now(),
                end: None,
            },
        }
    }

    /// Call category
    pub fn kind(&self) -> CallEventKind {
        self.kind
    }

    /// Channel label, if known
    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    /// Channel frequency in Hz, or 0 when unknown
    pub fn frequency(&self) -> u64 {
        self.frequency
    }

    /// Originating ident
    pub fn from(&self) -> Option<&str> {
        self.from.as_deref()
    }

    /// Destination ident
    pub fn to(&self) -> Option<&str> {
        self.to.as_deref()
    }

    /// Free-form detail string
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Call start time
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Call end time, if the call has ended
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end
    }

    /// Mark the call ended now
    pub fn end(&mut self) {
        self.end = Some(Utc::now());
    }

    /// True once [`end()`](CallEvent::end) has been applied
    pub fn is_ended(&self) -> bool {
        self.end.is_some()
    }
}

impl std::fmt::Display for CallEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(channel) = &self.channel {
            write!(f, " chan {}", channel)?;
        }
        if self.frequency > 0 {
            write!(f, " {} Hz", self.frequency)?;
        }
        if let Some(from) = &self.from {
            write!(f, " from {}", from)?;
        }
        if let Some(to) = &self.to {
            write!(f, " to {}", to)?;
        }
        if let Some(details) = &self.details {
            write!(f, ": {}", details)?;
        }
        Ok(())
    }
}

/// Builder for [`CallEvent`]
#[derive(Clone, Debug)]
pub struct CallEventBuilder {
    event: CallEvent,
}

impl CallEventBuilder {
    /// Channel label
    pub fn channel<S>(mut self, channel: S) -> Self
    where
        S: Into<String>,
    {
        self.event.channel = Some(channel.into());
        self
    }

    /// Channel frequency, in Hz
    pub fn frequency(mut self, frequency: u64) -> Self {
        self.event.frequency = frequency;
        self
    }

    /// Originating ident
    pub fn from<S>(mut self, from: S) -> Self
    where
        S: Into<String>,
    {
        self.event.from = Some(from.into());
        self
    }

    /// Destination ident
    pub fn to<S>(mut self, to: S) -> Self
    where
        S: Into<String>,
    {
        self.event.to = Some(to.into());
        self
    }

    /// Free-form detail string
    pub fn details<S>(mut self, details: S) -> Self
    where
        S: Into<String>,
    {
        self.event.details = Some(details.into());
        self
    }

    /// Finish the call event
    pub fn build(self) -> CallEvent {
        self.event
    }
}

/// Channel attribute whose value changed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangedAttribute {
    /// Current channel number
    ChannelNumber,

    /// Site identifier
    ChannelSiteNumber,

    /// Originating talkgroup
    FromTalkgroup,

    /// Destination talkgroup
    ToTalkgroup,

    /// Source frequency
    Source,
}

/// Instructs the host to adjust its call-fade timer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChangeChannelTimeoutEvent {
    /// Who requested the change
    pub source: SourceId,

    /// Channel role the timeout applies to
    pub channel_type: ChannelType,

    /// New timeout, in milliseconds
    pub timeout_ms: u64,
}

/// Kind of a metadata record
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetadataType {
    /// Originating ident
    From,

    /// Destination ident
    To,
}

/// A metadata record for the audio/display path
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Metadata {
    /// What the value identifies
    pub metadata_type: MetadataType,

    /// Identifier value
    pub value: String,

    /// True while the activity is ongoing
    pub live: bool,
}

/// Any event carried on the channel bus
#[derive(Clone, Debug, PartialEq)]
pub enum DecoderEvent {
    /// Decoder state transition
    State(DecoderStateEvent),

    /// Call activity record
    Call(CallEvent),

    /// Call-fade timer adjustment
    ChannelTimeout(ChangeChannelTimeoutEvent),

    /// A channel attribute changed
    Attribute {
        /// Who changed it
        source: SourceId,
        /// Which attribute
        attribute: ChangedAttribute,
    },

    /// Metadata record
    Metadata(Metadata),
}

impl std::fmt::Display for DecoderEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecoderEvent::State(event) => write!(f, "state: {}", event),
            DecoderEvent::Call(event) => write!(f, "call: {}", event),
            DecoderEvent::ChannelTimeout(event) => write!(
                f,
                "timeout: {} channel {} ms",
                event.channel_type, event.timeout_ms
            ),
            DecoderEvent::Attribute { source, attribute } => {
                write!(f, "attribute: {:?} from {}", attribute, source)
            }
            DecoderEvent::Metadata(metadata) => write!(
                f,
                "metadata: {:?} = {} (live: {})",
                metadata.metadata_type, metadata.value, metadata.live
            ),
        }
    }
}

/// Notification from the upstream tuner/sample source
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SourceEvent {
    /// The source's sample rate changed
    SampleRateChange {
        /// New rate, in Hz
        sample_rate: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_event_builder() {
        let mut event = CallEvent::builder(CallEventKind::Call)
            .channel("7")
            .frequency(154_875_000)
            .from("100")
            .to("200")
            .details("GTC")
            .build();

        assert_eq!(CallEventKind::Call, event.kind());
        assert_eq!(Some("7"), event.channel());
        assert_eq!(154_875_000, event.frequency());
        assert_eq!(Some("100"), event.from());
        assert_eq!(Some("200"), event.to());
        assert_eq!(Some("GTC"), event.details());
        assert!(!event.is_ended());

        event.end();
        assert!(event.is_ended());
        assert!(event.end_time().unwrap() >= event.start());
    }

    #[test]
    fn test_display() {
        let event = CallEvent::builder(CallEventKind::Register)
            .channel("0")
            .from("200")
            .to("100")
            .details("REGISTERED ON NETWORK")
            .build();
        let text = format!("{}", event);
        assert!(text.contains("REGISTER"));
        assert!(text.contains("REGISTERED ON NETWORK"));

        let state = DecoderStateEvent::new(
            SourceId(3),
            StateEventKind::Continuation,
            ChannelState::Control,
        );
        assert_eq!("CONTINUATION/CONTROL from source-3", format!("{}", state));
    }
}
