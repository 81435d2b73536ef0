//! MPT-1327 message model
//!
//! Decoded control-channel codewords arrive as [`Mpt1327Message`]
//! values. Bit-level framing and error correction happen upstream;
//! this module models the decoded fields the trunking state machine
//! consumes. Messages are assembled with
//! [`Mpt1327MessageBuilder`].

use std::fmt;
use std::str::FromStr;

use strum::EnumMessage;

/// MPT-1327 message type
///
/// Message types may be converted `from()` their signalling
/// mnemonics. `as_ref()` yields the mnemonic; `Display` shows a
/// human-readable description.
///
/// ```
/// use trunkrx::MessageType;
///
/// let gtc = MessageType::from("GTC");
/// assert_eq!(MessageType::Gtc, gtc);
/// assert_eq!("GTC", gtc.as_ref());
/// assert_eq!("Go to traffic channel", &format!("{}", gtc));
///
/// assert_eq!(MessageType::Unknown, MessageType::from("???"));
/// ```
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, strum_macros::EnumMessage, strum_macros::EnumString,
)]
pub enum MessageType {
    /// An unrecognized codeword
    #[strum(serialize = "UNKN", detailed_message = "Unknown message")]
    Unknown,

    /// Acknowledgement
    #[strum(serialize = "ACK", detailed_message = "Acknowledge")]
    Ack,

    /// Acknowledgement, more to follow
    #[strum(serialize = "ACKI", detailed_message = "Acknowledge, more to follow")]
    Acki,

    /// Acknowledgement of a queued request
    #[strum(serialize = "ACKQ", detailed_message = "Acknowledge, message queued")]
    Ackq,

    /// Acknowledgement, called unit not available
    #[strum(serialize = "ACKX", detailed_message = "Acknowledge, message rejected")]
    Ackx,

    /// Ahoy: general availability check
    #[strum(serialize = "AHY", detailed_message = "Ahoy")]
    Ahy,

    /// Ahoy: short data invitation command
    #[strum(serialize = "AHYC", detailed_message = "Ahoy command")]
    Ahyc,

    /// Ahoy: status query
    #[strum(serialize = "AHYQ", detailed_message = "Ahoy status")]
    Ahyq,

    /// Aloha invitation from the control channel
    #[strum(serialize = "ALH", detailed_message = "Aloha")]
    Alh,

    /// Aloha, registration requests only
    #[strum(serialize = "ALHR", detailed_message = "Aloha, registration only")]
    Alhr,

    /// Aloha, emergency requests only
    #[strum(serialize = "ALHE", detailed_message = "Aloha, emergency only")]
    Alhe,

    /// Go to traffic channel
    #[strum(serialize = "GTC", detailed_message = "Go to traffic channel")]
    Gtc,

    /// Short data message header, one appended codeword
    #[strum(serialize = "HEAD+1", detailed_message = "Short data message +1")]
    HeadPlus1,

    /// Short data message header, two appended codewords
    #[strum(serialize = "HEAD+2", detailed_message = "Short data message +2")]
    HeadPlus2,

    /// Short data message header, three appended codewords
    #[strum(serialize = "HEAD+3", detailed_message = "Short data message +3")]
    HeadPlus3,

    /// Short data message header, four appended codewords
    #[strum(serialize = "HEAD+4", detailed_message = "Short data message +4")]
    HeadPlus4,

    /// Clear-down of a traffic channel
    #[strum(serialize = "CLEAR", detailed_message = "Clear traffic channel")]
    Clear,

    /// Traffic channel maintenance
    #[strum(serialize = "MAINT", detailed_message = "Call maintenance")]
    Maint,

    /// Control channel marker
    #[strum(serialize = "MARK", detailed_message = "Control channel marker")]
    Mark,

    /// Instruction to move to another control channel
    #[strum(serialize = "MOVE", detailed_message = "Move control channel")]
    Move,

    /// Broadcast of system parameters
    #[strum(serialize = "BCAST", detailed_message = "System broadcast")]
    Bcast,
}

impl MessageType {
    /// Signalling mnemonic for this message type
    pub fn as_str(&self) -> &'static str {
        self.get_serializations()[0]
    }

    /// Human-readable description
    pub fn as_display_str(&self) -> &'static str {
        self.get_detailed_message().expect("missing definition")
    }
}

impl MessageType {
    /// Build a message type from its signalling mnemonic, falling
    /// back to [`MessageType::Unknown`] for unrecognized input.
    pub fn from(s: &str) -> MessageType {
        MessageType::from_str(s).unwrap_or(MessageType::Unknown)
    }
}

impl AsRef<str> for MessageType {
    fn as_ref(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_display_str().fmt(f)
    }
}

/// Category of the first address ident in a message
///
/// ```
/// use trunkrx::IdentType;
///
/// let regi = IdentType::from("REGI");
/// assert_eq!(IdentType::Regi, regi);
/// assert_eq!("Registration", regi.label());
/// ```
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, strum_macros::EnumMessage, strum_macros::EnumString,
)]
pub enum IdentType {
    /// An unrecognized ident category
    #[strum(serialize = "UNKN", detailed_message = "Unknown")]
    Unknown,

    /// All-call ident
    #[strum(serialize = "ALLI", detailed_message = "All Radios")]
    Alli,

    /// Divert handling ident
    #[strum(serialize = "DIVERTI", detailed_message = "Call Divert")]
    Diverti,

    /// Dummy placeholder ident
    #[strum(serialize = "DUMMYI", detailed_message = "Dummy")]
    Dummyi,

    /// Include-in-call ident
    #[strum(serialize = "INCI", detailed_message = "Include in Call")]
    Inci,

    /// Inter-prefix ident
    #[strum(serialize = "IPFIXI", detailed_message = "Interprefix")]
    Ipfixi,

    /// PABX gateway ident
    #[strum(serialize = "PABXI", detailed_message = "PABX Gateway")]
    Pabxi,

    /// PSTN gateway ident
    #[strum(serialize = "PSTNGI", detailed_message = "PSTN Gateway")]
    Pstngi,

    /// Registration ident
    #[strum(serialize = "REGI", detailed_message = "Registration")]
    Regi,

    /// Short data message ident
    #[strum(serialize = "SDMI", detailed_message = "Short Data Message")]
    Sdmi,

    /// Trunking system controller ident
    #[strum(serialize = "TSCI", detailed_message = "System Controller")]
    Tsci,
}

impl IdentType {
    /// Signalling mnemonic
    pub fn as_str(&self) -> &'static str {
        self.get_serializations()[0]
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        self.get_detailed_message().expect("missing definition")
    }
}

impl IdentType {
    /// Build an ident type from its signalling mnemonic, falling
    /// back to [`IdentType::Unknown`] for unrecognized input.
    pub fn from(s: &str) -> IdentType {
        IdentType::from_str(s).unwrap_or(IdentType::Unknown)
    }
}

impl AsRef<str> for IdentType {
    fn as_ref(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for IdentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.label().fmt(f)
    }
}

/// A decoded MPT-1327 control-channel message
///
/// Only messages whose validity flag is set are accepted by the
/// decoder state; invalid messages are dropped silently.
#[derive(Clone, Debug, PartialEq)]
pub struct Mpt1327Message {
    valid: bool,
    message_type: MessageType,
    from_id: Option<String>,
    to_id: Option<String>,
    ident1_type: Option<IdentType>,
    channel: u16,
    site_id: Option<String>,
    status_message: Option<String>,
    request_string: Option<String>,
    free_text: Option<String>,
}

impl Mpt1327Message {
    /// Start building a message of the given type
    pub fn builder(message_type: MessageType) -> Mpt1327MessageBuilder {
        Mpt1327MessageBuilder {
            message: Mpt1327Message {
                valid: true,
                message_type,
                from_id: None,
                to_id: None,
                ident1_type: None,
                channel: 0,
                site_id: None,
                status_message: None,
                request_string: None,
                free_text: None,
            },
        }
    }

    /// True if the message passed upstream error checks
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Message type
    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    /// Originating ident
    pub fn from_id(&self) -> Option<&str> {
        self.from_id.as_deref()
    }

    /// Destination ident
    pub fn to_id(&self) -> Option<&str> {
        self.to_id.as_deref()
    }

    /// Category of the first address ident
    pub fn ident1_type(&self) -> Option<IdentType> {
        self.ident1_type
    }

    /// Channel number carried by GTC and CLEAR messages
    pub fn channel(&self) -> u16 {
        self.channel
    }

    /// Site identifier carried by aloha messages
    pub fn site_id(&self) -> Option<&str> {
        self.site_id.as_deref()
    }

    /// Status text carried by AHYQ messages
    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    /// Request text carried by AHYC messages
    pub fn request_string(&self) -> Option<&str> {
        self.request_string.as_deref()
    }

    /// Free text carried by short data messages
    pub fn free_text(&self) -> Option<&str> {
        self.free_text.as_deref()
    }
}

impl fmt::Display for Mpt1327Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message_type.as_str())?;
        if let Some(from) = &self.from_id {
            write!(f, " from {}", from)?;
        }
        if let Some(to) = &self.to_id {
            write!(f, " to {}", to)?;
        }
        if self.channel > 0 {
            write!(f, " chan {}", self.channel)?;
        }
        if !self.valid {
            write!(f, " (invalid)")?;
        }
        Ok(())
    }
}

/// Builder for [`Mpt1327Message`]
#[derive(Clone, Debug)]
pub struct Mpt1327MessageBuilder {
    message: Mpt1327Message,
}

impl Mpt1327MessageBuilder {
    /// Originating ident
    pub fn from<S>(mut self, from: S) -> Self
    where
        S: Into<String>,
    {
        self.message.from_id = Some(from.into());
        self
    }

    /// Destination ident
    pub fn to<S>(mut self, to: S) -> Self
    where
        S: Into<String>,
    {
        self.message.to_id = Some(to.into());
        self
    }

    /// Category of the first address ident
    pub fn ident1_type(mut self, ident_type: IdentType) -> Self {
        self.message.ident1_type = Some(ident_type);
        self
    }

    /// Channel number (GTC, CLEAR)
    pub fn channel(mut self, channel: u16) -> Self {
        self.message.channel = channel;
        self
    }

    /// Site identifier (aloha messages)
    pub fn site<S>(mut self, site: S) -> Self
    where
        S: Into<String>,
    {
        self.message.site_id = Some(site.into());
        self
    }

    /// Status text (AHYQ)
    pub fn status_message<S>(mut self, status: S) -> Self
    where
        S: Into<String>,
    {
        self.message.status_message = Some(status.into());
        self
    }

    /// Request text (AHYC)
    pub fn request<S>(mut self, request: S) -> Self
    where
        S: Into<String>,
    {
        self.message.request_string = Some(request.into());
        self
    }

    /// Free text (short data messages)
    pub fn free_text<S>(mut self, text: S) -> Self
    where
        S: Into<String>,
    {
        self.message.free_text = Some(text.into());
        self
    }

    /// Mark the message as having failed upstream error checks
    pub fn invalid(mut self) -> Self {
        self.message.valid = false;
        self
    }

    /// Finish the message
    pub fn build(self) -> Mpt1327Message {
        self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_codes() {
        assert_eq!(MessageType::Gtc, MessageType::from("GTC"));
        assert_eq!(MessageType::HeadPlus2, MessageType::from("HEAD+2"));
        assert_eq!(MessageType::Unknown, MessageType::from("NOPE"));
        assert_eq!("ALH", MessageType::Alh.as_ref());
    }

    #[test]
    fn test_ident_type_labels() {
        assert_eq!(IdentType::Regi, IdentType::from("REGI"));
        assert_eq!("Registration", IdentType::Regi.label());
        assert_eq!(IdentType::Unknown, IdentType::from("BOGUS"));
    }

    #[test]
    fn test_builder() {
        let message = Mpt1327Message::builder(MessageType::Gtc)
            .from("100")
            .to("200")
            .channel(7)
            .build();

        assert!(message.is_valid());
        assert_eq!(MessageType::Gtc, message.message_type());
        assert_eq!(Some("100"), message.from_id());
        assert_eq!(Some("200"), message.to_id());
        assert_eq!(7, message.channel());
        assert_eq!(None, message.site_id());

        let invalid = Mpt1327Message::builder(MessageType::Ack).invalid().build();
        assert!(!invalid.is_valid());
    }
}
