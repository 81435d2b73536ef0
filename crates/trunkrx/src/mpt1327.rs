//! MPT-1327 trunking protocol support
//!
//! [`message`] models decoded control-channel messages; [`state`]
//! holds the per-channel trunking state machine which consumes them.

pub mod message;
pub mod state;

pub use message::{IdentType, MessageType, Mpt1327Message, Mpt1327MessageBuilder};
pub use state::{Mpt1327DecoderState, DEFAULT_CALL_TIMEOUT_MS};
