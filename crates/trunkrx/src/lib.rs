//! # trunkrx: NBFM demodulation and MPT-1327 trunking state
//!
//! This crate provides the signal-processing and protocol-state core
//! of a software-defined-radio trunking receiver:
//!
//! * a real-time **narrowband FM pipeline** which converts complex
//!   baseband I/Q buffers into resampled audio, gated by a
//!   power-based squelch state machine; and
//! * an **MPT-1327 decoder state** which consumes decoded
//!   control-channel messages and drives call events, traffic
//!   channel allocations, and site tracking.
//!
//! The two halves meet on a channel-scoped event bus
//! ([`DecoderStateBus`]): the pipeline reports squelch transitions
//! as decoder state events, and the trunking state both publishes
//! its own events and subscribes to those of its peers.
//!
//! ## Example
//!
//! Demodulating a channel requires a source of complex baseband
//! buffers. Obtaining them is beyond the scope of this crate; any
//! SDR front end that produces interleaved I/Q will do. The pipeline
//! refuses samples until the source announces its sample rate:
//!
//! ```
//! use trunkrx::{DecoderStateBus, NbfmDecoder, SourceEvent};
//!
//! let bus = DecoderStateBus::new();
//! bus.subscribe(|event| println!("{}", event));
//!
//! let mut decoder = NbfmDecoder::builder().build(&bus);
//! decoder.set_buffer_listener(|audio| {
//!     // 8 kHz demodulated audio arrives here
//!     let _ = audio.sample_count();
//! });
//!
//! decoder.process_source_event(&SourceEvent::SampleRateChange {
//!     sample_rate: 50_000.0,
//! })?;
//!
//! // lease input buffers from the channel pool and fill them with
//! // I/Q samples from the source
//! let buffer = decoder.pool().take_complex(2048);
//! decoder.receive(buffer)?;
//! # Ok::<(), trunkrx::NbfmError>(())
//! ```
//!
//! Trunking state for a control channel is driven by decoded
//! [`Mpt1327Message`]s:
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use trunkrx::{
//!     ChannelMap, ChannelRange, ChannelType, DecoderStateBus, MessageType,
//!     Mpt1327DecoderState, Mpt1327Message,
//! };
//!
//! let bus = DecoderStateBus::new();
//! let map = ChannelMap::new("vhf").with_range(ChannelRange::new(1, 100, 154_800_000, 12_500));
//! let state = Rc::new(RefCell::new(Mpt1327DecoderState::new(
//!     &bus,
//!     Some(map),
//!     ChannelType::Standard,
//!     30_000,
//! )));
//! Mpt1327DecoderState::attach(Rc::clone(&state));
//!
//! let gtc = Mpt1327Message::builder(MessageType::Gtc)
//!     .from("100")
//!     .to("200")
//!     .channel(7)
//!     .build();
//! state.borrow_mut().receive(&gtc);
//!
//! assert!(state.borrow().idents().contains("100"));
//! ```
//!
//! ## Concurrency model
//!
//! Each decode channel owns a single-threaded cooperative
//! dispatcher. All DSP and all event delivery for one channel happen
//! on that channel's thread; the types here are deliberately not
//! `Send`. Cross-channel interaction goes through events posted onto
//! the target channel's own bus.

#![allow(dead_code)]

pub mod buffer;
pub mod bus;
pub mod channel;
pub mod demod;
pub mod design;
pub mod event;
pub mod filter;
pub mod mpt1327;
pub mod nbfm;
pub mod resample;
pub mod squelch;

pub use buffer::{BufferPool, ComplexBuffer, RealBuffer};
pub use bus::DecoderStateBus;
pub use channel::{ChannelMap, ChannelRange, ChannelType};
pub use demod::FmDemodulator;
pub use design::{remez_low_pass, sinc_low_pass, FilterDesignError, LowPassSpec};
pub use event::{
    CallEvent, CallEventBuilder, CallEventKind, ChangeChannelTimeoutEvent, ChangedAttribute,
    ChannelState, DecoderEvent, DecoderStateEvent, Metadata, MetadataType, SourceEvent, SourceId,
    StateEventKind,
};
pub use filter::ComplexFirFilter;
pub use mpt1327::{
    IdentType, MessageType, Mpt1327DecoderState, Mpt1327Message, Mpt1327MessageBuilder,
    DEFAULT_CALL_TIMEOUT_MS,
};
pub use nbfm::{NbfmDecoder, NbfmDecoderBuilder, NbfmError};
pub use resample::RealResampler;
pub use squelch::{PowerSquelch, SquelchState};
