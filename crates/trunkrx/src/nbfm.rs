//! Narrowband FM decoder pipeline
//!
//! [`NbfmDecoder`] owns the sample-flow graph for one analog FM
//! channel:
//!
//! 1. Baseband I/Q lowpass ([`ComplexFirFilter`])
//! 2. Quadrature demodulation with embedded power squelch
//!    ([`FmDemodulator`])
//! 3. Squelch gating, with decoder state events on the channel bus
//! 4. Resampling to the audio output rate ([`RealResampler`])
//!
//! The filter and resampler depend on the source sample rate, which
//! is only known once the upstream source announces it. Until a
//! sample-rate event arrives, the pipeline refuses sample buffers.
//!
//! [`ComplexFirFilter`]: crate::filter::ComplexFirFilter
//! [`FmDemodulator`]: crate::demod::FmDemodulator
//! [`RealResampler`]: crate::resample::RealResampler

use std::cell::RefCell;
use std::rc::Rc;

#[cfg(not(test))]
use log::{debug, error};

#[cfg(test)]
use std::{println as debug, println as error};

use thiserror::Error;

use crate::buffer::{BufferPool, ComplexBuffer, RealBuffer};
use crate::bus::DecoderStateBus;
use crate::demod::FmDemodulator;
use crate::design::{self, LowPassSpec};
use crate::event::{
    ChannelState, DecoderEvent, DecoderStateEvent, SourceEvent, SourceId, StateEventKind,
};
use crate::filter::ComplexFirFilter;
use crate::resample::RealResampler;

/// Default FM channel bandwidth (Hz)
pub const DEFAULT_CHANNEL_BANDWIDTH: f64 = 12_500.0;

/// Default demodulated audio rate (Hz)
pub const DEFAULT_AUDIO_SAMPLE_RATE: f64 = 8_000.0;

// Power squelch defaults, tuned against 12.5 kHz analog FM
const DEFAULT_SQUELCH_ALPHA: f64 = 0.0001;
const DEFAULT_SQUELCH_THRESHOLD_DB: f64 = -78.0;
const DEFAULT_SQUELCH_RAMP: u32 = 4;

// Half-width of the lowpass transition band (Hz)
const FILTER_TRANSITION_HALF_WIDTH: f64 = 500.0;

// Stop-band attenuation requested of the channel lowpass (dB)
const FILTER_STOP_ATTENUATION_DB: f64 = 60.0;

// Resampler working and output chunk sizes, in samples
const RESAMPLER_BUFFER_SIZE: usize = 2000;
const RESAMPLER_CHUNK_SIZE: usize = 1000;

// Slot the resampler forwards audio into; empty slots release the
// buffers instead
type AudioSink = Rc<RefCell<Option<Box<dyn FnMut(RealBuffer)>>>>;

/// Error from the NBFM pipeline
#[derive(Error, Debug)]
pub enum NbfmError {
    /// The source rate cannot carry the configured channel
    #[error(
        "channel bandwidth {channel_bandwidth} Hz requires a sample rate of at least \
         twice that; {sample_rate} Hz is not supported"
    )]
    SampleRateTooLow {
        /// Offered sample rate (Hz)
        sample_rate: f64,
        /// Configured channel bandwidth (Hz)
        channel_bandwidth: f64,
    },

    /// A buffer arrived before any sample-rate event
    #[error(
        "the NBFM decoder must receive a sample rate change source event before it \
         can process complex sample buffers"
    )]
    SampleRateRequired,
}

/// Builder for [`NbfmDecoder`]
///
/// ```
/// use trunkrx::{DecoderStateBus, NbfmDecoder};
///
/// let bus = DecoderStateBus::new();
/// let decoder = NbfmDecoder::builder()
///     .with_channel_bandwidth(12_500.0)
///     .with_squelch(0.0001, -78.0, 4)
///     .build(&bus);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NbfmDecoderBuilder {
    channel_bandwidth: f64,
    output_sample_rate: f64,
    squelch_alpha: f64,
    squelch_threshold_db: f64,
    squelch_ramp: u32,
}

impl NbfmDecoderBuilder {
    /// New builder with the 12.5 kHz channel defaults
    pub fn new() -> Self {
        Self {
            channel_bandwidth: DEFAULT_CHANNEL_BANDWIDTH,
            output_sample_rate: DEFAULT_AUDIO_SAMPLE_RATE,
            squelch_alpha: DEFAULT_SQUELCH_ALPHA,
            squelch_threshold_db: DEFAULT_SQUELCH_THRESHOLD_DB,
            squelch_ramp: DEFAULT_SQUELCH_RAMP,
        }
    }

    /// FM channel bandwidth (Hz)
    ///
    /// The source must supply at least twice this rate.
    pub fn with_channel_bandwidth(&mut self, bandwidth: f64) -> &mut Self {
        self.channel_bandwidth = bandwidth;
        self
    }

    /// Demodulated audio output rate (Hz)
    pub fn with_output_sample_rate(&mut self, rate: f64) -> &mut Self {
        self.output_sample_rate = rate;
        self
    }

    /// Power squelch parameters
    ///
    /// `alpha` sets the IIR power estimator decay, `threshold_db`
    /// the unsquelch level, and `ramp` the attack/decay duration in
    /// samples.
    pub fn with_squelch(&mut self, alpha: f64, threshold_db: f64, ramp: u32) -> &mut Self {
        self.squelch_alpha = alpha;
        self.squelch_threshold_db = threshold_db;
        self.squelch_ramp = ramp;
        self
    }

    /// Build the decoder, registering it on `bus`
    pub fn build(&self, bus: &DecoderStateBus) -> NbfmDecoder {
        NbfmDecoder {
            channel_bandwidth: self.channel_bandwidth,
            output_sample_rate: self.output_sample_rate,
            iq_filter: None,
            demodulator: FmDemodulator::new(
                self.squelch_alpha,
                self.squelch_threshold_db,
                self.squelch_ramp,
            ),
            resampler: None,
            pool: BufferPool::new(),
            audio_sink: Rc::new(RefCell::new(None)),
            bus: bus.clone(),
            source: bus.register_source(),
            squelched: true,
        }
    }
}

impl Default for NbfmDecoderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Decoder pipeline for one narrowband FM channel
pub struct NbfmDecoder {
    channel_bandwidth: f64,
    output_sample_rate: f64,
    iq_filter: Option<ComplexFirFilter>,
    demodulator: FmDemodulator,
    resampler: Option<RealResampler>,
    pool: BufferPool,
    audio_sink: AudioSink,
    bus: DecoderStateBus,
    source: SourceId,
    squelched: bool,
}

impl NbfmDecoder {
    /// Start building a decoder
    pub fn builder() -> NbfmDecoderBuilder {
        NbfmDecoderBuilder::new()
    }

    /// Channel buffer pool
    ///
    /// The upstream source leases its input buffers here so that
    /// storage recycles within the channel.
    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Identity this decoder broadcasts under
    pub fn source(&self) -> SourceId {
        self.source
    }

    /// Process one complex baseband buffer
    ///
    /// Requires a prior sample-rate source event; otherwise the
    /// buffer is released and an error returned. Demodulated audio
    /// is forwarded to the registered buffer listener whenever the
    /// squelch is open, and decoder state events trace the squelch
    /// transitions on the channel bus.
    pub fn receive(&mut self, buffer: ComplexBuffer) -> Result<(), NbfmError> {
        let Some(iq_filter) = self.iq_filter.as_mut() else {
            drop(buffer);
            return Err(NbfmError::SampleRateRequired);
        };

        let filtered = iq_filter.filter(&buffer, &self.pool);
        drop(buffer);
        let demodulated = self.demodulator.demodulate(&filtered, &self.pool);
        drop(filtered);

        let bus = &self.bus;
        let source = self.source;
        if let Some(resampler) = self.resampler.as_mut() {
            // if the squelch opened while demodulating this buffer,
            // un-squelch so the buffer is not lost
            if self.squelched && self.demodulator.is_squelch_changed() {
                self.squelched = false;
                Self::broadcast(bus, source, StateEventKind::Start, ChannelState::Call);
            }

            if self.squelched {
                drop(demodulated);
                Self::broadcast(bus, source, StateEventKind::Continuation, ChannelState::Idle);
            } else {
                resampler.resample(demodulated);
                Self::broadcast(bus, source, StateEventKind::Continuation, ChannelState::Call);
            }

            // squelch once the demodulator mutes, closing out the
            // audio stream
            if !self.squelched && self.demodulator.is_muted() {
                self.squelched = true;
                Self::broadcast(bus, source, StateEventKind::End, ChannelState::Idle);
            }
        } else {
            drop(demodulated);
            Self::broadcast(bus, source, StateEventKind::Continuation, ChannelState::Idle);
        }

        Ok(())
    }

    /// Handle a notification from the upstream sample source
    ///
    /// A sample-rate change tears down the existing lowpass, designs
    /// a new one at `rate / 4 ∓ 500 Hz`, and rebuilds the resampler
    /// for the new input rate. Rates below twice the channel
    /// bandwidth are rejected.
    pub fn process_source_event(&mut self, event: &SourceEvent) -> Result<(), NbfmError> {
        match *event {
            SourceEvent::SampleRateChange { sample_rate } => {
                self.iq_filter = None;

                if sample_rate < 2.0 * self.channel_bandwidth {
                    return Err(NbfmError::SampleRateTooLow {
                        sample_rate,
                        channel_bandwidth: self.channel_bandwidth,
                    });
                }

                let cutoff = sample_rate / 4.0;
                let pass_band_cutoff = cutoff - FILTER_TRANSITION_HALF_WIDTH;
                let stop_band_start = cutoff + FILTER_TRANSITION_HALF_WIDTH;

                let spec = LowPassSpec::new(sample_rate, pass_band_cutoff, stop_band_start);
                let taps = match design::remez_low_pass(&spec) {
                    Ok(taps) => taps,
                    Err(design_error) => {
                        error!(
                            "couldn't design demodulator remez filter for sample rate \
                             [{}] pass frequency [{}] and stop frequency [{}] - using \
                             sinc filter: {}",
                            sample_rate, pass_band_cutoff, stop_band_start, design_error
                        );
                        design::sinc_low_pass(
                            sample_rate,
                            pass_band_cutoff,
                            stop_band_start,
                            FILTER_STOP_ATTENUATION_DB,
                        )
                    }
                };
                debug!(
                    "nbfm: sample rate {} Hz, {} filter taps",
                    sample_rate,
                    taps.len()
                );

                self.iq_filter = Some(ComplexFirFilter::new(&taps));

                let mut resampler = RealResampler::new(
                    sample_rate,
                    self.output_sample_rate,
                    RESAMPLER_BUFFER_SIZE,
                    RESAMPLER_CHUNK_SIZE,
                    &self.pool,
                );
                let sink = Rc::clone(&self.audio_sink);
                resampler.set_listener(move |audio| {
                    if let Some(listener) = sink.borrow_mut().as_mut() {
                        listener(audio);
                    }
                });
                self.resampler = Some(resampler);

                Ok(())
            }
        }
    }

    /// Register the demodulated-audio listener
    pub fn set_buffer_listener<F>(&mut self, listener: F)
    where
        F: FnMut(RealBuffer) + 'static,
    {
        *self.audio_sink.borrow_mut() = Some(Box::new(listener));
    }

    /// Remove the demodulated-audio listener
    ///
    /// Audio produced with no listener registered is released back
    /// to the pool.
    pub fn remove_buffer_listener(&mut self) {
        *self.audio_sink.borrow_mut() = None;
    }

    /// Clear the demodulator history and squelch
    pub fn reset(&mut self) {
        self.demodulator.reset();
    }

    /// Tear down the pipeline
    ///
    /// Drops the filter, resampler, and audio listener. A new
    /// sample-rate event is required before further buffers can be
    /// processed.
    pub fn stop(&mut self) {
        self.iq_filter = None;
        self.resampler = None;
        self.remove_buffer_listener();
    }

    fn broadcast(
        bus: &DecoderStateBus,
        source: SourceId,
        kind: StateEventKind,
        state: ChannelState,
    ) {
        bus.broadcast(DecoderEvent::State(DecoderStateEvent::new(
            source, kind, state,
        )));
    }
}

impl std::fmt::Debug for NbfmDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NbfmDecoder")
            .field("channel_bandwidth", &self.channel_bandwidth)
            .field("output_sample_rate", &self.output_sample_rate)
            .field("configured", &self.iq_filter.is_some())
            .field("squelched", &self.squelched)
            .finish()
    }
}
