//! FM demodulation
//!
//! A quadrature (phase-difference) discriminator for narrowband FM.
//! Each output sample is the scaled angle between successive complex
//! baseband samples,
//!
//! ```txt
//! y[n] = arg(z[n] · conj(z[n−1])) / π
//! ```
//!
//! so a full-deviation signal spans roughly ±1.0. The demodulator
//! also feeds every input sample's squared magnitude to an embedded
//! [`PowerSquelch`]; demodulated samples are produced regardless of
//! mute state, and gating is the caller's responsibility.

use num_complex::Complex;

use crate::buffer::{BufferPool, ComplexBuffer, RealBuffer};
use crate::squelch::PowerSquelch;

// Scales the ±π discriminator output to ±1.0
const DEMODULATION_GAIN: f32 = 1.0 / std::f32::consts::PI;

/// Narrowband FM quadrature demodulator with embedded power squelch
#[derive(Clone, Copy, Debug)]
pub struct FmDemodulator {
    previous: Complex<f32>,
    squelch: PowerSquelch,
}

impl FmDemodulator {
    /// Constructs an instance
    ///
    /// The parameters configure the embedded [`PowerSquelch`]:
    /// `alpha` for the IIR power estimator, `threshold_db` for the
    /// unsquelch level, and `ramp` for the attack/decay duration in
    /// samples.
    pub fn new(alpha: f64, threshold_db: f64, ramp: u32) -> Self {
        Self {
            previous: Complex::new(0.0, 0.0),
            squelch: PowerSquelch::new(alpha, threshold_db, ramp),
        }
    }

    /// Demodulate a complex baseband buffer
    ///
    /// Returns a pool-leased real buffer of the same sample count.
    /// The squelch-changed flag is cleared on entry, so after this
    /// call [`is_squelch_changed()`](FmDemodulator::is_squelch_changed)
    /// reports whether a mute/unmute edge occurred *within this
    /// buffer*.
    pub fn demodulate(&mut self, input: &ComplexBuffer, pool: &BufferPool) -> RealBuffer {
        self.squelch.set_squelch_changed(false);

        let mut output = pool.take_real(input.sample_count());
        let samples = output.samples_mut();
        for (index, sample) in input.iter().enumerate() {
            let rotation = sample * self.previous.conj();
            samples[index] = rotation.im.atan2(rotation.re) * DEMODULATION_GAIN;
            self.squelch.process(sample.re, sample.im);
            self.previous = sample;
        }
        output
    }

    /// Indicates if the embedded squelch is muted
    pub fn is_muted(&self) -> bool {
        self.squelch.is_muted()
    }

    /// Indicates if the squelch crossed a mute/unmute edge during
    /// the most recent [`demodulate()`](FmDemodulator::demodulate)
    pub fn is_squelch_changed(&self) -> bool {
        self.squelch.is_squelch_changed()
    }

    /// Embedded power squelch
    pub fn squelch(&self) -> &PowerSquelch {
        &self.squelch
    }

    /// Clear the demodulator history and squelch
    pub fn reset(&mut self) {
        self.previous = Complex::new(0.0, 0.0);
        self.squelch.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_approx_eq::assert_approx_eq;

    // Lease a buffer holding a complex tone at `frequency`
    fn tone(pool: &BufferPool, frequency: f64, sample_rate: f64, count: usize) -> ComplexBuffer {
        let mut buffer = pool.take_complex(count);
        for n in 0..count {
            let phase = 2.0 * std::f64::consts::PI * frequency * n as f64 / sample_rate;
            buffer.set(n, Complex::new(phase.cos() as f32, phase.sin() as f32));
        }
        buffer
    }

    #[test]
    fn test_constant_tone_demodulates_to_constant() {
        let pool = BufferPool::new();
        let mut demod = FmDemodulator::new(0.01, -78.0, 0);

        // a +1 kHz tone at 50 kSa/s advances 2π/50 per sample
        let input = tone(&pool, 1000.0, 50_000.0, 512);
        let output = demod.demodulate(&input, &pool);

        let expected = (2.0 * std::f32::consts::PI * 1000.0 / 50_000.0) * DEMODULATION_GAIN;
        // skip the first sample: it measures the phase step from the
        // zero history
        for &sample in &output.samples()[1..] {
            assert_approx_eq!(expected, sample, 1.0e-4);
        }
    }

    #[test]
    fn test_negative_frequency_sign() {
        let pool = BufferPool::new();
        let mut demod = FmDemodulator::new(0.01, -78.0, 0);

        let input = tone(&pool, -2000.0, 50_000.0, 64);
        let output = demod.demodulate(&input, &pool);
        for &sample in &output.samples()[1..] {
            assert!(sample < 0.0);
        }
    }

    #[test]
    fn test_squelch_changed_is_per_buffer() {
        let pool = BufferPool::new();
        let mut demod = FmDemodulator::new(1.0, -40.0, 0);
        assert!(demod.is_muted());

        // full-scale tone opens the squelch within the buffer
        let input = tone(&pool, 1000.0, 50_000.0, 16);
        let _ = demod.demodulate(&input, &pool);
        assert!(!demod.is_muted());
        assert!(demod.is_squelch_changed());

        // a second buffer with no squelch edge clears the report
        let input = tone(&pool, 1000.0, 50_000.0, 16);
        let _ = demod.demodulate(&input, &pool);
        assert!(!demod.is_squelch_changed());

        // silence closes it again
        let silence = pool.take_complex(16);
        let _ = demod.demodulate(&silence, &pool);
        assert!(demod.is_muted());
        assert!(demod.is_squelch_changed());
    }

    #[test]
    fn test_reset() {
        let pool = BufferPool::new();
        let mut demod = FmDemodulator::new(1.0, -40.0, 0);

        let input = tone(&pool, 1000.0, 50_000.0, 16);
        let _ = demod.demodulate(&input, &pool);
        assert!(!demod.is_muted());

        demod.reset();
        assert!(demod.is_muted());
        assert!(!demod.is_squelch_changed());
    }
}
