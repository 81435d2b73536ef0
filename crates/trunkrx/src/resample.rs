//! Rational-rate audio resampling
//!
//! [`RealResampler`] converts a real sample stream between two fixed
//! rates using a polyphase filter bank: the rate ratio is reduced to
//! `interpolation / decimation`, a single linear-phase windowed-sinc
//! prototype is split into `interpolation` phases, and each output
//! sample is one phase's dot product with the input history.
//!
//! Output samples accumulate into fixed-size chunks which are leased
//! from the channel pool and pushed to a registered listener. The
//! listener must not block.

#[cfg(not(test))]
use log::debug;

#[cfg(test)]
use std::println as debug;

use crate::buffer::{BufferPool, RealBuffer};
use crate::design;
use crate::filter::{FirCoeff, Window};

// Anti-alias prototype attenuation (dB)
const PROTOTYPE_ATTENUATION_DB: f64 = 60.0;

/// Rational-rate resampler for real sample buffers
pub struct RealResampler {
    phases: Vec<FirCoeff<f32>>,
    history: Window<f32>,
    interpolation: u32,
    decimation: u32,
    phase: u32,
    pending: Vec<f32>,
    chunk_size: usize,
    pool: BufferPool,
    listener: Option<Box<dyn FnMut(RealBuffer)>>,
}

impl RealResampler {
    /// Constructs an instance
    ///
    /// Converts `input_rate` to `output_rate` (both Hz). The rates
    /// are reduced to the smallest integer ratio; the anti-alias
    /// prototype is designed against the lesser of the two rates.
    /// `buffer_size` reserves working space for accumulated output
    /// and `chunk_size` is the sample count of each buffer forwarded
    /// to the listener.
    pub fn new(
        input_rate: f64,
        output_rate: f64,
        buffer_size: usize,
        chunk_size: usize,
        pool: &BufferPool,
    ) -> Self {
        let input = input_rate.round() as u64;
        let output = output_rate.round() as u64;
        let divisor = gcd(input, output);
        let interpolation = (output / divisor) as u32;
        let decimation = (input / divisor) as u32;

        // prototype lowpass at the upsampled rate, band-limited to
        // the narrower of the two streams
        let narrow = input_rate.min(output_rate);
        let prototype = design::sinc_low_pass(
            input_rate * interpolation as f64,
            0.40 * narrow,
            0.50 * narrow,
            PROTOTYPE_ATTENUATION_DB,
        );

        let taps_per_phase = prototype.len().div_ceil(interpolation as usize);
        let mut phases = Vec::with_capacity(interpolation as usize);
        for p in 0..interpolation as usize {
            let mut taps = Vec::with_capacity(taps_per_phase);
            for k in 0..taps_per_phase {
                let tap = prototype
                    .get(p + k * interpolation as usize)
                    .copied()
                    .unwrap_or(0.0);
                // restore unity gain lost to the polyphase split
                taps.push(tap * interpolation as f32);
            }
            phases.push(FirCoeff::from_slice(&taps));
        }

        debug!(
            "resampler: {} Hz -> {} Hz as {}:{}, {} taps per phase",
            input_rate,
            output_rate,
            interpolation,
            decimation,
            taps_per_phase
        );

        Self {
            phases,
            history: Window::new(taps_per_phase),
            interpolation,
            decimation,
            phase: 0,
            pending: Vec::with_capacity(buffer_size),
            chunk_size,
            pool: pool.clone(),
            listener: None,
        }
    }

    /// Register the downstream audio listener
    pub fn set_listener<F>(&mut self, listener: F)
    where
        F: FnMut(RealBuffer) + 'static,
    {
        self.listener = Some(Box::new(listener));
    }

    /// Remove the downstream audio listener
    ///
    /// Output produced with no listener registered is released back
    /// to the pool.
    pub fn remove_listener(&mut self) {
        self.listener = None;
    }

    /// Interpolation factor of the reduced rate ratio
    pub fn interpolation(&self) -> u32 {
        self.interpolation
    }

    /// Decimation factor of the reduced rate ratio
    pub fn decimation(&self) -> u32 {
        self.decimation
    }

    /// Resample a buffer, forwarding completed chunks downstream
    pub fn resample(&mut self, input: RealBuffer) {
        for &sample in input.samples() {
            self.history.push_scalar(sample);
            while self.phase < self.interpolation {
                let output = self.phases[self.phase as usize].filter(&self.history);
                self.pending.push(output);
                if self.pending.len() >= self.chunk_size {
                    self.emit();
                }
                self.phase += self.decimation;
            }
            self.phase -= self.interpolation;
        }
    }

    // Lease a chunk, fill it from the pending samples, and forward it
    fn emit(&mut self) {
        let mut chunk = self.pool.take_real(self.pending.len());
        chunk.samples_mut().copy_from_slice(&self.pending);
        self.pending.clear();

        if let Some(listener) = self.listener.as_mut() {
            listener(chunk);
        }
    }
}

impl std::fmt::Debug for RealResampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealResampler")
            .field("interpolation", &self.interpolation)
            .field("decimation", &self.decimation)
            .field("phase", &self.phase)
            .field("chunk_size", &self.chunk_size)
            .field("has_listener", &self.listener.is_some())
            .finish()
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::RefCell;
    use std::rc::Rc;

    fn collect_output(resampler: &mut RealResampler) -> Rc<RefCell<Vec<f32>>> {
        let collected = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&collected);
        resampler.set_listener(move |buffer| {
            sink.borrow_mut().extend_from_slice(buffer.samples());
        });
        collected
    }

    #[test]
    fn test_gcd() {
        assert_eq!(2000, gcd(50_000, 8_000));
        assert_eq!(8_000, gcd(8_000, 8_000));
        assert_eq!(1, gcd(0, 0));
    }

    #[test]
    fn test_rate_ratio() {
        let pool = BufferPool::new();
        let resampler = RealResampler::new(50_000.0, 8_000.0, 2000, 1000, &pool);
        assert_eq!(4, resampler.interpolation());
        assert_eq!(25, resampler.decimation());
    }

    #[test]
    fn test_output_count_and_dc_gain() {
        let pool = BufferPool::new();
        let mut resampler = RealResampler::new(50_000.0, 8_000.0, 2000, 256, &pool);
        let collected = collect_output(&mut resampler);

        // one second of DC
        for _ in 0..25 {
            let mut input = pool.take_real(2000);
            input.samples_mut().fill(1.0);
            resampler.resample(input);
        }

        let output = collected.borrow();
        // 50 000 samples in at 4:25 → 8 000 out, less the partial
        // chunk still pending
        assert!(output.len() > 7_000 && output.len() <= 8_000, "{}", output.len());

        // steady state passes DC at unity
        for &sample in &output[1_000..] {
            assert!((sample - 1.0).abs() < 0.02, "{}", sample);
        }

        drop(output);
        drop(resampler);
        assert_eq!(0, pool.outstanding());
    }

    #[test]
    fn test_unity_ratio_passthrough() {
        let pool = BufferPool::new();
        let mut resampler = RealResampler::new(8_000.0, 8_000.0, 2000, 64, &pool);
        let collected = collect_output(&mut resampler);

        let mut input = pool.take_real(512);
        input.samples_mut().fill(0.5);
        resampler.resample(input);

        let output = collected.borrow();
        // 1:1 ratio emits one sample per input sample
        assert_eq!(512, output.len());
        for &sample in &output[256..] {
            assert!((sample - 0.5).abs() < 0.02, "{}", sample);
        }
    }

    #[test]
    fn test_output_released_without_listener() {
        let pool = BufferPool::new();
        let mut resampler = RealResampler::new(8_000.0, 8_000.0, 2000, 16, &pool);

        let mut input = pool.take_real(64);
        input.samples_mut().fill(1.0);
        resampler.resample(input);

        // chunks were emitted and immediately released
        assert_eq!(0, pool.outstanding());
    }
}
