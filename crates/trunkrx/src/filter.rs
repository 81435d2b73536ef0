//! FIR filtering primitives and the baseband I/Q filter
//!
//! [`FirCoeff`] implements the multiply-accumulate operation of a
//! Finite Impulse Response filter: a window holding the previous
//! `h.len()` input samples is multiplied element-wise with the
//! impulse response `h`, and the sum of the products is the output.
//!
//! [`Window`] implements the companion sliding window. New samples
//! are pushed onto the window and the oldest samples age off. To
//! perform FIR filtering, create a `Window` with the same length as
//! the `FirCoeff`, push one sample, and take one output.
//!
//! [`ComplexFirFilter`] combines the two into the channel lowpass:
//! one set of real symmetric taps applied to interleaved I/Q sample
//! buffers, with the delay line retained between buffers.

use std::collections::VecDeque;

use nalgebra::base::Scalar;
use nalgebra::DVector;
use num_complex::Complex;
use num_traits::Zero;

use crate::buffer::{BufferPool, ComplexBuffer};

/// FIR filter coefficients
///
/// Coefficients are stored in natural order: `coeff[0]` multiplies
/// the most recent sample in the history.
#[derive(Debug, Clone, PartialEq)]
pub struct FirCoeff<T>(DVector<T>)
where
    T: Copy + Scalar + Zero;

impl<T> FirCoeff<T>
where
    T: Copy + Scalar + Zero,
{
    /// Create from an impulse response slice
    pub fn from_slice<S>(h: S) -> Self
    where
        S: AsRef<[T]>,
    {
        let inp = h.as_ref();
        FirCoeff(DVector::from_iterator(inp.len(), inp.iter().copied()))
    }

    /// Number of filter coefficients
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if there are no coefficients at all
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compute one output sample for the given sample history
    ///
    /// `history` must iterate from the oldest sample to the newest;
    /// the newest sample is taken for feedforward lag 0. If the
    /// history is shorter than the coefficients, the missing samples
    /// are treated as zeros.
    pub fn filter<W, In, Out>(&self, history: W) -> Out
    where
        W: IntoIterator<Item = In>,
        W::IntoIter: DoubleEndedIterator,
        In: Copy + Scalar + std::ops::Mul<T, Output = Out>,
        Out: Copy + Scalar + Zero + std::ops::AddAssign,
    {
        let mut out = Out::zero();
        for (sample, coeff) in history.into_iter().rev().zip(self.0.iter()) {
            out += sample * *coeff;
        }
        out
    }

    /// Coefficients as a slice, in natural order
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        self.0.as_slice()
    }
}

impl<T> AsRef<[T]> for FirCoeff<T>
where
    T: Copy + Scalar + Zero,
{
    #[inline]
    fn as_ref(&self) -> &[T] {
        self.as_slice()
    }
}

/// Fixed-length sample lookback window
#[derive(Clone, Debug)]
pub struct Window<T>(VecDeque<T>)
where
    T: Copy + Scalar + Zero;

impl<T> Window<T>
where
    T: Copy + Scalar + Zero,
{
    /// Create a window of `len` samples, filled with zeros
    pub fn new(len: usize) -> Self {
        let mut q = VecDeque::with_capacity(len);
        q.resize(len, T::zero());
        Self(q)
    }

    /// Reset to zero initial conditions
    pub fn reset(&mut self) {
        for s in &mut self.0 {
            *s = T::zero()
        }
    }

    /// Window length
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for a zero-length window
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Push one sample onto the window
    ///
    /// `input` becomes the most recent sample. Returns the sample
    /// which aged off.
    #[inline]
    pub fn push_scalar(&mut self, input: T) -> T {
        let out = self.0.pop_front().unwrap_or_else(T::zero);
        self.0.push_back(input);
        out
    }

    /// Iterate the window, oldest sample first
    pub fn iter(&self) -> <&Window<T> as IntoIterator>::IntoIter {
        self.into_iter()
    }

    /// Copy the window contents, oldest sample first
    #[cfg(test)]
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }
}

impl<'a, T> IntoIterator for &'a Window<T>
where
    T: Copy + Scalar + Zero,
{
    type Item = T;

    type IntoIter = std::iter::Copied<std::collections::vec_deque::Iter<'a, T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter().copied()
    }
}

/// Baseband I/Q lowpass filter
///
/// Applies one set of real, symmetric taps to both the inphase and
/// quadrature legs of a complex sample stream. The filter retains a
/// delay line of `taps.len() - 1` complex samples between calls;
/// dropping the filter discards it.
///
/// Output buffers are leased from the channel pool and have the same
/// length as the input.
#[derive(Clone, Debug)]
pub struct ComplexFirFilter {
    coeff: FirCoeff<f32>,
    history: Window<Complex<f32>>,
}

impl ComplexFirFilter {
    /// Create from lowpass taps
    pub fn new(taps: &[f32]) -> Self {
        Self {
            coeff: FirCoeff::from_slice(taps),
            history: Window::new(taps.len()),
        }
    }

    /// Number of filter taps
    pub fn len(&self) -> usize {
        self.coeff.len()
    }

    /// True if the filter has no taps
    pub fn is_empty(&self) -> bool {
        self.coeff.is_empty()
    }

    /// Filter a complex buffer
    ///
    /// Returns a pool-leased buffer of the same sample count.
    pub fn filter(&mut self, input: &ComplexBuffer, pool: &BufferPool) -> ComplexBuffer {
        let mut output = pool.take_complex(input.sample_count());
        for (index, sample) in input.iter().enumerate() {
            self.history.push_scalar(sample);
            output.set(index, self.coeff.filter(&self.history));
        }
        output
    }

    /// Clear the delay line to zero initial conditions
    pub fn reset(&mut self) {
        self.history.reset();
    }
}
