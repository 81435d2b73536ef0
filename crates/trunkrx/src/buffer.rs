//! Pooled sample buffers
//!
//! Every channel owns a [`BufferPool`] which leases out sample
//! storage as [`ComplexBuffer`] (interleaved I/Q) or [`RealBuffer`]
//! (mono) values. Stages which forward a buffer *move* it; whichever
//! stage drops the buffer last returns its storage to the pool.
//!
//! This replaces a manual user-count discipline with ownership: a
//! buffer in circulation is owned by exactly one stage, a release is
//! exactly one `Drop`, and access after release does not compile.
//! Fan-out to more than one consumer requires leasing a copy.
//!
//! The pool is channel-scoped and deliberately not `Send`: all DSP
//! for one channel runs on that channel's thread.

use std::cell::RefCell;
use std::rc::Rc;

use num_complex::Complex;

/// Channel-scoped pool of reusable sample storage
///
/// Cloning a `BufferPool` yields another handle to the same pool.
/// Buffers leased from any handle return to the shared free list
/// when dropped.
#[derive(Clone, Debug, Default)]
pub struct BufferPool {
    inner: Rc<RefCell<PoolInner>>,
}

#[derive(Debug, Default)]
struct PoolInner {
    free: Vec<Vec<f32>>,
    outstanding: usize,
}

impl BufferPool {
    /// Create an empty pool
    ///
    /// Storage is allocated on demand and recycled thereafter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lease a zeroed complex buffer of `sample_count` I/Q samples
    ///
    /// The backing storage holds `2 * sample_count` interleaved
    /// floats.
    pub fn take_complex(&self, sample_count: usize) -> ComplexBuffer {
        ComplexBuffer(self.lease(sample_count * 2))
    }

    /// Lease a zeroed real buffer of `sample_count` samples
    pub fn take_real(&self, sample_count: usize) -> RealBuffer {
        RealBuffer(self.lease(sample_count))
    }

    /// Number of buffers currently leased out
    ///
    /// Every lease is eventually paired with exactly one return;
    /// a quiesced channel reports zero.
    pub fn outstanding(&self) -> usize {
        self.inner.borrow().outstanding
    }

    fn lease(&self, len: usize) -> Lease {
        let mut inner = self.inner.borrow_mut();
        let mut data = inner.free.pop().unwrap_or_default();
        data.clear();
        data.resize(len, 0.0f32);
        inner.outstanding += 1;
        Lease {
            data,
            pool: Rc::clone(&self.inner),
        }
    }
}

// Leased storage; `Drop` returns the backing vector to the pool
#[derive(Debug)]
struct Lease {
    data: Vec<f32>,
    pool: Rc<RefCell<PoolInner>>,
}

impl Drop for Lease {
    fn drop(&mut self) {
        let mut pool = self.pool.borrow_mut();
        pool.free.push(std::mem::take(&mut self.data));
        pool.outstanding -= 1;
    }
}

/// Buffer of interleaved complex baseband samples
///
/// Sample `n` occupies storage indices `2n` (inphase) and `2n + 1`
/// (quadrature).
#[derive(Debug)]
pub struct ComplexBuffer(Lease);

impl ComplexBuffer {
    /// Number of complex samples
    pub fn sample_count(&self) -> usize {
        self.0.data.len() / 2
    }

    /// Interleaved I/Q storage
    pub fn samples(&self) -> &[f32] {
        &self.0.data
    }

    /// Interleaved I/Q storage, mutable
    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.0.data
    }

    /// Iterate the contents as complex values
    pub fn iter(&self) -> impl Iterator<Item = Complex<f32>> + '_ {
        self.0
            .data
            .chunks_exact(2)
            .map(|iq| Complex::new(iq[0], iq[1]))
    }

    /// Store complex `value` at sample index `index`
    #[inline]
    pub fn set(&mut self, index: usize, value: Complex<f32>) {
        self.0.data[2 * index] = value.re;
        self.0.data[2 * index + 1] = value.im;
    }
}

/// Buffer of real (mono) samples
#[derive(Debug)]
pub struct RealBuffer(Lease);

impl RealBuffer {
    /// Number of samples
    pub fn sample_count(&self) -> usize {
        self.0.data.len()
    }

    /// Sample storage
    pub fn samples(&self) -> &[f32] {
        &self.0.data
    }

    /// Sample storage, mutable
    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.0.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lease_and_return() {
        let pool = BufferPool::new();
        assert_eq!(0, pool.outstanding());

        let buf = pool.take_complex(8);
        assert_eq!(8, buf.sample_count());
        assert_eq!(16, buf.samples().len());
        assert_eq!(1, pool.outstanding());

        let real = pool.take_real(4);
        assert_eq!(4, real.sample_count());
        assert_eq!(2, pool.outstanding());

        drop(buf);
        drop(real);
        assert_eq!(0, pool.outstanding());
    }

    #[test]
    fn test_storage_recycled_and_zeroed() {
        let pool = BufferPool::new();

        let mut buf = pool.take_real(4);
        buf.samples_mut().copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        drop(buf);

        // the recycled storage must come back zeroed
        let buf = pool.take_real(4);
        assert_eq!(&[0.0f32; 4], buf.samples());
    }

    #[test]
    fn test_complex_interleaving() {
        let pool = BufferPool::new();
        let mut buf = pool.take_complex(2);
        buf.set(0, Complex::new(1.0, -1.0));
        buf.set(1, Complex::new(0.5, 0.25));

        assert_eq!(&[1.0, -1.0, 0.5, 0.25], buf.samples());

        let collected: Vec<Complex<f32>> = buf.iter().collect();
        assert_eq!(Complex::new(1.0, -1.0), collected[0]);
        assert_eq!(Complex::new(0.5, 0.25), collected[1]);
    }
}
