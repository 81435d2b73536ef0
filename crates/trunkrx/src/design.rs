//! Lowpass FIR tap design
//!
//! [`LowPassSpec`] describes a lowpass design problem: band edges,
//! pass-band ripple, and stop-band attenuation. [`remez_low_pass`]
//! solves it with the Parks–McClellan (Remez exchange) algorithm and
//! may fail to converge; [`sinc_low_pass`] is the Hamming
//! windowed-sinc fallback and always produces taps.
//!
//! Both designers emit odd-length, symmetric (linear-phase, Type I)
//! impulse responses suitable for
//! [`ComplexFirFilter`](crate::filter::ComplexFirFilter).

use std::f64::consts::PI;

use thiserror::Error;

#[cfg(not(test))]
use log::debug;

#[cfg(test)]
use std::println as debug;

// Floor on designed filter lengths
const MIN_LENGTH: usize = 7;

// Exchange iteration budget before reporting failure
const MAX_ITERATIONS: usize = 40;

// Relative ripple agreement required of the extremal set
const CONVERGENCE_TOLERANCE: f64 = 1.0e-4;

/// Error designing an FIR filter
///
/// Design failures are recoverable: callers are expected to log and
/// fall back to [`sinc_low_pass`].
#[derive(Error, Clone, Debug, PartialEq)]
pub enum FilterDesignError {
    /// The requested band edges do not describe a lowpass
    #[error(
        "invalid band edges: pass band {pass_band_cutoff} Hz and stop band \
         {stop_band_start} Hz must satisfy 0 < pass < stop < {sample_rate} Hz / 2"
    )]
    InvalidBandEdges {
        /// Sampling rate (Hz)
        sample_rate: f64,
        /// Pass band edge (Hz)
        pass_band_cutoff: f64,
        /// Stop band edge (Hz)
        stop_band_start: f64,
    },

    /// The Remez exchange failed to settle on an extremal set
    #[error("equiripple exchange did not converge after {iterations} iterations")]
    DidNotConverge {
        /// Iterations attempted
        iterations: usize,
    },
}

/// Lowpass design specification
///
/// Construct with [`new()`](LowPassSpec::new) and adjust with the
/// `with_*` methods. The defaults suit a channelizer lowpass:
/// 1% pass-band ripple, 60 dB stop-band attenuation, odd length,
/// grid density 16.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LowPassSpec {
    sample_rate: f64,
    pass_band_cutoff: f64,
    stop_band_start: f64,
    pass_band_ripple: f64,
    stop_band_attenuation_db: f64,
    odd_length: bool,
    grid_density: usize,
}

impl LowPassSpec {
    /// New lowpass specification
    ///
    /// `pass_band_cutoff` and `stop_band_start` are in Hz and must
    /// satisfy `0 < pass < stop < sample_rate / 2`. Violations are
    /// reported when the design is run.
    pub fn new(sample_rate: f64, pass_band_cutoff: f64, stop_band_start: f64) -> Self {
        Self {
            sample_rate,
            pass_band_cutoff,
            stop_band_start,
            pass_band_ripple: 0.01,
            stop_band_attenuation_db: 60.0,
            odd_length: true,
            grid_density: 16,
        }
    }

    /// Maximum pass-band deviation from unity gain (linear)
    pub fn with_pass_band_ripple(&mut self, ripple: f64) -> &mut Self {
        self.pass_band_ripple = ripple.clamp(1.0e-6, 0.5);
        self
    }

    /// Minimum stop-band attenuation (dB, positive)
    pub fn with_stop_band_attenuation_db(&mut self, attenuation: f64) -> &mut Self {
        self.stop_band_attenuation_db = attenuation.max(0.0);
        self
    }

    /// Require an odd filter length
    ///
    /// Only Type I (odd, symmetric) designs are produced; an even
    /// request is rounded up regardless.
    pub fn with_odd_length(&mut self, odd: bool) -> &mut Self {
        self.odd_length = odd;
        self
    }

    /// Frequency grid density for the exchange
    pub fn with_grid_density(&mut self, density: usize) -> &mut Self {
        self.grid_density = density.clamp(8, 64);
        self
    }

    /// Sampling rate (Hz)
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Pass band edge (Hz)
    pub fn pass_band_cutoff(&self) -> f64 {
        self.pass_band_cutoff
    }

    /// Stop band edge (Hz)
    pub fn stop_band_start(&self) -> f64 {
        self.stop_band_start
    }

    /// Pass-band ripple (linear)
    pub fn pass_band_ripple(&self) -> f64 {
        self.pass_band_ripple
    }

    /// Stop-band attenuation (dB)
    pub fn stop_band_attenuation_db(&self) -> f64 {
        self.stop_band_attenuation_db
    }

    fn validate(&self) -> Result<(), FilterDesignError> {
        let nyquist = self.sample_rate / 2.0;
        if self.pass_band_cutoff <= 0.0
            || self.pass_band_cutoff >= self.stop_band_start
            || self.stop_band_start >= nyquist
        {
            return Err(FilterDesignError::InvalidBandEdges {
                sample_rate: self.sample_rate,
                pass_band_cutoff: self.pass_band_cutoff,
                stop_band_start: self.stop_band_start,
            });
        }
        Ok(())
    }
}

/// Design a lowpass with the Parks–McClellan exchange
///
/// Produces an odd-length, symmetric impulse response which is
/// equiripple in both bands. Returns an error if the band edges are
/// invalid or the exchange does not converge; callers should fall
/// back to [`sinc_low_pass`].
pub fn remez_low_pass(spec: &LowPassSpec) -> Result<Vec<f32>, FilterDesignError> {
    spec.validate()?;

    // normalized band edges, cycles per sample
    let pass_edge = spec.pass_band_cutoff / spec.sample_rate;
    let stop_edge = spec.stop_band_start / spec.sample_rate;

    let delta_pass = spec.pass_band_ripple;
    let delta_stop = 10.0f64.powf(-spec.stop_band_attenuation_db / 20.0);

    // Herrmann-style length estimate from ripples and transition width
    let transition = stop_edge - pass_edge;
    let mut length = (((-20.0 * (delta_pass * delta_stop).sqrt().log10()) - 13.0)
        / (14.6 * transition))
        .ceil()
        .max(0.0) as usize
        + 1;
    // the estimate errs low for narrow transition bands
    length += 2;
    length = length.max(MIN_LENGTH);
    if length % 2 == 0 {
        // Type I basis only
        length += 1;
    }

    let half_order = (length - 1) / 2;
    let num_extremals = half_order + 2;

    let grid = build_grid(
        pass_edge,
        stop_edge,
        delta_pass,
        delta_stop,
        spec.grid_density,
        num_extremals,
    );

    // initial extremal guess: even spread across the grid
    let mut extremals: Vec<usize> = (0..num_extremals)
        .map(|k| k * (grid.len() - 1) / (num_extremals - 1))
        .collect();

    let mut solution: Option<Interpolant> = None;
    for iteration in 0..MAX_ITERATIONS {
        let interpolant = solve_extremal_set(&grid, &extremals)?;

        // weighted error over the whole grid
        let error: Vec<f64> = grid
            .iter()
            .map(|point| point.weight * (point.desired - interpolant.evaluate(point.x)))
            .collect();

        let next = select_extremals(&grid, &error, num_extremals).ok_or(
            FilterDesignError::DidNotConverge {
                iterations: iteration + 1,
            },
        )?;

        let ripple = interpolant.delta.abs();
        let peak = next.iter().map(|&i| error[i].abs()).fold(0.0, f64::max);
        extremals = next;

        if ripple > 0.0 && (peak - ripple) / ripple <= CONVERGENCE_TOLERANCE {
            debug!(
                "remez: converged after {} iterations, ripple {:.3e}",
                iteration + 1,
                ripple
            );
            solution = Some(interpolant);
            break;
        }
    }

    let interpolant = solution.ok_or(FilterDesignError::DidNotConverge {
        iterations: MAX_ITERATIONS,
    })?;

    Ok(impulse_response(&interpolant, length, half_order))
}

/// Design a lowpass by windowed-sinc (Hamming)
///
/// The cutoff is placed midway between the band edges and the length
/// chosen from the attenuation target and transition width. The taps
/// are normalized to unity DC gain. This design cannot fail, which
/// is what makes it a suitable fallback, but a Hamming window limits
/// the realizable stop-band attenuation to roughly 53 dB.
pub fn sinc_low_pass(
    sample_rate: f64,
    pass_band_cutoff: f64,
    stop_band_start: f64,
    attenuation_db: f64,
) -> Vec<f32> {
    let cutoff = 0.5 * (pass_band_cutoff + stop_band_start) / sample_rate;
    let transition = ((stop_band_start - pass_band_cutoff).abs() / sample_rate).max(1.0e-6);

    // harris' approximation: length ≈ attenuation / (22 · transition)
    let mut length = (attenuation_db.max(1.0) / (22.0 * transition)).ceil() as usize;
    length = length.max(MIN_LENGTH);
    if length % 2 == 0 {
        length += 1;
    }

    let middle = (length - 1) as f64 / 2.0;
    let taps: Vec<f64> = (0..length)
        .map(|k| {
            let t = k as f64 - middle;
            let sinc = if t == 0.0 {
                2.0 * cutoff
            } else {
                (2.0 * PI * cutoff * t).sin() / (PI * t)
            };
            let window = 0.54 - 0.46 * (2.0 * PI * k as f64 / (length - 1) as f64).cos();
            sinc * window
        })
        .collect();

    let dc_gain: f64 = taps.iter().sum();
    taps.iter().map(|tap| (tap / dc_gain) as f32).collect()
}

// One point of the dense design grid
#[derive(Clone, Copy, Debug)]
struct GridPoint {
    // cos(2π f): the Chebyshev abscissa
    x: f64,
    // desired response: 1 in the pass band, 0 in the stop band
    desired: f64,
    // error weight: 1/δ for the band
    weight: f64,
    // band index, used to keep extrema searches within bands
    band: usize,
}

// Dense frequency grid over [0, pass_edge] ∪ [stop_edge, 0.5]
fn build_grid(
    pass_edge: f64,
    stop_edge: f64,
    delta_pass: f64,
    delta_stop: f64,
    density: usize,
    num_extremals: usize,
) -> Vec<GridPoint> {
    let spacing = 0.5 / (density * num_extremals) as f64;

    let bands = [
        (0.0, pass_edge, 1.0, 1.0 / delta_pass),
        (stop_edge, 0.5, 0.0, 1.0 / delta_stop),
    ];

    let mut grid = Vec::new();
    for (band, &(lo, hi, desired, weight)) in bands.iter().enumerate() {
        let count = (((hi - lo) / spacing).round() as usize).max(1);
        for j in 0..=count {
            let f = lo + (hi - lo) * j as f64 / count as f64;
            grid.push(GridPoint {
                x: (2.0 * PI * f).cos(),
                desired,
                weight,
                band,
            });
        }
    }
    grid
}

// Barycentric interpolant fitted to one extremal set
#[derive(Clone, Debug)]
struct Interpolant {
    // interpolation nodes (all extremals but the last)
    nodes: Vec<f64>,
    // barycentric node weights
    beta: Vec<f64>,
    // response values at the nodes
    values: Vec<f64>,
    // levelled ripple
    delta: f64,
}

impl Interpolant {
    // Evaluate the interpolated response at abscissa `x`
    fn evaluate(&self, x: f64) -> f64 {
        let mut numerator = 0.0;
        let mut denominator = 0.0;
        for ((&node, &beta), &value) in self.nodes.iter().zip(&self.beta).zip(&self.values) {
            let dx = x - node;
            if dx.abs() < 1.0e-12 {
                return value;
            }
            let term = beta / dx;
            numerator += term * value;
            denominator += term;
        }
        numerator / denominator
    }
}

// Solve for the levelled error and interpolant of one extremal set
fn solve_extremal_set(
    grid: &[GridPoint],
    extremals: &[usize],
) -> Result<Interpolant, FilterDesignError> {
    let x: Vec<f64> = extremals.iter().map(|&i| grid[i].x).collect();
    let gamma = barycentric_weights(&x);

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (k, &i) in extremals.iter().enumerate() {
        let sign = if k % 2 == 0 { 1.0 } else { -1.0 };
        numerator += gamma[k] * grid[i].desired;
        denominator += sign * gamma[k] / grid[i].weight;
    }
    let delta = numerator / denominator;
    if !delta.is_finite() {
        return Err(FilterDesignError::DidNotConverge { iterations: 0 });
    }

    // interpolate through all extremals but the last
    let nodes_len = x.len() - 1;
    let last = x[nodes_len];
    let mut nodes = Vec::with_capacity(nodes_len);
    let mut beta = Vec::with_capacity(nodes_len);
    let mut values = Vec::with_capacity(nodes_len);
    for (k, &i) in extremals.iter().enumerate().take(nodes_len) {
        let sign = if k % 2 == 0 { 1.0 } else { -1.0 };
        nodes.push(x[k]);
        beta.push(gamma[k] * (x[k] - last));
        values.push(grid[i].desired - sign * delta / grid[i].weight);
    }

    Ok(Interpolant {
        nodes,
        beta,
        values,
        delta,
    })
}

// Barycentric weights 1 / Π (x_k − x_j)
fn barycentric_weights(x: &[f64]) -> Vec<f64> {
    x.iter()
        .enumerate()
        .map(|(k, &xk)| {
            let mut product = 1.0;
            for (j, &xj) in x.iter().enumerate() {
                if j != k {
                    product *= xk - xj;
                }
            }
            1.0 / product
        })
        .collect()
}

// Choose the next extremal set: alternating local maxima of the
// weighted error, reduced to exactly `want` entries. Returns `None`
// if too few alternations exist.
fn select_extremals(grid: &[GridPoint], error: &[f64], want: usize) -> Option<Vec<usize>> {
    let last = error.len() - 1;

    // candidate extrema: signed local extrema plus all band edges
    let mut candidates: Vec<usize> = Vec::new();
    for i in 0..error.len() {
        let at_left_edge = i == 0 || grid[i].band != grid[i - 1].band;
        let at_right_edge = i == last || grid[i].band != grid[i + 1].band;
        let is_extremum = if at_left_edge || at_right_edge {
            true
        } else {
            (error[i] >= error[i - 1] && error[i] >= error[i + 1])
                || (error[i] <= error[i - 1] && error[i] <= error[i + 1])
        };
        if is_extremum {
            candidates.push(i);
        }
    }

    // enforce sign alternation, keeping the largest of any same-sign run
    let mut alternating: Vec<usize> = Vec::new();
    for &candidate in &candidates {
        match alternating.last() {
            Some(&previous) if error[candidate].signum() == error[previous].signum() => {
                if error[candidate].abs() > error[previous].abs() {
                    *alternating.last_mut().unwrap() = candidate;
                }
            }
            _ => alternating.push(candidate),
        }
    }

    if alternating.len() < want {
        return None;
    }

    // drop surplus ripples from whichever end is weakest
    while alternating.len() > want {
        let first = *alternating.first().unwrap();
        let last_kept = *alternating.last().unwrap();
        if error[first].abs() < error[last_kept].abs() {
            alternating.remove(0);
        } else {
            alternating.pop();
        }
    }

    Some(alternating)
}

// Sample the converged response and inverse-transform to taps
fn impulse_response(interpolant: &Interpolant, length: usize, half_order: usize) -> Vec<f32> {
    // zero-phase response at f = j / length
    let samples: Vec<f64> = (0..=half_order)
        .map(|j| {
            let f = j as f64 / length as f64;
            interpolant.evaluate((2.0 * PI * f).cos())
        })
        .collect();

    (0..length)
        .map(|k| {
            let mut acc = samples[0];
            for (j, &sample) in samples.iter().enumerate().skip(1) {
                let angle = 2.0 * PI * j as f64 * (k as f64 - half_order as f64) / length as f64;
                acc += 2.0 * sample * angle.cos();
            }
            (acc / length as f64) as f32
        })
        .collect()
}
