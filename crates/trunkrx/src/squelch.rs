//! Power squelch
//!
//! Tracks the power of a complex baseband signal with a single-pole
//! IIR estimator and gates it through a four-state hysteresis
//! machine. The ramp states keep a marginal signal from flapping the
//! squelch open and closed.
//!
//! Modeled after the GNU Radio complex power squelch.

#[cfg(not(test))]
use log::debug;

#[cfg(test)]
use std::println as debug;

/// Squelch gating state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SquelchState {
    /// Signal power is below threshold; audio should be suppressed
    Mute,

    /// Power has risen above threshold; ramping toward unmute
    Attack,

    /// Signal power is above threshold; audio should flow
    Unmute,

    /// Power has fallen below threshold; ramping toward mute
    Decay,
}

// Single-pole IIR smoothing filter, y[n] = y[n−1] + α·(x[n] − y[n−1])
#[derive(Clone, Copy, Debug)]
struct SinglePoleIir {
    alpha: f64,
    value: f64,
}

impl SinglePoleIir {
    fn new(alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            value: 0.0,
        }
    }

    #[inline]
    fn filter(&mut self, sample: f64) -> f64 {
        self.value += self.alpha * (sample - self.value);
        self.value
    }

    fn reset(&mut self) {
        self.value = 0.0;
    }
}

/// Power squelch with attack/decay hysteresis
///
/// Feed one complex sample at a time to
/// [`process()`](PowerSquelch::process). The smoothed power estimate
/// is compared against the threshold and the state machine advances:
///
/// * `Mute → Attack → Unmute` as a signal appears
/// * `Unmute → Decay → Mute` as it fades
///
/// With a ramp of zero the intermediate states are skipped and the
/// squelch reacts immediately. The `squelch_changed` flag is set on
/// each mute/unmute edge and is sticky until the consumer clears it
/// with [`set_squelch_changed()`](PowerSquelch::set_squelch_changed).
#[derive(Clone, Copy, Debug)]
pub struct PowerSquelch {
    state: SquelchState,
    filter: SinglePoleIir,
    power: f64,
    threshold: f64,
    ramp_threshold: u32,
    ramp_count: u32,
    squelch_changed: bool,
}

impl PowerSquelch {
    /// Constructs an instance
    ///
    /// `alpha` is the decay value of the single-pole IIR power
    /// estimator in range 0.0 – 1.0; smaller values respond more
    /// slowly. `threshold_db` is the power level the signal must
    /// exceed to unsquelch. `ramp` is the count of samples spent in
    /// the attack and decay states; zero mutes and unmutes
    /// immediately, higher counts prevent flapping.
    ///
    /// Against a 12.5 kHz analog FM signal, `alpha` 0.0001,
    /// threshold −78 dB, and ramp 4 respond well.
    pub fn new(alpha: f64, threshold_db: f64, ramp: u32) -> Self {
        let mut squelch = Self {
            state: SquelchState::Mute,
            filter: SinglePoleIir::new(alpha),
            power: 0.0,
            threshold: 0.0,
            ramp_threshold: ramp,
            ramp_count: 0,
            squelch_changed: false,
        };
        squelch.set_threshold_db(threshold_db);
        squelch
    }

    /// Process one complex sample
    ///
    /// Updates the power estimate with `i² + q²` and advances the
    /// squelch state.
    pub fn process(&mut self, inphase: f32, quadrature: f32) {
        let magnitude_squared =
            inphase as f64 * inphase as f64 + quadrature as f64 * quadrature as f64;
        self.power = self.filter.filter(magnitude_squared);

        match self.state {
            SquelchState::Mute => {
                if !self.below_threshold() {
                    if self.ramp_threshold > 0 {
                        self.state = SquelchState::Attack;
                        self.ramp_count += 1;
                    } else {
                        self.state = SquelchState::Unmute;
                        self.set_squelch_changed(true);
                    }
                }
            }
            SquelchState::Attack => {
                if self.ramp_count >= self.ramp_threshold {
                    self.state = SquelchState::Unmute;
                    self.set_squelch_changed(true);
                } else {
                    self.ramp_count += 1;
                }
            }
            SquelchState::Decay => {
                if self.ramp_count == 0 {
                    self.state = SquelchState::Mute;
                    self.set_squelch_changed(true);
                } else {
                    self.ramp_count -= 1;
                }
            }
            SquelchState::Unmute => {
                if self.below_threshold() {
                    if self.ramp_threshold > 0 {
                        self.state = SquelchState::Decay;
                        self.ramp_count -= 1;
                    } else {
                        self.state = SquelchState::Mute;
                        self.set_squelch_changed(true);
                    }
                }
            }
        }
    }

    /// Current squelch state
    pub fn state(&self) -> SquelchState {
        self.state
    }

    /// Indicates if the current state is muted
    pub fn is_muted(&self) -> bool {
        self.state == SquelchState::Mute
    }

    /// Indicates if the current state is unmuted
    pub fn is_unmuted(&self) -> bool {
        self.state == SquelchState::Unmute
    }

    /// Indicates a ramp-up attack state
    pub fn is_attack(&self) -> bool {
        self.state == SquelchState::Attack
    }

    /// Indicates a ramp-down decay state
    pub fn is_decay(&self) -> bool {
        self.state == SquelchState::Decay
    }

    /// Current smoothed power level, in dB
    pub fn power_db(&self) -> f64 {
        10.0 * self.power.log10()
    }

    /// Squelch threshold, in dB
    pub fn threshold_db(&self) -> f64 {
        10.0 * self.threshold.log10()
    }

    /// Sets the squelch threshold, in dB
    pub fn set_threshold_db(&mut self, threshold_db: f64) {
        self.threshold = 10.0f64.powf(threshold_db / 10.0);
    }

    /// Indicates the squelch crossed a mute/unmute edge
    ///
    /// Sticky until cleared with
    /// [`set_squelch_changed()`](PowerSquelch::set_squelch_changed).
    pub fn is_squelch_changed(&self) -> bool {
        self.squelch_changed
    }

    /// Sets or clears the squelch-changed flag
    pub fn set_squelch_changed(&mut self, changed: bool) {
        if changed && !self.squelch_changed {
            debug!(
                "squelch: state {:?}, power {:.1} dB",
                self.state,
                self.power_db()
            );
        }
        self.squelch_changed = changed;
    }

    /// Reset to muted zero initial conditions
    pub fn reset(&mut self) {
        self.state = SquelchState::Mute;
        self.filter.reset();
        self.power = 0.0;
        self.ramp_count = 0;
        self.squelch_changed = false;
    }

    fn below_threshold(&self) -> bool {
        self.power < self.threshold
    }
}
