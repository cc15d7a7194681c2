// DSP utilities - Audio hygiene, panning and smoothing
//
// Small helpers shared by the stem mixer and the output callback.

use std::f32::consts::FRAC_PI_4;

/// Flush denormals to zero
///
/// Denormal numbers (very close to 0) can cause large CPU slowdowns
/// on some processors. Threshold: 1e-15, far below 32-bit float noise.
#[inline]
pub fn flush_denormals_to_zero(x: f32) -> f32 {
    if x.abs() < 1e-15 { 0.0 } else { x }
}

/// Soft clipping with tanh
///
/// Several loud stems summed together can exceed [-1, 1]; tanh keeps
/// the output bounded without hard-clipping artefacts.
#[inline]
pub fn soft_clip(x: f32) -> f32 {
    x.tanh()
}

/// Equal-power pan law
///
/// Maps pan in [-1, 1] (left to right) to (left_gain, right_gain) so that
/// `left² + right² == 1` everywhere. Centre gives -3 dB on both sides.
#[inline]
pub fn equal_power_pan(pan: f32) -> (f32, f32) {
    let pan = if pan.is_finite() { pan.clamp(-1.0, 1.0) } else { 0.0 };
    let angle = (pan + 1.0) * FRAC_PI_4;
    (angle.cos(), angle.sin())
}

/// One-pole smoother
///
/// Smooths abrupt parameter changes to avoid clicks.
/// Formula: y[n] = y[n-1] + α * (x[n] - y[n-1])
pub struct OnePoleSmoother {
    current: f32,
    coefficient: f32,
}

impl OnePoleSmoother {
    /// Create a new smoother
    ///
    /// # Arguments
    /// * `initial_value` - Starting value
    /// * `time_constant_ms` - Time to reach ~63% of the target
    /// * `sample_rate` - Sample rate in Hz
    ///
    /// # Example
    /// ```
    /// use playexl::audio::dsp_utils::OnePoleSmoother;
    /// let smoother = OnePoleSmoother::new(0.8, 10.0, 48000.0);
    /// assert_eq!(smoother.get(), 0.8);
    /// ```
    pub fn new(initial_value: f32, time_constant_ms: f32, sample_rate: f32) -> Self {
        let time_constant_samples = (time_constant_ms * 0.001 * sample_rate).max(1.0);
        let coefficient = 1.0 / time_constant_samples;

        Self {
            current: initial_value,
            coefficient: coefficient.min(1.0),
        }
    }

    /// Process the next target value
    #[inline]
    pub fn process(&mut self, target: f32) -> f32 {
        self.current += self.coefficient * (target - self.current);
        self.current = flush_denormals_to_zero(self.current);
        self.current
    }

    /// Jump to a value without smoothing
    #[inline]
    pub fn reset(&mut self, value: f32) {
        self.current = value;
    }

    #[inline]
    pub fn get(&self) -> f32 {
        self.current
    }
}
