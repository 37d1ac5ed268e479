//! Waveforms for independent sources.

use std::f64::consts::PI;

/// Time-varying level of an independent source.
///
/// `Noise` does not evaluate from `t`; the owning source holds a
/// [`GaussianNoise`] sampler and refreshes its sample once per accepted
/// step.
#[derive(Debug, Clone, PartialEq)]
pub enum Waveform {
    /// Constant level.
    Dc { level: f64 },
    /// `bias + amplitude * sin(2π f t + phase)`.
    Sine {
        bias: f64,
        amplitude: f64,
        frequency: f64,
        phase: f64,
    },
    /// `bias ± amplitude`; high for the first `duty` fraction of each period.
    Square {
        bias: f64,
        amplitude: f64,
        frequency: f64,
        duty: f64,
    },
    /// Symmetric triangle between `bias - amplitude` and `bias + amplitude`.
    Triangle {
        bias: f64,
        amplitude: f64,
        frequency: f64,
    },
    /// Rising ramp from `bias - amplitude` to `bias + amplitude`.
    Sawtooth {
        bias: f64,
        amplitude: f64,
        frequency: f64,
    },
    /// Periodic pulse train: `bias + amplitude` for the first `duty`
    /// fraction of each period, `bias` otherwise; silent before `t_delay`.
    Pulse {
        bias: f64,
        amplitude: f64,
        frequency: f64,
        duty: f64,
        t_delay: f64,
    },
    /// Gaussian noise around `bias` with standard deviation `amplitude`.
    Noise { bias: f64, amplitude: f64 },
}

impl Waveform {
    pub fn dc(level: f64) -> Self {
        Waveform::Dc { level }
    }

    pub fn sine(bias: f64, amplitude: f64, frequency: f64, phase: f64) -> Self {
        Waveform::Sine {
            bias,
            amplitude,
            frequency,
            phase,
        }
    }

    /// True when the level never changes and a single linear stamp suffices.
    pub fn is_dc(&self) -> bool {
        matches!(self, Waveform::Dc { .. })
    }

    /// Evaluate the deterministic level at time `t`.
    ///
    /// For `Noise` this returns the bias; the owning source adds its held
    /// sample on top.
    pub fn value(&self, t: f64) -> f64 {
        match *self {
            Waveform::Dc { level } => level,
            Waveform::Sine {
                bias,
                amplitude,
                frequency,
                phase,
            } => bias + amplitude * (2.0 * PI * frequency * t + phase).sin(),
            Waveform::Square {
                bias,
                amplitude,
                frequency,
                duty,
            } => {
                if fract(frequency * t) < duty {
                    bias + amplitude
                } else {
                    bias - amplitude
                }
            }
            Waveform::Triangle {
                bias,
                amplitude,
                frequency,
            } => {
                let ph = fract(frequency * t);
                // Rises from -amplitude at ph=0 to +amplitude at ph=0.5,
                // then falls back.
                bias + amplitude * (1.0 - 4.0 * (ph - 0.5).abs())
            }
            Waveform::Sawtooth {
                bias,
                amplitude,
                frequency,
            } => bias + amplitude * (2.0 * fract(frequency * t) - 1.0),
            Waveform::Pulse {
                bias,
                amplitude,
                frequency,
                duty,
                t_delay,
            } => {
                if t < t_delay {
                    bias
                } else if fract(frequency * (t - t_delay)) < duty {
                    bias + amplitude
                } else {
                    bias
                }
            }
            Waveform::Noise { bias, .. } => bias,
        }
    }
}

#[inline]
fn fract(x: f64) -> f64 {
    x - x.floor()
}

/// Deterministic Gaussian sampler for noise sources.
///
/// xorshift64* uniform bits fed through Box-Muller. No repo-wide RNG exists;
/// each noise source seeds its own stream so runs are reproducible.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianNoise {
    state: u64,
    spare: Option<f64>,
}

impl GaussianNoise {
    pub fn new(seed: u64) -> Self {
        Self {
            // Zero state would lock xorshift at zero.
            state: if seed == 0 { 0x9e3779b97f4a7c15 } else { seed },
            spare: None,
        }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545f4914f6cdd1d)
    }

    fn next_uniform(&mut self) -> f64 {
        // 53 random bits into (0, 1].
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64 + f64::MIN_POSITIVE
    }

    /// Draw a standard-normal sample.
    pub fn next(&mut self) -> f64 {
        if let Some(s) = self.spare.take() {
            return s;
        }
        let u1 = self.next_uniform();
        let u2 = self.next_uniform();
        let r = (-2.0 * u1.ln()).sqrt();
        let theta = 2.0 * PI * u2;
        self.spare = Some(r * theta.sin());
        r * theta.cos()
    }
}
