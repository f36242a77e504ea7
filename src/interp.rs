// Copyright (c) 2011 Jan Kokemüller
// Copyright (c) 2020 Sebastian Dröge <sebastian@centricular.com>
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
// THE SOFTWARE.

//! Polyphase oversampling used for true-peak estimation.

use smallvec::SmallVec;
use std::f64;

use crate::block::try_zeroed;
use crate::Error;

/// Taps per polyphase phase.
const TAPS_PER_PHASE: usize = 12;

/// Oversampling factor needed for a true-peak estimate at `rate`. `1` means no oversampling.
pub fn factor_for_rate(rate: u32) -> usize {
    if rate < 96_000 {
        4
    } else if rate < 192_000 {
        2
    } else {
        1
    }
}

/// One output phase: coefficients and the delay they apply to.
type Phase = SmallVec<[(f64, usize); TAPS_PER_PHASE + 1]>;

/// Hann-windowed sinc interpolator, one delay line per channel.
#[derive(Debug, Clone)]
pub struct Interpolator {
    factor: usize,
    delay: usize,
    phases: SmallVec<[Phase; 4]>,
    /// `delay` samples per channel.
    z: Box<[f64]>,
    /// Write position of every channel's delay line.
    zi: Box<[usize]>,
}

impl Interpolator {
    pub fn new(factor: usize, channels: usize) -> Result<Self, Error> {
        debug_assert!(factor > 0);

        let taps = TAPS_PER_PHASE * factor + 1;
        let delay = (taps + factor - 1) / factor;
        let mut phases: SmallVec<[Phase; 4]> = (0..factor).map(|_| Phase::new()).collect();

        for j in 0..taps {
            const ALMOST_ZERO: f64 = 0.000_001;

            let w = 0.5 * (1.0 - f64::cos(2.0 * f64::consts::PI * j as f64 / (taps - 1) as f64));
            let m = j as f64 - (taps - 1) as f64 / 2.0;
            let c = if m.abs() > ALMOST_ZERO {
                let x = m * f64::consts::PI / factor as f64;
                w * f64::sin(x) / x
            } else {
                w
            };

            if c.abs() > ALMOST_ZERO {
                phases[j % factor].push((c, j / factor));
            }
        }

        // Unity DC gain for every phase.
        for phase in &mut phases {
            let sum: f64 = phase.iter().map(|(c, _)| *c).sum();
            if sum.abs() > 1e-10 {
                for (c, _) in phase.iter_mut() {
                    *c /= sum;
                }
            }
        }

        let len = delay.checked_mul(channels).ok_or(Error::OutOfMemory)?;

        Ok(Interpolator {
            factor,
            delay,
            phases,
            z: try_zeroed(len)?,
            zi: try_zeroed(channels)?,
        })
    }

    pub fn factor(&self) -> usize {
        self.factor
    }

    pub fn channels(&self) -> usize {
        self.zi.len()
    }

    pub fn reset(&mut self) {
        self.z.fill(0.0);
        self.zi.fill(0);
    }

    /// Oversample `input` for `channel` and return the largest absolute interpolated value.
    pub fn process_peak(&mut self, channel: usize, input: impl Iterator<Item = f64>) -> f64 {
        let delay = self.delay;
        let z = &mut self.z[channel * delay..][..delay];
        let mut zi = self.zi[channel];
        let mut peak = 0.0f64;

        for x in input {
            z[zi] = x;

            for phase in &self.phases {
                let mut acc = 0.0;
                for (c, index) in phase {
                    let i = if *index > zi { zi + delay - *index } else { zi - *index };
                    acc += z[i] * *c;
                }
                peak = peak.max(acc.abs());
            }

            zi += 1;
            if zi == delay {
                zi = 0;
            }
        }

        self.zi[channel] = zi;
        peak
    }
}
