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

//! ITU-R BS.1770-4 K-weighting: a high shelf modelling the acoustic effect of the head followed
//! by the RLB high-pass, one cascade per channel.

use std::f64::consts::PI;

/// Filter state magnitudes below this are flushed to zero to keep denormals out of silence.
const DENORMAL_THRESHOLD: f64 = 1e-30;

/// Second order section with normalised denominator (`a0 == 1`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

/// Transposed direct form II delay line of a [`Biquad`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BiquadState {
    s1: f64,
    s2: f64,
}

impl Biquad {
    /// Stage 1: +4 dB high shelf around 1.7 kHz.
    #[allow(non_snake_case)]
    pub fn high_shelf(rate: f64) -> Self {
        let f0 = 1681.974450955533;
        let G = 3.999843853973347;
        let Q = 0.7071752369554196;

        let K = f64::tan(PI * f0 / rate);
        let Vh = f64::powf(10.0, G / 20.0);
        let Vb = f64::powf(Vh, 0.4996667741545416);

        let a0 = 1.0 + K / Q + K * K;
        Biquad {
            b0: (Vh + Vb * K / Q + K * K) / a0,
            b1: 2.0 * (K * K - Vh) / a0,
            b2: (Vh - Vb * K / Q + K * K) / a0,
            a1: 2.0 * (K * K - 1.0) / a0,
            a2: (1.0 - K / Q + K * K) / a0,
        }
    }

    /// Stage 2: revised low-frequency B-curve high-pass around 38 Hz.
    ///
    /// The numerator is left unnormalised (`1, -2, 1`) as in BS.1770.
    #[allow(non_snake_case)]
    pub fn high_pass(rate: f64) -> Self {
        let f0 = 38.13547087602444;
        let Q = 0.5003270373238773;

        let K = f64::tan(PI * f0 / rate);
        let a0 = 1.0 + K / Q + K * K;
        Biquad {
            b0: 1.0,
            b1: -2.0,
            b2: 1.0,
            a1: 2.0 * (K * K - 1.0) / a0,
            a2: (1.0 - K / Q + K * K) / a0,
        }
    }

    #[inline(always)]
    pub fn tick(&self, state: &mut BiquadState, x: f64) -> f64 {
        let y = self.b0 * x + state.s1;
        state.s1 = self.b1 * x - self.a1 * y + state.s2;
        state.s2 = self.b2 * x - self.a2 * y;
        y
    }
}

impl BiquadState {
    fn flush_denormals(&mut self) {
        if self.s1.abs() < DENORMAL_THRESHOLD {
            self.s1 = 0.0;
        }
        if self.s2.abs() < DENORMAL_THRESHOLD {
            self.s2 = 0.0;
        }
    }
}

/// K-weighting filter bank: shared coefficients, one delay line pair per channel.
#[derive(Debug, Clone)]
pub struct KWeighting {
    shelf: Biquad,
    high_pass: Biquad,
    /// `[shelf, high_pass]` state per channel.
    state: Box<[[BiquadState; 2]]>,
}

impl KWeighting {
    pub fn new(rate: u32, channels: u32) -> Self {
        assert!(rate > 0);
        assert!(channels > 0);

        KWeighting {
            shelf: Biquad::high_shelf(rate as f64),
            high_pass: Biquad::high_pass(rate as f64),
            state: vec![[BiquadState::default(); 2]; channels as usize].into_boxed_slice(),
        }
    }

    pub fn channels(&self) -> usize {
        self.state.len()
    }

    pub fn reset(&mut self) {
        self.state.fill([BiquadState::default(); 2]);
    }

    #[inline(always)]
    fn tick(&mut self, channel: usize, x: f64) -> f64 {
        let [shelf, high_pass] = &mut self.state[channel];
        let y = self.shelf.tick(shelf, x);
        self.high_pass.tick(high_pass, y)
    }

    /// Filter `input` of `channel` and write the squared filter output to `squares`.
    ///
    /// Stops at whichever of `input` and `squares` ends first.
    pub fn process_squared(
        &mut self,
        channel: usize,
        input: impl Iterator<Item = f64>,
        squares: &mut [f64],
    ) {
        assert!(channel < self.state.len());

        let [shelf_state, high_pass_state] = &mut self.state[channel];
        let (shelf, high_pass) = (&self.shelf, &self.high_pass);
        for (x, out) in input.zip(squares.iter_mut()) {
            let y = high_pass.tick(high_pass_state, shelf.tick(shelf_state, x));
            *out = y * y;
        }
    }

    /// Run `input` of `channel` through the filter and discard the output.
    pub fn warm_up(&mut self, channel: usize, input: impl Iterator<Item = f64>) {
        assert!(channel < self.state.len());

        for x in input {
            self.tick(channel, x);
        }
    }

    pub fn flush_denormals(&mut self) {
        for state in self.state.iter_mut().flatten() {
            state.flush_denormals();
        }
    }
}
