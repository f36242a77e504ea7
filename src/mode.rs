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

use bitflags::bitflags;

use crate::Error;

bitflags! {
    /// Measurement capabilities.
    ///
    /// Passed to [`LoudnessMeter::new`](crate::LoudnessMeter::new). Every query checks that its
    /// capability was requested at creation. Request only what is needed, the cheaper modes
    /// skip whole processing stages.
    pub struct Mode: u8 {
        /// [`LoudnessMeter::loudness_momentary`](crate::LoudnessMeter::loudness_momentary)
        const M = 0b0000_0001;
        /// [`LoudnessMeter::loudness_shortterm`](crate::LoudnessMeter::loudness_shortterm)
        const S = 0b0000_0010 | Mode::M.bits;
        /// [`LoudnessMeter::loudness_global`](crate::LoudnessMeter::loudness_global) and
        /// [`LoudnessMeter::relative_threshold`](crate::LoudnessMeter::relative_threshold)
        const I = 0b0000_0100 | Mode::M.bits;
        /// [`LoudnessMeter::loudness_range`](crate::LoudnessMeter::loudness_range)
        const LRA = 0b0000_1000 | Mode::S.bits;
        /// [`LoudnessMeter::sample_peak`](crate::LoudnessMeter::sample_peak)
        const SAMPLE_PEAK = 0b0001_0000 | Mode::M.bits;
        /// [`LoudnessMeter::true_peak`](crate::LoudnessMeter::true_peak)
        const TRUE_PEAK = 0b0010_0000 | Mode::SAMPLE_PEAK.bits;
        /// Store gating blocks in a fixed-size histogram instead of a bounded queue.
        ///
        /// Memory stays constant over arbitrarily long programmes at the cost of 0.1 LU
        /// quantisation.
        const HISTOGRAM = 0b0100_0000;
    }
}

impl Mode {
    /// Fails with [`Error::InvalidMode`] unless all of `needed` is enabled.
    pub(crate) fn require(self, needed: Mode) -> Result<(), Error> {
        if self.contains(needed) {
            Ok(())
        } else {
            Err(Error::InvalidMode)
        }
    }

    /// Smallest usable window / history duration in ms for this mode.
    pub(crate) fn min_duration(self) -> u32 {
        if self.contains(Mode::S) {
            3000
        } else {
            400
        }
    }
}
