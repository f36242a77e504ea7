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

//! Per-channel sample and true peak registers.

use crate::block::try_zeroed;
use crate::interp::{factor_for_rate, Interpolator};
use crate::{Error, Samples};

/// One peak per channel, kept since the last reset and since the last read.
#[derive(Debug, Clone)]
struct Registers {
    all_time: Box<[f64]>,
    since_read: Box<[f64]>,
}

impl Registers {
    fn new(channels: usize) -> Result<Self, Error> {
        Ok(Registers {
            all_time: try_zeroed(channels)?,
            since_read: try_zeroed(channels)?,
        })
    }

    #[inline]
    fn update(&mut self, channel: usize, peak: f64) {
        if peak > self.all_time[channel] {
            self.all_time[channel] = peak;
        }
        if peak > self.since_read[channel] {
            self.since_read[channel] = peak;
        }
    }

    fn take(&mut self, channel: usize) -> f64 {
        std::mem::replace(&mut self.since_read[channel], 0.0)
    }

    fn reset(&mut self) {
        self.all_time.fill(0.0);
        self.since_read.fill(0.0);
    }
}

/// Tracks the sample peak and, optionally, the oversampled true peak of every channel.
#[derive(Debug, Clone)]
pub struct PeakTracker {
    sample: Registers,
    true_peak: Option<Registers>,
    /// `None` if no oversampling is needed at this rate.
    interp: Option<Interpolator>,
}

impl PeakTracker {
    pub fn new(rate: u32, channels: u32, true_peak: bool) -> Result<Self, Error> {
        let channels = channels as usize;

        let interp = match factor_for_rate(rate) {
            factor if true_peak && factor > 1 => Some(Interpolator::new(factor, channels)?),
            _ => None,
        };

        Ok(PeakTracker {
            sample: Registers::new(channels)?,
            true_peak: if true_peak {
                Some(Registers::new(channels)?)
            } else {
                None
            },
            interp,
        })
    }

    pub fn channels(&self) -> usize {
        self.sample.all_time.len()
    }

    /// Oversampling factor used for the true peak, `1` if the input is used as is.
    pub fn oversampling(&self) -> usize {
        self.interp.as_ref().map_or(1, Interpolator::factor)
    }

    pub fn process<'a, S: Samples<'a>>(&mut self, src: &S) {
        assert_eq!(src.channels(), self.channels());
        debug_assert!(self
            .interp
            .as_ref()
            .map_or(true, |interp| interp.channels() == src.channels()));

        if src.frames() == 0 {
            return;
        }

        for c in 0..src.channels() {
            let peak = src.channel(c).fold(0.0f64, |max, x| max.max(x.abs()));
            self.sample.update(c, peak);

            if let Some(ref mut registers) = self.true_peak {
                let interpolated = match self.interp {
                    Some(ref mut interp) => interp.process_peak(c, src.channel(c)),
                    None => 0.0,
                };
                registers.update(c, peak.max(interpolated));
            }
        }
    }

    pub fn sample_peak(&self, channel: usize) -> f64 {
        self.sample.all_time[channel]
    }

    /// Sample peak since the previous call, which starts a new period.
    pub fn take_prev_sample_peak(&mut self, channel: usize) -> f64 {
        self.sample.take(channel)
    }

    /// `None` if true peaks are not tracked.
    pub fn true_peak(&self, channel: usize) -> Option<f64> {
        self.true_peak.as_ref().map(|r| r.all_time[channel])
    }

    pub fn take_prev_true_peak(&mut self, channel: usize) -> Option<f64> {
        self.true_peak.as_mut().map(|r| r.take(channel))
    }

    pub fn reset(&mut self) {
        self.sample.reset();
        if let Some(ref mut registers) = self.true_peak {
            registers.reset();
        }
        if let Some(ref mut interp) = self.interp {
            interp.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Interleaved, Planar};
    use float_eq::assert_float_eq;

    #[test]
    fn oversampling_by_rate() {
        assert_eq!(PeakTracker::new(48_000, 1, true).unwrap().oversampling(), 4);
        assert_eq!(PeakTracker::new(96_000, 1, true).unwrap().oversampling(), 2);
        assert_eq!(PeakTracker::new(192_000, 1, true).unwrap().oversampling(), 1);
        assert_eq!(PeakTracker::new(48_000, 1, false).unwrap().oversampling(), 1);
        assert_eq!(PeakTracker::new(48_000, 1, false).unwrap().true_peak(0), None);
    }

    #[test]
    fn sample_peak_per_channel() {
        let mut peaks = PeakTracker::new(48_000, 2, false).unwrap();
        let data = [0.1f32, -0.5, -0.25, 0.2, 0.0, 0.0];
        peaks.process(&Interleaved::new(&data[..], 2).unwrap());

        assert_float_eq!(peaks.sample_peak(0), 0.25, abs <= 1e-9);
        assert_float_eq!(peaks.sample_peak(1), 0.5, abs <= 1e-9);
    }

    #[test]
    fn prev_accumulates_until_read() {
        let mut peaks = PeakTracker::new(48_000, 1, true).unwrap();
        let loud = [0.8f64; 10];
        let quiet = [0.1f64; 10];
        let planes = [&loud[..]];
        peaks.process(&Planar::new(&planes[..]).unwrap());
        let planes = [&quiet[..]];
        peaks.process(&Planar::new(&planes[..]).unwrap());

        // Both adds are covered by the first read.
        assert_float_eq!(peaks.take_prev_sample_peak(0), 0.8, abs <= 1e-9);
        assert_float_eq!(peaks.take_prev_sample_peak(0), 0.0, abs <= 0.0);
        assert!(peaks.take_prev_true_peak(0).unwrap() >= 0.8);

        peaks.process(&Planar::new(&planes[..]).unwrap());
        assert_float_eq!(peaks.take_prev_sample_peak(0), 0.1, abs <= 1e-9);
        assert_float_eq!(peaks.sample_peak(0), 0.8, abs <= 1e-9);
    }

    #[test]
    fn true_peak_is_at_least_sample_peak() {
        for &rate in &[44_100, 96_000, 192_000] {
            let mut peaks = PeakTracker::new(rate, 1, true).unwrap();
            let data: Vec<f32> = (0..1000)
                .map(|n| f32::sin(n as f32 * 0.3) * 0.9)
                .collect();
            peaks.process(&Interleaved::new(&data[..], 1).unwrap());

            assert!(peaks.true_peak(0).unwrap() >= peaks.sample_peak(0));
        }
    }

    #[test]
    fn reset() {
        let mut peaks = PeakTracker::new(48_000, 1, true).unwrap();
        let data = [1i16 << 14; 64];
        peaks.process(&Interleaved::new(&data[..], 1).unwrap());
        assert_float_eq!(peaks.sample_peak(0), 0.5, abs <= 1e-9);

        peaks.reset();
        assert_float_eq!(peaks.sample_peak(0), 0.0, abs <= 0.0);
        assert_float_eq!(peaks.true_peak(0).unwrap(), 0.0, abs <= 0.0);
        assert_float_eq!(peaks.take_prev_true_peak(0).unwrap(), 0.0, abs <= 0.0);
    }
}
