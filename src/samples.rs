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

use dasp_sample::ToSample;

use crate::Error;

/// Sample formats accepted by [`LoudnessMeter::add_frames`](crate::LoudnessMeter::add_frames).
///
/// Fixed-point formats are normalised to `[-1.0, 1.0)` by dividing through their full-scale
/// magnitude, floating-point formats are taken as-is.
pub trait Sample: Copy + ToSample<f64> + Send + Sync + 'static {
    /// Convert to the engine's internal representation.
    #[inline(always)]
    fn to_normalized(self) -> f64 {
        self.to_sample_()
    }
}

impl Sample for i16 {}
impl Sample for i32 {}
impl Sample for f32 {}
impl Sample for f64 {}

#[inline(always)]
fn normalize<S: Sample>(sample: &S) -> f64 {
    sample.to_normalized()
}

/// A borrowed run of frames, independent of the memory layout.
pub trait Samples<'a>: Sized {
    /// Iterator over one channel's normalised samples.
    type Channel: Iterator<Item = f64> + 'a;

    /// Number of channels.
    fn channels(&self) -> usize;

    /// Number of frames.
    fn frames(&self) -> usize;

    /// The samples of `channel`, one per frame.
    fn channel(&self, channel: usize) -> Self::Channel;

    /// Split into the first `frame` frames and the rest.
    fn split_at(self, frame: usize) -> (Self, Self);
}

/// Interleaved frames: `L R L R ...`.
#[derive(Debug, Clone, Copy)]
pub struct Interleaved<'a, S> {
    data: &'a [S],
    channels: usize,
}

impl<'a, S> Interleaved<'a, S> {
    /// Wrap `data`, which must contain whole frames of `channels` samples.
    pub fn new(data: &'a [S], channels: usize) -> Result<Self, Error> {
        if channels == 0 || data.len() % channels != 0 {
            return Err(Error::InvalidChannelIndex);
        }

        Ok(Interleaved { data, channels })
    }
}

impl<'a, S: Sample> Samples<'a> for Interleaved<'a, S> {
    type Channel = std::iter::Map<std::iter::StepBy<std::slice::Iter<'a, S>>, fn(&'a S) -> f64>;

    #[inline]
    fn channels(&self) -> usize {
        self.channels
    }

    #[inline]
    fn frames(&self) -> usize {
        self.data.len() / self.channels
    }

    #[inline]
    fn channel(&self, channel: usize) -> Self::Channel {
        assert!(channel < self.channels);

        let data: &'a [S] = self.data.get(channel..).unwrap_or(&[]);
        data.iter()
            .step_by(self.channels)
            .map(normalize::<S> as fn(&'a S) -> f64)
    }

    #[inline]
    fn split_at(self, frame: usize) -> (Self, Self) {
        let (head, tail) = self.data.split_at(frame * self.channels);
        (
            Interleaved {
                data: head,
                channels: self.channels,
            },
            Interleaved {
                data: tail,
                channels: self.channels,
            },
        )
    }
}

/// Planar frames: one slice per channel.
#[derive(Debug, Clone, Copy)]
pub struct Planar<'a, S> {
    data: &'a [&'a [S]],
    start: usize,
    end: usize,
}

impl<'a, S> Planar<'a, S> {
    /// Wrap `data`, which must hold at least one channel and equally long channels.
    pub fn new(data: &'a [&'a [S]]) -> Result<Self, Error> {
        let len = match data.first() {
            Some(first) => first.len(),
            None => return Err(Error::InvalidChannelIndex),
        };

        if data.iter().any(|plane| plane.len() != len) {
            return Err(Error::InvalidChannelIndex);
        }

        Ok(Planar {
            data,
            start: 0,
            end: len,
        })
    }
}

impl<'a, S: Sample> Samples<'a> for Planar<'a, S> {
    type Channel = std::iter::Map<std::slice::Iter<'a, S>, fn(&'a S) -> f64>;

    #[inline]
    fn channels(&self) -> usize {
        self.data.len()
    }

    #[inline]
    fn frames(&self) -> usize {
        self.end - self.start
    }

    #[inline]
    fn channel(&self, channel: usize) -> Self::Channel {
        let plane: &'a [S] = self.data[channel];
        plane[self.start..self.end]
            .iter()
            .map(normalize::<S> as fn(&'a S) -> f64)
    }

    #[inline]
    fn split_at(self, frame: usize) -> (Self, Self) {
        assert!(self.start + frame <= self.end);

        let mid = self.start + frame;
        (
            Planar {
                data: self.data,
                start: self.start,
                end: mid,
            },
            Planar {
                data: self.data,
                start: mid,
                end: self.end,
            },
        )
    }
}
