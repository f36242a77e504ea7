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

//! Sliding store of squared K-weighted samples and the 100 ms gating block schedule.

use crate::{Channel, Error};

/// Hops (100 ms) per gating block (400 ms).
pub const BLOCK_HOPS: u64 = 4;
/// Hops per short-term window (3 s).
pub const SHORT_TERM_HOPS: u64 = 30;
/// Hops between two short-term measurements collected for the loudness range.
pub const SHORT_TERM_INTERVAL_HOPS: u64 = 10;

/// Frames in 100 ms, rounded.
pub fn frames_per_hop(rate: u32) -> usize {
    (rate as usize + 5) / 10
}

/// Frames in `ms` milliseconds, rounded down, or `None` on overflow.
pub fn frames_in(rate: u32, ms: u32) -> Option<usize> {
    let frames = (rate as u64).checked_mul(ms as u64)? / 1000;
    usize::try_from(frames).ok()
}

/// Allocate a zeroed buffer, reporting allocation failure instead of aborting.
pub(crate) fn try_zeroed<T: Default + Clone>(len: usize) -> Result<Box<[T]>, Error> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| Error::OutOfMemory)?;
    buffer.resize(len, T::default());
    Ok(buffer.into_boxed_slice())
}

/// A gating block that was just completed by [`BlockAccumulator::commit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinishedBlock {
    /// 1-based index since the last reset.
    pub index: u64,
    /// Whether a short-term window for the loudness range ends here as well.
    pub short_term_due: bool,
}

/// Ring buffer of squared filtered samples, planar, holding the maximum window.
///
/// Callers write at most [`writable`](Self::writable) frames per channel into the slots
/// returned by [`slot`](Self::slot) and then [`commit`](Self::commit) them. Writes never cross a
/// block boundary or the end of the ring, so every boundary is observed exactly once no matter
/// how the input is chunked.
#[derive(Debug)]
pub struct BlockAccumulator {
    channels: usize,
    hop: usize,
    capacity: usize,
    squares: Box<[f64]>,
    write_pos: usize,
    until_block: usize,
    blocks: u64,
}

impl BlockAccumulator {
    pub fn new(channels: u32, rate: u32, window_ms: u32) -> Result<Self, Error> {
        let hop = frames_per_hop(rate);
        assert!(hop > 0);

        let frames = frames_in(rate, window_ms).ok_or(Error::OutOfMemory)?;
        // Whole hops, and never less than one gating block.
        let capacity = std::cmp::max(
            frames
                .checked_add(hop - 1)
                .ok_or(Error::OutOfMemory)?
                / hop
                * hop,
            BLOCK_HOPS as usize * hop,
        );
        let len = capacity
            .checked_mul(channels as usize)
            .ok_or(Error::OutOfMemory)?;

        Ok(BlockAccumulator {
            channels: channels as usize,
            hop,
            capacity,
            squares: try_zeroed(len)?,
            write_pos: 0,
            until_block: BLOCK_HOPS as usize * hop,
            blocks: 0,
        })
    }

    /// Frames per 100 ms hop.
    pub fn hop(&self) -> usize {
        self.hop
    }

    /// Frames per channel the ring can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Gating blocks finished since the last reset.
    pub fn blocks(&self) -> u64 {
        self.blocks
    }

    /// Frames that can be written before the next block boundary or the end of the ring.
    pub fn writable(&self) -> usize {
        std::cmp::min(self.until_block, self.capacity - self.write_pos)
    }

    /// Destination for the next `frames` squared samples of `channel`.
    pub fn slot(&mut self, channel: usize, frames: usize) -> &mut [f64] {
        assert!(channel < self.channels);
        assert!(frames <= self.writable());

        let start = channel * self.capacity + self.write_pos;
        &mut self.squares[start..start + frames]
    }

    /// Mark `frames` frames of every channel as written.
    pub fn commit(&mut self, frames: usize) -> Option<FinishedBlock> {
        assert!(frames <= self.writable());

        self.write_pos += frames;
        if self.write_pos == self.capacity {
            self.write_pos = 0;
        }

        self.until_block -= frames;
        if self.until_block > 0 {
            return None;
        }

        // Every block after the first one only needs one more hop.
        self.until_block = self.hop;
        self.blocks += 1;

        let end_hops = self.blocks + BLOCK_HOPS - 1;
        let short_term_due = end_hops >= SHORT_TERM_HOPS
            && (end_hops - SHORT_TERM_HOPS) % SHORT_TERM_INTERVAL_HOPS == 0;

        Some(FinishedBlock {
            index: self.blocks,
            short_term_due,
        })
    }

    /// Channel-weighted mean square over the last `frames` frames.
    ///
    /// `None` if the ring doesn't hold that many frames.
    pub fn energy(&self, frames: usize, channel_map: &[Channel]) -> Option<f64> {
        assert_eq!(channel_map.len(), self.channels);

        if frames > self.capacity {
            return None;
        }
        if frames == 0 {
            return Some(0.0);
        }

        let mut sum = 0.0;
        for (channel, squares) in Iterator::zip(
            channel_map.iter(),
            self.squares.chunks_exact(self.capacity),
        ) {
            let weight = channel.weight();
            if weight == 0.0 {
                continue;
            }

            // Oldest frames first, so the result is independent of the ring position.
            let (older, newer) = if frames <= self.write_pos {
                (&[][..], &squares[self.write_pos - frames..self.write_pos])
            } else {
                (
                    &squares[self.capacity - (frames - self.write_pos)..],
                    &squares[..self.write_pos],
                )
            };

            let mut channel_sum = 0.0;
            for square in older.iter().chain(newer) {
                channel_sum += *square;
            }

            sum += channel_sum * weight;
        }

        Some(sum / frames as f64)
    }

    /// Drop all audio and restart the block schedule.
    pub fn reset(&mut self) {
        self.squares.fill(0.0);
        self.write_pos = 0;
        self.until_block = BLOCK_HOPS as usize * self.hop;
        self.blocks = 0;
    }
}
