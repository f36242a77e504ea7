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

use crate::block::{BlockAccumulator, FinishedBlock, BLOCK_HOPS, SHORT_TERM_HOPS};
use crate::channel::default_channel_map;
use crate::filter::KWeighting;
use crate::history::History;
use crate::peak::PeakTracker;
use crate::{energy_to_loudness, Channel, Error, Interleaved, Mode, Planar, Sample, Samples};

const MAX_RATE: u32 = 2_822_400;
const MAX_CHANNELS: u32 = 64;

fn check_parameters(channels: u32, rate: u32) -> Result<(), Error> {
    if channels == 0 || channels > MAX_CHANNELS {
        return Err(Error::OutOfMemory);
    }

    if !(16..=MAX_RATE).contains(&rate) {
        return Err(Error::OutOfMemory);
    }

    Ok(())
}

/// Queue sizes for the momentary blocks and the short-term blocks kept for `history` ms.
fn history_sizes(history: u32) -> (usize, usize) {
    (history as usize / 100, history as usize / 1000)
}

fn to_loudness(energy: f64) -> f64 {
    if energy <= 0.0 {
        f64::NEG_INFINITY
    } else {
        energy_to_loudness(energy)
    }
}

/// EBU R128 loudness meter.
///
/// Feed audio with [`add_frames`](Self::add_frames) or
/// [`add_frames_planar`](Self::add_frames_planar) and query at any time. Frames may arrive in
/// chunks of any size, the results do not depend on how the input was split.
#[derive(Debug)]
pub struct LoudnessMeter {
    /// The current mode.
    mode: Mode,
    /// The sample rate.
    rate: u32,
    /// The number of channels.
    channels: u32,
    /// The channel map. Has as many elements as there are channels.
    channel_map: Box<[Channel]>,
    filter: KWeighting,
    /// Squared filtered audio and the block schedule.
    blocks: BlockAccumulator,
    /// Momentary block energies for the integrated loudness.
    block_history: History,
    /// Short-term block energies for the loudness range.
    short_term_history: History,
    peaks: PeakTracker,
    /// The maximum window duration in ms.
    window: u32,
    /// The maximum history in ms.
    history: u32,
}

impl LoudnessMeter {
    /// Create a new meter with the given configuration.
    ///
    /// `channels` must be within `1..=64` and `rate` within `16..=2_822_400`, otherwise
    /// [`Error::OutOfMemory`] is returned. `mode` must contain at least [`Mode::M`].
    pub fn new(channels: u32, rate: u32, mode: Mode) -> Result<Self, Error> {
        check_parameters(channels, rate)?;
        mode.require(Mode::M)?;

        let window = mode.min_duration();
        let history = u32::MAX;
        let (blocks_max, short_term_max) = history_sizes(history);
        let use_histogram = mode.contains(Mode::HISTOGRAM);

        let blocks = BlockAccumulator::new(channels, rate, window)?;
        let peaks = PeakTracker::new(rate, channels, mode.contains(Mode::TRUE_PEAK))?;

        tracing::debug!(
            channels,
            rate,
            ?mode,
            window,
            oversampling = peaks.oversampling(),
            "Created loudness meter"
        );

        Ok(LoudnessMeter {
            mode,
            rate,
            channels,
            channel_map: default_channel_map(channels),
            filter: KWeighting::new(rate, channels),
            blocks,
            block_history: History::new(use_histogram, blocks_max),
            short_term_history: History::new(use_histogram, short_term_max),
            peaks,
            window,
            history,
        })
    }

    /// Get the configured mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Get the configured number of channels.
    pub fn channels(&self) -> u32 {
        self.channels
    }

    /// Get the configured sample rate.
    pub fn rate(&self) -> u32 {
        self.rate
    }

    /// Get the configured channel types.
    pub fn channel_map(&self) -> &[Channel] {
        &self.channel_map
    }

    /// Get the configured maximum window duration in ms.
    pub fn max_window(&self) -> u32 {
        self.window
    }

    /// Get the configured maximum history in ms.
    pub fn max_history(&self) -> u32 {
        self.history
    }

    /// Set channel type.
    ///
    /// The default is:
    ///
    /// * 0 \-> `Left`
    /// * 1 \-> `Right`
    /// * 2 \-> `Center`
    /// * 3 \-> `Unused`
    /// * 4 \-> `LeftSurround`
    /// * 5 \-> `RightSurround`
    /// * _ \-> `Unused`
    pub fn set_channel(&mut self, channel_number: u32, value: Channel) -> Result<(), Error> {
        if channel_number >= self.channels {
            return Err(Error::InvalidChannelIndex);
        }

        self.channel_map[channel_number as usize] = value;
        Ok(())
    }

    /// Set all channel types at once. `channel_map` needs one entry per channel.
    pub fn set_channel_map(&mut self, channel_map: &[Channel]) -> Result<(), Error> {
        if channel_map.len() != self.channels as usize {
            return Err(Error::InvalidChannelIndex);
        }

        self.channel_map.copy_from_slice(channel_map);
        Ok(())
    }

    /// Change the number of channels and the sample rate.
    ///
    /// Filter state, the unfinished block and all peaks are dropped and the channel map is set
    /// back to its default. Gating histories are kept. Returns [`Error::NoChange`] without
    /// touching anything if both values are unchanged.
    pub fn change_parameters(&mut self, channels: u32, rate: u32) -> Result<(), Error> {
        check_parameters(channels, rate)?;

        if self.channels == channels && self.rate == rate {
            return Err(Error::NoChange);
        }

        let blocks = BlockAccumulator::new(channels, rate, self.window)?;
        let peaks = PeakTracker::new(rate, channels, self.mode.contains(Mode::TRUE_PEAK))?;

        self.blocks = blocks;
        self.filter = KWeighting::new(rate, channels);
        self.peaks = peaks;
        self.channel_map = default_channel_map(channels);
        self.channels = channels;
        self.rate = rate;

        tracing::debug!(channels, rate, "Changed parameters");

        Ok(())
    }

    /// Set the maximum window duration.
    ///
    /// Set the maximum duration in ms that will be used for
    /// [`loudness_window`](Self::loudness_window). Values below 3000 ms with [`Mode::S`] or
    /// 400 ms otherwise are raised to that minimum. Note that this destroys the current content
    /// of the audio buffer.
    pub fn set_max_window(&mut self, window: u32) -> Result<(), Error> {
        let window = std::cmp::max(window, self.mode.min_duration());

        if window == self.window {
            return Err(Error::NoChange);
        }

        self.blocks = BlockAccumulator::new(self.channels, self.rate, window)?;
        self.window = window;

        tracing::debug!(window, frames = self.blocks.capacity(), "Changed maximum window");

        Ok(())
    }

    /// Set the maximum history.
    ///
    /// Set the maximum history in ms that will be stored for loudness integration. More history
    /// provides more accurate results, but requires more resources.
    ///
    /// Applies to [`loudness_range`](Self::loudness_range) and
    /// [`loudness_global`](Self::loudness_global) when [`Mode::HISTOGRAM`] is not set. Blocks
    /// beyond the new limit are dropped when the next block is stored.
    ///
    /// Default is `u32::MAX` (~49 days). Minimum is 3000 ms for [`Mode::S`] and 400 ms otherwise.
    pub fn set_max_history(&mut self, history: u32) -> Result<(), Error> {
        let history = std::cmp::max(history, self.mode.min_duration());

        if history == self.history {
            return Err(Error::NoChange);
        }

        self.history = history;

        let (blocks_max, short_term_max) = history_sizes(history);
        self.block_history.set_max_size(blocks_max);
        self.short_term_history.set_max_size(short_term_max);

        tracing::debug!(history, "Changed maximum history");

        Ok(())
    }

    /// Resets the current state.
    ///
    /// Configuration and channel map are kept.
    pub fn reset(&mut self) {
        tracing::debug!(blocks = self.blocks.blocks(), "Resetting loudness meter");

        self.blocks.reset();
        self.filter.reset();
        self.peaks.reset();
        self.block_history.reset();
        self.short_term_history.reset();
    }

    fn process<'a, S: Samples<'a>>(&mut self, mut src: S) -> Result<(), Error> {
        if src.channels() != self.channels as usize {
            return Err(Error::InvalidChannelIndex);
        }

        if src.frames() == 0 {
            return Ok(());
        }
        debug_assert_eq!(self.filter.channels(), src.channels());

        if self.mode.contains(Mode::SAMPLE_PEAK) {
            self.peaks.process(&src);
        }

        while src.frames() > 0 {
            let frames = std::cmp::min(src.frames(), self.blocks.writable());
            let (current, next) = src.split_at(frames);

            for (c, channel) in self.channel_map.iter().enumerate() {
                let slot = self.blocks.slot(c, frames);
                if *channel == Channel::Unused {
                    slot.fill(0.0);
                } else {
                    self.filter.process_squared(c, current.channel(c), slot);
                }
            }

            if let Some(block) = self.blocks.commit(frames) {
                self.finish_block(block);
            }

            src = next;
        }

        Ok(())
    }

    fn finish_block(&mut self, block: FinishedBlock) {
        self.filter.flush_denormals();

        let hop = self.blocks.hop();

        if self.mode.contains(Mode::I) {
            if let Some(energy) = self
                .blocks
                .energy(BLOCK_HOPS as usize * hop, &self.channel_map)
            {
                self.block_history.add(energy);
            }
        }

        if self.mode.contains(Mode::LRA) && block.short_term_due {
            if let Some(energy) = self
                .blocks
                .energy(SHORT_TERM_HOPS as usize * hop, &self.channel_map)
            {
                self.short_term_history.add(energy);
            }
        }

        tracing::trace!(
            index = block.index,
            short_term = block.short_term_due,
            "Finished gating block"
        );
    }

    fn seed<'a, S: Samples<'a>>(&mut self, src: S) -> Result<(), Error> {
        if src.channels() != self.channels as usize {
            return Err(Error::InvalidChannelIndex);
        }

        for (c, channel) in self.channel_map.iter().enumerate() {
            if *channel != Channel::Unused {
                self.filter.warm_up(c, src.channel(c));
            }
        }

        Ok(())
    }

    /// Add interleaved frames to be processed.
    ///
    /// `frames` must hold whole frames, otherwise [`Error::InvalidChannelIndex`] is returned.
    pub fn add_frames<S: Sample>(&mut self, frames: &[S]) -> Result<(), Error> {
        self.process(Interleaved::new(frames, self.channels as usize)?)
    }

    /// Add planar frames to be processed, one slice per channel.
    pub fn add_frames_planar<S: Sample>(&mut self, frames: &[&[S]]) -> Result<(), Error> {
        self.process(Planar::new(frames)?)
    }

    /// Add interleaved frames to warm up the filters without measuring them.
    ///
    /// This allows splitting a long signal into chunks that are measured by separate meters and
    /// combined afterwards:
    ///  1. Split the signal into chunks of whole 100 ms that overlap by 100 ms.
    ///  2. For every chunk but the first, create a new meter, feed the overlapping 100 ms through
    ///     `seed_frames` and the rest through [`add_frames`](Self::add_frames).
    ///  3. Call [`loudness_global_multiple`](crate::loudness_global_multiple) over all meters.
    pub fn seed_frames<S: Sample>(&mut self, frames: &[S]) -> Result<(), Error> {
        self.seed(Interleaved::new(frames, self.channels as usize)?)
    }

    /// Add planar frames to warm up the filters without measuring them.
    /// See [`seed_frames`](Self::seed_frames).
    pub fn seed_frames_planar<S: Sample>(&mut self, frames: &[&[S]]) -> Result<(), Error> {
        self.seed(Planar::new(frames)?)
    }

    fn energy_in_interval(&self, interval_frames: usize) -> Result<f64, Error> {
        self.blocks
            .energy(interval_frames, &self.channel_map)
            .ok_or(Error::InvalidMode)
    }

    /// Get momentary loudness (last 400ms) in LUFS.
    pub fn loudness_momentary(&self) -> Result<f64, Error> {
        self.mode.require(Mode::M)?;

        let energy = self.energy_in_interval(BLOCK_HOPS as usize * self.blocks.hop())?;
        Ok(to_loudness(energy))
    }

    /// Get short-term loudness (last 3s) in LUFS.
    pub fn loudness_shortterm(&self) -> Result<f64, Error> {
        self.mode.require(Mode::S)?;

        let energy = self.energy_in_interval(SHORT_TERM_HOPS as usize * self.blocks.hop())?;
        Ok(to_loudness(energy))
    }

    /// Get loudness of the specified window in LUFS.
    ///
    /// window must not be larger than the current window. The current window can be changed by
    /// calling [`set_max_window`](Self::set_max_window).
    pub fn loudness_window(&self, window: u32) -> Result<f64, Error> {
        if window > self.window {
            return Err(Error::InvalidMode);
        }

        let interval_frames =
            crate::block::frames_in(self.rate, window).ok_or(Error::InvalidMode)?;

        let energy = self.energy_in_interval(interval_frames)?;
        Ok(to_loudness(energy))
    }

    /// Get global integrated loudness in LUFS.
    pub fn loudness_global(&self) -> Result<f64, Error> {
        Ok(self.block_history()?.gated_loudness())
    }

    /// Get relative threshold in LUFS.
    pub fn relative_threshold(&self) -> Result<f64, Error> {
        Ok(self.block_history()?.relative_threshold())
    }

    /// Number of gating blocks that pass both gates and their summed energy.
    ///
    /// Integrated loudness is `energy / count` converted to LUFS. Exposed so results of
    /// independent meters can be weighted by the caller.
    pub fn gating_block_count_and_energy(&self) -> Result<(u64, f64), Error> {
        Ok(History::gated_sum_multiple(&[self.block_history()?]))
    }

    /// Get loudness range (LRA) of programme in LU.
    ///
    /// Calculates loudness range according to EBU 3342.
    pub fn loudness_range(&self) -> Result<f64, Error> {
        self.short_term_history()?.loudness_range()
    }

    fn check_peak(&self, mode: Mode, channel_number: u32) -> Result<usize, Error> {
        self.mode.require(mode)?;

        if channel_number >= self.channels {
            return Err(Error::InvalidChannelIndex);
        }

        Ok(channel_number as usize)
    }

    /// Get maximum sample peak from all frames that have been processed.
    ///
    /// The equation to convert to dBFS is: 20 * log10(out)
    pub fn sample_peak(&self, channel_number: u32) -> Result<f64, Error> {
        let c = self.check_peak(Mode::SAMPLE_PEAK, channel_number)?;
        Ok(self.peaks.sample_peak(c))
    }

    /// Get maximum sample peak since the previous call of this function.
    ///
    /// The peak accumulates over any number of [`add_frames`](Self::add_frames) calls and is
    /// cleared by reading it.
    pub fn prev_sample_peak(&mut self, channel_number: u32) -> Result<f64, Error> {
        let c = self.check_peak(Mode::SAMPLE_PEAK, channel_number)?;
        Ok(self.peaks.take_prev_sample_peak(c))
    }

    /// Get maximum true peak from all frames that have been processed.
    ///
    /// Uses an implementation defined algorithm to calculate the true peak. Do not try to compare
    /// resulting values across different versions of the library, as the algorithm may change.
    ///
    /// The current implementation uses a Hann-windowed sinc polyphase interpolator with 12 taps
    /// per phase. Will oversample 4x for sample rates < 96000 Hz, 2x for sample rates < 192000 Hz
    /// and leave the signal unchanged otherwise. The result is never below the sample peak.
    ///
    /// The equation to convert to dBTP is: 20 * log10(out)
    pub fn true_peak(&self, channel_number: u32) -> Result<f64, Error> {
        let c = self.check_peak(Mode::TRUE_PEAK, channel_number)?;
        self.peaks.true_peak(c).ok_or(Error::InvalidMode)
    }

    /// Get maximum true peak since the previous call of this function.
    ///
    /// See [`true_peak`](Self::true_peak) and [`prev_sample_peak`](Self::prev_sample_peak).
    pub fn prev_true_peak(&mut self, channel_number: u32) -> Result<f64, Error> {
        let c = self.check_peak(Mode::TRUE_PEAK, channel_number)?;
        self.peaks.take_prev_true_peak(c).ok_or(Error::InvalidMode)
    }

    pub(crate) fn block_history(&self) -> Result<&History, Error> {
        self.mode.require(Mode::I)?;
        Ok(&self.block_history)
    }

    pub(crate) fn short_term_history(&self) -> Result<&History, Error> {
        self.mode.require(Mode::LRA)?;
        Ok(&self.short_term_history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::Signal;
    use float_eq::assert_float_eq;
    use quickcheck_macros::quickcheck;

    /// Interleaved sine of `amplitude` on every channel.
    fn sine(freq: f32, amplitude: f32, rate: u32, channels: u32, seconds: f32) -> Vec<f32> {
        let frames = (rate as f32 * seconds) as usize;
        let step = 2.0 * std::f32::consts::PI * freq / rate as f32;

        let mut data = Vec::with_capacity(frames * channels as usize);
        for n in 0..frames {
            let val = amplitude * f32::sin(n as f32 * step);
            data.extend(std::iter::repeat(val).take(channels as usize));
        }
        data
    }

    fn db_to_amplitude(db: f32) -> f32 {
        f32::powf(10.0, db / 20.0)
    }

    fn same(a: f64, b: f64) -> bool {
        a == b || (a - b).abs() <= 1e-9
    }

    #[test]
    fn invalid_parameters() {
        assert_eq!(
            LoudnessMeter::new(0, 48_000, Mode::all()).unwrap_err(),
            Error::OutOfMemory
        );
        assert_eq!(
            LoudnessMeter::new(65, 48_000, Mode::all()).unwrap_err(),
            Error::OutOfMemory
        );
        assert_eq!(
            LoudnessMeter::new(2, 15, Mode::all()).unwrap_err(),
            Error::OutOfMemory
        );
        assert_eq!(
            LoudnessMeter::new(2, 48_000, Mode::HISTOGRAM).unwrap_err(),
            Error::InvalidMode
        );
        assert!(LoudnessMeter::new(64, 48_000, Mode::M).is_ok());
        assert!(LoudnessMeter::new(1, 2_822_400, Mode::M).is_ok());
        assert!(LoudnessMeter::new(1, 16, Mode::M).is_ok());
    }

    #[test]
    fn defaults() {
        let meter = LoudnessMeter::new(8, 44_100, Mode::S).unwrap();
        assert_eq!(meter.mode(), Mode::S);
        assert_eq!(meter.channels(), 8);
        assert_eq!(meter.rate(), 44_100);
        assert_eq!(meter.max_window(), 3000);
        assert_eq!(meter.max_history(), u32::MAX);
        assert_eq!(
            meter.channel_map(),
            &[
                Channel::Left,
                Channel::Right,
                Channel::Center,
                Channel::Unused,
                Channel::LeftSurround,
                Channel::RightSurround,
                Channel::Unused,
                Channel::Unused,
            ]
        );

        let meter = LoudnessMeter::new(1, 44_100, Mode::M).unwrap();
        assert_eq!(meter.max_window(), 400);
    }

    #[test]
    fn sine_stereo_minus_23() {
        let data = sine(1000.0, db_to_amplitude(-23.0), 48_000, 2, 5.0);

        let mut meter = LoudnessMeter::new(2, 48_000, Mode::all()).unwrap();
        meter.add_frames(&data).unwrap();

        // Histogram bins are 0.1 LU wide.
        assert_float_eq!(meter.loudness_global().unwrap(), -23.0, abs <= 0.1);
        assert_float_eq!(meter.loudness_momentary().unwrap(), -23.0, abs <= 0.05);
        assert_float_eq!(meter.loudness_shortterm().unwrap(), -23.0, abs <= 0.05);
        assert_float_eq!(meter.loudness_window(1000).unwrap(), -23.0, abs <= 0.05);
        assert_float_eq!(meter.relative_threshold().unwrap(), -33.0, abs <= 0.1);
        assert_float_eq!(meter.loudness_range().unwrap(), 0.0, abs <= 0.1);

        let (count, energy) = meter.gating_block_count_and_energy().unwrap();
        // 5 s gives 47 blocks.
        assert_eq!(count, 47);
        assert_float_eq!(
            energy_to_loudness(energy / count as f64),
            meter.loudness_global().unwrap(),
            abs <= 1e-9
        );

        for c in 0..2 {
            assert_float_eq!(
                meter.sample_peak(c).unwrap(),
                db_to_amplitude(-23.0) as f64,
                rmax <= 1e-3
            );
            assert!(meter.true_peak(c).unwrap() >= meter.sample_peak(c).unwrap());
            assert_float_eq!(
                meter.prev_sample_peak(c).unwrap(),
                meter.sample_peak(c).unwrap(),
                abs <= 0.0
            );
        }

        meter.reset();

        assert_eq!(meter.loudness_global().unwrap(), f64::NEG_INFINITY);
        assert_eq!(meter.loudness_momentary().unwrap(), f64::NEG_INFINITY);
        assert_eq!(meter.loudness_shortterm().unwrap(), f64::NEG_INFINITY);
        assert_float_eq!(meter.loudness_range().unwrap(), 0.0, abs <= 0.0);
        assert_float_eq!(meter.relative_threshold().unwrap(), -70.0, abs <= 0.0);
        assert_float_eq!(meter.sample_peak(0).unwrap(), 0.0, abs <= 0.0);
        assert_float_eq!(meter.true_peak(1).unwrap(), 0.0, abs <= 0.0);
    }

    #[test]
    fn silence_is_negative_infinity() {
        let data = vec![0i16; 48_000];

        let mut meter = LoudnessMeter::new(2, 24_000, Mode::I | Mode::S).unwrap();
        meter.add_frames(&data).unwrap();

        assert_eq!(meter.loudness_momentary().unwrap(), f64::NEG_INFINITY);
        assert_eq!(meter.loudness_shortterm().unwrap(), f64::NEG_INFINITY);
        assert_eq!(meter.loudness_global().unwrap(), f64::NEG_INFINITY);
        assert_eq!(meter.loudness_window(0).unwrap(), f64::NEG_INFINITY);
    }

    #[test]
    fn disabled_modes() {
        let mut meter = LoudnessMeter::new(1, 48_000, Mode::M).unwrap();
        assert_eq!(meter.loudness_shortterm(), Err(Error::InvalidMode));
        assert_eq!(meter.loudness_global(), Err(Error::InvalidMode));
        assert_eq!(meter.relative_threshold(), Err(Error::InvalidMode));
        assert_eq!(meter.loudness_range(), Err(Error::InvalidMode));
        assert_eq!(meter.sample_peak(0), Err(Error::InvalidMode));
        assert_eq!(meter.prev_true_peak(0), Err(Error::InvalidMode));

        // The window only holds 400 ms.
        assert!(meter.loudness_window(400).is_ok());
        assert_eq!(meter.loudness_window(401), Err(Error::InvalidMode));

        let mut meter = LoudnessMeter::new(1, 48_000, Mode::SAMPLE_PEAK).unwrap();
        assert_eq!(meter.true_peak(0), Err(Error::InvalidMode));
        assert_eq!(meter.sample_peak(1), Err(Error::InvalidChannelIndex));
        assert_eq!(meter.prev_sample_peak(1), Err(Error::InvalidChannelIndex));
    }

    #[test]
    fn channel_map() {
        let mut meter = LoudnessMeter::new(2, 48_000, Mode::I).unwrap();
        assert_eq!(
            meter.set_channel(2, Channel::Center),
            Err(Error::InvalidChannelIndex)
        );
        assert_eq!(
            meter.set_channel_map(&[Channel::Left]),
            Err(Error::InvalidChannelIndex)
        );

        meter.set_channel(1, Channel::Unused).unwrap();
        assert_eq!(meter.channel_map(), &[Channel::Left, Channel::Unused]);

        let data = sine(1000.0, db_to_amplitude(-23.0), 48_000, 2, 2.0);
        meter.add_frames(&data).unwrap();
        // Half the energy is dropped.
        assert_float_eq!(meter.loudness_global().unwrap(), -26.01, abs <= 0.05);

        meter.reset();
        meter.set_channel_map(&[Channel::DualMono, Channel::Unused]).unwrap();
        meter.add_frames(&data).unwrap();
        assert_float_eq!(meter.loudness_global().unwrap(), -23.0, abs <= 0.05);
    }

    #[test]
    fn surround_weighting() {
        let mut meter = LoudnessMeter::new(5, 48_000, Mode::I).unwrap();
        meter.set_channel_map(&[Channel::Unused; 5]).unwrap();
        meter.set_channel(4, Channel::Mm110).unwrap();

        let data = sine(1000.0, db_to_amplitude(-23.0), 48_000, 5, 2.0);
        meter.add_frames(&data).unwrap();
        // One channel at +1.5 dB.
        assert_float_eq!(
            meter.loudness_global().unwrap(),
            -26.01 + 10.0 * f64::log10(1.41),
            abs <= 0.05
        );
    }

    #[test]
    fn invalid_buffers() {
        let mut meter = LoudnessMeter::new(2, 48_000, Mode::M).unwrap();
        assert_eq!(
            meter.add_frames(&[0.0f32; 3]),
            Err(Error::InvalidChannelIndex)
        );

        let plane = [0.0f32; 10];
        assert_eq!(
            meter.add_frames_planar(&[&plane[..]]),
            Err(Error::InvalidChannelIndex)
        );
        assert_eq!(
            meter.add_frames_planar(&[&plane[..], &plane[..5]]),
            Err(Error::InvalidChannelIndex)
        );
        assert!(meter.add_frames_planar(&[&plane[..], &plane[..]]).is_ok());
        assert!(meter.add_frames::<i32>(&[]).is_ok());
    }

    #[test]
    fn planar_matches_interleaved() {
        let data = sine(440.0, 0.5, 44_100, 2, 1.0);
        let left: Vec<f32> = data.iter().step_by(2).copied().collect();
        let right: Vec<f32> = data.iter().skip(1).step_by(2).copied().collect();

        let mut interleaved = LoudnessMeter::new(2, 44_100, Mode::all()).unwrap();
        interleaved.add_frames(&data).unwrap();
        let mut planar = LoudnessMeter::new(2, 44_100, Mode::all()).unwrap();
        planar.add_frames_planar(&[&left[..], &right[..]]).unwrap();

        assert_float_eq!(
            interleaved.loudness_global().unwrap(),
            planar.loudness_global().unwrap(),
            abs <= 0.0
        );
        assert_float_eq!(
            interleaved.true_peak(1).unwrap(),
            planar.true_peak(1).unwrap(),
            abs <= 0.0
        );
    }

    #[test]
    fn change_parameters() {
        let mut meter = LoudnessMeter::new(2, 48_000, Mode::all()).unwrap();
        meter.set_channel(0, Channel::Center).unwrap();
        meter.add_frames(&sine(1000.0, 0.5, 48_000, 2, 0.3)).unwrap();

        // Unchanged parameters keep the state.
        assert_eq!(meter.change_parameters(2, 48_000), Err(Error::NoChange));
        assert_eq!(meter.channel_map()[0], Channel::Center);
        meter.add_frames(&sine(1000.0, 0.5, 48_000, 2, 0.2)).unwrap();
        assert!(meter.loudness_momentary().unwrap() > -10.0);

        assert_eq!(
            meter.change_parameters(0, 48_000),
            Err(Error::OutOfMemory)
        );
        assert_eq!(meter.channels(), 2);

        meter.change_parameters(6, 96_000).unwrap();
        assert_eq!(meter.channels(), 6);
        assert_eq!(meter.rate(), 96_000);
        assert_eq!(meter.channel_map(), &*default_channel_map(6));
        assert_eq!(meter.loudness_momentary().unwrap(), f64::NEG_INFINITY);
        assert_float_eq!(meter.sample_peak(0).unwrap(), 0.0, abs <= 0.0);
        assert_eq!(meter.sample_peak(5), Ok(0.0));
    }

    #[test]
    fn max_window() {
        let mut meter = LoudnessMeter::new(1, 48_000, Mode::S).unwrap();
        assert_eq!(meter.set_max_window(1000), Err(Error::NoChange));
        assert_eq!(meter.loudness_window(10_000), Err(Error::InvalidMode));

        meter.set_max_window(10_000).unwrap();
        assert_eq!(meter.max_window(), 10_000);
        assert_eq!(meter.set_max_window(10_000), Err(Error::NoChange));

        meter.add_frames(&sine(1000.0, 0.5, 48_000, 1, 10.0)).unwrap();
        assert_float_eq!(
            meter.loudness_window(10_000).unwrap(),
            meter.loudness_shortterm().unwrap(),
            abs <= 0.05
        );

        // The ring is rounded up to whole hops, the limit is not.
        let mut meter = LoudnessMeter::new(1, 48_000, Mode::M).unwrap();
        meter.set_max_window(450).unwrap();
        meter.add_frames(&sine(1000.0, 0.5, 48_000, 1, 1.0)).unwrap();
        assert!(meter.loudness_window(450).is_ok());
        assert_eq!(meter.loudness_window(451), Err(Error::InvalidMode));
        assert_eq!(meter.loudness_window(480), Err(Error::InvalidMode));

        // A failed allocation keeps the previous window.
        let mut meter = LoudnessMeter::new(2, 2_822_400, Mode::M).unwrap();
        assert_eq!(meter.set_max_window(u32::MAX), Err(Error::OutOfMemory));
        assert_eq!(meter.max_window(), 400);
        assert!(meter.loudness_window(400).is_ok());
    }

    #[test]
    fn max_history() {
        let mut meter = LoudnessMeter::new(1, 48_000, Mode::I).unwrap();
        meter.set_max_history(1000).unwrap();
        assert_eq!(meter.set_max_history(1000), Err(Error::NoChange));
        assert_eq!(meter.set_max_history(0).map(|_| meter.max_history()), Ok(400));

        meter.set_max_history(1000).unwrap();
        meter.add_frames(&sine(1000.0, 0.5, 48_000, 1, 3.0)).unwrap();
        meter.add_frames(&sine(1000.0, 0.05, 48_000, 1, 2.0)).unwrap();

        // Only the last second, all of it quiet, is integrated.
        assert_float_eq!(
            meter.loudness_global().unwrap(),
            meter.loudness_momentary().unwrap(),
            abs <= 0.05
        );

        let mut meter = LoudnessMeter::new(1, 48_000, Mode::LRA).unwrap();
        assert_eq!(meter.set_max_history(0).map(|_| meter.max_history()), Ok(3000));
    }

    #[test]
    fn prev_peaks_accumulate_until_read() {
        let mut meter = LoudnessMeter::new(1, 48_000, Mode::TRUE_PEAK).unwrap();
        meter.add_frames(&[0.5f32, -0.75, 0.25]).unwrap();
        meter.add_frames(&[0.1f32, 0.2]).unwrap();

        assert_float_eq!(meter.prev_sample_peak(0).unwrap(), 0.75, abs <= 1e-9);
        assert_float_eq!(meter.prev_sample_peak(0).unwrap(), 0.0, abs <= 0.0);
        assert!(meter.prev_true_peak(0).unwrap() >= 0.75);
        assert_float_eq!(meter.prev_true_peak(0).unwrap(), 0.0, abs <= 0.0);

        meter.add_frames(&[0.1f32, 0.2]).unwrap();
        assert_float_eq!(meter.prev_sample_peak(0).unwrap(), 0.2, abs <= 1e-7);
        assert_float_eq!(meter.sample_peak(0).unwrap(), 0.75, abs <= 1e-9);
    }

    #[test]
    fn seed_frames_only_warm_up() {
        let data = sine(1000.0, 0.5, 48_000, 2, 1.0);

        let mut meter = LoudnessMeter::new(2, 48_000, Mode::all()).unwrap();
        meter.seed_frames(&data).unwrap();

        assert_eq!(meter.loudness_momentary().unwrap(), f64::NEG_INFINITY);
        assert_eq!(meter.loudness_global().unwrap(), f64::NEG_INFINITY);
        assert_float_eq!(meter.sample_peak(0).unwrap(), 0.0, abs <= 0.0);
        assert_eq!(meter.seed_frames(&data[..3]), Err(Error::InvalidChannelIndex));
    }

    #[quickcheck]
    fn chunking_invariance(signal: Signal<f32>, chunk: u16) -> bool {
        let chunk = std::cmp::max(chunk as usize, 1) * signal.channels as usize;

        let mut whole = LoudnessMeter::new(signal.channels, signal.rate, Mode::all()).unwrap();
        whole.add_frames(&signal.data).unwrap();

        let mut chunked = LoudnessMeter::new(signal.channels, signal.rate, Mode::all()).unwrap();
        for data in signal.data.chunks(chunk) {
            chunked.add_frames(data).unwrap();
        }

        let mut ok = same(
            whole.loudness_global().unwrap(),
            chunked.loudness_global().unwrap(),
        ) && same(
            whole.loudness_momentary().unwrap(),
            chunked.loudness_momentary().unwrap(),
        ) && same(
            whole.loudness_shortterm().unwrap(),
            chunked.loudness_shortterm().unwrap(),
        ) && same(
            whole.loudness_range().unwrap(),
            chunked.loudness_range().unwrap(),
        );

        for c in 0..signal.channels {
            ok &= same(whole.true_peak(c).unwrap(), chunked.true_peak(c).unwrap());
        }

        ok
    }

    #[quickcheck]
    fn true_peak_is_at_least_sample_peak(signal: Signal<i16>) -> bool {
        let mut meter = LoudnessMeter::new(signal.channels, signal.rate, Mode::TRUE_PEAK).unwrap();
        meter.add_frames(&signal.data).unwrap();

        (0..signal.channels)
            .all(|c| meter.true_peak(c).unwrap() >= meter.sample_peak(c).unwrap())
    }
}
