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

//! Gated integration (BS.1770) and loudness range (EBU Tech 3342) over stored block energies.

use std::collections::VecDeque;
use std::fmt;
use std::sync::OnceLock;

use crate::{energy_to_loudness, loudness_to_energy, Error};

/// Blocks below this are never stored.
pub const ABSOLUTE_GATE_LUFS: f64 = -70.0;
/// Relative gate for the integrated loudness.
pub const RELATIVE_GATE_LU: f64 = -10.0;
/// Relative gate for the loudness range.
pub const LRA_RELATIVE_GATE_LU: f64 = -20.0;
pub const LRA_LOW_PERCENTILE: f64 = 0.10;
pub const LRA_HIGH_PERCENTILE: f64 = 0.95;

const HISTOGRAM_BINS: usize = 1000;
/// Width of a histogram bin in LU. The bins cover -70..+30 LUFS.
const HISTOGRAM_BIN_WIDTH: f64 = 0.1;

fn absolute_gate() -> f64 {
    loudness_to_energy(ABSOLUTE_GATE_LUFS)
}

fn gate_factor(gate_lu: f64) -> f64 {
    f64::powf(10.0, gate_lu / 10.0)
}

/// Nearest-rank index of the `percentile` in an ascending distribution of `n > 0` values.
///
/// Rounds `(n - 1) * percentile` half up.
pub fn percentile_index(n: u64, percentile: f64) -> u64 {
    debug_assert!(n > 0);
    ((n - 1) as f64 * percentile + 0.5) as u64
}

/// Loudness of the centre of histogram bin `index`.
fn bin_loudness(index: usize) -> f64 {
    ABSOLUTE_GATE_LUFS + (index as f64 + 0.5) * HISTOGRAM_BIN_WIDTH
}

/// Energy of the centre of every histogram bin, ascending.
fn bin_energies() -> &'static [f64; HISTOGRAM_BINS] {
    static ENERGIES: OnceLock<[f64; HISTOGRAM_BINS]> = OnceLock::new();

    ENERGIES.get_or_init(|| {
        let mut energies = [0.0; HISTOGRAM_BINS];
        for (index, energy) in energies.iter_mut().enumerate() {
            *energy = loudness_to_energy(bin_loudness(index));
        }
        energies
    })
}

fn bin_index(energy: f64) -> usize {
    let offset = (energy_to_loudness(energy) - ABSOLUTE_GATE_LUFS) / HISTOGRAM_BIN_WIDTH;
    if offset <= 0.0 {
        0
    } else {
        std::cmp::min(offset as usize, HISTOGRAM_BINS - 1)
    }
}

/// Block energies quantised to 0.1 LU bins.
#[derive(Clone)]
pub struct Histogram(Box<[u64; HISTOGRAM_BINS]>);

impl Histogram {
    fn new() -> Self {
        Histogram(Box::new([0; HISTOGRAM_BINS]))
    }

    fn add(&mut self, energy: f64) {
        self.0[bin_index(energy)] += 1;
    }

    fn merge(&mut self, other: &Histogram) {
        for (count, other) in Iterator::zip(self.0.iter_mut(), other.0.iter()) {
            *count += *other;
        }
    }

    fn len(&self) -> u64 {
        self.0.iter().sum()
    }

    /// Sum and number of binned energies whose bin centre is at least `threshold`.
    ///
    /// A bin that contains `threshold` but whose centre lies below it is skipped as a whole.
    fn sum_above(&self, threshold: f64) -> (f64, u64) {
        let energies = bin_energies();
        let start = energies.partition_point(|energy| *energy < threshold);

        let mut sum = 0.0;
        let mut count = 0;
        for (n, energy) in Iterator::zip(self.0[start..].iter(), energies[start..].iter()) {
            sum += *n as f64 * *energy;
            count += *n;
        }

        (sum, count)
    }

    fn loudness_range(&self) -> f64 {
        let (sum, count) = self.sum_above(0.0);
        if count == 0 {
            return 0.0;
        }

        let gate = sum / count as f64 * gate_factor(LRA_RELATIVE_GATE_LU);
        let start = bin_energies().partition_point(|energy| *energy < gate);
        let bins = &self.0[start..];

        let n: u64 = bins.iter().sum();
        if n == 0 {
            return 0.0;
        }

        let find = |rank: u64| {
            let mut seen = 0;
            for (index, count) in bins.iter().enumerate() {
                seen += *count;
                if seen > rank {
                    return index;
                }
            }
            bins.len() - 1
        };

        let low = find(percentile_index(n, LRA_LOW_PERCENTILE));
        let high = find(percentile_index(n, LRA_HIGH_PERCENTILE));

        (high - low) as f64 * HISTOGRAM_BIN_WIDTH
    }
}

/// Block energies in arrival order, bounded to the configured history.
#[derive(Clone)]
pub struct Queue {
    entries: VecDeque<f64>,
    max: usize,
}

impl Queue {
    fn new(max: usize) -> Self {
        Queue {
            entries: VecDeque::new(),
            max,
        }
    }

    fn add(&mut self, energy: f64) {
        let mut evicted = 0;
        while !self.entries.is_empty() && self.entries.len() >= self.max {
            self.entries.pop_front();
            evicted += 1;
        }
        if evicted > 0 {
            tracing::trace!(evicted, max = self.max, "Pruned gating history");
        }

        if self.max > 0 {
            self.entries.push_back(energy);
        }
    }

    fn sum_above(&self, threshold: f64) -> (f64, u64) {
        self.entries
            .iter()
            .filter(|energy| **energy >= threshold)
            .fold((0.0, 0), |(sum, count), energy| (sum + *energy, count + 1))
    }

    /// Loudness range of an ascending slice of energies.
    fn loudness_range(sorted: &[f64]) -> f64 {
        if sorted.is_empty() {
            return 0.0;
        }

        let mean = sorted.iter().sum::<f64>() / sorted.len() as f64;
        let gate = mean * gate_factor(LRA_RELATIVE_GATE_LU);
        let gated = &sorted[sorted.partition_point(|energy| *energy < gate)..];
        if gated.is_empty() {
            return 0.0;
        }

        let n = gated.len() as u64;
        let low = gated[percentile_index(n, LRA_LOW_PERCENTILE) as usize];
        let high = gated[percentile_index(n, LRA_HIGH_PERCENTILE) as usize];

        energy_to_loudness(high) - energy_to_loudness(low)
    }
}

/// Stored energies of gating blocks or short-term windows.
#[derive(Clone)]
pub enum History {
    Queue(Queue),
    Histogram(Histogram),
}

impl fmt::Debug for History {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            History::Queue(q) => f
                .debug_struct("History::Queue")
                .field("len", &q.entries.len())
                .field("max", &q.max)
                .finish(),
            History::Histogram(h) => f
                .debug_struct("History::Histogram")
                .field("len", &h.len())
                .finish(),
        }
    }
}

impl History {
    pub fn new(use_histogram: bool, max: usize) -> Self {
        if use_histogram {
            History::Histogram(Histogram::new())
        } else {
            History::Queue(Queue::new(max))
        }
    }

    /// Store `energy` unless it is below the absolute gate.
    pub fn add(&mut self, energy: f64) {
        if energy < absolute_gate() {
            return;
        }

        match self {
            History::Queue(q) => q.add(energy),
            History::Histogram(h) => h.add(energy),
        }
    }

    /// Change the number of entries a queue keeps. Excess entries are dropped on the next
    /// [`add`](Self::add). Histograms are unbounded.
    pub fn set_max_size(&mut self, max: usize) {
        if let History::Queue(q) = self {
            q.max = max;
        }
    }

    pub fn reset(&mut self) {
        match self {
            History::Queue(q) => q.entries.clear(),
            History::Histogram(h) => h.0.fill(0),
        }
    }

    /// Number of stored entries.
    pub fn len(&self) -> u64 {
        match self {
            History::Queue(q) => q.entries.len() as u64,
            History::Histogram(h) => h.len(),
        }
    }

    fn sum_above(&self, threshold: f64) -> (f64, u64) {
        match self {
            History::Queue(q) => q.sum_above(threshold),
            History::Histogram(h) => h.sum_above(threshold),
        }
    }

    fn ungated_sum(histories: &[&History]) -> (f64, u64) {
        histories
            .iter()
            .map(|h| h.sum_above(0.0))
            .fold((0.0, 0), |(sum, count), (s, c)| (sum + s, count + c))
    }

    /// Number and summed energy of the blocks that pass both gates, pooled over `histories`.
    pub fn gated_sum_multiple(histories: &[&History]) -> (u64, f64) {
        let (sum, count) = Self::ungated_sum(histories);
        if count == 0 {
            return (0, 0.0);
        }

        let threshold = sum / count as f64 * gate_factor(RELATIVE_GATE_LU);
        let (sum, count) = histories
            .iter()
            .map(|h| h.sum_above(threshold))
            .fold((0.0, 0), |(sum, count), (s, c)| (sum + s, count + c));

        (count, sum)
    }

    /// Integrated loudness in LUFS pooled over `histories`, `-inf` without any gated block.
    pub fn gated_loudness_multiple(histories: &[&History]) -> f64 {
        match Self::gated_sum_multiple(histories) {
            (0, _) => f64::NEG_INFINITY,
            (count, sum) => energy_to_loudness(sum / count as f64),
        }
    }

    pub fn gated_loudness(&self) -> f64 {
        Self::gated_loudness_multiple(&[self])
    }

    /// Relative gate in LUFS, or the absolute gate when nothing was stored yet.
    pub fn relative_threshold(&self) -> f64 {
        let (sum, count) = Self::ungated_sum(&[self]);
        if count == 0 {
            return ABSOLUTE_GATE_LUFS;
        }

        energy_to_loudness(sum / count as f64 * gate_factor(RELATIVE_GATE_LU))
    }

    pub fn loudness_range(&self) -> Result<f64, Error> {
        Self::loudness_range_multiple(&[self])
    }

    /// Loudness range in LU pooled over `histories`.
    ///
    /// Queues are pooled exactly. As soon as one histogram is involved every queue entry is
    /// binned into a merged histogram instead.
    pub fn loudness_range_multiple(histories: &[&History]) -> Result<f64, Error> {
        let all_queues = histories.iter().all(|h| matches!(h, History::Queue(_)));

        if all_queues {
            let len = histories
                .iter()
                .try_fold(0usize, |len, h| len.checked_add(h.len() as usize))
                .ok_or(Error::OutOfMemory)?;

            let mut pooled = Vec::new();
            pooled
                .try_reserve_exact(len)
                .map_err(|_| Error::OutOfMemory)?;
            for h in histories {
                if let History::Queue(q) = h {
                    pooled.extend(q.entries.iter().copied());
                }
            }
            pooled.sort_unstable_by(f64::total_cmp);

            Ok(Queue::loudness_range(&pooled))
        } else {
            let mut merged = Histogram::new();
            for h in histories {
                match h {
                    History::Histogram(other) => merged.merge(other),
                    History::Queue(q) => q.entries.iter().for_each(|e| merged.add(*e)),
                }
            }

            Ok(merged.loudness_range())
        }
    }
}
