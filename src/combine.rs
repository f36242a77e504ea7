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

//! Program loudness over several independently fed meters.

use smallvec::SmallVec;

use crate::history::History;
use crate::{Error, LoudnessMeter};

fn collect<'a>(
    meters: impl IntoIterator<Item = &'a LoudnessMeter>,
    history: impl Fn(&'a LoudnessMeter) -> Result<&'a History, Error>,
) -> Result<SmallVec<[&'a History; 16]>, Error> {
    meters.into_iter().map(history).collect()
}

/// Get global integrated loudness in LUFS across multiple meters.
///
/// The gating blocks of all meters are pooled as if they had been measured by one meter. The
/// meters may have different channel layouts and sample rates. Blocks spanning the boundary
/// between two meters' inputs are not measured, so the result can differ slightly from a single
/// meter fed the concatenated input.
///
/// Every meter needs [`Mode::I`](crate::Mode::I), otherwise [`Error::InvalidMode`] is returned.
/// An empty iterator gives `-inf`.
pub fn loudness_global_multiple<'a>(
    meters: impl IntoIterator<Item = &'a LoudnessMeter>,
) -> Result<f64, Error> {
    let histories = collect(meters, LoudnessMeter::block_history)?;
    Ok(History::gated_loudness_multiple(&histories))
}

/// Number of gating blocks passing both gates and their summed energy across multiple meters.
pub fn gating_block_count_and_energy_multiple<'a>(
    meters: impl IntoIterator<Item = &'a LoudnessMeter>,
) -> Result<(u64, f64), Error> {
    let histories = collect(meters, LoudnessMeter::block_history)?;
    Ok(History::gated_sum_multiple(&histories))
}

/// Get loudness range (LRA) in LU across multiple meters.
///
/// Calculates loudness range according to EBU 3342 over the pooled short-term blocks. If any
/// meter uses [`Mode::HISTOGRAM`](crate::Mode::HISTOGRAM) all blocks are binned first.
///
/// Every meter needs [`Mode::LRA`](crate::Mode::LRA), otherwise [`Error::InvalidMode`] is
/// returned.
pub fn loudness_range_multiple<'a>(
    meters: impl IntoIterator<Item = &'a LoudnessMeter>,
) -> Result<f64, Error> {
    let histories = collect(meters, LoudnessMeter::short_term_history)?;
    History::loudness_range_multiple(&histories)
}
