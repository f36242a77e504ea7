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

//!  Implementation of the [EBU R128 loudness standard](https://tech.ebu.ch/docs/r/r128.pdf).
//!
//!  The European Broadcasting Union Loudness Recommendation (EBU R128) informs broadcasters how
//!  they can analyze and normalize audio so that each piece of audio sounds roughly the same
//!  volume to the human ear.
//!
//!  [`LoudnessMeter`] ingests interleaved or planar PCM incrementally and answers loudness
//!  queries at any time without reprocessing what it has already seen.
//!
//!  Features:
//!   * Momentary, short-term, arbitrary window and integrated loudness (ITU-R BS.1770-4)
//!   * Loudness range measurement (EBU - TECH 3342)
//!   * Sample peak and oversampled true peak scanning
//!   * Bounded history queue or constant-memory histogram storage
//!   * Program loudness and range across several meters
//!   * Supports all samplerates by recalculation of the filter coefficients
//!
//! ```
//! use r128meter::{LoudnessMeter, Mode};
//!
//! let mut meter = LoudnessMeter::new(2, 48_000, Mode::I | Mode::TRUE_PEAK).unwrap();
//! meter.add_frames(&vec![0.0f32; 2 * 48_000]).unwrap();
//! assert_eq!(meter.loudness_global().unwrap(), f64::NEG_INFINITY);
//! ```

mod channel;
mod combine;
mod error;
mod meter;
mod mode;
mod samples;

pub use self::channel::Channel;
pub use self::combine::{
    gating_block_count_and_energy_multiple, loudness_global_multiple, loudness_range_multiple,
};
pub use self::error::Error;
pub use self::meter::LoudnessMeter;
pub use self::mode::Mode;
pub use self::samples::{Interleaved, Planar, Sample, Samples};

#[cfg(feature = "internal-tests")]
pub mod filter;
#[cfg(not(feature = "internal-tests"))]
pub(crate) mod filter;

#[cfg(feature = "internal-tests")]
pub mod block;
#[cfg(not(feature = "internal-tests"))]
pub(crate) mod block;

#[cfg(feature = "internal-tests")]
pub mod history;
#[cfg(not(feature = "internal-tests"))]
pub(crate) mod history;

#[cfg(feature = "internal-tests")]
pub mod interp;
#[cfg(not(feature = "internal-tests"))]
pub(crate) mod interp;

#[cfg(feature = "internal-tests")]
pub mod peak;
#[cfg(not(feature = "internal-tests"))]
pub(crate) mod peak;

/// Convert a channel-weighted mean square to LUFS.
pub fn energy_to_loudness(energy: f64) -> f64 {
    10.0 * f64::log10(energy) - 0.691
}

/// Convert LUFS to a channel-weighted mean square.
pub fn loudness_to_energy(loudness: f64) -> f64 {
    f64::powf(10.0, (loudness + 0.691) / 10.0)
}

/// Version of this crate as `(major, minor, patch)`.
pub fn version() -> (u32, u32, u32) {
    fn parse(s: &str) -> u32 {
        s.parse().unwrap_or(0)
    }

    (
        parse(env!("CARGO_PKG_VERSION_MAJOR")),
        parse(env!("CARGO_PKG_VERSION_MINOR")),
        parse(env!("CARGO_PKG_VERSION_PATCH")),
    )
}
