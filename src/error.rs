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

use thiserror::Error;

/// Error values for [`LoudnessMeter`](crate::LoudnessMeter) functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// Not enough memory, or a configuration that can't be represented in memory.
    ///
    /// The instance should be dropped after this.
    #[error("Out of memory")]
    OutOfMemory,
    /// The requested measurement was not enabled when the instance was created, or the requested
    /// window is larger than the configured maximum window.
    #[error("Invalid mode")]
    InvalidMode,
    /// Invalid channel index passed.
    #[error("Invalid channel index")]
    InvalidChannelIndex,
    /// The requested configuration equals the current one. Nothing was changed.
    #[error("No change")]
    NoChange,
}

impl Error {
    /// Whether this is the informational [`Error::NoChange`] that callers may ignore.
    pub fn is_no_change(&self) -> bool {
        matches!(self, Error::NoChange)
    }
}
