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

/// Channel position, used to weight each channel's energy before summing.
///
/// Set with [`LoudnessMeter::set_channel`](crate::LoudnessMeter::set_channel). Positions follow
/// ITU-R BS.1770-4 and ITU-R BS.2051-2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Channel {
    /// Not measured (for example LFE)
    Unused,
    /// Left, ITU M+030
    Left,
    /// Right, ITU M-030
    Right,
    /// Center, ITU M+000
    Center,
    /// Left surround, ITU M+110
    LeftSurround,
    /// Right surround, ITU M-110
    RightSurround,
    /// Mono channel played on two speakers, counted twice
    DualMono,
    /// ITU M+SC
    MpSC,
    /// ITU M-SC
    MmSC,
    /// ITU M+060
    Mp060,
    /// ITU M-060
    Mm060,
    /// ITU M+090
    Mp090,
    /// ITU M-090
    Mm090,
    /// ITU M+135
    Mp135,
    /// ITU M-135
    Mm135,
    /// ITU M+180
    Mp180,
    /// ITU U+000
    Up000,
    /// ITU U+030
    Up030,
    /// ITU U-030
    Um030,
    /// ITU U+045
    Up045,
    /// ITU U-045
    Um045,
    /// ITU U+090
    Up090,
    /// ITU U-090
    Um090,
    /// ITU U+110
    Up110,
    /// ITU U-110
    Um110,
    /// ITU U+135
    Up135,
    /// ITU U-135
    Um135,
    /// ITU U+180
    Up180,
    /// ITU T+000
    Tp000,
    /// ITU B+000
    Bp000,
    /// ITU B+045
    Bp045,
    /// ITU B-045
    Bm045,
}

#[allow(non_upper_case_globals)]
impl Channel {
    /// ITU M+030, same as [`Channel::Left`]
    pub const Mp030: Channel = Channel::Left;
    /// ITU M-030, same as [`Channel::Right`]
    pub const Mm030: Channel = Channel::Right;
    /// ITU M+000, same as [`Channel::Center`]
    pub const Mp000: Channel = Channel::Center;
    /// ITU M+110, same as [`Channel::LeftSurround`]
    pub const Mp110: Channel = Channel::LeftSurround;
    /// ITU M-110, same as [`Channel::RightSurround`]
    pub const Mm110: Channel = Channel::RightSurround;

    /// BS.1770 power weight applied to this channel's mean square.
    pub fn weight(self) -> f64 {
        match self {
            Channel::Unused => 0.0,
            // +1.5 dB for the side/rear positions between ±60° and ±120°
            Channel::LeftSurround
            | Channel::RightSurround
            | Channel::Mp060
            | Channel::Mm060
            | Channel::Mp090
            | Channel::Mm090 => 1.41,
            Channel::DualMono => 2.0,
            _ => 1.0,
        }
    }
}

/// Default channel map for the given channel count.
///
/// * 0 \-> `Left`
/// * 1 \-> `Right`
/// * 2 \-> `Center`
/// * 3 \-> `Unused`
/// * 4 \-> `LeftSurround`
/// * 5 \-> `RightSurround`
/// * _ \-> `Unused`
pub(crate) fn default_channel_map(channels: u32) -> Box<[Channel]> {
    const LAYOUT: [Channel; 6] = [
        Channel::Left,
        Channel::Right,
        Channel::Center,
        Channel::Unused,
        Channel::LeftSurround,
        Channel::RightSurround,
    ];

    (0..channels as usize)
        .map(|c| LAYOUT.get(c).copied().unwrap_or(Channel::Unused))
        .collect()
}
