//! Frame-accurate time values.
//!
//! Every time attribute in a project file is a rational number of seconds
//! written as `N/Ds`. The consuming editor rejects any value that does not
//! land on a frame boundary of the sequence, so this module never stores
//! seconds directly: a [`RationalTime`] is an integer frame count paired with
//! the [`FrameRate`] it was counted in, and it can only be built from frames.
//!
//! All sums and comparisons happen on frame counts. Floating-point seconds
//! only enter at the edge ([`FrameRate::seconds_to_rational`]) and are
//! snapped to the nearest frame there.

use std::fmt;
use std::str::FromStr;

use crate::error::{ForgeError, ForgeResult};

/// Frame duration of a sequence, kept as an exact integer ratio.
///
/// `FrameRate { frame_duration_num: 1001, timescale: 24000 }` is a frame
/// lasting `1001/24000` seconds (23.976 fps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRate {
    frame_duration_num: u32,
    timescale: u32,
}

impl FrameRate {
    /// 23.976 fps, the rate of the blank project template.
    pub const NTSC_23_976: FrameRate = FrameRate {
        frame_duration_num: 1001,
        timescale: 24000,
    };

    /// Build a frame rate from a frame duration of `frame_duration_num / timescale` seconds.
    pub fn new(frame_duration_num: u32, timescale: u32) -> ForgeResult<Self> {
        if frame_duration_num == 0 || timescale == 0 {
            return Err(ForgeError::invalid_time(
                format!("{frame_duration_num}/{timescale}s"),
                "frame duration components must be non-zero",
            ));
        }
        Ok(Self {
            frame_duration_num,
            timescale,
        })
    }

    /// Numerator of the frame duration.
    pub fn frame_duration_num(&self) -> u32 {
        self.frame_duration_num
    }

    /// Denominator of the frame duration.
    pub fn timescale(&self) -> u32 {
        self.timescale
    }

    /// Approximate frames per second (display only).
    pub fn frames_per_second(&self) -> f64 {
        self.timescale as f64 / self.frame_duration_num as f64
    }

    /// Whole-number rate used for timecode-style offsets (24 for 23.976).
    pub fn nominal_fps(&self) -> u64 {
        let num = self.frame_duration_num as u64;
        (self.timescale as u64 + num - 1) / num
    }

    /// Time value for a whole number of frames.
    pub fn time(&self, frames: u64) -> RationalTime {
        RationalTime { frames, rate: *self }
    }

    /// Convert seconds to the nearest whole frame count.
    ///
    /// Floor and ceiling are both considered and the one whose duration is
    /// closer to `seconds` wins; an exact tie goes to the floor.
    pub fn seconds_to_frames(&self, seconds: f64) -> ForgeResult<u64> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(ForgeError::invalid_time(
                seconds.to_string(),
                "duration must be a finite, non-negative number of seconds",
            ));
        }

        let num = self.frame_duration_num as f64;
        let scale = self.timescale as f64;
        let exact = seconds * scale / num;
        if exact >= u64::MAX as f64 {
            return Err(ForgeError::invalid_time(
                seconds.to_string(),
                "duration exceeds the representable frame range",
            ));
        }

        let floor = exact.floor();
        let ceil = exact.ceil();
        let floor_secs = floor * num / scale;
        let ceil_secs = ceil * num / scale;

        let frames = if (seconds - floor_secs).abs() <= (ceil_secs - seconds).abs() {
            floor
        } else {
            ceil
        };
        Ok(frames as u64)
    }

    /// Convert seconds to a frame-aligned rational time.
    pub fn seconds_to_rational(&self, seconds: f64) -> ForgeResult<RationalTime> {
        Ok(self.time(self.seconds_to_frames(seconds)?))
    }

    /// Parse a time attribute (`N/Ds`, `Ns`, `N.Ms`) into an exact frame count.
    ///
    /// Fails with [`ForgeError::InvalidTime`] when the value is malformed,
    /// negative, or not on a frame boundary of this rate.
    pub fn rational_to_frames(&self, text: &str) -> ForgeResult<u64> {
        let (scaled, unit) = self.frame_ratio(text)?;
        if scaled % unit != 0 {
            return Err(ForgeError::invalid_time(
                text,
                format!("not on a {self} frame boundary"),
            ));
        }
        frames_from_u128(text, scaled / unit)
    }

    /// Parse a time attribute and round it to the nearest frame.
    ///
    /// Used for values written by other tools in a different time base.
    pub fn nearest_frames(&self, text: &str) -> ForgeResult<u64> {
        let (scaled, unit) = self.frame_ratio(text)?;
        let quotient = scaled / unit;
        let remainder = scaled % unit;
        let frames = if remainder * 2 > unit {
            quotient + 1
        } else {
            quotient
        };
        frames_from_u128(text, frames)
    }

    /// Time value as a `frames = scaled / unit` ratio.
    fn frame_ratio(&self, text: &str) -> ForgeResult<(u128, u128)> {
        let (num, den) = parse_time_value(text)?;
        let scaled = num.checked_mul(self.timescale as u128);
        let unit = den.checked_mul(self.frame_duration_num as u128);
        match (scaled, unit) {
            (Some(scaled), Some(unit)) => Ok((scaled, unit)),
            _ => Err(ForgeError::invalid_time(text, "value is too large")),
        }
    }

    /// Whether a time attribute lies exactly on a frame boundary.
    pub fn is_frame_aligned(&self, text: &str) -> bool {
        self.rational_to_frames(text).is_ok()
    }
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::NTSC_23_976
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}s", self.frame_duration_num, self.timescale)
    }
}

impl FromStr for FrameRate {
    type Err = ForgeError;

    /// Parse a `frameDuration` attribute such as `1001/24000s` or `1/25s`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s
            .trim()
            .strip_suffix('s')
            .ok_or_else(|| ForgeError::invalid_time(s, "missing trailing 's'"))?;
        let (num, den) = match body.split_once('/') {
            Some((num, den)) => (num, den),
            None => (body, "1"),
        };
        let num = num
            .parse::<u32>()
            .map_err(|e| ForgeError::invalid_time(s, e.to_string()))?;
        let den = den
            .parse::<u32>()
            .map_err(|e| ForgeError::invalid_time(s, e.to_string()))?;
        Self::new(num, den)
    }
}

/// A time value that always lies on a frame boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RationalTime {
    frames: u64,
    rate: FrameRate,
}

impl RationalTime {
    /// Zero at the given rate (renders as `0s`).
    pub fn zero(rate: FrameRate) -> Self {
        rate.time(0)
    }

    /// Whole frame count.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Rate the frames were counted in.
    pub fn rate(&self) -> FrameRate {
        self.rate
    }

    /// Seconds as a float (display and logging only).
    pub fn seconds(&self) -> f64 {
        self.frames as f64 * self.rate.frame_duration_num as f64 / self.rate.timescale as f64
    }

    pub fn is_zero(&self) -> bool {
        self.frames == 0
    }
}

impl fmt::Display for RationalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.frames == 0 {
            return f.write_str("0s");
        }
        let numerator = self.frames as u128 * self.rate.frame_duration_num as u128;
        write!(f, "{}/{}s", numerator, self.rate.timescale)
    }
}

/// Split a time attribute into an exact `(numerator, denominator)` pair of seconds.
pub fn parse_time_value(text: &str) -> ForgeResult<(u128, u128)> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_suffix('s')
        .ok_or_else(|| ForgeError::invalid_time(text, "missing trailing 's'"))?;
    if body.starts_with('-') {
        return Err(ForgeError::invalid_time(text, "negative time values are not supported"));
    }

    let parse = |part: &str| {
        part.parse::<u128>()
            .map_err(|e| ForgeError::invalid_time(text, e.to_string()))
    };

    let (num, den) = if let Some((num, den)) = body.split_once('/') {
        (parse(num)?, parse(den)?)
    } else if let Some((whole, fraction)) = body.split_once('.') {
        if fraction.len() > 18 {
            return Err(ForgeError::invalid_time(text, "too many decimal places"));
        }
        let den = 10u128.pow(fraction.len() as u32);
        let whole = if whole.is_empty() { 0 } else { parse(whole)? };
        let fraction = if fraction.is_empty() { 0 } else { parse(fraction)? };
        (whole * den + fraction, den)
    } else {
        (parse(body)?, 1)
    };

    if den == 0 {
        return Err(ForgeError::invalid_time(text, "zero denominator"));
    }
    Ok((num, den))
}

fn frames_from_u128(text: &str, frames: u128) -> ForgeResult<u64> {
    u64::try_from(frames)
        .map_err(|_| ForgeError::invalid_time(text, "exceeds the representable frame range"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const NTSC: FrameRate = FrameRate::NTSC_23_976;

    #[test]
    fn test_two_seconds_snaps_to_nearest_frame() {
        let t = NTSC.seconds_to_rational(2.0).unwrap();
        assert_eq!(t.frames(), 48);
        assert_eq!(t.to_string(), "48048/24000s");

        let frame_secs = 1001.0 / 24000.0;
        assert!((t.seconds() - 2.0).abs() <= frame_secs);
    }

    #[test]
    fn test_nearest_frame_beats_truncation() {
        // 2.0s is 47.95 frames: truncation would undershoot to 47.
        assert_eq!(NTSC.seconds_to_frames(2.0).unwrap(), 48);
        // 10s is 239.76 frames.
        assert_eq!(NTSC.seconds_to_frames(10.0).unwrap(), 240);
        assert_eq!(NTSC.seconds_to_rational(10.0).unwrap().to_string(), "240240/24000s");
    }

    #[test]
    fn test_zero_renders_as_zero_seconds() {
        assert_eq!(RationalTime::zero(NTSC).to_string(), "0s");
        assert_eq!(NTSC.seconds_to_rational(0.0).unwrap().to_string(), "0s");
    }

    #[test]
    fn test_rejects_negative_and_non_finite_seconds() {
        assert!(NTSC.seconds_to_frames(-1.0).is_err());
        assert!(NTSC.seconds_to_frames(f64::NAN).is_err());
        assert!(NTSC.seconds_to_frames(f64::INFINITY).is_err());
    }

    #[test]
    fn test_rational_to_frames_accepts_aligned_forms() {
        assert_eq!(NTSC.rational_to_frames("48048/24000s").unwrap(), 48);
        assert_eq!(NTSC.rational_to_frames("0s").unwrap(), 0);
        assert_eq!(NTSC.rational_to_frames("1001/24000s").unwrap(), 1);
        // Same instant expressed with a different denominator.
        assert_eq!(NTSC.rational_to_frames("2002/48000s").unwrap(), 1);

        let pal = FrameRate::new(1, 25).unwrap();
        assert_eq!(pal.rational_to_frames("3s").unwrap(), 75);
        assert_eq!(pal.rational_to_frames("0.2s").unwrap(), 5);
    }

    #[test]
    fn test_rational_to_frames_rejects_misaligned_values() {
        let err = NTSC.rational_to_frames("21600000/24000s").unwrap_err();
        assert!(matches!(err, ForgeError::InvalidTime { .. }));
        assert!(!NTSC.is_frame_aligned("21600000/24000s"));
        assert!(NTSC.is_frame_aligned("21621600/24000s"));
        assert!(NTSC.rational_to_frames("12").is_err());
        assert!(NTSC.rational_to_frames("1/0s").is_err());
        assert!(NTSC.rational_to_frames("-1001/24000s").is_err());
    }

    #[test]
    fn test_nearest_frames_rounds_foreign_values() {
        // 3.6s at 23.976 is 86.3 frames.
        assert_eq!(NTSC.nearest_frames("3.6s").unwrap(), 86);
        assert_eq!(NTSC.nearest_frames("48048/24000s").unwrap(), 48);
    }

    #[test]
    fn test_frame_rate_parse_and_display() {
        let rate: FrameRate = "1001/30000s".parse().unwrap();
        assert_eq!(rate.frame_duration_num(), 1001);
        assert_eq!(rate.timescale(), 30000);
        assert_eq!(rate.to_string(), "1001/30000s");
        assert_eq!(rate.nominal_fps(), 30);
        assert_eq!(NTSC.nominal_fps(), 24);

        let whole: FrameRate = "1s".parse().unwrap();
        assert_eq!(whole.timescale(), 1);

        assert!("0/24000s".parse::<FrameRate>().is_err());
        assert!("1001/24000".parse::<FrameRate>().is_err());
    }

    #[test]
    fn test_round_trip_sum_matches_frame_sum() {
        let mut frame_sum = 0u64;
        let mut reparsed_sum = 0u64;
        for i in 0..100u64 {
            let seconds = (i as f64) * 0.37 + 0.5;
            let t = NTSC.seconds_to_rational(seconds).unwrap();
            frame_sum += t.frames();
            reparsed_sum += NTSC.rational_to_frames(&t.to_string()).unwrap();
        }
        assert_eq!(frame_sum, reparsed_sum);
    }

    proptest! {
        #[test]
        fn prop_whole_frames_round_trip_exactly(frames in 0u64..10_000_000) {
            let t = NTSC.time(frames);
            prop_assert_eq!(NTSC.rational_to_frames(&t.to_string()).unwrap(), frames);
            prop_assert_eq!(NTSC.seconds_to_frames(t.seconds()).unwrap(), frames);
        }

        #[test]
        fn prop_snapped_time_is_within_half_a_frame(seconds in 0.0f64..100_000.0) {
            let t = NTSC.seconds_to_rational(seconds).unwrap();
            let frame_secs = 1001.0 / 24000.0;
            prop_assert!((t.seconds() - seconds).abs() <= frame_secs / 2.0 + 1e-9);
            prop_assert!(NTSC.is_frame_aligned(&t.to_string()));
        }
    }
}
