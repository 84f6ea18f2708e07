//! Parameter limits for motion commands.

use crate::error::ValidationError;
use std::ops::RangeInclusive;

/// Accepted step amplitude (12-bit DAC value).
pub const AMPLITUDE_RANGE: RangeInclusive<u32> = 1..=4095;
/// Accepted step frequency in Hz.
pub const FREQUENCY_RANGE: RangeInclusive<u32> = 1..=20_000;

pub fn channel(channel: u32, channel_count: u32) -> Result<u32, ValidationError> {
    if channel < channel_count {
        Ok(channel)
    } else {
        Err(ValidationError::ChannelOutOfRange {
            channel,
            count: channel_count,
        })
    }
}

pub fn amplitude(amplitude: u32) -> Result<u32, ValidationError> {
    if AMPLITUDE_RANGE.contains(&amplitude) {
        Ok(amplitude)
    } else {
        Err(ValidationError::AmplitudeOutOfRange(amplitude))
    }
}

pub fn frequency(frequency: u32) -> Result<u32, ValidationError> {
    if FREQUENCY_RANGE.contains(&frequency) {
        Ok(frequency)
    } else {
        Err(ValidationError::FrequencyOutOfRange(frequency))
    }
}

/// Convert a channel index from a signed source (CLI, scripts).
///
/// Only rejects negatives; the upper bound is checked against the open
/// session at dispatch time.
pub fn channel_from_signed(raw: i64) -> Result<u32, ValidationError> {
    if raw < 0 {
        return Err(ValidationError::NegativeChannel(raw));
    }
    u32::try_from(raw).map_err(|_| ValidationError::ChannelIndexTooLarge(raw))
}
