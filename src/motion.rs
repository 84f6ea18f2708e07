//! Motion commands and channel status.

use crate::error::ValidationError;
use crate::transport::{STOPPED_STATUS, TARGET_STATUS};
use crate::validate;
use std::fmt;

/// A single motion request for one channel.
///
/// Commands are built, dispatched and dropped; the sign of `delta_nm` and
/// `steps` selects the direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionCommand {
    /// Closed-loop move by a displacement in nanometers.
    RelativeMove { channel: u32, delta_nm: i32 },
    /// Open-loop burst of actuator steps.
    StepMove {
        channel: u32,
        steps: i32,
        amplitude: u32,
        frequency: u32,
    },
}

impl MotionCommand {
    pub fn relative_move(channel: u32, delta_nm: i32) -> Self {
        MotionCommand::RelativeMove { channel, delta_nm }
    }

    pub fn step_move(channel: u32, steps: i32, amplitude: u32, frequency: u32) -> Self {
        MotionCommand::StepMove {
            channel,
            steps,
            amplitude,
            frequency,
        }
    }

    /// Target channel.
    pub fn channel(&self) -> u32 {
        match *self {
            MotionCommand::RelativeMove { channel, .. } | MotionCommand::StepMove { channel, .. } => {
                channel
            }
        }
    }

    /// Check the channel against `channel_count` and every numeric field
    /// against its range.
    pub fn validate(&self, channel_count: u32) -> Result<(), ValidationError> {
        validate::channel(self.channel(), channel_count)?;
        if let MotionCommand::StepMove {
            amplitude,
            frequency,
            ..
        } = *self
        {
            validate::amplitude(amplitude)?;
            validate::frequency(frequency)?;
        }
        Ok(())
    }
}

impl fmt::Display for MotionCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotionCommand::RelativeMove { channel, delta_nm } => {
                write!(f, "relative move ch{} by {} nm", channel, delta_nm)
            }
            MotionCommand::StepMove {
                channel,
                steps,
                amplitude,
                frequency,
            } => write!(
                f,
                "step move ch{}: steps={}, amp={}, freq={}",
                channel, steps, amplitude, frequency
            ),
        }
    }
}

/// Decoded channel status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionStatus {
    Idle,
    TargetSeeking,
    Unknown(u32),
}

impl MotionStatus {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            STOPPED_STATUS => MotionStatus::Idle,
            TARGET_STATUS => MotionStatus::TargetSeeking,
            other => MotionStatus::Unknown(other),
        }
    }

    pub fn is_seeking(&self) -> bool {
        matches!(self, MotionStatus::TargetSeeking)
    }
}
