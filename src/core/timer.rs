//! Duration units and timeout descriptors.

use crate::core::ids::StateTag;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Unit a timeout duration is expressed in.
///
/// The textual forms `"ms"`, `"sec"` and `"min"` are the only accepted
/// encodings; anything else is a [`ConfigError::InvalidDurationUnit`].
///
/// # Example
///
/// ```rust
/// use signalbox::DurationUnit;
/// use std::time::Duration;
///
/// let unit: DurationUnit = "ms".parse().unwrap();
/// assert_eq!(unit.duration(250), Duration::from_millis(250));
/// assert!("hours".parse::<DurationUnit>().is_err());
/// ```
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationUnit {
    Ms,
    #[default]
    Sec,
    Min,
}

impl DurationUnit {
    /// Convert a raw count in this unit into a [`Duration`].
    pub fn duration(self, count: u64) -> Duration {
        match self {
            Self::Ms => Duration::from_millis(count),
            Self::Sec => Duration::from_secs(count),
            Self::Min => Duration::from_secs(count * 60),
        }
    }
}

impl fmt::Display for DurationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ms => "ms",
            Self::Sec => "sec",
            Self::Min => "min",
        };
        f.write_str(s)
    }
}

impl FromStr for DurationUnit {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ms" => Ok(Self::Ms),
            "sec" => Ok(Self::Sec),
            "min" => Ok(Self::Min),
            other => Err(ConfigError::InvalidDurationUnit(other.to_string())),
        }
    }
}

/// A timed, self-scheduled transition: after `duration` in the owning
/// state the machine switches to `next_state`.
///
/// A state without a timeout simply carries no `TimerEvent` (the slot is
/// an `Option` on the state-info record).
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct TimerEvent<S> {
    /// State to switch to on expiry.
    pub next_state: S,
    /// Duration count, interpreted in `unit`.
    pub duration: u64,
    /// Unit `duration` is expressed in.
    pub unit: DurationUnit,
}

impl<S: StateTag> TimerEvent<S> {
    /// The armed duration as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        self.unit.duration(self.duration)
    }
}
