// libs/shared/models/src/time.rs
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// Wall-clock time of day, stored as minutes since midnight.
///
/// `24:00` is representable so a window can end at midnight; every other
/// value lies in `00:00..=23:59`. No timezone is attached: values are the
/// doctor's local time at the hospital.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(u16);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeOfDayError {
    #[error("Invalid time format '{0}', expected HH:MM")]
    InvalidFormat(String),

    #[error("Time out of range: {0} minutes since midnight")]
    OutOfRange(u32),
}

impl TimeOfDay {
    pub const MIDNIGHT: TimeOfDay = TimeOfDay(0);
    pub const END_OF_DAY: TimeOfDay = TimeOfDay(MINUTES_PER_DAY);

    pub fn from_minutes(minutes: u32) -> Result<Self, TimeOfDayError> {
        if minutes > MINUTES_PER_DAY as u32 {
            return Err(TimeOfDayError::OutOfRange(minutes));
        }
        Ok(Self(minutes as u16))
    }

    pub fn from_hm(hour: u32, minute: u32) -> Result<Self, TimeOfDayError> {
        if minute > 59 {
            return Err(TimeOfDayError::InvalidFormat(format!("{:02}:{:02}", hour, minute)));
        }
        Self::from_minutes(hour * 60 + minute)
    }

    pub fn minutes(self) -> u32 {
        self.0 as u32
    }

    pub fn hour(self) -> u32 {
        self.minutes() / 60
    }

    pub fn minute(self) -> u32 {
        self.minutes() % 60
    }

    /// Adds whole minutes, returning `None` when the result passes the end of day.
    pub fn checked_add_minutes(self, minutes: u32) -> Option<Self> {
        Self::from_minutes(self.minutes().checked_add(minutes)?).ok()
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for TimeOfDay {
    type Err = TimeOfDayError;

    /// Accepts `HH:MM` and the `HH:MM:SS` form Postgres returns for `time`
    /// columns. Seconds must be zero.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TimeOfDayError::InvalidFormat(s.to_string());
        let parts: Vec<&str> = s.trim().split(':').collect();
        if !(2..=3).contains(&parts.len()) {
            return Err(invalid());
        }

        let field = |raw: &str| -> Result<u32, TimeOfDayError> {
            if raw.len() != 2 || !raw.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            raw.parse::<u32>().map_err(|_| invalid())
        };

        let hour = field(parts[0])?;
        let minute = field(parts[1])?;
        if parts.len() == 3 && field(parts[2])? != 0 {
            return Err(invalid());
        }
        if hour > 24 || (hour == 24 && minute != 0) {
            return Err(invalid());
        }

        Self::from_hm(hour, minute)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
