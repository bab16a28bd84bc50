//! Ride departure times.
//!
//! Rides carry only a time of day ("08:30 PM"), no date. Comparisons are made
//! against a caller-supplied day.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeSlotError {
    #[error("empty time slot")]
    Empty,
    #[error("invalid time slot '{0}': expected hh:mm AM/PM")]
    Malformed(String),
    #[error("time slot '{0}' is out of range")]
    OutOfRange(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeSlot(NaiveTime);

#[derive(Clone, Copy, PartialEq)]
enum Meridiem {
    Am,
    Pm,
}

impl TimeSlot {
    pub fn new(time: NaiveTime) -> Self {
        Self(time)
    }

    /// Parse "hh:mm AM/PM". The suffix is case-insensitive and may be
    /// attached ("9:05pm"); without a suffix the value is read as 24-hour.
    pub fn parse(input: &str) -> Result<Self, TimeSlotError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(TimeSlotError::Empty);
        }

        let upper = trimmed.to_ascii_uppercase();
        let (clock, meridiem) = if let Some(rest) = upper.strip_suffix("AM") {
            (rest.trim_end(), Some(Meridiem::Am))
        } else if let Some(rest) = upper.strip_suffix("PM") {
            (rest.trim_end(), Some(Meridiem::Pm))
        } else {
            (upper.as_str(), None)
        };

        let malformed = || TimeSlotError::Malformed(trimmed.to_string());
        let (hours, minutes) = clock.split_once(':').ok_or_else(malformed)?;
        let mut hours: u32 = hours.trim().parse().map_err(|_| malformed())?;
        let minutes: u32 = minutes.trim().parse().map_err(|_| malformed())?;

        let out_of_range = || TimeSlotError::OutOfRange(trimmed.to_string());
        match meridiem {
            Some(m) => {
                if !(1..=12).contains(&hours) {
                    return Err(out_of_range());
                }
                if m == Meridiem::Pm && hours != 12 {
                    hours += 12;
                } else if m == Meridiem::Am && hours == 12 {
                    hours = 0;
                }
            }
            None if hours > 23 => return Err(out_of_range()),
            None => {}
        }

        NaiveTime::from_hms_opt(hours, minutes, 0)
            .map(Self)
            .ok_or_else(out_of_range)
    }

    pub fn time(&self) -> NaiveTime {
        self.0
    }

    /// This slot on the given day
    pub fn on(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.0)
    }
}

impl FromStr for TimeSlot {
    type Err = TimeSlotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%I:%M %p"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_parse_twelve_hour() {
        assert_eq!(TimeSlot::parse("08:30 AM").unwrap().time(), hm(8, 30));
        assert_eq!(TimeSlot::parse("11:00 PM").unwrap().time(), hm(23, 0));
        assert_eq!(TimeSlot::parse("12:15 AM").unwrap().time(), hm(0, 15));
        assert_eq!(TimeSlot::parse("12:45 PM").unwrap().time(), hm(12, 45));
        assert_eq!(TimeSlot::parse("9:05pm").unwrap().time(), hm(21, 5));
    }

    #[test]
    fn test_parse_without_suffix_is_24_hour() {
        assert_eq!(TimeSlot::parse("17:40").unwrap().time(), hm(17, 40));
        assert!(matches!(TimeSlot::parse("24:00"), Err(TimeSlotError::OutOfRange(_))));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(TimeSlot::parse("  "), Err(TimeSlotError::Empty));
        assert!(matches!(TimeSlot::parse("noon"), Err(TimeSlotError::Malformed(_))));
        assert!(matches!(TimeSlot::parse("13:00 PM"), Err(TimeSlotError::OutOfRange(_))));
        assert!(matches!(TimeSlot::parse("10:75 AM"), Err(TimeSlotError::OutOfRange(_))));
    }

    #[test]
    fn test_display_is_twelve_hour() {
        assert_eq!(TimeSlot::new(hm(23, 0)).to_string(), "11:00 PM");
        assert_eq!(TimeSlot::new(hm(7, 5)).to_string(), "07:05 AM");
    }

    #[test]
    fn test_ordering_follows_time_of_day() {
        let early = TimeSlot::parse("11:59 AM").unwrap();
        let late = TimeSlot::parse("12:01 PM").unwrap();
        assert!(early < late);
    }
}
