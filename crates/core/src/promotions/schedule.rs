//! Time-of-day windows and weekday sets

use jiff::civil::{Time, Weekday};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// A time-of-day window in store-local time.
///
/// Half-open: `start` is inside, `end` is not. A window whose `end` is earlier
/// than its `start` runs past midnight (e.g. 22:00 to 02:00).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Opening time, inclusive
    pub start: Time,

    /// Closing time, exclusive
    pub end: Time,
}

impl TimeWindow {
    /// Create a new window.
    pub const fn new(start: Time, end: Time) -> Self {
        Self { start, end }
    }

    /// Whether `time` falls inside the window.
    pub fn contains(&self, time: Time) -> bool {
        if self.start <= self.end {
            self.start <= time && time < self.end
        } else {
            time >= self.start || time < self.end
        }
    }
}

/// Allowed weekdays as Monday-zero offsets (Monday = 0, Sunday = 6).
///
/// An empty set allows every day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeekdaySet(SmallVec<[u8; 7]>);

impl WeekdaySet {
    /// Build a set from Monday-zero offsets, sorted and deduplicated.
    ///
    /// Returns the first offset outside `0..=6` as the error.
    ///
    /// # Errors
    ///
    /// Returns the offending value when an offset is not a weekday.
    pub fn from_offsets(offsets: &[u8]) -> Result<Self, u8> {
        let mut days: SmallVec<[u8; 7]> = SmallVec::new();

        for &offset in offsets {
            if offset > 6 {
                return Err(offset);
            }

            if !days.contains(&offset) {
                days.push(offset);
            }
        }

        days.sort_unstable();

        Ok(Self(days))
    }

    /// Whether the set restricts nothing.
    pub fn is_unrestricted(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `weekday` is allowed.
    pub fn allows(&self, weekday: Weekday) -> bool {
        if self.0.is_empty() {
            return true;
        }

        u8::try_from(weekday.to_monday_zero_offset())
            .is_ok_and(|offset| self.0.contains(&offset))
    }

    /// The offsets in ascending order.
    pub fn offsets(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use jiff::civil::time;

    use super::*;

    #[test]
    fn daytime_window_is_half_open() {
        let window = TimeWindow::new(time(14, 0, 0, 0), time(17, 0, 0, 0));

        assert!(window.contains(time(14, 0, 0, 0)));
        assert!(window.contains(time(16, 59, 59, 0)));
        assert!(!window.contains(time(17, 0, 0, 0)));
        assert!(!window.contains(time(13, 59, 0, 0)));
    }

    #[test]
    fn overnight_window_wraps_midnight() {
        let window = TimeWindow::new(time(22, 0, 0, 0), time(2, 0, 0, 0));

        assert!(window.contains(time(23, 30, 0, 0)));
        assert!(window.contains(time(0, 15, 0, 0)));
        assert!(!window.contains(time(2, 0, 0, 0)));
        assert!(!window.contains(time(12, 0, 0, 0)));
    }

    #[test]
    fn weekday_set_rejects_out_of_range_offsets() {
        assert_eq!(WeekdaySet::from_offsets(&[0, 7]), Err(7));
    }

    #[test]
    fn weekday_set_sorts_and_dedups() -> Result<(), u8> {
        let set = WeekdaySet::from_offsets(&[4, 0, 4, 2])?;

        assert_eq!(set.offsets(), &[0, 2, 4]);
        assert!(set.allows(Weekday::Monday));
        assert!(set.allows(Weekday::Friday));
        assert!(!set.allows(Weekday::Sunday));

        Ok(())
    }

    #[test]
    fn empty_weekday_set_allows_everything() {
        let set = WeekdaySet::default();

        assert!(set.is_unrestricted());
        assert!(set.allows(Weekday::Sunday));
    }
}
