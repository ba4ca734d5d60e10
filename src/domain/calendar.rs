//! Policy meeting calendar (externally maintained reference data).

use chrono::NaiveDate;

/// Future decision dates, kept sorted and de-duplicated.
///
/// The calendar is never checked for correctness here; it is only queried for
/// "meetings after date X".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeetingCalendar {
    dates: Vec<NaiveDate>,
}

impl MeetingCalendar {
    pub fn new(mut dates: Vec<NaiveDate>) -> Self {
        dates.sort();
        dates.dedup();
        Self { dates }
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// First meeting strictly after `date`.
    pub fn next_after(&self, date: NaiveDate) -> Option<NaiveDate> {
        self.dates.iter().copied().find(|d| *d > date)
    }

    /// Up to `limit` meetings strictly after `date`, nearest first.
    pub fn upcoming(&self, date: NaiveDate, limit: usize) -> Vec<NaiveDate> {
        self.dates
            .iter()
            .copied()
            .filter(|d| *d > date)
            .take(limit)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, day).unwrap()
    }

    #[test]
    fn lookups_skip_past_and_same_day_meetings() {
        let cal = MeetingCalendar::new(vec![d(3, 19), d(1, 29), d(5, 7), d(1, 29)]);
        assert_eq!(cal.dates().len(), 3);
        assert_eq!(cal.next_after(d(1, 29)), Some(d(3, 19)));
        assert_eq!(cal.upcoming(d(1, 1), 2), vec![d(1, 29), d(3, 19)]);
        assert_eq!(cal.next_after(d(6, 1)), None);
    }
}
