use std::fmt;

use chrono::{Datelike, NaiveDate};

use crate::error::AppError;

pub const MONTH_FORMAT_INVALID: &str = "Month must be in YYYY-MM format";

/// A calendar month, written `YYYY-MM` in query strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Month {
    year: i32,
    month: u32,
}

impl Month {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|_| Self { year, month })
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let invalid = || AppError::invalid_field("month", MONTH_FORMAT_INVALID);
        let (year, month) = raw.trim().split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year = year.parse().map_err(|_| invalid())?;
        let month = month.parse().map_err(|_| invalid())?;
        Self::new(year, month).ok_or_else(invalid)
    }

    /// The requested month, or the month of `today` when absent or blank.
    pub fn parse_or_current(raw: Option<&str>, today: NaiveDate) -> Result<Self, AppError> {
        match raw.map(str::trim).filter(|r| !r.is_empty()) {
            Some(raw) => Self::parse(raw),
            None => Ok(Self::containing(today)),
        }
    }

    pub fn first_day(self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn previous(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Half-open range `[first day, first day of next month)`.
    pub fn bounds(self) -> (NaiveDate, NaiveDate) {
        (self.first_day(), self.next().first_day())
    }

    pub fn days(self) -> impl Iterator<Item = NaiveDate> {
        let (start, end) = self.bounds();
        start.iter_days().take_while(move |d| *d < end)
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_year_month() {
        let month = Month::parse("2024-01").unwrap();
        assert_eq!(month.to_string(), "2024-01");
        assert_eq!(month.first_day(), date(2024, 1, 1));
    }

    #[test]
    fn rejects_malformed_months() {
        for raw in ["2024-13", "2024-1", "24-01", "2024/01", "", "abcd-ef"] {
            assert!(
                matches!(Month::parse(raw), Err(AppError::Validation { .. })),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn blank_falls_back_to_current_month() {
        let today = date(2024, 3, 15);
        assert_eq!(Month::parse_or_current(None, today).unwrap().to_string(), "2024-03");
        assert_eq!(Month::parse_or_current(Some(" "), today).unwrap().to_string(), "2024-03");
    }

    #[test]
    fn navigation_wraps_years() {
        let jan = Month::parse("2024-01").unwrap();
        assert_eq!(jan.previous().to_string(), "2023-12");
        assert_eq!(jan.previous().next(), jan);
        assert_eq!(Month::parse("2024-12").unwrap().next().to_string(), "2025-01");
    }

    #[test]
    fn days_cover_the_whole_month() {
        let feb = Month::parse("2024-02").unwrap();
        let days: Vec<_> = feb.days().collect();
        assert_eq!(days.len(), 29);
        assert_eq!(days.last(), Some(&date(2024, 2, 29)));
        assert_eq!(feb.bounds(), (date(2024, 2, 1), date(2024, 3, 1)));
    }
}
