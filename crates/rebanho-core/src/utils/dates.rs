use chrono::{Datelike, NaiveDate};

use crate::error::{CoreError, Result};

/// First and last day of a calendar month.
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| CoreError::InvalidInput(format!("invalid month {}-{:02}", year, month)))?;
    let last = next_month_start(first)
        .and_then(|d| d.pred_opt())
        .ok_or_else(|| CoreError::InvalidInput(format!("month out of range: {}-{:02}", year, month)))?;
    Ok((first, last))
}

/// The 1st of the month after `date`.
pub fn next_month_start(date: NaiveDate) -> Option<NaiveDate> {
    if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_month_bounds() {
        assert_eq!(month_bounds(2025, 2).unwrap(), (d(2025, 2, 1), d(2025, 2, 28)));
        assert_eq!(month_bounds(2024, 2).unwrap(), (d(2024, 2, 1), d(2024, 2, 29)));
        assert_eq!(month_bounds(2025, 12).unwrap(), (d(2025, 12, 1), d(2025, 12, 31)));
    }

    #[test]
    fn test_month_bounds_rejects_bad_month() {
        assert!(matches!(month_bounds(2025, 13), Err(CoreError::InvalidInput(_))));
        assert!(month_bounds(2025, 0).is_err());
    }
}
