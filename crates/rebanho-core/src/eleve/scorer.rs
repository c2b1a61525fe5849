//! Monthly score of a single member.
//!
//! The month is cut into consecutive windows starting on the 1st (the last
//! one clipped to the month's end). Each window's points get a loyalty bonus
//! when the member completed daily lessons on enough distinct days in the
//! trailing days ending on the window's last day.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::Result;
use crate::models::MemberId;
use crate::store::EventLog;
use crate::utils::month_bounds;

// ============================================================================
// Constants
// ============================================================================

/// Multiplier, in percent, when no bonus applies.
pub const BASE_MULTIPLIER_PERCENT: u32 = 100;

/// Tunables of the ELEVE scoring run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringPolicy {
    /// Length of a scoring window in days.
    pub window_days: u32,
    /// Days looked back from a window's end, inclusive, for the streak.
    pub streak_lookback_days: u32,
    /// Distinct lesson days needed in the lookback for the bonus.
    pub streak_min_lesson_days: u32,
    pub streak_bonus_percent: u32,
    /// Share of a sector's ranked members that qualifies.
    pub cohort_percent: u32,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            window_days: 7,
            streak_lookback_days: 7,
            streak_min_lesson_days: 5,
            streak_bonus_percent: 10,
            cohort_percent: 20,
        }
    }
}

/// Inclusive `(start, end)` windows covering `first..=last`.
pub fn scoring_windows(
    first: NaiveDate,
    last: NaiveDate,
    window_days: u32,
) -> Vec<(NaiveDate, NaiveDate)> {
    let step = i64::from(window_days.max(1));
    let mut windows = Vec::new();
    let mut start = first;
    while start <= last {
        let end = (start + Duration::days(step - 1)).min(last);
        windows.push((start, end));
        start = end + Duration::days(1);
    }
    windows
}

/// `base × percent / 100`, rounded half up.
pub fn apply_multiplier(base: i64, percent: u32) -> i64 {
    (base * i64::from(percent) + 50).div_euclid(100)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowScore {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub base_points: i64,
    pub lesson_days: u32,
    pub multiplier_percent: u32,
    pub points: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyScore {
    pub member_id: MemberId,
    pub year: i32,
    pub month: u32,
    pub windows: Vec<WindowScore>,
    pub total: i64,
}

pub struct MonthlyScorer<'a, E> {
    events: &'a E,
    policy: ScoringPolicy,
}

impl<'a, E: EventLog> MonthlyScorer<'a, E> {
    pub fn new(events: &'a E, policy: ScoringPolicy) -> Self {
        Self { events, policy }
    }

    pub fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }

    /// Multiplier for a window ending on `end`, with the lesson-day count
    /// it was derived from.
    pub fn streak_multiplier(&self, member_id: MemberId, end: NaiveDate) -> Result<(u32, u32)> {
        let lookback = i64::from(self.policy.streak_lookback_days.max(1));
        let from = end - Duration::days(lookback - 1);
        let days = self.events.count_distinct_lesson_days(member_id, from, end)?;
        let percent = if days >= self.policy.streak_min_lesson_days {
            BASE_MULTIPLIER_PERCENT + self.policy.streak_bonus_percent
        } else {
            BASE_MULTIPLIER_PERCENT
        };
        Ok((percent, days))
    }

    pub fn score_window(
        &self,
        member_id: MemberId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<WindowScore> {
        let base_points = self.events.sum_points(member_id, start, end)?;
        let (multiplier_percent, lesson_days) = self.streak_multiplier(member_id, end)?;
        Ok(WindowScore {
            start,
            end,
            base_points,
            lesson_days,
            multiplier_percent,
            points: apply_multiplier(base_points, multiplier_percent),
        })
    }

    /// Score one member for one month. A member with no events scores 0.
    pub fn score_month(&self, member_id: MemberId, year: i32, month: u32) -> Result<MonthlyScore> {
        let (first, last) = month_bounds(year, month)?;
        let windows = scoring_windows(first, last, self.policy.window_days)
            .into_iter()
            .map(|(start, end)| self.score_window(member_id, start, end))
            .collect::<Result<Vec<_>>>()?;
        let total = windows.iter().map(|w| w.points).sum();
        trace!(member_id, year, month, total, "Scored month");
        Ok(MonthlyScore {
            member_id,
            year,
            month,
            windows,
            total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    /// In-memory event log: (member, date) -> (points, lesson completed).
    #[derive(Default)]
    struct MemoryLog {
        days: BTreeMap<(MemberId, NaiveDate), (i64, bool)>,
    }

    impl MemoryLog {
        fn points(&mut self, member: MemberId, date: NaiveDate, points: i64) {
            self.days.entry((member, date)).or_default().0 += points;
        }

        fn lesson(&mut self, member: MemberId, date: NaiveDate) {
            self.days.entry((member, date)).or_default().1 = true;
        }
    }

    impl EventLog for MemoryLog {
        fn sum_points(&self, member: MemberId, from: NaiveDate, to: NaiveDate) -> Result<i64> {
            Ok(self
                .days
                .range((member, from)..=(member, to))
                .map(|(_, (p, _))| *p)
                .sum())
        }

        fn count_distinct_lesson_days(
            &self,
            member: MemberId,
            from: NaiveDate,
            to: NaiveDate,
        ) -> Result<u32> {
            Ok(self
                .days
                .range((member, from)..=(member, to))
                .filter(|(_, (_, lesson))| *lesson)
                .count() as u32)
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_windows_cover_month() {
        let windows = scoring_windows(d(2025, 3, 1), d(2025, 3, 31), 7);
        assert_eq!(windows.len(), 5);
        assert_eq!(windows[0], (d(2025, 3, 1), d(2025, 3, 7)));
        assert_eq!(windows[4], (d(2025, 3, 29), d(2025, 3, 31)));

        let feb = scoring_windows(d(2026, 2, 1), d(2026, 2, 28), 7);
        assert_eq!(feb.len(), 4);
        assert_eq!(feb[3].1, d(2026, 2, 28));
    }

    #[test]
    fn test_apply_multiplier_rounds_half_up() {
        assert_eq!(apply_multiplier(18, 110), 20); // 19.8
        assert_eq!(apply_multiplier(15, 110), 17); // 16.5
        assert_eq!(apply_multiplier(25, 110), 28); // 27.5
        assert_eq!(apply_multiplier(14, 110), 15); // 15.4
        assert_eq!(apply_multiplier(18, 100), 18);
        assert_eq!(apply_multiplier(0, 110), 0);
    }

    #[test]
    fn test_window_with_five_lesson_days_gets_bonus() {
        let mut log = MemoryLog::default();
        log.points(1, d(2025, 3, 1), 10);
        log.points(1, d(2025, 3, 3), 8);
        for day in 1..=5 {
            log.lesson(1, d(2025, 3, day));
        }
        let scorer = MonthlyScorer::new(&log, ScoringPolicy::default());
        let window = scorer.score_window(1, d(2025, 3, 1), d(2025, 3, 7)).unwrap();
        assert_eq!(window.base_points, 18);
        assert_eq!(window.lesson_days, 5);
        assert_eq!(window.multiplier_percent, 110);
        assert_eq!(window.points, 20);
    }

    #[test]
    fn test_window_with_four_lesson_days_gets_no_bonus() {
        let mut log = MemoryLog::default();
        log.points(1, d(2025, 3, 1), 10);
        log.points(1, d(2025, 3, 3), 8);
        for day in 1..=4 {
            log.lesson(1, d(2025, 3, day));
        }
        let scorer = MonthlyScorer::new(&log, ScoringPolicy::default());
        let window = scorer.score_window(1, d(2025, 3, 1), d(2025, 3, 7)).unwrap();
        assert_eq!(window.multiplier_percent, 100);
        assert_eq!(window.points, 18);
    }

    #[test]
    fn test_streak_looks_back_past_month_start() {
        let mut log = MemoryLog::default();
        // Lessons on Feb 27, 28 and Mar 1..=3; the window ending Mar 7
        // only sees Mar 1..=7.
        for date in [d(2025, 2, 27), d(2025, 2, 28), d(2025, 3, 1), d(2025, 3, 2), d(2025, 3, 3)] {
            log.lesson(1, date);
        }
        let scorer = MonthlyScorer::new(&log, ScoringPolicy::default());
        let (percent, days) = scorer.streak_multiplier(1, d(2025, 3, 7)).unwrap();
        assert_eq!((percent, days), (100, 3));
        let (percent, days) = scorer.streak_multiplier(1, d(2025, 3, 3)).unwrap();
        assert_eq!((percent, days), (110, 5));
    }

    #[test]
    fn test_member_without_events_scores_zero() {
        let log = MemoryLog::default();
        let scorer = MonthlyScorer::new(&log, ScoringPolicy::default());
        let score = scorer.score_month(42, 2025, 4).unwrap();
        assert_eq!(score.total, 0);
        assert_eq!(score.windows.len(), 5);
    }

    #[test]
    fn test_month_total_sums_windows() {
        let mut log = MemoryLog::default();
        log.points(1, d(2025, 4, 2), 7);
        log.points(1, d(2025, 4, 9), 5);
        log.points(1, d(2025, 4, 30), 3);
        log.points(1, d(2025, 5, 1), 100);
        let scorer = MonthlyScorer::new(&log, ScoringPolicy::default());
        assert_eq!(scorer.score_month(1, 2025, 4).unwrap().total, 15);
    }
}
