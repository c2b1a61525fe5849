//! Annual standings derived from a year's monthly records.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{MemberId, MonthlyScoreRecord};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnnualStanding {
    pub member_id: MemberId,
    pub position: u32,
    pub total_points: i64,
    pub best_month_points: i64,
    /// Months in which the member made the top cohort of their sector.
    pub qualifications: u32,
    /// Points earned in qualifying months.
    pub qualified_points: i64,
    pub qualified: bool,
}

/// Fold monthly records into one standing per member, ordered by total,
/// best month, qualifications and qualified points (all descending), then
/// member id.
pub fn annual_standings(records: &[MonthlyScoreRecord]) -> Vec<AnnualStanding> {
    let mut by_member: BTreeMap<MemberId, AnnualStanding> = BTreeMap::new();
    for record in records {
        let standing = by_member
            .entry(record.member_id)
            .or_insert_with(|| AnnualStanding {
                member_id: record.member_id,
                best_month_points: record.points,
                ..AnnualStanding::default()
            });
        standing.total_points += record.points;
        standing.best_month_points = standing.best_month_points.max(record.points);
        if record.qualified {
            standing.qualifications += 1;
            standing.qualified_points += record.points;
            standing.qualified = true;
        }
    }

    let mut standings: Vec<AnnualStanding> = by_member.into_values().collect();
    standings.sort_by(|a, b| {
        b.total_points
            .cmp(&a.total_points)
            .then(b.best_month_points.cmp(&a.best_month_points))
            .then(b.qualifications.cmp(&a.qualifications))
            .then(b.qualified_points.cmp(&a.qualified_points))
            .then(a.member_id.cmp(&b.member_id))
    });
    for (i, standing) in standings.iter_mut().enumerate() {
        standing.position = i as u32 + 1;
    }
    standings
}
