//! Data-access capabilities the algorithms depend on.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use tracing::warn;

use crate::error::Result;
use crate::models::{
    Area, AreaId, GoalPackage, GroupId, Member, MemberId, MonthlyScoreRecord, Sector, SectorId,
    SmallGroup, TrainingStatus,
};

pub trait MembershipRepository {
    /// Fails with `CoreError::NotFound` for an unknown id.
    fn get_member(&self, id: MemberId) -> Result<Member>;

    fn get_training_status(&self, id: MemberId) -> Result<TrainingStatus> {
        Ok(self.get_member(id)?.training_status)
    }

    /// Active participants of a group plus its facilitator and host (when
    /// active). Fails with `CoreError::NotFound` for an unknown group.
    fn get_active_group_members(&self, group_id: GroupId) -> Result<BTreeSet<MemberId>>;

    /// Batch lookup; unknown ids are skipped.
    fn get_members(&self, ids: &BTreeSet<MemberId>) -> Result<Vec<Member>>;

    /// Ids of every active member.
    fn active_member_ids(&self) -> Result<Vec<MemberId>>;
}

pub trait HierarchyRepository {
    fn get_area(&self, id: AreaId) -> Result<Area>;
    fn get_sector(&self, id: SectorId) -> Result<Sector>;
    fn get_group(&self, id: GroupId) -> Result<SmallGroup>;
    fn list_areas(&self) -> Result<Vec<Area>>;
    fn list_sectors(&self) -> Result<Vec<Sector>>;
    fn list_groups(&self) -> Result<Vec<SmallGroup>>;
    fn sectors_in_area(&self, area_id: AreaId) -> Result<Vec<Sector>>;
    /// Every group of the sector, whatever its state.
    fn groups_in_sector(&self, sector_id: SectorId) -> Result<Vec<SmallGroup>>;
}

pub trait GoalPackageRepository {
    /// All packages of the area with `start_date <= as_of <= end_date`.
    fn goal_packages_valid_on(&self, area_id: AreaId, as_of: NaiveDate)
        -> Result<Vec<GoalPackage>>;

    fn get_active_goal_package(
        &self,
        area_id: AreaId,
        as_of: NaiveDate,
    ) -> Result<Option<GoalPackage>> {
        let candidates = self.goal_packages_valid_on(area_id, as_of)?;
        Ok(pick_active_package(area_id, as_of, candidates))
    }
}

/// Choose the package in force. More than one candidate is a data-integrity
/// anomaly: it is logged and the most recently started package wins (ties go
/// to the highest id).
pub fn pick_active_package(
    area_id: AreaId,
    as_of: NaiveDate,
    candidates: Vec<GoalPackage>,
) -> Option<GoalPackage> {
    if candidates.len() > 1 {
        let ids: Vec<i64> = candidates.iter().map(|p| p.id).collect();
        warn!(
            area_id,
            as_of = %as_of,
            candidates = ?ids,
            "Multiple goal packages valid on the same date, using the most recently started"
        );
    }
    candidates
        .into_iter()
        .max_by_key(|p| (p.start_date, p.id))
}

pub trait EventLog {
    /// Sum of point events with `date_from <= date <= date_to`.
    fn sum_points(&self, member_id: MemberId, date_from: NaiveDate, date_to: NaiveDate)
        -> Result<i64>;

    /// Distinct days with a daily-lesson event in `[date_from, date_to]`.
    fn count_distinct_lesson_days(
        &self,
        member_id: MemberId,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> Result<u32>;
}

pub trait ScoreSink {
    /// Insert or overwrite the (member, month, year) record in one transaction.
    fn upsert_monthly_score(&self, record: &MonthlyScoreRecord) -> Result<()>;
}
