//! Ranking within a sector and the qualifying cohort.

use std::collections::BTreeSet;

use serde::Serialize;

use super::scorer::{MonthlyScorer, ScoringPolicy};
use crate::error::Result;
use crate::hierarchy::sector_group_members;
use crate::models::{MemberId, MonthlyScoreRecord, SectorId};
use crate::store::{EventLog, HierarchyRepository, MembershipRepository};

/// Number of qualifying members among `ranked`: `ceil(percent × N / 100)`,
/// at least 1 when anyone is ranked.
pub fn cohort_size(ranked: usize, percent: u32) -> usize {
    if ranked == 0 {
        return 0;
    }
    let share = (ranked * percent as usize).div_ceil(100);
    share.clamp(1, ranked)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedMember {
    pub member_id: MemberId,
    pub points: i64,
    /// 1-based position in the sector.
    pub rank: u32,
    pub qualified: bool,
}

/// Order by points descending, ties by member id ascending, and flag the
/// leading cohort.
pub fn rank_scores(mut scores: Vec<(MemberId, i64)>, cohort_percent: u32) -> Vec<RankedMember> {
    scores.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    let cohort = cohort_size(scores.len(), cohort_percent);
    scores
        .into_iter()
        .enumerate()
        .map(|(i, (member_id, points))| RankedMember {
            member_id,
            points,
            rank: i as u32 + 1,
            qualified: i < cohort,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectorRanking {
    pub sector_id: SectorId,
    pub year: i32,
    pub month: u32,
    pub cohort_size: usize,
    pub members: Vec<RankedMember>,
}

impl SectorRanking {
    pub fn records(&self) -> Vec<MonthlyScoreRecord> {
        self.members
            .iter()
            .map(|m| MonthlyScoreRecord {
                member_id: m.member_id,
                sector_id: Some(self.sector_id),
                year: self.year,
                month: self.month,
                points: m.points,
                rank: Some(m.rank),
                qualified: m.qualified,
            })
            .collect()
    }

    pub fn qualified(&self) -> impl Iterator<Item = &RankedMember> {
        self.members.iter().filter(|m| m.qualified)
    }
}

/// Score and rank every member reachable through the sector's active groups.
/// Read-only; see `run_monthly_scoring` for the persisting variant.
pub fn rank_sector<R>(
    repo: &R,
    policy: ScoringPolicy,
    sector_id: SectorId,
    year: i32,
    month: u32,
) -> Result<SectorRanking>
where
    R: MembershipRepository + HierarchyRepository + EventLog,
{
    rank_sector_excluding(repo, policy, sector_id, year, month, &BTreeSet::new())
}

/// Like `rank_sector`, leaving out members already ranked elsewhere.
pub fn rank_sector_excluding<R>(
    repo: &R,
    policy: ScoringPolicy,
    sector_id: SectorId,
    year: i32,
    month: u32,
    excluded: &BTreeSet<MemberId>,
) -> Result<SectorRanking>
where
    R: MembershipRepository + HierarchyRepository + EventLog,
{
    repo.get_sector(sector_id)?;
    let members: BTreeSet<MemberId> = sector_group_members(repo, sector_id)?
        .difference(excluded)
        .copied()
        .collect();
    let scorer = MonthlyScorer::new(repo, policy);
    let scores = members
        .iter()
        .map(|&id| Ok((id, scorer.score_month(id, year, month)?.total)))
        .collect::<Result<Vec<_>>>()?;
    let members = rank_scores(scores, policy.cohort_percent);
    Ok(SectorRanking {
        sector_id,
        year,
        month,
        cohort_size: cohort_size(members.len(), policy.cohort_percent),
        members,
    })
}
