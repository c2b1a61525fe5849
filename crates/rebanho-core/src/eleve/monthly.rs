//! The monthly scoring run: rank, then persist one record per member.
//!
//! Each member's record is upserted in its own transaction. A failed write
//! is logged with the member id and collected in the report so the batch
//! can be retried for that subset only.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{error, info, warn};

use super::ranking::{rank_sector, rank_sector_excluding, SectorRanking};
use super::scorer::{MonthlyScorer, ScoringPolicy};
use crate::error::Result;
use crate::hierarchy::sector_group_members;
use crate::models::{MemberId, MonthlyScoreRecord, SectorId};
use crate::store::{EventLog, HierarchyRepository, MembershipRepository, ScoreSink};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub written: usize,
    pub failed: Vec<FailedWrite>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedWrite {
    pub member_id: MemberId,
    pub error: String,
}

impl BatchReport {
    fn write<S: ScoreSink>(&mut self, sink: &S, record: &MonthlyScoreRecord) {
        match sink.upsert_monthly_score(record) {
            Ok(()) => self.written += 1,
            Err(e) => {
                error!(
                    member_id = record.member_id,
                    year = record.year,
                    month = record.month,
                    error = %e,
                    "Failed to write monthly score"
                );
                self.failed.push(FailedWrite {
                    member_id: record.member_id,
                    error: e.to_string(),
                });
            }
        }
    }

    pub fn failed_members(&self) -> Vec<MemberId> {
        self.failed.iter().map(|f| f.member_id).collect()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SectorRun {
    pub ranking: SectorRanking,
    pub report: BatchReport,
}

/// Rank one sector for a month and upsert every ranked member's record.
/// With `dry_run` nothing is written.
pub fn run_monthly_scoring<R>(
    repo: &R,
    policy: ScoringPolicy,
    sector_id: SectorId,
    year: i32,
    month: u32,
    dry_run: bool,
) -> Result<SectorRun>
where
    R: MembershipRepository + HierarchyRepository + EventLog + ScoreSink,
{
    let ranking = rank_sector(repo, policy, sector_id, year, month)?;
    let mut report = BatchReport::default();
    if !dry_run {
        for record in ranking.records() {
            report.write(repo, &record);
        }
    }
    info!(
        sector_id,
        year,
        month,
        ranked = ranking.members.len(),
        written = report.written,
        failed = report.failed.len(),
        dry_run,
        "Scored sector"
    );
    Ok(SectorRun { ranking, report })
}

/// Score a member outside any sector ranking and write their own record,
/// with no sector and no rank.
pub fn score_member_record<R>(
    repo: &R,
    policy: ScoringPolicy,
    member_id: MemberId,
    year: i32,
    month: u32,
) -> Result<MonthlyScoreRecord>
where
    R: MembershipRepository + EventLog + ScoreSink,
{
    repo.get_member(member_id)?;
    let score = MonthlyScorer::new(repo, policy).score_month(member_id, year, month)?;
    let record = MonthlyScoreRecord {
        member_id,
        sector_id: None,
        year,
        month,
        points: score.total,
        rank: None,
        qualified: false,
    };
    repo.upsert_monthly_score(&record)?;
    Ok(record)
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MonthRun {
    pub year: i32,
    pub month: u32,
    pub sectors: Vec<SectorRanking>,
    /// Active members reached by no sector, scored on their own.
    pub unaffiliated: Vec<MemberId>,
    pub report: BatchReport,
}

/// Rank every sector, then write own-records for active members no sector
/// reached. Sectors are processed in id order and a member reachable from
/// several sectors is ranked only in the first, so every sector's cohort is
/// fully persisted.
pub fn run_all_sectors<R>(repo: &R, policy: ScoringPolicy, year: i32, month: u32) -> Result<MonthRun>
where
    R: MembershipRepository + HierarchyRepository + EventLog + ScoreSink,
{
    let mut sectors = repo.list_sectors()?;
    sectors.sort_by_key(|s| s.id);
    let known: BTreeSet<SectorId> = sectors.iter().map(|s| s.id).collect();
    for group in repo.list_groups()? {
        if !known.contains(&group.sector_id) {
            warn!(
                group_id = group.id,
                sector_id = group.sector_id,
                "Group references a missing sector, skipping it"
            );
        }
    }

    let mut run = MonthRun {
        year,
        month,
        ..MonthRun::default()
    };
    let mut ranked_in: BTreeMap<MemberId, SectorId> = BTreeMap::new();
    for sector in &sectors {
        let ranked: BTreeSet<MemberId> = ranked_in.keys().copied().collect();
        for member_id in sector_group_members(repo, sector.id)?.intersection(&ranked) {
            warn!(
                member_id,
                ranked_sector = ranked_in.get(member_id).copied(),
                sector_id = sector.id,
                "Member reachable from more than one sector, keeping the first ranking"
            );
        }
        let ranking = rank_sector_excluding(repo, policy, sector.id, year, month, &ranked)?;
        for record in ranking.records() {
            ranked_in.insert(record.member_id, sector.id);
            run.report.write(repo, &record);
        }
        run.sectors.push(ranking);
    }

    let scorer = MonthlyScorer::new(repo, policy);
    for member_id in repo.active_member_ids()? {
        if ranked_in.contains_key(&member_id) {
            continue;
        }
        let score = scorer.score_month(member_id, year, month)?;
        let record = MonthlyScoreRecord {
            member_id,
            sector_id: None,
            year,
            month,
            points: score.total,
            rank: None,
            qualified: false,
        };
        run.report.write(repo, &record);
        run.unaffiliated.push(member_id);
    }

    info!(
        year,
        month,
        sectors = run.sectors.len(),
        unaffiliated = run.unaffiliated.len(),
        written = run.report.written,
        failed = run.report.failed.len(),
        "Monthly scoring complete"
    );
    Ok(run)
}
