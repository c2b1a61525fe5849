//! Goals and achieved counts for every node of an area.
//!
//! Goals are the active package's per-group targets multiplied by the number
//! of active groups under the node. Achieved counts come from the node's
//! complete member set: participants and leaders of its active groups, its
//! own supervisors, and recursively the sets of its children. The set is
//! deduplicated, so a member in several roles counts once.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::models::{
    AreaId, GoalPackage, GroupId, Member, MemberId, Metric, MetricCounts, NodeRef, SectorId,
    SmallGroup, TrainingStatus,
};
use crate::store::{GoalPackageRepository, HierarchyRepository, MembershipRepository};

/// Union of the member sets of a sector's active groups. Supervisors are
/// not included; this is the set ELEVE ranks.
pub fn sector_group_members<R>(repo: &R, sector_id: SectorId) -> Result<BTreeSet<MemberId>>
where
    R: MembershipRepository + HierarchyRepository,
{
    let mut members = BTreeSet::new();
    for group in repo.groups_in_sector(sector_id)? {
        if group.is_active() {
            members.extend(repo.get_active_group_members(group.id)?);
        }
    }
    Ok(members)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeProgress {
    pub node: NodeRef,
    pub name: String,
    pub active_groups: u32,
    pub member_count: usize,
    pub goals: MetricCounts,
    pub achieved: MetricCounts,
}

impl NodeProgress {
    /// Achieved over goal in percent, uncapped; `None` when the goal is 0.
    pub fn attainment(&self, metric: Metric) -> Option<u32> {
        MetricCounts::attainment_percent(&self.achieved, &self.goals, metric)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectorProgress {
    pub progress: NodeProgress,
    pub groups: Vec<NodeProgress>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AreaDashboard {
    pub as_of: NaiveDate,
    pub package: Option<GoalPackage>,
    pub area: NodeProgress,
    pub sectors: Vec<SectorProgress>,
}

pub struct HierarchyAggregator<'a, R> {
    repo: &'a R,
}

impl<'a, R> HierarchyAggregator<'a, R>
where
    R: MembershipRepository + HierarchyRepository + GoalPackageRepository,
{
    pub fn new(repo: &'a R) -> Self {
        Self { repo }
    }

    /// Progress of an area and everything beneath it on `as_of`.
    pub fn area_dashboard(&self, area_id: AreaId, as_of: NaiveDate) -> Result<AreaDashboard> {
        let area = self.repo.get_area(area_id)?;
        let package = self.repo.get_active_goal_package(area_id, as_of)?;
        let per_group = package.as_ref().map(|p| p.per_group).unwrap_or_default();

        let mut area_members = self.active_supervisors(&area.supervisors)?;
        let mut area_groups: Vec<SmallGroup> = Vec::new();
        let mut sectors = Vec::new();
        for sector in self.repo.sectors_in_area(area_id)? {
            let (progress, members, groups) = self.sector_parts(sector.id, package.as_ref())?;
            area_members.extend(members);
            area_groups.extend(groups);
            sectors.push(progress);
        }

        let active_groups = count_active(&area_groups);
        let area = NodeProgress {
            node: NodeRef::Area(area.id),
            name: area.name,
            active_groups,
            member_count: area_members.len(),
            goals: per_group.scaled(active_groups),
            achieved: self.achieved(&area_members, &area_groups, package.as_ref())?,
        };
        debug!(
            area_id,
            as_of = %as_of,
            package = ?package.as_ref().map(|p| p.id),
            active_groups,
            members = area.member_count,
            "Aggregated area"
        );

        Ok(AreaDashboard {
            as_of,
            package,
            area,
            sectors,
        })
    }

    /// Progress of one sector and its active groups, using its area's
    /// package on `as_of`.
    pub fn sector_progress(&self, sector_id: SectorId, as_of: NaiveDate) -> Result<SectorProgress> {
        let sector = self.repo.get_sector(sector_id)?;
        let package = self.repo.get_active_goal_package(sector.area_id, as_of)?;
        let (progress, _, _) = self.sector_parts(sector_id, package.as_ref())?;
        Ok(progress)
    }

    /// Complete member set of a node.
    pub fn member_set(&self, node: NodeRef) -> Result<BTreeSet<MemberId>> {
        match node {
            NodeRef::Group(id) => self.group_members(id),
            NodeRef::Sector(id) => self.sector_members(id),
            NodeRef::Area(id) => {
                let area = self.repo.get_area(id)?;
                let mut members = self.active_supervisors(&area.supervisors)?;
                for sector in self.repo.sectors_in_area(id)? {
                    members.extend(self.sector_members(sector.id)?);
                }
                Ok(members)
            }
        }
    }

    fn group_members(&self, group_id: GroupId) -> Result<BTreeSet<MemberId>> {
        let group = self.repo.get_group(group_id)?;
        if group.is_active() {
            self.repo.get_active_group_members(group_id)
        } else {
            Ok(BTreeSet::new())
        }
    }

    fn sector_members(&self, sector_id: SectorId) -> Result<BTreeSet<MemberId>> {
        let sector = self.repo.get_sector(sector_id)?;
        let mut members = self.active_supervisors(&sector.supervisors)?;
        members.extend(sector_group_members(self.repo, sector_id)?);
        Ok(members)
    }

    /// Supervisors still active. Soft-deleted members drop out like
    /// inactive participants do.
    fn active_supervisors(&self, supervisors: &[MemberId]) -> Result<BTreeSet<MemberId>> {
        let ids: BTreeSet<MemberId> = supervisors.iter().copied().collect();
        Ok(self
            .repo
            .get_members(&ids)?
            .into_iter()
            .filter(|m| m.active)
            .map(|m| m.id)
            .collect())
    }

    /// A sector's progress plus its member set and groups, for rolling up.
    fn sector_parts(
        &self,
        sector_id: SectorId,
        package: Option<&GoalPackage>,
    ) -> Result<(SectorProgress, BTreeSet<MemberId>, Vec<SmallGroup>)> {
        let sector = self.repo.get_sector(sector_id)?;
        let per_group = package.map(|p| p.per_group).unwrap_or_default();
        let groups = self.repo.groups_in_sector(sector_id)?;

        let mut sector_members = self.active_supervisors(&sector.supervisors)?;
        let mut group_progress = Vec::new();
        for group in groups.iter().filter(|g| g.is_active()) {
            let members = self.repo.get_active_group_members(group.id)?;
            group_progress.push(NodeProgress {
                node: NodeRef::Group(group.id),
                name: group.name.clone(),
                active_groups: 1,
                member_count: members.len(),
                goals: per_group,
                achieved: self.achieved(&members, std::slice::from_ref(group), package)?,
            });
            sector_members.extend(members);
        }

        let active_groups = count_active(&groups);
        let progress = NodeProgress {
            node: NodeRef::Sector(sector.id),
            name: sector.name,
            active_groups,
            member_count: sector_members.len(),
            goals: per_group.scaled(active_groups),
            achieved: self.achieved(&sector_members, &groups, package)?,
        };
        Ok((
            SectorProgress {
                progress,
                groups: group_progress,
            },
            sector_members,
            groups,
        ))
    }

    fn achieved(
        &self,
        members: &BTreeSet<MemberId>,
        groups: &[SmallGroup],
        package: Option<&GoalPackage>,
    ) -> Result<MetricCounts> {
        let members = self.repo.get_members(members)?;
        Ok(count_achieved(&members, groups, package))
    }
}

fn count_active(groups: &[SmallGroup]) -> u32 {
    groups.iter().filter(|g| g.is_active()).count() as u32
}

/// Achieved counts over an already deduplicated member list. Baptisms and
/// splits only count inside the package window; without a package they are 0.
pub fn count_achieved(
    members: &[Member],
    groups: &[SmallGroup],
    package: Option<&GoalPackage>,
) -> MetricCounts {
    let count = |pred: &dyn Fn(&Member) -> bool| members.iter().filter(|m| pred(m)).count() as u32;

    let (baptisms, group_splits) = match package {
        Some(package) => (
            count(&|m: &Member| {
                m.baptized && m.received_within(package.start_date, package.end_date)
            }),
            groups
                .iter()
                .filter_map(|g| g.split_at())
                .filter(|at| package.window_contains_datetime(*at))
                .count() as u32,
        ),
        None => (0, 0),
    };

    MetricCounts {
        facilitators_in_training: count(&|m: &Member| {
            m.training_status == TrainingStatus::FacilitatorInTraining
        }),
        hosts_in_training: count(&|m: &Member| m.training_status == TrainingStatus::HostInTraining),
        course_participants: count(&|m: &Member| m.completed_course),
        retreat_participants: count(&|m: &Member| m.attended_retreat),
        baptisms,
        group_splits,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{add_member, date, group, seed_single_group, Fixture, FACILITATOR, HOST};
    use crate::models::{GroupState, Sector};
    use crate::store::Store;

    fn goals(per_group: u32) -> MetricCounts {
        let mut counts = MetricCounts::default();
        for metric in Metric::ALL {
            counts.set(metric, per_group);
        }
        counts
    }

    #[test]
    fn test_area_without_groups_has_zero_goals() {
        let store = Store::open_in_memory().unwrap();
        store
            .insert_area(&crate::models::Area {
                id: 1,
                name: "Leste".to_string(),
                supervisors: vec![],
            })
            .unwrap();
        store
            .append_goal_package(1, date(2025, 1, 1), date(2025, 12, 31), goals(3))
            .unwrap();
        let dashboard = HierarchyAggregator::new(&store)
            .area_dashboard(1, date(2025, 6, 1))
            .unwrap();
        assert_eq!(dashboard.area.goals, MetricCounts::default());
        assert_eq!(dashboard.area.active_groups, 0);
        assert!(dashboard.sectors.is_empty());
    }

    #[test]
    fn test_goals_scale_with_active_groups() {
        let Fixture { store, area_id, sector_id, .. } = seed_single_group(2);
        add_member(&store, 200, None);
        add_member(&store, 201, None);
        store
            .insert_group(&group(2, "PG Fé", sector_id, 200, 201))
            .unwrap();
        let mut closed = group(3, "PG Antigo", sector_id, 200, 201);
        closed.state = GroupState::Closed;
        store.insert_group(&closed).unwrap();
        let package = MetricCounts {
            facilitators_in_training: 1,
            hosts_in_training: 2,
            course_participants: 3,
            retreat_participants: 4,
            baptisms: 5,
            group_splits: 6,
        };
        store
            .append_goal_package(area_id, date(2025, 1, 1), date(2025, 12, 31), package)
            .unwrap();

        let dashboard = HierarchyAggregator::new(&store)
            .area_dashboard(area_id, date(2025, 6, 1))
            .unwrap();
        assert_eq!(dashboard.area.active_groups, 2);
        for metric in Metric::ALL {
            assert_eq!(dashboard.area.goals.get(metric), package.get(metric) * 2);
            assert_eq!(
                dashboard.sectors[0].progress.goals.get(metric),
                package.get(metric) * 2
            );
            assert_eq!(dashboard.sectors[0].groups[0].goals.get(metric), package.get(metric));
        }
        assert_eq!(dashboard.sectors[0].groups.len(), 2);
    }

    #[test]
    fn test_no_package_means_zero_goals() {
        let Fixture { store, area_id, .. } = seed_single_group(2);
        let dashboard = HierarchyAggregator::new(&store)
            .area_dashboard(area_id, date(2025, 6, 1))
            .unwrap();
        assert!(dashboard.package.is_none());
        assert_eq!(dashboard.area.goals, MetricCounts::default());
        assert_eq!(dashboard.area.active_groups, 1);
        assert_eq!(dashboard.area.member_count, 4);
    }

    #[test]
    fn test_member_in_two_roles_counted_once() {
        let Fixture { store, area_id, sector_id, .. } = seed_single_group(1);
        let mut host = store.get_member(HOST).unwrap();
        host.completed_course = true;
        store.update_member(&host).unwrap();
        // The host also supervises the sector and the area.
        store.insert_sector(&Sector {
            id: 2,
            name: "Setor Beta".to_string(),
            area_id,
            supervisors: vec![HOST],
        })
        .unwrap();
        store
            .insert_group(&group(2, "PG Beta", 2, FACILITATOR, HOST))
            .unwrap();

        let aggregator = HierarchyAggregator::new(&store);
        let dashboard = aggregator.area_dashboard(area_id, date(2025, 6, 1)).unwrap();
        assert_eq!(dashboard.area.achieved.course_participants, 1);
        // 1 participant + facilitator + host
        assert_eq!(dashboard.area.member_count, 3);
        assert_eq!(aggregator.member_set(NodeRef::Area(area_id)).unwrap().len(), 3);
        assert_eq!(
            aggregator.member_set(NodeRef::Sector(sector_id)).unwrap(),
            aggregator.member_set(NodeRef::Sector(sector_id)).unwrap()
        );
    }

    #[test]
    fn test_supervisor_without_groups_still_counts() {
        let Fixture { store, area_id, .. } = seed_single_group(0);
        let mut supervisor = add_member(&store, 300, None);
        supervisor.training_status = TrainingStatus::FacilitatorInTraining;
        store.update_member(&supervisor).unwrap();
        store
            .insert_sector(&Sector {
                id: 2,
                name: "Setor Vazio".to_string(),
                area_id,
                supervisors: vec![300],
            })
            .unwrap();
        let progress = HierarchyAggregator::new(&store)
            .sector_progress(2, date(2025, 6, 1))
            .unwrap();
        assert_eq!(progress.progress.active_groups, 0);
        assert_eq!(progress.progress.goals, MetricCounts::default());
        assert_eq!(progress.progress.achieved.facilitators_in_training, 1);
    }

    #[test]
    fn test_inactive_supervisor_is_not_counted() {
        let Fixture { store, area_id, .. } = seed_single_group(0);
        let mut supervisor = add_member(&store, 300, None);
        supervisor.completed_course = true;
        supervisor.active = false;
        store.update_member(&supervisor).unwrap();
        store
            .insert_sector(&Sector {
                id: 2,
                name: "Setor Norte".to_string(),
                area_id,
                supervisors: vec![300],
            })
            .unwrap();

        let aggregator = HierarchyAggregator::new(&store);
        let progress = aggregator.sector_progress(2, date(2025, 6, 1)).unwrap();
        assert_eq!(progress.progress.member_count, 0);
        assert_eq!(progress.progress.achieved.course_participants, 0);

        let dashboard = aggregator.area_dashboard(area_id, date(2025, 6, 1)).unwrap();
        assert_eq!(dashboard.area.achieved.course_participants, 0);
        assert!(!aggregator.member_set(NodeRef::Area(area_id)).unwrap().contains(&300));
        assert!(aggregator.member_set(NodeRef::Sector(2)).unwrap().is_empty());
    }

    #[test]
    fn test_baptisms_and_splits_are_time_boxed() {
        let Fixture { store, area_id, sector_id, participants, .. } = seed_single_group(3);
        for (id, received) in participants.iter().zip([
            date(2025, 1, 1),
            date(2025, 6, 30),
            date(2024, 12, 31),
        ]) {
            let mut member = store.get_member(*id).unwrap();
            member.baptized = true;
            member.reception_date = Some(received);
            store.update_member(&member).unwrap();
        }
        let mut inside = group(2, "PG Dividido", sector_id, FACILITATOR, HOST);
        inside.state = GroupState::Split {
            at: date(2025, 3, 1).and_hms_opt(19, 30, 0).unwrap(),
        };
        store.insert_group(&inside).unwrap();
        let mut outside = group(3, "PG Dividido Antes", sector_id, FACILITATOR, HOST);
        outside.state = GroupState::Split {
            at: date(2024, 11, 1).and_hms_opt(19, 30, 0).unwrap(),
        };
        store.insert_group(&outside).unwrap();
        store
            .append_goal_package(area_id, date(2025, 1, 1), date(2025, 6, 30), goals(1))
            .unwrap();

        let dashboard = HierarchyAggregator::new(&store)
            .area_dashboard(area_id, date(2025, 2, 1))
            .unwrap();
        // [start, end): June 30 falls outside.
        assert_eq!(dashboard.area.achieved.baptisms, 1);
        assert_eq!(dashboard.area.achieved.group_splits, 1);
        assert_eq!(dashboard.sectors[0].progress.achieved.group_splits, 1);
    }

    #[test]
    fn test_overlapping_packages_fall_back_to_latest_start() {
        let Fixture { store, area_id, .. } = seed_single_group(0);
        let data = crate::store::SnapshotData {
            goal_packages: vec![
                GoalPackage {
                    id: 10,
                    area_id,
                    start_date: date(2025, 1, 1),
                    end_date: date(2025, 12, 31),
                    per_group: goals(1),
                },
                GoalPackage {
                    id: 11,
                    area_id,
                    start_date: date(2025, 3, 1),
                    end_date: date(2025, 12, 31),
                    per_group: goals(4),
                },
            ],
            ..Default::default()
        };
        store.import(&data).unwrap();
        let dashboard = HierarchyAggregator::new(&store)
            .area_dashboard(area_id, date(2025, 6, 1))
            .unwrap();
        assert_eq!(dashboard.package.map(|p| p.id), Some(11));
        assert_eq!(dashboard.area.goals.baptisms, 4);
    }

    #[test]
    fn test_unknown_area_is_not_found() {
        let store = Store::open_in_memory().unwrap();
        let err = HierarchyAggregator::new(&store)
            .area_dashboard(1, date(2025, 1, 1))
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
