//! JSON snapshots of the whole database, used to seed and back up a store.

use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::repository::{HierarchyRepository, MembershipRepository};
use super::sqlite::{
    insert_area, insert_goal_package, insert_group, insert_lesson, insert_member,
    insert_point_event, insert_sector, update_member, Store,
};
use crate::error::Result;
use crate::models::{Area, DailyLesson, GoalPackage, Member, PointEvent, Sector, SmallGroup};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotData {
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default)]
    pub areas: Vec<Area>,
    #[serde(default)]
    pub sectors: Vec<Sector>,
    #[serde(default)]
    pub groups: Vec<SmallGroup>,
    #[serde(default)]
    pub goal_packages: Vec<GoalPackage>,
    #[serde(default)]
    pub point_events: Vec<PointEvent>,
    #[serde(default)]
    pub lessons: Vec<DailyLesson>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub exported_at: DateTime<Utc>,
    pub data: SnapshotData,
}

impl Snapshot {
    pub fn new(data: SnapshotData) -> Self {
        Self {
            exported_at: Utc::now(),
            data,
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot file: {}", path.display()))?;
        let snapshot: Snapshot = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse snapshot file: {}", path.display()))?;
        Ok(snapshot)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write snapshot file: {}", path.display()))?;
        Ok(())
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.exported_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            format!("{}h ago", minutes / 60)
        } else {
            format!("{}d ago", minutes / 1440)
        }
    }
}

/// Row counts written by `Store::import`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub members: usize,
    pub areas: usize,
    pub sectors: usize,
    pub groups: usize,
    pub goal_packages: usize,
    pub point_events: usize,
    /// Point events already present for the same (member, date, kind).
    pub duplicate_events: usize,
    pub lessons: usize,
}

impl Store {
    /// Load a snapshot into the store in one transaction.
    ///
    /// Members are written before the tree with no group, then attached once
    /// groups exist, since groups reference their leaders and participants
    /// reference their group. Goal packages are inserted as given; overlapping
    /// windows are left for the aggregator to resolve.
    pub fn import(&self, data: &SnapshotData) -> Result<ImportSummary> {
        self.in_transaction(|conn| {
            let mut summary = ImportSummary::default();

            for member in &data.members {
                let detached = Member {
                    group_id: None,
                    ..member.clone()
                };
                insert_member(conn, &detached)?;
                summary.members += 1;
            }
            for area in &data.areas {
                insert_area(conn, area)?;
                summary.areas += 1;
            }
            for sector in &data.sectors {
                insert_sector(conn, sector)?;
                summary.sectors += 1;
            }
            for group in &data.groups {
                insert_group(conn, group)?;
                summary.groups += 1;
            }
            for member in data.members.iter().filter(|m| m.group_id.is_some()) {
                update_member(conn, member)?;
            }
            for package in &data.goal_packages {
                insert_goal_package(conn, package)?;
                summary.goal_packages += 1;
            }
            for lesson in &data.lessons {
                insert_lesson(conn, lesson)?;
                summary.lessons += 1;
            }
            for event in &data.point_events {
                if insert_point_event(conn, event)? {
                    summary.point_events += 1;
                } else {
                    summary.duplicate_events += 1;
                }
            }

            info!(
                members = summary.members,
                groups = summary.groups,
                point_events = summary.point_events,
                duplicates = summary.duplicate_events,
                "Imported snapshot"
            );
            Ok(summary)
        })
    }

    /// Everything needed to rebuild this store with `import`.
    pub fn export(&self) -> Result<SnapshotData> {
        let members = self.list_members()?;
        let mut point_events = Vec::new();
        for member in &members {
            point_events.extend(self.point_events_for_member(member.id)?);
        }

        let areas = self.list_areas()?;
        let mut goal_packages = Vec::new();
        for area in &areas {
            goal_packages.extend(self.goal_packages_for_area(area.id)?);
        }

        let data = SnapshotData {
            members,
            sectors: self.list_sectors()?,
            groups: self.list_groups()?,
            areas,
            goal_packages,
            point_events,
            lessons: self.list_lessons()?,
        };
        debug!(
            members = data.members.len(),
            groups = data.groups.len(),
            "Exported snapshot"
        );
        Ok(data)
    }

    /// Number of active members, for quick status output.
    pub fn active_member_count(&self) -> Result<usize> {
        Ok(self.active_member_ids()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{date, seed_single_group, Fixture};
    use crate::models::{ActivityKind, MetricCounts};
    use crate::store::EventLog;

    #[test]
    fn test_export_import_preserves_tree() {
        let Fixture { store, area_id, group_id, .. } = seed_single_group(4);
        store
            .append_goal_package(area_id, date(2025, 1, 1), date(2025, 12, 31), MetricCounts::default())
            .unwrap();
        let data = store.export().unwrap();

        let copy = Store::open_in_memory().unwrap();
        let summary = copy.import(&data).unwrap();
        assert_eq!(summary.members, data.members.len());
        assert_eq!(summary.groups, 1);
        assert_eq!(summary.goal_packages, 1);
        assert_eq!(
            copy.get_active_group_members(group_id).unwrap(),
            store.get_active_group_members(group_id).unwrap()
        );
        assert_eq!(copy.export().unwrap(), data);
    }

    #[test]
    fn test_import_counts_duplicate_events() {
        let mut data = SnapshotData::default();
        data.members.push(Member::new(1, "Ana"));
        let event = PointEvent {
            member_id: 1,
            date: date(2025, 5, 4),
            kind: ActivityKind::Worship,
            points: 5,
            lesson_id: None,
        };
        data.point_events.push(event.clone());
        data.point_events.push(event);

        let store = Store::open_in_memory().unwrap();
        let summary = store.import(&data).unwrap();
        assert_eq!(summary.point_events, 1);
        assert_eq!(summary.duplicate_events, 1);
        assert_eq!(
            store.sum_points(1, date(2025, 5, 1), date(2025, 5, 31)).unwrap(),
            5
        );
    }

    #[test]
    fn test_import_rolls_back_on_failure() {
        let mut data = SnapshotData::default();
        data.members.push(Member::new(1, "Ana"));
        // Sector pointing at an area that does not exist.
        data.sectors.push(Sector {
            id: 1,
            name: "Norte".to_string(),
            area_id: 99,
            supervisors: vec![],
        });
        let store = Store::open_in_memory().unwrap();
        assert!(store.import(&data).is_err());
        assert!(store.list_members().unwrap().is_empty());
    }

    #[test]
    fn test_snapshot_file_round_trip() {
        let dir = std::env::temp_dir().join(format!("rebanho-snapshot-{}", std::process::id()));
        let path = dir.join("backup.json");
        let mut data = SnapshotData::default();
        data.members.push(Member::new(7, "João"));
        Snapshot::new(data.clone()).save(&path).unwrap();
        let loaded = Snapshot::load(&path).unwrap();
        assert_eq!(loaded.data, data);
        assert_eq!(loaded.age_display(), "just now");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
