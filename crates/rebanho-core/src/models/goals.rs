//! Goal packages and the six tracked metrics.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::AreaId;

/// The six metrics every goal package sets a per-group target for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    FacilitatorsInTraining,
    HostsInTraining,
    CourseParticipants,
    RetreatParticipants,
    Baptisms,
    GroupSplits,
}

impl Metric {
    pub const ALL: [Metric; 6] = [
        Metric::FacilitatorsInTraining,
        Metric::HostsInTraining,
        Metric::CourseParticipants,
        Metric::RetreatParticipants,
        Metric::Baptisms,
        Metric::GroupSplits,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Metric::FacilitatorsInTraining => "Facilitators in training",
            Metric::HostsInTraining => "Hosts in training",
            Metric::CourseParticipants => "CTM participants",
            Metric::RetreatParticipants => "Retreat participants",
            Metric::Baptisms => "Baptisms/acclamations",
            Metric::GroupSplits => "Group splits",
        }
    }
}

/// One count per metric. Used both for targets and for achieved values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct MetricCounts {
    #[serde(default)]
    pub facilitators_in_training: u32,
    #[serde(default)]
    pub hosts_in_training: u32,
    #[serde(default)]
    pub course_participants: u32,
    #[serde(default)]
    pub retreat_participants: u32,
    #[serde(default)]
    pub baptisms: u32,
    #[serde(default)]
    pub group_splits: u32,
}

impl MetricCounts {
    pub fn get(&self, metric: Metric) -> u32 {
        match metric {
            Metric::FacilitatorsInTraining => self.facilitators_in_training,
            Metric::HostsInTraining => self.hosts_in_training,
            Metric::CourseParticipants => self.course_participants,
            Metric::RetreatParticipants => self.retreat_participants,
            Metric::Baptisms => self.baptisms,
            Metric::GroupSplits => self.group_splits,
        }
    }

    pub fn set(&mut self, metric: Metric, value: u32) {
        let slot = match metric {
            Metric::FacilitatorsInTraining => &mut self.facilitators_in_training,
            Metric::HostsInTraining => &mut self.hosts_in_training,
            Metric::CourseParticipants => &mut self.course_participants,
            Metric::RetreatParticipants => &mut self.retreat_participants,
            Metric::Baptisms => &mut self.baptisms,
            Metric::GroupSplits => &mut self.group_splits,
        };
        *slot = value;
    }

    /// Every metric multiplied by `factor`.
    pub fn scaled(&self, factor: u32) -> Self {
        let mut out = Self::default();
        for metric in Metric::ALL {
            out.set(metric, self.get(metric).saturating_mul(factor));
        }
        out
    }

    /// Achieved over goal as a percentage, uncapped. `None` when the goal is 0.
    pub fn attainment_percent(achieved: &Self, goal: &Self, metric: Metric) -> Option<u32> {
        let goal = goal.get(metric);
        if goal == 0 {
            return None;
        }
        Some(achieved.get(metric).saturating_mul(100) / goal)
    }
}

/// A versioned, date-ranged set of per-group targets for one area.
/// Never updated after creation; a newer package supersedes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct GoalPackage {
    pub id: i64,
    pub area_id: AreaId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Targets expressed per active small group.
    pub per_group: MetricCounts,
}

impl GoalPackage {
    /// Selection rule: `start_date <= date <= end_date`.
    pub fn is_valid_on(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    /// Counting window for time-boxed metrics: `[start_date, end_date)`.
    pub fn window_contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date < self.end_date
    }

    pub fn window_contains_datetime(&self, at: NaiveDateTime) -> bool {
        self.window_contains(at.date())
    }

    /// Whether the two packages' date ranges share any day.
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start_date <= end && start <= self.end_date
    }
}
