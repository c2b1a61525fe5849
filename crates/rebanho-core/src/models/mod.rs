//! Data models for rebanho entities.
//!
//! - `Member`, `TrainingStatus`: the membership registry
//! - `Area`, `Sector`, `SmallGroup`, `NodeRef`: the Area → Setor → PequenoGrupo tree
//! - `GoalPackage`, `Metric`, `MetricCounts`: per-group goals and progress counts
//! - ELEVE types: `PointEvent`, `MonthlyScoreRecord`, `DailyLesson`, `ProgressIndex`
//! - `JourneyEntry`, `JourneyEvent`: the member/group timeline

pub mod eleve;
pub mod goals;
pub mod hierarchy;
pub mod journal;
pub mod member;

pub use eleve::{
    ActivityKind, DailyLesson, MonthlyScoreRecord, PointEvent, ProgressIndex, QuizAnswer,
    QuizOption, QuizQuestion, LIFE_WHEEL_CATEGORIES,
};
pub use goals::{GoalPackage, Metric, MetricCounts};
pub use hierarchy::{
    Area, AreaId, GroupId, GroupState, NewGroup, NodeRef, Sector, SectorId, SmallGroup,
};
pub use journal::{JourneyAction, JourneyEntry, JourneyEvent, Subject};
pub use member::{Member, MemberId, TrainingStatus, UnknownVariant};
