//! The three-level small-group tree: Area → Setor → PequenoGrupo.
//!
//! Entities refer to each other only by id; member sets and child
//! collections are always loaded through the store.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::MemberId;

pub type AreaId = i64;
pub type SectorId = i64;
pub type GroupId = i64;

/// Top level of the tree (a region).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area {
    pub id: AreaId,
    pub name: String,
    #[serde(default)]
    pub supervisors: Vec<MemberId>,
}

/// A Setor, owned by exactly one area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sector {
    pub id: SectorId,
    pub name: String,
    pub area_id: AreaId,
    #[serde(default)]
    pub supervisors: Vec<MemberId>,
}

/// Lifecycle of a small group. `Active` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GroupState {
    Active,
    /// Forked into two new groups at the given moment.
    Split { at: NaiveDateTime },
    Closed,
}

impl GroupState {
    pub fn label(&self) -> &'static str {
        match self {
            GroupState::Active => "active",
            GroupState::Split { .. } => "split",
            GroupState::Closed => "closed",
        }
    }
}

/// A PequenoGrupo. Participants point at the group through `Member::group_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmallGroup {
    pub id: GroupId,
    pub name: String,
    pub sector_id: SectorId,
    pub facilitator_id: MemberId,
    pub host_id: MemberId,
    #[serde(default)]
    pub meeting_day: Option<String>,
    #[serde(default)]
    pub meeting_time: Option<String>,
    #[serde(default = "default_state")]
    pub state: GroupState,
}

fn default_state() -> GroupState {
    GroupState::Active
}

impl SmallGroup {
    pub fn is_active(&self) -> bool {
        matches!(self.state, GroupState::Active)
    }

    pub fn split_at(&self) -> Option<NaiveDateTime> {
        match self.state {
            GroupState::Split { at } => Some(at),
            _ => None,
        }
    }

    /// Whether `member` leads this group as facilitator or host.
    pub fn is_led_by(&self, member: MemberId) -> bool {
        self.facilitator_id == member || self.host_id == member
    }
}

/// Fields of a group about to be created. The id is assigned by the store
/// and the group starts `Active`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGroup {
    pub name: String,
    pub sector_id: SectorId,
    pub facilitator_id: MemberId,
    pub host_id: MemberId,
    #[serde(default)]
    pub meeting_day: Option<String>,
    #[serde(default)]
    pub meeting_time: Option<String>,
}

/// A reference to any node of the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum NodeRef {
    Area(AreaId),
    Sector(SectorId),
    Group(GroupId),
}

impl NodeRef {
    pub fn id(&self) -> i64 {
        match *self {
            NodeRef::Area(id) | NodeRef::Sector(id) | NodeRef::Group(id) => id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            NodeRef::Area(_) => "area",
            NodeRef::Sector(_) => "sector",
            NodeRef::Group(_) => "group",
        }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}
