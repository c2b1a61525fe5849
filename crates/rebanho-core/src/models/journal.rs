//! Journey timeline entries recorded for members and groups.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{MemberId, NodeRef, UnknownVariant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JourneyAction {
    GroupCreated,
    GroupSplit,
    GroupClosed,
    LeadershipChanged,
    ParticipantAdded,
    ParticipantRemoved,
    IndicatorsUpdated,
}

impl JourneyAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            JourneyAction::GroupCreated => "group_created",
            JourneyAction::GroupSplit => "group_split",
            JourneyAction::GroupClosed => "group_closed",
            JourneyAction::LeadershipChanged => "leadership_changed",
            JourneyAction::ParticipantAdded => "participant_added",
            JourneyAction::ParticipantRemoved => "participant_removed",
            JourneyAction::IndicatorsUpdated => "indicators_updated",
        }
    }
}

impl fmt::Display for JourneyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JourneyAction {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "group_created" => Ok(JourneyAction::GroupCreated),
            "group_split" => Ok(JourneyAction::GroupSplit),
            "group_closed" => Ok(JourneyAction::GroupClosed),
            "leadership_changed" => Ok(JourneyAction::LeadershipChanged),
            "participant_added" => Ok(JourneyAction::ParticipantAdded),
            "participant_removed" => Ok(JourneyAction::ParticipantRemoved),
            "indicators_updated" => Ok(JourneyAction::IndicatorsUpdated),
            _ => Err(UnknownVariant {
                kind: "journey action",
                value: s.to_string(),
            }),
        }
    }
}

/// Who or what a journey entry is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Subject {
    Member(MemberId),
    Node(NodeRef),
}

impl Subject {
    pub fn kind(&self) -> &'static str {
        match self {
            Subject::Member(_) => "member",
            Subject::Node(node) => node.kind(),
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Subject::Member(id) => *id,
            Subject::Node(node) => node.id(),
        }
    }

    pub fn from_parts(kind: &str, id: i64) -> Option<Self> {
        match kind {
            "member" => Some(Subject::Member(id)),
            "area" => Some(Subject::Node(NodeRef::Area(id))),
            "sector" => Some(Subject::Node(NodeRef::Sector(id))),
            "group" => Some(Subject::Node(NodeRef::Group(id))),
            _ => None,
        }
    }
}

/// A journey entry waiting to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JourneyEntry {
    pub action: JourneyAction,
    pub description: String,
    pub subjects: Vec<Subject>,
}

impl JourneyEntry {
    pub fn new(action: JourneyAction, description: impl Into<String>) -> Self {
        Self {
            action,
            description: description.into(),
            subjects: Vec::new(),
        }
    }

    pub fn member(mut self, id: MemberId) -> Self {
        self.subjects.push(Subject::Member(id));
        self
    }

    pub fn members(mut self, ids: impl IntoIterator<Item = MemberId>) -> Self {
        self.subjects.extend(ids.into_iter().map(Subject::Member));
        self
    }

    pub fn node(mut self, node: NodeRef) -> Self {
        self.subjects.push(Subject::Node(node));
        self
    }
}

/// A stored journey entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JourneyEvent {
    pub id: i64,
    pub occurred_at: DateTime<Utc>,
    pub action: JourneyAction,
    pub description: String,
    pub subjects: Vec<Subject>,
}
