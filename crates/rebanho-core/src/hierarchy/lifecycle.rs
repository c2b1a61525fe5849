//! Small-group lifecycle and roster changes.
//!
//! `Active` is the only state a group can leave: a split forks it into two
//! new active groups, a close detaches its participants. Every operation
//! runs in one transaction and records a journey entry naming the members,
//! groups and sector it touched.

use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{CoreError, Result};
use crate::models::{
    GroupId, GroupState, JourneyAction, JourneyEntry, Member, MemberId, NewGroup, NodeRef,
    SmallGroup, TrainingStatus,
};
use crate::store::sqlite::{
    get_group, get_member, get_sector, insert_new_group, participant_ids, record_journey,
    set_group_leaders, set_group_state, update_member,
};
use crate::store::Store;

fn require_active(group: &SmallGroup) -> Result<()> {
    if group.is_active() {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition(format!(
            "group {} is {}, only active groups can change",
            group.id,
            group.state.label()
        )))
    }
}

fn require_active_member(conn: &Connection, id: MemberId) -> Result<Member> {
    let member = get_member(conn, id)?;
    if !member.active {
        return Err(CoreError::InvalidInput(format!("member {} is inactive", id)));
    }
    Ok(member)
}

fn validate_new_group(conn: &Connection, group: &NewGroup) -> Result<()> {
    if group.name.trim().is_empty() {
        return Err(CoreError::InvalidInput("group name is empty".to_string()));
    }
    get_sector(conn, group.sector_id)?;
    require_active_member(conn, group.facilitator_id)?;
    require_active_member(conn, group.host_id)?;
    Ok(())
}

/// Create an active group.
pub fn create_group(store: &Store, new: &NewGroup) -> Result<SmallGroup> {
    store.in_transaction(|conn| {
        validate_new_group(conn, new)?;
        let id = insert_new_group(conn, new)?;
        record_journey(
            conn,
            &JourneyEntry::new(JourneyAction::GroupCreated, format!("Group {} created", new.name))
                .node(NodeRef::Group(id))
                .node(NodeRef::Sector(new.sector_id))
                .members([new.facilitator_id, new.host_id]),
        )?;
        info!(group_id = id, sector_id = new.sector_id, "Group created");
        get_group(conn, id)
    })
}

/// How a group is split: the two new groups, and which participants go to
/// the second one. Everyone else moves to the first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitPlan {
    pub first: NewGroup,
    pub second: NewGroup,
    #[serde(default)]
    pub second_participants: BTreeSet<MemberId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplitOutcome {
    pub parent: SmallGroup,
    pub first: SmallGroup,
    pub second: SmallGroup,
}

pub fn split_group(
    store: &Store,
    group_id: GroupId,
    plan: &SplitPlan,
    at: NaiveDateTime,
) -> Result<SplitOutcome> {
    store.in_transaction(|conn| {
        let parent = get_group(conn, group_id)?;
        require_active(&parent)?;
        for child in [&plan.first, &plan.second] {
            if child.sector_id != parent.sector_id {
                return Err(CoreError::InvalidInput(format!(
                    "group {} must be split within sector {}",
                    group_id, parent.sector_id
                )));
            }
            validate_new_group(conn, child)?;
        }
        let participants = participant_ids(conn, group_id)?;
        if let Some(stranger) = plan
            .second_participants
            .iter()
            .find(|id| !participants.contains(*id))
        {
            return Err(CoreError::InvalidInput(format!(
                "member {} is not a participant of group {}",
                stranger, group_id
            )));
        }

        set_group_state(conn, group_id, &GroupState::Split { at })?;
        let first_id = insert_new_group(conn, &plan.first)?;
        let second_id = insert_new_group(conn, &plan.second)?;
        for id in &participants {
            let mut member = get_member(conn, *id)?;
            member.group_id = Some(if plan.second_participants.contains(id) {
                second_id
            } else {
                first_id
            });
            update_member(conn, &member)?;
        }

        record_journey(
            conn,
            &JourneyEntry::new(
                JourneyAction::GroupSplit,
                format!(
                    "Group {} split into {} and {}",
                    parent.name, plan.first.name, plan.second.name
                ),
            )
            .node(NodeRef::Group(group_id))
            .node(NodeRef::Group(first_id))
            .node(NodeRef::Group(second_id))
            .node(NodeRef::Sector(parent.sector_id))
            .members(participants.iter().copied()),
        )?;
        record_journey(
            conn,
            &JourneyEntry::new(
                JourneyAction::LeadershipChanged,
                format!(
                    "Leaders of {} moved to {} and {}",
                    parent.name, plan.first.name, plan.second.name
                ),
            )
            .node(NodeRef::Group(group_id))
            .node(NodeRef::Group(first_id))
            .node(NodeRef::Group(second_id))
            .members([
                parent.facilitator_id,
                parent.host_id,
                plan.first.facilitator_id,
                plan.first.host_id,
                plan.second.facilitator_id,
                plan.second.host_id,
            ]),
        )?;
        info!(
            group_id,
            first_id,
            second_id,
            moved = participants.len(),
            "Group split"
        );

        Ok(SplitOutcome {
            parent: get_group(conn, group_id)?,
            first: get_group(conn, first_id)?,
            second: get_group(conn, second_id)?,
        })
    })
}

/// Close a group. Its participants are detached and their indicators reset.
/// Returns the detached member ids.
pub fn close_group(store: &Store, group_id: GroupId) -> Result<Vec<MemberId>> {
    store.in_transaction(|conn| {
        let group = get_group(conn, group_id)?;
        require_active(&group)?;
        set_group_state(conn, group_id, &GroupState::Closed)?;

        let participants = participant_ids(conn, group_id)?;
        for id in &participants {
            let mut member = get_member(conn, *id)?;
            member.group_id = None;
            member.reset_indicators();
            update_member(conn, &member)?;
        }

        record_journey(
            conn,
            &JourneyEntry::new(JourneyAction::GroupClosed, format!("Group {} closed", group.name))
                .node(NodeRef::Group(group_id))
                .node(NodeRef::Sector(group.sector_id))
                .members(participants.iter().copied()),
        )?;
        record_journey(
            conn,
            &JourneyEntry::new(
                JourneyAction::LeadershipChanged,
                format!("Leaders of {} stepped down", group.name),
            )
            .node(NodeRef::Group(group_id))
            .members([group.facilitator_id, group.host_id]),
        )?;
        info!(group_id, detached = participants.len(), "Group closed");
        Ok(participants)
    })
}

/// Replace a group's facilitator and host.
pub fn change_leaders(
    store: &Store,
    group_id: GroupId,
    facilitator_id: MemberId,
    host_id: MemberId,
) -> Result<SmallGroup> {
    store.in_transaction(|conn| {
        let group = get_group(conn, group_id)?;
        require_active(&group)?;
        require_active_member(conn, facilitator_id)?;
        require_active_member(conn, host_id)?;
        set_group_leaders(conn, group_id, facilitator_id, host_id)?;
        record_journey(
            conn,
            &JourneyEntry::new(
                JourneyAction::LeadershipChanged,
                format!("Leaders of {} changed", group.name),
            )
            .node(NodeRef::Group(group_id))
            .members([group.facilitator_id, group.host_id, facilitator_id, host_id]),
        )?;
        get_group(conn, group_id)
    })
}

/// Add a member without a group as a participant.
pub fn add_participant(store: &Store, group_id: GroupId, member_id: MemberId) -> Result<()> {
    store.in_transaction(|conn| {
        let group = get_group(conn, group_id)?;
        require_active(&group)?;
        let mut member = require_active_member(conn, member_id)?;
        if let Some(current) = member.group_id {
            return Err(CoreError::Conflict(format!(
                "member {} already participates in group {}",
                member_id, current
            )));
        }
        member.group_id = Some(group_id);
        update_member(conn, &member)?;
        record_journey(
            conn,
            &JourneyEntry::new(
                JourneyAction::ParticipantAdded,
                format!("{} joined {}", member.full_name, group.name),
            )
            .member(member_id)
            .node(NodeRef::Group(group_id)),
        )?;
        Ok(())
    })
}

/// Remove a participant, resetting their indicators.
pub fn remove_participant(store: &Store, group_id: GroupId, member_id: MemberId) -> Result<()> {
    store.in_transaction(|conn| {
        let group = get_group(conn, group_id)?;
        let mut member = get_member(conn, member_id)?;
        if member.group_id != Some(group_id) {
            return Err(CoreError::InvalidInput(format!(
                "member {} is not a participant of group {}",
                member_id, group_id
            )));
        }
        member.group_id = None;
        member.reset_indicators();
        update_member(conn, &member)?;
        record_journey(
            conn,
            &JourneyEntry::new(
                JourneyAction::ParticipantRemoved,
                format!("{} left {}", member.full_name, group.name),
            )
            .member(member_id)
            .node(NodeRef::Group(group_id)),
        )?;
        Ok(())
    })
}

/// Small-group indicators of one member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Indicators {
    #[serde(default)]
    pub training_status: TrainingStatus,
    #[serde(default)]
    pub completed_course: bool,
    #[serde(default)]
    pub attended_retreat: bool,
    #[serde(default)]
    pub baptized: bool,
    /// Kept as is when `None`.
    #[serde(default)]
    pub reception_date: Option<NaiveDate>,
}

/// Update the indicators of a participant or leader of the group.
pub fn update_indicators(
    store: &Store,
    group_id: GroupId,
    member_id: MemberId,
    indicators: &Indicators,
) -> Result<Member> {
    store.in_transaction(|conn| {
        let group = get_group(conn, group_id)?;
        let mut member = get_member(conn, member_id)?;
        if member.group_id != Some(group_id) && !group.is_led_by(member_id) {
            return Err(CoreError::InvalidInput(format!(
                "member {} does not belong to group {}",
                member_id, group_id
            )));
        }
        member.training_status = indicators.training_status;
        member.completed_course = indicators.completed_course;
        member.attended_retreat = indicators.attended_retreat;
        member.baptized = indicators.baptized;
        if indicators.reception_date.is_some() {
            member.reception_date = indicators.reception_date;
        }
        update_member(conn, &member)?;
        record_journey(
            conn,
            &JourneyEntry::new(
                JourneyAction::IndicatorsUpdated,
                format!("Indicators of {} updated", member.full_name),
            )
            .member(member_id)
            .node(NodeRef::Group(group_id)),
        )?;
        Ok(member)
    })
}
