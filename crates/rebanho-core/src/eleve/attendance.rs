//! Attendance registration: worship, small-group meeting and service.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::error::{CoreError, Result};
use crate::models::{ActivityKind, MemberId, PointEvent};
use crate::store::sqlite::{get_member, insert_point_event};
use crate::store::Store;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttendanceOutcome {
    pub member_id: MemberId,
    pub date: NaiveDate,
    pub recorded: Vec<ActivityKind>,
    /// Kinds already registered for this member and day; not counted again.
    pub duplicates: Vec<ActivityKind>,
    pub points: i64,
}

/// Register one member's attendance on `date` for each of `kinds`.
pub fn register_attendance(
    store: &Store,
    member_id: MemberId,
    date: NaiveDate,
    kinds: &[ActivityKind],
) -> Result<AttendanceOutcome> {
    if kinds.is_empty() {
        return Err(CoreError::InvalidInput(
            "no attendance kind selected".to_string(),
        ));
    }

    store.in_transaction(|conn| {
        let member = get_member(conn, member_id)?;
        if !member.active {
            return Err(CoreError::InvalidInput(format!(
                "member {} is inactive",
                member_id
            )));
        }

        let mut outcome = AttendanceOutcome {
            member_id,
            date,
            ..AttendanceOutcome::default()
        };
        for &kind in kinds {
            let points = kind.attendance_points().ok_or_else(|| {
                CoreError::InvalidInput(format!("{} is not an attendance kind", kind))
            })?;
            let event = PointEvent {
                member_id,
                date,
                kind,
                points,
                lesson_id: None,
            };
            if insert_point_event(conn, &event)? {
                outcome.recorded.push(kind);
                outcome.points += points;
            } else {
                debug!(member_id, date = %date, kind = kind.as_str(), "Attendance already registered");
                outcome.duplicates.push(kind);
            }
        }
        Ok(outcome)
    })
}
