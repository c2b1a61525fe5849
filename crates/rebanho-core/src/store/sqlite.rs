//! SQLite-backed `Store`.
//!
//! Row-level helpers are free functions over `&Connection` so they can run
//! either on the store's connection or inside a transaction opened with
//! `Store::in_transaction`.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tracing::debug;

use super::repository::{
    EventLog, GoalPackageRepository, HierarchyRepository, MembershipRepository, ScoreSink,
};
use crate::error::{CoreError, Result};
use crate::models::{
    ActivityKind, Area, AreaId, DailyLesson, GoalPackage, GroupId, GroupState, JourneyAction,
    JourneyEntry, JourneyEvent, Member, MemberId, MetricCounts, MonthlyScoreRecord, NewGroup,
    PointEvent, ProgressIndex, QuizOption, QuizQuestion, Sector, SectorId, SmallGroup, Subject,
    TrainingStatus, LIFE_WHEEL_CATEGORIES,
};

/// Schema version tracked in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 1;

const MEMBER_COLUMNS: &str = "id, full_name, active, training_status, group_id, \
     completed_course, attended_retreat, baptized, reception_date, campus";

const GROUP_COLUMNS: &str =
    "id, name, sector_id, facilitator_id, host_id, meeting_day, meeting_time, active, split_at";

const PACKAGE_COLUMNS: &str = "id, area_id, start_date, end_date, facilitators_in_training, \
     hosts_in_training, course_participants, retreat_participants, baptisms, group_splits";

const SCORE_COLUMNS: &str = "member_id, sector_id, year, month, points, rank, qualified";

// ============================================================================
// Column conversions
// ============================================================================

impl ToSql for TrainingStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TrainingStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for ActivityKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ActivityKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for JourneyAction {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for JourneyAction {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

fn member_from_row(row: &Row<'_>) -> rusqlite::Result<Member> {
    Ok(Member {
        id: row.get(0)?,
        full_name: row.get(1)?,
        active: row.get(2)?,
        training_status: row.get(3)?,
        group_id: row.get(4)?,
        completed_course: row.get(5)?,
        attended_retreat: row.get(6)?,
        baptized: row.get(7)?,
        reception_date: row.get(8)?,
        campus: row.get(9)?,
    })
}

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<SmallGroup> {
    let active: bool = row.get(7)?;
    let split_at: Option<NaiveDateTime> = row.get(8)?;
    let state = match (active, split_at) {
        (true, _) => GroupState::Active,
        (false, Some(at)) => GroupState::Split { at },
        (false, None) => GroupState::Closed,
    };
    Ok(SmallGroup {
        id: row.get(0)?,
        name: row.get(1)?,
        sector_id: row.get(2)?,
        facilitator_id: row.get(3)?,
        host_id: row.get(4)?,
        meeting_day: row.get(5)?,
        meeting_time: row.get(6)?,
        state,
    })
}

fn package_from_row(row: &Row<'_>) -> rusqlite::Result<GoalPackage> {
    Ok(GoalPackage {
        id: row.get(0)?,
        area_id: row.get(1)?,
        start_date: row.get(2)?,
        end_date: row.get(3)?,
        per_group: MetricCounts {
            facilitators_in_training: row.get(4)?,
            hosts_in_training: row.get(5)?,
            course_participants: row.get(6)?,
            retreat_participants: row.get(7)?,
            baptisms: row.get(8)?,
            group_splits: row.get(9)?,
        },
    })
}

fn score_from_row(row: &Row<'_>) -> rusqlite::Result<MonthlyScoreRecord> {
    Ok(MonthlyScoreRecord {
        member_id: row.get(0)?,
        sector_id: row.get(1)?,
        year: row.get(2)?,
        month: row.get(3)?,
        points: row.get(4)?,
        rank: row.get(5)?,
        qualified: row.get(6)?,
    })
}

fn split_parts(state: &GroupState) -> (bool, Option<NaiveDateTime>) {
    match *state {
        GroupState::Active => (true, None),
        GroupState::Split { at } => (false, Some(at)),
        GroupState::Closed => (false, None),
    }
}

// ============================================================================
// Members
// ============================================================================

pub(crate) fn get_member(conn: &Connection, id: MemberId) -> Result<Member> {
    let sql = format!("SELECT {} FROM member WHERE id = ?1", MEMBER_COLUMNS);
    conn.query_row(&sql, params![id], member_from_row)
        .optional()?
        .ok_or_else(|| CoreError::not_found("member", id))
}

pub(crate) fn insert_member(conn: &Connection, member: &Member) -> Result<()> {
    conn.execute(
        "INSERT INTO member (id, full_name, active, training_status, group_id, completed_course,
             attended_retreat, baptized, reception_date, campus)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            member.id,
            member.full_name,
            member.active,
            member.training_status,
            member.group_id,
            member.completed_course,
            member.attended_retreat,
            member.baptized,
            member.reception_date,
            member.campus,
        ],
    )?;
    Ok(())
}

pub(crate) fn update_member(conn: &Connection, member: &Member) -> Result<()> {
    let changed = conn.execute(
        "UPDATE member SET full_name = ?2, active = ?3, training_status = ?4, group_id = ?5,
             completed_course = ?6, attended_retreat = ?7, baptized = ?8,
             reception_date = ?9, campus = ?10
         WHERE id = ?1",
        params![
            member.id,
            member.full_name,
            member.active,
            member.training_status,
            member.group_id,
            member.completed_course,
            member.attended_retreat,
            member.baptized,
            member.reception_date,
            member.campus,
        ],
    )?;
    if changed == 0 {
        return Err(CoreError::not_found("member", member.id));
    }
    Ok(())
}

/// Participants of a group regardless of their activity flag.
pub(crate) fn participant_ids(conn: &Connection, group_id: GroupId) -> Result<Vec<MemberId>> {
    let mut stmt = conn.prepare("SELECT id FROM member WHERE group_id = ?1 ORDER BY id")?;
    let ids = stmt
        .query_map(params![group_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<MemberId>>>()?;
    Ok(ids)
}

// ============================================================================
// Hierarchy
// ============================================================================

fn supervisors(conn: &Connection, table: &str, key: &str, id: i64) -> Result<Vec<MemberId>> {
    let sql = format!(
        "SELECT member_id FROM {} WHERE {} = ?1 ORDER BY member_id",
        table, key
    );
    let mut stmt = conn.prepare(&sql)?;
    let ids = stmt
        .query_map(params![id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<MemberId>>>()?;
    Ok(ids)
}

fn insert_supervisors(
    conn: &Connection,
    table: &str,
    key: &str,
    id: i64,
    members: &[MemberId],
) -> Result<()> {
    let sql = format!(
        "INSERT OR IGNORE INTO {} ({}, member_id) VALUES (?1, ?2)",
        table, key
    );
    let mut stmt = conn.prepare(&sql)?;
    for member in members {
        stmt.execute(params![id, member])?;
    }
    Ok(())
}

pub(crate) fn get_area(conn: &Connection, id: AreaId) -> Result<Area> {
    let (id, name): (AreaId, String) = conn
        .query_row("SELECT id, name FROM area WHERE id = ?1", params![id], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .optional()?
        .ok_or_else(|| CoreError::not_found("area", id))?;
    Ok(Area {
        id,
        name,
        supervisors: supervisors(conn, "area_supervisor", "area_id", id)?,
    })
}

pub(crate) fn insert_area(conn: &Connection, area: &Area) -> Result<()> {
    conn.execute(
        "INSERT INTO area (id, name) VALUES (?1, ?2)",
        params![area.id, area.name],
    )?;
    insert_supervisors(conn, "area_supervisor", "area_id", area.id, &area.supervisors)
}

fn sector_rows(conn: &Connection, filter: &str, args: &[&dyn ToSql]) -> Result<Vec<Sector>> {
    let sql = format!("SELECT id, name, area_id FROM sector {} ORDER BY name", filter);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(args, |row| {
            Ok((
                row.get::<_, SectorId>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, AreaId>(2)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter()
        .map(|(id, name, area_id)| {
            Ok(Sector {
                id,
                name,
                area_id,
                supervisors: supervisors(conn, "sector_supervisor", "sector_id", id)?,
            })
        })
        .collect()
}

pub(crate) fn get_sector(conn: &Connection, id: SectorId) -> Result<Sector> {
    sector_rows(conn, "WHERE id = ?1", &[&id])?
        .pop()
        .ok_or_else(|| CoreError::not_found("sector", id))
}

pub(crate) fn insert_sector(conn: &Connection, sector: &Sector) -> Result<()> {
    conn.execute(
        "INSERT INTO sector (id, name, area_id) VALUES (?1, ?2, ?3)",
        params![sector.id, sector.name, sector.area_id],
    )?;
    insert_supervisors(
        conn,
        "sector_supervisor",
        "sector_id",
        sector.id,
        &sector.supervisors,
    )
}

fn group_rows(conn: &Connection, filter: &str, args: &[&dyn ToSql]) -> Result<Vec<SmallGroup>> {
    let sql = format!(
        "SELECT {} FROM small_group {} ORDER BY name",
        GROUP_COLUMNS, filter
    );
    let mut stmt = conn.prepare(&sql)?;
    let groups = stmt
        .query_map(args, group_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(groups)
}

pub(crate) fn get_group(conn: &Connection, id: GroupId) -> Result<SmallGroup> {
    group_rows(conn, "WHERE id = ?1", &[&id])?
        .pop()
        .ok_or_else(|| CoreError::not_found("group", id))
}

pub(crate) fn insert_group(conn: &Connection, group: &SmallGroup) -> Result<()> {
    let (active, split_at) = split_parts(&group.state);
    conn.execute(
        "INSERT INTO small_group (id, name, sector_id, facilitator_id, host_id, meeting_day,
             meeting_time, active, split_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            group.id,
            group.name,
            group.sector_id,
            group.facilitator_id,
            group.host_id,
            group.meeting_day,
            group.meeting_time,
            active,
            split_at,
        ],
    )?;
    Ok(())
}

/// Insert an `Active` group and return its assigned id.
pub(crate) fn insert_new_group(conn: &Connection, group: &NewGroup) -> Result<GroupId> {
    conn.execute(
        "INSERT INTO small_group (name, sector_id, facilitator_id, host_id, meeting_day,
             meeting_time, active, split_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, NULL)",
        params![
            group.name,
            group.sector_id,
            group.facilitator_id,
            group.host_id,
            group.meeting_day,
            group.meeting_time,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn set_group_state(conn: &Connection, id: GroupId, state: &GroupState) -> Result<()> {
    let (active, split_at) = split_parts(state);
    let changed = conn.execute(
        "UPDATE small_group SET active = ?2, split_at = ?3 WHERE id = ?1",
        params![id, active, split_at],
    )?;
    if changed == 0 {
        return Err(CoreError::not_found("group", id));
    }
    Ok(())
}

pub(crate) fn set_group_leaders(
    conn: &Connection,
    id: GroupId,
    facilitator_id: MemberId,
    host_id: MemberId,
) -> Result<()> {
    let changed = conn.execute(
        "UPDATE small_group SET facilitator_id = ?2, host_id = ?3 WHERE id = ?1",
        params![id, facilitator_id, host_id],
    )?;
    if changed == 0 {
        return Err(CoreError::not_found("group", id));
    }
    Ok(())
}

// ============================================================================
// Goal packages
// ============================================================================

fn packages_where(conn: &Connection, filter: &str, args: &[&dyn ToSql]) -> Result<Vec<GoalPackage>> {
    let sql = format!(
        "SELECT {} FROM goal_package {} ORDER BY start_date, id",
        PACKAGE_COLUMNS, filter
    );
    let mut stmt = conn.prepare(&sql)?;
    let packages = stmt
        .query_map(args, package_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(packages)
}

pub(crate) fn insert_goal_package(conn: &Connection, package: &GoalPackage) -> Result<i64> {
    let goals = &package.per_group;
    let id = if package.id > 0 { Some(package.id) } else { None };
    conn.execute(
        "INSERT INTO goal_package (id, area_id, start_date, end_date, facilitators_in_training,
             hosts_in_training, course_participants, retreat_participants, baptisms, group_splits)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            id,
            package.area_id,
            package.start_date,
            package.end_date,
            goals.facilitators_in_training,
            goals.hosts_in_training,
            goals.course_participants,
            goals.retreat_participants,
            goals.baptisms,
            goals.group_splits,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

// ============================================================================
// Point events, monthly scores, lessons
// ============================================================================

/// Insert unless a (member, date, kind) row exists. Returns whether a row
/// was written.
pub(crate) fn insert_point_event(conn: &Connection, event: &PointEvent) -> Result<bool> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO point_event (member_id, date, kind, points, lesson_id)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            event.member_id,
            event.date,
            event.kind,
            event.points,
            event.lesson_id
        ],
    )?;
    Ok(changed == 1)
}

fn upsert_score(conn: &Connection, record: &MonthlyScoreRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO monthly_score (member_id, sector_id, year, month, points, rank, qualified,
             computed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT (member_id, month, year) DO UPDATE SET
             sector_id = excluded.sector_id,
             points = excluded.points,
             rank = excluded.rank,
             qualified = excluded.qualified,
             computed_at = excluded.computed_at",
        params![
            record.member_id,
            record.sector_id,
            record.year,
            record.month,
            record.points,
            record.rank,
            record.qualified,
            Utc::now(),
        ],
    )?;
    Ok(())
}

pub(crate) fn insert_lesson(conn: &Connection, lesson: &DailyLesson) -> Result<()> {
    conn.execute(
        "INSERT INTO daily_lesson (id, title, published_on, category, video_url, task)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            lesson.id,
            lesson.title,
            lesson.published_on,
            lesson.category,
            lesson.video_url,
            lesson.task,
        ],
    )?;
    for question in &lesson.quiz {
        conn.execute(
            "INSERT INTO quiz_question (id, lesson_id, text) VALUES (?1, ?2, ?3)",
            params![question.id, lesson.id, question.text],
        )?;
        for option in &question.options {
            conn.execute(
                "INSERT INTO quiz_option (id, question_id, text, correct) VALUES (?1, ?2, ?3, ?4)",
                params![option.id, question.id, option.text, option.correct],
            )?;
        }
    }
    Ok(())
}

fn load_quiz(conn: &Connection, lesson_id: i64) -> Result<Vec<QuizQuestion>> {
    let mut stmt =
        conn.prepare("SELECT id, text FROM quiz_question WHERE lesson_id = ?1 ORDER BY id")?;
    let questions = stmt
        .query_map(params![lesson_id], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut option_stmt = conn
        .prepare("SELECT id, text, correct FROM quiz_option WHERE question_id = ?1 ORDER BY id")?;
    let mut quiz = Vec::with_capacity(questions.len());
    for (id, text) in questions {
        let options = option_stmt
            .query_map(params![id], |row| {
                Ok(QuizOption {
                    id: row.get(0)?,
                    text: row.get(1)?,
                    correct: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        quiz.push(QuizQuestion { id, text, options });
    }
    Ok(quiz)
}

fn lesson_where(conn: &Connection, filter: &str, arg: &dyn ToSql) -> Result<Option<DailyLesson>> {
    let sql = format!(
        "SELECT id, title, published_on, category, video_url, task FROM daily_lesson {} \
         ORDER BY id LIMIT 1",
        filter
    );
    let lesson = conn
        .query_row(&sql, [arg], |row| {
            Ok(DailyLesson {
                id: row.get(0)?,
                title: row.get(1)?,
                published_on: row.get(2)?,
                category: row.get(3)?,
                video_url: row.get(4)?,
                task: row.get(5)?,
                quiz: Vec::new(),
            })
        })
        .optional()?;
    match lesson {
        Some(mut lesson) => {
            lesson.quiz = load_quiz(conn, lesson.id)?;
            Ok(Some(lesson))
        }
        None => Ok(None),
    }
}

pub(crate) fn lesson_completed_on(
    conn: &Connection,
    member_id: MemberId,
    date: NaiveDate,
) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM point_event WHERE member_id = ?1 AND date = ?2 AND kind = ?3",
            params![member_id, date, ActivityKind::DailyLesson],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Raise a progress index by `delta`, never above `cap`. Returns the new value.
pub(crate) fn add_progress(
    conn: &Connection,
    member_id: MemberId,
    category: &str,
    year: i32,
    delta: u32,
    cap: u32,
) -> Result<u32> {
    conn.execute(
        "INSERT INTO progress_index (member_id, category, year, value)
         VALUES (?1, ?2, ?3, MIN(?5, ?4))
         ON CONFLICT (member_id, category, year) DO UPDATE SET value = MIN(?5, value + ?4)",
        params![member_id, category, year, delta, cap],
    )?;
    let value = conn.query_row(
        "SELECT value FROM progress_index WHERE member_id = ?1 AND category = ?2 AND year = ?3",
        params![member_id, category, year],
        |row| row.get(0),
    )?;
    Ok(value)
}

// ============================================================================
// Journey
// ============================================================================

pub(crate) fn record_journey(conn: &Connection, entry: &JourneyEntry) -> Result<i64> {
    conn.execute(
        "INSERT INTO journey_event (occurred_at, action, description) VALUES (?1, ?2, ?3)",
        params![Utc::now(), entry.action, entry.description],
    )?;
    let id = conn.last_insert_rowid();
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO journey_subject (journey_id, kind, subject_id) VALUES (?1, ?2, ?3)",
    )?;
    for subject in &entry.subjects {
        stmt.execute(params![id, subject.kind(), subject.id()])?;
    }
    debug!(journey_id = id, action = %entry.action, "Recorded journey entry");
    Ok(id)
}

// ============================================================================
// Store
// ============================================================================

pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (creating if needed) the database at `path` and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn schema_version(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?)
    }

    pub fn migrate(&self) -> Result<()> {
        let current = self.schema_version()?;
        if current > SCHEMA_VERSION {
            return Err(CoreError::Conflict(format!(
                "database schema version {} is newer than supported version {}",
                current, SCHEMA_VERSION
            )));
        }

        if current < 1 {
            self.conn
                .execute_batch(include_str!("../../migrations/0001_init.sql"))?;
            self.conn.execute("PRAGMA user_version = 1", [])?;
            debug!("Applied schema version 1");
        }

        Ok(())
    }

    /// Run `f` inside one transaction; any error rolls everything back.
    pub fn in_transaction<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let tx = self.conn.unchecked_transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    // ===== Members =====

    pub fn insert_member(&self, member: &Member) -> Result<()> {
        insert_member(&self.conn, member)
    }

    pub fn update_member(&self, member: &Member) -> Result<()> {
        update_member(&self.conn, member)
    }

    pub fn list_members(&self) -> Result<Vec<Member>> {
        let sql = format!("SELECT {} FROM member ORDER BY id", MEMBER_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let members = stmt
            .query_map([], member_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(members)
    }

    // ===== Hierarchy =====

    pub fn insert_area(&self, area: &Area) -> Result<()> {
        self.in_transaction(|conn| insert_area(conn, area))
    }

    pub fn insert_sector(&self, sector: &Sector) -> Result<()> {
        self.in_transaction(|conn| insert_sector(conn, sector))
    }

    pub fn insert_group(&self, group: &SmallGroup) -> Result<()> {
        insert_group(&self.conn, group)
    }

    // ===== Goal packages =====

    /// Append a goal package. Packages are never edited; a window that
    /// overlaps an existing package of the same area is refused.
    pub fn append_goal_package(
        &self,
        area_id: AreaId,
        start_date: NaiveDate,
        end_date: NaiveDate,
        per_group: MetricCounts,
    ) -> Result<GoalPackage> {
        if start_date > end_date {
            return Err(CoreError::InvalidInput(format!(
                "goal package starts after it ends ({} > {})",
                start_date, end_date
            )));
        }
        self.in_transaction(|conn| {
            get_area(conn, area_id)?;
            let existing = packages_where(conn, "WHERE area_id = ?1", &[&area_id])?;
            if let Some(existing) = existing.iter().find(|p| p.overlaps(start_date, end_date)) {
                return Err(CoreError::Conflict(format!(
                    "goal package {} already covers {}..{} for area {}",
                    existing.id, existing.start_date, existing.end_date, area_id
                )));
            }
            let mut package = GoalPackage {
                id: 0,
                area_id,
                start_date,
                end_date,
                per_group,
            };
            package.id = insert_goal_package(conn, &package)?;
            Ok(package)
        })
    }

    pub fn goal_packages_for_area(&self, area_id: AreaId) -> Result<Vec<GoalPackage>> {
        packages_where(&self.conn, "WHERE area_id = ?1", &[&area_id])
    }

    // ===== Point events =====

    pub fn record_point_event(&self, event: &PointEvent) -> Result<bool> {
        insert_point_event(&self.conn, event)
    }

    pub fn point_events_for_member(&self, member_id: MemberId) -> Result<Vec<PointEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT member_id, date, kind, points, lesson_id FROM point_event
             WHERE member_id = ?1 ORDER BY date, kind",
        )?;
        let events = stmt
            .query_map(params![member_id], |row| {
                Ok(PointEvent {
                    member_id: row.get(0)?,
                    date: row.get(1)?,
                    kind: row.get(2)?,
                    points: row.get(3)?,
                    lesson_id: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(events)
    }

    // ===== Monthly scores =====

    pub fn get_monthly_score(
        &self,
        member_id: MemberId,
        year: i32,
        month: u32,
    ) -> Result<Option<MonthlyScoreRecord>> {
        let sql = format!(
            "SELECT {} FROM monthly_score WHERE member_id = ?1 AND year = ?2 AND month = ?3",
            SCORE_COLUMNS
        );
        Ok(self
            .conn
            .query_row(&sql, params![member_id, year, month], score_from_row)
            .optional()?)
    }

    pub fn monthly_scores_for_year(&self, year: i32) -> Result<Vec<MonthlyScoreRecord>> {
        let sql = format!(
            "SELECT {} FROM monthly_score WHERE year = ?1 ORDER BY month, member_id",
            SCORE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let scores = stmt
            .query_map(params![year], score_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(scores)
    }

    pub fn count_monthly_scores(&self, year: i32) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM monthly_score WHERE year = ?1",
            params![year],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn delete_monthly_scores(&self, year: i32) -> Result<usize> {
        self.in_transaction(|conn| {
            Ok(conn.execute("DELETE FROM monthly_score WHERE year = ?1", params![year])?)
        })
    }

    // ===== Lessons =====

    pub fn insert_lesson(&self, lesson: &DailyLesson) -> Result<()> {
        if !LIFE_WHEEL_CATEGORIES.contains(&lesson.category.as_str()) {
            return Err(CoreError::InvalidInput(format!(
                "unknown life-wheel category: {}",
                lesson.category
            )));
        }
        self.in_transaction(|conn| insert_lesson(conn, lesson))
    }

    pub fn get_lesson(&self, id: i64) -> Result<DailyLesson> {
        lesson_where(&self.conn, "WHERE id = ?1", &id)?
            .ok_or_else(|| CoreError::not_found("lesson", id))
    }

    pub fn list_lessons(&self) -> Result<Vec<DailyLesson>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM daily_lesson ORDER BY published_on, id")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        ids.into_iter().map(|id| self.get_lesson(id)).collect()
    }

    pub fn progress_index(
        &self,
        member_id: MemberId,
        category: &str,
        year: i32,
    ) -> Result<Option<ProgressIndex>> {
        Ok(self
            .conn
            .query_row(
                "SELECT member_id, category, year, value FROM progress_index
                 WHERE member_id = ?1 AND category = ?2 AND year = ?3",
                params![member_id, category, year],
                |row| {
                    Ok(ProgressIndex {
                        member_id: row.get(0)?,
                        category: row.get(1)?,
                        year: row.get(2)?,
                        value: row.get(3)?,
                    })
                },
            )
            .optional()?)
    }

    // ===== Journey =====

    pub fn record_journey(&self, entry: &JourneyEntry) -> Result<i64> {
        self.in_transaction(|conn| record_journey(conn, entry))
    }

    /// Journey entries mentioning `subject`, oldest first.
    pub fn journey_for(&self, subject: Subject) -> Result<Vec<JourneyEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT e.id, e.occurred_at, e.action, e.description
             FROM journey_event e
             JOIN journey_subject s ON s.journey_id = e.id
             WHERE s.kind = ?1 AND s.subject_id = ?2
             ORDER BY e.id",
        )?;
        let events = stmt
            .query_map(params![subject.kind(), subject.id()], |row| {
                Ok(JourneyEvent {
                    id: row.get(0)?,
                    occurred_at: row.get(1)?,
                    action: row.get(2)?,
                    description: row.get(3)?,
                    subjects: Vec::new(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut subject_stmt = self.conn.prepare(
            "SELECT kind, subject_id FROM journey_subject WHERE journey_id = ?1 ORDER BY rowid",
        )?;
        let mut out = Vec::with_capacity(events.len());
        for mut event in events {
            let parts = subject_stmt
                .query_map(params![event.id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            event.subjects = parts
                .iter()
                .filter_map(|(kind, id)| Subject::from_parts(kind, *id))
                .collect();
            out.push(event);
        }
        Ok(out)
    }
}

// ============================================================================
// Repository implementations
// ============================================================================

impl MembershipRepository for Store {
    fn get_member(&self, id: MemberId) -> Result<Member> {
        get_member(&self.conn, id)
    }

    fn get_active_group_members(&self, group_id: GroupId) -> Result<BTreeSet<MemberId>> {
        get_group(&self.conn, group_id)?;
        let mut stmt = self.conn.prepare(
            "SELECT id FROM member WHERE group_id = ?1 AND active = 1
             UNION
             SELECT m.id FROM member m
             JOIN small_group g ON m.id = g.facilitator_id OR m.id = g.host_id
             WHERE g.id = ?1 AND m.active = 1",
        )?;
        let ids = stmt
            .query_map(params![group_id], |row| row.get(0))?
            .collect::<rusqlite::Result<BTreeSet<MemberId>>>()?;
        Ok(ids)
    }

    fn get_members(&self, ids: &BTreeSet<MemberId>) -> Result<Vec<Member>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM member WHERE id IN ({}) ORDER BY id",
            MEMBER_COLUMNS, placeholders
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let members = stmt
            .query_map(params_from_iter(ids.iter()), member_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(members)
    }

    fn active_member_ids(&self) -> Result<Vec<MemberId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM member WHERE active = 1 ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<MemberId>>>()?;
        Ok(ids)
    }
}

impl HierarchyRepository for Store {
    fn get_area(&self, id: AreaId) -> Result<Area> {
        get_area(&self.conn, id)
    }

    fn get_sector(&self, id: SectorId) -> Result<Sector> {
        get_sector(&self.conn, id)
    }

    fn get_group(&self, id: GroupId) -> Result<SmallGroup> {
        get_group(&self.conn, id)
    }

    fn list_areas(&self) -> Result<Vec<Area>> {
        let mut stmt = self.conn.prepare("SELECT id FROM area ORDER BY name")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, AreaId>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        ids.into_iter().map(|id| get_area(&self.conn, id)).collect()
    }

    fn list_sectors(&self) -> Result<Vec<Sector>> {
        sector_rows(&self.conn, "", &[])
    }

    fn list_groups(&self) -> Result<Vec<SmallGroup>> {
        group_rows(&self.conn, "", &[])
    }

    fn sectors_in_area(&self, area_id: AreaId) -> Result<Vec<Sector>> {
        sector_rows(&self.conn, "WHERE area_id = ?1", &[&area_id])
    }

    fn groups_in_sector(&self, sector_id: SectorId) -> Result<Vec<SmallGroup>> {
        group_rows(&self.conn, "WHERE sector_id = ?1", &[&sector_id])
    }
}

impl GoalPackageRepository for Store {
    fn goal_packages_valid_on(
        &self,
        area_id: AreaId,
        as_of: NaiveDate,
    ) -> Result<Vec<GoalPackage>> {
        packages_where(
            &self.conn,
            "WHERE area_id = ?1 AND start_date <= ?2 AND ?2 <= end_date",
            &[&area_id, &as_of],
        )
    }
}

impl EventLog for Store {
    fn sum_points(
        &self,
        member_id: MemberId,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> Result<i64> {
        Ok(self.conn.query_row(
            "SELECT COALESCE(SUM(points), 0) FROM point_event
             WHERE member_id = ?1 AND date >= ?2 AND date <= ?3",
            params![member_id, date_from, date_to],
            |row| row.get(0),
        )?)
    }

    fn count_distinct_lesson_days(
        &self,
        member_id: MemberId,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> Result<u32> {
        Ok(self.conn.query_row(
            "SELECT COUNT(DISTINCT date) FROM point_event
             WHERE member_id = ?1 AND kind = ?2 AND date >= ?3 AND date <= ?4",
            params![member_id, ActivityKind::DailyLesson, date_from, date_to],
            |row| row.get(0),
        )?)
    }
}

impl ScoreSink for Store {
    fn upsert_monthly_score(&self, record: &MonthlyScoreRecord) -> Result<()> {
        self.in_transaction(|conn| upsert_score(conn, record))
    }
}
