//! Command execution. Every command opens the store, does its work and
//! returns the text to print.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use tracing::{info, warn};

use rebanho_core::eleve::{
    annual_standings, prune_monthly_records, register_attendance, run_all_sectors,
    run_monthly_scoring,
};
use rebanho_core::hierarchy::{
    close_group, split_group, Action, Actor, AreaDashboard, HierarchyAggregator, Leadership,
    SplitPlan,
};
use rebanho_core::models::{ActivityKind, Metric, MetricCounts, NodeRef, Subject};
use rebanho_core::store::{Snapshot, Store};
use rebanho_core::utils::{format_attainment, truncate};
use rebanho_core::Config;

use crate::Command;

/// Width of the name column in table output
const NAME_WIDTH: usize = 28;

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn open_store(config: &Config) -> Result<Store> {
    let path = config.database_path()?;
    Store::open(&path).with_context(|| format!("Failed to open database: {}", path.display()))
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn run(command: Command, config: &Config) -> Result<String> {
    let store = open_store(config)?;

    match command {
        Command::Init => {
            if !Config::path()?.exists() {
                config.save()?;
            }
            to_json(&serde_json::json!({
                "database": config.database_path()?,
                "schema_version": store.schema_version()?,
                "active_members": store.active_member_count()?,
            }))
        }

        Command::Import { file } => import(&store, config, &file),

        Command::Export { file } => {
            let snapshot = Snapshot::new(store.export()?);
            snapshot.save(&file)?;
            info!(path = %file.display(), "Snapshot written");
            to_json(&serde_json::json!({
                "file": file,
                "members": snapshot.data.members.len(),
                "groups": snapshot.data.groups.len(),
                "point_events": snapshot.data.point_events.len(),
            }))
        }

        Command::Dashboard {
            area,
            date,
            as_member,
            table,
        } => {
            if let Some(member) = as_member {
                let leadership = Leadership::load(&store)?;
                if !leadership.permits(&Actor::member(member), NodeRef::Area(area), Action::View) {
                    bail!("member {} may not view area {}", member, area);
                }
            }
            let dashboard = HierarchyAggregator::new(&store)
                .area_dashboard(area, date.unwrap_or_else(today))?;
            if table {
                Ok(render_dashboard(&dashboard))
            } else {
                to_json(&dashboard)
            }
        }

        Command::ScoreMonth {
            sector,
            year,
            month,
            dry_run,
        } => {
            let run = run_monthly_scoring(&store, config.scoring, sector, year, month, dry_run)?;
            if !run.report.is_clean() {
                warn!(failed = ?run.report.failed_members(), "Some scores were not written, rerun for them");
            }
            to_json(&run)
        }

        Command::ScoreAll { year, month } => {
            let run = run_all_sectors(&store, config.scoring, year, month)?;
            if !run.report.is_clean() {
                warn!(failed = ?run.report.failed_members(), "Some scores were not written, rerun for them");
            }
            to_json(&run)
        }

        Command::Annual { year, limit } => {
            let mut standings = annual_standings(&store.monthly_scores_for_year(year)?);
            if let Some(limit) = limit {
                standings.truncate(limit);
            }
            to_json(&standings)
        }

        Command::CleanMonthly { year } => to_json(&prune_monthly_records(&store, year, today())?),

        Command::Attendance {
            member,
            date,
            worship,
            group,
            service,
        } => {
            let kinds: Vec<ActivityKind> = [
                (worship, ActivityKind::Worship),
                (group, ActivityKind::GroupMeeting),
                (service, ActivityKind::Service),
            ]
            .into_iter()
            .filter_map(|(on, kind)| on.then_some(kind))
            .collect();
            if kinds.is_empty() {
                bail!("choose at least one of --worship, --group, --service");
            }
            let outcome = register_attendance(&store, member, date.unwrap_or_else(today), &kinds)?;
            to_json(&outcome)
        }

        Command::SplitGroup { group, plan, at } => {
            let contents = std::fs::read_to_string(&plan)
                .with_context(|| format!("Failed to read split plan: {}", plan.display()))?;
            let plan: SplitPlan = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse split plan: {}", plan.display()))?;
            let at = at.unwrap_or_else(|| Local::now().naive_local());
            to_json(&split_group(&store, group, &plan, at)?)
        }

        Command::CloseGroup { group } => {
            let detached = close_group(&store, group)?;
            to_json(&serde_json::json!({ "group": group, "detached": detached }))
        }

        Command::AddGoals {
            area,
            start,
            end,
            facilitators,
            hosts,
            course,
            retreat,
            baptisms,
            splits,
        } => {
            let per_group = MetricCounts {
                facilitators_in_training: facilitators,
                hosts_in_training: hosts,
                course_participants: course,
                retreat_participants: retreat,
                baptisms,
                group_splits: splits,
            };
            to_json(&store.append_goal_package(area, start, end, per_group)?)
        }

        Command::Journey { member } => to_json(&store.journey_for(Subject::Member(member))?),
    }
}

fn import(store: &Store, config: &Config, file: &Path) -> Result<String> {
    let mut snapshot = Snapshot::load(file)?;
    info!(
        path = %file.display(),
        exported = %snapshot.age_display(),
        "Importing snapshot"
    );
    if let Some(campus) = &config.campus {
        for member in snapshot.data.members.iter_mut().filter(|m| m.campus.is_none()) {
            member.campus = Some(campus.clone());
        }
    }
    let summary = store.import(&snapshot.data)?;
    to_json(&summary)
}

fn render_dashboard(dashboard: &AreaDashboard) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} on {} (package {})",
        dashboard.area.name,
        dashboard.as_of,
        dashboard
            .package
            .as_ref()
            .map(|p| format!("#{} {}..{}", p.id, p.start_date, p.end_date))
            .unwrap_or_else(|| "none".to_string())
    );

    let mut rows = vec![(0, &dashboard.area)];
    for sector in &dashboard.sectors {
        rows.push((1, &sector.progress));
        rows.extend(sector.groups.iter().map(|g| (2, g)));
    }

    for (depth, node) in rows {
        let name = format!("{}{}", "  ".repeat(depth), node.name);
        let _ = write!(
            out,
            "{:<width$} groups {:>3} members {:>4}",
            truncate(&name, NAME_WIDTH),
            node.active_groups,
            node.member_count,
            width = NAME_WIDTH
        );
        for metric in Metric::ALL {
            let _ = write!(
                out,
                " | {} {}",
                metric.label(),
                format_attainment(node.achieved.get(metric), node.goals.get(metric))
            );
        }
        out.push('\n');
    }
    out
}
