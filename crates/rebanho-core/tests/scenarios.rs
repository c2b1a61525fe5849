//! End-to-end scenarios through the public API on an in-memory store.

use std::collections::BTreeSet;

use chrono::NaiveDate;

use rebanho_core::eleve::{
    cohort_size, register_attendance, run_monthly_scoring, MonthlyScorer, ScoringPolicy,
};
use rebanho_core::hierarchy::HierarchyAggregator;
use rebanho_core::models::{
    ActivityKind, Area, GroupState, Member, Metric, MetricCounts, PointEvent, Sector, SmallGroup,
};
use rebanho_core::store::{MembershipRepository, Store};

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// Area 1 → sector 1 → group 1 with 9 participants (1..=9), facilitator 10
/// and host 11.
fn sector_with_eleven_members() -> Store {
    let store = Store::open_in_memory().unwrap();
    for id in 1..=11 {
        store
            .insert_member(&Member::new(id, format!("Membro {}", id)))
            .unwrap();
    }
    store
        .insert_area(&Area {
            id: 1,
            name: "Centro".to_string(),
            supervisors: vec![],
        })
        .unwrap();
    store
        .insert_sector(&Sector {
            id: 1,
            name: "Setor S".to_string(),
            area_id: 1,
            supervisors: vec![],
        })
        .unwrap();
    store
        .insert_group(&SmallGroup {
            id: 1,
            name: "PG G".to_string(),
            sector_id: 1,
            facilitator_id: 10,
            host_id: 11,
            meeting_day: None,
            meeting_time: None,
            state: GroupState::Active,
        })
        .unwrap();
    for id in 1..=9 {
        let mut member = store.get_member(id).unwrap();
        member.group_id = Some(1);
        store.update_member(&member).unwrap();
    }
    store
}

fn lesson_day(store: &Store, member_id: i64, date: NaiveDate, points: i64) {
    store
        .record_point_event(&PointEvent {
            member_id,
            date,
            kind: ActivityKind::DailyLesson,
            points,
            lesson_id: None,
        })
        .unwrap();
}

#[test]
fn test_baptism_goal_exceeded_shows_uncapped_attainment() {
    let store = sector_with_eleven_members();
    let per_group = MetricCounts {
        baptisms: 2,
        ..MetricCounts::default()
    };
    store
        .append_goal_package(1, date(2025, 1, 1), date(2025, 12, 31), per_group)
        .unwrap();
    for (id, received) in [(2, date(2025, 2, 9)), (5, date(2025, 4, 20)), (10, date(2025, 7, 1))] {
        let mut member = store.get_member(id).unwrap();
        member.baptized = true;
        member.reception_date = Some(received);
        store.update_member(&member).unwrap();
    }

    let dashboard = HierarchyAggregator::new(&store)
        .area_dashboard(1, date(2025, 8, 1))
        .unwrap();
    let sector = &dashboard.sectors[0].progress;
    assert_eq!(sector.member_count, 11);
    assert_eq!(sector.goals.baptisms, 2);
    assert_eq!(sector.achieved.baptisms, 3);
    assert_eq!(sector.attainment(Metric::Baptisms), Some(150));
}

#[test]
fn test_goals_are_per_group_times_active_groups() {
    let store = sector_with_eleven_members();
    let per_group = MetricCounts {
        facilitators_in_training: 2,
        hosts_in_training: 1,
        course_participants: 5,
        retreat_participants: 4,
        baptisms: 3,
        group_splits: 1,
    };
    store
        .append_goal_package(1, date(2025, 1, 1), date(2025, 12, 31), per_group)
        .unwrap();
    let dashboard = HierarchyAggregator::new(&store)
        .area_dashboard(1, date(2025, 3, 1))
        .unwrap();
    for metric in Metric::ALL {
        assert_eq!(dashboard.area.goals.get(metric), per_group.get(metric));
        assert_eq!(dashboard.sectors[0].progress.goals.get(metric), per_group.get(metric));
    }
}

#[test]
fn test_window_bonus_scenario() {
    let store = sector_with_eleven_members();
    // 10 points on day 1 and 8 on day 3; lessons on days 1 to 5.
    lesson_day(&store, 1, date(2025, 3, 1), 10);
    lesson_day(&store, 1, date(2025, 3, 2), 0);
    lesson_day(&store, 1, date(2025, 3, 3), 8);
    lesson_day(&store, 1, date(2025, 3, 4), 0);
    lesson_day(&store, 1, date(2025, 3, 5), 0);

    let scorer = MonthlyScorer::new(&store, ScoringPolicy::default());
    let window = scorer.score_window(1, date(2025, 3, 1), date(2025, 3, 7)).unwrap();
    assert_eq!(window.base_points, 18);
    assert_eq!(window.multiplier_percent, 110);
    assert_eq!(window.points, 20);
    assert_eq!(scorer.score_month(1, 2025, 3).unwrap().total, 20);
}

#[test]
fn test_four_lesson_days_get_no_bonus() {
    let store = sector_with_eleven_members();
    lesson_day(&store, 1, date(2025, 3, 1), 10);
    lesson_day(&store, 1, date(2025, 3, 2), 0);
    lesson_day(&store, 1, date(2025, 3, 3), 8);
    lesson_day(&store, 1, date(2025, 3, 4), 0);

    let scorer = MonthlyScorer::new(&store, ScoringPolicy::default());
    let window = scorer.score_window(1, date(2025, 3, 1), date(2025, 3, 7)).unwrap();
    assert_eq!(window.multiplier_percent, 100);
    assert_eq!(window.points, 18);
}

#[test]
fn test_member_without_events_scores_zero_and_ranks_last() {
    let store = sector_with_eleven_members();
    register_attendance(&store, 4, date(2025, 3, 9), &[ActivityKind::Worship]).unwrap();
    let run = run_monthly_scoring(&store, ScoringPolicy::default(), 1, 2025, 3, false).unwrap();

    assert_eq!(run.ranking.members.len(), 11);
    assert_eq!(run.ranking.members[0].member_id, 4);
    assert_eq!(run.ranking.cohort_size, 3);
    let last = run.ranking.members.last().unwrap();
    assert_eq!(last.points, 0);
    assert_eq!(last.rank, 11);
    let qualified: BTreeSet<i64> = run.ranking.qualified().map(|m| m.member_id).collect();
    assert_eq!(qualified, [1, 2, 4].into_iter().collect());
}

#[test]
fn test_monthly_run_twice_keeps_one_record_per_member() {
    let store = sector_with_eleven_members();
    register_attendance(&store, 7, date(2025, 3, 9), &[ActivityKind::Service]).unwrap();
    run_monthly_scoring(&store, ScoringPolicy::default(), 1, 2025, 3, false).unwrap();
    let first = store.get_monthly_score(7, 2025, 3).unwrap();
    run_monthly_scoring(&store, ScoringPolicy::default(), 1, 2025, 3, false).unwrap();
    assert_eq!(store.count_monthly_scores(2025).unwrap(), 11);
    assert_eq!(store.get_monthly_score(7, 2025, 3).unwrap(), first);
}

#[test]
fn test_cohort_size_formula() {
    for n in 1..=50usize {
        let expected = ((n as f64) * 0.2).ceil().max(1.0) as usize;
        assert_eq!(cohort_size(n, 20), expected, "N = {}", n);
    }
    assert_eq!(cohort_size(0, 20), 0);
}

#[test]
fn test_member_in_two_roles_counts_once() {
    let store = sector_with_eleven_members();
    // The facilitator also supervises the sector.
    let store_sector = Sector {
        id: 2,
        name: "Setor T".to_string(),
        area_id: 1,
        supervisors: vec![10],
    };
    store.insert_sector(&store_sector).unwrap();
    let members = store.get_active_group_members(1).unwrap();
    assert_eq!(members.len(), 11);

    let dashboard = HierarchyAggregator::new(&store)
        .area_dashboard(1, date(2025, 3, 1))
        .unwrap();
    assert_eq!(dashboard.area.member_count, 11);
}
