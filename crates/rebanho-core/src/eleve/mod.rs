//! ELEVE engagement scoring.
//!
//! - `scorer`: a member's monthly total from weekly windows and the lesson
//!   streak bonus
//! - `ranking`: sector ranking and the qualifying cohort
//! - `monthly`: the persisting monthly run, per sector or across all
//! - `attendance`, `lesson`: how point events are earned
//! - `annual`, `retention`: yearly standings and pruning old records

pub mod annual;
pub mod attendance;
pub mod lesson;
pub mod monthly;
pub mod ranking;
pub mod retention;
pub mod scorer;

pub use annual::{annual_standings, AnnualStanding};
pub use attendance::{register_attendance, AttendanceOutcome};
pub use lesson::{complete_lesson, score_lesson, LessonCompletion, LessonScore, LessonSubmission};
pub use monthly::{
    run_all_sectors, run_monthly_scoring, score_member_record, BatchReport, FailedWrite, MonthRun,
    SectorRun,
};
pub use ranking::{
    cohort_size, rank_scores, rank_sector, rank_sector_excluding, RankedMember, SectorRanking,
};
pub use retention::{prune_monthly_records, PruneReport};
pub use scorer::{apply_multiplier, scoring_windows, MonthlyScore, MonthlyScorer, ScoringPolicy, WindowScore};
