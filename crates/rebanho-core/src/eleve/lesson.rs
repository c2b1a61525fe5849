//! Daily lessons ("pílulas"): scoring a submission and recording completion.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{CoreError, Result};
use crate::models::{ActivityKind, DailyLesson, MemberId, PointEvent, QuizAnswer};
use crate::store::sqlite::{add_progress, get_member, insert_point_event, lesson_completed_on};
use crate::store::Store;

// ============================================================================
// Constants
// ============================================================================

const VIDEO_POINTS: i64 = 2;
const TASK_POINTS: i64 = 2;
const QUIZ_POINTS: i64 = 6;
/// Correct answers needed for the quiz points on multi-question quizzes.
const QUIZ_MIN_CORRECT: usize = 2;
const PROGRESS_STEP: u32 = 10;
const PROGRESS_CAP: u32 = 100;

/// What a member did with a lesson.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonSubmission {
    #[serde(default)]
    pub watched_video: bool,
    #[serde(default)]
    pub completed_task: bool,
    #[serde(default)]
    pub answers: Vec<QuizAnswer>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LessonScore {
    pub video: i64,
    pub task: i64,
    pub quiz: i64,
    pub correct_answers: usize,
}

impl LessonScore {
    pub fn total(&self) -> i64 {
        self.video + self.task + self.quiz
    }
}

/// Video and task points are earned only when the submission says the
/// member watched the video or did the task, and the lesson has one.
pub fn score_lesson(lesson: &DailyLesson, submission: &LessonSubmission) -> LessonScore {
    let video = if submission.watched_video && lesson.video_url.is_some() {
        VIDEO_POINTS
    } else {
        0
    };
    let task = if submission.completed_task && lesson.task.is_some() {
        TASK_POINTS
    } else {
        0
    };

    let correct_answers = lesson
        .quiz
        .iter()
        .filter(|question| {
            submission.answers.iter().any(|a| {
                a.question_id == question.id && question.correct_option() == Some(a.option_id)
            })
        })
        .count();
    let passed = match lesson.quiz.len() {
        0 => false,
        1 => correct_answers == 1,
        _ => correct_answers >= QUIZ_MIN_CORRECT,
    };

    LessonScore {
        video,
        task,
        quiz: if passed { QUIZ_POINTS } else { 0 },
        correct_answers,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LessonCompletion {
    pub member_id: MemberId,
    pub lesson_id: i64,
    pub score: LessonScore,
    /// Progress in the lesson's category after this completion.
    pub progress: Option<u32>,
}

/// Record a member's completion of a lesson on `today`.
///
/// Only allowed on the lesson's publication date, once per member per day.
pub fn complete_lesson(
    store: &Store,
    member_id: MemberId,
    lesson_id: i64,
    today: NaiveDate,
    submission: &LessonSubmission,
) -> Result<LessonCompletion> {
    let lesson = store.get_lesson(lesson_id)?;
    if lesson.published_on != today {
        return Err(CoreError::InvalidInput(format!(
            "lesson {} is only available on {}",
            lesson_id, lesson.published_on
        )));
    }
    let score = score_lesson(&lesson, submission);

    store.in_transaction(|conn| {
        get_member(conn, member_id)?;
        if lesson_completed_on(conn, member_id, today)? {
            return Err(CoreError::Conflict(format!(
                "member {} already completed a lesson on {}",
                member_id, today
            )));
        }
        insert_point_event(
            conn,
            &PointEvent {
                member_id,
                date: today,
                kind: ActivityKind::DailyLesson,
                points: score.total(),
                lesson_id: Some(lesson.id),
            },
        )?;
        let progress = if score.total() > 0 {
            Some(add_progress(
                conn,
                member_id,
                &lesson.category,
                today.year(),
                PROGRESS_STEP,
                PROGRESS_CAP,
            )?)
        } else {
            None
        };
        info!(member_id, lesson_id, points = score.total(), "Lesson completed");
        Ok(LessonCompletion {
            member_id,
            lesson_id,
            score,
            progress,
        })
    })
}
