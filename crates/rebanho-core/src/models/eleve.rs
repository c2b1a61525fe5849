//! ELEVE engagement entities.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{MemberId, SectorId, UnknownVariant};

/// Life-wheel ("Roda da Vida") subcategories a daily lesson can target.
pub const LIFE_WHEEL_CATEGORIES: [&str; 12] = [
    "Saúde",
    "Família",
    "Finanças",
    "Santidade",
    "Tempo de Leitura",
    "Tempo de Oração",
    "Culto",
    "Liderança",
    "Célula",
    "Carreira",
    "Aperfeiçoamento",
    "Sonho",
];

/// Kind of activity a point event was earned for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    DailyLesson,
    Worship,
    GroupMeeting,
    Service,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::DailyLesson => "daily_lesson",
            ActivityKind::Worship => "worship",
            ActivityKind::GroupMeeting => "group_meeting",
            ActivityKind::Service => "service",
        }
    }

    /// Points for attendance-style activities. Daily lessons are scored
    /// from their content instead.
    pub fn attendance_points(&self) -> Option<i64> {
        match self {
            ActivityKind::Worship => Some(5),
            ActivityKind::GroupMeeting => Some(5),
            ActivityKind::Service => Some(3),
            ActivityKind::DailyLesson => None,
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityKind::DailyLesson => write!(f, "Daily lesson"),
            ActivityKind::Worship => write!(f, "Worship"),
            ActivityKind::GroupMeeting => write!(f, "Small group"),
            ActivityKind::Service => write!(f, "Service"),
        }
    }
}

impl FromStr for ActivityKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily_lesson" | "pilula" => Ok(ActivityKind::DailyLesson),
            "worship" | "culto" => Ok(ActivityKind::Worship),
            "group_meeting" | "pg" => Ok(ActivityKind::GroupMeeting),
            "service" | "servico" | "serviço" => Ok(ActivityKind::Service),
            _ => Err(UnknownVariant {
                kind: "activity kind",
                value: s.to_string(),
            }),
        }
    }
}

/// Append-only log row: a member earned `points` for one activity on `date`.
/// Unique per (member, date, kind).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointEvent {
    pub member_id: MemberId,
    pub date: NaiveDate,
    pub kind: ActivityKind,
    pub points: i64,
    #[serde(default)]
    pub lesson_id: Option<i64>,
}

/// Final monthly score of a member. Unique per (member, month, year);
/// rerunning the monthly job overwrites it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyScoreRecord {
    pub member_id: MemberId,
    /// Sector the member was ranked in; `None` for members outside any group.
    pub sector_id: Option<SectorId>,
    pub year: i32,
    pub month: u32,
    pub points: i64,
    pub rank: Option<u32>,
    pub qualified: bool,
}

/// Progress (0..=100) of a member in one life-wheel category for a year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressIndex {
    pub member_id: MemberId,
    pub category: String,
    pub year: i32,
    pub value: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizOption {
    pub id: i64,
    pub text: String,
    pub correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: i64,
    pub text: String,
    pub options: Vec<QuizOption>,
}

impl QuizQuestion {
    pub fn correct_option(&self) -> Option<i64> {
        self.options.iter().find(|o| o.correct).map(|o| o.id)
    }
}

/// A member's answer to one quiz question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizAnswer {
    pub question_id: i64,
    pub option_id: i64,
}

/// A daily lesson ("pílula"), available on its publication date only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyLesson {
    pub id: i64,
    pub title: String,
    pub published_on: NaiveDate,
    pub category: String,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub task: Option<String>,
    #[serde(default)]
    pub quiz: Vec<QuizQuestion>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_kind_parses_portuguese_labels() {
        assert_eq!("Culto".parse::<ActivityKind>().unwrap(), ActivityKind::Worship);
        assert_eq!("PG".parse::<ActivityKind>().unwrap(), ActivityKind::GroupMeeting);
        assert_eq!("Servico".parse::<ActivityKind>().unwrap(), ActivityKind::Service);
        assert_eq!("Pilula".parse::<ActivityKind>().unwrap(), ActivityKind::DailyLesson);
        assert!("Encontro".parse::<ActivityKind>().is_err());
    }

    #[test]
    fn test_attendance_points() {
        assert_eq!(ActivityKind::Worship.attendance_points(), Some(5));
        assert_eq!(ActivityKind::GroupMeeting.attendance_points(), Some(5));
        assert_eq!(ActivityKind::Service.attendance_points(), Some(3));
        assert_eq!(ActivityKind::DailyLesson.attendance_points(), None);
    }

    #[test]
    fn test_correct_option() {
        let q = QuizQuestion {
            id: 1,
            text: "?".to_string(),
            options: vec![
                QuizOption { id: 10, text: "a".to_string(), correct: false },
                QuizOption { id: 11, text: "b".to_string(), correct: true },
            ],
        };
        assert_eq!(q.correct_option(), Some(11));
    }
}
