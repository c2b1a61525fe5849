use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::GroupId;

pub type MemberId = i64;

/// Returned when a stored or user-supplied label names no known variant.
#[derive(Debug, Clone, Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Small-group training track of a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingStatus {
    #[default]
    None,
    FacilitatorInTraining,
    HostInTraining,
}

impl TrainingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrainingStatus::None => "none",
            TrainingStatus::FacilitatorInTraining => "facilitator_in_training",
            TrainingStatus::HostInTraining => "host_in_training",
        }
    }
}

impl fmt::Display for TrainingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainingStatus::None => write!(f, "None"),
            TrainingStatus::FacilitatorInTraining => write!(f, "Facilitator in training"),
            TrainingStatus::HostInTraining => write!(f, "Host in training"),
        }
    }
}

impl FromStr for TrainingStatus {
    type Err = UnknownVariant;

    /// Accepts the stored snake_case names and the Portuguese form labels
    /// ("Facilitador em Treinamento", "Anfitrião em Treinamento",
    /// "Participante", "Nenhum").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        match lower.as_str() {
            "none" | "nenhum" | "participante" | "" => Ok(TrainingStatus::None),
            "facilitator_in_training" | "facilitador em treinamento" => {
                Ok(TrainingStatus::FacilitatorInTraining)
            }
            "host_in_training" | "anfitrião em treinamento" | "anfitriao em treinamento" => {
                Ok(TrainingStatus::HostInTraining)
            }
            _ => Err(UnknownVariant {
                kind: "training status",
                value: s.to_string(),
            }),
        }
    }
}

fn default_active() -> bool {
    true
}

/// A registered person. Never hard-deleted while referenced; `active = false`
/// is the soft delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub full_name: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub training_status: TrainingStatus,
    /// The small group this member participates in, if any.
    #[serde(default)]
    pub group_id: Option<GroupId>,
    #[serde(default)]
    pub completed_course: bool,
    #[serde(default)]
    pub attended_retreat: bool,
    /// Baptized or acclaimed.
    #[serde(default)]
    pub baptized: bool,
    #[serde(default)]
    pub reception_date: Option<NaiveDate>,
    #[serde(default)]
    pub campus: Option<String>,
}

impl Member {
    pub fn new(id: MemberId, full_name: impl Into<String>) -> Self {
        Self {
            id,
            full_name: full_name.into(),
            active: true,
            training_status: TrainingStatus::None,
            group_id: None,
            completed_course: false,
            attended_retreat: false,
            baptized: false,
            reception_date: None,
            campus: None,
        }
    }

    /// Reset the small-group indicators, as done when a member leaves a group.
    pub fn reset_indicators(&mut self) {
        self.training_status = TrainingStatus::None;
        self.completed_course = false;
        self.attended_retreat = false;
        self.baptized = false;
    }

    /// True when the member was received on a day in `[start, end)`.
    pub fn received_within(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.reception_date
            .map(|d| d >= start && d < end)
            .unwrap_or(false)
    }
}
