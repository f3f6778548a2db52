use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::calibration::CalibrationState;
use super::levels::PerformanceLevel;
use super::nine_box::{position_for, NineBoxPosition};
use super::potential::PotentialFactors;

/// Lowest score on the normalized response scale.
pub const SCORE_MIN: f64 = 0.0;
/// Highest score on the normalized response scale.
pub const SCORE_MAX: f64 = 5.0;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(
    /// Tenant (customer organization) identifier supplied by the identity layer.
    TenantId
);
string_id!(
    /// Measurement cycle identifier.
    CycleId
);
string_id!(
    /// Person identifier, used for both evaluators and evaluatees.
    EmployeeId
);
string_id!(
    /// Persisted performance rating identifier.
    RatingId
);
string_id!(AssignmentId);
string_id!(DepartmentId);
string_id!(
    /// User performing a calibration, revert or potential assessment.
    ActorId
);
string_id!(
    /// Groups calibrations decided together in one calibration meeting.
    CalibrationSessionId
);

/// Relationship between evaluator and evaluatee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RaterType {
    #[serde(rename = "SELF")]
    SelfAssessment,
    ManagerToEmployee,
    Peer,
    EmployeeToManager,
}

impl RaterType {
    pub const fn ordered() -> [RaterType; 4] {
        [
            RaterType::SelfAssessment,
            RaterType::ManagerToEmployee,
            RaterType::Peer,
            RaterType::EmployeeToManager,
        ]
    }

    pub const fn code(self) -> &'static str {
        match self {
            RaterType::SelfAssessment => "SELF",
            RaterType::ManagerToEmployee => "MANAGER_TO_EMPLOYEE",
            RaterType::Peer => "PEER",
            RaterType::EmployeeToManager => "EMPLOYEE_TO_MANAGER",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            RaterType::SelfAssessment => "Self",
            RaterType::ManagerToEmployee => "Manager",
            RaterType::Peer => "Peers",
            RaterType::EmployeeToManager => "Direct reports",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentStatus {
    Pending,
    InProgress,
    Completed,
}

/// One directed rating relationship inside a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationAssignment {
    pub id: AssignmentId,
    pub cycle_id: CycleId,
    pub evaluator_id: EmployeeId,
    pub evaluatee_id: EmployeeId,
    pub rater_type: RaterType,
    pub status: AssignmentStatus,
}

impl EvaluationAssignment {
    pub fn is_completed(&self) -> bool {
        self.status == AssignmentStatus::Completed
    }
}

/// A submitted answer. The competency is resolved through the answered question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyResponse {
    pub question_id: String,
    #[serde(default)]
    pub competency_code: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub normalized_score: Option<f64>,
    #[serde(default)]
    pub text: Option<String>,
}

/// Assignment together with the responses collected for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentResponses {
    pub assignment: EvaluationAssignment,
    pub responses: Vec<SurveyResponse>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Competency {
    pub code: String,
    pub name: String,
    pub category: String,
}

/// Competency list frozen when the cycle was created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompetencySnapshot(Vec<Competency>);

impl CompetencySnapshot {
    pub fn new(competencies: Vec<Competency>) -> Self {
        Self(competencies)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Competency> {
        self.0.iter()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.0.iter().any(|competency| competency.code == code)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Lifecycle of a measurement cycle as seen by the read path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CycleStatus {
    Active,
    InReview,
    Completed,
}

impl CycleStatus {
    /// Open cycles still collect responses, so their ratings are synthesized on read.
    pub const fn is_open(self) -> bool {
        matches!(self, CycleStatus::Active)
    }

    pub const fn label(self) -> &'static str {
        match self {
            CycleStatus::Active => "active",
            CycleStatus::InReview => "in_review",
            CycleStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementCycle {
    pub id: CycleId,
    pub tenant_id: TenantId,
    pub name: String,
    pub status: CycleStatus,
    pub competencies: CompetencySnapshot,
}

/// Directory entry supplied by the people collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub tenant_id: TenantId,
    pub display_name: String,
    #[serde(default)]
    pub department_id: Option<DepartmentId>,
}

/// Average score contributed by each rater type; `None` when a type has no data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    pub self_score: Option<f64>,
    pub manager_score: Option<f64>,
    pub peer_score: Option<f64>,
    pub upward_score: Option<f64>,
}

impl ComponentScores {
    pub fn get(&self, rater_type: RaterType) -> Option<f64> {
        match rater_type {
            RaterType::SelfAssessment => self.self_score,
            RaterType::ManagerToEmployee => self.manager_score,
            RaterType::Peer => self.peer_score,
            RaterType::EmployeeToManager => self.upward_score,
        }
    }

    pub fn set(&mut self, rater_type: RaterType, score: Option<f64>) {
        let slot = match rater_type {
            RaterType::SelfAssessment => &mut self.self_score,
            RaterType::ManagerToEmployee => &mut self.manager_score,
            RaterType::Peer => &mut self.peer_score,
            RaterType::EmployeeToManager => &mut self.upward_score,
        };
        *slot = score;
    }

    /// Rater types with data, in canonical order.
    pub fn present(&self) -> impl Iterator<Item = (RaterType, f64)> + '_ {
        RaterType::ordered()
            .into_iter()
            .filter_map(|rater_type| self.get(rater_type).map(|score| (rater_type, score)))
    }

    pub fn is_empty(&self) -> bool {
        self.present().next().is_none()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completeness {
    pub total_assignments: u32,
    pub completed_assignments: u32,
}

/// Potential attached to a rating by a separate assessor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PotentialAssessment {
    pub score: f64,
    #[serde(default)]
    pub factors: Option<PotentialFactors>,
    pub rated_by: ActorId,
    pub rated_at: DateTime<Utc>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Machine-derived fields written by rating generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculatedRating {
    /// Used only when the (cycle, evaluatee) row does not exist yet.
    pub id: RatingId,
    pub tenant_id: TenantId,
    pub cycle_id: CycleId,
    pub evaluatee_id: EmployeeId,
    pub evaluatee_name: String,
    pub department_id: Option<DepartmentId>,
    pub calculated_score: f64,
    pub calculated_level: PerformanceLevel,
    pub components: ComponentScores,
    pub completeness: Completeness,
    pub computed_at: DateTime<Utc>,
}

/// Persisted aggregate, unique per (cycle, evaluatee).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRating {
    pub id: RatingId,
    pub tenant_id: TenantId,
    pub cycle_id: CycleId,
    pub evaluatee_id: EmployeeId,
    pub evaluatee_name: String,
    pub department_id: Option<DepartmentId>,
    pub calculated_score: f64,
    pub calculated_level: PerformanceLevel,
    pub components: ComponentScores,
    pub completeness: Completeness,
    pub potential: Option<PotentialAssessment>,
    pub nine_box: Option<NineBoxPosition>,
    pub calibration: CalibrationState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PerformanceRating {
    /// Build a fresh row from a first generation pass.
    pub fn from_calculated(calculated: CalculatedRating) -> Self {
        Self {
            id: calculated.id,
            tenant_id: calculated.tenant_id,
            cycle_id: calculated.cycle_id,
            evaluatee_id: calculated.evaluatee_id,
            evaluatee_name: calculated.evaluatee_name,
            department_id: calculated.department_id,
            calculated_score: calculated.calculated_score,
            calculated_level: calculated.calculated_level,
            components: calculated.components,
            completeness: calculated.completeness,
            potential: None,
            nine_box: None,
            calibration: CalibrationState::default(),
            created_at: calculated.computed_at,
            updated_at: calculated.computed_at,
        }
    }

    /// Overwrite machine-derived fields, leaving calibration and potential untouched.
    pub fn apply_calculated(&mut self, calculated: CalculatedRating) {
        self.evaluatee_name = calculated.evaluatee_name;
        self.department_id = calculated.department_id;
        self.calculated_score = calculated.calculated_score;
        self.calculated_level = calculated.calculated_level;
        self.components = calculated.components;
        self.completeness = calculated.completeness;
        self.updated_at = calculated.computed_at;
        self.reposition();
    }

    /// Re-derive the grid cell from the effective score and potential as they stand now.
    pub fn reposition(&mut self) {
        self.nine_box = position_for(self);
    }

    pub fn final_score(&self) -> Option<f64> {
        self.calibration.final_score
    }

    pub fn effective_score(&self) -> f64 {
        self.calibration.final_score.unwrap_or(self.calculated_score)
    }

    pub fn effective_level(&self) -> &PerformanceLevel {
        self.calibration
            .final_level
            .as_ref()
            .unwrap_or(&self.calculated_level)
    }

    pub fn potential_score(&self) -> Option<f64> {
        self.potential.as_ref().map(|potential| potential.score)
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibration.calibrated
    }

    /// A row has a usable score once any rater contributed or a human calibrated it.
    pub fn has_usable_score(&self) -> bool {
        self.calculated_score > 0.0 || self.calibration.calibrated
    }

    pub fn is_evaluated(&self) -> bool {
        self.completeness.completed_assignments > 0 || self.calibration.calibrated
    }
}
