use std::sync::Arc;

use axum::response::Response;
use serde_json::Value;

use crate::config::EngineSettings;
use crate::ratings::domain::{
    AssignmentId, AssignmentResponses, AssignmentStatus, Competency, CompetencySnapshot, CycleId,
    CycleStatus, DepartmentId, Employee, EmployeeId, EvaluationAssignment, MeasurementCycle,
    RaterType, SurveyResponse, TenantId,
};
use crate::ratings::memory::{InMemoryAuditLog, InMemoryRatingStore};
use crate::ratings::repository::{AuditEntry, AuditError, AuditSink};
use crate::ratings::service::RatingService;

pub(super) const TENANT: &str = "acme";
pub(super) const CYCLE: &str = "2025-h1";

pub(super) type MemoryService = RatingService<InMemoryRatingStore, InMemoryAuditLog>;

pub(super) fn tenant() -> TenantId {
    TenantId::from(TENANT)
}

pub(super) fn cycle_id() -> CycleId {
    CycleId::from(CYCLE)
}

pub(super) fn competencies() -> CompetencySnapshot {
    CompetencySnapshot::new(vec![
        Competency {
            code: "COMM".to_string(),
            name: "Communication".to_string(),
            category: "core".to_string(),
        },
        Competency {
            code: "LEAD".to_string(),
            name: "Leadership".to_string(),
            category: "leadership".to_string(),
        },
    ])
}

pub(super) fn store_with_cycle(status: CycleStatus) -> Arc<InMemoryRatingStore> {
    let store = Arc::new(InMemoryRatingStore::default());
    store.insert_cycle(MeasurementCycle {
        id: cycle_id(),
        tenant_id: tenant(),
        name: "2025 first half".to_string(),
        status,
        competencies: competencies(),
    });
    store
}

pub(super) fn build_service(
    store: Arc<InMemoryRatingStore>,
) -> (MemoryService, Arc<InMemoryRatingStore>, Arc<InMemoryAuditLog>) {
    build_service_with(store, EngineSettings::default())
}

pub(super) fn build_service_with(
    store: Arc<InMemoryRatingStore>,
    settings: EngineSettings,
) -> (MemoryService, Arc<InMemoryRatingStore>, Arc<InMemoryAuditLog>) {
    let audit = Arc::new(InMemoryAuditLog::default());
    let service = RatingService::new(store.clone(), audit.clone(), settings);
    (service, store, audit)
}

pub(super) fn employee_id(index: usize) -> EmployeeId {
    EmployeeId(format!("emp-{index:02}"))
}

pub(super) fn add_employee(
    store: &InMemoryRatingStore,
    id: &EmployeeId,
    name: &str,
    department: &str,
) {
    store.insert_employee(Employee {
        id: id.clone(),
        tenant_id: tenant(),
        display_name: name.to_string(),
        department_id: Some(DepartmentId::from(department)),
    });
}

/// One assignment answering every competency with the same score.
pub(super) fn add_assignment(
    store: &InMemoryRatingStore,
    evaluatee_id: &EmployeeId,
    rater_type: RaterType,
    status: AssignmentStatus,
    score: f64,
) {
    let assignment_id = AssignmentId(format!("{evaluatee_id}-{}", rater_type.code()));
    store.insert_assignment(AssignmentResponses {
        assignment: EvaluationAssignment {
            id: assignment_id,
            cycle_id: cycle_id(),
            evaluator_id: EmployeeId(format!("rater-{evaluatee_id}")),
            evaluatee_id: evaluatee_id.clone(),
            rater_type,
            status,
        },
        responses: ["COMM", "LEAD"]
            .into_iter()
            .enumerate()
            .map(|(index, code)| SurveyResponse {
                question_id: format!("q{}", index + 1),
                competency_code: Some(code.to_string()),
                rating: Some(score),
                normalized_score: Some(score),
                text: None,
            })
            .collect(),
    });
}

/// Employee with completed self and manager assignments.
pub(super) fn seed_evaluatee(
    store: &InMemoryRatingStore,
    id: &EmployeeId,
    name: &str,
    department: &str,
    self_score: f64,
    manager_score: f64,
) {
    add_employee(store, id, name, department);
    add_assignment(
        store,
        id,
        RaterType::SelfAssessment,
        AssignmentStatus::Completed,
        self_score,
    );
    add_assignment(
        store,
        id,
        RaterType::ManagerToEmployee,
        AssignmentStatus::Completed,
        manager_score,
    );
}

/// Ada: SELF 4.0, MANAGER 3.0.
pub(super) fn seed_ada(store: &InMemoryRatingStore) -> EmployeeId {
    let id = EmployeeId::from("emp-ada");
    seed_evaluatee(store, &id, "Ada Lovelace", "eng", 4.0, 3.0);
    id
}

#[derive(Default, Clone)]
pub(super) struct FailingAudit;

impl AuditSink for FailingAudit {
    fn record(&self, _entry: AuditEntry) -> Result<(), AuditError> {
        Err(AuditError::Transport("audit bus offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
