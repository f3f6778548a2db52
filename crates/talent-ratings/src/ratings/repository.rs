use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::calibration::CalibrationState;
use super::domain::{
    ActorId, AssignmentResponses, CalculatedRating, CycleId, Employee, EmployeeId,
    MeasurementCycle, PerformanceRating, PotentialAssessment, RatingId, TenantId,
};
use super::levels::PerformanceLevelConfig;
use super::listing::{RatingFilters, RatingSort};
use super::weights::EvaluatorWeights;

/// Cycle and people lookups supplied by the hosting platform.
pub trait CycleDirectory: Send + Sync {
    fn cycle(
        &self,
        tenant_id: &TenantId,
        cycle_id: &CycleId,
    ) -> Result<Option<MeasurementCycle>, RepositoryError>;

    /// Employees of the tenant among `ids`; unknown ids are skipped.
    fn employees(
        &self,
        tenant_id: &TenantId,
        ids: &[EmployeeId],
    ) -> Result<Vec<Employee>, RepositoryError>;
}

/// Raw response source: assignments and their submitted answers.
pub trait ResponseSource: Send + Sync {
    fn assignments_for(
        &self,
        cycle_id: &CycleId,
        evaluatee_id: &EmployeeId,
    ) -> Result<Vec<AssignmentResponses>, RepositoryError>;

    /// Distinct evaluatees with any assignment in the cycle.
    fn evaluatees(&self, cycle_id: &CycleId) -> Result<Vec<EmployeeId>, RepositoryError>;

    /// Distinct evaluatees with at least one completed assignment in the cycle.
    fn evaluated_employees(&self, cycle_id: &CycleId) -> Result<Vec<EmployeeId>, RepositoryError>;
}

/// Override layers of the rating configuration.
pub trait RatingConfigStore: Send + Sync {
    fn cycle_weights(
        &self,
        tenant_id: &TenantId,
        cycle_id: &CycleId,
    ) -> Result<Option<EvaluatorWeights>, RepositoryError>;
    fn tenant_weights(&self, tenant_id: &TenantId)
        -> Result<Option<EvaluatorWeights>, RepositoryError>;
    fn level_config(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Option<PerformanceLevelConfig>, RepositoryError>;

    fn save_cycle_weights(
        &self,
        tenant_id: &TenantId,
        cycle_id: &CycleId,
        weights: EvaluatorWeights,
    ) -> Result<(), RepositoryError>;
    fn save_tenant_weights(
        &self,
        tenant_id: &TenantId,
        weights: EvaluatorWeights,
    ) -> Result<(), RepositoryError>;
    fn save_level_config(
        &self,
        tenant_id: &TenantId,
        config: PerformanceLevelConfig,
    ) -> Result<(), RepositoryError>;
}

/// Filtered, sorted window over persisted ratings of one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingQuery {
    pub cycle_id: CycleId,
    pub filters: RatingFilters,
    pub sort: RatingSort,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl RatingQuery {
    pub fn all(cycle_id: CycleId) -> Self {
        Self {
            cycle_id,
            filters: RatingFilters::default(),
            sort: RatingSort::default(),
            offset: 0,
            limit: None,
        }
    }
}

/// Persisted ratings. Each write touches one field group so generation, calibration and
/// potential updates can interleave without locking. Every write also re-derives the grid
/// cell from the row it leaves behind (`PerformanceRating::reposition`) in the same atomic
/// step, so no caller ever persists a position computed from an older row.
pub trait RatingRepository: Send + Sync {
    /// Insert or overwrite machine-derived fields, atomically keyed by (cycle, evaluatee).
    fn upsert_calculated(
        &self,
        rating: CalculatedRating,
    ) -> Result<PerformanceRating, RepositoryError>;
    fn fetch(&self, id: &RatingId) -> Result<Option<PerformanceRating>, RepositoryError>;
    fn fetch_for_evaluatees(
        &self,
        cycle_id: &CycleId,
        evaluatee_ids: &[EmployeeId],
    ) -> Result<Vec<PerformanceRating>, RepositoryError>;
    fn save_calibration(
        &self,
        id: &RatingId,
        calibration: CalibrationState,
    ) -> Result<PerformanceRating, RepositoryError>;
    fn save_potential(
        &self,
        id: &RatingId,
        potential: PotentialAssessment,
    ) -> Result<PerformanceRating, RepositoryError>;
    fn query(&self, query: &RatingQuery) -> Result<Vec<PerformanceRating>, RepositoryError>;
    fn count(&self, cycle_id: &CycleId, filters: &RatingFilters)
        -> Result<usize, RepositoryError>;
}

/// Everything the rating service reads and writes.
pub trait RatingStore: CycleDirectory + ResponseSource + RatingConfigStore + RatingRepository {}

impl<T> RatingStore for T where
    T: CycleDirectory + ResponseSource + RatingConfigStore + RatingRepository
{
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    RatingGenerated,
    RatingCalibrated,
    CalibrationReverted,
    PotentialRated,
}

/// Audit trail entry written by every rating mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub action: AuditAction,
    pub rating_id: RatingId,
    pub tenant_id: TenantId,
    pub cycle_id: CycleId,
    pub evaluatee_id: EmployeeId,
    pub actor: ActorId,
    pub at: DateTime<Utc>,
    pub details: BTreeMap<String, String>,
}

impl AuditEntry {
    pub fn for_rating(
        action: AuditAction,
        rating: &PerformanceRating,
        actor: ActorId,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            action,
            rating_id: rating.id.clone(),
            tenant_id: rating.tenant_id.clone(),
            cycle_id: rating.cycle_id.clone(),
            evaluatee_id: rating.evaluatee_id.clone(),
            actor,
            at,
            details: BTreeMap::new(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl ToString) -> Self {
        self.details.insert(key.to_string(), value.to_string());
        self
    }
}

/// Outbound audit hook (database table, event bus, ...).
///
/// Calibration, revert and potential entries are recorded before the row is written, so a
/// failing sink leaves the rating untouched. Generation is recorded after its upsert because
/// the store owns the row identity.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit transport unavailable: {0}")]
    Transport(String),
}
