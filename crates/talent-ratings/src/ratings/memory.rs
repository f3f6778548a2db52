use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;

use super::calibration::CalibrationState;
use super::domain::{
    AssignmentResponses, CalculatedRating, CycleId, CycleStatus, Employee, EmployeeId,
    MeasurementCycle, PerformanceRating, PotentialAssessment, RatingId, TenantId,
};
use super::levels::PerformanceLevelConfig;
use super::listing::{RatingFilters, RowFacts};
use super::repository::{
    AuditEntry, AuditError, AuditSink, CycleDirectory, RatingConfigStore, RatingQuery,
    RatingRepository, RepositoryError, ResponseSource,
};
use super::weights::EvaluatorWeights;

#[derive(Default)]
struct StoreState {
    cycles: HashMap<CycleId, MeasurementCycle>,
    employees: HashMap<EmployeeId, Employee>,
    assignments: Vec<AssignmentResponses>,
    ratings: HashMap<RatingId, PerformanceRating>,
    by_evaluatee: HashMap<(CycleId, EmployeeId), RatingId>,
    cycle_weights: HashMap<(TenantId, CycleId), EvaluatorWeights>,
    tenant_weights: HashMap<TenantId, EvaluatorWeights>,
    levels: HashMap<TenantId, PerformanceLevelConfig>,
}

/// Process-local implementation of every store trait, used by the API
/// service, the demo and the tests.
#[derive(Default, Clone)]
pub struct InMemoryRatingStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryRatingStore {
    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().expect("rating store mutex poisoned")
    }

    pub fn insert_cycle(&self, cycle: MeasurementCycle) {
        self.state().cycles.insert(cycle.id.clone(), cycle);
    }

    pub fn set_cycle_status(
        &self,
        cycle_id: &CycleId,
        status: CycleStatus,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state();
        let cycle = state
            .cycles
            .get_mut(cycle_id)
            .ok_or(RepositoryError::NotFound)?;
        cycle.status = status;
        Ok(())
    }

    pub fn insert_employee(&self, employee: Employee) {
        self.state().employees.insert(employee.id.clone(), employee);
    }

    /// Insert or replace an assignment (keyed by assignment id) with its responses.
    pub fn insert_assignment(&self, entry: AssignmentResponses) {
        let mut state = self.state();
        match state
            .assignments
            .iter_mut()
            .find(|existing| existing.assignment.id == entry.assignment.id)
        {
            Some(existing) => *existing = entry,
            None => state.assignments.push(entry),
        }
    }

    pub fn load_assignments<I>(&self, entries: I)
    where
        I: IntoIterator<Item = AssignmentResponses>,
    {
        for entry in entries {
            self.insert_assignment(entry);
        }
    }

    pub fn rating_count(&self) -> usize {
        self.state().ratings.len()
    }

    fn update_rating<F>(&self, id: &RatingId, apply: F) -> Result<PerformanceRating, RepositoryError>
    where
        F: FnOnce(&mut PerformanceRating),
    {
        let mut state = self.state();
        let rating = state.ratings.get_mut(id).ok_or(RepositoryError::NotFound)?;
        apply(rating);
        rating.reposition();
        rating.updated_at = Utc::now();
        Ok(rating.clone())
    }
}

impl CycleDirectory for InMemoryRatingStore {
    fn cycle(
        &self,
        tenant_id: &TenantId,
        cycle_id: &CycleId,
    ) -> Result<Option<MeasurementCycle>, RepositoryError> {
        Ok(self
            .state()
            .cycles
            .get(cycle_id)
            .filter(|cycle| &cycle.tenant_id == tenant_id)
            .cloned())
    }

    fn employees(
        &self,
        tenant_id: &TenantId,
        ids: &[EmployeeId],
    ) -> Result<Vec<Employee>, RepositoryError> {
        let state = self.state();
        Ok(ids
            .iter()
            .filter_map(|id| state.employees.get(id))
            .filter(|employee| &employee.tenant_id == tenant_id)
            .cloned()
            .collect())
    }
}

impl ResponseSource for InMemoryRatingStore {
    fn assignments_for(
        &self,
        cycle_id: &CycleId,
        evaluatee_id: &EmployeeId,
    ) -> Result<Vec<AssignmentResponses>, RepositoryError> {
        Ok(self
            .state()
            .assignments
            .iter()
            .filter(|entry| {
                &entry.assignment.cycle_id == cycle_id
                    && &entry.assignment.evaluatee_id == evaluatee_id
            })
            .cloned()
            .collect())
    }

    fn evaluatees(&self, cycle_id: &CycleId) -> Result<Vec<EmployeeId>, RepositoryError> {
        let state = self.state();
        let ids: BTreeSet<&EmployeeId> = state
            .assignments
            .iter()
            .filter(|entry| &entry.assignment.cycle_id == cycle_id)
            .map(|entry| &entry.assignment.evaluatee_id)
            .collect();
        Ok(ids.into_iter().cloned().collect())
    }

    fn evaluated_employees(&self, cycle_id: &CycleId) -> Result<Vec<EmployeeId>, RepositoryError> {
        let state = self.state();
        let ids: BTreeSet<&EmployeeId> = state
            .assignments
            .iter()
            .filter(|entry| {
                &entry.assignment.cycle_id == cycle_id && entry.assignment.is_completed()
            })
            .map(|entry| &entry.assignment.evaluatee_id)
            .collect();
        Ok(ids.into_iter().cloned().collect())
    }
}

impl RatingConfigStore for InMemoryRatingStore {
    fn cycle_weights(
        &self,
        tenant_id: &TenantId,
        cycle_id: &CycleId,
    ) -> Result<Option<EvaluatorWeights>, RepositoryError> {
        Ok(self
            .state()
            .cycle_weights
            .get(&(tenant_id.clone(), cycle_id.clone()))
            .cloned())
    }

    fn tenant_weights(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Option<EvaluatorWeights>, RepositoryError> {
        Ok(self.state().tenant_weights.get(tenant_id).cloned())
    }

    fn level_config(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Option<PerformanceLevelConfig>, RepositoryError> {
        Ok(self.state().levels.get(tenant_id).cloned())
    }

    fn save_cycle_weights(
        &self,
        tenant_id: &TenantId,
        cycle_id: &CycleId,
        weights: EvaluatorWeights,
    ) -> Result<(), RepositoryError> {
        self.state()
            .cycle_weights
            .insert((tenant_id.clone(), cycle_id.clone()), weights);
        Ok(())
    }

    fn save_tenant_weights(
        &self,
        tenant_id: &TenantId,
        weights: EvaluatorWeights,
    ) -> Result<(), RepositoryError> {
        self.state().tenant_weights.insert(tenant_id.clone(), weights);
        Ok(())
    }

    fn save_level_config(
        &self,
        tenant_id: &TenantId,
        config: PerformanceLevelConfig,
    ) -> Result<(), RepositoryError> {
        self.state().levels.insert(tenant_id.clone(), config);
        Ok(())
    }
}

impl RatingRepository for InMemoryRatingStore {
    fn upsert_calculated(
        &self,
        calculated: CalculatedRating,
    ) -> Result<PerformanceRating, RepositoryError> {
        let mut state = self.state();
        let key = (calculated.cycle_id.clone(), calculated.evaluatee_id.clone());

        if let Some(id) = state.by_evaluatee.get(&key).cloned() {
            let rating = state.ratings.get_mut(&id).ok_or(RepositoryError::NotFound)?;
            rating.apply_calculated(calculated);
            return Ok(rating.clone());
        }

        let rating = PerformanceRating::from_calculated(calculated);
        state.by_evaluatee.insert(key, rating.id.clone());
        state.ratings.insert(rating.id.clone(), rating.clone());
        Ok(rating)
    }

    fn fetch(&self, id: &RatingId) -> Result<Option<PerformanceRating>, RepositoryError> {
        Ok(self.state().ratings.get(id).cloned())
    }

    fn fetch_for_evaluatees(
        &self,
        cycle_id: &CycleId,
        evaluatee_ids: &[EmployeeId],
    ) -> Result<Vec<PerformanceRating>, RepositoryError> {
        let state = self.state();
        Ok(evaluatee_ids
            .iter()
            .filter_map(|evaluatee_id| {
                state
                    .by_evaluatee
                    .get(&(cycle_id.clone(), evaluatee_id.clone()))
            })
            .filter_map(|id| state.ratings.get(id))
            .cloned()
            .collect())
    }

    fn save_calibration(
        &self,
        id: &RatingId,
        calibration: CalibrationState,
    ) -> Result<PerformanceRating, RepositoryError> {
        self.update_rating(id, |rating| rating.calibration = calibration)
    }

    fn save_potential(
        &self,
        id: &RatingId,
        potential: PotentialAssessment,
    ) -> Result<PerformanceRating, RepositoryError> {
        self.update_rating(id, |rating| rating.potential = Some(potential))
    }

    fn query(&self, query: &RatingQuery) -> Result<Vec<PerformanceRating>, RepositoryError> {
        let state = self.state();
        let mut matching: Vec<&PerformanceRating> = state
            .ratings
            .values()
            .filter(|rating| rating.cycle_id == query.cycle_id)
            .filter(|rating| query.filters.matches(&RowFacts::from_rating(rating)))
            .collect();

        matching.sort_by(|a, b| {
            query
                .sort
                .compare(&RowFacts::from_rating(a), &RowFacts::from_rating(b))
        });

        Ok(matching
            .into_iter()
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    fn count(&self, cycle_id: &CycleId, filters: &RatingFilters) -> Result<usize, RepositoryError> {
        Ok(self
            .state()
            .ratings
            .values()
            .filter(|rating| &rating.cycle_id == cycle_id)
            .filter(|rating| filters.matches(&RowFacts::from_rating(rating)))
            .count())
    }
}

/// Audit sink that keeps entries in memory.
#[derive(Default, Clone)]
pub struct InMemoryAuditLog {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl InMemoryAuditLog {
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().expect("audit mutex poisoned").clone()
    }
}

impl AuditSink for InMemoryAuditLog {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        self.entries
            .lock()
            .expect("audit mutex poisoned")
            .push(entry);
        Ok(())
    }
}
