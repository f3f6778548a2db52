use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::aggregation::{
    aggregate, AggregatedResponses, AggregationError, BlindSpot, CompetencyScore,
};
use super::batch::settle_in_chunks;
use super::calibration::{AdjustmentType, CalibrationError, CalibrationRequest, CalibrationState};
use super::domain::{
    ActorId, CalculatedRating, CalibrationSessionId, ComponentScores, Completeness, CycleId,
    DepartmentId, EmployeeId, MeasurementCycle, PerformanceRating, PotentialAssessment,
    RaterType, RatingId, TenantId,
};
use super::levels::{LevelConfigError, PerformanceBand, PerformanceLevel, PerformanceLevelConfig};
use super::listing::{LiveScore, RatingFilters};
use super::nine_box::NineBoxGrid;
use super::potential::{PotentialInput, PotentialInputError};
use super::repository::{
    AuditAction, AuditEntry, AuditError, AuditSink, RatingQuery, RatingStore, RepositoryError,
};
use super::scoring::weighted_score;
use super::weights::{ConfigLayer, EvaluatorWeights, ResolvedRatingConfig, WeightConfigError};
use crate::config::EngineSettings;

/// Actor recorded on audit entries written by rating generation.
pub const SYSTEM_ACTOR: &str = "system:rating-engine";

static RATING_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_rating_id() -> RatingId {
    let id = RATING_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    RatingId(format!("rating-{id:06}"))
}

/// Orchestrates aggregation, scoring, calibration and grid placement over a store.
pub struct RatingService<S, A> {
    store: Arc<S>,
    audit: Arc<A>,
    settings: EngineSettings,
}

impl<S, A> Clone for RatingService<S, A> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            audit: Arc::clone(&self.audit),
            settings: self.settings.clone(),
        }
    }
}

/// Score computed from raw responses, before anything is written.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingComputation {
    pub aggregated: AggregatedResponses,
    pub calculated_score: f64,
    pub calculated_level: PerformanceLevel,
}

impl RatingComputation {
    pub fn live_score(self) -> LiveScore {
        LiveScore {
            calculated_score: self.calculated_score,
            calculated_level: self.calculated_level,
            components: self.aggregated.components,
            completeness: self.aggregated.completeness,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedRating {
    pub rating: PerformanceRating,
    pub classification: PerformanceLevel,
    pub weights_source: ConfigLayer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkFailure {
    pub evaluatee_id: EmployeeId,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkGenerationSummary {
    pub success_count: usize,
    pub failed_count: usize,
    pub errors: Vec<BulkFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompetencyBreakdown {
    pub evaluatee_id: EmployeeId,
    pub components: ComponentScores,
    pub completeness: Completeness,
    pub competencies: Vec<CompetencyScore>,
    pub blind_spots: Vec<BlindSpot>,
}

/// Ratings calibrated together in one session, with adjustment counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationSessionSummary {
    pub session_id: CalibrationSessionId,
    pub cycle_id: CycleId,
    pub upgrades: usize,
    pub downgrades: usize,
    pub unchanged: usize,
    pub ratings: Vec<PerformanceRating>,
}

impl<S, A> RatingService<S, A>
where
    S: RatingStore + 'static,
    A: AuditSink + 'static,
{
    pub fn new(store: Arc<S>, audit: Arc<A>, settings: EngineSettings) -> Self {
        Self {
            store,
            audit,
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    pub(crate) fn require_cycle(
        &self,
        tenant_id: &TenantId,
        cycle_id: &CycleId,
    ) -> Result<MeasurementCycle, RatingServiceError> {
        self.store
            .cycle(tenant_id, cycle_id)?
            .ok_or_else(|| RatingServiceError::CycleNotFound(cycle_id.clone()))
    }

    fn require_rating(
        &self,
        tenant_id: &TenantId,
        rating_id: &RatingId,
    ) -> Result<PerformanceRating, RatingServiceError> {
        self.store
            .fetch(rating_id)?
            .filter(|rating| &rating.tenant_id == tenant_id)
            .ok_or_else(|| RatingServiceError::RatingNotFound(rating_id.clone()))
    }

    /// Weights and level scale in force for the tenant (and cycle, when given).
    pub fn resolve_config(
        &self,
        tenant_id: &TenantId,
        cycle_id: Option<&CycleId>,
    ) -> Result<ResolvedRatingConfig, RatingServiceError> {
        let cycle_weights = match cycle_id {
            Some(cycle_id) => self.store.cycle_weights(tenant_id, cycle_id)?,
            None => None,
        };
        let tenant_weights = self.store.tenant_weights(tenant_id)?;
        let levels = self.store.level_config(tenant_id)?;

        let config = ResolvedRatingConfig::from_sources(cycle_weights, tenant_weights, levels);
        debug!(
            tenant_id = %tenant_id,
            weights_source = ?config.weights_source,
            levels_source = ?config.levels_source,
            "resolved rating configuration"
        );
        Ok(config)
    }

    /// Aggregate and score one evaluatee without writing anything.
    pub fn compute(
        &self,
        cycle: &MeasurementCycle,
        evaluatee_id: &EmployeeId,
        config: &ResolvedRatingConfig,
    ) -> Result<RatingComputation, RatingServiceError> {
        let assignments = self.store.assignments_for(&cycle.id, evaluatee_id)?;
        let aggregated = aggregate(evaluatee_id, &assignments, &cycle.competencies)?;
        let calculated_score = weighted_score(&aggregated.components, &config.weights);
        let calculated_level = config.levels.classify(calculated_score);

        Ok(RatingComputation {
            aggregated,
            calculated_score,
            calculated_level,
        })
    }

    /// Compute and persist the rating of one evaluatee.
    pub fn generate_rating(
        &self,
        tenant_id: &TenantId,
        cycle_id: &CycleId,
        evaluatee_id: &EmployeeId,
    ) -> Result<GeneratedRating, RatingServiceError> {
        let cycle = self.require_cycle(tenant_id, cycle_id)?;
        let config = self.resolve_config(tenant_id, Some(cycle_id))?;
        let rating = self.generate_with(&cycle, evaluatee_id, &config)?;

        Ok(GeneratedRating {
            classification: rating.calculated_level.clone(),
            weights_source: config.weights_source,
            rating,
        })
    }

    fn generate_with(
        &self,
        cycle: &MeasurementCycle,
        evaluatee_id: &EmployeeId,
        config: &ResolvedRatingConfig,
    ) -> Result<PerformanceRating, RatingServiceError> {
        let employee = self
            .store
            .employees(&cycle.tenant_id, std::slice::from_ref(evaluatee_id))?
            .into_iter()
            .next()
            .ok_or_else(|| RatingServiceError::EmployeeNotFound(evaluatee_id.clone()))?;

        let computation = self.compute(cycle, evaluatee_id, config)?;

        let stored = self.store.upsert_calculated(CalculatedRating {
            id: next_rating_id(),
            tenant_id: cycle.tenant_id.clone(),
            cycle_id: cycle.id.clone(),
            evaluatee_id: evaluatee_id.clone(),
            evaluatee_name: employee.display_name,
            department_id: employee.department_id,
            calculated_score: computation.calculated_score,
            calculated_level: computation.calculated_level,
            components: computation.aggregated.components,
            completeness: computation.aggregated.completeness,
            computed_at: Utc::now(),
        })?;

        self.audit.record(
            AuditEntry::for_rating(
                AuditAction::RatingGenerated,
                &stored,
                ActorId::from(SYSTEM_ACTOR),
                stored.updated_at,
            )
            .with_detail("calculated_score", stored.calculated_score)
            .with_detail("calculated_level", &stored.calculated_level.level)
            .with_detail("weights_source", format!("{:?}", config.weights_source)),
        )?;

        info!(
            cycle_id = %cycle.id,
            evaluatee_id = %evaluatee_id,
            rating_id = %stored.id,
            score = stored.calculated_score,
            level = %stored.calculated_level.level,
            "rating generated"
        );
        Ok(stored)
    }

    /// Generate ratings for every evaluatee of the cycle in bounded concurrent chunks.
    /// Per-person failures are collected; only setup faults fail the whole call.
    pub async fn generate_ratings_for_cycle(
        &self,
        tenant_id: &TenantId,
        cycle_id: &CycleId,
    ) -> Result<BulkGenerationSummary, RatingServiceError> {
        let cycle = Arc::new(self.require_cycle(tenant_id, cycle_id)?);
        let config = Arc::new(self.resolve_config(tenant_id, Some(cycle_id))?);
        let evaluatees = self.store.evaluatees(cycle_id)?;
        let chunk_size = self.settings.bulk_chunk_size;

        info!(
            cycle_id = %cycle_id,
            evaluatees = evaluatees.len(),
            chunk_size,
            "bulk rating generation started"
        );

        let service = self.clone();
        let settled = settle_in_chunks(evaluatees, chunk_size, move |evaluatee_id| {
            service.generate_with(&cycle, &evaluatee_id, &config)
        })
        .await;

        let mut summary = BulkGenerationSummary::default();
        for entry in settled {
            match entry.outcome {
                Ok(_) => summary.success_count += 1,
                Err(failure) => {
                    let message = failure.to_string();
                    warn!(
                        cycle_id = %cycle_id,
                        evaluatee_id = %entry.key,
                        error = %message,
                        "rating generation failed"
                    );
                    summary.failed_count += 1;
                    summary.errors.push(BulkFailure {
                        evaluatee_id: entry.key,
                        message,
                    });
                }
            }
        }

        info!(
            cycle_id = %cycle_id,
            success_count = summary.success_count,
            failed_count = summary.failed_count,
            "bulk rating generation finished"
        );
        Ok(summary)
    }

    /// Apply a human override. Calculated fields stay untouched.
    pub fn calibrate_rating(
        &self,
        tenant_id: &TenantId,
        rating_id: &RatingId,
        request: CalibrationRequest,
        actor: ActorId,
    ) -> Result<PerformanceRating, RatingServiceError> {
        request.validate()?;
        let rating = self.require_rating(tenant_id, rating_id)?;
        let config = self.resolve_config(tenant_id, Some(&rating.cycle_id))?;

        let final_level = config.levels.classify(request.final_score);
        let at = Utc::now();
        let state = CalibrationState::calibrated(
            request,
            rating.calculated_score,
            final_level,
            actor.clone(),
            at,
        );
        let adjustment = state.adjustment_type;

        let mut projected = rating;
        projected.calibration = state.clone();
        projected.reposition();

        let mut entry =
            AuditEntry::for_rating(AuditAction::RatingCalibrated, &projected, actor, at)
                .with_detail("calculated_score", projected.calculated_score)
                .with_detail("final_score", projected.effective_score());
        if let Some(adjustment) = adjustment {
            entry = entry.with_detail("adjustment_type", format!("{adjustment:?}"));
        }
        if let Some(reason) = &projected.calibration.reason {
            entry = entry.with_detail("reason", reason);
        }
        if let Some(session_id) = &projected.calibration.session_id {
            entry = entry.with_detail("session_id", session_id);
        }
        self.audit.record(entry)?;

        let stored = self.store.save_calibration(rating_id, state)?;

        info!(
            rating_id = %rating_id,
            final_score = stored.effective_score(),
            adjustment = ?adjustment,
            "rating calibrated"
        );
        Ok(stored)
    }

    /// Drop the override; the effective score falls back to the calculated one.
    pub fn revert_calibration(
        &self,
        tenant_id: &TenantId,
        rating_id: &RatingId,
        actor: ActorId,
    ) -> Result<PerformanceRating, RatingServiceError> {
        let rating = self.require_rating(tenant_id, rating_id)?;
        let at = Utc::now();

        let reverted = CalibrationState::reverted(&actor, at);

        let mut entry =
            AuditEntry::for_rating(AuditAction::CalibrationReverted, &rating, actor, at);
        if let Some(previous) = rating.final_score() {
            entry = entry.with_detail("previous_final_score", previous);
        }
        self.audit.record(entry)?;

        let stored = self.store.save_calibration(rating_id, reverted)?;

        info!(rating_id = %rating_id, "calibration reverted");
        Ok(stored)
    }

    /// Attach a potential assessment and move the rating on the grid.
    pub fn rate_potential(
        &self,
        tenant_id: &TenantId,
        rating_id: &RatingId,
        input: &PotentialInput,
        notes: Option<String>,
        actor: ActorId,
    ) -> Result<PerformanceRating, RatingServiceError> {
        let resolved = input.resolve()?;
        let rating = self.require_rating(tenant_id, rating_id)?;
        let at = Utc::now();
        let assessment = PotentialAssessment {
            score: resolved.score,
            factors: resolved.factors,
            rated_by: actor.clone(),
            rated_at: at,
            notes: notes.filter(|notes| !notes.trim().is_empty()),
        };

        let mut projected = rating;
        projected.potential = Some(assessment.clone());
        projected.reposition();

        let mut entry = AuditEntry::for_rating(AuditAction::PotentialRated, &projected, actor, at)
            .with_detail("potential_score", resolved.score);
        if let Some(position) = projected.nine_box {
            entry = entry.with_detail("nine_box", position.number());
        }
        self.audit.record(entry)?;

        let stored = self.store.save_potential(rating_id, assessment)?;

        info!(
            rating_id = %rating_id,
            potential_score = resolved.score,
            nine_box = ?stored.nine_box,
            "potential rated"
        );
        Ok(stored)
    }

    /// Save evaluator weights for the whole tenant or for one cycle.
    pub fn configure_weights(
        &self,
        tenant_id: &TenantId,
        cycle_id: Option<&CycleId>,
        weights: BTreeMap<RaterType, f64>,
    ) -> Result<EvaluatorWeights, RatingServiceError> {
        let weights = EvaluatorWeights::new(weights)?;
        match cycle_id {
            Some(cycle_id) => {
                self.require_cycle(tenant_id, cycle_id)?;
                self.store
                    .save_cycle_weights(tenant_id, cycle_id, weights.clone())?;
            }
            None => self.store.save_tenant_weights(tenant_id, weights.clone())?,
        }
        info!(
            tenant_id = %tenant_id,
            cycle_id = ?cycle_id.map(CycleId::as_str),
            "evaluator weights saved"
        );
        Ok(weights)
    }

    pub fn configure_levels(
        &self,
        tenant_id: &TenantId,
        bands: Vec<PerformanceBand>,
    ) -> Result<PerformanceLevelConfig, RatingServiceError> {
        let config = PerformanceLevelConfig::new(bands)?;
        self.store.save_level_config(tenant_id, config.clone())?;
        info!(tenant_id = %tenant_id, bands = config.bands().len(), "performance levels saved");
        Ok(config)
    }

    /// Per-competency scores and self-perception gaps for one evaluatee.
    pub fn competency_breakdown(
        &self,
        tenant_id: &TenantId,
        cycle_id: &CycleId,
        evaluatee_id: &EmployeeId,
    ) -> Result<CompetencyBreakdown, RatingServiceError> {
        let cycle = self.require_cycle(tenant_id, cycle_id)?;
        let assignments = self.store.assignments_for(cycle_id, evaluatee_id)?;
        if assignments.is_empty() {
            return Err(RatingServiceError::EmployeeNotFound(evaluatee_id.clone()));
        }
        let aggregated = aggregate(evaluatee_id, &assignments, &cycle.competencies)?;
        let blind_spots = aggregated.blind_spots(self.settings.blind_spot_threshold);

        Ok(CompetencyBreakdown {
            evaluatee_id: aggregated.evaluatee_id,
            components: aggregated.components,
            completeness: aggregated.completeness,
            competencies: aggregated.competencies,
            blind_spots,
        })
    }

    pub fn calibration_session(
        &self,
        tenant_id: &TenantId,
        cycle_id: &CycleId,
        session_id: &CalibrationSessionId,
    ) -> Result<CalibrationSessionSummary, RatingServiceError> {
        self.require_cycle(tenant_id, cycle_id)?;
        let ratings: Vec<PerformanceRating> = self
            .store
            .query(&RatingQuery::all(cycle_id.clone()))?
            .into_iter()
            .filter(|rating| {
                rating.is_calibrated() && rating.calibration.session_id.as_ref() == Some(session_id)
            })
            .collect();

        let adjustments = || ratings.iter().filter_map(|rating| rating.calibration.adjustment_type);
        Ok(CalibrationSessionSummary {
            session_id: session_id.clone(),
            cycle_id: cycle_id.clone(),
            upgrades: adjustments().filter(|kind| kind.is_upgrade()).count(),
            downgrades: adjustments().filter(|kind| kind.is_downgrade()).count(),
            unchanged: adjustments()
                .filter(|kind| *kind == AdjustmentType::Unchanged)
                .count(),
            ratings,
        })
    }

    /// Persisted ratings grouped into the nine grid cells.
    pub fn nine_box_data(
        &self,
        tenant_id: &TenantId,
        cycle_id: &CycleId,
        department_ids: Option<Vec<DepartmentId>>,
    ) -> Result<NineBoxGrid, RatingServiceError> {
        self.require_cycle(tenant_id, cycle_id)?;
        let query = RatingQuery {
            filters: RatingFilters {
                department_ids,
                ..RatingFilters::default()
            },
            ..RatingQuery::all(cycle_id.clone())
        };
        let ratings = self.store.query(&query)?;
        Ok(NineBoxGrid::from_ratings(&ratings))
    }
}

/// Error raised by the rating service.
#[derive(Debug, thiserror::Error)]
pub enum RatingServiceError {
    #[error("cycle {0} not found")]
    CycleNotFound(CycleId),
    #[error("employee {0} not found")]
    EmployeeNotFound(EmployeeId),
    #[error("rating {0} not found")]
    RatingNotFound(RatingId),
    #[error(transparent)]
    Aggregation(#[from] AggregationError),
    #[error(transparent)]
    Potential(#[from] PotentialInputError),
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
    #[error(transparent)]
    Weights(#[from] WeightConfigError),
    #[error(transparent)]
    Levels(#[from] LevelConfigError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Audit(#[from] AuditError),
}

impl RatingServiceError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RatingServiceError::CycleNotFound(_)
                | RatingServiceError::EmployeeNotFound(_)
                | RatingServiceError::RatingNotFound(_)
                | RatingServiceError::Repository(RepositoryError::NotFound)
        )
    }

    /// Input rejected before any write.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            RatingServiceError::Aggregation(_)
                | RatingServiceError::Potential(_)
                | RatingServiceError::Calibration(_)
                | RatingServiceError::Weights(_)
                | RatingServiceError::Levels(_)
        )
    }
}
