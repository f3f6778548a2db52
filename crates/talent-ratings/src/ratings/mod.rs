//! Multi-rater ratings: aggregation, weighted scoring, calibration and the
//! nine-box talent grid.

pub mod aggregation;
pub mod batch;
pub mod calibration;
pub mod domain;
pub mod import;
pub mod levels;
pub mod listing;
pub mod memory;
pub mod nine_box;
pub mod potential;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;
pub mod weights;

#[cfg(test)]
mod tests;

pub use aggregation::{AggregatedResponses, AggregationError, BlindSpot, BlindSpotKind};
pub use calibration::{AdjustmentType, CalibrationError, CalibrationRequest, CalibrationState};
pub use domain::{
    ActorId, AssignmentId, AssignmentResponses, AssignmentStatus, CalibrationSessionId,
    Competency, CompetencySnapshot, ComponentScores, Completeness, CycleId, CycleStatus,
    DepartmentId, Employee, EmployeeId, EvaluationAssignment, MeasurementCycle,
    PerformanceRating, PotentialAssessment, RaterType, RatingId, SurveyResponse, TenantId,
};
pub use import::{ResponseCsvImporter, ResponseImport, ResponseImportError};
pub use levels::{LevelConfigError, PerformanceBand, PerformanceLevel, PerformanceLevelConfig};
pub use listing::{
    EvaluationStatus, ListRatingsRequest, ListingStats, PaginationInfo, PotentialStatus,
    RatingFilters, RatingListing, RatingRow, RatingSort, RatingSortField, ReadMode, RowSource,
    SortDirection,
};
pub use memory::{InMemoryAuditLog, InMemoryRatingStore};
pub use nine_box::{Bucket, NineBoxCell, NineBoxGrid, NineBoxPosition};
pub use potential::{PotentialFactors, PotentialInput, PotentialInputError};
pub use repository::{
    AuditAction, AuditEntry, AuditError, AuditSink, CycleDirectory, RatingConfigStore,
    RatingQuery, RatingRepository, RatingStore, RepositoryError, ResponseSource,
};
pub use router::rating_router;
pub use service::{
    BulkFailure, BulkGenerationSummary, CalibrationSessionSummary, CompetencyBreakdown,
    GeneratedRating, RatingService, RatingServiceError,
};
pub use weights::{ConfigLayer, EvaluatorWeights, ResolvedRatingConfig, WeightConfigError};
