use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{ActorId, CalibrationSessionId, SCORE_MAX, SCORE_MIN};
use super::levels::PerformanceLevel;
use super::scoring::round2;

/// Deltas smaller than this leave the rating unchanged.
const UNCHANGED_TOLERANCE: f64 = 0.01;
/// Deltas at or above this are major adjustments.
const MAJOR_ADJUSTMENT: f64 = 1.0;

/// Direction and magnitude of a calibration relative to the computed score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdjustmentType {
    MajorUpgrade,
    MinorUpgrade,
    Unchanged,
    MinorDowngrade,
    MajorDowngrade,
}

impl AdjustmentType {
    pub fn classify(calculated: f64, final_score: f64) -> Self {
        let delta = round2(final_score - calculated);
        if delta.abs() < UNCHANGED_TOLERANCE {
            AdjustmentType::Unchanged
        } else if delta >= MAJOR_ADJUSTMENT {
            AdjustmentType::MajorUpgrade
        } else if delta > 0.0 {
            AdjustmentType::MinorUpgrade
        } else if delta <= -MAJOR_ADJUSTMENT {
            AdjustmentType::MajorDowngrade
        } else {
            AdjustmentType::MinorDowngrade
        }
    }

    pub const fn is_upgrade(self) -> bool {
        matches!(
            self,
            AdjustmentType::MajorUpgrade | AdjustmentType::MinorUpgrade
        )
    }

    pub const fn is_downgrade(self) -> bool {
        matches!(
            self,
            AdjustmentType::MajorDowngrade | AdjustmentType::MinorDowngrade
        )
    }
}

/// Human override requested by a calibrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRequest {
    pub final_score: f64,
    pub reason: String,
    #[serde(default)]
    pub session_id: Option<CalibrationSessionId>,
}

impl CalibrationRequest {
    pub fn new(final_score: f64, reason: impl Into<String>) -> Self {
        Self {
            final_score,
            reason: reason.into(),
            session_id: None,
        }
    }

    pub fn in_session(mut self, session_id: CalibrationSessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn validate(&self) -> Result<(), CalibrationError> {
        if !self.final_score.is_finite() || !(SCORE_MIN..=SCORE_MAX).contains(&self.final_score) {
            return Err(CalibrationError::ScoreOutOfRange(self.final_score));
        }
        if self.reason.trim().is_empty() {
            return Err(CalibrationError::MissingReason);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalibrationError {
    #[error("final score must be between 0 and 5 (got {0})")]
    ScoreOutOfRange(f64),
    #[error("calibration requires a reason")]
    MissingReason,
}

/// Calibration audit fields. Only the calibration manager writes these.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationState {
    pub calibrated: bool,
    pub final_score: Option<f64>,
    pub final_level: Option<PerformanceLevel>,
    pub calibrated_by: Option<ActorId>,
    pub calibrated_at: Option<DateTime<Utc>>,
    pub session_id: Option<CalibrationSessionId>,
    pub reason: Option<String>,
    pub adjustment_type: Option<AdjustmentType>,
}

impl CalibrationState {
    pub fn calibrated(
        request: CalibrationRequest,
        calculated_score: f64,
        final_level: PerformanceLevel,
        actor: ActorId,
        at: DateTime<Utc>,
    ) -> Self {
        let final_score = round2(request.final_score);
        Self {
            calibrated: true,
            final_score: Some(final_score),
            final_level: Some(final_level),
            calibrated_by: Some(actor),
            calibrated_at: Some(at),
            session_id: request.session_id,
            reason: Some(request.reason.trim().to_string()),
            adjustment_type: Some(AdjustmentType::classify(calculated_score, final_score)),
        }
    }

    /// Uncalibrated state that still records who reverted it.
    pub fn reverted(actor: &ActorId, at: DateTime<Utc>) -> Self {
        Self {
            reason: Some(format!(
                "calibration reverted by {actor} at {}",
                at.to_rfc3339()
            )),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_direction_and_magnitude() {
        assert_eq!(AdjustmentType::classify(3.5, 4.2), AdjustmentType::MinorUpgrade);
        assert_eq!(AdjustmentType::classify(3.0, 4.0), AdjustmentType::MajorUpgrade);
        assert_eq!(AdjustmentType::classify(3.5, 3.5), AdjustmentType::Unchanged);
        assert_eq!(AdjustmentType::classify(3.5, 3.504), AdjustmentType::Unchanged);
        assert_eq!(AdjustmentType::classify(4.1, 3.6), AdjustmentType::MinorDowngrade);
        assert_eq!(AdjustmentType::classify(4.5, 2.0), AdjustmentType::MajorDowngrade);
        assert!(AdjustmentType::MinorUpgrade.is_upgrade());
        assert!(AdjustmentType::MajorDowngrade.is_downgrade());
        assert!(!AdjustmentType::Unchanged.is_upgrade());
    }

    #[test]
    fn validates_request() {
        assert!(CalibrationRequest::new(4.2, "strong Q4 recovery").validate().is_ok());
        assert_eq!(
            CalibrationRequest::new(5.2, "too high").validate(),
            Err(CalibrationError::ScoreOutOfRange(5.2))
        );
        assert_eq!(
            CalibrationRequest::new(3.0, "   ").validate(),
            Err(CalibrationError::MissingReason)
        );
    }

    #[test]
    fn reverted_state_keeps_only_the_trace() {
        let at = DateTime::parse_from_rfc3339("2025-01-15T10:00:00Z")
            .expect("valid timestamp")
            .with_timezone(&Utc);
        let state = CalibrationState::reverted(&ActorId::from("hr-lead"), at);

        assert!(!state.calibrated);
        assert!(state.final_score.is_none());
        assert!(state.final_level.is_none());
        assert!(state.adjustment_type.is_none());
        assert!(state
            .reason
            .as_deref()
            .is_some_and(|reason| reason.contains("hr-lead")));
    }
}
