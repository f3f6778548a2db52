use serde::{Deserialize, Serialize};

use super::domain::{SCORE_MAX, SCORE_MIN};

const BOUND_TOLERANCE: f64 = 1e-9;

/// Qualitative level a score resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceLevel {
    pub level: String,
    pub label: String,
    pub color: String,
}

impl PerformanceLevel {
    pub fn unclassified() -> Self {
        Self {
            level: "unclassified".to_string(),
            label: "Unclassified".to_string(),
            color: "#9ca3af".to_string(),
        }
    }
}

/// One score band of a tenant scale. Bounds are inclusive; a shared bound belongs to the
/// lower band because lookup returns the first match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceBand {
    pub min: f64,
    pub max: f64,
    pub level: String,
    pub label: String,
    pub color: String,
}

impl PerformanceBand {
    fn new(min: f64, max: f64, level: &str, label: &str, color: &str) -> Self {
        Self {
            min,
            max,
            level: level.to_string(),
            label: label.to_string(),
            color: color.to_string(),
        }
    }

    pub fn contains(&self, score: f64) -> bool {
        score >= self.min && score <= self.max
    }

    pub fn to_level(&self) -> PerformanceLevel {
        PerformanceLevel {
            level: self.level.clone(),
            label: self.label.clone(),
            color: self.color.clone(),
        }
    }
}

/// Validated, contiguous scale covering the full score range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<PerformanceBand>", into = "Vec<PerformanceBand>")]
pub struct PerformanceLevelConfig {
    bands: Vec<PerformanceBand>,
}

impl PerformanceLevelConfig {
    /// Sort and validate a tenant supplied scale.
    pub fn new(mut bands: Vec<PerformanceBand>) -> Result<Self, LevelConfigError> {
        if bands.is_empty() {
            return Err(LevelConfigError::Empty);
        }

        for band in &bands {
            if !band.min.is_finite() || !band.max.is_finite() || band.min >= band.max {
                return Err(LevelConfigError::InvalidBounds {
                    level: band.level.clone(),
                    min: band.min,
                    max: band.max,
                });
            }
            if band.level.trim().is_empty() {
                return Err(LevelConfigError::MissingLevel);
            }
        }

        bands.sort_by(|a, b| a.min.total_cmp(&b.min));

        for (index, band) in bands.iter().enumerate() {
            if bands[..index].iter().any(|other| other.level == band.level) {
                return Err(LevelConfigError::DuplicateLevel(band.level.clone()));
            }
        }

        let first = &bands[0];
        if (first.min - SCORE_MIN).abs() > BOUND_TOLERANCE {
            return Err(LevelConfigError::StartsAbove { min: first.min });
        }

        let last = &bands[bands.len() - 1];
        if (last.max - SCORE_MAX).abs() > BOUND_TOLERANCE {
            return Err(LevelConfigError::EndsBelow { max: last.max });
        }

        for pair in bands.windows(2) {
            let (lower, upper) = (&pair[0], &pair[1]);
            let delta = upper.min - lower.max;
            if delta > BOUND_TOLERANCE {
                return Err(LevelConfigError::Gap {
                    after: lower.level.clone(),
                    before: upper.level.clone(),
                });
            }
            if delta < -BOUND_TOLERANCE {
                return Err(LevelConfigError::Overlap {
                    first: lower.level.clone(),
                    second: upper.level.clone(),
                });
            }
        }

        Ok(Self { bands })
    }

    /// Built-in five band scale used until a tenant customizes it.
    pub fn standard() -> Self {
        Self {
            bands: vec![
                PerformanceBand::new(0.0, 1.5, "unsatisfactory", "Unsatisfactory", "#dc2626"),
                PerformanceBand::new(1.5, 2.5, "needs_improvement", "Needs Improvement", "#f97316"),
                PerformanceBand::new(2.5, 3.5, "meets_expectations", "Meets Expectations", "#eab308"),
                PerformanceBand::new(3.5, 4.5, "exceeds_expectations", "Exceeds Expectations", "#22c55e"),
                PerformanceBand::new(4.5, 5.0, "outstanding", "Outstanding", "#15803d"),
            ],
        }
    }

    pub fn bands(&self) -> &[PerformanceBand] {
        &self.bands
    }

    /// Resolve a score to its band. Scores outside the range are clamped first.
    pub fn classify(&self, score: f64) -> PerformanceLevel {
        let score = if score.is_nan() {
            SCORE_MIN
        } else {
            score.clamp(SCORE_MIN, SCORE_MAX)
        };

        self.bands
            .iter()
            .find(|band| band.contains(score))
            .map(PerformanceBand::to_level)
            .unwrap_or_else(PerformanceLevel::unclassified)
    }
}

impl Default for PerformanceLevelConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl TryFrom<Vec<PerformanceBand>> for PerformanceLevelConfig {
    type Error = LevelConfigError;

    fn try_from(value: Vec<PerformanceBand>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PerformanceLevelConfig> for Vec<PerformanceBand> {
    fn from(value: PerformanceLevelConfig) -> Self {
        value.bands
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LevelConfigError {
    #[error("a performance scale needs at least one band")]
    Empty,
    #[error("band '{level}' has invalid bounds [{min}, {max}]")]
    InvalidBounds { level: String, min: f64, max: f64 },
    #[error("every band needs a level identifier")]
    MissingLevel,
    #[error("level '{0}' appears more than once")]
    DuplicateLevel(String),
    #[error("scale must start at 0, first band starts at {min}")]
    StartsAbove { min: f64 },
    #[error("scale must end at 5, last band ends at {max}")]
    EndsBelow { max: f64 },
    #[error("gap between bands '{after}' and '{before}'")]
    Gap { after: String, before: String },
    #[error("bands '{first}' and '{second}' overlap")]
    Overlap { first: String, second: String },
}
