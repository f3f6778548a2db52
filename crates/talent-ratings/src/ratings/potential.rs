use serde::{Deserialize, Serialize};

use super::domain::{SCORE_MAX, SCORE_MIN};
use super::scoring::round2;

pub const FACTOR_MIN: u8 = 1;
pub const FACTOR_MAX: u8 = 3;

const ASPIRATION_WEIGHT: f64 = 0.3;
const ABILITY_WEIGHT: f64 = 0.4;
const ENGAGEMENT_WEIGHT: f64 = 0.3;

/// Aspiration, Ability and Engagement ratings on the 1-3 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PotentialFactors {
    pub aspiration: u8,
    pub ability: u8,
    pub engagement: u8,
}

impl PotentialFactors {
    pub fn new(aspiration: u8, ability: u8, engagement: u8) -> Result<Self, PotentialInputError> {
        for (factor, value) in [
            ("aspiration", aspiration),
            ("ability", ability),
            ("engagement", engagement),
        ] {
            if !(FACTOR_MIN..=FACTOR_MAX).contains(&value) {
                return Err(PotentialInputError::FactorOutOfRange { factor, value });
            }
        }

        Ok(Self {
            aspiration,
            ability,
            engagement,
        })
    }

    /// Weighted mean of the factors mapped linearly from 1-3 onto the 1-5 performance scale.
    pub fn score(&self) -> f64 {
        let weighted = ASPIRATION_WEIGHT * f64::from(self.aspiration)
            + ABILITY_WEIGHT * f64::from(self.ability)
            + ENGAGEMENT_WEIGHT * f64::from(self.engagement);
        let span = f64::from(FACTOR_MAX - FACTOR_MIN);
        round2(1.0 + (weighted - f64::from(FACTOR_MIN)) * 4.0 / span)
    }
}

/// Caller supplied potential: either a direct score or the three factors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PotentialInput {
    #[serde(default)]
    pub potential_score: Option<f64>,
    #[serde(default)]
    pub aspiration: Option<u8>,
    #[serde(default)]
    pub ability: Option<u8>,
    #[serde(default)]
    pub engagement: Option<u8>,
}

/// Validated potential ready to be stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedPotential {
    pub score: f64,
    pub factors: Option<PotentialFactors>,
}

impl PotentialInput {
    pub fn from_factors(aspiration: u8, ability: u8, engagement: u8) -> Self {
        Self {
            potential_score: None,
            aspiration: Some(aspiration),
            ability: Some(ability),
            engagement: Some(engagement),
        }
    }

    pub fn from_score(score: f64) -> Self {
        Self {
            potential_score: Some(score),
            ..Self::default()
        }
    }

    /// Complete factor sets take precedence so the score stays reproducible from storage.
    pub fn resolve(&self) -> Result<ResolvedPotential, PotentialInputError> {
        if let (Some(aspiration), Some(ability), Some(engagement)) =
            (self.aspiration, self.ability, self.engagement)
        {
            let factors = PotentialFactors::new(aspiration, ability, engagement)?;
            return Ok(ResolvedPotential {
                score: factors.score(),
                factors: Some(factors),
            });
        }

        match self.potential_score {
            Some(score) if score.is_finite() && (SCORE_MIN..=SCORE_MAX).contains(&score) => {
                Ok(ResolvedPotential {
                    score: round2(score),
                    factors: None,
                })
            }
            Some(score) => Err(PotentialInputError::ScoreOutOfRange(score)),
            None => Err(PotentialInputError::Missing),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PotentialInputError {
    #[error("potential requires either a direct score or all three factors")]
    Missing,
    #[error("{factor} must be between 1 and 3 (got {value})")]
    FactorOutOfRange { factor: &'static str, value: u8 },
    #[error("potential score must be between 0 and 5 (got {0})")]
    ScoreOutOfRange(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factors(aspiration: u8, ability: u8, engagement: u8) -> PotentialFactors {
        PotentialFactors::new(aspiration, ability, engagement).expect("valid factors")
    }

    #[test]
    fn extremes_span_the_performance_scale() {
        assert_eq!(factors(1, 1, 1).score(), 1.0);
        assert_eq!(factors(2, 2, 2).score(), 3.0);
        assert_eq!(factors(3, 3, 3).score(), 5.0);
    }

    #[test]
    fn ability_carries_the_most_weight() {
        assert_eq!(factors(1, 3, 1).score(), 2.6);
        assert_eq!(factors(3, 1, 1).score(), 2.2);
    }

    #[test]
    fn score_is_monotonic_in_every_factor() {
        let range = FACTOR_MIN..=FACTOR_MAX;
        for aspiration in range.clone() {
            for ability in range.clone() {
                for engagement in range.clone() {
                    let base = factors(aspiration, ability, engagement).score();
                    if aspiration < FACTOR_MAX {
                        assert!(factors(aspiration + 1, ability, engagement).score() >= base);
                    }
                    if ability < FACTOR_MAX {
                        assert!(factors(aspiration, ability + 1, engagement).score() >= base);
                    }
                    if engagement < FACTOR_MAX {
                        assert!(factors(aspiration, ability, engagement + 1).score() >= base);
                    }
                }
            }
        }
    }

    #[test]
    fn factors_take_precedence_over_direct_score() {
        let input = PotentialInput {
            potential_score: Some(1.0),
            ..PotentialInput::from_factors(3, 3, 3)
        };
        let resolved = input.resolve().expect("resolves");
        assert_eq!(resolved.score, 5.0);
        assert_eq!(resolved.factors, Some(factors(3, 3, 3)));
    }

    #[test]
    fn direct_score_is_accepted_without_factors() {
        let resolved = PotentialInput::from_score(3.456).resolve().expect("resolves");
        assert_eq!(resolved.score, 3.46);
        assert!(resolved.factors.is_none());
    }

    #[test]
    fn rejects_missing_and_out_of_range_input() {
        let partial = PotentialInput {
            aspiration: Some(2),
            ability: Some(2),
            ..PotentialInput::default()
        };
        assert_eq!(partial.resolve(), Err(PotentialInputError::Missing));

        assert!(matches!(
            PotentialInput::from_factors(0, 2, 2).resolve(),
            Err(PotentialInputError::FactorOutOfRange {
                factor: "aspiration",
                ..
            })
        ));
        assert_eq!(
            PotentialInput::from_score(5.5).resolve(),
            Err(PotentialInputError::ScoreOutOfRange(5.5))
        );
    }
}
