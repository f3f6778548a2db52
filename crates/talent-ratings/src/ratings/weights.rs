use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::RaterType;
use super::levels::PerformanceLevelConfig;

/// Relative influence of each rater type on the overall score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvaluatorWeights(BTreeMap<RaterType, f64>);

impl EvaluatorWeights {
    /// Validate a weight map; rater types left out carry no influence.
    pub fn new(weights: BTreeMap<RaterType, f64>) -> Result<Self, WeightConfigError> {
        for (rater_type, weight) in &weights {
            if !weight.is_finite() {
                return Err(WeightConfigError::NonFinite(*rater_type));
            }
            if *weight < 0.0 {
                return Err(WeightConfigError::Negative {
                    rater_type: *rater_type,
                    weight: *weight,
                });
            }
        }

        if !weights.values().any(|weight| *weight > 0.0) {
            return Err(WeightConfigError::AllZero);
        }

        Ok(Self(weights))
    }

    /// Hard-coded fallback: every rater type counts equally.
    pub fn standard() -> Self {
        Self(
            RaterType::ordered()
                .into_iter()
                .map(|rater_type| (rater_type, 25.0))
                .collect(),
        )
    }

    pub fn weight(&self, rater_type: RaterType) -> f64 {
        self.0.get(&rater_type).copied().unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Same weights with an explicit zero for every rater type that was left out.
    pub fn complete(mut self) -> Self {
        for rater_type in RaterType::ordered() {
            self.0.entry(rater_type).or_insert(0.0);
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (RaterType, f64)> + '_ {
        self.0.iter().map(|(rater_type, weight)| (*rater_type, *weight))
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WeightConfigError {
    #[error("weight for {} must be a finite number", .0.code())]
    NonFinite(RaterType),
    #[error("weight for {} must not be negative (got {weight})", .rater_type.code())]
    Negative { rater_type: RaterType, weight: f64 },
    #[error("at least one rater type needs a positive weight")]
    AllZero,
}

/// Which layer of the configuration hierarchy supplied a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigLayer {
    Cycle,
    Tenant,
    Default,
}

/// Rating configuration resolved once per operation and passed down immutably.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedRatingConfig {
    pub weights: EvaluatorWeights,
    pub weights_source: ConfigLayer,
    pub levels: PerformanceLevelConfig,
    pub levels_source: ConfigLayer,
}

impl ResolvedRatingConfig {
    /// Walk the optional sources in precedence order; empty maps count as absent.
    pub fn from_sources(
        cycle_weights: Option<EvaluatorWeights>,
        tenant_weights: Option<EvaluatorWeights>,
        tenant_levels: Option<PerformanceLevelConfig>,
    ) -> Self {
        let (weights, weights_source) = [
            (ConfigLayer::Cycle, cycle_weights),
            (ConfigLayer::Tenant, tenant_weights),
        ]
        .into_iter()
        .find_map(|(layer, weights)| {
            weights
                .filter(|weights| !weights.is_empty())
                .map(|weights| (weights.complete(), layer))
        })
        .unwrap_or_else(|| (EvaluatorWeights::standard(), ConfigLayer::Default));

        let (levels, levels_source) = match tenant_levels {
            Some(levels) => (levels, ConfigLayer::Tenant),
            None => (PerformanceLevelConfig::standard(), ConfigLayer::Default),
        };

        Self {
            weights,
            weights_source,
            levels,
            levels_source,
        }
    }
}

impl Default for ResolvedRatingConfig {
    fn default() -> Self {
        Self::from_sources(None, None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights(pairs: &[(RaterType, f64)]) -> EvaluatorWeights {
        EvaluatorWeights::new(pairs.iter().copied().collect()).expect("valid weights")
    }

    #[test]
    fn cycle_override_wins() {
        let cycle = weights(&[(RaterType::ManagerToEmployee, 60.0), (RaterType::Peer, 40.0)]);
        let tenant = weights(&[(RaterType::SelfAssessment, 100.0)]);

        let resolved = ResolvedRatingConfig::from_sources(Some(cycle), Some(tenant), None);

        assert_eq!(resolved.weights_source, ConfigLayer::Cycle);
        assert_eq!(resolved.weights.weight(RaterType::ManagerToEmployee), 60.0);
        assert_eq!(resolved.weights.weight(RaterType::SelfAssessment), 0.0);
        assert_eq!(resolved.weights.iter().count(), 4);
    }

    #[test]
    fn empty_cycle_override_falls_through_to_tenant() {
        let tenant = weights(&[(RaterType::SelfAssessment, 10.0), (RaterType::Peer, 90.0)]);

        let resolved = ResolvedRatingConfig::from_sources(
            Some(EvaluatorWeights::default()),
            Some(tenant),
            None,
        );

        assert_eq!(resolved.weights_source, ConfigLayer::Tenant);
        assert_eq!(resolved.weights.weight(RaterType::Peer), 90.0);
    }

    #[test]
    fn defaults_apply_without_overrides() {
        let resolved = ResolvedRatingConfig::default();

        assert_eq!(resolved.weights_source, ConfigLayer::Default);
        assert_eq!(resolved.levels_source, ConfigLayer::Default);
        for rater_type in RaterType::ordered() {
            assert_eq!(resolved.weights.weight(rater_type), 25.0);
        }
        assert_eq!(resolved.levels, PerformanceLevelConfig::standard());
    }

    #[test]
    fn rejects_negative_and_all_zero_weights() {
        let negative = EvaluatorWeights::new([(RaterType::Peer, -1.0)].into_iter().collect());
        assert!(matches!(negative, Err(WeightConfigError::Negative { .. })));

        let zero = EvaluatorWeights::new([(RaterType::Peer, 0.0)].into_iter().collect());
        assert_eq!(zero, Err(WeightConfigError::AllZero));

        let nan = EvaluatorWeights::new([(RaterType::Peer, f64::NAN)].into_iter().collect());
        assert_eq!(nan, Err(WeightConfigError::NonFinite(RaterType::Peer)));
    }

    #[test]
    fn serializes_with_rater_codes() {
        let json = serde_json::to_value(EvaluatorWeights::standard()).expect("serializes");
        assert_eq!(json["SELF"], 25.0);
        assert_eq!(json["MANAGER_TO_EMPLOYEE"], 25.0);
    }
}
