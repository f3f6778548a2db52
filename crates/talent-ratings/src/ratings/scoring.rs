use super::domain::ComponentScores;
use super::weights::EvaluatorWeights;

/// Round to two decimal places, the precision every stored score uses.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Combine component scores, renormalizing weights over the rater types that have data.
///
/// When every present rater type carries zero weight the plain mean of the present
/// scores is used, so one present score always yields that score.
pub fn weighted_score(components: &ComponentScores, weights: &EvaluatorWeights) -> f64 {
    let present: Vec<(f64, f64)> = components
        .present()
        .map(|(rater_type, score)| (weights.weight(rater_type), score))
        .collect();

    if present.is_empty() {
        return 0.0;
    }

    let total_weight: f64 = present.iter().map(|(weight, _)| weight).sum();
    if total_weight <= 0.0 {
        let scores: Vec<f64> = present.iter().map(|(_, score)| *score).collect();
        return round2(mean(&scores).unwrap_or(0.0));
    }

    let weighted_sum: f64 = present.iter().map(|(weight, score)| weight * score).sum();
    round2(weighted_sum / total_weight)
}
