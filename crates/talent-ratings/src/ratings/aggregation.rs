//! Reduce raw survey responses into per-rater-type and per-competency averages.
//!
//! Averaging happens in two steps: first within each completed assignment, then across
//! assignments of the same rater type, so a prolific evaluator never outweighs a terse one.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{
    AssignmentId, AssignmentResponses, CompetencySnapshot, ComponentScores, Completeness,
    EmployeeId, RaterType, SCORE_MAX, SCORE_MIN,
};
use super::scoring::{mean, round2};

/// Averages for one competency of the cycle snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetencyScore {
    pub code: String,
    pub name: String,
    pub category: String,
    pub components: ComponentScores,
    pub others_average: Option<f64>,
    /// Self average minus the mean of the non-self averages; positive means self-inflated.
    pub self_vs_others_gap: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResponses {
    pub evaluatee_id: EmployeeId,
    pub components: ComponentScores,
    pub competencies: Vec<CompetencyScore>,
    pub completeness: Completeness,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlindSpotKind {
    /// Self rating well above how others see the person.
    Overestimated,
    /// Self rating well below how others see the person.
    HiddenStrength,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlindSpot {
    pub code: String,
    pub name: String,
    pub gap: f64,
    pub kind: BlindSpotKind,
}

impl AggregatedResponses {
    /// Competencies whose self-vs-others gap meets the threshold, largest gap first.
    pub fn blind_spots(&self, threshold: f64) -> Vec<BlindSpot> {
        let mut spots: Vec<BlindSpot> = self
            .competencies
            .iter()
            .filter_map(|competency| {
                let gap = competency.self_vs_others_gap?;
                if gap.abs() < threshold || gap == 0.0 {
                    return None;
                }
                Some(BlindSpot {
                    code: competency.code.clone(),
                    name: competency.name.clone(),
                    gap,
                    kind: if gap > 0.0 {
                        BlindSpotKind::Overestimated
                    } else {
                        BlindSpotKind::HiddenStrength
                    },
                })
            })
            .collect();
        spots.sort_by(|a, b| b.gap.abs().total_cmp(&a.gap.abs()));
        spots
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AggregationError {
    #[error("assignment {assignment_id} has an invalid score {value} for question {question_id}")]
    InvalidScore {
        assignment_id: AssignmentId,
        question_id: String,
        value: f64,
    },
}

#[derive(Default)]
struct RaterBuckets(BTreeMap<RaterType, Vec<f64>>);

impl RaterBuckets {
    fn push(&mut self, rater_type: RaterType, value: f64) {
        self.0.entry(rater_type).or_default().push(value);
    }

    fn averages(&self) -> ComponentScores {
        let mut components = ComponentScores::default();
        for (rater_type, values) in &self.0 {
            components.set(*rater_type, mean(values).map(round2));
        }
        components
    }
}

/// Aggregate the assignments of one evaluatee. Only completed assignments contribute.
pub fn aggregate(
    evaluatee_id: &EmployeeId,
    assignments: &[AssignmentResponses],
    snapshot: &CompetencySnapshot,
) -> Result<AggregatedResponses, AggregationError> {
    let relevant: Vec<&AssignmentResponses> = assignments
        .iter()
        .filter(|entry| &entry.assignment.evaluatee_id == evaluatee_id)
        .collect();

    let completed: Vec<&AssignmentResponses> = relevant
        .iter()
        .copied()
        .filter(|entry| entry.assignment.is_completed())
        .collect();

    for entry in &completed {
        validate_scores(entry)?;
    }

    let mut overall = RaterBuckets::default();
    for entry in &completed {
        if let Some(average) = assignment_average(entry, |_| true) {
            overall.push(entry.assignment.rater_type, average);
        }
    }

    let competencies = snapshot
        .iter()
        .map(|competency| {
            let mut buckets = RaterBuckets::default();
            for entry in &completed {
                let average = assignment_average(entry, |code| code == Some(&competency.code));
                if let Some(average) = average {
                    buckets.push(entry.assignment.rater_type, average);
                }
            }

            let components = buckets.averages();
            let others: Vec<f64> = components
                .present()
                .filter(|(rater_type, _)| *rater_type != RaterType::SelfAssessment)
                .map(|(_, score)| score)
                .collect();
            let others_average = mean(&others).map(round2);
            let self_vs_others_gap = match (components.self_score, mean(&others)) {
                (Some(own), Some(others)) => Some(round2(own - others)),
                _ => None,
            };

            CompetencyScore {
                code: competency.code.clone(),
                name: competency.name.clone(),
                category: competency.category.clone(),
                components,
                others_average,
                self_vs_others_gap,
            }
        })
        .collect();

    Ok(AggregatedResponses {
        evaluatee_id: evaluatee_id.clone(),
        components: overall.averages(),
        competencies,
        completeness: Completeness {
            total_assignments: relevant.len() as u32,
            completed_assignments: completed.len() as u32,
        },
    })
}

fn validate_scores(entry: &AssignmentResponses) -> Result<(), AggregationError> {
    for response in &entry.responses {
        if let Some(value) = response.normalized_score {
            if !value.is_finite() || !(SCORE_MIN..=SCORE_MAX).contains(&value) {
                return Err(AggregationError::InvalidScore {
                    assignment_id: entry.assignment.id.clone(),
                    question_id: response.question_id.clone(),
                    value,
                });
            }
        }
    }
    Ok(())
}

fn assignment_average<F>(entry: &AssignmentResponses, include: F) -> Option<f64>
where
    F: Fn(Option<&String>) -> bool,
{
    let scores: Vec<f64> = entry
        .responses
        .iter()
        .filter(|response| include(response.competency_code.as_ref()))
        .filter_map(|response| response.normalized_score)
        .collect();
    mean(&scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratings::domain::{
        AssignmentStatus, Competency, CycleId, EvaluationAssignment, SurveyResponse,
    };

    fn snapshot() -> CompetencySnapshot {
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

    fn response(question: &str, competency: &str, score: Option<f64>) -> SurveyResponse {
        SurveyResponse {
            question_id: question.to_string(),
            competency_code: Some(competency.to_string()),
            rating: score,
            normalized_score: score,
            text: None,
        }
    }

    fn assignment(
        id: &str,
        rater_type: RaterType,
        status: AssignmentStatus,
        responses: Vec<SurveyResponse>,
    ) -> AssignmentResponses {
        AssignmentResponses {
            assignment: EvaluationAssignment {
                id: AssignmentId::from(id),
                cycle_id: CycleId::from("cycle-2025"),
                evaluator_id: EmployeeId::from(format!("rater-{id}").as_str()),
                evaluatee_id: EmployeeId::from("emp-1"),
                rater_type,
                status,
            },
            responses,
        }
    }

    #[test]
    fn averages_within_assignments_then_across_rater_type() {
        let assignments = vec![
            assignment(
                "a1",
                RaterType::Peer,
                AssignmentStatus::Completed,
                vec![
                    response("q1", "COMM", Some(5.0)),
                    response("q2", "COMM", Some(5.0)),
                    response("q3", "LEAD", Some(5.0)),
                    response("q4", "LEAD", Some(5.0)),
                ],
            ),
            assignment(
                "a2",
                RaterType::Peer,
                AssignmentStatus::Completed,
                vec![response("q1", "COMM", Some(3.0))],
            ),
        ];

        let aggregated =
            aggregate(&EmployeeId::from("emp-1"), &assignments, &snapshot()).expect("aggregates");

        assert_eq!(aggregated.components.peer_score, Some(4.0));
        assert_eq!(aggregated.components.self_score, None);
        assert_eq!(aggregated.completeness.completed_assignments, 2);
    }

    #[test]
    fn ignores_incomplete_assignments_and_text_answers() {
        let mut text_only = response("q9", "COMM", None);
        text_only.text = Some("great partner".to_string());
        let assignments = vec![
            assignment(
                "a1",
                RaterType::ManagerToEmployee,
                AssignmentStatus::Completed,
                vec![response("q1", "COMM", Some(3.0)), text_only],
            ),
            assignment(
                "a2",
                RaterType::ManagerToEmployee,
                AssignmentStatus::InProgress,
                vec![response("q1", "COMM", Some(1.0))],
            ),
        ];

        let aggregated =
            aggregate(&EmployeeId::from("emp-1"), &assignments, &snapshot()).expect("aggregates");

        assert_eq!(aggregated.components.manager_score, Some(3.0));
        assert_eq!(aggregated.completeness.total_assignments, 2);
        assert_eq!(aggregated.completeness.completed_assignments, 1);
    }

    #[test]
    fn no_completed_assignments_yields_empty_components() {
        let assignments = vec![assignment(
            "a1",
            RaterType::Peer,
            AssignmentStatus::Pending,
            Vec::new(),
        )];

        let aggregated =
            aggregate(&EmployeeId::from("emp-1"), &assignments, &snapshot()).expect("aggregates");

        assert!(aggregated.components.is_empty());
        assert!(aggregated
            .competencies
            .iter()
            .all(|competency| competency.components.is_empty()));
    }

    #[test]
    fn computes_self_vs_others_gap_per_competency() {
        let assignments = vec![
            assignment(
                "self",
                RaterType::SelfAssessment,
                AssignmentStatus::Completed,
                vec![response("q1", "COMM", Some(4.8)), response("q2", "LEAD", Some(2.0))],
            ),
            assignment(
                "mgr",
                RaterType::ManagerToEmployee,
                AssignmentStatus::Completed,
                vec![response("q1", "COMM", Some(3.0)), response("q2", "LEAD", Some(4.0))],
            ),
            assignment(
                "peer",
                RaterType::Peer,
                AssignmentStatus::Completed,
                vec![response("q1", "COMM", Some(3.4)), response("q2", "LEAD", Some(3.6))],
            ),
        ];

        let aggregated =
            aggregate(&EmployeeId::from("emp-1"), &assignments, &snapshot()).expect("aggregates");

        let comm = &aggregated.competencies[0];
        assert_eq!(comm.others_average, Some(3.2));
        assert_eq!(comm.self_vs_others_gap, Some(1.6));
        let lead = &aggregated.competencies[1];
        assert_eq!(lead.self_vs_others_gap, Some(-1.8));

        let spots = aggregated.blind_spots(1.0);
        assert_eq!(spots.len(), 2);
        assert_eq!(spots[0].code, "LEAD");
        assert_eq!(spots[0].kind, BlindSpotKind::HiddenStrength);
        assert_eq!(spots[1].kind, BlindSpotKind::Overestimated);
        assert!(aggregated.blind_spots(2.0).is_empty());
    }

    #[test]
    fn rejects_out_of_range_scores() {
        let assignments = vec![assignment(
            "broken",
            RaterType::Peer,
            AssignmentStatus::Completed,
            vec![response("q1", "COMM", Some(7.5))],
        )];

        let error = aggregate(&EmployeeId::from("emp-1"), &assignments, &snapshot())
            .expect_err("invalid score rejected");

        assert_eq!(
            error,
            AggregationError::InvalidScore {
                assignment_id: AssignmentId::from("broken"),
                question_id: "q1".to_string(),
                value: 7.5,
            }
        );
    }
}
