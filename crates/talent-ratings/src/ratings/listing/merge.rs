//! Reconcile persisted ratings with the live universe of an open cycle.
//!
//! The merge is pure: callers hand in the keyed collections they fetched and
//! get back one entry per universe member, persisted data first.

use std::collections::HashMap;

use crate::ratings::domain::{
    ComponentScores, Completeness, DepartmentId, Employee, EmployeeId, PerformanceRating,
};
use crate::ratings::levels::PerformanceLevel;

use super::query::{RatingRow, RowFacts, RowSource};

/// Who a live row is about, resolved from the directory or the stored row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub evaluatee_id: EmployeeId,
    pub name: String,
    pub department_id: Option<DepartmentId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MergedEntry {
    /// Stored row with a usable score.
    Persisted(PerformanceRating),
    /// Needs a live score. A stored row without a usable score still supplies
    /// its potential and grid data.
    Live {
        subject: Subject,
        persisted: Option<PerformanceRating>,
    },
}

impl MergedEntry {
    pub fn evaluatee_id(&self) -> &EmployeeId {
        match self {
            MergedEntry::Persisted(rating) => &rating.evaluatee_id,
            MergedEntry::Live { subject, .. } => &subject.evaluatee_id,
        }
    }

    /// Facts known without computing anything. Live members have a completed
    /// assignment by construction, so they count as evaluated.
    pub fn facts(&self) -> RowFacts<'_> {
        match self {
            MergedEntry::Persisted(rating) => RowFacts::from_rating(rating),
            MergedEntry::Live { subject, persisted } => RowFacts {
                evaluatee_id: &subject.evaluatee_id,
                name: &subject.name,
                department_id: subject.department_id.as_ref(),
                evaluated: true,
                potential_assigned: persisted
                    .as_ref()
                    .is_some_and(|rating| rating.potential.is_some()),
                effective_score: None,
                calculated_score: None,
                potential_score: persisted.as_ref().and_then(PerformanceRating::potential_score),
                nine_box: persisted.as_ref().and_then(|rating| rating.nine_box),
            },
        }
    }
}

/// Score synthesized from raw responses without persisting it.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveScore {
    pub calculated_score: f64,
    pub calculated_level: PerformanceLevel,
    pub components: ComponentScores,
    pub completeness: Completeness,
}

/// One entry per universe member, in universe order. Stored rows outside the
/// universe are dropped.
pub fn merge_sources(
    universe: &[EmployeeId],
    employees: Vec<Employee>,
    persisted: Vec<PerformanceRating>,
) -> Vec<MergedEntry> {
    let mut employees: HashMap<EmployeeId, Employee> = employees
        .into_iter()
        .map(|employee| (employee.id.clone(), employee))
        .collect();
    let mut persisted: HashMap<EmployeeId, PerformanceRating> = persisted
        .into_iter()
        .map(|rating| (rating.evaluatee_id.clone(), rating))
        .collect();

    universe
        .iter()
        .map(|evaluatee_id| {
            let stored = persisted.remove(evaluatee_id);
            match stored {
                Some(rating) if rating.has_usable_score() => MergedEntry::Persisted(rating),
                stored => {
                    let subject = match employees.remove(evaluatee_id) {
                        Some(employee) => Subject {
                            evaluatee_id: employee.id,
                            name: employee.display_name,
                            department_id: employee.department_id,
                        },
                        None => Subject {
                            evaluatee_id: evaluatee_id.clone(),
                            name: stored
                                .as_ref()
                                .map(|rating| rating.evaluatee_name.clone())
                                .unwrap_or_else(|| evaluatee_id.to_string()),
                            department_id: stored
                                .as_ref()
                                .and_then(|rating| rating.department_id.clone()),
                        },
                    };
                    MergedEntry::Live {
                        subject,
                        persisted: stored,
                    }
                }
            }
        })
        .collect()
}

impl RatingRow {
    /// Row for a live entry. Calibration stored on the row still wins for the
    /// effective score.
    pub fn live(subject: Subject, persisted: Option<&PerformanceRating>, score: LiveScore) -> Self {
        let calibration = persisted.map(|rating| &rating.calibration);
        let final_score = calibration.and_then(|state| state.final_score);
        let effective_level = calibration
            .and_then(|state| state.final_level.clone())
            .unwrap_or_else(|| score.calculated_level.clone());

        Self {
            evaluatee_id: subject.evaluatee_id,
            evaluatee_name: subject.name,
            department_id: subject.department_id,
            rating_id: persisted.map(|rating| rating.id.clone()),
            source: RowSource::Live,
            evaluated: true,
            calculated_score: score.calculated_score,
            calculated_level: score.calculated_level,
            final_score,
            effective_score: final_score.unwrap_or(score.calculated_score),
            effective_level,
            components: score.components,
            completeness: score.completeness,
            potential_score: persisted.and_then(PerformanceRating::potential_score),
            nine_box: persisted.and_then(|rating| rating.nine_box),
            calibrated: calibration.is_some_and(|state| state.calibrated),
            adjustment_type: calibration.and_then(|state| state.adjustment_type),
        }
    }

    /// Placeholder when the live score could not be computed.
    pub fn unavailable(subject: Subject, persisted: Option<&PerformanceRating>) -> Self {
        Self::live(
            subject,
            persisted,
            LiveScore {
                calculated_score: 0.0,
                calculated_level: PerformanceLevel::unclassified(),
                components: ComponentScores::default(),
                completeness: Completeness::default(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::ratings::domain::{CalculatedRating, CycleId, RatingId, TenantId};
    use crate::ratings::levels::PerformanceLevelConfig;

    fn employee(id: &str, name: &str) -> Employee {
        Employee {
            id: EmployeeId::from(id),
            tenant_id: TenantId::from("acme"),
            display_name: name.to_string(),
            department_id: Some(DepartmentId::from("eng")),
        }
    }

    fn stored(id: &str, score: f64) -> PerformanceRating {
        PerformanceRating::from_calculated(CalculatedRating {
            id: RatingId::from(format!("rating-{id}").as_str()),
            tenant_id: TenantId::from("acme"),
            cycle_id: CycleId::from("2025-h1"),
            evaluatee_id: EmployeeId::from(id),
            evaluatee_name: format!("Stored {id}"),
            department_id: None,
            calculated_score: score,
            calculated_level: PerformanceLevelConfig::standard().classify(score),
            components: ComponentScores::default(),
            completeness: Completeness {
                total_assignments: 1,
                completed_assignments: 1,
            },
            computed_at: Utc::now(),
        })
    }

    #[test]
    fn usable_persisted_rows_take_precedence() {
        let universe = [EmployeeId::from("a"), EmployeeId::from("b")];
        let merged = merge_sources(
            &universe,
            vec![employee("a", "Ana"), employee("b", "Ben")],
            vec![stored("a", 3.4)],
        );

        assert!(matches!(&merged[0], MergedEntry::Persisted(rating) if rating.calculated_score == 3.4));
        assert!(matches!(&merged[1], MergedEntry::Live { persisted: None, .. }));
        assert_eq!(merged[1].facts().name, "Ben");
    }

    #[test]
    fn zero_score_rows_are_recomputed_but_keep_potential() {
        let mut zero = stored("a", 0.0);
        zero.potential = Some(crate::ratings::domain::PotentialAssessment {
            score: 4.0,
            factors: None,
            rated_by: crate::ratings::domain::ActorId::from("hr"),
            rated_at: Utc::now(),
            notes: None,
        });

        let merged = merge_sources(&[EmployeeId::from("a")], Vec::new(), vec![zero]);

        let facts = merged[0].facts();
        assert!(matches!(&merged[0], MergedEntry::Live { persisted: Some(_), .. }));
        assert_eq!(facts.name, "Stored a");
        assert!(facts.potential_assigned);
        assert!(facts.evaluated);
    }

    #[test]
    fn rows_outside_the_universe_are_dropped() {
        let merged = merge_sources(
            &[EmployeeId::from("a")],
            vec![employee("a", "Ana")],
            vec![stored("a", 2.0), stored("z", 4.0)],
        );

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].evaluatee_id(), &EmployeeId::from("a"));
    }
}
