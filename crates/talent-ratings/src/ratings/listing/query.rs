use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::config::EngineSettings;
use crate::ratings::calibration::AdjustmentType;
use crate::ratings::domain::{
    ComponentScores, Completeness, CycleId, CycleStatus, DepartmentId, EmployeeId,
    PerformanceRating, RatingId,
};
use crate::ratings::levels::PerformanceLevel;
use crate::ratings::nine_box::NineBoxPosition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStatus {
    Evaluated,
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PotentialStatus {
    Assigned,
    Unassigned,
}

/// Listing filters shared by the persisted and the live read paths.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingFilters {
    #[serde(default)]
    pub evaluation_status: Option<EvaluationStatus>,
    #[serde(default)]
    pub potential_status: Option<PotentialStatus>,
    #[serde(default)]
    pub search: Option<String>,
    /// Department scope; `None` means unrestricted.
    #[serde(default)]
    pub department_ids: Option<Vec<DepartmentId>>,
}

/// The fields filters and sorts look at, extracted from either read path.
#[derive(Debug, Clone, Copy)]
pub struct RowFacts<'a> {
    pub evaluatee_id: &'a EmployeeId,
    pub name: &'a str,
    pub department_id: Option<&'a DepartmentId>,
    pub evaluated: bool,
    pub potential_assigned: bool,
    /// `None` until a live score has been synthesized.
    pub effective_score: Option<f64>,
    pub calculated_score: Option<f64>,
    pub potential_score: Option<f64>,
    pub nine_box: Option<NineBoxPosition>,
}

impl<'a> RowFacts<'a> {
    pub fn from_rating(rating: &'a PerformanceRating) -> Self {
        Self {
            evaluatee_id: &rating.evaluatee_id,
            name: &rating.evaluatee_name,
            department_id: rating.department_id.as_ref(),
            evaluated: rating.is_evaluated(),
            potential_assigned: rating.potential.is_some(),
            effective_score: Some(rating.effective_score()),
            calculated_score: Some(rating.calculated_score),
            potential_score: rating.potential_score(),
            nine_box: rating.nine_box,
        }
    }

    pub fn from_row(row: &'a RatingRow) -> Self {
        Self {
            evaluatee_id: &row.evaluatee_id,
            name: &row.evaluatee_name,
            department_id: row.department_id.as_ref(),
            evaluated: row.evaluated,
            potential_assigned: row.potential_score.is_some(),
            effective_score: Some(row.effective_score),
            calculated_score: Some(row.calculated_score),
            potential_score: row.potential_score,
            nine_box: row.nine_box,
        }
    }
}

impl RatingFilters {
    pub fn matches(&self, facts: &RowFacts<'_>) -> bool {
        if let Some(status) = self.evaluation_status {
            let wanted = status == EvaluationStatus::Evaluated;
            if facts.evaluated != wanted {
                return false;
            }
        }

        if let Some(status) = self.potential_status {
            let wanted = status == PotentialStatus::Assigned;
            if facts.potential_assigned != wanted {
                return false;
            }
        }

        if let Some(needle) = self.search_term() {
            let name = facts.name.to_lowercase();
            let id = facts.evaluatee_id.as_str().to_lowercase();
            if !name.contains(&needle) && !id.contains(&needle) {
                return false;
            }
        }

        if let Some(scope) = &self.department_ids {
            match facts.department_id {
                Some(department) if scope.contains(department) => {}
                _ => return false,
            }
        }

        true
    }

    fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_lowercase)
    }

    /// Same scope restricted to evaluated rows, or `None` when that is contradictory.
    pub fn narrowed_to_evaluated(&self) -> Option<Self> {
        match self.evaluation_status {
            Some(EvaluationStatus::Pending) => None,
            _ => Some(Self {
                evaluation_status: Some(EvaluationStatus::Evaluated),
                ..self.clone()
            }),
        }
    }

    /// Same scope restricted to rows with potential, or `None` when that is contradictory.
    pub fn narrowed_to_potential(&self) -> Option<Self> {
        match self.potential_status {
            Some(PotentialStatus::Unassigned) => None,
            _ => Some(Self {
                potential_status: Some(PotentialStatus::Assigned),
                ..self.clone()
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingSortField {
    #[default]
    Name,
    EffectiveScore,
    CalculatedScore,
    Potential,
    NineBox,
}

impl RatingSortField {
    /// Whether ordering needs every row's score, not just persisted data.
    pub const fn needs_scores(self) -> bool {
        matches!(
            self,
            RatingSortField::EffectiveScore | RatingSortField::CalculatedScore
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingSort {
    #[serde(default)]
    pub field: RatingSortField,
    #[serde(default)]
    pub direction: SortDirection,
}

impl RatingSort {
    pub fn new(field: RatingSortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    /// Order by the sort field, then by name and id so pages are stable.
    pub fn compare(&self, a: &RowFacts<'_>, b: &RowFacts<'_>) -> Ordering {
        let primary = match self.field {
            RatingSortField::Name => compare_names(a.name, b.name),
            RatingSortField::EffectiveScore => compare_scores(a.effective_score, b.effective_score),
            RatingSortField::CalculatedScore => {
                compare_scores(a.calculated_score, b.calculated_score)
            }
            RatingSortField::Potential => compare_scores(a.potential_score, b.potential_score),
            RatingSortField::NineBox => a
                .nine_box
                .map(NineBoxPosition::number)
                .cmp(&b.nine_box.map(NineBoxPosition::number)),
        };

        let primary = match self.direction {
            SortDirection::Asc => primary,
            SortDirection::Desc => primary.reverse(),
        };

        primary
            .then_with(|| compare_names(a.name, b.name))
            .then_with(|| a.evaluatee_id.cmp(b.evaluatee_id))
    }
}

fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

fn compare_scores(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Caller supplied listing parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListRatingsRequest {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub sort: RatingSort,
    pub filters: RatingFilters,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub limit: usize,
}

impl PageRequest {
    pub fn resolve(page: Option<usize>, limit: Option<usize>, settings: &EngineSettings) -> Self {
        let max = settings.max_page_size.max(1);
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(settings.default_page_size).clamp(1, max),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn window<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset())
            .take(self.limit)
            .collect()
    }

    pub fn info(&self, total: usize) -> PaginationInfo {
        PaginationInfo {
            page: self.page,
            limit: self.limit,
            total,
            total_pages: total.div_ceil(self.limit),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationInfo {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub total_pages: usize,
}

/// Dashboard counters, independent of the pagination window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingStats {
    pub total: usize,
    pub evaluated: usize,
    pub potential_assigned: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowSource {
    Persisted,
    Live,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadMode {
    /// Recomputed on read from assignments (open cycles).
    Live,
    /// Served from persisted ratings (closed cycles).
    Cached,
}

/// One listing line, whichever path produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingRow {
    pub evaluatee_id: EmployeeId,
    pub evaluatee_name: String,
    pub department_id: Option<DepartmentId>,
    pub rating_id: Option<RatingId>,
    pub source: RowSource,
    pub evaluated: bool,
    pub calculated_score: f64,
    pub calculated_level: PerformanceLevel,
    pub final_score: Option<f64>,
    pub effective_score: f64,
    pub effective_level: PerformanceLevel,
    pub components: ComponentScores,
    pub completeness: Completeness,
    pub potential_score: Option<f64>,
    pub nine_box: Option<NineBoxPosition>,
    pub calibrated: bool,
    pub adjustment_type: Option<AdjustmentType>,
}

impl RatingRow {
    pub fn persisted(rating: &PerformanceRating) -> Self {
        Self {
            evaluatee_id: rating.evaluatee_id.clone(),
            evaluatee_name: rating.evaluatee_name.clone(),
            department_id: rating.department_id.clone(),
            rating_id: Some(rating.id.clone()),
            source: RowSource::Persisted,
            evaluated: rating.is_evaluated(),
            calculated_score: rating.calculated_score,
            calculated_level: rating.calculated_level.clone(),
            final_score: rating.final_score(),
            effective_score: rating.effective_score(),
            effective_level: rating.effective_level().clone(),
            components: rating.components,
            completeness: rating.completeness,
            potential_score: rating.potential_score(),
            nine_box: rating.nine_box,
            calibrated: rating.is_calibrated(),
            adjustment_type: rating.calibration.adjustment_type,
        }
    }
}

/// Cycle listing with pagination metadata and counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingListing {
    pub cycle_id: CycleId,
    pub cycle_status: CycleStatus,
    pub mode: ReadMode,
    pub data: Vec<RatingRow>,
    pub pagination: PaginationInfo,
    pub stats: ListingStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts<'a>(
        id: &'a EmployeeId,
        name: &'a str,
        department: Option<&'a DepartmentId>,
        score: Option<f64>,
    ) -> RowFacts<'a> {
        RowFacts {
            evaluatee_id: id,
            name,
            department_id: department,
            evaluated: score.is_some(),
            potential_assigned: false,
            effective_score: score,
            calculated_score: score,
            potential_score: None,
            nine_box: None,
        }
    }

    #[test]
    fn search_matches_name_or_id_case_insensitively() {
        let id = EmployeeId::from("emp-042");
        let row = facts(&id, "Ada Lovelace", None, Some(3.0));

        let by_name = RatingFilters {
            search: Some("  lovelace ".to_string()),
            ..RatingFilters::default()
        };
        let by_id = RatingFilters {
            search: Some("EMP-04".to_string()),
            ..RatingFilters::default()
        };
        let miss = RatingFilters {
            search: Some("turing".to_string()),
            ..RatingFilters::default()
        };

        assert!(by_name.matches(&row));
        assert!(by_id.matches(&row));
        assert!(!miss.matches(&row));
    }

    #[test]
    fn department_scope_excludes_rows_without_department() {
        let id = EmployeeId::from("emp-1");
        let sales = DepartmentId::from("sales");
        let scope = RatingFilters {
            department_ids: Some(vec![sales.clone()]),
            ..RatingFilters::default()
        };

        assert!(scope.matches(&facts(&id, "A", Some(&sales), None)));
        assert!(!scope.matches(&facts(&id, "A", None, None)));
        assert!(!scope.matches(&facts(&id, "A", Some(&DepartmentId::from("ops")), None)));
    }

    #[test]
    fn status_filters_use_row_facts() {
        let id = EmployeeId::from("emp-1");
        let pending = RatingFilters {
            evaluation_status: Some(EvaluationStatus::Pending),
            ..RatingFilters::default()
        };
        assert!(pending.matches(&facts(&id, "A", None, None)));
        assert!(!pending.matches(&facts(&id, "A", None, Some(2.0))));
        assert!(pending.narrowed_to_evaluated().is_none());
        assert_eq!(
            RatingFilters::default()
                .narrowed_to_potential()
                .and_then(|filters| filters.potential_status),
            Some(PotentialStatus::Assigned)
        );
    }

    #[test]
    fn sort_breaks_ties_by_name_then_id() {
        let (a_id, b_id, c_id) = (
            EmployeeId::from("a"),
            EmployeeId::from("b"),
            EmployeeId::from("c"),
        );
        let mut rows = [
            facts(&c_id, "Cleo", None, Some(3.0)),
            facts(&a_id, "Abe", None, Some(4.0)),
            facts(&b_id, "Bea", None, Some(3.0)),
        ];

        let sort = RatingSort::new(RatingSortField::EffectiveScore, SortDirection::Desc);
        rows.sort_by(|a, b| sort.compare(a, b));

        let names: Vec<&str> = rows.iter().map(|row| row.name).collect();
        assert_eq!(names, ["Abe", "Bea", "Cleo"]);
    }

    #[test]
    fn page_request_clamps_and_counts_pages() {
        let settings = EngineSettings::default();
        let page = PageRequest::resolve(Some(0), Some(1_000), &settings);
        assert_eq!(page.page, 1);
        assert_eq!(page.limit, settings.max_page_size);

        let page = PageRequest::resolve(Some(3), Some(20), &settings);
        assert_eq!(page.offset(), 40);
        assert_eq!(page.info(50).total_pages, 3);
        assert_eq!(page.window((0..50).collect::<Vec<_>>()), (40..50).collect::<Vec<_>>());
        assert_eq!(page.info(0).total_pages, 0);
    }
}
