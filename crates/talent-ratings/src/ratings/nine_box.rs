use serde::{Deserialize, Serialize};

use super::domain::{DepartmentId, EmployeeId, PerformanceRating, RatingId};

/// Scores below this are low on either axis.
pub const MEDIUM_THRESHOLD: f64 = 2.5;
/// Scores at or above this are high on either axis.
pub const HIGH_THRESHOLD: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Low,
    Medium,
    High,
}

impl Bucket {
    pub fn for_score(score: f64) -> Self {
        if score >= HIGH_THRESHOLD {
            Bucket::High
        } else if score >= MEDIUM_THRESHOLD {
            Bucket::Medium
        } else {
            Bucket::Low
        }
    }

    const fn index(self) -> u8 {
        match self {
            Bucket::Low => 0,
            Bucket::Medium => 1,
            Bucket::High => 2,
        }
    }
}

/// The nine talent-grid cells, numbered bottom-left (1) to top-right (9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NineBoxPosition {
    Underperformer,
    EffectiveEmployee,
    TrustedProfessional,
    InconsistentPlayer,
    CorePlayer,
    HighPerformer,
    RoughDiamond,
    HighPotential,
    Star,
}

const GRID: [[NineBoxPosition; 3]; 3] = [
    // potential low
    [
        NineBoxPosition::Underperformer,
        NineBoxPosition::EffectiveEmployee,
        NineBoxPosition::TrustedProfessional,
    ],
    // potential medium
    [
        NineBoxPosition::InconsistentPlayer,
        NineBoxPosition::CorePlayer,
        NineBoxPosition::HighPerformer,
    ],
    // potential high
    [
        NineBoxPosition::RoughDiamond,
        NineBoxPosition::HighPotential,
        NineBoxPosition::Star,
    ],
];

impl NineBoxPosition {
    pub fn ordered() -> impl Iterator<Item = NineBoxPosition> {
        GRID.into_iter().flatten()
    }

    pub fn from_buckets(performance: Bucket, potential: Bucket) -> Self {
        GRID[potential.index() as usize][performance.index() as usize]
    }

    pub fn for_scores(performance: f64, potential: f64) -> Self {
        Self::from_buckets(Bucket::for_score(performance), Bucket::for_score(potential))
    }

    pub fn number(self) -> u8 {
        let (performance, potential) = self.buckets();
        potential.index() * 3 + performance.index() + 1
    }

    /// (performance, potential) buckets of this cell.
    pub fn buckets(self) -> (Bucket, Bucket) {
        for (potential_index, row) in GRID.iter().enumerate() {
            for (performance_index, cell) in row.iter().enumerate() {
                if *cell == self {
                    return (BUCKETS[performance_index], BUCKETS[potential_index]);
                }
            }
        }
        (Bucket::Low, Bucket::Low)
    }

    pub const fn label(self) -> &'static str {
        match self {
            NineBoxPosition::Underperformer => "Underperformer",
            NineBoxPosition::EffectiveEmployee => "Effective Employee",
            NineBoxPosition::TrustedProfessional => "Trusted Professional",
            NineBoxPosition::InconsistentPlayer => "Inconsistent Player",
            NineBoxPosition::CorePlayer => "Core Player",
            NineBoxPosition::HighPerformer => "High Performer",
            NineBoxPosition::RoughDiamond => "Rough Diamond",
            NineBoxPosition::HighPotential => "High Potential",
            NineBoxPosition::Star => "Star",
        }
    }
}

const BUCKETS: [Bucket; 3] = [Bucket::Low, Bucket::Medium, Bucket::High];

/// Grid position for a rating, using its effective performance score.
pub fn position_for(rating: &PerformanceRating) -> Option<NineBoxPosition> {
    rating
        .potential_score()
        .map(|potential| NineBoxPosition::for_scores(rating.effective_score(), potential))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NineBoxMember {
    pub rating_id: RatingId,
    pub evaluatee_id: EmployeeId,
    pub evaluatee_name: String,
    pub department_id: Option<DepartmentId>,
    pub performance_score: f64,
    pub potential_score: f64,
    pub calibrated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NineBoxCell {
    pub position: NineBoxPosition,
    pub number: u8,
    pub label: &'static str,
    pub performance: Bucket,
    pub potential: Bucket,
    pub count: usize,
    pub members: Vec<NineBoxMember>,
}

/// Ratings grouped into all nine cells, empty cells included.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NineBoxGrid {
    pub cells: Vec<NineBoxCell>,
    pub placed: usize,
    pub unplaced: usize,
}

impl NineBoxGrid {
    pub fn from_ratings<'a, I>(ratings: I) -> Self
    where
        I: IntoIterator<Item = &'a PerformanceRating>,
    {
        let mut cells: Vec<NineBoxCell> = NineBoxPosition::ordered()
            .map(|position| {
                let (performance, potential) = position.buckets();
                NineBoxCell {
                    position,
                    number: position.number(),
                    label: position.label(),
                    performance,
                    potential,
                    count: 0,
                    members: Vec::new(),
                }
            })
            .collect();
        let mut unplaced = 0;

        for rating in ratings {
            let (Some(position), Some(potential_score)) =
                (rating.nine_box, rating.potential_score())
            else {
                unplaced += 1;
                continue;
            };

            let cell = &mut cells[usize::from(position.number() - 1)];
            cell.count += 1;
            cell.members.push(NineBoxMember {
                rating_id: rating.id.clone(),
                evaluatee_id: rating.evaluatee_id.clone(),
                evaluatee_name: rating.evaluatee_name.clone(),
                department_id: rating.department_id.clone(),
                performance_score: rating.effective_score(),
                potential_score,
                calibrated: rating.is_calibrated(),
            });
        }

        for cell in &mut cells {
            cell.members.sort_by(|a, b| a.evaluatee_name.cmp(&b.evaluatee_name));
        }

        let placed = cells.iter().map(|cell| cell.count).sum();
        Self {
            cells,
            placed,
            unplaced,
        }
    }

    pub fn cell(&self, position: NineBoxPosition) -> Option<&NineBoxCell> {
        self.cells.iter().find(|cell| cell.position == position)
    }
}
