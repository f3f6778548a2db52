//! Cycle listing across persisted and live ratings.
//!
//! Closed cycles are served straight from the rating repository. Open cycles are
//! still collecting responses, so their rows are synthesized from assignments on
//! read and merged with whatever has already been persisted.

mod merge;
mod query;

pub use merge::{merge_sources, LiveScore, MergedEntry, Subject};
pub use query::{
    EvaluationStatus, ListRatingsRequest, ListingStats, PageRequest, PaginationInfo,
    PotentialStatus, RatingFilters, RatingListing, RatingRow, RatingSort, RatingSortField,
    ReadMode, RowFacts, RowSource, SortDirection,
};

use tracing::{debug, warn};

use super::domain::{CycleId, MeasurementCycle, TenantId};
use super::repository::{AuditSink, RatingQuery, RatingStore};
use super::service::{RatingService, RatingServiceError};
use super::weights::ResolvedRatingConfig;

impl<S, A> RatingService<S, A>
where
    S: RatingStore + 'static,
    A: AuditSink + 'static,
{
    /// Paginated, filtered ratings of a cycle. Open cycles are synthesized live.
    pub fn list_ratings_for_cycle(
        &self,
        tenant_id: &TenantId,
        cycle_id: &CycleId,
        request: &ListRatingsRequest,
    ) -> Result<RatingListing, RatingServiceError> {
        let cycle = self.require_cycle(tenant_id, cycle_id)?;
        let page = PageRequest::resolve(request.page, request.limit, self.settings());

        debug!(
            cycle_id = %cycle_id,
            status = cycle.status.label(),
            page = page.page,
            limit = page.limit,
            "listing ratings"
        );

        if cycle.status.is_open() {
            self.list_live(&cycle, request, page)
        } else {
            self.list_cached(&cycle, request, page)
        }
    }

    fn list_cached(
        &self,
        cycle: &MeasurementCycle,
        request: &ListRatingsRequest,
        page: PageRequest,
    ) -> Result<RatingListing, RatingServiceError> {
        let store = self.store();
        let ratings = store.query(&RatingQuery {
            cycle_id: cycle.id.clone(),
            filters: request.filters.clone(),
            sort: request.sort,
            offset: page.offset(),
            limit: Some(page.limit),
        })?;

        let total = store.count(&cycle.id, &request.filters)?;
        let evaluated = match request.filters.narrowed_to_evaluated() {
            Some(filters) => store.count(&cycle.id, &filters)?,
            None => 0,
        };
        let potential_assigned = match request.filters.narrowed_to_potential() {
            Some(filters) => store.count(&cycle.id, &filters)?,
            None => 0,
        };

        Ok(RatingListing {
            cycle_id: cycle.id.clone(),
            cycle_status: cycle.status,
            mode: ReadMode::Cached,
            data: ratings.iter().map(RatingRow::persisted).collect(),
            pagination: page.info(total),
            stats: ListingStats {
                total,
                evaluated,
                potential_assigned,
            },
        })
    }

    fn list_live(
        &self,
        cycle: &MeasurementCycle,
        request: &ListRatingsRequest,
        page: PageRequest,
    ) -> Result<RatingListing, RatingServiceError> {
        let store = self.store();
        let config = self.resolve_config(&cycle.tenant_id, Some(&cycle.id))?;

        let universe = store.evaluated_employees(&cycle.id)?;
        let employees = store.employees(&cycle.tenant_id, &universe)?;
        let persisted = store.fetch_for_evaluatees(&cycle.id, &universe)?;

        let mut entries: Vec<MergedEntry> = merge_sources(&universe, employees, persisted)
            .into_iter()
            .filter(|entry| request.filters.matches(&entry.facts()))
            .collect();

        let stats = ListingStats {
            total: entries.len(),
            evaluated: entries.iter().filter(|entry| entry.facts().evaluated).count(),
            potential_assigned: entries
                .iter()
                .filter(|entry| entry.facts().potential_assigned)
                .count(),
        };

        let data = if request.sort.field.needs_scores() {
            let mut rows: Vec<RatingRow> = entries
                .into_iter()
                .map(|entry| self.materialize(cycle, &config, entry))
                .collect();
            rows.sort_by(|a, b| {
                request
                    .sort
                    .compare(&RowFacts::from_row(a), &RowFacts::from_row(b))
            });
            page.window(rows)
        } else {
            entries.sort_by(|a, b| request.sort.compare(&a.facts(), &b.facts()));
            page.window(entries)
                .into_iter()
                .map(|entry| self.materialize(cycle, &config, entry))
                .collect()
        };

        Ok(RatingListing {
            cycle_id: cycle.id.clone(),
            cycle_status: cycle.status,
            mode: ReadMode::Live,
            data,
            pagination: page.info(stats.total),
            stats,
        })
    }

    fn materialize(
        &self,
        cycle: &MeasurementCycle,
        config: &ResolvedRatingConfig,
        entry: MergedEntry,
    ) -> RatingRow {
        match entry {
            MergedEntry::Persisted(rating) => RatingRow::persisted(&rating),
            MergedEntry::Live { subject, persisted } => {
                match self.compute(cycle, &subject.evaluatee_id, config) {
                    Ok(computation) => {
                        RatingRow::live(subject, persisted.as_ref(), computation.live_score())
                    }
                    Err(error) => {
                        warn!(
                            cycle_id = %cycle.id,
                            evaluatee_id = %subject.evaluatee_id,
                            error = %error,
                            "live rating unavailable"
                        );
                        RatingRow::unavailable(subject, persisted.as_ref())
                    }
                }
            }
        }
    }
}
