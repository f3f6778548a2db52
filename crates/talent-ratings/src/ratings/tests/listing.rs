use super::common::*;
use crate::ratings::calibration::CalibrationRequest;
use crate::ratings::domain::{
    ActorId, AssignmentStatus, CycleId, CycleStatus, DepartmentId, EmployeeId, RaterType,
    RatingId, TenantId,
};
use crate::ratings::listing::{
    EvaluationStatus, ListRatingsRequest, PotentialStatus, RatingFilters, RatingSort,
    RatingSortField, ReadMode, RowSource, SortDirection,
};
use crate::ratings::memory::InMemoryRatingStore;
use crate::ratings::nine_box::NineBoxPosition;
use crate::ratings::potential::PotentialInput;
use crate::ratings::repository::RatingRepository;

fn manager_score(index: usize) -> f64 {
    1.0 + (index % 5) as f64 * 0.8
}

/// `count` evaluatees with completed self and manager answers, the first
/// `persisted` of them already generated.
fn seed_population(
    service: &MemoryService,
    store: &InMemoryRatingStore,
    count: usize,
    persisted: usize,
) {
    for index in 1..=count {
        let id = employee_id(index);
        let name = format!("Person {index:02}");
        seed_evaluatee(store, &id, &name, "eng", 4.0, manager_score(index));
        if index <= persisted {
            service
                .generate_rating(&tenant(), &cycle_id(), &id)
                .expect("rating generated");
        }
    }
}

fn request(page: usize, limit: usize) -> ListRatingsRequest {
    ListRatingsRequest {
        page: Some(page),
        limit: Some(limit),
        ..ListRatingsRequest::default()
    }
}

#[test]
fn open_cycle_merges_persisted_and_live_rows() {
    let (service, store, _) = build_service(store_with_cycle(CycleStatus::Active));
    seed_population(&service, &store, 50, 30);
    let pending = EmployeeId::from("emp-pending");
    add_employee(&store, &pending, "Pending Person", "eng");
    add_assignment(&store, &pending, RaterType::Peer, AssignmentStatus::Pending, 4.0);

    let listing = service
        .list_ratings_for_cycle(&tenant(), &cycle_id(), &request(1, 100))
        .expect("listing");

    assert_eq!(listing.mode, ReadMode::Live);
    assert_eq!(listing.data.len(), 50);
    let persisted = listing
        .data
        .iter()
        .filter(|row| row.source == RowSource::Persisted)
        .count();
    assert_eq!(persisted, 30);
    assert_eq!(listing.data.len() - persisted, 20);
    assert_eq!(listing.stats.total, 50);
    assert_eq!(listing.stats.evaluated, 50);
    assert_eq!(listing.stats.potential_assigned, 0);
    assert_eq!(listing.pagination.total_pages, 1);
    assert!(listing
        .data
        .iter()
        .all(|row| row.evaluatee_id != pending && row.calculated_score > 0.0));

    let live = listing
        .data
        .iter()
        .find(|row| row.evaluatee_id == employee_id(45))
        .expect("live row");
    assert_eq!(live.source, RowSource::Live);
    assert!(live.rating_id.is_none());
    assert_eq!(live.calculated_score, 2.5);
    assert_eq!(store.rating_count(), 30);
}

#[test]
fn name_sort_pages_through_the_whole_universe() {
    let (service, store, _) = build_service(store_with_cycle(CycleStatus::Active));
    seed_population(&service, &store, 50, 30);

    let second = service
        .list_ratings_for_cycle(&tenant(), &cycle_id(), &request(2, 20))
        .expect("page two");
    assert_eq!(second.data.len(), 20);
    assert_eq!(second.data[0].evaluatee_name, "Person 21");
    assert_eq!(second.data[19].evaluatee_name, "Person 40");
    assert_eq!(second.pagination.total, 50);
    assert_eq!(second.pagination.total_pages, 3);

    let third = service
        .list_ratings_for_cycle(&tenant(), &cycle_id(), &request(3, 20))
        .expect("page three");
    assert_eq!(third.data.len(), 10);
    assert_eq!(third.stats, second.stats);

    let beyond = service
        .list_ratings_for_cycle(&tenant(), &cycle_id(), &request(9, 20))
        .expect("empty page");
    assert!(beyond.data.is_empty());
    assert_eq!(beyond.pagination.total, 50);
}

#[test]
fn page_size_is_clamped_to_the_configured_maximum() {
    let (service, store, _) = build_service(store_with_cycle(CycleStatus::Active));
    seed_population(&service, &store, 5, 0);

    let listing = service
        .list_ratings_for_cycle(&tenant(), &cycle_id(), &request(0, 10_000))
        .expect("listing");

    assert_eq!(listing.pagination.page, 1);
    assert_eq!(listing.pagination.limit, 100);
    assert_eq!(listing.data.len(), 5);
}

#[test]
fn score_sort_orders_live_and_persisted_rows_together() {
    let (service, store, _) = build_service(store_with_cycle(CycleStatus::Active));
    seed_population(&service, &store, 50, 30);

    let mut sorted = request(1, 100);
    sorted.sort = RatingSort::new(RatingSortField::EffectiveScore, SortDirection::Desc);
    let listing = service
        .list_ratings_for_cycle(&tenant(), &cycle_id(), &sorted)
        .expect("listing");

    assert!(listing
        .data
        .windows(2)
        .all(|pair| pair[0].effective_score >= pair[1].effective_score));

    let top: Vec<_> = listing.data.iter().take(10).collect();
    assert!(top.iter().all(|row| row.effective_score == 4.1));
    assert!(top.iter().any(|row| row.source == RowSource::Live));
    assert!(top.iter().any(|row| row.source == RowSource::Persisted));

    sorted.page = Some(2);
    sorted.limit = Some(10);
    let second = service
        .list_ratings_for_cycle(&tenant(), &cycle_id(), &sorted)
        .expect("second page");
    assert_eq!(second.data, listing.data[10..20].to_vec());
}

#[test]
fn closed_cycle_reads_persisted_rows_only() {
    let (service, store, _) = build_service(store_with_cycle(CycleStatus::InReview));
    seed_population(&service, &store, 10, 8);

    for index in 1..=3 {
        let rating = store_rating(&store, index);
        service
            .rate_potential(
                &tenant(),
                &rating,
                &PotentialInput::from_score(3.0),
                None,
                ActorId::from("hr-lead"),
            )
            .expect("potential rated");
    }
    let calibrated = store_rating(&store, 5);
    service
        .calibrate_rating(
            &tenant(),
            &calibrated,
            CalibrationRequest::new(5.0, "promotion case"),
            ActorId::from("hr-lead"),
        )
        .expect("calibrated");

    let listing = service
        .list_ratings_for_cycle(&tenant(), &cycle_id(), &request(1, 50))
        .expect("listing");
    assert_eq!(listing.mode, ReadMode::Cached);
    assert_eq!(listing.data.len(), 8);
    assert!(listing
        .data
        .iter()
        .all(|row| row.source == RowSource::Persisted));
    assert_eq!(listing.stats.total, 8);
    assert_eq!(listing.stats.evaluated, 8);
    assert_eq!(listing.stats.potential_assigned, 3);

    let mut by_score = request(1, 1);
    by_score.sort = RatingSort::new(RatingSortField::EffectiveScore, SortDirection::Desc);
    let top = service
        .list_ratings_for_cycle(&tenant(), &cycle_id(), &by_score)
        .expect("top row");
    assert_eq!(top.data[0].evaluatee_id, employee_id(5));
    assert_eq!(top.data[0].final_score, Some(5.0));
    assert!(top.data[0].calibrated);
    assert_eq!(top.pagination.total_pages, 8);
}

#[test]
fn closed_cycle_counters_respect_contradictory_filters() {
    let (service, store, _) = build_service(store_with_cycle(CycleStatus::Completed));
    seed_population(&service, &store, 6, 6);
    let rating = store_rating(&store, 2);
    service
        .rate_potential(
            &tenant(),
            &rating,
            &PotentialInput::from_factors(2, 2, 2),
            None,
            ActorId::from("hr-lead"),
        )
        .expect("potential rated");

    let mut pending = request(1, 20);
    pending.filters.evaluation_status = Some(EvaluationStatus::Pending);
    let listing = service
        .list_ratings_for_cycle(&tenant(), &cycle_id(), &pending)
        .expect("pending listing");
    assert!(listing.data.is_empty());
    assert_eq!(listing.stats.total, 0);
    assert_eq!(listing.stats.evaluated, 0);

    let mut unassigned = request(1, 20);
    unassigned.filters.potential_status = Some(PotentialStatus::Unassigned);
    let listing = service
        .list_ratings_for_cycle(&tenant(), &cycle_id(), &unassigned)
        .expect("unassigned listing");
    assert_eq!(listing.stats.total, 5);
    assert_eq!(listing.stats.evaluated, 5);
    assert_eq!(listing.stats.potential_assigned, 0);
}

#[test]
fn zero_score_row_is_rescored_live_but_keeps_its_potential() {
    let (service, store, _) = build_service(store_with_cycle(CycleStatus::Active));
    let late = EmployeeId::from("emp-late");
    add_employee(&store, &late, "Late Starter", "ops");
    add_assignment(&store, &late, RaterType::Peer, AssignmentStatus::Pending, 4.0);
    let rating = service
        .generate_rating(&tenant(), &cycle_id(), &late)
        .expect("empty rating")
        .rating;
    assert_eq!(rating.calculated_score, 0.0);
    service
        .rate_potential(
            &tenant(),
            &rating.id,
            &PotentialInput::from_score(4.5),
            None,
            ActorId::from("hr-lead"),
        )
        .expect("potential rated");

    add_assignment(
        &store,
        &late,
        RaterType::ManagerToEmployee,
        AssignmentStatus::Completed,
        3.0,
    );

    let listing = service
        .list_ratings_for_cycle(&tenant(), &cycle_id(), &request(1, 20))
        .expect("listing");
    assert_eq!(listing.data.len(), 1);
    let row = &listing.data[0];
    assert_eq!(row.source, RowSource::Live);
    assert_eq!(row.rating_id.as_ref(), Some(&rating.id));
    assert_eq!(row.calculated_score, 3.0);
    assert_eq!(row.calculated_level.level, "meets_expectations");
    assert_eq!(row.potential_score, Some(4.5));
    assert_eq!(row.nine_box, Some(NineBoxPosition::RoughDiamond));
    assert_eq!(listing.stats.potential_assigned, 1);
}

#[test]
fn corrupt_live_row_becomes_a_placeholder() {
    let (service, store, _) = build_service(store_with_cycle(CycleStatus::Active));
    let ada = seed_ada(&store);
    let broken = EmployeeId::from("emp-broken");
    seed_evaluatee(&store, &broken, "Broken Data", "eng", 4.0, 7.5);

    let listing = service
        .list_ratings_for_cycle(&tenant(), &cycle_id(), &request(1, 20))
        .expect("listing survives a bad row");

    assert_eq!(listing.data.len(), 2);
    let placeholder = listing
        .data
        .iter()
        .find(|row| row.evaluatee_id == broken)
        .expect("placeholder row");
    assert_eq!(placeholder.calculated_score, 0.0);
    assert_eq!(placeholder.effective_level.level, "unclassified");
    assert!(placeholder.rating_id.is_none());

    let healthy = listing
        .data
        .iter()
        .find(|row| row.evaluatee_id == ada)
        .expect("healthy row");
    assert_eq!(healthy.calculated_score, 3.5);
}

#[test]
fn search_and_department_scope_narrow_the_listing() {
    let (service, store, _) = build_service(store_with_cycle(CycleStatus::Active));
    seed_evaluatee(&store, &EmployeeId::from("emp-ada"), "Ada Lovelace", "eng", 4.0, 3.0);
    seed_evaluatee(&store, &EmployeeId::from("emp-grace"), "Grace Hopper", "ops", 4.0, 4.0);
    seed_evaluatee(&store, &EmployeeId::from("emp-alan"), "Alan Turing", "eng", 3.0, 3.0);
    let contractor = EmployeeId::from("ext-contractor");
    add_assignment(
        &store,
        &contractor,
        RaterType::ManagerToEmployee,
        AssignmentStatus::Completed,
        3.0,
    );

    let mut search = request(1, 20);
    search.filters.search = Some("  ADA ".to_string());
    let listing = service
        .list_ratings_for_cycle(&tenant(), &cycle_id(), &search)
        .expect("search");
    assert_eq!(listing.data.len(), 1);
    assert_eq!(listing.data[0].evaluatee_name, "Ada Lovelace");

    search.filters.search = Some("emp-".to_string());
    let listing = service
        .list_ratings_for_cycle(&tenant(), &cycle_id(), &search)
        .expect("id search");
    assert_eq!(listing.stats.total, 3);

    let everyone = service
        .list_ratings_for_cycle(&tenant(), &cycle_id(), &request(1, 20))
        .expect("unscoped");
    assert_eq!(everyone.stats.total, 4);
    let unknown = everyone
        .data
        .iter()
        .find(|row| row.evaluatee_id == contractor)
        .expect("directory miss still listed");
    assert_eq!(unknown.evaluatee_name, "ext-contractor");
    assert!(unknown.department_id.is_none());

    let scoped = ListRatingsRequest {
        filters: RatingFilters {
            department_ids: Some(vec![DepartmentId::from("eng")]),
            ..RatingFilters::default()
        },
        ..request(1, 20)
    };
    let listing = service
        .list_ratings_for_cycle(&tenant(), &cycle_id(), &scoped)
        .expect("scoped");
    assert_eq!(listing.stats.total, 2);
    assert!(listing
        .data
        .iter()
        .all(|row| row.department_id == Some(DepartmentId::from("eng"))));
}

#[test]
fn listing_requires_a_cycle_of_the_tenant() {
    let (service, _, _) = build_service(store_with_cycle(CycleStatus::Active));

    let error = service
        .list_ratings_for_cycle(&tenant(), &CycleId::from("nope"), &request(1, 20))
        .expect_err("unknown cycle");
    assert!(error.is_not_found());

    let error = service
        .list_ratings_for_cycle(&TenantId::from("globex"), &cycle_id(), &request(1, 20))
        .expect_err("foreign tenant");
    assert!(error.is_not_found());
}

fn store_rating(store: &InMemoryRatingStore, index: usize) -> RatingId {
    store
        .fetch_for_evaluatees(&cycle_id(), &[employee_id(index)])
        .expect("fetch")
        .pop()
        .expect("persisted rating")
        .id
}
