use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::calibration::CalibrationRequest;
use super::domain::{
    ActorId, CalibrationSessionId, CycleId, DepartmentId, EmployeeId, RaterType, RatingId,
    TenantId,
};
use super::levels::PerformanceBand;
use super::listing::{
    EvaluationStatus, ListRatingsRequest, PotentialStatus, RatingFilters, RatingSort,
    RatingSortField, SortDirection,
};
use super::potential::PotentialInput;
use super::repository::{AuditSink, RatingStore};
use super::service::{RatingService, RatingServiceError};

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const ACTOR_HEADER: &str = "x-actor-id";
/// Comma separated department ids the caller may see; absent means unrestricted.
pub const DEPARTMENT_SCOPE_HEADER: &str = "x-department-scope";

/// Router exposing rating generation, calibration and read endpoints.
pub fn rating_router<S, A>(service: Arc<RatingService<S, A>>) -> Router
where
    S: RatingStore + 'static,
    A: AuditSink + 'static,
{
    Router::new()
        .route(
            "/api/v1/cycles/:cycle_id/evaluatees/:evaluatee_id/rating",
            post(generate_handler::<S, A>),
        )
        .route(
            "/api/v1/cycles/:cycle_id/evaluatees/:evaluatee_id/competencies",
            get(competency_handler::<S, A>),
        )
        .route(
            "/api/v1/cycles/:cycle_id/ratings/generate",
            post(bulk_generate_handler::<S, A>),
        )
        .route("/api/v1/cycles/:cycle_id/ratings", get(list_handler::<S, A>))
        .route("/api/v1/cycles/:cycle_id/nine-box", get(nine_box_handler::<S, A>))
        .route(
            "/api/v1/cycles/:cycle_id/calibration-sessions/:session_id",
            get(session_handler::<S, A>),
        )
        .route(
            "/api/v1/ratings/:rating_id/calibration",
            post(calibrate_handler::<S, A>).delete(revert_handler::<S, A>),
        )
        .route(
            "/api/v1/ratings/:rating_id/potential",
            put(potential_handler::<S, A>),
        )
        .route("/api/v1/config/weights", put(weights_handler::<S, A>))
        .route("/api/v1/config/levels", put(levels_handler::<S, A>))
        .with_state(service)
}

fn bad_request(message: String) -> Response {
    let payload = json!({ "error": message });
    (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
}

fn required_header(headers: &HeaderMap, name: &'static str) -> Result<String, Response> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| bad_request(format!("missing {name} header")))
}

fn tenant(headers: &HeaderMap) -> Result<TenantId, Response> {
    required_header(headers, TENANT_HEADER).map(TenantId)
}

fn identity(headers: &HeaderMap) -> Result<(TenantId, ActorId), Response> {
    let tenant_id = tenant(headers)?;
    let actor_id = required_header(headers, ACTOR_HEADER).map(ActorId)?;
    Ok((tenant_id, actor_id))
}

fn split_departments(raw: &str) -> Vec<DepartmentId> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(DepartmentId::from)
        .collect()
}

/// Department scope from the identity header, narrowed by an optional query value.
fn department_scope(headers: &HeaderMap, requested: Option<&str>) -> Option<Vec<DepartmentId>> {
    let granted = headers
        .get(DEPARTMENT_SCOPE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(split_departments);
    let requested = requested.map(split_departments);

    match (granted, requested) {
        (Some(granted), Some(requested)) => Some(
            requested
                .into_iter()
                .filter(|department| granted.contains(department))
                .collect(),
        ),
        (granted, requested) => granted.or(requested),
    }
}

fn error_response(error: RatingServiceError) -> Response {
    let status = if error.is_not_found() {
        StatusCode::NOT_FOUND
    } else if error.is_validation() {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}

fn ok_json<T: serde::Serialize>(value: T) -> Response {
    (StatusCode::OK, axum::Json(value)).into_response()
}

pub(crate) async fn generate_handler<S, A>(
    State(service): State<Arc<RatingService<S, A>>>,
    Path((cycle_id, evaluatee_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response
where
    S: RatingStore + 'static,
    A: AuditSink + 'static,
{
    let tenant_id = match tenant(&headers) {
        Ok(tenant_id) => tenant_id,
        Err(response) => return response,
    };

    match service.generate_rating(&tenant_id, &CycleId(cycle_id), &EmployeeId(evaluatee_id)) {
        Ok(generated) => ok_json(generated),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn bulk_generate_handler<S, A>(
    State(service): State<Arc<RatingService<S, A>>>,
    Path(cycle_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    S: RatingStore + 'static,
    A: AuditSink + 'static,
{
    let tenant_id = match tenant(&headers) {
        Ok(tenant_id) => tenant_id,
        Err(response) => return response,
    };

    match service
        .generate_ratings_for_cycle(&tenant_id, &CycleId(cycle_id))
        .await
    {
        Ok(summary) => ok_json(summary),
        Err(error) => error_response(error),
    }
}

/// Query string accepted by the listing endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub sort: Option<RatingSortField>,
    pub direction: Option<SortDirection>,
    pub evaluation_status: Option<EvaluationStatus>,
    pub potential_status: Option<PotentialStatus>,
    pub search: Option<String>,
    pub departments: Option<String>,
}

pub(crate) async fn list_handler<S, A>(
    State(service): State<Arc<RatingService<S, A>>>,
    Path(cycle_id): Path<String>,
    Query(params): Query<ListParams>,
    headers: HeaderMap,
) -> Response
where
    S: RatingStore + 'static,
    A: AuditSink + 'static,
{
    let tenant_id = match tenant(&headers) {
        Ok(tenant_id) => tenant_id,
        Err(response) => return response,
    };

    let request = ListRatingsRequest {
        page: params.page,
        limit: params.limit,
        sort: RatingSort::new(
            params.sort.unwrap_or_default(),
            params.direction.unwrap_or_default(),
        ),
        filters: RatingFilters {
            evaluation_status: params.evaluation_status,
            potential_status: params.potential_status,
            search: params.search,
            department_ids: department_scope(&headers, params.departments.as_deref()),
        },
    };

    match service.list_ratings_for_cycle(&tenant_id, &CycleId(cycle_id), &request) {
        Ok(listing) => ok_json(listing),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ScopeParams {
    pub departments: Option<String>,
}

pub(crate) async fn nine_box_handler<S, A>(
    State(service): State<Arc<RatingService<S, A>>>,
    Path(cycle_id): Path<String>,
    Query(params): Query<ScopeParams>,
    headers: HeaderMap,
) -> Response
where
    S: RatingStore + 'static,
    A: AuditSink + 'static,
{
    let tenant_id = match tenant(&headers) {
        Ok(tenant_id) => tenant_id,
        Err(response) => return response,
    };
    let scope = department_scope(&headers, params.departments.as_deref());

    match service.nine_box_data(&tenant_id, &CycleId(cycle_id), scope) {
        Ok(grid) => ok_json(grid),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn competency_handler<S, A>(
    State(service): State<Arc<RatingService<S, A>>>,
    Path((cycle_id, evaluatee_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response
where
    S: RatingStore + 'static,
    A: AuditSink + 'static,
{
    let tenant_id = match tenant(&headers) {
        Ok(tenant_id) => tenant_id,
        Err(response) => return response,
    };

    match service.competency_breakdown(&tenant_id, &CycleId(cycle_id), &EmployeeId(evaluatee_id))
    {
        Ok(breakdown) => ok_json(breakdown),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn session_handler<S, A>(
    State(service): State<Arc<RatingService<S, A>>>,
    Path((cycle_id, session_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response
where
    S: RatingStore + 'static,
    A: AuditSink + 'static,
{
    let tenant_id = match tenant(&headers) {
        Ok(tenant_id) => tenant_id,
        Err(response) => return response,
    };

    match service.calibration_session(
        &tenant_id,
        &CycleId(cycle_id),
        &CalibrationSessionId(session_id),
    ) {
        Ok(summary) => ok_json(summary),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn calibrate_handler<S, A>(
    State(service): State<Arc<RatingService<S, A>>>,
    Path(rating_id): Path<String>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<CalibrationRequest>,
) -> Response
where
    S: RatingStore + 'static,
    A: AuditSink + 'static,
{
    let (tenant_id, actor_id) = match identity(&headers) {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    match service.calibrate_rating(&tenant_id, &RatingId(rating_id), request, actor_id) {
        Ok(rating) => ok_json(rating),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn revert_handler<S, A>(
    State(service): State<Arc<RatingService<S, A>>>,
    Path(rating_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    S: RatingStore + 'static,
    A: AuditSink + 'static,
{
    let (tenant_id, actor_id) = match identity(&headers) {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    match service.revert_calibration(&tenant_id, &RatingId(rating_id), actor_id) {
        Ok(rating) => ok_json(rating),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
pub struct PotentialBody {
    #[serde(flatten)]
    pub input: PotentialInput,
    #[serde(default)]
    pub notes: Option<String>,
}

pub(crate) async fn potential_handler<S, A>(
    State(service): State<Arc<RatingService<S, A>>>,
    Path(rating_id): Path<String>,
    headers: HeaderMap,
    axum::Json(body): axum::Json<PotentialBody>,
) -> Response
where
    S: RatingStore + 'static,
    A: AuditSink + 'static,
{
    let (tenant_id, actor_id) = match identity(&headers) {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    match service.rate_potential(
        &tenant_id,
        &RatingId(rating_id),
        &body.input,
        body.notes,
        actor_id,
    ) {
        Ok(rating) => ok_json(rating),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
pub struct WeightsBody {
    #[serde(default)]
    pub cycle_id: Option<CycleId>,
    pub weights: BTreeMap<RaterType, f64>,
}

pub(crate) async fn weights_handler<S, A>(
    State(service): State<Arc<RatingService<S, A>>>,
    headers: HeaderMap,
    axum::Json(body): axum::Json<WeightsBody>,
) -> Response
where
    S: RatingStore + 'static,
    A: AuditSink + 'static,
{
    let tenant_id = match tenant(&headers) {
        Ok(tenant_id) => tenant_id,
        Err(response) => return response,
    };

    match service.configure_weights(&tenant_id, body.cycle_id.as_ref(), body.weights) {
        Ok(weights) => ok_json(json!({ "weights": weights })),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn levels_handler<S, A>(
    State(service): State<Arc<RatingService<S, A>>>,
    headers: HeaderMap,
    axum::Json(bands): axum::Json<Vec<PerformanceBand>>,
) -> Response
where
    S: RatingStore + 'static,
    A: AuditSink + 'static,
{
    let tenant_id = match tenant(&headers) {
        Ok(tenant_id) => tenant_id,
        Err(response) => return response,
    };

    match service.configure_levels(&tenant_id, bands) {
        Ok(levels) => ok_json(json!({ "bands": levels })),
        Err(error) => error_response(error),
    }
}
