use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::OrgId;
use super::service::{AnalyzeRequest, LeaveDecisionService, LeaveServiceError};
use super::store::{LeaveStore, PolicyStore};

/// Router builder exposing the leave decision endpoints.
pub fn leave_router<S, P>(service: Arc<LeaveDecisionService<S, P>>) -> Router
where
    S: LeaveStore + 'static,
    P: PolicyStore + 'static,
{
    Router::new()
        .route("/api/v1/leave/analyze", post(analyze_handler::<S, P>))
        .route("/api/v1/leave/validate", post(validate_handler::<S, P>))
        .route("/api/v1/leave/rules", get(default_rules_handler::<S, P>))
        .route(
            "/api/v1/leave/rules/:org_id",
            get(org_rules_handler::<S, P>),
        )
        .route(
            "/api/v1/leave/cache/clear",
            post(clear_cache_handler::<S, P>),
        )
        .with_state(service)
}

pub(crate) async fn analyze_handler<S, P>(
    State(service): State<Arc<LeaveDecisionService<S, P>>>,
    axum::Json(input): axum::Json<AnalyzeRequest>,
) -> Response
where
    S: LeaveStore + 'static,
    P: PolicyStore + 'static,
{
    match service.analyze(input) {
        Ok(response) => (StatusCode::OK, axum::Json(response)).into_response(),
        Err(error @ LeaveServiceError::InvalidRequest(_)) => {
            let payload = json!({
                "error": error.to_string(),
            });
            (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn validate_handler<S, P>(
    State(service): State<Arc<LeaveDecisionService<S, P>>>,
    axum::Json(input): axum::Json<AnalyzeRequest>,
) -> Response
where
    S: LeaveStore + 'static,
    P: PolicyStore + 'static,
{
    match service.validate(input) {
        Ok(response) => (StatusCode::OK, axum::Json(response)).into_response(),
        Err(error @ LeaveServiceError::InvalidRequest(_)) => {
            let payload = json!({
                "error": error.to_string(),
            });
            (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn default_rules_handler<S, P>(
    State(service): State<Arc<LeaveDecisionService<S, P>>>,
) -> Response
where
    S: LeaveStore + 'static,
    P: PolicyStore + 'static,
{
    (StatusCode::OK, axum::Json(service.rules(None))).into_response()
}

pub(crate) async fn org_rules_handler<S, P>(
    State(service): State<Arc<LeaveDecisionService<S, P>>>,
    Path(org_id): Path<String>,
) -> Response
where
    S: LeaveStore + 'static,
    P: PolicyStore + 'static,
{
    let org = OrgId(org_id);
    (StatusCode::OK, axum::Json(service.rules(Some(&org)))).into_response()
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ClearCacheRequest {
    #[serde(default)]
    org_id: Option<String>,
}

pub(crate) async fn clear_cache_handler<S, P>(
    State(service): State<Arc<LeaveDecisionService<S, P>>>,
    axum::Json(request): axum::Json<ClearCacheRequest>,
) -> Response
where
    S: LeaveStore + 'static,
    P: PolicyStore + 'static,
{
    let org = request.org_id.map(OrgId);
    service.clear_rule_cache(org.as_ref());
    let payload = json!({
        "cleared": org.as_ref().map(|org| org.0.as_str()).unwrap_or("all"),
    });
    (StatusCode::OK, axum::Json(payload)).into_response()
}
