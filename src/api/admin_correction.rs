use crate::api::views::{CorrectionListView, DayView, ProposalView, StatusQuery};
use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::error::AppError;
use crate::model::correction::Decision;
use crate::service::correction::{self, Scope};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct DecisionForm {
    #[schema(example = "approve")]
    pub decision: Decision,
}

#[derive(Serialize, ToSchema)]
pub struct RequestDetailView {
    #[schema(example = 3)]
    pub requested_by: u64,
    #[schema(example = "Yamada Taro")]
    pub requester_name: String,
    pub request: ProposalView,
    /// The record as it stands now
    pub current: DayView,
}

/// All correction requests, newest first
#[utoipa::path(
    get,
    path = "/admin/stamp_correction_request/list",
    params(StatusQuery),
    responses(
        (status = 200, description = "Requests from every member", body = CorrectionListView),
        (status = 403, description = "Not an admin"),
        (status = 422, description = "Unknown status filter")
    ),
    security(
        ("session_cookie" = [])
    ),
    tag = "Correction"
)]
pub async fn list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<StatusQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    let status = query.parse()?;
    let rows = correction::list(pool.get_ref(), Scope::All, status).await?;
    Ok(HttpResponse::Ok().json(CorrectionListView::new(rows)))
}

/// A request next to the record it would change
#[utoipa::path(
    get,
    path = "/admin/stamp_correction_request/approve/{id}",
    params(
        ("id" = u64, Path, description = "Correction request id")
    ),
    responses(
        (status = 200, description = "Request with the current record", body = RequestDetailView),
        (status = 404, description = "Correction request not found")
    ),
    security(
        ("session_cookie" = [])
    ),
    tag = "Correction"
)]
pub async fn show(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    let detail = correction::show(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(RequestDetailView {
        requested_by: detail.requester.id,
        requester_name: detail.requester.full_name(),
        request: ProposalView::from(&detail.request),
        current: DayView::new(&detail.record, &detail.current),
    }))
}

/// Approve or reject a pending request
#[utoipa::path(
    post,
    path = "/admin/stamp_correction_request/approve/{id}",
    params(
        ("id" = u64, Path, description = "Correction request id")
    ),
    request_body(
        content = DecisionForm,
        description = "approve applies the proposal to the record; reject leaves it untouched",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Request decided", body = Object, example = json!({
            "message": "Correction request approved",
            "status": "approved"
        })),
        (status = 404, description = "Correction request not found"),
        (status = 409, description = "Request already decided", body = Object, example = json!({
            "kind": "INVALID_STATE",
            "message": "correction request is already approved"
        }))
    ),
    security(
        ("session_cookie" = [])
    ),
    tag = "Correction"
)]
pub async fn decide(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
    form: web::Json<DecisionForm>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    let status = correction::decide(
        pool.get_ref(),
        auth.user_id,
        path.into_inner(),
        form.decision,
        config.now(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": format!("Correction request {status}"),
        "status": status
    })))
}
