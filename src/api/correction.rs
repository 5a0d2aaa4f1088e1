use crate::api::views::{CorrectionListView, StatusQuery};
use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::model::correction::CorrectionForm;
use crate::service::correction::{self, Scope};
use actix_web::{HttpResponse, web};
use sqlx::MySqlPool;

/// Submit a correction request for one of the user's records
#[utoipa::path(
    post,
    path = "/attendance/{id}/correction",
    params(
        ("id" = u64, Path, description = "Attendance record to correct")
    ),
    request_body(
        content = CorrectionForm,
        description = "Amended times on the record's date, with a reason",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Request filed as pending", body = Object, example = json!({
            "message": "Correction request submitted",
            "id": 1,
            "status": "pending"
        })),
        (status = 404, description = "Attendance record not found"),
        (status = 409, description = "A request for this day is already pending"),
        (status = 422, description = "Invalid proposal", body = Object, example = json!({
            "kind": "VALIDATION",
            "message": "the given data was invalid",
            "errors": { "clock_out": ["Clock-in or clock-out time is invalid"] },
            "old": { "clock_in": "18:00", "clock_out": "09:00", "breaks": [], "remark": "typo" }
        }))
    ),
    security(
        ("session_cookie" = [])
    ),
    tag = "Correction"
)]
pub async fn submit(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    form: web::Json<CorrectionForm>,
) -> Result<HttpResponse, AppError> {
    let request_id =
        correction::submit(pool.get_ref(), auth.user_id, path.into_inner(), &form).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Correction request submitted",
        "id": request_id,
        "status": "pending"
    })))
}

/// The user's own correction requests, newest first
#[utoipa::path(
    get,
    path = "/stamp_correction_request/list",
    params(StatusQuery),
    responses(
        (status = 200, description = "Own requests", body = CorrectionListView),
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
    let status = query.parse()?;
    let rows = correction::list(pool.get_ref(), Scope::Own(auth.user_id), status).await?;
    Ok(HttpResponse::Ok().json(CorrectionListView::new(rows)))
}
