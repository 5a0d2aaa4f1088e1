use crate::api::views::{DayView, MonthQuery, MonthView, ProposalView};
use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::error::AppError;
use crate::model::attendance::WorkState;
use crate::service::clock::{self, ClockAction};
use crate::service::ledger;
use crate::service::records::{self, Viewer};
use crate::utils::month::Month;
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::MySqlPool;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct TodayView {
    #[schema(example = "2024-01-10", format = "date", value_type = String)]
    pub date: NaiveDate,
    pub state: WorkState,
    pub record: Option<DayView>,
}

/// Today's record and work state
#[utoipa::path(
    get,
    path = "/attendance",
    responses(
        (status = 200, description = "Today's attendance", body = TodayView),
        (status = 303, description = "Not signed in; redirects to /login")
    ),
    security(
        ("session_cookie" = [])
    ),
    tag = "Attendance"
)]
pub async fn today(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let today = clock::today(pool.get_ref(), auth.user_id, config.now()).await?;
    Ok(HttpResponse::Ok().json(TodayView {
        date: today.work_date,
        state: today.state(),
        record: today
            .record
            .as_ref()
            .map(|(record, day)| DayView::new(record, day)),
    }))
}

/// Clock-in endpoint
#[utoipa::path(
    post,
    path = "/attendance/clock-in",
    responses(
        (status = 200, description = "Clocked in", body = Object, example = json!({
            "message": "Clocked in"
        })),
        (status = 409, description = "Already clocked in today", body = Object, example = json!({
            "kind": "CONFLICT",
            "message": "already clocked in today"
        })),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("session_cookie" = [])
    ),
    tag = "Attendance"
)]
pub async fn clock_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let attendance_id = clock::clock_in(pool.get_ref(), auth.user_id, config.now()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Clocked in",
        "id": attendance_id
    })))
}

/// Clock-out endpoint
#[utoipa::path(
    post,
    path = "/attendance/clock-out",
    responses(
        (status = 200, description = "Clocked out", body = Object, example = json!({
            "message": "Clocked out"
        })),
        (status = 409, description = "Not clocked in, already clocked out, or on a break"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("session_cookie" = [])
    ),
    tag = "Attendance"
)]
pub async fn clock_out(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    record_action(ClockAction::ClockOut, "Clocked out", &auth, &pool, &config).await
}

/// Break-start endpoint
#[utoipa::path(
    post,
    path = "/attendance/start-break",
    responses(
        (status = 200, description = "Break started", body = Object, example = json!({
            "message": "Break started"
        })),
        (status = 409, description = "Not clocked in, already clocked out, or already on a break")
    ),
    security(
        ("session_cookie" = [])
    ),
    tag = "Attendance"
)]
pub async fn start_break(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    record_action(ClockAction::StartBreak, "Break started", &auth, &pool, &config).await
}

/// Break-end endpoint
#[utoipa::path(
    post,
    path = "/attendance/end-break",
    responses(
        (status = 200, description = "Break ended", body = Object, example = json!({
            "message": "Break ended"
        })),
        (status = 409, description = "No break in progress")
    ),
    security(
        ("session_cookie" = [])
    ),
    tag = "Attendance"
)]
pub async fn end_break(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    record_action(ClockAction::EndBreak, "Break ended", &auth, &pool, &config).await
}

async fn record_action(
    action: ClockAction,
    message: &'static str,
    auth: &AuthUser,
    pool: &MySqlPool,
    config: &Config,
) -> Result<HttpResponse, AppError> {
    let day = clock::apply(pool, auth.user_id, action, config.now()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": message,
        "state": day.state()
    })))
}

/// The signed-in user's month
#[utoipa::path(
    get,
    path = "/attendance/list",
    params(MonthQuery),
    responses(
        (status = 200, description = "Every day of the month with its record", body = MonthView),
        (status = 422, description = "Malformed month")
    ),
    security(
        ("session_cookie" = [])
    ),
    tag = "Attendance"
)]
pub async fn monthly(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<MonthQuery>,
) -> Result<HttpResponse, AppError> {
    let month = Month::parse_or_current(query.month.as_deref(), config.now().date())?;
    let records = ledger::month_records(pool.get_ref(), auth.user_id, month).await?;
    Ok(HttpResponse::Ok().json(MonthView::new(month, &records)))
}

#[derive(Serialize, ToSchema)]
pub struct RecordDetailView {
    #[schema(example = 3)]
    pub user_id: u64,
    #[schema(example = "Yamada Taro")]
    pub name: String,
    pub record: DayView,
    /// Outstanding correction request, if any
    pub pending_request: Option<ProposalView>,
}

impl From<records::RecordDetail> for RecordDetailView {
    fn from(detail: records::RecordDetail) -> Self {
        Self {
            user_id: detail.owner.id,
            name: detail.owner.full_name(),
            record: DayView::new(&detail.record, &detail.day),
            pending_request: detail.pending.as_ref().map(ProposalView::from),
        }
    }
}

/// One of the user's own records
#[utoipa::path(
    get,
    path = "/attendances/{id}/detail",
    params(
        ("id" = u64, Path, description = "Attendance record id")
    ),
    responses(
        (status = 200, description = "Record with breaks and pending correction", body = RecordDetailView),
        (status = 404, description = "No such record for this user")
    ),
    security(
        ("session_cookie" = [])
    ),
    tag = "Attendance"
)]
pub async fn detail(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let viewer = if auth.is_admin() {
        Viewer::Admin
    } else {
        Viewer::Member(auth.user_id)
    };
    let detail = records::detail(pool.get_ref(), viewer, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(RecordDetailView::from(detail)))
}
