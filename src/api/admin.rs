use crate::api::attendance::RecordDetailView;
use crate::api::views::{DayView, MonthQuery, MonthView};
use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::error::AppError;
use crate::model::correction::CorrectionForm;
use crate::model::user::{StaffMember, join_name};
use crate::service::records::{self, Viewer};
use crate::service::{correction, ledger, users};
use crate::utils::csv_export;
use crate::utils::month::Month;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{HttpResponse, web};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

pub const DATE_FORMAT_INVALID: &str = "Date must be in YYYY-MM-DD format";

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct DateQuery {
    /// Work date, `YYYY-MM-DD`; defaults to today
    #[schema(example = "2024-01-10")]
    pub date: Option<String>,
}

impl DateQuery {
    pub fn parse_or(&self, today: NaiveDate) -> Result<NaiveDate, AppError> {
        match self.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
            Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| AppError::invalid_field("date", DATE_FORMAT_INVALID)),
            None => Ok(today),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct DailyRowView {
    #[schema(example = 3)]
    pub user_id: u64,
    #[schema(example = "Yamada Taro")]
    pub name: String,
    pub record: DayView,
}

#[derive(Serialize, ToSchema)]
pub struct DailyListView {
    #[schema(example = "2024-01-10", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "2024-01-09", format = "date", value_type = String)]
    pub previous: NaiveDate,
    #[schema(example = "2024-01-11", format = "date", value_type = String)]
    pub next: NaiveDate,
    pub records: Vec<DailyRowView>,
}

/// Everyone's attendance for one date
#[utoipa::path(
    get,
    path = "/admin/attendance/list",
    params(DateQuery),
    responses(
        (status = 200, description = "Records of the day, by name", body = DailyListView),
        (status = 403, description = "Not an admin"),
        (status = 422, description = "Malformed date")
    ),
    security(
        ("session_cookie" = [])
    ),
    tag = "Admin"
)]
pub async fn daily_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<DateQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    let date = query.parse_or(config.now().date())?;
    let rows = ledger::daily_records(pool.get_ref(), date).await?;

    let records = rows
        .into_iter()
        .map(|(named, day)| DailyRowView {
            user_id: named.user_id,
            name: join_name(&named.last_name, &named.first_name),
            record: DayView::new(&named.record(), &day),
        })
        .collect();

    Ok(HttpResponse::Ok().json(DailyListView {
        date,
        previous: date.checked_sub_days(Days::new(1)).unwrap_or(date),
        next: date.checked_add_days(Days::new(1)).unwrap_or(date),
        records,
    }))
}

/// Any member's record
#[utoipa::path(
    get,
    path = "/admin/attendance/{id}",
    params(
        ("id" = u64, Path, description = "Attendance record id")
    ),
    responses(
        (status = 200, description = "Record with breaks and pending correction", body = RecordDetailView),
        (status = 404, description = "Attendance record not found")
    ),
    security(
        ("session_cookie" = [])
    ),
    tag = "Admin"
)]
pub async fn record_detail(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    let detail = records::detail(pool.get_ref(), Viewer::Admin, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(RecordDetailView::from(detail)))
}

/// Direct correction of a record by an admin
#[utoipa::path(
    post,
    path = "/admin/attendance/{id}/update",
    params(
        ("id" = u64, Path, description = "Attendance record id")
    ),
    request_body(
        content = CorrectionForm,
        description = "Replacement times and a remark",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Record updated", body = Object, example = json!({
            "message": "Attendance updated"
        })),
        (status = 404, description = "Attendance record not found"),
        (status = 409, description = "A correction request for the record is pending"),
        (status = 422, description = "Invalid times")
    ),
    security(
        ("session_cookie" = [])
    ),
    tag = "Admin"
)]
pub async fn update_record(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    form: web::Json<CorrectionForm>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    let attendance_id = path.into_inner();
    let day = correction::update_record(pool.get_ref(), auth.user_id, attendance_id, &form).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Attendance updated",
        "id": attendance_id,
        "state": day.state()
    })))
}

#[derive(Serialize, ToSchema)]
pub struct StaffListView {
    pub data: Vec<StaffMember>,
    #[schema(example = 1)]
    pub total: usize,
}

/// All member accounts
#[utoipa::path(
    get,
    path = "/admin/staff/list",
    responses(
        (status = 200, description = "Members by name", body = StaffListView),
        (status = 403, description = "Not an admin")
    ),
    security(
        ("session_cookie" = [])
    ),
    tag = "Admin"
)]
pub async fn staff_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    let data = users::list_staff(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(StaffListView {
        total: data.len(),
        data,
    }))
}

#[derive(Serialize, ToSchema)]
pub struct StaffMonthView {
    #[schema(example = 3)]
    pub user_id: u64,
    #[schema(example = "Yamada Taro")]
    pub name: String,
    #[schema(example = "taro@example.com")]
    pub email: String,
    pub attendance: MonthView,
}

/// One member's month
#[utoipa::path(
    get,
    path = "/admin/attendance/staff/{id}",
    params(
        ("id" = u64, Path, description = "User id"),
        MonthQuery
    ),
    responses(
        (status = 200, description = "Every day of the month with its record", body = StaffMonthView),
        (status = 404, description = "User not found"),
        (status = 422, description = "Malformed month")
    ),
    security(
        ("session_cookie" = [])
    ),
    tag = "Admin"
)]
pub async fn staff_monthly(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
    query: web::Query<MonthQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    let month = Month::parse_or_current(query.month.as_deref(), config.now().date())?;
    let staff = records::staff_month(pool.get_ref(), path.into_inner(), month).await?;

    Ok(HttpResponse::Ok().json(StaffMonthView {
        user_id: staff.user.id,
        name: staff.user.full_name(),
        email: staff.user.email.clone(),
        attendance: MonthView::new(month, &staff.days),
    }))
}

/// One member's month as CSV
#[utoipa::path(
    get,
    path = "/admin/attendance/staff/{id}/csv",
    params(
        ("id" = u64, Path, description = "User id"),
        MonthQuery
    ),
    responses(
        (status = 200, description = "date,clock_in,clock_out,break_total,worked_total", content_type = "text/csv", body = String),
        (status = 404, description = "User not found")
    ),
    security(
        ("session_cookie" = [])
    ),
    tag = "Admin"
)]
pub async fn staff_csv(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
    query: web::Query<MonthQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    let month = Month::parse_or_current(query.month.as_deref(), config.now().date())?;
    let staff = records::staff_month(pool.get_ref(), path.into_inner(), month).await?;

    let days: Vec<_> = staff
        .days
        .into_iter()
        .map(|(record, day)| (record.work_date, day))
        .collect();
    let body = csv_export::render_attendance(&days);

    tracing::info!(user_id = staff.user.id, %month, rows = days.len(), "CSV export");

    Ok(HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(csv_export::file_name(
                staff.user.id,
                month,
            ))],
        })
        .body(body))
}
