//! Correction-request workflow: members propose, admins decide.
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::types::Json;
use sqlx::{Executor, MySql, MySqlConnection, MySqlPool, QueryBuilder};

use crate::error::AppError;
use crate::model::attendance::{Attendance, AttendanceDay};
use crate::model::correction::{CorrectionForm, CorrectionRequest, CorrectionStatus, Decision};
use crate::model::user::User;
use crate::service::{ledger, users};

pub const NOT_YOUR_RECORD: &str = "You can only request corrections to your own attendance";
pub const ALREADY_PENDING: &str = "a correction request for this day is already pending";

const REQUEST_COLUMNS: &str = "id, attendance_id, requested_by, clock_in_at, clock_out_at, breaks, \
                               remark, status, reviewed_by, reviewed_at, created_at";

/// Whose requests a listing covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Own(u64),
    All,
}

pub async fn find<'c, E>(executor: E, id: u64) -> Result<Option<CorrectionRequest>, sqlx::Error>
where
    E: Executor<'c, Database = MySql>,
{
    sqlx::query_as::<_, CorrectionRequest>(&format!(
        "SELECT {REQUEST_COLUMNS} FROM correction_requests WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

async fn find_for_update(
    conn: &mut MySqlConnection,
    id: u64,
) -> Result<Option<CorrectionRequest>, sqlx::Error> {
    sqlx::query_as::<_, CorrectionRequest>(&format!(
        "SELECT {REQUEST_COLUMNS} FROM correction_requests WHERE id = ? FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await
}

/// The outstanding request for a record, if any.
pub async fn pending_for<'c, E>(
    executor: E,
    attendance_id: u64,
) -> Result<Option<CorrectionRequest>, sqlx::Error>
where
    E: Executor<'c, Database = MySql>,
{
    sqlx::query_as::<_, CorrectionRequest>(&format!(
        "SELECT {REQUEST_COLUMNS} FROM correction_requests \
         WHERE attendance_id = ? AND status = 'pending' \
         ORDER BY id DESC LIMIT 1"
    ))
    .bind(attendance_id)
    .fetch_optional(executor)
    .await
}

/// Files a pending request against one of the user's own records. The
/// record itself is left untouched.
pub async fn submit(
    pool: &MySqlPool,
    user_id: u64,
    attendance_id: u64,
    form: &CorrectionForm,
) -> Result<u64, AppError> {
    let mut tx = pool.begin().await?;

    let record = ledger::find_for_update(&mut *tx, attendance_id)
        .await?
        .ok_or(AppError::NotFound("attendance record"))?;

    let old = serde_json::to_value(form).unwrap_or_default();
    if record.user_id != user_id {
        tracing::info!(user_id, attendance_id, "Correction refused: not the owner");
        return Err(AppError::invalid_field("attendance", NOT_YOUR_RECORD).with_old(old));
    }

    let proposal = form.to_proposal(record.work_date)?;

    if pending_for(&mut *tx, attendance_id).await?.is_some() {
        return Err(AppError::Conflict(ALREADY_PENDING.to_string()));
    }

    let done = sqlx::query(
        r#"
        INSERT INTO correction_requests
            (attendance_id, requested_by, clock_in_at, clock_out_at, breaks, remark, status)
        VALUES (?, ?, ?, ?, ?, ?, 'pending')
        "#,
    )
    .bind(attendance_id)
    .bind(user_id)
    .bind(proposal.day.clock_in_at)
    .bind(proposal.day.clock_out_at)
    .bind(Json(&proposal.day.breaks))
    .bind(&proposal.remark)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    let request_id = done.last_insert_id();
    tracing::info!(user_id, attendance_id, request_id, "Correction request submitted");
    Ok(request_id)
}

/// One line of a request listing.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RequestSummary {
    pub id: u64,
    pub attendance_id: u64,
    pub work_date: NaiveDate,
    pub requested_by: u64,
    pub last_name: String,
    pub first_name: String,
    pub remark: String,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub reviewed_at: Option<NaiveDateTime>,
}

/// Newest first; ties go to the higher id.
pub async fn list(
    pool: &MySqlPool,
    scope: Scope,
    status: Option<CorrectionStatus>,
) -> Result<Vec<RequestSummary>, sqlx::Error> {
    let mut query: QueryBuilder<MySql> = QueryBuilder::new(
        r#"
        SELECT c.id, c.attendance_id, a.work_date, c.requested_by,
               u.last_name, u.first_name, c.remark, c.status, c.created_at, c.reviewed_at
        FROM correction_requests c
        JOIN attendances a ON a.id = c.attendance_id
        JOIN users u ON u.id = c.requested_by
        WHERE 1 = 1
        "#,
    );

    if let Scope::Own(user_id) = scope {
        query.push(" AND c.requested_by = ").push_bind(user_id);
    }
    if let Some(status) = status {
        query.push(" AND c.status = ").push_bind(status.as_ref().to_string());
    }
    query.push(" ORDER BY c.created_at DESC, c.id DESC");

    query.build_query_as::<RequestSummary>().fetch_all(pool).await
}

pub struct RequestDetail {
    pub request: CorrectionRequest,
    pub record: Attendance,
    /// The record as it stands now, next to the proposal.
    pub current: AttendanceDay,
    pub requester: User,
}

pub async fn show(pool: &MySqlPool, request_id: u64) -> Result<RequestDetail, AppError> {
    let request = find(pool, request_id)
        .await?
        .ok_or(AppError::NotFound("correction request"))?;
    let record = ledger::find(pool, request.attendance_id)
        .await?
        .ok_or(AppError::NotFound("attendance record"))?;
    let breaks = ledger::breaks(pool, record.id).await?;
    let current = AttendanceDay::from_parts(&record, breaks);
    let requester = users::find_by_id(pool, request.requested_by)
        .await?
        .ok_or(AppError::NotFound("user"))?;

    Ok(RequestDetail {
        request,
        record,
        current,
        requester,
    })
}

pub async fn decide(
    pool: &MySqlPool,
    admin_id: u64,
    request_id: u64,
    decision: Decision,
    now: NaiveDateTime,
) -> Result<CorrectionStatus, AppError> {
    match decision {
        Decision::Approve => approve(pool, admin_id, request_id, now).await,
        Decision::Reject => reject(pool, admin_id, request_id, now).await,
    }
}

/// Applies the proposal to the record and closes the request, all in one
/// transaction. The record is written at most once per request.
pub async fn approve(
    pool: &MySqlPool,
    admin_id: u64,
    request_id: u64,
    now: NaiveDateTime,
) -> Result<CorrectionStatus, AppError> {
    let mut tx = pool.begin().await?;

    let request = find_for_update(&mut tx, request_id)
        .await?
        .ok_or(AppError::NotFound("correction request"))?;
    let outcome = request.status()?.review(Decision::Approve)?;

    let record = ledger::find_for_update(&mut *tx, request.attendance_id)
        .await?
        .ok_or(AppError::NotFound("attendance record"))?;

    let day = request.proposed_day();
    let errors = day.check_closed();
    if !errors.is_empty() {
        tracing::warn!(request_id, attendance_id = record.id, "Stored proposal no longer valid");
        return Err(AppError::invalid(errors));
    }

    ledger::replace_day(&mut tx, record.id, &day, &request.remark).await?;

    if !transition(&mut tx, request_id, outcome, admin_id, now).await? {
        tx.rollback().await?;
        return Err(AppError::InvalidState(
            "correction request was decided concurrently".to_string(),
        ));
    }

    tx.commit().await?;
    tracing::info!(request_id, attendance_id = record.id, admin_id, "Correction approved");
    Ok(outcome)
}

pub async fn reject(
    pool: &MySqlPool,
    admin_id: u64,
    request_id: u64,
    now: NaiveDateTime,
) -> Result<CorrectionStatus, AppError> {
    let mut tx = pool.begin().await?;

    let request = find_for_update(&mut tx, request_id)
        .await?
        .ok_or(AppError::NotFound("correction request"))?;
    let outcome = request.status()?.review(Decision::Reject)?;

    if !transition(&mut tx, request_id, outcome, admin_id, now).await? {
        tx.rollback().await?;
        return Err(AppError::InvalidState(
            "correction request was decided concurrently".to_string(),
        ));
    }

    tx.commit().await?;
    tracing::info!(request_id, admin_id, "Correction rejected");
    Ok(outcome)
}

/// Compare-and-swap out of `pending`; false when someone else got there first.
async fn transition(
    conn: &mut MySqlConnection,
    request_id: u64,
    outcome: CorrectionStatus,
    admin_id: u64,
    now: NaiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE correction_requests
        SET status = ?, reviewed_by = ?, reviewed_at = ?
        WHERE id = ?
        AND status = 'pending'
        "#,
    )
    .bind(outcome.as_ref())
    .bind(admin_id)
    .bind(now)
    .bind(request_id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Direct admin correction. Refused while a member's request for the same
/// record is still open, so a later approval cannot silently undo it.
pub async fn update_record(
    pool: &MySqlPool,
    admin_id: u64,
    attendance_id: u64,
    form: &CorrectionForm,
) -> Result<AttendanceDay, AppError> {
    let mut tx = pool.begin().await?;

    let record = ledger::find_for_update(&mut *tx, attendance_id)
        .await?
        .ok_or(AppError::NotFound("attendance record"))?;

    if pending_for(&mut *tx, attendance_id).await?.is_some() {
        tracing::info!(attendance_id, "Direct update refused: correction pending");
        return Err(AppError::Conflict(ALREADY_PENDING.to_string()));
    }

    let proposal = form.to_proposal(record.work_date)?;
    ledger::replace_day(&mut tx, record.id, &proposal.day, &proposal.remark).await?;

    tx.commit().await?;
    tracing::info!(attendance_id, admin_id, "Attendance record updated by admin");
    Ok(proposal.day)
}
