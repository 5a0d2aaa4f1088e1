//! Read models over the ledger for members and admins.
use sqlx::MySqlPool;

use crate::error::AppError;
use crate::model::attendance::{Attendance, AttendanceDay};
use crate::model::correction::CorrectionRequest;
use crate::model::user::User;
use crate::service::{correction, ledger, users};
use crate::utils::month::Month;

/// Who is asking: members only see their own records.
#[derive(Debug, Clone, Copy)]
pub enum Viewer {
    Member(u64),
    Admin,
}

pub struct RecordDetail {
    pub record: Attendance,
    pub day: AttendanceDay,
    pub owner: User,
    pub pending: Option<CorrectionRequest>,
}

/// A foreign record reads as missing, so ids do not leak.
pub async fn detail(pool: &MySqlPool, viewer: Viewer, attendance_id: u64) -> Result<RecordDetail, AppError> {
    let record = ledger::find(pool, attendance_id)
        .await?
        .filter(|r| match viewer {
            Viewer::Member(user_id) => r.user_id == user_id,
            Viewer::Admin => true,
        })
        .ok_or(AppError::NotFound("attendance record"))?;

    let breaks = ledger::breaks(pool, record.id).await?;
    let day = AttendanceDay::from_parts(&record, breaks);
    let owner = users::find_by_id(pool, record.user_id)
        .await?
        .ok_or(AppError::NotFound("user"))?;
    let pending = correction::pending_for(pool, record.id).await?;

    Ok(RecordDetail {
        record,
        day,
        owner,
        pending,
    })
}

pub struct StaffMonth {
    pub user: User,
    pub days: Vec<(Attendance, AttendanceDay)>,
}

pub async fn staff_month(pool: &MySqlPool, user_id: u64, month: Month) -> Result<StaffMonth, AppError> {
    let user = users::find_by_id(pool, user_id)
        .await?
        .ok_or(AppError::NotFound("user"))?;
    let days = ledger::month_records(pool, user.id, month).await?;
    Ok(StaffMonth { user, days })
}
