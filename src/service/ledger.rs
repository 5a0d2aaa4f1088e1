//! Row access for `attendances` and `attendance_breaks`.
//!
//! Single-statement helpers take any executor (pool or transaction);
//! helpers issuing several statements take a connection.
use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{Executor, MySql, MySqlConnection, MySqlPool};

use crate::model::attendance::{Attendance, AttendanceDay, BreakInterval, BreakRow};
use crate::utils::db_utils::placeholders;
use crate::utils::month::Month;

const ATTENDANCE_COLUMNS: &str = "id, user_id, work_date, clock_in_at, clock_out_at, remark";

pub async fn find<'c, E>(executor: E, id: u64) -> Result<Option<Attendance>, sqlx::Error>
where
    E: Executor<'c, Database = MySql>,
{
    sqlx::query_as::<_, Attendance>(&format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendances WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub async fn find_for_update<'c, E>(executor: E, id: u64) -> Result<Option<Attendance>, sqlx::Error>
where
    E: Executor<'c, Database = MySql>,
{
    sqlx::query_as::<_, Attendance>(&format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendances WHERE id = ? FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub async fn find_by_date<'c, E>(
    executor: E,
    user_id: u64,
    work_date: NaiveDate,
) -> Result<Option<Attendance>, sqlx::Error>
where
    E: Executor<'c, Database = MySql>,
{
    sqlx::query_as::<_, Attendance>(&format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendances WHERE user_id = ? AND work_date = ?"
    ))
    .bind(user_id)
    .bind(work_date)
    .fetch_optional(executor)
    .await
}

pub async fn find_by_date_for_update<'c, E>(
    executor: E,
    user_id: u64,
    work_date: NaiveDate,
) -> Result<Option<Attendance>, sqlx::Error>
where
    E: Executor<'c, Database = MySql>,
{
    sqlx::query_as::<_, Attendance>(&format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendances \
         WHERE user_id = ? AND work_date = ? FOR UPDATE"
    ))
    .bind(user_id)
    .bind(work_date)
    .fetch_optional(executor)
    .await
}

pub async fn breaks<'c, E>(executor: E, attendance_id: u64) -> Result<Vec<BreakInterval>, sqlx::Error>
where
    E: Executor<'c, Database = MySql>,
{
    let rows = sqlx::query_as::<_, BreakRow>(
        r#"
        SELECT attendance_id, start_at, end_at
        FROM attendance_breaks
        WHERE attendance_id = ?
        ORDER BY start_at, id
        "#,
    )
    .bind(attendance_id)
    .fetch_all(executor)
    .await?;

    Ok(rows.iter().map(BreakInterval::from).collect())
}

/// Breaks of several records in one round trip.
pub async fn breaks_for(pool: &MySqlPool, attendance_ids: &[u64]) -> Result<Vec<BreakRow>, sqlx::Error> {
    if attendance_ids.is_empty() {
        return Ok(Vec::new());
    }

    let sql = format!(
        "SELECT attendance_id, start_at, end_at FROM attendance_breaks \
         WHERE attendance_id IN ({}) ORDER BY attendance_id, start_at, id",
        placeholders(attendance_ids.len())
    );
    let mut query = sqlx::query_as::<_, BreakRow>(&sql);
    for id in attendance_ids {
        query = query.bind(*id);
    }
    query.fetch_all(pool).await
}

/// The record's day with its breaks, read on the same connection.
pub async fn load_day(conn: &mut MySqlConnection, record: &Attendance) -> Result<AttendanceDay, sqlx::Error> {
    let breaks = breaks(&mut *conn, record.id).await?;
    Ok(AttendanceDay::from_parts(record, breaks))
}

/// Pairs each record with its breaks, keeping the record order.
pub fn attach_breaks(records: Vec<Attendance>, rows: &[BreakRow]) -> Vec<(Attendance, AttendanceDay)> {
    let mut by_record: HashMap<u64, Vec<BreakInterval>> = HashMap::new();
    for row in rows {
        by_record.entry(row.attendance_id).or_default().push(row.into());
    }

    records
        .into_iter()
        .map(|record| {
            let breaks = by_record.remove(&record.id).unwrap_or_default();
            let day = AttendanceDay::from_parts(&record, breaks);
            (record, day)
        })
        .collect()
}

/// A user's records inside `month`, ascending by date.
pub async fn month_records(
    pool: &MySqlPool,
    user_id: u64,
    month: Month,
) -> Result<Vec<(Attendance, AttendanceDay)>, sqlx::Error> {
    let (start, end) = month.bounds();
    let records = sqlx::query_as::<_, Attendance>(&format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendances \
         WHERE user_id = ? AND work_date >= ? AND work_date < ? \
         ORDER BY work_date"
    ))
    .bind(user_id)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    let ids: Vec<u64> = records.iter().map(|r| r.id).collect();
    let rows = breaks_for(pool, &ids).await?;
    Ok(attach_breaks(records, &rows))
}

/// Attendance row joined with its owner's name.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NamedAttendance {
    pub id: u64,
    pub user_id: u64,
    pub work_date: NaiveDate,
    pub clock_in_at: NaiveDateTime,
    pub clock_out_at: Option<NaiveDateTime>,
    pub remark: Option<String>,
    pub last_name: String,
    pub first_name: String,
}

impl NamedAttendance {
    pub fn record(&self) -> Attendance {
        Attendance {
            id: self.id,
            user_id: self.user_id,
            work_date: self.work_date,
            clock_in_at: self.clock_in_at,
            clock_out_at: self.clock_out_at,
            remark: self.remark.clone(),
        }
    }
}

/// Everyone's records for one date, ordered by name.
pub async fn daily_records(
    pool: &MySqlPool,
    work_date: NaiveDate,
) -> Result<Vec<(NamedAttendance, AttendanceDay)>, sqlx::Error> {
    let rows = sqlx::query_as::<_, NamedAttendance>(
        r#"
        SELECT a.id, a.user_id, a.work_date, a.clock_in_at, a.clock_out_at, a.remark,
               u.last_name, u.first_name
        FROM attendances a
        JOIN users u ON u.id = a.user_id
        WHERE a.work_date = ?
        ORDER BY u.last_name, u.first_name, u.id
        "#,
    )
    .bind(work_date)
    .fetch_all(pool)
    .await?;

    let ids: Vec<u64> = rows.iter().map(|r| r.id).collect();
    let break_rows = breaks_for(pool, &ids).await?;
    let records = rows.iter().map(NamedAttendance::record).collect();

    Ok(rows
        .into_iter()
        .zip(attach_breaks(records, &break_rows))
        .map(|(named, (_, day))| (named, day))
        .collect())
}

/// Inserts today's record. Fails with a duplicate-key error when one
/// already exists for (user, date).
pub async fn insert_clock_in<'c, E>(
    executor: E,
    user_id: u64,
    at: NaiveDateTime,
) -> Result<u64, sqlx::Error>
where
    E: Executor<'c, Database = MySql>,
{
    let done = sqlx::query(
        r#"
        INSERT INTO attendances (user_id, work_date, clock_in_at)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(at.date())
    .bind(at)
    .execute(executor)
    .await?;
    Ok(done.last_insert_id())
}

pub async fn set_clock_out<'c, E>(executor: E, attendance_id: u64, at: NaiveDateTime) -> Result<(), sqlx::Error>
where
    E: Executor<'c, Database = MySql>,
{
    sqlx::query("UPDATE attendances SET clock_out_at = ? WHERE id = ?")
        .bind(at)
        .bind(attendance_id)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn open_break<'c, E>(executor: E, attendance_id: u64, at: NaiveDateTime) -> Result<(), sqlx::Error>
where
    E: Executor<'c, Database = MySql>,
{
    sqlx::query("INSERT INTO attendance_breaks (attendance_id, start_at) VALUES (?, ?)")
        .bind(attendance_id)
        .bind(at)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn close_break<'c, E>(executor: E, attendance_id: u64, at: NaiveDateTime) -> Result<(), sqlx::Error>
where
    E: Executor<'c, Database = MySql>,
{
    sqlx::query("UPDATE attendance_breaks SET end_at = ? WHERE attendance_id = ? AND end_at IS NULL")
        .bind(at)
        .bind(attendance_id)
        .execute(executor)
        .await?;
    Ok(())
}

/// Overwrites span, breaks and remark of a locked record.
pub async fn replace_day(
    conn: &mut MySqlConnection,
    attendance_id: u64,
    day: &AttendanceDay,
    remark: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE attendances SET clock_in_at = ?, clock_out_at = ?, remark = ? WHERE id = ?")
        .bind(day.clock_in_at)
        .bind(day.clock_out_at)
        .bind(remark)
        .bind(attendance_id)
        .execute(&mut *conn)
        .await?;

    sqlx::query("DELETE FROM attendance_breaks WHERE attendance_id = ?")
        .bind(attendance_id)
        .execute(&mut *conn)
        .await?;

    for interval in &day.breaks {
        sqlx::query("INSERT INTO attendance_breaks (attendance_id, start_at, end_at) VALUES (?, ?, ?)")
            .bind(attendance_id)
            .bind(interval.start)
            .bind(interval.end)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}
