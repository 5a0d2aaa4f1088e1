//! JSON view models shared by the member and admin screens.
use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::AppError;
use crate::model::attendance::{Attendance, AttendanceDay, BreakInterval};
use crate::model::correction::{CorrectionRequest, CorrectionStatus};
use crate::model::user::join_name;
use crate::service::correction::RequestSummary;
use crate::utils::format::{clock_time, hours_minutes, opt_clock_time};
use crate::utils::month::Month;

pub const STATUS_INVALID: &str = "Status must be one of pending, approved, rejected";

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct MonthQuery {
    /// Calendar month, `YYYY-MM`; defaults to the current month
    #[schema(example = "2024-01")]
    pub month: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct StatusQuery {
    /// Filter by request status
    #[schema(example = "pending")]
    pub status: Option<String>,
}

impl StatusQuery {
    pub fn parse(&self) -> Result<Option<CorrectionStatus>, AppError> {
        match self.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| AppError::invalid_field("status", STATUS_INVALID)),
            None => Ok(None),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BreakView {
    #[schema(example = "12:00")]
    pub start: String,
    #[schema(example = "13:00")]
    pub end: Option<String>,
}

impl From<&BreakInterval> for BreakView {
    fn from(interval: &BreakInterval) -> Self {
        Self {
            start: clock_time(interval.start),
            end: opt_clock_time(interval.end),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DayView {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "2024-01-10", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "09:00")]
    pub clock_in: String,
    #[schema(example = "18:00")]
    pub clock_out: Option<String>,
    pub breaks: Vec<BreakView>,
    /// Sum of closed breaks, `H:MM`
    #[schema(example = "1:00")]
    pub break_total: String,
    /// Span minus breaks, `H:MM`; empty until clock-out
    #[schema(example = "8:00")]
    pub worked_total: Option<String>,
    pub remark: Option<String>,
}

impl DayView {
    pub fn new(record: &Attendance, day: &AttendanceDay) -> Self {
        Self {
            id: record.id,
            date: record.work_date,
            clock_in: clock_time(day.clock_in_at),
            clock_out: opt_clock_time(day.clock_out_at),
            breaks: day.breaks.iter().map(BreakView::from).collect(),
            break_total: hours_minutes(day.break_total()),
            worked_total: day.worked_total().map(hours_minutes),
            remark: record.remark.clone(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MonthDayView {
    #[schema(example = "2024-01-10", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "Wed")]
    pub weekday: String,
    pub record: Option<DayView>,
}

/// Every day of a month, with its record where one exists.
#[derive(Debug, Serialize, ToSchema)]
pub struct MonthView {
    #[schema(example = "2024-01")]
    pub month: String,
    #[schema(example = "2023-12")]
    pub previous: String,
    #[schema(example = "2024-02")]
    pub next: String,
    pub days: Vec<MonthDayView>,
}

impl MonthView {
    pub fn new(month: Month, records: &[(Attendance, AttendanceDay)]) -> Self {
        let by_date: HashMap<NaiveDate, &(Attendance, AttendanceDay)> =
            records.iter().map(|entry| (entry.0.work_date, entry)).collect();

        let days = month
            .days()
            .map(|date| MonthDayView {
                date,
                weekday: date.format("%a").to_string(),
                record: by_date
                    .get(&date)
                    .map(|(record, day)| DayView::new(record, day)),
            })
            .collect();

        Self {
            month: month.to_string(),
            previous: month.previous().to_string(),
            next: month.next().to_string(),
            days,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CorrectionView {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 7)]
    pub attendance_id: u64,
    #[schema(example = "2024-01-10", format = "date", value_type = String)]
    pub work_date: NaiveDate,
    #[schema(example = 3)]
    pub requested_by: u64,
    #[schema(example = "Yamada Taro")]
    pub requester_name: String,
    #[schema(example = "Forgot to clock out")]
    pub remark: String,
    #[schema(example = "pending")]
    pub status: String,
    #[schema(example = "2024-01-10T20:00:00", format = "date-time", value_type = String)]
    pub created_at: NaiveDateTime,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub reviewed_at: Option<NaiveDateTime>,
}

impl From<RequestSummary> for CorrectionView {
    fn from(row: RequestSummary) -> Self {
        Self {
            id: row.id,
            attendance_id: row.attendance_id,
            work_date: row.work_date,
            requested_by: row.requested_by,
            requester_name: join_name(&row.last_name, &row.first_name),
            remark: row.remark,
            status: row.status,
            created_at: row.created_at,
            reviewed_at: row.reviewed_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CorrectionListView {
    pub data: Vec<CorrectionView>,
    #[schema(example = 1)]
    pub total: usize,
}

impl CorrectionListView {
    pub fn new(rows: Vec<RequestSummary>) -> Self {
        let data: Vec<CorrectionView> = rows.into_iter().map(CorrectionView::from).collect();
        Self {
            total: data.len(),
            data,
        }
    }
}

/// The amended times a request proposes.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProposalView {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "pending")]
    pub status: String,
    #[schema(example = "09:00")]
    pub clock_in: String,
    #[schema(example = "19:00")]
    pub clock_out: String,
    pub breaks: Vec<BreakView>,
    pub remark: String,
    #[schema(example = "2024-01-10T20:00:00", format = "date-time", value_type = String)]
    pub created_at: NaiveDateTime,
    pub reviewed_by: Option<u64>,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub reviewed_at: Option<NaiveDateTime>,
}

impl From<&CorrectionRequest> for ProposalView {
    fn from(request: &CorrectionRequest) -> Self {
        let day = request.proposed_day();
        Self {
            id: request.id,
            status: request.status.clone(),
            clock_in: clock_time(day.clock_in_at),
            clock_out: clock_time(request.clock_out_at),
            breaks: day.breaks.iter().map(BreakView::from).collect(),
            remark: request.remark.clone(),
            created_at: request.created_at,
            reviewed_by: request.reviewed_by,
            reviewed_at: request.reviewed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(day: u32) -> (Attendance, AttendanceDay) {
        let date = NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        let record = Attendance {
            id: u64::from(day),
            user_id: 1,
            work_date: date,
            clock_in_at: date.and_hms_opt(9, 0, 0).unwrap(),
            clock_out_at: date.and_hms_opt(18, 30, 0),
            remark: None,
        };
        let day = AttendanceDay::from_parts(
            &record,
            vec![BreakInterval::closed(
                date.and_hms_opt(12, 0, 0).unwrap(),
                date.and_hms_opt(12, 45, 0).unwrap(),
            )],
        );
        (record, day)
    }

    #[test]
    fn day_view_shows_totals() {
        let (record, day) = record(10);
        let view = DayView::new(&record, &day);
        assert_eq!(view.clock_in, "09:00");
        assert_eq!(view.clock_out.as_deref(), Some("18:30"));
        assert_eq!(view.break_total, "0:45");
        assert_eq!(view.worked_total.as_deref(), Some("8:45"));
    }

    #[test]
    fn month_view_lists_every_day() {
        let month = Month::parse("2024-01").unwrap();
        let view = MonthView::new(month, &[record(10)]);

        assert_eq!(view.days.len(), 31);
        assert_eq!(view.previous, "2023-12");
        assert_eq!(view.next, "2024-02");
        assert!(view.days[9].record.is_some());
        assert_eq!(view.days[9].weekday, "Wed");
        assert_eq!(view.days.iter().filter(|d| d.record.is_some()).count(), 1);
    }

    #[test]
    fn status_filter_parses_or_rejects() {
        let query = |s: Option<&str>| StatusQuery {
            status: s.map(str::to_string),
        };
        assert_eq!(query(None).parse().unwrap(), None);
        assert_eq!(query(Some("")).parse().unwrap(), None);
        assert_eq!(
            query(Some("approved")).parse().unwrap(),
            Some(CorrectionStatus::Approved)
        );
        assert!(matches!(
            query(Some("done")).parse(),
            Err(AppError::Validation { .. })
        ));
    }
}
