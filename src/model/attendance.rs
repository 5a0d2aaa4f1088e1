use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::FieldErrors;

pub const CLOCK_RANGE_INVALID: &str = "Clock-in or clock-out time is invalid";
pub const BREAK_INVALID: &str = "Break time is invalid";
pub const BREAK_AFTER_CLOCK_OUT: &str = "Break time or clock-out time is invalid";
pub const BREAK_OVERLAP: &str = "Breaks must not overlap";
pub const BREAK_INCOMPLETE: &str = "Break start and end are both required";

/// A break inside a work day. `end` stays empty while the break is ongoing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakInterval {
    pub start: NaiveDateTime,
    pub end: Option<NaiveDateTime>,
}

impl BreakInterval {
    pub fn open(start: NaiveDateTime) -> Self {
        Self { start, end: None }
    }

    pub fn closed(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    pub fn duration(&self) -> Duration {
        self.end
            .map(|end| end - self.start)
            .unwrap_or_else(Duration::zero)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Attendance {
    pub id: u64,
    pub user_id: u64,
    pub work_date: NaiveDate,
    pub clock_in_at: NaiveDateTime,
    pub clock_out_at: Option<NaiveDateTime>,
    pub remark: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BreakRow {
    pub attendance_id: u64,
    pub start_at: NaiveDateTime,
    pub end_at: Option<NaiveDateTime>,
}

impl From<&BreakRow> for BreakInterval {
    fn from(row: &BreakRow) -> Self {
        Self {
            start: row.start_at,
            end: row.end_at,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WorkState {
    OffDuty,
    Working,
    OnBreak,
    Finished,
}

/// Reasons a clock or break action is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ClockConflict {
    #[error("already clocked in today")]
    AlreadyClockedIn,
    #[error("not clocked in today")]
    NotClockedIn,
    #[error("already clocked out today")]
    AlreadyClockedOut,
    #[error("a break is already in progress")]
    BreakInProgress,
    #[error("no break in progress")]
    NoBreakInProgress,
    #[error("the clock reads earlier than the last recorded time")]
    ClockSkew,
}

/// One user's attendance for one work date: the span plus its breaks in
/// start order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceDay {
    pub clock_in_at: NaiveDateTime,
    pub clock_out_at: Option<NaiveDateTime>,
    pub breaks: Vec<BreakInterval>,
}

impl AttendanceDay {
    pub fn clocked_in(at: NaiveDateTime) -> Self {
        Self {
            clock_in_at: at,
            clock_out_at: None,
            breaks: Vec::new(),
        }
    }

    pub fn from_parts(record: &Attendance, mut breaks: Vec<BreakInterval>) -> Self {
        breaks.sort_by_key(|b| b.start);
        Self {
            clock_in_at: record.clock_in_at,
            clock_out_at: record.clock_out_at,
            breaks,
        }
    }

    pub fn state(&self) -> WorkState {
        if self.clock_out_at.is_some() {
            WorkState::Finished
        } else if self.open_break().is_some() {
            WorkState::OnBreak
        } else {
            WorkState::Working
        }
    }

    pub fn open_break(&self) -> Option<&BreakInterval> {
        self.breaks.iter().find(|b| b.is_open())
    }

    /// Latest instant already recorded for the day.
    fn last_mark(&self) -> NaiveDateTime {
        self.breaks
            .iter()
            .map(|b| b.end.unwrap_or(b.start))
            .fold(self.clock_in_at, NaiveDateTime::max)
    }

    pub fn clock_out(&mut self, now: NaiveDateTime) -> Result<(), ClockConflict> {
        if self.clock_out_at.is_some() {
            return Err(ClockConflict::AlreadyClockedOut);
        }
        if self.open_break().is_some() {
            return Err(ClockConflict::BreakInProgress);
        }
        if now <= self.clock_in_at || now < self.last_mark() {
            return Err(ClockConflict::ClockSkew);
        }
        self.clock_out_at = Some(now);
        Ok(())
    }

    pub fn start_break(&mut self, now: NaiveDateTime) -> Result<(), ClockConflict> {
        if self.clock_out_at.is_some() {
            return Err(ClockConflict::AlreadyClockedOut);
        }
        if self.open_break().is_some() {
            return Err(ClockConflict::BreakInProgress);
        }
        if now < self.last_mark() {
            return Err(ClockConflict::ClockSkew);
        }
        self.breaks.push(BreakInterval::open(now));
        Ok(())
    }

    pub fn end_break(&mut self, now: NaiveDateTime) -> Result<(), ClockConflict> {
        let open = self
            .breaks
            .iter_mut()
            .find(|b| b.is_open())
            .ok_or(ClockConflict::NoBreakInProgress)?;
        if now <= open.start {
            return Err(ClockConflict::ClockSkew);
        }
        open.end = Some(now);
        Ok(())
    }

    /// Sum of closed breaks.
    pub fn break_total(&self) -> Duration {
        self.breaks
            .iter()
            .fold(Duration::zero(), |acc, b| acc + b.duration())
    }

    /// Span minus breaks, once the day is closed.
    pub fn worked_total(&self) -> Option<Duration> {
        self.clock_out_at
            .map(|out| out - self.clock_in_at - self.break_total())
    }

    /// Checks a fully specified day (proposal or admin edit). Field names
    /// follow the correction form.
    pub fn check_closed(&self) -> FieldErrors {
        let indexed: Vec<(usize, BreakInterval)> = self.breaks.iter().copied().enumerate().collect();
        check_span(self.clock_in_at, self.clock_out_at, &indexed)
    }
}

pub fn state_of(day: Option<&AttendanceDay>) -> WorkState {
    day.map(AttendanceDay::state).unwrap_or(WorkState::OffDuty)
}

/// Validates a closed span and its breaks. Each break carries the index it
/// had in the submitted form so errors land on the right row.
pub fn check_span(
    clock_in: NaiveDateTime,
    clock_out: Option<NaiveDateTime>,
    breaks: &[(usize, BreakInterval)],
) -> FieldErrors {
    let mut errors = FieldErrors::new();

    let span_ok = matches!(clock_out, Some(out) if out > clock_in);
    if !span_ok {
        errors.add("clock_out", CLOCK_RANGE_INVALID);
    }

    let mut well_formed = Vec::with_capacity(breaks.len());
    for &(index, interval) in breaks {
        let field = format!("breaks.{index}");
        let Some(end) = interval.end else {
            errors.add(field, BREAK_INCOMPLETE);
            continue;
        };
        if end <= interval.start || interval.start < clock_in {
            errors.add(field, BREAK_INVALID);
            continue;
        }
        if let Some(out) = clock_out {
            if span_ok && (interval.start >= out || end > out) {
                errors.add(field, BREAK_AFTER_CLOCK_OUT);
                continue;
            }
        }
        well_formed.push((index, interval.start, end));
    }

    well_formed.sort_by_key(|&(_, start, _)| start);
    for pair in well_formed.windows(2) {
        let (_, _, prev_end) = pair[0];
        let (index, start, _) = pair[1];
        if start < prev_end {
            errors.add(format!("breaks.{index}"), BREAK_OVERLAP);
        }
    }

    errors
}
