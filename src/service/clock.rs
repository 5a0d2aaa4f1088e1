use chrono::{NaiveDate, NaiveDateTime};
use sqlx::MySqlPool;
use strum::Display;

use crate::error::AppError;
use crate::model::attendance::{Attendance, AttendanceDay, ClockConflict, WorkState, state_of};
use crate::service::ledger;
use crate::utils::db_utils::is_duplicate_key;

/// Transitions on a day that already has a clock-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ClockAction {
    ClockOut,
    StartBreak,
    EndBreak,
}

impl ClockAction {
    pub fn apply(self, day: &mut AttendanceDay, now: NaiveDateTime) -> Result<(), ClockConflict> {
        match self {
            ClockAction::ClockOut => day.clock_out(now),
            ClockAction::StartBreak => day.start_break(now),
            ClockAction::EndBreak => day.end_break(now),
        }
    }

    /// What a day with no record yet reports.
    fn missing_day(self) -> ClockConflict {
        match self {
            ClockAction::EndBreak => ClockConflict::NoBreakInProgress,
            ClockAction::ClockOut | ClockAction::StartBreak => ClockConflict::NotClockedIn,
        }
    }
}

/// Opens today's record. The (user, date) unique key turns a second
/// clock-in into a conflict, however the requests interleave.
pub async fn clock_in(pool: &MySqlPool, user_id: u64, now: NaiveDateTime) -> Result<u64, AppError> {
    match ledger::insert_clock_in(pool, user_id, now).await {
        Ok(attendance_id) => {
            tracing::info!(user_id, attendance_id, "Clocked in");
            Ok(attendance_id)
        }
        Err(e) if is_duplicate_key(&e) => Err(ClockConflict::AlreadyClockedIn.into()),
        Err(e) => {
            tracing::error!(error = %e, user_id, "Clock-in failed");
            Err(e.into())
        }
    }
}

/// Applies `action` to today's record under a row lock, so repeated
/// submissions are serialized and the second one conflicts.
pub async fn apply(
    pool: &MySqlPool,
    user_id: u64,
    action: ClockAction,
    now: NaiveDateTime,
) -> Result<AttendanceDay, AppError> {
    let mut tx = pool.begin().await?;

    let record = ledger::find_by_date_for_update(&mut *tx, user_id, now.date())
        .await?
        .ok_or(action.missing_day())?;

    let mut day = ledger::load_day(&mut tx, &record).await?;
    action.apply(&mut day, now)?;

    match action {
        ClockAction::ClockOut => ledger::set_clock_out(&mut *tx, record.id, now).await?,
        ClockAction::StartBreak => ledger::open_break(&mut *tx, record.id, now).await?,
        ClockAction::EndBreak => ledger::close_break(&mut *tx, record.id, now).await?,
    }

    tx.commit().await?;
    tracing::info!(user_id, attendance_id = record.id, %action, "Clock action recorded");
    Ok(day)
}

pub struct Today {
    pub work_date: NaiveDate,
    pub record: Option<(Attendance, AttendanceDay)>,
}

impl Today {
    pub fn state(&self) -> WorkState {
        state_of(self.record.as_ref().map(|(_, day)| day))
    }
}

pub async fn today(pool: &MySqlPool, user_id: u64, now: NaiveDateTime) -> Result<Today, AppError> {
    let work_date = now.date();
    let record = match ledger::find_by_date(pool, user_id, work_date).await? {
        Some(record) => {
            let breaks = ledger::breaks(pool, record.id).await?;
            let day = AttendanceDay::from_parts(&record, breaks);
            Some((record, day))
        }
        None => None,
    };
    Ok(Today { work_date, record })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 10)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn actions_drive_the_day() {
        let mut day = AttendanceDay::clocked_in(at(9, 0));
        ClockAction::StartBreak.apply(&mut day, at(12, 0)).unwrap();
        ClockAction::EndBreak.apply(&mut day, at(13, 0)).unwrap();
        assert_eq!(
            ClockAction::EndBreak.apply(&mut day, at(13, 5)),
            Err(ClockConflict::NoBreakInProgress)
        );
        ClockAction::ClockOut.apply(&mut day, at(18, 0)).unwrap();
        assert_eq!(day.state(), WorkState::Finished);
    }

    #[test]
    fn missing_day_reports_per_action() {
        assert_eq!(ClockAction::ClockOut.missing_day(), ClockConflict::NotClockedIn);
        assert_eq!(ClockAction::StartBreak.missing_day(), ClockConflict::NotClockedIn);
        assert_eq!(ClockAction::EndBreak.missing_day(), ClockConflict::NoBreakInProgress);
    }

    #[test]
    fn action_names_are_snake_case() {
        assert_eq!(ClockAction::StartBreak.to_string(), "start_break");
    }

    #[test]
    fn today_without_record_is_off_duty() {
        let today = Today {
            work_date: at(0, 0).date(),
            record: None,
        };
        assert_eq!(today.state(), WorkState::OffDuty);
    }
}
