use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;
use validator::Validate;

use crate::error::{AppError, FieldErrors};
use crate::model::attendance::{AttendanceDay, BreakInterval, check_span};

pub const REMARK_REQUIRED: &str = "Please enter a remark";
pub const TIME_FORMAT_INVALID: &str = "Time must be in HH:MM format";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CorrectionStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn outcome(self) -> CorrectionStatus {
        match self {
            Decision::Approve => CorrectionStatus::Approved,
            Decision::Reject => CorrectionStatus::Rejected,
        }
    }
}

impl CorrectionStatus {
    /// Only pending requests can be decided; decided ones are frozen.
    pub fn review(self, decision: Decision) -> Result<CorrectionStatus, AppError> {
        match self {
            CorrectionStatus::Pending => Ok(decision.outcome()),
            done => Err(AppError::InvalidState(format!(
                "correction request is already {done}"
            ))),
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CorrectionRequest {
    pub id: u64,
    pub attendance_id: u64,
    pub requested_by: u64,
    pub clock_in_at: NaiveDateTime,
    pub clock_out_at: NaiveDateTime,
    pub breaks: Json<Vec<BreakInterval>>,
    pub remark: String,
    pub status: String,
    pub reviewed_by: Option<u64>,
    pub reviewed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl CorrectionRequest {
    pub fn status(&self) -> Result<CorrectionStatus, AppError> {
        self.status.parse().map_err(|_| {
            AppError::Internal(anyhow::anyhow!(
                "correction request {} has unknown status {:?}",
                self.id,
                self.status
            ))
        })
    }

    pub fn proposed_day(&self) -> AttendanceDay {
        let mut breaks = self.breaks.0.clone();
        breaks.sort_by_key(|b| b.start);
        AttendanceDay {
            clock_in_at: self.clock_in_at,
            clock_out_at: Some(self.clock_out_at),
            breaks,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct BreakForm {
    #[schema(example = "12:00")]
    #[serde(default)]
    pub start: String,
    #[schema(example = "13:00")]
    #[serde(default)]
    pub end: String,
}

impl BreakForm {
    fn is_blank(&self) -> bool {
        self.start.trim().is_empty() && self.end.trim().is_empty()
    }
}

/// Amended times for one day, as typed into the correction form. Times are
/// on the record's own work date.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct CorrectionForm {
    #[schema(example = "09:00")]
    #[serde(default)]
    pub clock_in: String,
    #[schema(example = "19:00")]
    #[serde(default)]
    pub clock_out: String,
    #[serde(default)]
    pub breaks: Vec<BreakForm>,
    #[schema(example = "Forgot to clock out after the release")]
    #[validate(length(max = 255, message = "Remark must be at most 255 characters"))]
    #[serde(default)]
    pub remark: String,
}

/// A validated, internally consistent amendment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub day: AttendanceDay,
    pub remark: String,
}

fn parse_hm(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M").ok()
}

impl CorrectionForm {
    pub fn to_proposal(&self, work_date: NaiveDate) -> Result<Proposal, AppError> {
        let mut errors = match self.validate() {
            Ok(()) => FieldErrors::new(),
            Err(e) => FieldErrors::from(e),
        };

        if self.remark.trim().is_empty() {
            errors.add("remark", REMARK_REQUIRED);
        }

        let clock_in = parse_hm(&self.clock_in).map(|t| work_date.and_time(t));
        let clock_out = parse_hm(&self.clock_out).map(|t| work_date.and_time(t));
        if clock_in.is_none() {
            errors.add("clock_in", TIME_FORMAT_INVALID);
        }
        if clock_out.is_none() {
            errors.add("clock_out", TIME_FORMAT_INVALID);
        }

        let mut breaks = Vec::new();
        for (index, row) in self.breaks.iter().enumerate() {
            if row.is_blank() {
                continue;
            }
            let start = parse_hm(&row.start);
            let end = if row.end.trim().is_empty() {
                Some(None)
            } else {
                parse_hm(&row.end).map(Some)
            };
            match (start, end) {
                (Some(start), Some(end)) => breaks.push((
                    index,
                    BreakInterval {
                        start: work_date.and_time(start),
                        end: end.map(|t| work_date.and_time(t)),
                    },
                )),
                _ => errors.add(format!("breaks.{index}"), TIME_FORMAT_INVALID),
            }
        }

        if let (Some(clock_in), Some(clock_out)) = (clock_in, clock_out) {
            errors.merge(check_span(clock_in, Some(clock_out), &breaks));
        }

        let old = serde_json::to_value(self).unwrap_or_default();
        match (clock_in, clock_out) {
            (Some(clock_in), Some(clock_out)) if errors.is_empty() => {
                let mut breaks: Vec<BreakInterval> = breaks.into_iter().map(|(_, b)| b).collect();
                breaks.sort_by_key(|b| b.start);
                Ok(Proposal {
                    day: AttendanceDay {
                        clock_in_at: clock_in,
                        clock_out_at: Some(clock_out),
                        breaks,
                    },
                    remark: self.remark.trim().to_string(),
                })
            }
            _ => Err(AppError::invalid(errors).with_old(old)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attendance::{BREAK_OVERLAP, CLOCK_RANGE_INVALID};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()
    }

    fn form(clock_in: &str, clock_out: &str, breaks: &[(&str, &str)], remark: &str) -> CorrectionForm {
        CorrectionForm {
            clock_in: clock_in.into(),
            clock_out: clock_out.into(),
            breaks: breaks
                .iter()
                .map(|(s, e)| BreakForm {
                    start: (*s).into(),
                    end: (*e).into(),
                })
                .collect(),
            remark: remark.into(),
        }
    }

    fn field_errors(err: AppError) -> FieldErrors {
        match err {
            AppError::Validation { errors, .. } => errors,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn valid_form_becomes_proposal_on_the_work_date() {
        let proposal = form("09:00", "19:00", &[("12:00", "13:00"), ("", "")], "late release")
            .to_proposal(date())
            .unwrap();

        assert_eq!(proposal.day.clock_in_at, date().and_hms_opt(9, 0, 0).unwrap());
        assert_eq!(proposal.day.clock_out_at, date().and_hms_opt(19, 0, 0));
        assert_eq!(proposal.day.breaks.len(), 1);
        assert_eq!(proposal.remark, "late release");
    }

    #[test]
    fn clock_out_before_clock_in_is_invalid() {
        let err = form("18:00", "09:00", &[], "typo").to_proposal(date()).unwrap_err();
        let errors = field_errors(err);
        assert_eq!(errors.get("clock_out").unwrap(), [CLOCK_RANGE_INVALID]);
    }

    #[test]
    fn overlapping_breaks_are_invalid() {
        let err = form("09:00", "18:00", &[("12:00", "13:00"), ("12:30", "14:00")], "x")
            .to_proposal(date())
            .unwrap_err();
        assert_eq!(field_errors(err).get("breaks.1").unwrap(), [BREAK_OVERLAP]);
    }

    #[test]
    fn remark_is_required_and_input_is_echoed() {
        let err = form("09:00", "18:00", &[], "   ").to_proposal(date()).unwrap_err();
        match err {
            AppError::Validation { errors, old } => {
                assert_eq!(errors.get("remark").unwrap(), [REMARK_REQUIRED]);
                assert_eq!(old["clock_in"], "09:00");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn malformed_times_are_reported_per_field() {
        let err = form("9am", "18:00", &[("noon", "13:00")], "x")
            .to_proposal(date())
            .unwrap_err();
        let errors = field_errors(err);
        assert_eq!(errors.get("clock_in").unwrap(), [TIME_FORMAT_INVALID]);
        assert_eq!(errors.get("breaks.0").unwrap(), [TIME_FORMAT_INVALID]);
    }

    #[test]
    fn pending_request_can_be_decided_once() {
        let approved = CorrectionStatus::Pending.review(Decision::Approve).unwrap();
        assert_eq!(approved, CorrectionStatus::Approved);

        let again = approved.review(Decision::Approve);
        assert!(matches!(again, Err(AppError::InvalidState(_))));
        let reject_after = CorrectionStatus::Rejected.review(Decision::Approve);
        assert!(matches!(reject_after, Err(AppError::InvalidState(_))));
    }

    #[test]
    fn status_round_trips_through_storage_text() {
        assert_eq!(CorrectionStatus::Approved.as_ref(), "approved");
        assert_eq!("rejected".parse::<CorrectionStatus>().unwrap(), CorrectionStatus::Rejected);
        assert!("done".parse::<CorrectionStatus>().is_err());
    }

    #[test]
    fn approved_proposal_replaces_clock_out() {
        // 18:00 -> 19:00 on 2024-01-10
        let request = CorrectionRequest {
            id: 1,
            attendance_id: 7,
            requested_by: 3,
            clock_in_at: date().and_hms_opt(9, 0, 0).unwrap(),
            clock_out_at: date().and_hms_opt(19, 0, 0).unwrap(),
            breaks: Json(vec![]),
            remark: "stayed late".into(),
            status: "pending".into(),
            reviewed_by: None,
            reviewed_at: None,
            created_at: date().and_hms_opt(20, 0, 0).unwrap(),
        };

        assert_eq!(request.status().unwrap(), CorrectionStatus::Pending);
        let day = request.proposed_day();
        assert_eq!(day.clock_out_at, date().and_hms_opt(19, 0, 0));
        assert!(day.check_closed().is_empty());
    }
}
