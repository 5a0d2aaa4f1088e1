use chrono::NaiveDate;

use crate::model::attendance::AttendanceDay;
use crate::utils::format::{clock_time, hours_minutes};
use crate::utils::month::Month;

pub const CSV_HEADER: &str = "date,clock_in,clock_out,break_total,worked_total";

/// One line per recorded day, in the order given. Open days leave
/// `clock_out` and `worked_total` empty.
pub fn render_attendance(days: &[(NaiveDate, AttendanceDay)]) -> String {
    let mut out = String::with_capacity(CSV_HEADER.len() + 2 + days.len() * 40);
    out.push_str(CSV_HEADER);
    out.push_str("\r\n");

    for (date, day) in days {
        let clock_out = day.clock_out_at.map(clock_time).unwrap_or_default();
        let worked = day.worked_total().map(hours_minutes).unwrap_or_default();
        out.push_str(&format!(
            "{},{},{},{},{}\r\n",
            date.format("%Y-%m-%d"),
            clock_time(day.clock_in_at),
            clock_out,
            hours_minutes(day.break_total()),
            worked,
        ));
    }
    out
}

pub fn file_name(user_id: u64, month: Month) -> String {
    format!("attendance_{user_id}_{month}.csv")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attendance::BreakInterval;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn renders_header_and_closed_and_open_days() {
        let d10 = date(10);
        let closed = AttendanceDay {
            clock_in_at: d10.and_hms_opt(9, 0, 0).unwrap(),
            clock_out_at: d10.and_hms_opt(18, 0, 0),
            breaks: vec![BreakInterval::closed(
                d10.and_hms_opt(12, 0, 0).unwrap(),
                d10.and_hms_opt(13, 0, 0).unwrap(),
            )],
        };
        let open = AttendanceDay::clocked_in(date(11).and_hms_opt(9, 30, 0).unwrap());

        let csv = render_attendance(&[(d10, closed), (date(11), open)]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines[1], "2024-01-10,09:00,18:00,1:00,8:00");
        assert_eq!(lines[2], "2024-01-11,09:30,,0:00,");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn empty_month_is_header_only() {
        assert_eq!(render_attendance(&[]).trim_end(), CSV_HEADER);
        let month = Month::parse("2024-01").unwrap();
        assert_eq!(file_name(3, month), "attendance_3_2024-01.csv");
    }
}
