use chrono::{Duration, NaiveDateTime};

/// Wall-clock time as `HH:MM`.
pub fn clock_time(at: NaiveDateTime) -> String {
    at.format("%H:%M").to_string()
}

pub fn opt_clock_time(at: Option<NaiveDateTime>) -> Option<String> {
    at.map(clock_time)
}

/// Duration as `H:MM`; negative spans read as zero.
pub fn hours_minutes(duration: Duration) -> String {
    let minutes = duration.num_minutes().max(0);
    format!("{}:{:02}", minutes / 60, minutes % 60)
}
