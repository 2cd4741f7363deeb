use chrono::{Datelike, Months, TimeZone, Utc};
use mongodb::bson::DateTime;

pub fn to_chrono(dt: DateTime) -> chrono::DateTime<Utc> {
    Utc.timestamp_millis_opt(dt.timestamp_millis())
        .single()
        .unwrap_or_else(Utc::now)
}

pub fn from_chrono(dt: chrono::DateTime<Utc>) -> DateTime {
    DateTime::from_millis(dt.timestamp_millis())
}

pub fn to_rfc3339(dt: DateTime) -> String {
    to_chrono(dt).to_rfc3339()
}

/// Calendar-month addition. A day that does not exist in the target month
/// clamps to that month's last day: 2024-01-31 + 1 = 2024-02-29.
pub fn add_months(start: DateTime, months: u32) -> Option<DateTime> {
    to_chrono(start)
        .checked_add_months(Months::new(months))
        .map(from_chrono)
}

/// (month, year) of a timestamp, for the card expiry printed on the membership.
pub fn month_year(dt: DateTime) -> (i32, i32) {
    let c = to_chrono(dt);
    (c.month() as i32, c.year())
}
