use lazy_static::lazy_static;
use time::{format_description, format_description::FormatItem, OffsetDateTime};

const UNIX_TIME_UNIT_OFFSET: i128 = 1_000_000;

lazy_static! {
    static ref TIME_FORMAT: Vec<FormatItem<'static>> =
        format_description::parse("[year]-[month]-[day] [hour]:[minute]:[second]").unwrap();
}

pub fn format_time_millis(ts_millis: u64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos((ts_millis as i128) * UNIX_TIME_UNIT_OFFSET)
        .ok()
        .and_then(|t| t.format(&TIME_FORMAT).ok())
        .unwrap_or_default()
}

pub fn curr_time_millis() -> u64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / UNIX_TIME_UNIT_OFFSET) as u64
}

pub fn curr_time_nanos() -> i128 {
    OffsetDateTime::now_utc().unix_timestamp_nanos()
}
