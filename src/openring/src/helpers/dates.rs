use chrono::{DateTime, NaiveDateTime, NaiveTime, TimeDelta, Utc};

/// Midnight UTC of the instant's calendar day.
pub fn start_of_day(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Zone-less timestamps coming from user input are read as UTC.
pub fn to_aware(naive: NaiveDateTime) -> DateTime<Utc> {
    naive.and_utc()
}

/// Every day start in `[start, end]`, ascending, both ends included.
pub fn days_between(start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    let end = start_of_day(end);
    let mut day = start_of_day(start);
    let mut days = Vec::new();
    while day <= end {
        days.push(day);
        day += TimeDelta::days(1);
    }
    days
}

/// Days back from `today`, the way the sport-detail request addresses them.
/// Errors with the raw distance when it does not fit the one-byte wire
/// encoding (future days included).
pub fn day_offset(today: DateTime<Utc>, day: DateTime<Utc>) -> Result<u8, i64> {
    let offset = (start_of_day(today) - start_of_day(day)).num_days();
    u8::try_from(offset).map_err(|_| offset)
}
