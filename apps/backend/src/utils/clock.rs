use time::OffsetDateTime;

/// Current wall-clock time in unix milliseconds, the unit of every `endAt`
/// and `serverTime` on the wire.
pub fn unix_millis() -> i64 {
    let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    i64::try_from(nanos).unwrap_or(i64::MAX)
}
