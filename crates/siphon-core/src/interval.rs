use std::time::Duration;

/// Interval used when the token cannot be understood.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Longest accepted interval; longer expressions fall back to the default.
pub const MAX_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Map a tick interval token to a duration.
///
/// Symbolic tokens (`minute`, `quarter-hour`, `half-hour`,
/// `three-quarter-hour`, `hour`, `day`) map to fixed durations. Anything
/// else is read as a duration expression such as `1m32s` or `2h30m`.
/// Unparseable input falls back to [`DEFAULT_INTERVAL`].
pub fn parse_interval(token: &str) -> Duration {
    let token = token.trim().to_lowercase();
    match token.as_str() {
        "minute" => Duration::from_secs(60),
        "quarter-hour" => Duration::from_secs(15 * 60),
        "half-hour" => Duration::from_secs(30 * 60),
        "three-quarter-hour" => Duration::from_secs(45 * 60),
        "hour" => Duration::from_secs(60 * 60),
        "day" => Duration::from_secs(24 * 60 * 60),
        other => parse_duration(other).unwrap_or_else(|| {
            tracing::warn!(
                token = %other,
                "Could not parse the provided time interval, defaulting to one hour"
            );
            DEFAULT_INTERVAL
        }),
    }
}

/// Parse `<integer><unit>` sequences with units `ms`, `s`, `m`, `h`, `d`.
///
/// Returns `None` for empty input, a missing or unknown unit, a total of
/// zero, or a total above [`MAX_INTERVAL`].
fn parse_duration(s: &str) -> Option<Duration> {
    let mut total = Duration::ZERO;
    let mut rest = s;

    if rest.is_empty() {
        return None;
    }

    while !rest.is_empty() {
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 {
            return None;
        }
        let n: u64 = rest[..digits].parse().ok()?;
        rest = &rest[digits..];

        let unit_len = rest.bytes().take_while(u8::is_ascii_alphabetic).count();
        let part = match &rest[..unit_len] {
            "ms" => Duration::from_millis(n),
            "s" => Duration::from_secs(n),
            "m" => Duration::from_secs(n.checked_mul(60)?),
            "h" => Duration::from_secs(n.checked_mul(60 * 60)?),
            "d" => Duration::from_secs(n.checked_mul(24 * 60 * 60)?),
            _ => return None,
        };
        rest = &rest[unit_len..];
        total = total.checked_add(part)?;
    }

    (!total.is_zero() && total <= MAX_INTERVAL).then_some(total)
}
