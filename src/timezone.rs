//! IANA timezone resolution for statement dates.

use time::{OffsetDateTime, UtcOffset};
use time_tz::{Offset, TimeZone};

/// Resolve a canonical timezone name (e.g. "Europe/Lisbon") to its current
/// UTC offset, or `None` if the name is unknown.
pub fn get_utc_offset(canonical_timezone: &str) -> Option<UtcOffset> {
    time_tz::timezones::get_by_name(canonical_timezone)
        .map(|tz| tz.get_offset_utc(&OffsetDateTime::now_utc()).to_utc())
}

/// Resolve an optional timezone name, falling back silently to UTC.
///
/// Statement files rarely say which timezone their dates are in; an unknown
/// or empty name is not worth failing an import over.
pub fn get_utc_offset_or_utc(canonical_timezone: &str) -> UtcOffset {
    if canonical_timezone.is_empty() {
        return UtcOffset::UTC;
    }

    match get_utc_offset(canonical_timezone) {
        Some(offset) => offset,
        None => {
            tracing::debug!(
                "unknown timezone \"{}\", falling back to UTC",
                canonical_timezone
            );
            UtcOffset::UTC
        }
    }
}

#[cfg(test)]
mod timezone_tests {
    use time::UtcOffset;

    use super::{get_utc_offset, get_utc_offset_or_utc};

    #[test]
    fn resolves_canonical_names() {
        assert!(get_utc_offset("Europe/Lisbon").is_some());
        assert!(get_utc_offset("Pacific/Auckland").is_some());
        assert_eq!(get_utc_offset("Etc/UTC"), Some(UtcOffset::UTC));
    }

    #[test]
    fn unknown_names_resolve_to_none() {
        assert_eq!(get_utc_offset("Not/AZone"), None);
    }

    #[test]
    fn fallback_returns_utc() {
        assert_eq!(get_utc_offset_or_utc(""), UtcOffset::UTC);
        assert_eq!(get_utc_offset_or_utc("Not/AZone"), UtcOffset::UTC);
    }
}
