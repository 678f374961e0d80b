//! Regional money and date parsing.
//!
//! Bank statements disagree on almost everything: European files write
//! `1.234,56` where American files write `1,234.56`, and dates arrive in a
//! dozen orderings. This module converts both into the crate's canonical
//! representation: signed minor units (`i64`) and [OffsetDateTime] values.

use std::sync::LazyLock;

use regex::Regex;
use time::{
    format_description::{self, BorrowedFormatItem, OwnedFormatItem},
    macros::format_description,
    Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset,
};

use crate::Error;

/// The fallback ladder of date formats used by banks worldwide.
///
/// European orderings come first: when a date like `01/02/2024` is ambiguous
/// and no preferred format is supplied, the European reading wins.
const DATE_FORMATS: &[&[BorrowedFormatItem<'static>]] = &[
    // European (DD-MM-YYYY variants)
    format_description!("[day padding:none]-[month padding:none]-[year]"),
    format_description!("[day padding:none]/[month padding:none]/[year]"),
    format_description!("[day padding:none].[month padding:none].[year]"),
    // American (MM-DD-YYYY variants)
    format_description!("[month padding:none]-[day padding:none]-[year]"),
    format_description!("[month padding:none]/[day padding:none]/[year]"),
    // ISO (YYYY-MM-DD)
    format_description!("[year]-[month padding:none]-[day padding:none]"),
    format_description!("[year]/[month padding:none]/[day padding:none]"),
];

/// Time-of-day suffixes accepted after any date format.
const TIME_FORMATS: &[&[BorrowedFormatItem<'static>]] = &[
    format_description!("[hour padding:none]:[minute]:[second]"),
    format_description!("[hour padding:none]:[minute]"),
];

/// Parse a raw amount string into signed minor units (cents).
///
/// Everything outside `[0-9,.-]` is stripped first, so currency symbols and
/// stray whitespace are tolerated. `is_european` selects which separator is
/// the decimal mark. An empty (or fully stripped) input is zero, not an
/// error, because double-entry files leave the unused column blank.
///
/// # Errors
/// Returns [Error::InvalidAmount] if the cleaned string is not a number.
pub fn parse_amount(raw: &str, is_european: bool) -> Result<i64, Error> {
    if raw.is_empty() {
        return Ok(0);
    }

    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();

    if cleaned.is_empty() {
        return Ok(0);
    }

    let is_negative = cleaned.starts_with('-');
    let cleaned = cleaned.strip_prefix('-').unwrap_or(&cleaned);

    let normalized = if is_european {
        // European: 1.234,56 -> 1234.56
        cleaned.replace('.', "").replace(',', ".")
    } else {
        // American: 1,234.56 -> 1234.56
        cleaned.replace(',', "")
    };

    let value: f64 = normalized
        .parse()
        .map_err(|_| Error::InvalidAmount(raw.to_owned()))?;

    // Round half-away-from-zero to whole cents. The float is transient; only
    // the integer leaves this function.
    let mut cents = (value * 100.0).round() as i64;

    if is_negative {
        cents = -cents;
    }

    Ok(cents)
}

/// Merge separate debit and credit columns into a single signed amount.
///
/// Debit means money out and is forced negative; credit means money in and is
/// forced positive. Both columns empty yields zero.
///
/// # Errors
/// Returns [Error::ConflictingDebitCredit] when both columns hold a value (a
/// well-formed double-entry row populates at most one), or
/// [Error::InvalidAmount] when the populated column is not a number.
pub fn normalize_debit_credit(debit: &str, credit: &str, is_european: bool) -> Result<i64, Error> {
    let debit = debit.trim();
    let credit = credit.trim();

    if !debit.is_empty() && !credit.is_empty() {
        return Err(Error::ConflictingDebitCredit);
    }

    if !debit.is_empty() {
        let amount = parse_amount(debit, is_european)?;
        return Ok(-amount.abs());
    }

    if !credit.is_empty() {
        let amount = parse_amount(credit, is_european)?;
        return Ok(amount.abs());
    }

    Ok(0)
}

/// A date parser with a user-preferred pattern tried ahead of the fallbacks.
///
/// Build one per import so the preferred pattern is compiled once rather than
/// per row; the parser is immutable and shared across parse workers.
#[derive(Debug)]
pub struct DateParser {
    preferred: Option<OwnedFormatItem>,
    offset: UtcOffset,
}

impl DateParser {
    /// Create a parser for the given user-facing pattern and UTC offset.
    ///
    /// `preferred_format` uses the tokens `YYYY`, `YY`, `MM`, `DD`, `HH`,
    /// `mm` and `ss` (for example `DD-MM-YYYY` or `YYYY-MM-DD HH:mm:ss`). An
    /// empty or unparsable pattern simply disables the preferred attempt.
    pub fn new(preferred_format: &str, offset: UtcOffset) -> Self {
        let preferred = if preferred_format.is_empty() {
            None
        } else {
            format_description::parse_owned::<2>(&convert_date_format(preferred_format)).ok()
        };

        Self { preferred, offset }
    }

    /// Parse a raw date cell into an [OffsetDateTime] in the parser's offset.
    ///
    /// The preferred pattern is tried first, then the built-in ladder of
    /// European, American and ISO formats, each with an optional `HH:mm` or
    /// `HH:mm:ss` suffix. Dates without a time component resolve to midnight.
    ///
    /// # Errors
    /// Returns [Error::InvalidDate] if no format matches.
    pub fn parse(&self, raw: &str) -> Result<OffsetDateTime, Error> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::InvalidDate(raw.to_owned()));
        }

        if let Some(preferred) = &self.preferred {
            if let Ok(datetime) = PrimitiveDateTime::parse(raw, preferred) {
                return Ok(datetime.assume_offset(self.offset));
            }
            if let Ok(date) = Date::parse(raw, preferred) {
                return Ok(date.midnight().assume_offset(self.offset));
            }
        }

        let (date_part, time_part) = match raw.split_once(' ') {
            Some((date_part, time_part)) => (date_part, Some(time_part.trim())),
            None => (raw, None),
        };

        for date_format in DATE_FORMATS {
            let Ok(date) = Date::parse(date_part, date_format) else {
                continue;
            };

            let datetime = match time_part {
                Some(time_raw) => match parse_time_of_day(time_raw) {
                    Some(time) => PrimitiveDateTime::new(date, time),
                    None => return Err(Error::InvalidDate(raw.to_owned())),
                },
                None => date.midnight(),
            };

            return Ok(datetime.assume_offset(self.offset));
        }

        Err(Error::InvalidDate(raw.to_owned()))
    }
}

/// Parse a date with a preferred pattern and fallbacks in one call.
///
/// Convenience wrapper over [DateParser] for one-off parsing; imports should
/// build the parser once instead.
pub fn parse_flexible_date(
    raw: &str,
    preferred_format: &str,
    offset: UtcOffset,
) -> Result<OffsetDateTime, Error> {
    DateParser::new(preferred_format, offset).parse(raw)
}

fn parse_time_of_day(raw: &str) -> Option<Time> {
    TIME_FORMATS
        .iter()
        .find_map(|format| Time::parse(raw, format).ok())
}

/// Translate a user-facing date pattern into a `time` format description.
///
/// e.g. `DD-MM-YYYY` becomes `[day]-[month]-[year]`.
fn convert_date_format(format: &str) -> String {
    format
        .replace("YYYY", "[year]")
        .replace("YY", "[year repr:last_two]")
        .replace("MM", "[month]")
        .replace("DD", "[day]")
        .replace("HH", "[hour]")
        .replace("mm", "[minute]")
        .replace("ss", "[second]")
}

/// Guess the date format pattern from sample values.
///
/// The first sample decides: an ISO-shaped value maps to `YYYY-MM-DD` (or the
/// slash variant), a `NN-NN-NNNN` value with an unambiguous field (> 12)
/// picks the matching day/month ordering, and everything else defaults to
/// the European `DD-MM-YYYY` since that is the more common layout globally.
pub fn detect_date_format(samples: &[String]) -> String {
    static DAY_FIRST: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^\d{1,2}[-/]\d{1,2}[-/]\d{4}$").unwrap());
    static ISO: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^\d{4}[-/]\d{1,2}[-/]\d{1,2}$").unwrap());

    let Some(sample) = samples.first().map(|sample| sample.trim()) else {
        return "DD-MM-YYYY".to_owned();
    };

    let separator = if sample.contains('/') { "/" } else { "-" };

    if ISO.is_match(sample) {
        return format!("YYYY{separator}MM{separator}DD");
    }

    if DAY_FIRST.is_match(sample) {
        let mut fields = sample.split(['-', '/']);
        let first: u32 = fields.next().and_then(|f| f.parse().ok()).unwrap_or(0);
        let second: u32 = fields.next().and_then(|f| f.parse().ok()).unwrap_or(0);

        if first > 12 {
            return format!("DD{separator}MM{separator}YYYY");
        }
        if second > 12 {
            return format!("MM{separator}DD{separator}YYYY");
        }

        return format!("DD{separator}MM{separator}YYYY");
    }

    "DD-MM-YYYY".to_owned()
}

/// Normalize merchant/description text.
///
/// Trims the ends and collapses internal whitespace runs to a single space.
pub fn clean_description(raw: &str) -> String {
    static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

    WHITESPACE_RUN.replace_all(raw.trim(), " ").into_owned()
}

#[cfg(test)]
mod parse_amount_tests {
    use super::parse_amount;
    use crate::Error;

    #[test]
    fn parses_european_amounts() {
        let cases = [
            ("45,23", 4523),
            ("1.234,56", 123456),
            ("1.000.000,00", 100000000),
            ("0,99", 99),
            ("12,99", 1299),
            ("-45,23", -4523),
            ("", 0),
            ("  45,23  ", 4523),
            ("€ 45,23", 4523),
        ];

        for (input, want) in cases {
            let got = parse_amount(input, true).expect(input);
            assert_eq!(got, want, "parse_amount({input:?}, true) = {got}, want {want}");
        }
    }

    #[test]
    fn parses_american_amounts() {
        let cases = [
            ("45.23", 4523),
            ("1,234.56", 123456),
            ("1,000,000.00", 100000000),
            ("0.99", 99),
            ("-29.99", -2999),
            ("", 0),
            ("$45.23", 4523),
        ];

        for (input, want) in cases {
            let got = parse_amount(input, false).expect(input);
            assert_eq!(got, want, "parse_amount({input:?}, false) = {got}, want {want}");
        }
    }

    #[test]
    fn rejects_non_numeric_input() {
        assert_eq!(
            parse_amount("not-amount", false),
            Err(Error::InvalidAmount("not-amount".to_owned()))
        );
    }

    #[test]
    fn round_trips_integer_cents() {
        // Format cents in each dialect, parse them back, and expect the
        // original value, including the extremes of the supported range.
        let cases: [i64; 8] = [
            0,
            1,
            99,
            -4523,
            123456,
            987654321,
            1_000_000_000_000,
            -1_000_000_000_000,
        ];

        for cents in cases {
            let units = (cents / 100).abs();
            let fraction = (cents % 100).abs();
            let sign = if cents < 0 { "-" } else { "" };

            let american = format!("{sign}{units}.{fraction:02}");
            assert_eq!(parse_amount(&american, false), Ok(cents), "american {american}");

            let european = format!("{sign}{units},{fraction:02}");
            assert_eq!(parse_amount(&european, true), Ok(cents), "european {european}");
        }
    }
}


#[cfg(test)]
mod date_tests {
    use time::UtcOffset;

    use super::{convert_date_format, detect_date_format, parse_flexible_date};
    use crate::Error;

    #[test]
    fn parses_dates_with_preferred_and_fallback_formats() {
        let cases = [
            // European DD-MM-YYYY.
            ("02-01-2024", "DD-MM-YYYY", "2024-01-02"),
            ("25-12-2024", "", "2024-12-25"),
            ("02/01/2024", "DD/MM/YYYY", "2024-01-02"),
            // American MM/DD/YYYY.
            ("01/02/2024", "MM/DD/YYYY", "2024-01-02"),
            // ISO.
            ("2024-01-02", "", "2024-01-02"),
            ("2024/01/02", "", "2024-01-02"),
        ];

        for (input, format, want) in cases {
            let got = parse_flexible_date(input, format, UtcOffset::UTC)
                .unwrap_or_else(|error| panic!("could not parse {input:?}: {error}"));
            assert_eq!(
                got.date().to_string(),
                want,
                "parse_flexible_date({input:?}, {format:?})"
            );
        }
    }

    #[test]
    fn parses_time_of_day_suffixes() {
        let got = parse_flexible_date("02-01-2024 15:04", "", UtcOffset::UTC)
            .expect("could not parse date with HH:mm suffix");
        assert_eq!((got.hour(), got.minute()), (15, 4));

        let got = parse_flexible_date("2024-01-02 15:04:05", "", UtcOffset::UTC)
            .expect("could not parse date with HH:mm:ss suffix");
        assert_eq!((got.hour(), got.minute(), got.second()), (15, 4, 5));
    }

    #[test]
    fn parses_datetime_with_preferred_format() {
        let got = parse_flexible_date("2024-01-02 15:04:05", "YYYY-MM-DD HH:mm:ss", UtcOffset::UTC)
            .expect("could not parse datetime with preferred format");

        assert_eq!(got.date().to_string(), "2024-01-02");
        assert_eq!((got.hour(), got.minute(), got.second()), (15, 4, 5));
    }

    #[test]
    fn applies_the_supplied_offset() {
        let offset = UtcOffset::from_hms(2, 0, 0).unwrap();

        let got = parse_flexible_date("02-01-2024", "", offset).unwrap();

        assert_eq!(got.offset(), offset);
        assert_eq!(got.date().to_string(), "2024-01-02");
    }

    #[test]
    fn rejects_unparsable_dates() {
        assert_eq!(
            parse_flexible_date("", "", UtcOffset::UTC),
            Err(Error::InvalidDate("".to_owned()))
        );
        assert_eq!(
            parse_flexible_date("not-a-date", "", UtcOffset::UTC),
            Err(Error::InvalidDate("not-a-date".to_owned()))
        );
    }

    #[test]
    fn detects_date_formats_from_samples() {
        let cases = [
            (vec!["25-12-2024"], "DD-MM-YYYY"),
            (vec!["25/12/2024"], "DD/MM/YYYY"),
            (vec!["2024-12-25"], "YYYY-MM-DD"),
            (vec!["2024/12/25"], "YYYY/MM/DD"),
            // Second field > 12 rules out a day-first reading.
            (vec!["01/25/2024"], "MM/DD/YYYY"),
            // Ambiguous values default to the European ordering.
            (vec!["01/02/2024"], "DD/MM/YYYY"),
            (vec![], "DD-MM-YYYY"),
        ];

        for (samples, want) in cases {
            let samples: Vec<String> = samples.into_iter().map(str::to_owned).collect();
            let got = detect_date_format(&samples);
            assert_eq!(got, want, "detect_date_format({samples:?})");
        }
    }

    #[test]
    fn converts_user_tokens_to_format_descriptions() {
        let cases = [
            ("DD-MM-YYYY", "[day]-[month]-[year]"),
            ("MM/DD/YYYY", "[month]/[day]/[year]"),
            ("YYYY-MM-DD", "[year]-[month]-[day]"),
            ("DD/MM/YY", "[day]/[month]/[year repr:last_two]"),
            ("YYYY-MM-DD HH:mm:ss", "[year]-[month]-[day] [hour]:[minute]:[second]"),
        ];

        for (input, want) in cases {
            assert_eq!(convert_date_format(input), want);
        }
    }
}
