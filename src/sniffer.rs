//! Automatic detection of CSV/TSV statement formats.
//!
//! Given raw statement text, the sniffer finds the delimiter and the header
//! row, computes a stable fingerprint of the schema so the same bank can be
//! recognized on later uploads, suggests which column plays which role, and
//! probes the regional dialect (number and date format) from sample rows.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{normalizer, Error};

/// Common bank statement header keywords (multi-language).
const HEADER_KEYWORDS: &[&str] = &[
    // Portuguese
    "data mov",
    "data mov.",
    "descrição",
    "descricao",
    "débito",
    "debito",
    "crédito",
    "credito",
    "data valor",
    "saldo",
    "categoria",
    // English
    "date",
    "description",
    "amount",
    "debit",
    "credit",
    "balance",
    "category",
    "merchant",
    // Spanish
    "fecha",
    "descripción",
    "descripcion",
    "importe",
    "cargo",
    "abono",
];

/// Delimiters considered during detection, in tie-break priority order.
const CANDIDATE_DELIMITERS: [char; 4] = [';', '\t', ',', '|'];

/// How many lines are scanned when looking for the header row.
const MAX_HEADER_SCAN_LINES: usize = 20;

/// A header row needs at least this many delimiter occurrences (4 fields).
const MIN_DELIMITER_COUNT: usize = 3;

/// How many data rows are collected as samples for dialect probing.
const SAMPLE_ROW_LIMIT: usize = 5;

/// The detected configuration for a CSV/TSV file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileConfig {
    /// The field delimiter (`;`, `,`, tab or `|`).
    pub delimiter: char,
    /// Number of metadata lines before the header row.
    pub skip_lines: usize,
    /// Detected header names, trimmed.
    pub headers: Vec<String>,
    /// SHA-256 hash of the normalized headers, hex-encoded.
    pub fingerprint: String,
    /// The first few data rows, for preview and dialect probing.
    pub sample_rows: Vec<Vec<String>>,
}

/// Auto-detected column roles. `None` means the role was not found.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnSuggestions {
    /// Suggested date column index.
    pub date_col: Option<usize>,
    /// Suggested description column index.
    pub desc_col: Option<usize>,
    /// Suggested single amount column (absent for double-entry files).
    pub amount_col: Option<usize>,
    /// Suggested debit column index.
    pub debit_col: Option<usize>,
    /// Suggested credit column index.
    pub credit_col: Option<usize>,
    /// Suggested category column index.
    pub category_col: Option<usize>,
    /// True if separate debit/credit columns were detected.
    pub is_double_entry: bool,
}

/// Overrides for [detect_config_with_options], used when the user has
/// manually fixed the delimiter or the header position.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetectOptions {
    /// Use this delimiter instead of detecting one.
    pub delimiter: Option<char>,
    /// Zero-based index of the header row; lines before it are metadata.
    pub header_row: Option<usize>,
}

/// The regional dialect probed from sample data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionalDialect {
    /// Whether amounts look European (`1.234,56`). `None` when inconclusive.
    pub is_european: Option<bool>,
    /// The date format pattern guessed from the date column, if any.
    pub date_format: Option<String>,
}

/// Analyze statement text and detect how to read it.
///
/// # Errors
/// Returns [Error::EmptyFile] for empty input and [Error::NoHeadersFound]
/// when no line looks like a header row.
pub fn detect_config(data: &str) -> Result<FileConfig, Error> {
    detect_config_with_options(data, DetectOptions::default())
}

/// Analyze statement text, honoring explicit delimiter/header overrides.
///
/// With a pinned header row the delimiter falls back to the most frequent
/// candidate on that line; with a pinned delimiter the header scan only needs
/// a single occurrence of it, since the user has vouched for the character.
///
/// # Errors
/// Same as [detect_config], plus [Error::InvalidDelimiter] when the
/// delimiter is not a single-byte character.
pub fn detect_config_with_options(data: &str, options: DetectOptions) -> Result<FileConfig, Error> {
    if data.is_empty() {
        return Err(Error::EmptyFile);
    }

    let lines: Vec<&str> = data.lines().collect();
    if lines.is_empty() {
        return Err(Error::EmptyFile);
    }

    let (delimiter, skip_lines) = match options.header_row {
        Some(header_row) => {
            let line = lines.get(header_row).ok_or(Error::NoHeadersFound)?;
            let delimiter = options
                .delimiter
                .or_else(|| best_delimiter(line))
                .ok_or(Error::NoHeadersFound)?;
            (delimiter, header_row)
        }
        None => find_header_row(&lines, options.delimiter)?,
    };

    let headers = parse_header_line(lines[skip_lines], delimiter)?;
    let fingerprint = generate_fingerprint(&headers);
    let sample_rows = collect_sample_rows(data, delimiter, skip_lines + 1, SAMPLE_ROW_LIMIT)?;

    Ok(FileConfig {
        delimiter,
        skip_lines,
        headers,
        fingerprint,
        sample_rows,
    })
}

/// Suggest column roles by matching header names against keyword families.
///
/// The first matching header wins per role.
pub fn suggest_columns(headers: &[String]) -> ColumnSuggestions {
    let mut suggestions = ColumnSuggestions::default();

    for (index, header) in headers.iter().enumerate() {
        let header = header.trim().to_lowercase();

        if suggestions.date_col.is_none()
            && (header.contains("data mov")
                || header.contains("date")
                || header.contains("fecha")
                || header == "data")
        {
            suggestions.date_col = Some(index);
        }

        if suggestions.desc_col.is_none()
            && (header.contains("descri")
                || header.contains("merchant")
                || header.contains("description")
                || header == "nome"
                || header == "name")
        {
            suggestions.desc_col = Some(index);
        }

        if suggestions.debit_col.is_none()
            && (header.contains("débito")
                || header.contains("debito")
                || header.contains("debit")
                || header.contains("cargo"))
        {
            suggestions.debit_col = Some(index);
        }

        if suggestions.credit_col.is_none()
            && (header.contains("crédito")
                || header.contains("credito")
                || header.contains("credit")
                || header.contains("abono"))
        {
            suggestions.credit_col = Some(index);
        }

        if suggestions.amount_col.is_none()
            && matches!(header.as_str(), "amount" | "valor" | "importe" | "montante")
        {
            suggestions.amount_col = Some(index);
        }

        if suggestions.category_col.is_none()
            && (header.contains("categ") || header.contains("tipo") || header.contains("type"))
        {
            suggestions.category_col = Some(index);
        }
    }

    suggestions.is_double_entry =
        suggestions.debit_col.is_some() && suggestions.credit_col.is_some();

    suggestions
}

/// Probe the regional dialect from sample rows.
///
/// Used as a tiebreak when no saved mapping specifies the number or date
/// format. Amount samples are inspected for decimal-separator hints and the
/// date column for a recognizable pattern.
pub fn probe_dialect(
    sample_rows: &[Vec<String>],
    amount_col: Option<usize>,
    date_col: Option<usize>,
) -> RegionalDialect {
    let amount_samples = collect_column_samples(sample_rows, amount_col);
    let date_samples = collect_column_samples(sample_rows, date_col);

    RegionalDialect {
        is_european: detect_european_format(&amount_samples),
        date_format: (!date_samples.is_empty())
            .then(|| normalizer::detect_date_format(&date_samples)),
    }
}

/// Collect non-empty trimmed values of one column across sample rows.
pub(crate) fn collect_column_samples(rows: &[Vec<String>], column: Option<usize>) -> Vec<String> {
    let Some(column) = column else {
        return Vec::new();
    };

    rows.iter()
        .filter_map(|row| row.get(column))
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Infer whether amount samples use the European number format.
///
/// Counts decimal-suffix hints per separator; returns `None` when there are
/// no hints or the hints tie.
pub(crate) fn detect_european_format(samples: &[String]) -> Option<bool> {
    let mut european_hints = 0;
    let mut us_hints = 0;

    for raw in samples {
        let cleaned: String = raw
            .chars()
            .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
            .collect();
        let cleaned = cleaned.strip_prefix('-').unwrap_or(&cleaned);
        if cleaned.is_empty() {
            continue;
        }

        let last_comma = cleaned.rfind(',');
        let last_dot = cleaned.rfind('.');

        match (last_comma, last_dot) {
            (Some(comma), Some(dot)) => {
                if comma > dot {
                    european_hints += 1;
                } else {
                    us_hints += 1;
                }
            }
            (Some(_), None) if has_decimal_suffix(cleaned, ',') => european_hints += 1,
            (None, Some(_)) if has_decimal_suffix(cleaned, '.') => us_hints += 1,
            _ => {}
        }
    }

    if european_hints == us_hints {
        return None;
    }

    Some(european_hints > us_hints)
}

/// Whether `value` ends in `separator` followed by one or two digits, the
/// shape of a decimal part.
fn has_decimal_suffix(value: &str, separator: char) -> bool {
    let Some(index) = value.rfind(separator) else {
        return false;
    };

    let suffix = &value[index + separator.len_utf8()..];
    !suffix.is_empty() && suffix.len() <= 2 && suffix.chars().all(|c| c.is_ascii_digit())
}

/// Locate the header row and its delimiter.
///
/// The header is the first of the leading lines that contains a known header
/// keyword and enough occurrences of a candidate delimiter.
fn find_header_row(
    lines: &[&str],
    delimiter_override: Option<char>,
) -> Result<(char, usize), Error> {
    let required_count = if delimiter_override.is_some() {
        1
    } else {
        MIN_DELIMITER_COUNT
    };

    for (index, line) in lines.iter().take(MAX_HEADER_SCAN_LINES).enumerate() {
        let line_lower = line.to_lowercase();

        if !HEADER_KEYWORDS
            .iter()
            .any(|keyword| line_lower.contains(keyword))
        {
            continue;
        }

        let candidates: &[char] = match &delimiter_override {
            Some(delimiter) => std::slice::from_ref(delimiter),
            None => &CANDIDATE_DELIMITERS,
        };

        for &delimiter in candidates {
            let count = line.matches(delimiter).count();
            if count >= required_count {
                return Ok((delimiter, index));
            }
        }
    }

    Err(Error::NoHeadersFound)
}

/// Pick the most frequent candidate delimiter on a line.
fn best_delimiter(line: &str) -> Option<char> {
    let mut best = None;
    let mut best_count = 0;

    for delimiter in CANDIDATE_DELIMITERS {
        let count = line.matches(delimiter).count();
        if count > best_count {
            best = Some(delimiter);
            best_count = count;
        }
    }

    best
}

fn parse_header_line(line: &str, delimiter: char) -> Result<Vec<String>, Error> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter_byte(delimiter)?)
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());

    let mut record = csv::StringRecord::new();
    let read = reader
        .read_record(&mut record)
        .map_err(|error| Error::MalformedRecord(error.to_string()))?;
    if !read {
        return Err(Error::NoHeadersFound);
    }

    Ok(record.iter().map(|header| header.trim().to_owned()).collect())
}

/// Create a stable fingerprint from header names.
///
/// Headers are lowercased and stripped of every code point that is neither a
/// letter nor a digit, empty results are dropped, and the remaining tokens
/// are joined with `|` and hashed with SHA-256. The fingerprint is therefore
/// case- and punctuation-insensitive but sensitive to column order.
pub fn generate_fingerprint(headers: &[String]) -> String {
    let normalized: Vec<String> = headers
        .iter()
        .map(|header| {
            header
                .chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect::<String>()
        })
        .filter(|token| !token.is_empty())
        .collect();

    hex::encode(Sha256::digest(normalized.join("|")))
}

/// Convert a delimiter character into the single byte the CSV reader needs.
pub(crate) fn delimiter_byte(delimiter: char) -> Result<u8, Error> {
    u8::try_from(delimiter).map_err(|_| Error::InvalidDelimiter(delimiter))
}

/// Collect up to `limit` data records starting at `start_record`.
fn collect_sample_rows(
    data: &str,
    delimiter: char,
    start_record: usize,
    limit: usize,
) -> Result<Vec<Vec<String>>, Error> {
    let reader = csv::ReaderBuilder::new()
        .delimiter(delimiter_byte(delimiter)?)
        .has_headers(false)
        .flexible(true)
        .from_reader(data.as_bytes());

    Ok(reader
        .into_records()
        .flatten()
        .skip(start_record)
        .take(limit)
        .map(|record| record.iter().map(str::to_owned).collect())
        .collect())
}



#[cfg(test)]
mod fingerprint_tests {
    use super::generate_fingerprint;

    fn to_headers(headers: &[&str]) -> Vec<String> {
        headers.iter().map(|h| h.to_string()).collect()
    }

    #[test]
    fn same_headers_produce_same_fingerprint() {
        let first = generate_fingerprint(&to_headers(&["Data mov.", "Descrição", "Débito", "Crédito"]));
        let second = generate_fingerprint(&to_headers(&["Data mov.", "Descrição", "Débito", "Crédito"]));

        assert_eq!(first, second);
    }

    #[test]
    fn different_headers_produce_different_fingerprints() {
        let portuguese = generate_fingerprint(&to_headers(&["Data mov.", "Descrição", "Débito"]));
        let english = generate_fingerprint(&to_headers(&["Date", "Description", "Debit"]));

        assert_ne!(portuguese, english);
    }

    #[test]
    fn fingerprint_ignores_case_and_punctuation() {
        let upper = generate_fingerprint(&to_headers(&["Data mov.", "DESCRIÇÃO", "Débito"]));
        let lower = generate_fingerprint(&to_headers(&["data mov.", "descrição", "débito"]));
        let spaced = generate_fingerprint(&to_headers(&["Data  mov", "Descrição!", " Débito "]));

        assert_eq!(upper, lower);
        assert_eq!(upper, spaced);
    }

    #[test]
    fn fingerprint_is_order_sensitive() {
        let forward = generate_fingerprint(&to_headers(&["Date", "Amount"]));
        let reversed = generate_fingerprint(&to_headers(&["Amount", "Date"]));

        assert_ne!(forward, reversed);
    }
}
