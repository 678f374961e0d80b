//! Currency resolution from statement contents.
//!
//! When no account pins the currency, the metadata lines above the header
//! often carry it ("Moeda;EUR", "Currency: USD") or a currency symbol, and
//! some banks ship a dedicated currency column. This module scans both.

use crate::sniffer::FileConfig;

/// Words that announce a currency value in the supported languages.
const CURRENCY_KEYWORDS: &[&str] = &["currency", "moeda", "moneda", "divisa", "devise", "valuta"];

/// Try to resolve an ISO 4217 currency code from the statement itself.
///
/// The pre-header metadata lines are scanned first for currency symbols and
/// keyword-announced codes; after that, a currency column (if the headers
/// name one) is scanned across the sample rows.
pub fn detect_currency_from_file(data: &str, config: &FileConfig) -> Option<String> {
    for line in data.lines().take(config.skip_lines) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(code) = detect_currency_from_line(line) {
            return Some(code);
        }
    }

    let column = currency_column_index(&config.headers)?;
    for row in &config.sample_rows {
        let Some(value) = row.get(column) else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        if let Some(code) = normalize_currency_code(value) {
            return Some(code);
        }
        if let Some(code) = currency_from_symbols(value) {
            return Some(code);
        }
    }

    None
}

/// Resolve a currency code from a single metadata line.
///
/// Symbols win outright; otherwise the line must contain a currency keyword
/// and yield exactly one ISO-shaped token.
fn detect_currency_from_line(line: &str) -> Option<String> {
    if let Some(code) = currency_from_symbols(line) {
        return Some(code);
    }

    let lower = line.to_lowercase();
    if CURRENCY_KEYWORDS
        .iter()
        .any(|keyword| lower.contains(keyword))
    {
        return normalize_currency_code(line);
    }

    None
}

/// Find the index of a header that names a currency column.
fn currency_column_index(headers: &[String]) -> Option<usize> {
    headers.iter().position(|header| {
        let header = header.trim().to_lowercase();
        !header.is_empty()
            && CURRENCY_KEYWORDS
                .iter()
                .any(|keyword| header.contains(keyword))
    })
}

/// Normalize a raw value into an ISO 4217 code, if it holds exactly one.
///
/// Accepts the code itself (`eur`, `"EUR"`) or a delimited value containing
/// a single code-shaped token (`Moeda;EUR`).
pub fn normalize_currency_code(value: &str) -> Option<String> {
    let cleaned = value.trim().trim_matches(['"', '\'']);
    if cleaned.is_empty() {
        return None;
    }

    let cleaned = cleaned.to_uppercase();
    if is_currency_code(&cleaned) {
        return Some(cleaned);
    }

    extract_single_currency_token(&cleaned)
}

/// Extract the one ISO-shaped token from an uppercased value, or nothing
/// when the value is empty or ambiguous.
fn extract_single_currency_token(value: &str) -> Option<String> {
    let mut tokens = value
        .split(|c: char| {
            matches!(c, ';' | ',' | '\t' | '|' | '-' | ':' | '/' | '(' | ')') || c.is_whitespace()
        })
        .map(|token| token.trim_matches(['"', '\'']))
        .filter(|token| is_currency_code(token));

    let first = tokens.next()?;
    if tokens.next().is_some() {
        return None;
    }

    Some(first.to_owned())
}

fn is_currency_code(value: &str) -> bool {
    value.len() == 3 && value.chars().all(|c| c.is_ascii_uppercase())
}

/// Map a currency symbol found in `value` to its ISO 4217 code.
fn currency_from_symbols(value: &str) -> Option<String> {
    let code = if value.contains('\u{20ac}') {
        "EUR"
    } else if value.contains('\u{a3}') {
        "GBP"
    } else if value.contains('\u{a5}') || value.contains('\u{ffe5}') {
        "JPY"
    } else if value.contains('\u{20b9}') {
        "INR"
    } else if value.contains('\u{20bd}') {
        "RUB"
    } else if value.contains('\u{20a9}') {
        "KRW"
    } else if value.contains('\u{20ba}') {
        "TRY"
    } else if value.contains('\u{20ab}') {
        "VND"
    } else if value.contains('\u{20aa}') {
        "ILS"
    } else if value.contains('$') {
        "USD"
    } else {
        return None;
    };

    Some(code.to_owned())
}

#[cfg(test)]
mod currency_tests {
    use super::{detect_currency_from_file, normalize_currency_code};
    use crate::sniffer::detect_config;

    #[test]
    fn resolves_keyword_announced_code_from_metadata() {
        let data = "\
Conta;12345678901
Moeda;EUR
Saldo inicial;1000,00
Extra;x
Outro;y
Mais;z
Data mov.;Data valor;Descrição;Débito;Crédito;Saldo
02-01-2024;02-01-2024;Compra;45,23;;954,77
";
        let config = detect_config(data).expect("detection should succeed");

        let got = detect_currency_from_file(data, &config);

        assert_eq!(got.as_deref(), Some("EUR"));
    }

    #[test]
    fn resolves_symbol_from_metadata() {
        let data = "\
Account;123
Opening balance;€ 1.000,00
Third;x
Fourth;y
Fifth;z
Sixth;w
Date;Description;Debit;Credit;Balance
02-01-2024;Coffee;2,50;;997,50
";
        let config = detect_config(data).expect("detection should succeed");

        let got = detect_currency_from_file(data, &config);

        assert_eq!(got.as_deref(), Some("EUR"));
    }

    #[test]
    fn resolves_code_from_currency_column() {
        let data = "\
Date,Description,Amount,Currency
01/02/2024,Starbucks,-5.40,USD
01/05/2024,Payroll,2500.00,USD
";
        let config = detect_config(data).expect("detection should succeed");

        let got = detect_currency_from_file(data, &config);

        assert_eq!(got.as_deref(), Some("USD"));
    }

    #[test]
    fn returns_none_when_nothing_matches() {
        let data = "\
Date,Description,Amount,Category
01/02/2024,Starbucks,-5.40,Food
";
        let config = detect_config(data).expect("detection should succeed");

        assert_eq!(detect_currency_from_file(data, &config), None);
    }

    #[test]
    fn ignores_date_like_metadata_without_keywords() {
        // "Data de fim;31-01-2024" must not produce a bogus code ("FIM").
        let data = "\
Conta;12345678901
Data de fim;31-01-2024
Saldo;850,00
Extra;x
Outro;y
Mais;z
Data mov.;Data valor;Descrição;Débito;Crédito;Saldo
02-01-2024;02-01-2024;Compra;45,23;;954,77
";
        let config = detect_config(data).expect("detection should succeed");

        assert_eq!(detect_currency_from_file(data, &config), None);
    }

    #[test]
    fn normalizes_code_shapes() {
        assert_eq!(normalize_currency_code("EUR").as_deref(), Some("EUR"));
        assert_eq!(normalize_currency_code("eur").as_deref(), Some("EUR"));
        assert_eq!(normalize_currency_code("\"USD\"").as_deref(), Some("USD"));
        assert_eq!(normalize_currency_code("Moeda;EUR").as_deref(), Some("EUR"));
        assert_eq!(normalize_currency_code("EURO"), None);
        assert_eq!(normalize_currency_code(""), None);
        // Two candidate tokens are ambiguous.
        assert_eq!(normalize_currency_code("EUR/USD"), None);
    }
}
