//! Roster parsing for CSV and XLSX uploads.
//!
//! Column headers are matched case-insensitively against English and Russian
//! aliases. Rows without a name are dropped; bad emails and places are cleared.
//! Every dropped or corrected row is reported as a row-level message.

use calamine::{Reader, Xlsx};
use common::model::participant::DEFAULT_ROLE;
use regex::Regex;
use std::io::Cursor;
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid regex"));

const NAME_ALIASES: &[&str] = &["full_name", "full name", "fullname", "name", "fio", "фио", "имя"];
const EMAIL_ALIASES: &[&str] = &["email", "e-mail", "mail", "почта", "эл. почта"];
const ROLE_ALIASES: &[&str] = &["role", "роль"];
const PLACE_ALIASES: &[&str] = &["place", "место"];

#[derive(thiserror::Error, Debug)]
pub enum RosterError {
    #[error("File must be CSV or XLSX")]
    UnsupportedFormat,
    #[error("File is empty")]
    Empty,
    #[error("File is not valid UTF-8")]
    Encoding,
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("XLSX error: {0}")]
    Xlsx(String),
    #[error("Missing required column: full_name")]
    MissingNameColumn,
}

/// A normalized roster row, ready to become a participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterRow {
    pub full_name: String,
    pub email: String,
    pub role: String,
    pub place: Option<i64>,
}

/// Parses an uploaded roster. Returns the accepted rows and row-level messages.
pub fn parse(bytes: &[u8], filename: &str) -> Result<(Vec<RosterRow>, Vec<String>), RosterError> {
    if bytes.is_empty() {
        return Err(RosterError::Empty);
    }
    let lower = filename.to_lowercase();
    let (headers, rows) = if lower.ends_with(".csv") {
        read_csv(bytes)?
    } else if lower.ends_with(".xlsx") {
        read_xlsx(bytes)?
    } else {
        return Err(RosterError::UnsupportedFormat);
    };
    normalize(&headers, rows)
}

fn detect_delimiter(header_line: &str) -> u8 {
    [b',', b';', b'\t', b'|']
        .into_iter()
        .map(|d| (d, header_line.matches(char::from(d)).count()))
        .filter(|(_, n)| *n > 0)
        .max_by_key(|(_, n)| *n)
        .map_or(b',', |(d, _)| d)
}

type Table = (Vec<String>, Vec<Vec<String>>);

fn read_csv(bytes: &[u8]) -> Result<Table, RosterError> {
    let text = std::str::from_utf8(bytes).map_err(|_| RosterError::Encoding)?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let header_line = text.lines().next().unwrap_or_default();

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(detect_delimiter(header_line))
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(str::to_string).collect());
    }
    Ok((headers, rows))
}

fn read_xlsx(bytes: &[u8]) -> Result<Table, RosterError> {
    let mut workbook =
        Xlsx::new(Cursor::new(bytes)).map_err(|e: calamine::XlsxError| RosterError::Xlsx(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| RosterError::Xlsx("workbook has no sheets".to_string()))?
        .map_err(|e| RosterError::Xlsx(e.to_string()))?;

    let mut rows = range
        .rows()
        .map(|row| row.iter().map(|cell| cell.to_string().trim().to_string()).collect::<Vec<_>>());
    let headers = rows.next().ok_or(RosterError::Empty)?;
    Ok((headers, rows.collect()))
}

fn column(headers: &[String], aliases: &[&str]) -> Option<usize> {
    headers.iter().position(|h| {
        let h = h.trim().trim_start_matches('\u{feff}').to_lowercase();
        aliases.contains(&h.as_str())
    })
}

fn parse_place(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|f| f.fract() == 0.0 && f.is_finite())
            .map(|f| f as i64)
    })
}

fn normalize(headers: &[String], rows: Vec<Vec<String>>) -> Result<(Vec<RosterRow>, Vec<String>), RosterError> {
    let name_col = column(headers, NAME_ALIASES).ok_or(RosterError::MissingNameColumn)?;
    let email_col = column(headers, EMAIL_ALIASES);
    let role_col = column(headers, ROLE_ALIASES);
    let place_col = column(headers, PLACE_ALIASES);

    let mut accepted = Vec::new();
    let mut messages = Vec::new();

    for (i, row) in rows.into_iter().enumerate() {
        // Data rows start on line 2.
        let line = i + 2;
        if row.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        let cell = |col: Option<usize>| {
            col.and_then(|c| row.get(c))
                .map(|v| v.trim().to_string())
                .unwrap_or_default()
        };

        let full_name = cell(Some(name_col));
        if full_name.is_empty() {
            log::warn!("Skipping roster row {} without a name", line);
            messages.push(format!("row {line}: missing full_name, skipped"));
            continue;
        }

        let mut email = cell(email_col);
        if !email.is_empty() && !EMAIL_RE.is_match(&email) {
            messages.push(format!("row {line}: invalid email '{email}' for {full_name}, cleared"));
            email.clear();
        }

        let role = match cell(role_col) {
            r if r.is_empty() => DEFAULT_ROLE.to_string(),
            r => r,
        };

        let raw_place = cell(place_col);
        let place = if raw_place.is_empty() {
            None
        } else {
            let parsed = parse_place(&raw_place);
            if parsed.is_none() {
                messages.push(format!("row {line}: invalid place '{raw_place}' for {full_name}, ignored"));
            }
            parsed
        };

        accepted.push(RosterRow {
            full_name,
            email,
            role,
            place,
        });
    }

    Ok((accepted, messages))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_with_russian_headers_and_semicolons() {
        let csv = "\u{feff}ФИО;Почта;Роль;Место\nИван Петров;ivan@example.com;speaker;1\nАнна;bad-email;;\n";
        let (rows, messages) = parse(csv.as_bytes(), "roster.CSV").unwrap();
        assert_eq!(
            rows,
            vec![
                RosterRow {
                    full_name: "Иван Петров".into(),
                    email: "ivan@example.com".into(),
                    role: "speaker".into(),
                    place: Some(1),
                },
                RosterRow {
                    full_name: "Анна".into(),
                    email: String::new(),
                    role: "participant".into(),
                    place: None,
                },
            ]
        );
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("row 3"));
    }

    #[test]
    fn rows_without_name_are_dropped_with_message() {
        let csv = "name,email\n,ghost@example.com\nBob,bob@example.com\n,\n";
        let (rows, messages) = parse(csv.as_bytes(), "r.csv").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].full_name, "Bob");
        assert_eq!(messages, vec!["row 2: missing full_name, skipped".to_string()]);
    }

    #[test]
    fn rejects_missing_name_column_and_bad_input() {
        assert!(matches!(
            parse(b"email\nx@y.z\n", "r.csv"),
            Err(RosterError::MissingNameColumn)
        ));
        assert!(matches!(parse(b"", "r.csv"), Err(RosterError::Empty)));
        assert!(matches!(parse(b"a", "r.txt"), Err(RosterError::UnsupportedFormat)));
        assert!(matches!(parse(&[0xff, 0xfe, 0x00], "r.csv"), Err(RosterError::Encoding)));
    }

    #[test]
    fn corrupt_workbook_is_an_xlsx_error() {
        assert!(matches!(parse(b"PK\x03\x04 broken", "roster.xlsx"), Err(RosterError::Xlsx(_))));
    }

    #[test]
    fn delimiter_detection() {
        assert_eq!(detect_delimiter("a;b;c"), b';');
        assert_eq!(detect_delimiter("a\tb"), b'\t');
        assert_eq!(detect_delimiter("single"), b',');
    }

    #[test]
    fn place_accepts_spreadsheet_floats() {
        assert_eq!(parse_place("2"), Some(2));
        assert_eq!(parse_place("3.0"), Some(3));
        assert_eq!(parse_place("first"), None);
    }
}
