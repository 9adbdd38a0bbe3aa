//! TOML-semantic equality between an expected and an actual document.
//!
//! Structure is compared strictly: tables must have the same key set (order is
//! irrelevant), arrays the same length and element order, leaves the same tag.
//! Leaf *values* are compared by meaning rather than spelling:
//!
//! | tag | rule |
//! |-----|------|
//! | `string`, `bool` | exact text |
//! | `integer` | same number (`+42` == `42`, `1_000` == `1000`, `0x10` == `16`) |
//! | `float` | same `f64`; `nan` equals `nan` whatever its sign; `0.0` equals `-0.0` |
//! | `datetime` | same instant (`Z` == `+00:00`, `T` == space) |
//! | `datetime-local`, `date-local`, `time-local` | same calendar value, fractional digits normalized |
//!
//! If either side of a numeric or temporal leaf cannot be parsed, the texts
//! must match exactly.
//!
//! The first difference found is reported as a [`Mismatch`] carrying its
//! [`KeyPath`]. Table keys are visited in sorted order so the reported
//! difference is deterministic.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};

use crate::value::{Item, KeyPath, Table, Tag, TypedValue};

/// Rendering used for a node that exists on one side only.
pub const MISSING: &str = "<missing>";

/// The first difference between two documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub path: KeyPath,
    pub expected: String,
    pub actual: String,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "at {}: expected {}, got {}",
            self.path, self.expected, self.actual
        )
    }
}

impl std::error::Error for Mismatch {}

/// Compare two documents.
pub fn compare_tables(expected: &Table, actual: &Table) -> Result<(), Mismatch> {
    let mut path = KeyPath::root();
    tables(expected, actual, &mut path)
}

/// Compare two items (tables, arrays or scalars) at the document root.
pub fn compare_items(expected: &Item, actual: &Item) -> Result<(), Mismatch> {
    let mut path = KeyPath::root();
    items(expected, actual, &mut path)
}

/// `true` when the two documents are TOML-equal.
pub fn tables_equal(a: &Table, b: &Table) -> bool {
    compare_tables(a, b).is_ok()
}

fn tables(expected: &Table, actual: &Table, path: &mut KeyPath) -> Result<(), Mismatch> {
    let keys: BTreeSet<&String> = expected.keys().chain(actual.keys()).collect();
    for key in keys {
        path.push_key(key);
        let outcome = match (expected.get(key), actual.get(key)) {
            (Some(e), Some(a)) => items(e, a, path),
            (e, a) => Err(mismatch(
                path,
                e.map_or_else(|| MISSING.to_string(), Item::describe),
                a.map_or_else(|| MISSING.to_string(), Item::describe),
            )),
        };
        path.pop();
        outcome?;
    }
    Ok(())
}

fn items(expected: &Item, actual: &Item, path: &mut KeyPath) -> Result<(), Mismatch> {
    match (expected, actual) {
        (Item::Table(e), Item::Table(a)) => tables(e, a, path),
        (Item::Value(e), Item::Value(a)) => values(e, a, path),
        (e, a) => Err(mismatch(path, e.describe(), a.describe())),
    }
}

fn values(expected: &TypedValue, actual: &TypedValue, path: &mut KeyPath) -> Result<(), Mismatch> {
    match (expected, actual) {
        (TypedValue::Array(e), TypedValue::Array(a)) => {
            if e.len() != a.len() {
                return Err(mismatch(
                    path,
                    describe_value(expected),
                    describe_value(actual),
                ));
            }
            for (index, (e, a)) in e.iter().zip(a).enumerate() {
                path.push_index(index);
                let outcome = items(e, a, path);
                path.pop();
                outcome?;
            }
            Ok(())
        }
        (e, a) if scalars_equal(e, a) => Ok(()),
        (e, a) => Err(mismatch(path, describe_value(e), describe_value(a))),
    }
}

fn describe_value(value: &TypedValue) -> String {
    Item::Value(value.clone()).describe()
}

fn mismatch(path: &KeyPath, expected: String, actual: String) -> Mismatch {
    Mismatch {
        path: path.clone(),
        expected,
        actual,
    }
}

/// Leaf equality. Arrays and differing tags are never equal here.
pub fn scalars_equal(a: &TypedValue, b: &TypedValue) -> bool {
    if a.tag() != b.tag() {
        return false;
    }
    let (Some(x), Some(y)) = (a.text(), b.text()) else {
        return false;
    };
    match a.tag() {
        Tag::String | Tag::Boolean | Tag::Array => x == y,
        Tag::Integer => same_parsed(x, y, parse_integer),
        Tag::Float => match (parse_float(x), parse_float(y)) {
            (Some(p), Some(q)) => (p.is_nan() && q.is_nan()) || p == q,
            _ => x == y,
        },
        Tag::OffsetDateTime => same_parsed(x, y, parse_offset_datetime),
        Tag::LocalDateTime => same_parsed(x, y, parse_local_datetime),
        Tag::LocalDate => same_parsed(x, y, parse_local_date),
        Tag::LocalTime => same_parsed(x, y, parse_local_time),
    }
}

fn same_parsed<T: PartialEq>(x: &str, y: &str, parse: fn(&str) -> Option<T>) -> bool {
    match (parse(x), parse(y)) {
        (Some(p), Some(q)) => p == q,
        _ => x == y,
    }
}

// ============================================================================
// Canonical forms
// ============================================================================

/// Parse a TOML-ish integer: optional sign, `_` separators, `0x`/`0o`/`0b` prefixes.
pub fn parse_integer(text: &str) -> Option<i128> {
    let cleaned: String = text.trim().chars().filter(|c| *c != '_').collect();
    let (negative, unsigned) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
    };
    let (radix, digits) = if let Some(rest) = unsigned.strip_prefix("0x") {
        (16, rest)
    } else if let Some(rest) = unsigned.strip_prefix("0o") {
        (8, rest)
    } else if let Some(rest) = unsigned.strip_prefix("0b") {
        (2, rest)
    } else {
        (10, unsigned)
    };
    // from_str_radix would accept a second sign.
    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return None;
    }
    let magnitude = i128::from_str_radix(digits, radix).ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

/// Parse a TOML-ish float, including `inf`/`nan` with optional sign.
pub fn parse_float(text: &str) -> Option<f64> {
    let cleaned: String = text.trim().chars().filter(|c| *c != '_').collect();
    let (negative, unsigned) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
    };
    let magnitude = match unsigned {
        "nan" => f64::NAN,
        "inf" => f64::INFINITY,
        _ if unsigned.starts_with(['+', '-']) => return None,
        _ => unsigned.parse::<f64>().ok()?,
    };
    Some(if negative { -magnitude } else { magnitude })
}

/// Normalize the date/time separator (`t` or space) to `T`.
fn normalize_separator(text: &str) -> String {
    let text = text.trim();
    match text.as_bytes().get(10) {
        Some(b't' | b' ') if text.is_char_boundary(10) && text.is_char_boundary(11) => {
            format!("{}T{}", &text[..10], &text[11..])
        }
        _ => text.to_string(),
    }
}

pub fn parse_offset_datetime(text: &str) -> Option<DateTime<FixedOffset>> {
    let mut normalized = normalize_separator(text);
    if normalized.ends_with(['Z', 'z']) {
        normalized.pop();
        normalized.push_str("+00:00");
    }
    ["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M%:z"]
        .iter()
        .find_map(|format| DateTime::parse_from_str(&normalized, format).ok())
}

pub fn parse_local_datetime(text: &str) -> Option<NaiveDateTime> {
    let normalized = normalize_separator(text);
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&normalized, format).ok())
}

pub fn parse_local_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok()
}

pub fn parse_local_time(text: &str) -> Option<NaiveTime> {
    ["%H:%M:%S%.f", "%H:%M"]
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(text.trim(), format).ok())
}
