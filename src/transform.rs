use jiff::civil::Date;
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use crate::table::{flatten_record, Datum, Table};

/// Columns holding calendar dates, coerced by [`coerce_date_columns`].
pub const DATE_COLUMNS: [&str; 3] = ["airdate", "_embedded.show.premiered", "_embedded.show.ended"];

/// Columns imputed with the column median when missing.
pub const NUMERIC_COLUMNS: [&str; 4] = [
    "runtime",
    "_embedded.show.runtime",
    "_embedded.show.averageruntime",
    "_embedded.show.weight",
];

const SUMMARY_COLUMNS: [&str; 2] = ["summary", "_embedded.show.summary"];

/// Placeholder season value used by the feed for test records.
const SENTINEL_SEASON: i64 = 2024;

/// Fraction of missing values at or above which a column is dropped.
const MISSING_COLUMN_THRESHOLD: f64 = 0.85;

/// A category of the episode `type` column occurring this many times or
/// fewer is collapsed into "other".
const RARE_CATEGORY_COUNT: usize = 10;

lazy_static! {
    static ref TAG_RE: Regex = Regex::new(r"<[^>]+>").unwrap();
}

/// Read every json file in the folder (sorted by name), flatten each record
/// into dotted-path columns and concatenate everything into one table.
/// An empty or json-free folder yields an empty table.
pub fn create_table_from_json(json_folder: &Path) -> Result<Table, Box<dyn Error>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(json_folder)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut table = Table::new();
    for path in paths {
        let data: Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
        if let Value::Array(records) = data {
            for record in records.iter().filter(|r| r.is_object()) {
                table.push_record(flatten_record(record));
            }
        }
    }
    Ok(table)
}

/// Strict ISO-8601 date parse; anything else is None, never an error.
pub fn safe_to_date(value: &str) -> Option<Date> {
    value.trim().parse::<Date>().ok()
}

/// The cleaning pipeline as an ordered list of named table transforms.
/// Order matters: columns are dropped before imputation, rows are filtered
/// before the median is taken.  Each rule skips columns it does not find
/// and is idempotent on its own output.
pub fn cleaning_rules() -> Vec<(&'static str, fn(Table) -> Table)> {
    vec![
        ("normalize_column_names", normalize_column_names),
        ("coerce_date_columns", coerce_date_columns),
        ("sanitize_summaries", sanitize_summaries),
        ("drop_high_missing_columns", drop_high_missing_columns),
        ("filter_sentinel_seasons", filter_sentinel_seasons),
        ("impute_numeric_median", impute_numeric_median),
        ("impute_categorical_mode", impute_categorical_mode),
        ("join_list_columns", join_list_columns),
        ("map_schedule_days", map_schedule_days),
        ("collapse_rare_types", collapse_rare_types),
        ("drop_sparse_rows", drop_sparse_rows),
        ("dedup_rows", dedup_rows),
    ]
}

pub fn perform_data_cleaning(df: Table) -> Table {
    cleaning_rules().into_iter().fold(df, |table, (name, rule)| {
        debug!("applying cleaning rule {}", name);
        rule(table)
    })
}

fn normalize_column_names(mut df: Table) -> Table {
    for column in &mut df.columns {
        *column = column.trim().to_lowercase();
    }
    df
}

fn coerce_date_columns(mut df: Table) -> Table {
    for name in DATE_COLUMNS {
        let Some(idx) = df.column_index(name) else {
            continue;
        };
        for row in &mut df.rows {
            let coerced = match &row[idx] {
                Datum::Date(d) => Datum::Date(*d),
                Datum::Str(s) => match safe_to_date(s) {
                    Some(d) => Datum::Date(d),
                    None => Datum::Null,
                },
                _ => Datum::Null,
            };
            row[idx] = coerced;
        }
    }
    df
}

fn sanitize_summaries(mut df: Table) -> Table {
    for name in SUMMARY_COLUMNS {
        let Some(idx) = df.column_index(name) else {
            continue;
        };
        for row in &mut df.rows {
            if let Datum::Str(s) = &row[idx] {
                let visible = TAG_RE.replace_all(s, "").trim().to_string();
                row[idx] = Datum::Str(visible);
            }
        }
    }
    df
}

fn drop_high_missing_columns(mut df: Table) -> Table {
    if df.is_empty() {
        return df;
    }
    let n = df.n_rows() as f64;
    let doomed: Vec<String> = df
        .columns
        .iter()
        .enumerate()
        .filter(|(idx, _)| df.null_count(*idx) as f64 / n >= MISSING_COLUMN_THRESHOLD)
        .map(|(_, name)| name.clone())
        .collect();
    for name in doomed {
        debug!("dropping high-missing column {}", name);
        df.drop_column(&name);
    }
    df
}

fn filter_sentinel_seasons(mut df: Table) -> Table {
    let Some(idx) = df.column_index("season") else {
        return df;
    };
    df.rows.retain(|row| match &row[idx] {
        Datum::Int(x) => *x != SENTINEL_SEASON,
        Datum::Float(x) => *x != SENTINEL_SEASON as f64,
        Datum::Str(s) => s != &SENTINEL_SEASON.to_string(),
        _ => true,
    });
    df
}

fn impute_numeric_median(mut df: Table) -> Table {
    for name in NUMERIC_COLUMNS {
        let Some(idx) = df.column_index(name) else {
            continue;
        };
        let mut values: Vec<f64> = df.rows.iter().filter_map(|row| row[idx].as_f64()).collect();
        if values.is_empty() {
            continue;
        }
        values.sort_by(f64::total_cmp);
        let mid = values.len() / 2;
        let median = if values.len() % 2 == 0 {
            (values[mid - 1] + values[mid]) / 2.0
        } else {
            values[mid]
        };
        for row in &mut df.rows {
            if row[idx].is_null() {
                row[idx] = Datum::Float(median);
            }
        }
    }
    df
}

fn impute_categorical_mode(mut df: Table) -> Table {
    for idx in 0..df.n_columns() {
        let name = df.columns[idx].clone();
        if NUMERIC_COLUMNS.contains(&name.as_str()) || DATE_COLUMNS.contains(&name.as_str()) {
            continue;
        }
        let non_null: Vec<&Datum> = df.rows.iter().map(|r| &r[idx]).filter(|d| !d.is_null()).collect();
        if !non_null.iter().all(|d| matches!(d, Datum::Str(_))) {
            continue;
        }
        if df.null_count(idx) == 0 {
            continue;
        }
        // most frequent value, first-seen wins a tie; "unknown" if the
        // column holds nothing at all
        let mut counts: Vec<(String, usize)> = Vec::new();
        for value in &non_null {
            let s = value.as_str().unwrap();
            match counts.iter_mut().find(|(k, _)| k == s) {
                Some((_, c)) => *c += 1,
                None => counts.push((s.to_string(), 1)),
            }
        }
        let mode = counts
            .iter()
            .fold(None::<&(String, usize)>, |best, entry| match best {
                Some(b) if b.1 >= entry.1 => Some(b),
                _ => Some(entry),
            })
            .map(|(s, _)| s.clone())
            .unwrap_or_else(|| "unknown".to_string());
        for row in &mut df.rows {
            if row[idx].is_null() {
                row[idx] = Datum::Str(mode.clone());
            }
        }
    }
    df
}

fn join_list_columns(mut df: Table) -> Table {
    for idx in 0..df.n_columns() {
        if !df.rows.iter().any(|r| matches!(r[idx], Datum::List(_))) {
            continue;
        }
        for row in &mut df.rows {
            let joined = row[idx].render();
            row[idx] = Datum::Str(joined);
        }
    }
    df
}

fn day_number(token: &str) -> Option<&'static str> {
    match token {
        "Monday" => Some("1"),
        "Tuesday" => Some("2"),
        "Wednesday" => Some("3"),
        "Thursday" => Some("4"),
        "Friday" => Some("5"),
        "Saturday" => Some("6"),
        "Sunday" => Some("7"),
        _ => None,
    }
}

fn map_schedule_days(mut df: Table) -> Table {
    let Some(idx) = df.column_index("_embedded.show.schedule.days") else {
        return df;
    };
    for row in &mut df.rows {
        if let Datum::Str(s) = &row[idx] {
            let mapped = s
                .split(',')
                .map(str::trim)
                .map(|token| day_number(token).unwrap_or(token))
                .collect::<Vec<_>>()
                .join(", ");
            row[idx] = Datum::Str(mapped);
        }
    }
    df
}

fn collapse_rare_types(mut df: Table) -> Table {
    let Some(idx) = df.column_index("type") else {
        return df;
    };
    let mut counts: Vec<(String, usize)> = Vec::new();
    for row in &df.rows {
        if let Datum::Str(s) = &row[idx] {
            match counts.iter_mut().find(|(k, _)| k == s) {
                Some((_, c)) => *c += 1,
                None => counts.push((s.clone(), 1)),
            }
        }
    }
    let rare: HashSet<&str> = counts
        .iter()
        .filter(|(_, c)| *c <= RARE_CATEGORY_COUNT)
        .map(|(k, _)| k.as_str())
        .collect();
    for row in &mut df.rows {
        if let Datum::Str(s) = &row[idx] {
            if rare.contains(s.as_str()) {
                row[idx] = Datum::Str("other".to_string());
            }
        }
    }
    df
}

fn drop_sparse_rows(mut df: Table) -> Table {
    let n_columns = df.n_columns();
    if n_columns == 0 {
        return df;
    }
    df.rows.retain(|row| {
        let non_missing = row.iter().filter(|d| !d.is_null()).count();
        non_missing * 4 >= n_columns
    });
    df
}

fn dedup_rows(mut df: Table) -> Table {
    let mut seen = HashSet::new();
    df.rows.retain(|row| seen.insert(format!("{:?}", row)));
    df
}
