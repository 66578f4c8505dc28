use duckdb::Connection;
use flate2::Crc;
use itertools::Itertools;
use jiff::civil::Date;
use log::{error, info, warn};
use std::error::Error;

use crate::table::{ColumnType, Datum, Table};

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_str(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn lit_str(value: &Option<String>) -> String {
    match value {
        Some(s) => quote_str(s),
        None => "NULL".to_string(),
    }
}

fn lit_i64(value: &Option<i64>) -> String {
    match value {
        Some(x) => x.to_string(),
        None => "NULL".to_string(),
    }
}

fn lit_f64(value: &Option<f64>) -> String {
    match value {
        Some(x) if x.is_finite() => x.to_string(),
        _ => "NULL".to_string(),
    }
}

fn lit_date(value: &Option<Date>) -> String {
    match value {
        Some(d) => format!("DATE '{}'", d),
        None => "NULL".to_string(),
    }
}

fn sql_type(column_type: ColumnType) -> &'static str {
    match column_type {
        ColumnType::Bool => "BOOLEAN",
        ColumnType::Int => "BIGINT",
        ColumnType::Float => "DOUBLE",
        ColumnType::Date => "DATE",
        ColumnType::Str | ColumnType::List | ColumnType::Null => "VARCHAR",
    }
}

fn sql_literal(value: &Datum, column_type: ColumnType) -> String {
    if value.is_null() {
        return "NULL".to_string();
    }
    match column_type {
        ColumnType::Bool => match value {
            Datum::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
            _ => "NULL".to_string(),
        },
        ColumnType::Int => lit_i64(&value.as_i64()),
        ColumnType::Float => lit_f64(&value.as_f64()),
        ColumnType::Date => lit_date(&value.as_date()),
        ColumnType::Str | ColumnType::List | ColumnType::Null => quote_str(&value.render()),
    }
}

/// Stable id for a genre name: CRC32 reduced to 1..=1_000_000.  Two
/// distinct names can collide; repeated runs always map a name to the
/// same id, which is what the idempotent inserts rely on.
pub fn genre_id(name: &str) -> i64 {
    let mut crc = Crc::new();
    crc.update(name.as_bytes());
    (i64::from(crc.sum()) % 1_000_000) + 1
}

/// Write the cleaned table to a snappy-compressed parquet file through an
/// in-memory DuckDB staging table.  An empty table is skipped with a
/// warning, not an error.
pub fn save_as_parquet(df: &Table, parquet_file_path: &str) -> Result<(), Box<dyn Error>> {
    if df.is_empty() {
        warn!("empty table, skipping parquet write");
        return Ok(());
    }
    let conn = Connection::open_in_memory()?;
    let types: Vec<ColumnType> = (0..df.n_columns()).map(|i| df.column_type(i)).collect();
    let declarations = df
        .columns
        .iter()
        .zip(&types)
        .map(|(name, t)| format!("{} {}", quote_ident(name), sql_type(*t)))
        .join(", ");
    conn.execute_batch(&format!("CREATE TABLE tv_shows ({});", declarations))?;

    for chunk in &df.rows.iter().chunks(500) {
        let tuples = chunk
            .map(|row| {
                let values = row
                    .iter()
                    .zip(&types)
                    .map(|(d, t)| sql_literal(d, *t))
                    .join(", ");
                format!("({})", values)
            })
            .join(",\n");
        conn.execute_batch(&format!("INSERT INTO tv_shows VALUES {};", tuples))?;
    }

    conn.execute_batch(&format!(
        "COPY tv_shows TO '{}' (FORMAT PARQUET, COMPRESSION SNAPPY);",
        parquet_file_path.replace('\'', "''")
    ))?;
    info!("saved parquet file to {}", parquet_file_path);
    Ok(())
}

/// The small relational model the cleaned table is denormalized into.
pub struct TvShowsDb {
    pub duckdb_path: String,
}

impl TvShowsDb {
    /// Create the six relations if absent.  Never drops anything, safe to
    /// call on every run.
    pub fn create_schema(&self, conn: &Connection) -> Result<(), duckdb::Error> {
        conn.execute_batch(
            r#"
CREATE TABLE IF NOT EXISTS country (
    code VARCHAR PRIMARY KEY,
    name VARCHAR,
    timezone VARCHAR
);
CREATE TABLE IF NOT EXISTS web_channels (
    id BIGINT PRIMARY KEY,
    name VARCHAR,
    official_site VARCHAR,
    country_code VARCHAR REFERENCES country (code)
);
CREATE TABLE IF NOT EXISTS shows (
    id BIGINT PRIMARY KEY,
    url VARCHAR,
    name VARCHAR,
    type VARCHAR,
    language VARCHAR,
    status VARCHAR,
    runtime DOUBLE,
    average_runtime DOUBLE,
    premiered DATE,
    ended DATE,
    official_site VARCHAR,
    weight DOUBLE,
    schedule_days VARCHAR,
    summary VARCHAR,
    web_channel_id BIGINT REFERENCES web_channels (id)
);
CREATE TABLE IF NOT EXISTS episodes (
    id BIGINT PRIMARY KEY,
    show_id BIGINT REFERENCES shows (id),
    url VARCHAR,
    name VARCHAR,
    season BIGINT,
    number BIGINT,
    type VARCHAR,
    airdate DATE,
    airtime VARCHAR,
    airstamp VARCHAR,
    runtime DOUBLE,
    summary VARCHAR
);
CREATE TABLE IF NOT EXISTS genres (
    id BIGINT PRIMARY KEY,
    name VARCHAR
);
CREATE TABLE IF NOT EXISTS show_genre (
    show_id BIGINT REFERENCES shows (id),
    genre_id BIGINT REFERENCES genres (id),
    PRIMARY KEY (show_id, genre_id)
);
            "#,
        )
    }

    /// Insert every row of the cleaned table, insert-or-ignore per entity,
    /// one transaction for the whole pass.  A failing row is logged with
    /// its episode id and skipped, the batch continues.  A failed statement
    /// leaves the open transaction aborted, so the error path rolls back
    /// and starts a fresh one; the discarded inserts are recovered by the
    /// next run since every insert is idempotent.
    pub fn load(&self, df: &Table, conn: &Connection) -> Result<usize, Box<dyn Error>> {
        conn.execute_batch("BEGIN;")?;
        let mut n_loaded = 0;
        for r in 0..df.n_rows() {
            match self.insert_row(conn, df, r) {
                Ok(()) => n_loaded += 1,
                Err(e) => {
                    let episode = df.get(r, "id").and_then(Datum::as_i64);
                    error!(
                        "failed to load episode {:?}, discarding pending batch: {}",
                        episode, e
                    );
                    conn.execute_batch("ROLLBACK; BEGIN;")?;
                }
            }
        }
        conn.execute_batch("COMMIT;")?;
        info!("loaded {} of {} rows", n_loaded, df.n_rows());
        Ok(n_loaded)
    }

    fn insert_row(&self, conn: &Connection, df: &Table, r: usize) -> Result<(), Box<dyn Error>> {
        let str_of = |col: &str| -> Option<String> {
            df.get(r, col)
                .and_then(Datum::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let int_of = |col: &str| df.get(r, col).and_then(Datum::as_i64);
        let f64_of = |col: &str| df.get(r, col).and_then(Datum::as_f64);
        let date_of = |col: &str| df.get(r, col).and_then(Datum::as_date);

        // a missing primary key skips only that sub-entity, not the row
        let country_code = str_of("_embedded.show.webchannel.country.code");
        if let Some(code) = &country_code {
            conn.execute(
                &format!(
                    "INSERT OR IGNORE INTO country VALUES ({}, {}, {});",
                    quote_str(code),
                    lit_str(&str_of("_embedded.show.webchannel.country.name")),
                    lit_str(&str_of("_embedded.show.webchannel.country.timezone")),
                ),
                [],
            )?;
        }

        let web_channel_id = int_of("_embedded.show.webchannel.id");
        if let Some(id) = web_channel_id {
            conn.execute(
                &format!(
                    "INSERT OR IGNORE INTO web_channels VALUES ({}, {}, {}, {});",
                    id,
                    lit_str(&str_of("_embedded.show.webchannel.name")),
                    lit_str(&str_of("_embedded.show.webchannel.officialsite")),
                    lit_str(&country_code),
                ),
                [],
            )?;
        }

        let show_id = int_of("_embedded.show.id");
        if let Some(id) = show_id {
            conn.execute(
                &format!(
                    "INSERT OR IGNORE INTO shows VALUES \
                     ({}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {});",
                    id,
                    lit_str(&str_of("_embedded.show.url")),
                    lit_str(&str_of("_embedded.show.name")),
                    lit_str(&str_of("_embedded.show.type")),
                    lit_str(&str_of("_embedded.show.language")),
                    lit_str(&str_of("_embedded.show.status")),
                    lit_f64(&f64_of("_embedded.show.runtime")),
                    lit_f64(&f64_of("_embedded.show.averageruntime")),
                    lit_date(&date_of("_embedded.show.premiered")),
                    lit_date(&date_of("_embedded.show.ended")),
                    lit_str(&str_of("_embedded.show.officialsite")),
                    lit_f64(&f64_of("_embedded.show.weight")),
                    lit_str(&str_of("_embedded.show.schedule.days")),
                    lit_str(&str_of("_embedded.show.summary")),
                    lit_i64(&web_channel_id),
                ),
                [],
            )?;
        }

        if let Some(id) = int_of("id") {
            conn.execute(
                &format!(
                    "INSERT OR IGNORE INTO episodes VALUES \
                     ({}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {});",
                    id,
                    lit_i64(&show_id),
                    lit_str(&str_of("url")),
                    lit_str(&str_of("name")),
                    lit_i64(&int_of("season")),
                    lit_i64(&int_of("number")),
                    lit_str(&str_of("type")),
                    lit_date(&date_of("airdate")),
                    lit_str(&str_of("airtime")),
                    lit_str(&str_of("airstamp")),
                    lit_f64(&f64_of("runtime")),
                    lit_str(&str_of("summary")),
                ),
                [],
            )?;
        }

        if let (Some(show_id), Some(genres)) = (show_id, str_of("_embedded.show.genres")) {
            for genre in genres.split(',').map(str::trim).filter(|g| !g.is_empty()) {
                let gid = genre_id(genre);
                conn.execute(
                    &format!(
                        "INSERT OR IGNORE INTO genres VALUES ({}, {});",
                        gid,
                        quote_str(genre)
                    ),
                    [],
                )?;
                conn.execute(
                    &format!(
                        "INSERT OR IGNORE INTO show_genre VALUES ({}, {});",
                        show_id, gid
                    ),
                    [],
                )?;
            }
        }

        Ok(())
    }
}
