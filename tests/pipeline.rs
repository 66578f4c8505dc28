use duckdb::Connection;
use jiff::civil::date;
use serde_json::{json, Value};
use std::error::Error;
use std::fs;

use tvmaze_etl::extraction::TvmazeScheduleArchive;
use tvmaze_etl::load::TvShowsDb;
use tvmaze_etl::table::Datum;
use tvmaze_etl::transform::{create_table_from_json, perform_data_cleaning};

fn one_episode() -> Value {
    json!([
        {
            "id": 2719122,
            "url": "https://www.tvmaze.com/episodes/2719122",
            "name": "Серия 23",
            "season": 11,
            "number": 23,
            "type": "regular",
            "airdate": "2024-01-02",
            "airtime": "",
            "airstamp": "2024-01-02T12:00:00+00:00",
            "runtime": 52,
            "summary": "<p>An episode.</p>",
            "_embedded": {"show": {
                "id": 36343,
                "url": "https://www.tvmaze.com/shows/36343",
                "name": "Склифосовский",
                "type": "Scripted",
                "language": "Russian",
                "genres": ["Drama", "Comedy"],
                "status": "Running",
                "runtime": 50,
                "averageRuntime": 51,
                "premiered": "2012-10-08",
                "officialSite": "https://smotrim.ru/brand/21088",
                "schedule": {"time": "12:00", "days": ["Monday"]},
                "weight": 85,
                "webChannel": {
                    "id": 124,
                    "name": "Smotrim",
                    "country": {"name": "Russia", "code": "RU",
                                "timezone": "Europe/Moscow"},
                    "officialSite": "https://smotrim.ru/"
                },
                "summary": "<p>A medical drama.</p>"
            }}
        }
    ])
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT count(*) FROM {};", table), [], |row| {
        row.get(0)
    })
    .unwrap()
}

#[test]
fn raw_file_to_relational_database() -> Result<(), Box<dyn Error>> {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir()?;

    // raw store: one file for the day, content equal to the response
    let archive = TvmazeScheduleArchive::new(dir.path().to_str().unwrap().to_string());
    let day = date(2024, 1, 2);
    let records: Vec<Value> = one_episode().as_array().unwrap().clone();
    let path = archive.save_json_response(&records, &day)?;
    let written: Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
    assert_eq!(written, one_episode());

    // flatten + clean
    let df = create_table_from_json(dir.path())?;
    assert_eq!(df.n_rows(), 1);
    assert!(df.column_index("id").is_some());
    let df = perform_data_cleaning(df);
    assert_eq!(
        df.get(0, "airdate"),
        Some(&Datum::Date(date(2024, 1, 2)))
    );
    assert_eq!(
        df.get(0, "_embedded.show.genres"),
        Some(&Datum::Str("Drama, Comedy".to_string()))
    );

    // load
    let db = TvShowsDb {
        duckdb_path: ":memory:".to_string(),
    };
    let conn = Connection::open_in_memory()?;
    db.create_schema(&conn)?;
    db.load(&df, &conn)?;

    assert_eq!(count(&conn, "shows"), 1);
    assert_eq!(count(&conn, "episodes"), 1);
    assert_eq!(count(&conn, "genres"), 2);
    assert_eq!(count(&conn, "show_genre"), 2);
    assert_eq!(count(&conn, "country"), 1);
    assert_eq!(count(&conn, "web_channels"), 1);

    // the association rows point at the right show
    let n: i64 = conn.query_row(
        "SELECT count(*) FROM show_genre sg \
         JOIN genres g ON g.id = sg.genre_id \
         WHERE sg.show_id = 36343;",
        [],
        |row| row.get(0),
    )?;
    assert_eq!(n, 2);
    Ok(())
}
