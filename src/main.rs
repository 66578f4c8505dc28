use duckdb::Connection;
use log::info;
use std::env;
use std::error::Error;
use std::path::Path;

use tvmaze_etl::analysis;
use tvmaze_etl::extraction::{dates_in_month, TvmazeScheduleArchive};
use tvmaze_etl::load::{save_as_parquet, TvShowsDb};
use tvmaze_etl::report::generate_profiling_report;
use tvmaze_etl::transform::{create_table_from_json, perform_data_cleaning};

/// Run the full ETL pipeline for the web/streaming schedules of
/// January 2024: fetch and archive one raw json file per day, flatten and
/// clean everything into one table, then write the parquet file, the
/// profiling report and the relational database, and log the aggregates.
fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .init();
    info!("starting ETL run ...");

    let year = 2024;
    let month = 1;
    let base_dir = env::var("TVMAZE_ETL_DIR").unwrap_or_else(|_| "data".to_string());
    std::fs::create_dir_all(&base_dir)?;

    let archive = TvmazeScheduleArchive::new(format!("{}/json", base_dir));
    for day in dates_in_month(year, month) {
        info!("fetching schedule for {}", day);
        let records = archive.fetch_schedule(&day);
        archive.save_json_response(&records, &day)?;
    }

    let df = create_table_from_json(Path::new(&archive.base_dir))?;
    info!(
        "flattened {} episodes across {} columns",
        df.n_rows(),
        df.n_columns()
    );
    let df = perform_data_cleaning(df);
    info!("{} rows remain after cleaning", df.n_rows());

    save_as_parquet(&df, &format!("{}/tv_shows.parquet", base_dir))?;
    generate_profiling_report(&df, &format!("{}/profiling_report.html", base_dir))?;

    let db = TvShowsDb {
        duckdb_path: format!("{}/tv_shows.duckdb", base_dir),
    };
    let conn = Connection::open(&db.duckdb_path)?;
    db.create_schema(&conn)?;
    db.load(&df, &conn)?;

    analysis::mean_average_runtime(&df);
    analysis::genre_histogram(&df);
    analysis::unique_network_domains(&df);

    info!("ETL run finished");
    Ok(())
}
