use itertools::Itertools;
use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::collections::HashMap;
use url::Url;

use crate::table::{Datum, Table};

const AVERAGE_RUNTIME_COLUMN: &str = "_embedded.show.averageruntime";
const GENRES_COLUMN: &str = "_embedded.show.genres";
const OFFICIAL_SITE_COLUMN: &str = "_embedded.show.officialsite";

/// Mean of the show average-runtime column, None when there is nothing
/// to average.
pub fn mean_average_runtime(df: &Table) -> Option<f64> {
    let idx = df.column_index(AVERAGE_RUNTIME_COLUMN)?;
    let values: Vec<f64> = df.rows.iter().filter_map(|r| r[idx].as_f64()).collect();
    if values.is_empty() {
        warn!("no average runtime values found");
        return None;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    info!("mean average runtime: {:.2} min", mean);
    Some(mean)
}

/// Frequency of each genre token, split out of the comma-joined genre
/// strings, most frequent first (ties sorted by name).
pub fn genre_histogram(df: &Table) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    if let Some(idx) = df.column_index(GENRES_COLUMN) {
        for row in &df.rows {
            if let Datum::Str(s) = &row[idx] {
                for genre in s.split(',').map(str::trim).filter(|g| !g.is_empty()) {
                    *counts.entry(genre.to_string()).or_insert(0) += 1;
                }
            }
        }
    }
    let histogram: Vec<(String, usize)> = counts
        .into_iter()
        .sorted_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)))
        .collect();
    for (genre, n) in &histogram {
        info!("genre {}: {} episodes", genre, n);
    }
    histogram
}

/// Unique domains of the show official-site URLs, lexicographically
/// sorted.  Unparseable URLs are skipped.
pub fn unique_network_domains(df: &Table) -> Vec<String> {
    let mut domains = BTreeSet::new();
    if let Some(idx) = df.column_index(OFFICIAL_SITE_COLUMN) {
        for row in &df.rows {
            if let Datum::Str(s) = &row[idx] {
                match Url::parse(s) {
                    Ok(url) => {
                        if let Some(host) = url.host_str() {
                            domains.insert(host.to_string());
                        }
                    }
                    Err(e) => debug!("skipping unparseable url {}: {}", s, e),
                }
            }
        }
    }
    let domains: Vec<String> = domains.into_iter().collect();
    info!("{} unique network domains: {:?}", domains.len(), domains);
    domains
}
