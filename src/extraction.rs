use jiff::civil::{date, Date};
use log::{debug, error, info};
use serde_json::Value;
use std::error::Error;
use std::fs;
use std::time::Duration;

/// Archive of raw TVMaze web-schedule responses, one json file per day.
pub struct TvmazeScheduleArchive {
    pub base_url: String,
    pub base_dir: String,
}

impl TvmazeScheduleArchive {
    pub fn new(base_dir: String) -> TvmazeScheduleArchive {
        TvmazeScheduleArchive {
            base_url: "https://api.tvmaze.com/schedule/web".to_string(),
            base_dir,
        }
    }

    /// Return the json filename for the day.  Does not check if the file exists.
    pub fn filename(&self, day: &Date) -> String {
        format!("{}/data_tvmaze_{}.json", self.base_dir, day)
    }

    /// Fetch the episodes airing on web/streaming channels on the given day.
    /// Any network or HTTP failure is logged and degrades to an empty list,
    /// so an empty result means "no data retrieved", not "no data exists".
    pub fn fetch_schedule(&self, day: &Date) -> Vec<Value> {
        let url = format!("{}?date={}", self.base_url, day);
        debug!("calling {}", url);
        let client = match reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(50))
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                error!("failed to build http client: {}", e);
                return vec![];
            }
        };
        match client
            .get(&url)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<Vec<Value>>())
        {
            Ok(records) => records,
            Err(e) => {
                error!("failed to fetch schedule for {}: {}", day, e);
                vec![]
            }
        }
    }

    /// Write the day's response as pretty-printed json, overwriting any
    /// existing file for that day.  Filesystem errors propagate.
    pub fn save_json_response(&self, data: &[Value], day: &Date) -> Result<String, Box<dyn Error>> {
        fs::create_dir_all(&self.base_dir)?;
        let path = self.filename(day);
        fs::write(&path, serde_json::to_string_pretty(data)?)?;
        info!("saved raw response to {}", path);
        Ok(path)
    }
}

/// All calendar days of the given month, in order.
pub fn dates_in_month(year: i16, month: i8) -> Vec<Date> {
    let first = date(year, month, 1);
    (1..=first.days_in_month())
        .map(|d| date(year, month, d))
        .collect()
}
