use build_html::{Html, HtmlContainer, HtmlPage};
use log::{info, warn};
use std::error::Error;
use std::fs;

use crate::table::Table;

/// Write a per-column profiling summary of the cleaned table as one HTML
/// page.  An empty table is skipped with a warning.
pub fn generate_profiling_report(df: &Table, output_file: &str) -> Result<(), Box<dyn Error>> {
    if df.is_empty() {
        warn!("empty table, skipping profiling report");
        return Ok(());
    }

    let mut summary = build_html::Table::new();
    summary.add_header_row(vec!["Column", "Type", "Missing", "Missing %", "Distinct"]);
    let n_rows = df.n_rows();
    for (idx, name) in df.columns.iter().enumerate() {
        let missing = df.null_count(idx);
        let distinct = df
            .rows
            .iter()
            .map(|r| format!("{:?}", r[idx]))
            .collect::<std::collections::HashSet<_>>()
            .len();
        summary.add_body_row(vec![
            name.clone(),
            df.column_type(idx).name().to_string(),
            missing.to_string(),
            format!("{:.1}", 100.0 * missing as f64 / n_rows as f64),
            distinct.to_string(),
        ]);
    }

    let page = HtmlPage::new()
        .with_title("TV Shows Profiling Report")
        .with_header(1, "TV Shows Profiling Report")
        .with_paragraph(format!("{} rows, {} columns", n_rows, df.n_columns()))
        .with_table(summary);

    fs::write(output_file, page.to_html_string())?;
    info!("profiling report generated: {}", output_file);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Datum;
    use std::error::Error;

    #[test]
    fn empty_table_writes_nothing() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("report.html");
        generate_profiling_report(&Table::new(), path.to_str().unwrap())?;
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn report_lists_every_column() -> Result<(), Box<dyn Error>> {
        let mut table = Table::new();
        table.push_record(vec![
            ("id".to_string(), Datum::Int(1)),
            ("name".to_string(), Datum::Str("Pilot".to_string())),
        ]);
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("report.html");
        generate_profiling_report(&table, path.to_str().unwrap())?;

        let html = fs::read_to_string(&path)?;
        assert!(html.contains("TV Shows Profiling Report"));
        assert!(html.contains("<td>id</td>"));
        assert!(html.contains("<td>name</td>"));
        Ok(())
    }
}
