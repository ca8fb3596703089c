//! CSV export for bid trajectories.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::report::BidRow;

/// Column header for the bid CSV export.
const HEADER: &str = "timestep,bid,expected_wind,mean_price,\
                       realised_wind,realised_price,system_long";

/// Exports bid rows to a CSV file at the given path.
///
/// Writes a header row followed by one data row per settlement interval.
/// Produces deterministic output for identical inputs.
///
/// # Arguments
///
/// * `rows` - Per-interval bid detail
/// * `path` - Output file path
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_csv(rows: &[BidRow], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_csv(rows, buf)
}

/// Writes bid rows as CSV to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_csv(rows: &[BidRow], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(HEADER.split(',').map(str::trim))?;

    for r in rows {
        wtr.write_record(&[
            r.timestep.to_string(),
            format!("{:.6}", r.bid),
            format!("{:.6}", r.expected_wind),
            format!("{:.4}", r.mean_price),
            format!("{:.6}", r.realised_wind),
            format!("{:.4}", r.realised_price),
            r.system_long.to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_row(t: usize) -> BidRow {
        BidRow {
            timestep: t,
            bid: 0.42,
            expected_wind: 0.45,
            mean_price: 51.5,
            realised_wind: 0.38,
            realised_price: 48.25,
            system_long: t % 2 == 0,
        }
    }

    #[test]
    fn header_matches_schema() {
        let mut buf = Vec::new();
        write_csv(&[make_row(0)], &mut buf).ok();
        let output = String::from_utf8(buf).ok();
        let first_line = output.as_deref().unwrap_or("").lines().next().unwrap_or("");
        assert_eq!(
            first_line,
            "timestep,bid,expected_wind,mean_price,realised_wind,realised_price,system_long"
        );
    }

    #[test]
    fn row_count_matches_horizon() {
        let rows: Vec<BidRow> = (0..24).map(make_row).collect();
        let mut buf = Vec::new();
        write_csv(&rows, &mut buf).ok();
        let output = String::from_utf8(buf).ok();
        let lines: Vec<&str> = output.as_deref().unwrap_or("").lines().collect();
        // 1 header + 24 data rows
        assert_eq!(lines.len(), 25);
    }

    #[test]
    fn rows_parse_back() {
        let rows: Vec<BidRow> = (0..3).map(make_row).collect();
        let mut buf = Vec::new();
        write_csv(&rows, &mut buf).ok();

        let mut rdr = csv::ReaderBuilder::new().from_reader(buf.as_slice());
        let headers = rdr.headers().cloned().ok();
        assert_eq!(headers.as_ref().map(csv::StringRecord::len), Some(7));

        let mut row_count = 0;
        for record in rdr.records() {
            let rec = record.expect("every row should parse");
            for i in 1..6 {
                let val: Result<f64, _> = rec[i].parse();
                assert!(val.is_ok(), "column {i} should parse as f64");
            }
            let long: Result<bool, _> = rec[6].parse();
            assert_eq!(long.ok(), Some(row_count % 2 == 0));
            row_count += 1;
        }
        assert_eq!(row_count, 3);
    }
}
