use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use chrono::{DateTime, Utc};

/// Writes `timestamp,<value_header>` rows as CSV. Zero-valued readings are
/// written, not filtered; the caller already chose what belongs in the file.
pub fn write_csv(
    path: &Path,
    value_header: &str,
    rows: &[(DateTime<Utc>, i64)],
) -> std::io::Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    writeln!(file, "timestamp,{value_header}")?;
    for (timestamp, value) in rows {
        writeln!(file, "{},{value}", timestamp.to_rfc3339())?;
    }
    file.flush()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn rows_come_out_ordered_with_zeros_kept() {
        let day = Utc.with_ymd_and_hms(2025, 11, 12, 0, 0, 0).unwrap();
        let rows = vec![
            (day, 70),
            (day + chrono::TimeDelta::minutes(5), 0),
            (day + chrono::TimeDelta::minutes(10), 72),
        ];

        let path = std::env::temp_dir().join("openring-export-test.csv");
        write_csv(&path, "heart_rate", &rows).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines[0], "timestamp,heart_rate");
        assert_eq!(lines[1], "2025-11-12T00:00:00+00:00,70");
        assert_eq!(lines[2], "2025-11-12T00:05:00+00:00,0");
        assert_eq!(lines.len(), 4);
    }
}
