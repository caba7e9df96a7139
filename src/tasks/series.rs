//! Extraction of measurement series from result files.
//!
//! The engine binaries print one measurement per line, tab separated, with
//! a leading tag naming the measurement:
//!
//! ```text
//! THROUGHPUT	<...>	<x>	<y>
//! LATENCY	<x>	<y>
//! LATENCYFRACTION	<...>	<x>	<y>
//! RSS	<x>	<y>
//! ```

use anyhow::Result;
use csv::{QuoteStyle, ReaderBuilder, WriterBuilder};
use log::{debug, error};
use std::{fmt, fs, path::Path};

/// Tags of the measurement lines the charts consume.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tag {
    Throughput,
    Latency,
    LatencyFraction,
    Rss,
}

impl Tag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::Throughput => "THROUGHPUT",
            Tag::Latency => "LATENCY",
            Tag::LatencyFraction => "LATENCYFRACTION",
            Tag::Rss => "RSS",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which rows and columns to pull out of a result file.
#[derive(Clone, Debug)]
pub struct Extract {
    pub tag: Tag,
    /// 1-based column indices, in output order
    pub columns: Vec<usize>,
    /// Keep only every n-th matching row
    pub every_nth: Option<usize>,
}

impl Extract {
    pub fn new(tag: Tag, columns: &[usize]) -> Self {
        Extract {
            tag,
            columns: columns.to_vec(),
            every_nth: None,
        }
    }

    pub fn every_nth(mut self, n: usize) -> Self {
        self.every_nth = Some(n);
        self
    }

    /// Read the matching rows of `path`. Rows lacking one of the requested
    /// columns are dropped. Lines need not be valid UTF-8.
    pub fn read(&self, path: &Path) -> Result<Vec<Vec<String>>> {
        let mut reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .from_path(path)
            .map_err(|e| {
                let reason = format!(
                    "error opening result file (path={}, error={e:?})",
                    path.display()
                );
                error!("{reason}");
                anyhow::anyhow!(reason)
            })?;

        let mut rows = Vec::new();
        let mut num_matching = 0;
        for record in reader.byte_records() {
            let record = record?;
            if record.get(0) != Some(self.tag.as_str().as_bytes()) {
                continue;
            }

            num_matching += 1;
            if let Some(n) = self.every_nth {
                if n > 0 && num_matching % n != 0 {
                    continue;
                }
            }

            let row: Option<Vec<String>> = self
                .columns
                .iter()
                .map(|c| {
                    c.checked_sub(1)
                        .and_then(|i| record.get(i))
                        .map(|f| String::from_utf8_lossy(f).into_owned())
                })
                .collect();
            match row {
                Some(row) => rows.push(row),
                None => debug!(
                    "read(): dropping short row (path={}, row={record:?})",
                    path.display()
                ),
            }
        }

        Ok(rows)
    }
}

/// Write `rows` tab separated to `dest`, appending if asked to.
pub fn write_series(rows: &[Vec<String>], dest: &Path, append: bool) -> Result<()> {
    let file = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(dest)
        .map_err(|e| {
            let reason = format!(
                "error opening data file (path={}, error={e:?})",
                dest.display()
            );
            error!("{reason}");
            anyhow::anyhow!(reason)
        })?;

    let mut writer = WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quote_style(QuoteStyle::Never)
        .from_writer(file);
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;

    Ok(())
}

/// Read `(x, y)` pairs from the first two columns of a data file, skipping
/// rows that are not numeric.
pub fn read_points(path: &Path) -> Result<Vec<(f64, f64)>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_path(path)?;

    let parse = |v: &[u8]| {
        std::str::from_utf8(v)
            .ok()
            .and_then(|s| s.trim().parse::<f64>().ok())
    };

    let mut points = Vec::new();
    for record in reader.byte_records() {
        let record = record?;
        let x = record.get(0).and_then(parse);
        let y = record.get(1).and_then(parse);
        if let (Some(x), Some(y)) = (x, y) {
            points.push((x, y));
        }
    }

    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const LOG: &str = "loading graph\n\
        THROUGHPUT\t1\t4\t1000000\n\
        LATENCY\t10\t0.5\n\
        LATENCYFRACTION\tx\t10\t0.25\n\
        LATENCY\t20\t0.1\n\
        THROUGHPUT\tshort\n\
        RSS\t1\t100\n\
        RSS\t2\t200\n\
        RSS\t3\t300\n\
        RSS\t4\t400\n";

    fn write_log(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("arrange_n=1_w=4");
        fs::write(&path, LOG).unwrap();
        path
    }

    #[test]
    fn test_tag_must_match_exactly() {
        let temp_dir = tempdir().unwrap();
        let path = write_log(temp_dir.path());

        let rows = Extract::new(Tag::Latency, &[2, 3]).read(&path).unwrap();
        assert_eq!(rows, vec![vec!["10", "0.5"], vec!["20", "0.1"]]);
    }

    #[test]
    fn test_short_rows_are_dropped() {
        let temp_dir = tempdir().unwrap();
        let path = write_log(temp_dir.path());

        let rows = Extract::new(Tag::Throughput, &[3, 4]).read(&path).unwrap();
        assert_eq!(rows, vec![vec!["4", "1000000"]]);
    }

    #[test]
    fn test_every_nth() {
        let temp_dir = tempdir().unwrap();
        let path = write_log(temp_dir.path());

        let rows = Extract::new(Tag::Rss, &[2, 3])
            .every_nth(2)
            .read(&path)
            .unwrap();
        assert_eq!(rows, vec![vec!["2", "200"], vec!["4", "400"]]);
    }

    #[test]
    fn test_write_append_and_read_points() {
        let temp_dir = tempdir().unwrap();
        let dest = temp_dir.path().join("data");

        write_series(&[], &dest, false).unwrap();
        write_series(&[vec!["1".to_string(), "10".to_string()]], &dest, true).unwrap();
        write_series(&[vec!["2".to_string(), "20".to_string()]], &dest, true).unwrap();

        assert_eq!(fs::read_to_string(&dest).unwrap(), "1\t10\n2\t20\n");
        assert_eq!(read_points(&dest).unwrap(), vec![(1.0, 10.0), (2.0, 20.0)]);
    }

    #[test]
    fn test_non_utf8_lines_are_tolerated() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("arrange_n=1_w=4");
        fs::write(
            &path,
            b"loading graph from /data/caf\xe9\nLATENCY\t10\t0.5\nRSS\t1\t1\xff\n",
        )
        .unwrap();

        let rows = Extract::new(Tag::Latency, &[2, 3]).read(&path).unwrap();
        assert_eq!(rows, vec![vec!["10", "0.5"]]);

        let rows = Extract::new(Tag::Rss, &[2, 3]).read(&path).unwrap();
        assert_eq!(rows, vec![vec!["1".to_string(), "1\u{FFFD}".to_string()]]);
    }

    #[test]
    fn test_read_points_skips_non_utf8_rows() {
        let temp_dir = tempdir().unwrap();
        let dest = temp_dir.path().join("data");
        fs::write(&dest, b"1\t10\n\xe9\t5\n2\t20\n").unwrap();

        assert_eq!(read_points(&dest).unwrap(), vec![(1.0, 10.0), (2.0, 20.0)]);
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = tempdir().unwrap();
        assert!(Extract::new(Tag::Rss, &[2, 3])
            .read(&temp_dir.path().join("nope"))
            .is_err());
    }
}
