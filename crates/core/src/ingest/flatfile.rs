//! Bulk price files: one `<ticker>.us.txt` CSV per instrument with a
//! `Date,Open,High,Low,Close,Volume,OpenInt` header.

use crate::ingest::types::{HistoricalPriceRow, IngestBatch, RawPriceRow, StockSnapshotRow};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const FILE_SUFFIX: &str = ".us.txt";
const SUBDIRS: [&str; 2] = ["Stocks", "ETFs"];

pub const DEFAULT_TOP_N: usize = 100;

pub fn ticker_from_path(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let ticker = name.strip_suffix(FILE_SUFFIX)?;
    (!ticker.is_empty()).then(|| ticker.to_string())
}

/// Price files under `<dir>/Stocks` and `<dir>/ETFs`, or under `dir` itself
/// when neither exists. Sorted for a stable ingest order.
pub fn discover_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let roots: Vec<PathBuf> = SUBDIRS
        .iter()
        .map(|s| dir.join(s))
        .filter(|p| p.is_dir())
        .collect();
    let roots = if roots.is_empty() {
        vec![dir.to_path_buf()]
    } else {
        roots
    };

    let mut out = Vec::new();
    for root in roots {
        let entries =
            std::fs::read_dir(&root).with_context(|| format!("read_dir failed: {}", root.display()))?;
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && ticker_from_path(&path).is_some() {
                out.push(path);
            }
        }
    }
    out.sort();
    Ok(out)
}

/// Parses one file. Returns the rows and the number of data lines skipped.
pub fn parse_price_file(contents: &str) -> Result<(Vec<RawPriceRow>, usize)> {
    let mut lines = contents.lines().filter(|l| !l.trim().is_empty());
    let Some(header) = lines.next() else {
        return Ok((Vec::new(), 0));
    };

    let columns: Vec<String> = header
        .split(',')
        .map(|c| c.trim().to_ascii_lowercase())
        .collect();
    let col = |name: &str| {
        columns
            .iter()
            .position(|c| c == name)
            .with_context(|| format!("missing column {name:?} in header {header:?}"))
    };
    let (i_date, i_open, i_high, i_low, i_close, i_volume) = (
        col("date")?,
        col("open")?,
        col("high")?,
        col("low")?,
        col("close")?,
        col("volume")?,
    );

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for line in lines {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let num = |i: usize| fields.get(i).and_then(|s| s.parse::<f64>().ok()).filter(|v| v.is_finite());

        let parsed = (|| {
            let date = NaiveDate::parse_from_str(fields.get(i_date)?, "%Y-%m-%d").ok()?;
            Some(RawPriceRow {
                date,
                open: num(i_open)?,
                high: num(i_high)?,
                low: num(i_low)?,
                close: num(i_close)?,
                volume: num(i_volume)?.round() as i64,
            })
        })();

        match parsed {
            Some(row) => rows.push(row),
            None => skipped += 1,
        }
    }

    Ok((rows, skipped))
}

/// Normalises closes across every loaded row, keeps the `top_n` tickers by
/// average volume (ties by ticker) and derives their latest snapshot.
pub fn build_batch(series: Vec<(String, Vec<RawPriceRow>)>, top_n: usize) -> IngestBatch {
    let (min_close, max_close) = series
        .iter()
        .flat_map(|(_, rows)| rows.iter().map(|r| r.close))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), c| {
            (lo.min(c), hi.max(c))
        });
    let span = max_close - min_close;
    let normalize = |close: f64| {
        if span > 0.0 {
            (close - min_close) / span
        } else {
            0.0
        }
    };

    let mut ranked: Vec<(f64, String, Vec<RawPriceRow>)> = series
        .into_iter()
        .filter(|(_, rows)| !rows.is_empty())
        .map(|(ticker, rows)| {
            let avg_volume =
                rows.iter().map(|r| r.volume as f64).sum::<f64>() / rows.len() as f64;
            (avg_volume, ticker, rows)
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.1.cmp(&b.1))
    });
    ranked.truncate(top_n);

    let mut batch = IngestBatch::default();
    for (_, ticker, mut rows) in ranked {
        rows.sort_by_key(|r| r.date);
        rows.dedup_by_key(|r| r.date);

        if let Some(latest) = rows.last() {
            batch.stocks.push(StockSnapshotRow {
                ticker: ticker.clone(),
                company_name: ticker.to_uppercase(),
                sector: None,
                market_cap: None,
                close: latest.close,
                volume: latest.volume,
                as_of_date: latest.date,
            });
        }

        batch
            .history
            .extend(rows.into_iter().map(|r| HistoricalPriceRow {
                ticker: ticker.clone(),
                date: r.date,
                open: r.open,
                high: r.high,
                low: r.low,
                close: r.close,
                close_norm: normalize(r.close),
                volume: r.volume,
            }));
    }

    batch
}

pub fn load_dir(dir: &Path, top_n: usize) -> Result<IngestBatch> {
    anyhow::ensure!(top_n >= 1, "top_n must be >= 1");

    let files = discover_files(dir)?;
    anyhow::ensure!(
        !files.is_empty(),
        "no *{FILE_SUFFIX} files found under {}",
        dir.display()
    );

    let mut series = Vec::with_capacity(files.len());
    let mut files_read = 0usize;
    let mut rows_skipped = 0usize;

    for path in &files {
        let Some(ticker) = ticker_from_path(path) else {
            continue;
        };
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("read failed: {}", path.display()))?;
        if contents.trim().is_empty() {
            continue;
        }

        match parse_price_file(&contents) {
            Ok((rows, skipped)) => {
                files_read += 1;
                rows_skipped += skipped;
                if !rows.is_empty() {
                    series.push((ticker, rows));
                }
            }
            Err(err) => {
                tracing::warn!(file = %path.display(), error = %err, "unreadable price file; skipping");
            }
        }
    }

    let mut batch = build_batch(series, top_n);
    batch.files_read = files_read;
    batch.rows_skipped = rows_skipped;
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;

    const AAPL: &str = "Date,Open,High,Low,Close,Volume,OpenInt\n\
2017-11-08,174.0,176.0,173.5,175.0,2000,0\n\
2017-11-09,175.1,176.1,174.0,176.0,3000,0\n\
not-a-date,1,1,1,1,1,0\n\
2017-11-07,172.0,174.0,171.0,173.0,1000,0\n";

    fn rows(closes_and_volumes: &[(&str, f64, i64)]) -> Vec<RawPriceRow> {
        closes_and_volumes
            .iter()
            .map(|(d, close, volume)| RawPriceRow {
                date: NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap(),
                open: *close,
                high: *close,
                low: *close,
                close: *close,
                volume: *volume,
            })
            .collect()
    }

    #[test]
    fn derives_ticker_from_file_name() {
        assert_eq!(
            ticker_from_path(Path::new("/data/Stocks/aapl.us.txt")),
            Some("aapl".to_string())
        );
        assert_eq!(ticker_from_path(Path::new("/data/Stocks/readme.md")), None);
        assert_eq!(ticker_from_path(Path::new(".us.txt")), None);
    }

    #[test]
    fn parses_rows_and_counts_skips() {
        let (rows, skipped) = parse_price_file(AAPL).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(skipped, 1);
        assert_eq!(rows[1].close, 176.0);
        assert_eq!(rows[1].volume, 3000);
    }

    #[test]
    fn header_without_close_is_an_error() {
        assert!(parse_price_file("Date,Open,High,Low,Volume\n2017-01-01,1,1,1,1\n").is_err());
        assert_eq!(parse_price_file("").unwrap().0.len(), 0);
    }

    #[test]
    fn keeps_top_tickers_by_average_volume() {
        let series = vec![
            ("low".to_string(), rows(&[("2020-01-01", 5.0, 10)])),
            (
                "high".to_string(),
                rows(&[("2020-01-02", 20.0, 500), ("2020-01-01", 15.0, 300)]),
            ),
            ("mid".to_string(), rows(&[("2020-01-01", 10.0, 100)])),
        ];
        let batch = build_batch(series, 2);

        let tickers: Vec<&str> = batch.stocks.iter().map(|s| s.ticker.as_str()).collect();
        assert_eq!(tickers, ["high", "mid"]);
        assert_eq!(batch.stocks[0].company_name, "HIGH");
        assert_eq!(batch.stocks[0].close, 20.0);
        assert_eq!(
            batch.stocks[0].as_of_date,
            NaiveDate::from_ymd_opt(2020, 1, 2).unwrap()
        );
        assert_eq!(batch.history.len(), 3);
        assert!(batch.history[0].date < batch.history[1].date);
    }

    #[test]
    fn normalises_close_over_all_loaded_rows() {
        let series = vec![
            ("a".to_string(), rows(&[("2020-01-01", 5.0, 10)])),
            ("b".to_string(), rows(&[("2020-01-01", 25.0, 20)])),
            ("c".to_string(), rows(&[("2020-01-01", 15.0, 30)])),
        ];
        let batch = build_batch(series, 2);

        // "a" is dropped but still defines the minimum.
        let norm: Vec<(&str, f64)> = batch
            .history
            .iter()
            .map(|h| (h.ticker.as_str(), h.close_norm))
            .collect();
        assert_eq!(norm, [("c", 0.5), ("b", 1.0)]);
    }

    #[test]
    fn flat_prices_normalise_to_zero() {
        let series = vec![("a".to_string(), rows(&[("2020-01-01", 7.0, 10)]))];
        let batch = build_batch(series, 10);
        assert_eq!(batch.history[0].close_norm, 0.0);
    }
}
