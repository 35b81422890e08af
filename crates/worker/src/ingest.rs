use anyhow::Context;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use stocksim_core::config::Settings;
use stocksim_core::ingest::flatfile;
use stocksim_core::ingest::types::IngestBatch;
use stocksim_core::storage::{lock, market_data};

const JOB: &str = "ingest";

fn batch_details(dir: &Path, batch: &IngestBatch) -> Value {
    json!({
        "dir": dir.display().to_string(),
        "files_read": batch.files_read,
        "rows_skipped": batch.rows_skipped,
        "tickers": batch.stocks.len(),
        "history_rows": batch.history.len(),
    })
}

pub async fn run(settings: &Settings, dir: &Path, top: usize, dry_run: bool) -> anyhow::Result<()> {
    let path: PathBuf = dir.to_path_buf();
    let batch = tokio::task::spawn_blocking(move || flatfile::load_dir(&path, top))
        .await
        .context("ingest load task failed")??;
    let details = batch_details(dir, &batch);

    if dry_run {
        tracing::info!(dry_run = true, %details, "ingest loaded (dry-run)");
        return Ok(());
    }

    let pool = crate::connect(settings).await?;

    let mut lock_conn = pool.acquire().await.context("acquire lock connection failed")?;
    if !lock::try_acquire_job_lock(&mut lock_conn, JOB).await? {
        tracing::warn!(job = JOB, "job lock not acquired; another run in progress");
        return Ok(());
    }

    let result = market_data::replace_market_data(&pool, &batch).await;
    let run_id = match &result {
        Ok(stats) => {
            let mut details = details;
            details["stocks_upserted"] = json!(stats.stocks_upserted);
            details["stocks_removed"] = json!(stats.stocks_removed);
            details["history_inserted"] = json!(stats.history_rows);
            market_data::record_ingest_run(&pool, JOB, "success", None, Some(details)).await
        }
        Err(err) => {
            market_data::record_ingest_run(&pool, JOB, "error", Some(&format!("{err:#}")), Some(details))
                .await
        }
    };

    let _ = lock::release_job_lock(&mut lock_conn, JOB).await;

    let stats = result?;
    let run_id = run_id?;
    tracing::info!(
        %run_id,
        stocks_upserted = stats.stocks_upserted,
        stocks_removed = stats.stocks_removed,
        history_rows = stats.history_rows,
        "ingest finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use stocksim_core::ingest::types::StockSnapshotRow;

    #[test]
    fn details_summarise_batch() {
        let batch = IngestBatch {
            stocks: vec![StockSnapshotRow {
                ticker: "aapl".to_string(),
                company_name: "AAPL".to_string(),
                sector: None,
                market_cap: None,
                close: 175.0,
                volume: 1000,
                as_of_date: NaiveDate::from_ymd_opt(2017, 11, 10).unwrap(),
            }],
            history: Vec::new(),
            files_read: 3,
            rows_skipped: 2,
        };
        let d = batch_details(Path::new("/data"), &batch);
        assert_eq!(d["dir"], "/data");
        assert_eq!(d["files_read"], 3);
        assert_eq!(d["rows_skipped"], 2);
        assert_eq!(d["tickers"], 1);
        assert_eq!(d["history_rows"], 0);
    }
}
