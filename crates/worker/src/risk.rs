use anyhow::Context;
use serde_json::json;
use stocksim_core::config::Settings;
use stocksim_core::model_service::ModelServiceClient;
use stocksim_core::risk::{RiskAssessment, RiskClassifier};
use stocksim_core::storage::{lock, market_data, stocks};

const JOB: &str = "risk-precompute";

#[derive(Debug, Default, PartialEq, Eq)]
struct Tally {
    classified: usize,
    stored: usize,
    failed: usize,
}

/// One classification per ticker. Failures are logged and skipped so one
/// bad ticker never blocks the rest.
async fn classify_all<F, Fut>(
    classifier: &dyn RiskClassifier,
    tickers: &[String],
    timeout: std::time::Duration,
    mut store: F,
) -> anyhow::Result<Tally>
where
    F: FnMut(String, RiskAssessment) -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<bool>>,
{
    let mut tally = Tally::default();
    for ticker in tickers {
        let assessment = match tokio::time::timeout(timeout, classifier.classify(ticker)).await {
            Ok(Ok(a)) => a,
            Ok(Err(err)) => {
                tracing::warn!(%ticker, error = %err, "risk classification failed; skipping");
                tally.failed += 1;
                continue;
            }
            Err(_) => {
                tracing::warn!(%ticker, "risk classification timed out; skipping");
                tally.failed += 1;
                continue;
            }
        };
        tally.classified += 1;
        tracing::debug!(%ticker, risk_class = assessment.risk_class, "classified");
        if store(ticker.clone(), assessment).await? {
            tally.stored += 1;
        }
    }
    Ok(tally)
}

pub async fn run(settings: &Settings, dry_run: bool) -> anyhow::Result<()> {
    let client = ModelServiceClient::from_settings(settings)?;
    let pool = crate::connect(settings).await?;
    let tickers = stocks::list_tickers(&pool).await?;

    if dry_run {
        let tally = classify_all(&client, &tickers, settings.model_service_timeout, |_, _| async {
            Ok::<_, anyhow::Error>(false)
        })
        .await?;
        tracing::info!(dry_run = true, tickers = tickers.len(), ?tally, "risk precompute (dry-run)");
        return Ok(());
    }

    let mut lock_conn = pool.acquire().await.context("acquire lock connection failed")?;
    if !lock::try_acquire_job_lock(&mut lock_conn, JOB).await? {
        tracing::warn!(job = JOB, "job lock not acquired; another run in progress");
        return Ok(());
    }

    let result = classify_all(&client, &tickers, settings.model_service_timeout, |ticker, a| {
        let pool = pool.clone();
        async move { stocks::update_risk(&pool, &ticker, &a).await }
    })
    .await;

    let run_id = match &result {
        Ok(tally) => {
            let details = json!({
                "tickers": tickers.len(),
                "classified": tally.classified,
                "stored": tally.stored,
                "failed": tally.failed,
            });
            market_data::record_ingest_run(&pool, JOB, "success", None, Some(details)).await
        }
        Err(err) => market_data::record_ingest_run(&pool, JOB, "error", Some(&format!("{err:#}")), None).await,
    };

    let _ = lock::release_job_lock(&mut lock_conn, JOB).await;

    let tally = result?;
    let run_id = run_id?;
    tracing::info!(%run_id, ?tally, "risk precompute finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct ByTicker;

    #[async_trait::async_trait]
    impl RiskClassifier for ByTicker {
        async fn classify(&self, ticker: &str) -> anyhow::Result<RiskAssessment> {
            match ticker {
                "slow" => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    anyhow::bail!("unreachable")
                }
                "bad" => anyhow::bail!("model error"),
                _ => RiskAssessment::for_class(2).context("class 2 exists"),
            }
        }
    }

    #[tokio::test]
    async fn failures_are_skipped_and_rest_are_stored() {
        let tickers: Vec<String> = ["aapl", "bad", "slow", "msft"].iter().map(|s| s.to_string()).collect();
        let stored = Arc::new(Mutex::new(Vec::new()));

        let tally = classify_all(&ByTicker, &tickers, Duration::from_millis(50), |ticker, a| {
            let stored = stored.clone();
            async move {
                stored.lock().unwrap().push((ticker, a.risk_class));
                Ok::<_, anyhow::Error>(true)
            }
        })
        .await
        .unwrap();

        assert_eq!(
            tally,
            Tally {
                classified: 2,
                stored: 2,
                failed: 2
            }
        );
        assert_eq!(
            *stored.lock().unwrap(),
            vec![("aapl".to_string(), 2), ("msft".to_string(), 2)]
        );
    }

    #[tokio::test]
    async fn store_errors_abort_the_run() {
        let tickers = vec!["aapl".to_string()];
        let res = classify_all(&ByTicker, &tickers, Duration::from_millis(50), |_, _| async {
            Err::<bool, _>(anyhow::anyhow!("db down"))
        })
        .await;
        assert!(res.is_err());
    }
}
