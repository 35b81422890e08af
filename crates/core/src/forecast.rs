use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub predicted_close: f64,
}

/// Next-close forecaster. Treated as unreliable by every caller.
#[async_trait::async_trait]
pub trait ForecastClient: Send + Sync {
    async fn forecast(&self, ticker: &str) -> Result<Forecast>;
}

/// Stand-in used when no model service is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableForecaster;

#[async_trait::async_trait]
impl ForecastClient for UnavailableForecaster {
    async fn forecast(&self, _ticker: &str) -> Result<Forecast> {
        anyhow::bail!("forecast service is not configured")
    }
}

/// Single attempt, bounded by `timeout`. Any failure is logged and absorbed.
pub async fn forecast_or_none(
    client: &dyn ForecastClient,
    ticker: &str,
    timeout: Duration,
) -> Option<Forecast> {
    match tokio::time::timeout(timeout, client.forecast(ticker)).await {
        Ok(Ok(forecast)) if forecast.predicted_close.is_finite() => Some(forecast),
        Ok(Ok(forecast)) => {
            tracing::warn!(%ticker, predicted_close = forecast.predicted_close, "non-finite forecast; ignoring");
            None
        }
        Ok(Err(err)) => {
            tracing::warn!(%ticker, error = %err, "forecast call failed; using fallback");
            None
        }
        Err(_) => {
            tracing::warn!(%ticker, timeout_ms = timeout.as_millis(), "forecast call timed out; using fallback");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(f64);

    #[async_trait::async_trait]
    impl ForecastClient for Fixed {
        async fn forecast(&self, _ticker: &str) -> Result<Forecast> {
            Ok(Forecast {
                predicted_close: self.0,
            })
        }
    }

    struct Slow;

    #[async_trait::async_trait]
    impl ForecastClient for Slow {
        async fn forecast(&self, _ticker: &str) -> Result<Forecast> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Forecast {
                predicted_close: 1.0,
            })
        }
    }

    #[tokio::test]
    async fn passes_through_success() {
        let f = forecast_or_none(&Fixed(12.5), "AAA", Duration::from_secs(1)).await;
        assert_eq!(f, Some(Forecast { predicted_close: 12.5 }));
    }

    #[tokio::test]
    async fn absorbs_errors_timeouts_and_nan() {
        let timeout = Duration::from_millis(20);
        assert!(forecast_or_none(&UnavailableForecaster, "AAA", timeout).await.is_none());
        assert!(forecast_or_none(&Slow, "AAA", timeout).await.is_none());
        assert!(forecast_or_none(&Fixed(f64::NAN), "AAA", timeout).await.is_none());
    }
}
