use crate::allocator::{self, AllocationError};
use crate::domain::recommendation::{
    RecommendationRequest, RecommendationResponse, RecommendedStock,
};
use crate::forecast::{forecast_or_none, ForecastClient};
use crate::market::QuoteStore;
use crate::valuation::{predicted_percent, round2};
use futures::stream::{self, StreamExt};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum RecommendError {
    #[error(transparent)]
    Allocation(#[from] AllocationError),
    #[error("quote store lookup failed")]
    Store(#[source] anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct RecommendOptions {
    pub max_candidates: usize,
    pub percent_bias: f64,
    pub forecast_timeout: Duration,
    pub forecast_concurrency: usize,
}

impl Default for RecommendOptions {
    fn default() -> Self {
        Self {
            max_candidates: allocator::DEFAULT_MAX_CANDIDATES,
            percent_bias: 10.0,
            forecast_timeout: Duration::from_secs(3),
            forecast_concurrency: 4,
        }
    }
}

impl RecommendOptions {
    pub fn from_settings(settings: &crate::config::Settings) -> Self {
        Self {
            max_candidates: settings.recommendation_max_candidates,
            percent_bias: settings.forecast_percent_bias,
            forecast_timeout: settings.model_service_timeout,
            forecast_concurrency: settings.forecast_concurrency,
        }
    }
}

pub async fn recommend(
    quotes: &dyn QuoteStore,
    forecaster: &dyn ForecastClient,
    req: RecommendationRequest,
    opts: &RecommendOptions,
) -> Result<RecommendationResponse, RecommendError> {
    // Reject bad budgets before touching the store.
    if !req.budget.is_finite() || req.budget <= 0.0 {
        return Err(AllocationError::InvalidBudget.into());
    }

    let pool = quotes
        .find_by_risk_ceiling(req.risk_level)
        .await
        .map_err(RecommendError::Store)?;

    let allocation = allocator::allocate(req.budget, req.risk_level, &pool, opts.max_candidates)?;

    // `buffered` keeps input order even though calls overlap.
    let timeout = opts.forecast_timeout;
    let tickers: Vec<String> = allocation.items.iter().map(|c| c.quote.ticker.clone()).collect();
    let forecasts: Vec<Option<f64>> = stream::iter(tickers)
        .map(move |ticker| async move {
            forecast_or_none(forecaster, &ticker, timeout)
                .await
                .map(|f| f.predicted_close)
        })
        .buffered(opts.forecast_concurrency.max(1))
        .collect()
        .await;

    let recommended_portfolio: Vec<RecommendedStock> = allocation
        .items
        .iter()
        .zip(forecasts)
        .map(|(c, predicted)| {
            let current_price = c.quote.close_price;
            RecommendedStock {
                ticker: c.quote.ticker.clone(),
                company_name: c.quote.company_name.clone(),
                risk_class: c.quote.risk_class,
                current_price,
                quantity: c.quantity,
                total_allocation: round2(c.quantity as f64 * current_price),
                predicted_percent: predicted_percent(current_price, predicted, opts.percent_bias),
            }
        })
        .collect();

    tracing::debug!(
        budget = req.budget,
        risk_level = req.risk_level,
        pool_len = pool.len(),
        items = recommended_portfolio.len(),
        total_cost = %allocation.total_cost,
        "recommendation assembled"
    );

    Ok(RecommendationResponse {
        recommended_portfolio,
        total_cost: round2(allocation.total_cost()),
        remaining_budget: round2(allocation.remaining_budget()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::quote::StockQuote;
    use crate::forecast::Forecast;
    use crate::forecast::UnavailableForecaster;
    use crate::market::InMemoryQuoteStore;
    use std::collections::HashMap;

    /// Returns the configured close for known tickers and fails for the rest.
    struct MapForecaster(HashMap<&'static str, f64>);

    #[async_trait::async_trait]
    impl ForecastClient for MapForecaster {
        async fn forecast(&self, ticker: &str) -> anyhow::Result<Forecast> {
            match self.0.get(ticker) {
                Some(&predicted_close) => Ok(Forecast { predicted_close }),
                None => anyhow::bail!("model exploded for {ticker}"),
            }
        }
    }

    fn store() -> InMemoryQuoteStore {
        InMemoryQuoteStore::new(vec![
            StockQuote {
                ticker: "BBB".to_string(),
                company_name: "Bravo".to_string(),
                risk_class: 2,
                close_price: 30.0,
            },
            StockQuote {
                ticker: "AAA".to_string(),
                company_name: "Alpha".to_string(),
                risk_class: 1,
                close_price: 10.0,
            },
            StockQuote {
                ticker: "ZZZ".to_string(),
                company_name: "Zulu".to_string(),
                risk_class: 5,
                close_price: 1.0,
            },
        ])
    }

    fn req(budget: f64, risk_level: i32) -> RecommendationRequest {
        RecommendationRequest { budget, risk_level }
    }

    #[tokio::test]
    async fn assembles_worked_example_with_forecasts() {
        let forecaster = MapForecaster(HashMap::from([("AAA", 12.0), ("BBB", 27.0)]));
        let out = recommend(&store(), &forecaster, req(100.0, 2), &RecommendOptions::default())
            .await
            .unwrap();

        assert_eq!(out.total_cost, 100.0);
        assert_eq!(out.remaining_budget, 0.0);
        assert_eq!(out.recommended_portfolio.len(), 2);

        let a = &out.recommended_portfolio[0];
        assert_eq!(a.ticker, "AAA");
        assert_eq!(a.company_name, "Alpha");
        assert_eq!(a.quantity, 7);
        assert_eq!(a.total_allocation, 70.0);
        // ((12 - 10 + 10) / 10) * 100
        assert_eq!(a.predicted_percent, 120.0);

        let b = &out.recommended_portfolio[1];
        assert_eq!(b.ticker, "BBB");
        assert_eq!(b.quantity, 1);
        assert_eq!(b.total_allocation, 30.0);
        // ((27 - 30 + 10) / 30) * 100
        assert_eq!(b.predicted_percent, 23.33);
    }

    #[tokio::test]
    async fn one_failed_forecast_does_not_affect_siblings() {
        let forecaster = MapForecaster(HashMap::from([("BBB", 27.0)]));
        let out = recommend(&store(), &forecaster, req(100.0, 2), &RecommendOptions::default())
            .await
            .unwrap();

        assert_eq!(out.recommended_portfolio[0].ticker, "AAA");
        assert_eq!(out.recommended_portfolio[0].predicted_percent, 0.0);
        assert_eq!(out.recommended_portfolio[1].predicted_percent, 23.33);
    }

    #[tokio::test]
    async fn surfaces_client_errors() {
        let forecaster = MapForecaster(HashMap::new());
        let opts = RecommendOptions::default();

        let err = recommend(&store(), &forecaster, req(0.0, 2), &opts)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RecommendError::Allocation(AllocationError::InvalidBudget)
        ));

        let err = recommend(&store(), &forecaster, req(100.0, 0), &opts)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RecommendError::Allocation(AllocationError::NoCandidates)
        ));
    }

    fn assert_send<T: Send>(_: T) {}

    #[test]
    fn recommend_future_is_send() {
        let quotes = store();
        let forecaster = MapForecaster(HashMap::new());
        let opts = RecommendOptions::default();
        assert_send(recommend(&quotes, &forecaster, req(100.0, 2), &opts));
    }

    #[tokio::test]
    async fn total_allocation_uses_real_price() {
        let quotes = InMemoryQuoteStore::new(vec![StockQuote {
            ticker: "ODD".to_string(),
            company_name: "Odd Lot".to_string(),
            risk_class: 1,
            close_price: 10.004,
        }]);
        let out = recommend(&quotes, &UnavailableForecaster, req(100.0, 1), &RecommendOptions::default())
            .await
            .unwrap();

        let odd = &out.recommended_portfolio[0];
        assert_eq!(odd.quantity, 9);
        assert_eq!(odd.total_allocation, 90.04);
        assert_eq!(out.total_cost, 90.04);
        assert_eq!(out.remaining_budget, 9.96);
    }

    #[tokio::test]
    async fn bias_is_configurable() {
        let forecaster = MapForecaster(HashMap::from([("AAA", 12.0), ("BBB", 27.0)]));
        let opts = RecommendOptions {
            percent_bias: 0.0,
            ..RecommendOptions::default()
        };
        let out = recommend(&store(), &forecaster, req(100.0, 2), &opts)
            .await
            .unwrap();
        assert_eq!(out.recommended_portfolio[0].predicted_percent, 20.0);
        assert_eq!(out.recommended_portfolio[1].predicted_percent, -10.0);
    }
}
