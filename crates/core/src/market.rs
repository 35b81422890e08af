use crate::domain::quote::StockQuote;
use anyhow::Result;

/// Read side of the price/risk store used by the allocator.
#[async_trait::async_trait]
pub trait QuoteStore: Send + Sync {
    /// All quotes with `risk_class <= max_risk`. Order is not meaningful.
    async fn find_by_risk_ceiling(&self, max_risk: i32) -> Result<Vec<StockQuote>>;

    async fn get_quote(&self, ticker: &str) -> Result<Option<StockQuote>>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryQuoteStore {
    quotes: Vec<StockQuote>,
}

impl InMemoryQuoteStore {
    pub fn new(quotes: Vec<StockQuote>) -> Self {
        Self { quotes }
    }
}

#[async_trait::async_trait]
impl QuoteStore for InMemoryQuoteStore {
    async fn find_by_risk_ceiling(&self, max_risk: i32) -> Result<Vec<StockQuote>> {
        Ok(self
            .quotes
            .iter()
            .filter(|q| q.risk_class <= max_risk)
            .cloned()
            .collect())
    }

    async fn get_quote(&self, ticker: &str) -> Result<Option<StockQuote>> {
        Ok(self.quotes.iter().find(|q| q.ticker == ticker).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> InMemoryQuoteStore {
        InMemoryQuoteStore::new(vec![
            StockQuote {
                ticker: "AAA".to_string(),
                company_name: "AAA".to_string(),
                risk_class: 1,
                close_price: 10.0,
            },
            StockQuote {
                ticker: "BBB".to_string(),
                company_name: "BBB".to_string(),
                risk_class: 4,
                close_price: 30.0,
            },
        ])
    }

    #[tokio::test]
    async fn filters_by_ceiling() {
        let s = store();
        assert_eq!(s.find_by_risk_ceiling(3).await.unwrap().len(), 1);
        assert_eq!(s.find_by_risk_ceiling(5).await.unwrap().len(), 2);
        assert!(s.find_by_risk_ceiling(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_ticker_is_none() {
        let s = store();
        assert!(s.get_quote("ZZZ").await.unwrap().is_none());
        assert_eq!(s.get_quote("BBB").await.unwrap().unwrap().close_price, 30.0);
    }
}
