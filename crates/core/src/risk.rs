use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const MIN_RISK_CLASS: i32 = 1;
pub const MAX_RISK_CLASS: i32 = 5;
pub const NEUTRAL_RISK_CLASS: i32 = 3;

const DESCRIPTIONS: [(&str, &str); 5] = [
    (
        "Very Low Risk",
        "The model indicates that this stock has very low volatility, stable volume, and strong market capitalization. \
Such stocks are generally considered very safe with minimal price fluctuations.",
    ),
    (
        "Low Risk",
        "This stock appears to have low volatility and stable trading activity with a solid market cap, suggesting relatively low risk. \
It may offer modest returns with little downside.",
    ),
    (
        "Moderate Risk",
        "The risk assessment shows moderate volatility and trading volume. \
This stock exhibits average risk characteristics; it might offer balanced potential for both gains and losses.",
    ),
    (
        "High Risk",
        "The stock is characterized by high volatility and increased trading volume, indicating potential for significant price swings. \
Investors should exercise caution, as the risk of loss is higher.",
    ),
    (
        "Very High Risk",
        "The model classifies this stock as very high risk due to extremely high volatility and abnormal trading volume. \
Such stocks can experience dramatic price fluctuations, making them very unpredictable and risky for investment.",
    ),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk_class: i32,
    pub overall_risk: String,
    pub detailed_explanation: String,
}

impl RiskAssessment {
    /// Canonical label and explanation for a class in `1..=5`.
    pub fn for_class(risk_class: i32) -> Option<Self> {
        if !(MIN_RISK_CLASS..=MAX_RISK_CLASS).contains(&risk_class) {
            return None;
        }
        let (label, explanation) = DESCRIPTIONS[(risk_class - 1) as usize];
        Some(Self {
            risk_class,
            overall_risk: label.to_string(),
            detailed_explanation: explanation.to_string(),
        })
    }

    pub fn neutral() -> Self {
        Self {
            risk_class: NEUTRAL_RISK_CLASS,
            overall_risk: "Moderate Risk".to_string(),
            detailed_explanation: "No detailed data available.".to_string(),
        }
    }
}

#[async_trait::async_trait]
pub trait RiskClassifier: Send + Sync {
    async fn classify(&self, ticker: &str) -> Result<RiskAssessment>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableRiskClassifier;

#[async_trait::async_trait]
impl RiskClassifier for UnavailableRiskClassifier {
    async fn classify(&self, _ticker: &str) -> Result<RiskAssessment> {
        anyhow::bail!("risk service is not configured")
    }
}

pub async fn classify_or_neutral(
    classifier: &dyn RiskClassifier,
    ticker: &str,
    timeout: Duration,
) -> RiskAssessment {
    match tokio::time::timeout(timeout, classifier.classify(ticker)).await {
        Ok(Ok(assessment)) => assessment,
        Ok(Err(err)) => {
            tracing::warn!(%ticker, error = %err, "risk classification failed; using neutral fallback");
            RiskAssessment::neutral()
        }
        Err(_) => {
            tracing::warn!(%ticker, "risk classification timed out; using neutral fallback");
            RiskAssessment::neutral()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_labels_cover_all_classes() {
        assert_eq!(RiskAssessment::for_class(1).unwrap().overall_risk, "Very Low Risk");
        assert_eq!(RiskAssessment::for_class(3).unwrap().overall_risk, "Moderate Risk");
        assert_eq!(RiskAssessment::for_class(5).unwrap().overall_risk, "Very High Risk");
        assert!(RiskAssessment::for_class(0).is_none());
        assert!(RiskAssessment::for_class(6).is_none());
    }

    #[tokio::test]
    async fn unavailable_classifier_falls_back_to_neutral() {
        let out =
            classify_or_neutral(&UnavailableRiskClassifier, "AAA", Duration::from_millis(50)).await;
        assert_eq!(out, RiskAssessment::neutral());
        assert_eq!(out.risk_class, NEUTRAL_RISK_CLASS);
    }
}
