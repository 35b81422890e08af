use crate::config::Settings;
use crate::forecast::{Forecast, ForecastClient};
use crate::risk::{RiskAssessment, RiskClassifier, NEUTRAL_RISK_CLASS};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

const FORECAST_PATH: &str = "/forecast";
const RISK_PATH: &str = "/dynamicRisk";

/// HTTP client for the external model service hosting the price forecaster
/// and the risk classifier. One attempt per call; callers own the fallback.
#[derive(Debug, Clone)]
pub struct ModelServiceClient {
    http: reqwest::Client,
    base_url: String,
}

impl ModelServiceClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings.require_model_service_url()?.to_string();

        let http = reqwest::Client::builder()
            .timeout(settings.model_service_timeout)
            .build()
            .context("failed to build model service http client")?;

        Ok(Self { http, base_url })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn read_json(res: reqwest::Response) -> Result<Value> {
        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read model service response")?;
        let raw_json = serde_json::from_str::<Value>(&text)
            .with_context(|| format!("model service response is not valid JSON: {text}"))?;

        if !status.is_success() {
            anyhow::bail!("model service HTTP {status}: {raw_json}");
        }
        Ok(raw_json)
    }
}

#[async_trait::async_trait]
impl ForecastClient for ModelServiceClient {
    async fn forecast(&self, ticker: &str) -> Result<Forecast> {
        let res = self
            .http
            .post(self.url(FORECAST_PATH))
            .json(&serde_json::json!({ "ticker": ticker }))
            .send()
            .await
            .context("forecast request failed")?;

        parse_forecast(Self::read_json(res).await?)
    }
}

#[async_trait::async_trait]
impl RiskClassifier for ModelServiceClient {
    async fn classify(&self, ticker: &str) -> Result<RiskAssessment> {
        let res = self
            .http
            .get(self.url(RISK_PATH))
            .query(&[("ticker", ticker)])
            .send()
            .await
            .context("risk request failed")?;

        parse_risk(Self::read_json(res).await?)
    }
}

#[derive(Debug, Deserialize)]
struct ForecastPayload {
    predicted_close: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RiskPayload {
    risk_class: Option<i32>,
    overall_risk: Option<String>,
    detailed_explanation: Option<String>,
}

fn parse_forecast(raw: Value) -> Result<Forecast> {
    let payload = serde_json::from_value::<ForecastPayload>(raw)
        .context("failed to parse forecast response")?;
    let predicted_close = payload
        .predicted_close
        .context("forecast response has no predicted_close")?;
    anyhow::ensure!(
        predicted_close.is_finite(),
        "predicted_close is not finite"
    );
    Ok(Forecast { predicted_close })
}

fn parse_risk(raw: Value) -> Result<RiskAssessment> {
    let payload =
        serde_json::from_value::<RiskPayload>(raw).context("failed to parse risk response")?;
    let risk_class = payload.risk_class.unwrap_or(NEUTRAL_RISK_CLASS);
    let canonical = RiskAssessment::for_class(risk_class)
        .with_context(|| format!("risk_class out of range: {risk_class}"))?;

    Ok(RiskAssessment {
        risk_class,
        overall_risk: payload
            .overall_risk
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(canonical.overall_risk),
        detailed_explanation: payload
            .detailed_explanation
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(canonical.detailed_explanation),
    })
}
