//! Exchange-rate client and the two currency tools built on it.

use async_trait::async_trait;
use macrosage_core::error::{ToolError, UpstreamError};
use macrosage_core::tool::{ParamKind, ParamSpec, Tool, ToolSpec};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::{map_status_error, map_transport_error};

const DEFAULT_BASE: &str = "USD";
const DEFAULT_TARGET: &str = "EUR";

#[derive(Debug, Deserialize)]
pub struct RatesSnapshot {
    pub base: String,
    pub date: String,
    #[serde(default)]
    pub rates: BTreeMap<String, f64>,
}

/// HTTP client for a `/latest/{base}` exchange-rate endpoint.
pub struct ExchangeClient {
    http: reqwest::Client,
    base_url: String,
}

impl ExchangeClient {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Current rates for a base currency.
    pub async fn latest(&self, base_currency: &str) -> Result<RatesSnapshot, UpstreamError> {
        let base = base_currency.to_uppercase();
        debug!(base = %base, "Fetching exchange rates");

        let response = self
            .http
            .get(format!("{}/latest/{}", self.base_url, base))
            .send()
            .await
            .map_err(|e| map_transport_error(e, 10))?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status_error(status, &body));
        }

        response
            .json()
            .await
            .map_err(|e| UpstreamError::Malformed(format!("exchange response: {e}")))
    }

    /// Convert an amount between two currencies at the current rate.
    pub async fn convert(
        &self,
        amount: f64,
        from_currency: &str,
        to_currency: &str,
    ) -> Result<Value, UpstreamError> {
        let to = to_currency.to_uppercase();
        let snapshot = self.latest(from_currency).await?;

        let rate = snapshot
            .rates
            .get(&to)
            .copied()
            .ok_or_else(|| UpstreamError::Malformed(format!("currency {to} not found")))?;

        let converted = amount * rate;
        Ok(json!({
            "original_amount": amount,
            "original_currency": from_currency.to_uppercase(),
            "converted_amount": (converted * 100.0).round() / 100.0,
            "converted_currency": to,
            "exchange_rate": rate,
            "date": snapshot.date,
        }))
    }
}

/// Current exchange rates for a base currency.
pub struct ExchangeRatesTool {
    client: Arc<ExchangeClient>,
}

impl ExchangeRatesTool {
    pub fn new(client: Arc<ExchangeClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for ExchangeRatesTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "get_exchange_rates",
            "Get current exchange rates for a base currency (default USD).",
            vec![ParamSpec::optional(
                "base_currency",
                ParamKind::String,
                "ISO currency code to quote rates against",
            )],
        )
    }

    async fn execute(&self, arguments: Value) -> Result<Value, ToolError> {
        let base = arguments
            .get("base_currency")
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_BASE);
        let snapshot = self.client.latest(base).await?;
        Ok(json!({
            "base": snapshot.base,
            "date": snapshot.date,
            "rates": snapshot.rates,
        }))
    }
}

/// Purchasing-power comparison between two currencies.
pub struct PurchasingPowerTool {
    client: Arc<ExchangeClient>,
}

impl PurchasingPowerTool {
    pub fn new(client: Arc<ExchangeClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for PurchasingPowerTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "compare_purchasing_power",
            "Convert an amount between currencies to compare purchasing power.",
            vec![
                ParamSpec::required("amount", ParamKind::Number, "Amount to convert"),
                ParamSpec::optional(
                    "from_currency",
                    ParamKind::String,
                    "Source currency code (default USD)",
                ),
                ParamSpec::optional(
                    "to_currency",
                    ParamKind::String,
                    "Target currency code (default EUR)",
                ),
            ],
        )
    }

    async fn execute(&self, arguments: Value) -> Result<Value, ToolError> {
        let amount = arguments
            .get("amount")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| {
                ToolError::InvalidArguments("compare_purchasing_power: 'amount' missing".into())
            })?;
        let from = arguments
            .get("from_currency")
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_BASE);
        let to = arguments
            .get("to_currency")
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_TARGET);

        Ok(self.client.convert(amount, from, to).await?)
    }
}
