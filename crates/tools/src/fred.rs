//! FRED (Federal Reserve Economic Data) client and the indicator tools
//! built on it: inflation (CPIAUCSL year-over-year), unemployment (UNRATE),
//! the federal funds rate (FEDFUNDS), and real GDP growth (GDPC1).

use async_trait::async_trait;
use chrono::{Duration, Utc};
use macrosage_core::error::{ToolError, UpstreamError};
use macrosage_core::tool::{Tool, ToolSpec};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::debug;

use crate::{map_status_error, map_transport_error};

pub const SERIES_CPI: &str = "CPIAUCSL";
pub const SERIES_UNEMPLOYMENT: &str = "UNRATE";
pub const SERIES_FED_FUNDS: &str = "FEDFUNDS";
pub const SERIES_GDP: &str = "GDPC1";

/// One FRED observation. FRED marks missing values with ".".
#[derive(Debug, Clone, Deserialize)]
pub struct Observation {
    pub date: String,
    pub value: String,
}

impl Observation {
    /// Numeric value, `None` for missing or unparseable entries.
    pub fn numeric(&self) -> Option<f64> {
        if self.value == "." {
            return None;
        }
        self.value.parse().ok()
    }
}

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    #[serde(default)]
    observations: Vec<Observation>,
}

/// HTTP client for the FRED series-observations endpoint.
pub struct FredClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl FredClient {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Fetch observations for a series over the trailing `days_back` window.
    pub async fn series_observations(
        &self,
        series_id: &str,
        days_back: i64,
    ) -> Result<Vec<Observation>, UpstreamError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| UpstreamError::Auth("FRED API key not configured".into()))?;

        let end = Utc::now().format("%Y-%m-%d").to_string();
        let start = (Utc::now() - Duration::days(days_back))
            .format("%Y-%m-%d")
            .to_string();

        debug!(series_id, start = %start, end = %end, "Fetching FRED series");

        let response = self
            .http
            .get(format!("{}/series/observations", self.base_url))
            .query(&[
                ("series_id", series_id),
                ("api_key", api_key),
                ("file_type", "json"),
                ("observation_start", &start),
                ("observation_end", &end),
            ])
            .send()
            .await
            .map_err(|e| map_transport_error(e, 10))?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status_error(status, &body));
        }

        let parsed: ObservationsResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::Malformed(format!("FRED response: {e}")))?;

        Ok(parsed.observations)
    }

    /// Latest value of a series plus the trailing 12 observations.
    pub async fn latest(&self, series_id: &str) -> Result<Value, UpstreamError> {
        let observations = self.series_observations(series_id, 365).await?;
        let latest = observations
            .last()
            .ok_or_else(|| UpstreamError::Malformed("no observations returned".into()))?;

        let tail: Vec<_> = observations
            .iter()
            .rev()
            .take(12)
            .rev()
            .map(|o| json!({ "date": o.date, "value": o.value }))
            .collect();

        Ok(json!({
            "series_id": series_id,
            "latest_value": latest.value,
            "latest_date": latest.date,
            "observations": tail,
        }))
    }

    /// CPI inflation as the year-over-year percent change.
    ///
    /// Needs at least 13 monthly observations: the latest against the one
    /// twelve months earlier.
    pub async fn inflation_yoy(&self) -> Result<Value, UpstreamError> {
        self.yoy_change(SERIES_CPI, 400, 12).await
    }

    /// Real GDP growth, year-over-year. GDP is quarterly, so the latest
    /// quarter is compared against four quarters earlier (five observations
    /// inside a 500-day window).
    pub async fn gdp_growth(&self) -> Result<Value, UpstreamError> {
        self.yoy_change(SERIES_GDP, 500, 4).await
    }

    /// Year-over-year percent change: the latest observation against the
    /// one `lag` observations earlier.
    async fn yoy_change(
        &self,
        series_id: &str,
        days_back: i64,
        lag: usize,
    ) -> Result<Value, UpstreamError> {
        let observations = self.series_observations(series_id, days_back).await?;
        if observations.len() < lag + 1 {
            return Err(UpstreamError::Malformed(format!(
                "insufficient {series_id} data for year-over-year calculation"
            )));
        }

        let current = &observations[observations.len() - 1];
        let year_ago = &observations[observations.len() - 1 - lag];

        let (current_value, previous_value) = match (current.numeric(), year_ago.numeric()) {
            (Some(c), Some(p)) if p > 0.0 => (c, p),
            _ => {
                return Err(UpstreamError::Malformed(format!(
                    "{series_id} observations missing or non-positive"
                )));
            }
        };

        let yoy = ((current_value - previous_value) / previous_value) * 100.0;
        let tail: Vec<_> = observations
            .iter()
            .rev()
            .take(lag + 1)
            .rev()
            .map(|o| json!({ "date": o.date, "value": o.value }))
            .collect();

        Ok(json!({
            "series_id": series_id,
            "latest_value": (yoy * 100.0).round() / 100.0,
            "latest_date": current.date,
            "observations": tail,
        }))
    }
}

// --- Tool wrappers ---

/// Current CPI inflation rate, year-over-year.
pub struct InflationRateTool {
    client: Arc<FredClient>,
}

impl InflationRateTool {
    pub fn new(client: Arc<FredClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for InflationRateTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "get_inflation_rate",
            "Get the current US inflation rate (CPI, year-over-year percentage change).",
            vec![],
        )
    }

    async fn execute(&self, _arguments: Value) -> Result<Value, ToolError> {
        Ok(self.client.inflation_yoy().await?)
    }
}

/// Current US unemployment rate (UNRATE).
pub struct UnemploymentRateTool {
    client: Arc<FredClient>,
}

impl UnemploymentRateTool {
    pub fn new(client: Arc<FredClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for UnemploymentRateTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "get_unemployment_rate",
            "Get the current US unemployment rate with recent monthly history.",
            vec![],
        )
    }

    async fn execute(&self, _arguments: Value) -> Result<Value, ToolError> {
        Ok(self.client.latest(SERIES_UNEMPLOYMENT).await?)
    }
}

/// Current federal funds rate (FEDFUNDS).
pub struct InterestRatesTool {
    client: Arc<FredClient>,
}

impl InterestRatesTool {
    pub fn new(client: Arc<FredClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for InterestRatesTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "get_interest_rates",
            "Get the current Federal Funds Rate with recent monthly history.",
            vec![],
        )
    }

    async fn execute(&self, _arguments: Value) -> Result<Value, ToolError> {
        Ok(self.client.latest(SERIES_FED_FUNDS).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observation_numeric_parsing() {
        let obs = Observation {
            date: "2026-07-01".into(),
            value: "307.48".into(),
        };
        assert_eq!(obs.numeric(), Some(307.48));

        let missing = Observation {
            date: "2026-07-02".into(),
            value: ".".into(),
        };
        assert_eq!(missing.numeric(), None);
    }

    #[test]
    fn tool_specs_have_no_parameters() {
        let client = Arc::new(FredClient::new(
            reqwest::Client::new(),
            "https://api.stlouisfed.org/fred",
            None,
        ));
        for spec in [
            InflationRateTool::new(client.clone()).spec(),
            UnemploymentRateTool::new(client.clone()).spec(),
            InterestRatesTool::new(client).spec(),
        ] {
            assert!(spec.params.is_empty());
            assert_eq!(spec.to_schema()["required"], json!([]));
        }
    }

    #[tokio::test]
    async fn missing_api_key_is_auth_error() {
        let client = FredClient::new(reqwest::Client::new(), "https://example.invalid", None);
        let err = client.series_observations(SERIES_CPI, 400).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Auth(_)));
    }

    #[tokio::test]
    async fn gdp_growth_needs_an_api_key_before_any_network_call() {
        let client = FredClient::new(reqwest::Client::new(), "https://example.invalid", None);
        let err = client.gdp_growth().await.unwrap_err();
        assert!(matches!(err, UpstreamError::Auth(_)));
    }
}
