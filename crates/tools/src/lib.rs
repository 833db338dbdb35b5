//! Economic data tools for the MacroSage advisor.
//!
//! Three upstream clients (FRED economic series, news search, exchange
//! rates) and the six `Tool` implementations wrapping them. The clients are
//! also used directly by the gateway's dashboard rollup, without the agent
//! loop in between.

pub mod exchange;
pub mod fred;
pub mod news;

use std::sync::Arc;

use macrosage_config::UpstreamConfig;
use macrosage_core::ToolRegistry;
use macrosage_core::error::UpstreamError;

pub use exchange::{ExchangeClient, ExchangeRatesTool, PurchasingPowerTool};
pub use fred::{FredClient, InflationRateTool, InterestRatesTool, UnemploymentRateTool};
pub use news::{EconomicNewsTool, NewsClient};

/// The shared upstream clients, built once at startup.
#[derive(Clone)]
pub struct UpstreamClients {
    pub fred: Arc<FredClient>,
    pub news: Arc<NewsClient>,
    pub exchange: Arc<ExchangeClient>,
}

impl UpstreamClients {
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| UpstreamError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            fred: Arc::new(FredClient::new(
                http.clone(),
                &config.fred_base_url,
                config.fred_api_key.clone(),
            )),
            news: Arc::new(NewsClient::new(
                http.clone(),
                &config.news_base_url,
                config.news_api_key.clone(),
            )),
            exchange: Arc::new(ExchangeClient::new(http, &config.exchange_base_url)),
        })
    }
}

/// Build the full tool registry over a set of upstream clients.
pub fn default_registry(clients: &UpstreamClients) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(InflationRateTool::new(clients.fred.clone())));
    registry.register(Arc::new(UnemploymentRateTool::new(clients.fred.clone())));
    registry.register(Arc::new(InterestRatesTool::new(clients.fred.clone())));
    registry.register(Arc::new(EconomicNewsTool::new(clients.news.clone())));
    registry.register(Arc::new(ExchangeRatesTool::new(clients.exchange.clone())));
    registry.register(Arc::new(PurchasingPowerTool::new(clients.exchange.clone())));
    registry
}

/// Map a reqwest failure to a normalized upstream error.
pub(crate) fn map_transport_error(e: reqwest::Error, timeout_secs: u64) -> UpstreamError {
    if e.is_timeout() {
        UpstreamError::Timeout { timeout_secs }
    } else {
        UpstreamError::Network(e.to_string())
    }
}

/// Map a non-success upstream HTTP status to a normalized error.
pub(crate) fn map_status_error(status: u16, body: &str) -> UpstreamError {
    match status {
        429 => UpstreamError::RateLimited,
        401 | 403 => UpstreamError::Auth(format!("upstream rejected credentials ({status})")),
        _ => UpstreamError::Network(format!("upstream returned status {status}: {body}")),
    }
}
