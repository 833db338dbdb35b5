//! News search client and the economic-news tool built on it.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use macrosage_core::error::{ToolError, UpstreamError};
use macrosage_core::tool::{ParamKind, ParamSpec, Tool, ToolSpec};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::debug;

use crate::{map_status_error, map_transport_error};

const DEFAULT_QUERY: &str = "economy OR inflation OR federal reserve";
const DEFAULT_DAYS_BACK: i64 = 7;
const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(default)]
    articles: Vec<Article>,
    #[serde(default, rename = "totalResults")]
    total_results: u64,
}

#[derive(Debug, Deserialize)]
struct Article {
    title: Option<String>,
    description: Option<String>,
    #[serde(default)]
    source: ArticleSource,
    url: Option<String>,
    #[serde(rename = "publishedAt")]
    published_at: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ArticleSource {
    name: Option<String>,
}

/// HTTP client for a NewsAPI-compatible `/everything` endpoint.
pub struct NewsClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl NewsClient {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Fetch recent English-language articles matching `query`, relevancy
    /// sorted, from the trailing week.
    pub async fn economic_news(&self, query: Option<&str>) -> Result<Value, UpstreamError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| UpstreamError::Auth("News API key not configured".into()))?;

        let query = query.unwrap_or(DEFAULT_QUERY);
        let from = (Utc::now() - Duration::days(DEFAULT_DAYS_BACK))
            .format("%Y-%m-%d")
            .to_string();
        let page_size = DEFAULT_PAGE_SIZE.to_string();

        debug!(query, from = %from, "Fetching economic news");

        let response = self
            .http
            .get(format!("{}/everything", self.base_url))
            .query(&[
                ("q", query),
                ("from", &from),
                ("sortBy", "relevancy"),
                ("language", "en"),
                ("pageSize", &page_size),
                ("apiKey", api_key),
            ])
            .send()
            .await
            .map_err(|e| map_transport_error(e, 10))?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status_error(status, &body));
        }

        let parsed: NewsResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::Malformed(format!("news response: {e}")))?;

        let articles: Vec<_> = parsed
            .articles
            .into_iter()
            .take(DEFAULT_PAGE_SIZE as usize)
            .map(|a| {
                json!({
                    "title": a.title,
                    "description": a.description,
                    "source": a.source.name,
                    "url": a.url,
                    "published_at": a.published_at,
                })
            })
            .collect();

        Ok(json!({
            "articles": articles,
            "total_results": parsed.total_results,
        }))
    }
}

/// Recent economic news headlines.
pub struct EconomicNewsTool {
    client: Arc<NewsClient>,
}

impl EconomicNewsTool {
    pub fn new(client: Arc<NewsClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for EconomicNewsTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "get_economic_news",
            "Get recent economic news headlines. Optionally filter by a search query.",
            vec![ParamSpec::optional(
                "query",
                ParamKind::String,
                "Search terms; defaults to broad economy coverage",
            )],
        )
    }

    async fn execute(&self, arguments: Value) -> Result<Value, ToolError> {
        let query = arguments.get("query").and_then(|v| v.as_str());
        Ok(self.client.economic_news(query).await?)
    }
}
