//! CoinGecko market-data provider implementation

use crate::{
    config::SyncConfig,
    constants::{
        COINGECKO_API_URL, COINGECKO_MARKETS_ENDPOINT, COINGECKO_SEARCH_ENDPOINT,
        REQUEST_TIMEOUT_SECS, SEARCH_RESULT_LIMIT, USER_AGENT, VS_CURRENCY,
    },
    error::ProviderError,
    provider::MarketDataProvider,
    types::Coin,
};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::time::{Duration, Instant};

/// One entry of the `/coins/markets` response
#[derive(Debug, Deserialize)]
struct MarketEntry {
    id: String,
    symbol: String,
    name: String,
    image: Option<String>,
    current_price: Option<f64>,
    price_change_24h: Option<f64>,
    price_change_percentage_24h: Option<f64>,
}

impl From<MarketEntry> for Coin {
    fn from(entry: MarketEntry) -> Self {
        Coin {
            id: entry.id,
            symbol: entry.symbol,
            name: entry.name,
            image_url: entry.image,
            current_price: entry.current_price,
            price_change_24h: entry.price_change_24h,
            price_change_percentage_24h: entry.price_change_percentage_24h,
        }
    }
}

/// `/search` response; only the coin section is used
#[derive(Debug, Deserialize)]
struct SearchResponse {
    coins: Vec<SearchEntry>,
}

#[derive(Debug, Deserialize)]
struct SearchEntry {
    id: String,
    name: String,
    symbol: String,
    large: Option<String>,
}

impl From<SearchEntry> for Coin {
    fn from(entry: SearchEntry) -> Self {
        let mut coin = Coin::new(entry.id, entry.symbol, entry.name);
        coin.image_url = entry.large;
        coin
    }
}

/// CoinGecko market-data provider
pub struct CoinGeckoProvider {
    client: Client,
    base_url: String,
}

impl CoinGeckoProvider {
    /// Creates a provider against the public CoinGecko API
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_base_url(COINGECKO_API_URL, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    /// Creates a provider from runtime configuration
    pub fn from_config(config: &SyncConfig) -> Result<Self, ProviderError> {
        Self::with_base_url(&config.api_base_url, config.request_timeout)
    }

    /// Creates a provider against any CoinGecko-compatible host
    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(ProviderError::Transport)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Builds the `/coins/markets` URL for the given ids
    fn build_market_url(&self, ids: &[String]) -> Result<Url, ProviderError> {
        if ids.is_empty() {
            return Err(ProviderError::invalid_request("no coin ids requested"));
        }
        if let Some(bad) = ids
            .iter()
            .find(|id| id.trim().is_empty() || id.contains(','))
        {
            return Err(ProviderError::invalid_request(format!(
                "coin id {:?} cannot be encoded",
                bad
            )));
        }

        let ids = ids.join(",");
        self.endpoint_url(
            COINGECKO_MARKETS_ENDPOINT,
            &[
                ("vs_currency", VS_CURRENCY),
                ("ids", ids.as_str()),
                ("order", "market_cap_desc"),
                ("per_page", "100"),
                ("page", "1"),
                ("sparkline", "false"),
                ("price_change_percentage", "24h"),
            ],
        )
    }

    fn build_search_url(&self, query: &str) -> Result<Url, ProviderError> {
        if query.trim().is_empty() {
            return Err(ProviderError::invalid_request("empty search query"));
        }
        self.endpoint_url(COINGECKO_SEARCH_ENDPOINT, &[("query", query)])
    }

    fn endpoint_url(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Url, ProviderError> {
        Url::parse_with_params(&format!("{}{}", self.base_url, endpoint), params).map_err(|e| {
            ProviderError::invalid_request(format!("bad URL {}{}: {}", self.base_url, endpoint, e))
        })
    }

    /// Issues a GET and returns the body of a 2xx response
    async fn get_body(&self, url: Url) -> Result<String, ProviderError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::HttpStatus(status.as_u16()));
        }

        Ok(response.text().await?)
    }
}

/// Parses a `/coins/markets` body
pub(crate) fn parse_market(body: &str) -> Result<Vec<Coin>, ProviderError> {
    let entries: Vec<MarketEntry> = serde_json::from_str(body).map_err(|e| {
        ProviderError::decode(format!("Failed to parse CoinGecko markets response: {}", e))
    })?;
    Ok(entries.into_iter().map(Coin::from).collect())
}

/// Parses a `/search` body, keeping the first [`SEARCH_RESULT_LIMIT`] coins
pub(crate) fn parse_search(body: &str) -> Result<Vec<Coin>, ProviderError> {
    let response: SearchResponse = serde_json::from_str(body).map_err(|e| {
        ProviderError::decode(format!("Failed to parse CoinGecko search response: {}", e))
    })?;
    Ok(response
        .coins
        .into_iter()
        .take(SEARCH_RESULT_LIMIT)
        .map(Coin::from)
        .collect())
}

#[async_trait]
impl MarketDataProvider for CoinGeckoProvider {
    async fn fetch_market(&self, ids: &[String]) -> Result<Vec<Coin>, ProviderError> {
        let url = self.build_market_url(ids)?;
        tracing::debug!(url = %url, "Fetching market data from CoinGecko");

        let start = Instant::now();
        let body = self.get_body(url).await?;
        let coins = parse_market(&body)?;

        tracing::debug!(
            requested = ids.len(),
            returned = coins.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Fetched market data from CoinGecko"
        );

        Ok(coins)
    }

    async fn search_coins(&self, query: &str) -> Result<Vec<Coin>, ProviderError> {
        let url = self.build_search_url(query)?;
        tracing::debug!(query, "Searching CoinGecko");

        let body = self.get_body(url).await?;
        parse_search(&body)
    }

    fn provider_name(&self) -> &'static str {
        "coingecko"
    }
}
