//! HTTP client for the oracle gateway

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

use super::messages::*;
use crate::calculation::{PotentialTrade, PreviewRequest};
use crate::common::errors::{KnownRejection, PreviewError, Result};
use crate::common::traits::PricingOracle;
use crate::common::types::{AccountType, CrossMarginSettings, Market, Position};
use crate::config::types::OracleConfig;

/// Oracle reached over a JSON gateway
#[derive(Debug, Clone)]
pub struct RestOracle {
    client: Client,
    base_url: Url,
}

impl RestOracle {
    /// Create a client with the default 30 second timeout
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| PreviewError::Configuration(format!("invalid oracle url {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(PreviewError::Configuration(format!(
                "oracle url cannot be a base: {}",
                base_url
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PreviewError::Internal(e.to_string()))?;

        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &OracleConfig) -> Result<Self> {
        Self::with_timeout(&config.rest_url, Duration::from_secs(config.request_timeout_seconds))
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| PreviewError::Configuration(format!("bad base url: {}", self.base_url)))?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        let response = Self::check_status(response).await?;
        Ok(response.json().await?)
    }

    async fn check_status(response: Response) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(PreviewError::InvalidResponse(format!(
            "Server returned status {}: {}",
            status, body
        )))
    }
}

#[async_trait]
impl PricingOracle for RestOracle {
    #[instrument(skip(self))]
    async fn market(&self, market_key: &str) -> Result<Market> {
        let url = self.endpoint(&["markets", market_key])?;
        let response = self.client.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(PreviewError::MarketNotFound(market_key.to_string()));
        }
        let market: MarketResponse = Self::check_status(response).await?.json().await?;
        Ok(market.into())
    }

    #[instrument(skip(self))]
    async fn position(
        &self,
        market_key: &str,
        account: &str,
        account_type: AccountType,
    ) -> Result<Option<Position>> {
        let mut url = self.endpoint(&["accounts", account, "positions", market_key])?;
        url.query_pairs_mut()
            .append_pair("accountType", &account_type.to_string());

        let response = self.client.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let position: PositionResponse = Self::check_status(response).await?.json().await?;
        Ok(Some(position.into()))
    }

    #[instrument(skip(self))]
    async fn dynamic_fee_rate(&self, market_key: &str) -> Result<Decimal> {
        let url = self.endpoint(&["markets", market_key, "dynamic-fee"])?;
        let fee: DynamicFeeResponse = self.get_json(url).await?;
        if fee.too_volatile {
            warn!("Dynamic fee for {} flagged too volatile", market_key);
        }
        Ok(fee.fee_rate)
    }

    #[instrument(skip(self))]
    async fn cross_margin_settings(&self) -> Result<CrossMarginSettings> {
        let url = self.endpoint(&["cross-margin", "settings"])?;
        let settings: CrossMarginSettingsResponse = self.get_json(url).await?;
        Ok(settings.into())
    }

    #[instrument(skip(self))]
    async fn free_margin(&self, account: &str) -> Result<Decimal> {
        let url = self.endpoint(&["accounts", account, "free-margin"])?;
        let margin: FreeMarginResponse = self.get_json(url).await?;
        Ok(margin.free_margin)
    }

    #[instrument(skip(self))]
    async fn keeper_eth_balance(&self, account: &str) -> Result<Decimal> {
        let url = self.endpoint(&["accounts", account, "keeper-balance"])?;
        let balance: BalanceResponse = self.get_json(url).await?;
        Ok(balance.balance)
    }

    #[instrument(skip(self, request), fields(market = %request.market_key))]
    async fn preview_trade(&self, request: &PreviewRequest) -> Result<PotentialTrade> {
        let url = self.endpoint(&["markets", &request.market_key, "preview"])?;
        debug!(
            "Requesting preview: size {} margin {} price {}",
            request.size_delta, request.margin_delta, request.price
        );

        let response = self.client.post(url).json(request).send().await?;
        let status = response.status();

        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return match serde_json::from_str::<ErrorResponse>(&body) {
                Ok(err) => Err(PreviewError::Rejected(err.error)),
                Err(_) => Err(PreviewError::InvalidResponse(format!(
                    "Server returned status {}: {}",
                    status, body
                ))),
            };
        }

        let preview: PreviewResponse = Self::check_status(response).await?.json().await?;
        let mut trade: PotentialTrade = preview.into();
        if let Some(message) = trade.error.take() {
            if KnownRejection::from_message(&message).is_none() {
                debug!("Unrecognised preview rejection: {}", message);
            }
            return Err(PreviewError::Rejected(message));
        }
        Ok(trade)
    }

    fn oracle_name(&self) -> &'static str {
        "rest"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_segments() {
        let oracle = RestOracle::new("http://localhost:9000/api/").expect("client");
        let url = oracle.endpoint(&["markets", "sETHPERP", "preview"]).expect("url");
        assert_eq!(url.as_str(), "http://localhost:9000/api/markets/sETHPERP/preview");
    }

    #[test]
    fn test_rejects_bad_url() {
        assert!(matches!(
            RestOracle::new("not a url"),
            Err(PreviewError::Configuration(_))
        ));
        assert!(matches!(
            RestOracle::new("mailto:ops@example.com"),
            Err(PreviewError::Configuration(_))
        ));
    }
}
