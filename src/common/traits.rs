//! Trait definitions for the pricing/margin oracle

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::errors::Result;
use super::types::{AccountType, CrossMarginSettings, Market, Position};
use crate::calculation::fees;
use crate::calculation::{PotentialTrade, PreviewRequest};

/// Source of prices, fees and margin figures
///
/// The engine never computes on-chain figures itself; everything
/// authoritative comes through this trait. Implementations must be cheap to
/// share across tasks.
#[async_trait]
pub trait PricingOracle: Send + Sync {
    /// Static fee rate of `market` for a trade of `size_delta`
    ///
    /// Derived from the market's maker/taker rates and skew by default.
    fn static_fee_rate(&self, market: &Market, size_delta: Decimal) -> Decimal {
        fees::static_fee_rate(market, size_delta)
    }

    /// Market parameters (price, max leverage, fee rates, skew)
    async fn market(&self, market_key: &str) -> Result<Market>;

    /// Margin and open position of `account` in a market, if any
    async fn position(
        &self,
        market_key: &str,
        account: &str,
        account_type: AccountType,
    ) -> Result<Option<Position>>;

    /// Exchange fee rate that moves with volatility
    async fn dynamic_fee_rate(&self, market_key: &str) -> Result<Decimal>;

    /// Fee rates of the cross-margin account contract
    async fn cross_margin_settings(&self) -> Result<CrossMarginSettings>;

    /// Idle margin in a cross-margin account
    async fn free_margin(&self, account: &str) -> Result<Decimal>;

    /// ETH held by the account to pay keepers
    async fn keeper_eth_balance(&self, account: &str) -> Result<Decimal>;

    /// Authoritative preview of a trade
    ///
    /// Rejections come back as `PreviewError::Rejected` with the oracle's
    /// message.
    async fn preview_trade(&self, request: &PreviewRequest) -> Result<PotentialTrade>;

    /// Name used in logs
    fn oracle_name(&self) -> &'static str;
}
