//! Wire types of the oracle's HTTP gateway
//!
//! Amounts travel as decimal strings.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calculation::PotentialTrade;
use crate::common::types::{
    CrossMarginSettings, FeeRates, Market, OpenPosition, Position, PositionSide,
};

/// Market parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketResponse {
    pub key: String,
    pub asset: String,
    pub price: Decimal,
    pub max_leverage: Decimal,
    #[serde(default)]
    pub min_initial_margin: Decimal,
    #[serde(default)]
    pub market_skew: Decimal,
    pub fee_rates: FeeRatesResponse,
    #[serde(default)]
    pub keeper_deposit: Decimal,
    #[serde(default)]
    pub is_suspended: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeRatesResponse {
    pub maker_fee: Decimal,
    pub taker_fee: Decimal,
    #[serde(default)]
    pub maker_fee_delayed_order: Decimal,
    #[serde(default)]
    pub taker_fee_delayed_order: Decimal,
}

impl From<MarketResponse> for Market {
    fn from(response: MarketResponse) -> Self {
        Market {
            key: response.key,
            asset: response.asset,
            price: response.price,
            max_leverage: response.max_leverage,
            min_initial_margin: response.min_initial_margin,
            market_skew: response.market_skew,
            fee_rates: FeeRates {
                maker_fee: response.fee_rates.maker_fee,
                taker_fee: response.fee_rates.taker_fee,
                maker_fee_delayed_order: response.fee_rates.maker_fee_delayed_order,
                taker_fee_delayed_order: response.fee_rates.taker_fee_delayed_order,
            },
            keeper_deposit: response.keeper_deposit,
            is_suspended: response.is_suspended,
        }
    }
}

/// Dynamic exchange fee
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicFeeResponse {
    pub fee_rate: Decimal,
    /// Set when the exchange is halted for volatility
    #[serde(default)]
    pub too_volatile: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossMarginSettingsResponse {
    pub trade_fee: Decimal,
    pub limit_order_fee: Decimal,
    pub stop_order_fee: Decimal,
}

impl From<CrossMarginSettingsResponse> for CrossMarginSettings {
    fn from(response: CrossMarginSettingsResponse) -> Self {
        CrossMarginSettings {
            trade_fee: response.trade_fee,
            limit_order_fee: response.limit_order_fee,
            stop_order_fee: response.stop_order_fee,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreeMarginResponse {
    pub free_margin: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub balance: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionResponse {
    pub remaining_margin: Decimal,
    #[serde(default)]
    pub accessible_margin: Decimal,
    #[serde(default)]
    pub position: Option<OpenPositionResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPositionResponse {
    pub side: PositionSide,
    pub size: Decimal,
    pub notional_value: Decimal,
}

impl From<PositionResponse> for Position {
    fn from(response: PositionResponse) -> Self {
        Position {
            remaining_margin: response.remaining_margin,
            accessible_margin: response.accessible_margin,
            position: response
                .position
                // An empty position is reported with zero size
                .filter(|p| !p.size.is_zero())
                .map(|p| OpenPosition {
                    side: p.side,
                    size: p.size.abs(),
                    notional_value: p.notional_value.abs(),
                }),
        }
    }
}

/// Answer to a preview request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub margin: Decimal,
    pub notional_value: Decimal,
    pub fee: Decimal,
    #[serde(default)]
    pub liquidation_price: Option<Decimal>,
    #[serde(default)]
    pub leverage: Decimal,
    /// Rejection message, present when the trade would fail
    #[serde(default)]
    pub error: Option<String>,
}

impl From<PreviewResponse> for PotentialTrade {
    fn from(response: PreviewResponse) -> Self {
        PotentialTrade {
            margin: response.margin,
            notional_value: response.notional_value.abs(),
            fee: response.fee,
            liquidation_price: response.liquidation_price,
            leverage: response.leverage,
            error: response.error.filter(|e| !e.is_empty()),
        }
    }
}

/// Error body returned with non-2xx statuses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
