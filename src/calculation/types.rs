use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calculation::fees::skew_fee_rate;

use crate::common::types::{
    AccountType, CrossMarginSettings, CurrencyType, FeeRates, Market, OpenPosition, OrderType,
    Position, PositionSide,
};

/// A staged trade, as typed by the user and converted through the price
///
/// Size deltas are signed: positive opens/extends long, negative short.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderInput {
    pub side: PositionSide,
    pub native_size_delta: Decimal,
    pub susd_size_delta: Decimal,
    pub order_price: Decimal,
    pub leverage: Decimal,
    /// Which size field the user edited; the other one is derived
    pub edited: CurrencyType,
}

impl OrderInput {
    /// Leverage-only change: no size, just a new target leverage at `price`
    pub fn leverage_only(side: PositionSide, leverage: Decimal, price: Decimal) -> Self {
        Self {
            side,
            native_size_delta: Decimal::ZERO,
            susd_size_delta: Decimal::ZERO,
            order_price: price,
            leverage,
            edited: CurrencyType::Usd,
        }
    }

    pub fn has_size(&self) -> bool {
        !self.native_size_delta.is_zero()
    }
}

/// Account figures the calculations need, flattened from the oracle reads
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountState {
    pub account_type: AccountType,
    /// Margin held by the position in this market
    pub position_margin: Decimal,
    pub accessible_margin: Decimal,
    /// Idle margin in the cross-margin account
    pub free_margin: Decimal,
    pub position: Option<OpenPosition>,
    pub max_leverage: Decimal,
}

impl AccountState {
    pub fn from_position(
        account_type: AccountType,
        position: Option<&Position>,
        free_margin: Decimal,
        max_leverage: Decimal,
    ) -> Self {
        Self {
            account_type,
            position_margin: position.map(|p| p.remaining_margin).unwrap_or_default(),
            accessible_margin: position.map(|p| p.accessible_margin).unwrap_or_default(),
            free_margin,
            position: position.and_then(|p| p.position.clone()),
            max_leverage,
        }
    }

    /// Margin that can back a new trade: the position's margin, plus the
    /// account's free margin for cross-margin accounts
    pub fn remaining_margin(&self) -> Decimal {
        match self.account_type {
            AccountType::IsolatedMargin => self.position_margin,
            AccountType::CrossMargin => self.position_margin + self.free_margin,
        }
    }

    pub fn position_side(&self) -> Option<PositionSide> {
        self.position.as_ref().map(|p| p.side)
    }

    pub fn signed_position_size(&self) -> Decimal {
        self.position.as_ref().map(|p| p.signed_size()).unwrap_or_default()
    }

    pub fn position_notional(&self) -> Decimal {
        self.position.as_ref().map(|p| p.notional_value).unwrap_or_default()
    }

    pub fn above_max_leverage(&self) -> bool {
        match &self.position {
            Some(open) if !self.position_margin.is_zero() => {
                (open.notional_value / self.position_margin).abs() > self.max_leverage
            }
            _ => false,
        }
    }
}

/// Every rate that can apply to a trade in one market
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub fee_rates: FeeRates,
    pub market_skew: Decimal,
    pub dynamic_fee_rate: Decimal,
    pub cross_margin: CrossMarginSettings,
    /// ETH the keeper must hold before a limit/stop order is accepted
    pub keeper_eth_deposit: Decimal,
    /// Static rate quoted by the oracle for the trade; the skew curve
    /// applies when unset
    pub static_fee_rate: Option<Decimal>,
}

impl FeeSchedule {
    pub fn for_market(
        market: &Market,
        dynamic_fee_rate: Decimal,
        cross_margin: CrossMarginSettings,
        keeper_eth_deposit: Decimal,
    ) -> Self {
        Self {
            fee_rates: market.fee_rates.clone(),
            market_skew: market.market_skew,
            dynamic_fee_rate,
            cross_margin,
            keeper_eth_deposit,
            static_fee_rate: None,
        }
    }

    /// Static rate for a trade of `size_delta`
    pub fn static_rate(&self, size_delta: Decimal) -> Decimal {
        self.static_fee_rate
            .unwrap_or_else(|| skew_fee_rate(&self.fee_rates, self.market_skew, size_delta))
    }

    /// Fee rate of the limit/stop order type, zero for the others
    pub fn advanced_order_rate(&self, order_type: OrderType) -> Decimal {
        match order_type {
            OrderType::Limit => self.cross_margin.limit_order_fee,
            OrderType::StopMarket => self.cross_margin.stop_order_fee,
            OrderType::Market | OrderType::Delayed => Decimal::ZERO,
        }
    }
}

/// Fee breakdown for a staged trade
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeFees {
    pub static_fee: Decimal,
    pub dynamic_fee: Decimal,
    pub cross_margin_fee: Decimal,
    pub limit_stop_order_fee: Decimal,
    /// ETH to send with the order so the keeper can execute it
    pub keeper_eth_deposit: Decimal,
    pub dynamic_fee_rate: Decimal,
    pub total: Decimal,
}

impl TradeFees {
    pub fn zero() -> Self {
        Self::default()
    }
}

/// Request sent to the oracle for an authoritative preview
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRequest {
    pub market_key: String,
    pub account: Option<String>,
    pub account_type: AccountType,
    pub order_type: OrderType,
    pub size_delta: Decimal,
    pub margin_delta: Decimal,
    pub price: Decimal,
}

/// Oracle answer to a preview request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PotentialTrade {
    pub margin: Decimal,
    pub notional_value: Decimal,
    pub fee: Decimal,
    pub liquidation_price: Option<Decimal>,
    #[serde(default)]
    pub leverage: Decimal,
    /// Rejection message; a trade carrying one must not be shown
    #[serde(default)]
    pub error: Option<String>,
}

/// Where a preview's figures came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewSource {
    /// Local estimate computed synchronously on the edit
    Optimistic,
    /// Authoritative figures from the oracle
    Oracle,
}

/// Available margin, buying power and usage for an account or a preview
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarginSummary {
    pub total_margin: Decimal,
    pub available_margin: Decimal,
    pub buying_power: Decimal,
    pub margin_usage: Decimal,
}

/// Computed outcome of a hypothetical trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradePreview {
    pub source: PreviewSource,
    /// Sequence number of the input this preview was computed for
    pub seq: u64,
    pub size_delta: Decimal,
    pub margin_delta: Decimal,
    pub fees: TradeFees,
    pub total_fee: Decimal,
    pub max_fee: Decimal,
    pub margin: Decimal,
    pub notional_value: Decimal,
    pub leverage: Decimal,
    pub liquidation_price: Option<Decimal>,
    pub summary: MarginSummary,
    pub computed_at: DateTime<Utc>,
}

impl TradePreview {
    pub fn margin_usage(&self) -> Decimal {
        self.summary.margin_usage
    }

    pub fn buying_power(&self) -> Decimal {
        self.summary.buying_power
    }

    pub fn available_margin(&self) -> Decimal {
        self.summary.available_margin
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_remaining_margin_by_account_type() {
        let mut account = AccountState {
            account_type: AccountType::IsolatedMargin,
            position_margin: dec!(400),
            free_margin: dec!(600),
            max_leverage: dec!(25),
            ..Default::default()
        };
        assert_eq!(account.remaining_margin(), dec!(400));

        account.account_type = AccountType::CrossMargin;
        assert_eq!(account.remaining_margin(), dec!(1000));
    }

    #[test]
    fn test_above_max_leverage() {
        let account = AccountState {
            account_type: AccountType::CrossMargin,
            position_margin: dec!(100),
            position: Some(OpenPosition {
                side: PositionSide::Long,
                size: dec!(1),
                notional_value: dec!(2600),
            }),
            max_leverage: dec!(25),
            ..Default::default()
        };
        assert!(account.above_max_leverage());
    }

    #[test]
    fn test_advanced_order_rate() {
        let schedule = FeeSchedule {
            cross_margin: CrossMarginSettings {
                trade_fee: dec!(0.0005),
                limit_order_fee: dec!(0.0003),
                stop_order_fee: dec!(0.0004),
            },
            ..Default::default()
        };
        assert_eq!(schedule.advanced_order_rate(OrderType::Limit), dec!(0.0003));
        assert_eq!(schedule.advanced_order_rate(OrderType::StopMarket), dec!(0.0004));
        assert_eq!(schedule.advanced_order_rate(OrderType::Market), Decimal::ZERO);
    }
}
