use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calculation::sizing::selected_leverage;
use crate::calculation::{AccountState, FeeSchedule};
use crate::common::types::{AccountType, CrossMarginSettings, Market, OrderType, Position};

/// Market and account data the calculations run against
///
/// Loaded by `PreviewEngine::sync` or pushed in by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeContext {
    pub market: Option<Market>,
    pub position: Option<Position>,
    pub free_margin: Decimal,
    pub cross_margin_settings: CrossMarginSettings,
    pub dynamic_fee_rate: Decimal,
    pub keeper_eth_balance: Decimal,
    /// Leverage the user picked, per market asset
    pub preferred_leverage: HashMap<String, Decimal>,
    /// Price typed for limit/stop orders
    pub order_price: Option<Decimal>,
}

impl TradeContext {
    pub fn max_leverage(&self) -> Decimal {
        self.market
            .as_ref()
            .map(|m| m.max_leverage)
            .unwrap_or_default()
    }

    pub fn account_state(&self, account_type: AccountType) -> AccountState {
        let free_margin = match account_type {
            AccountType::CrossMargin => self.free_margin,
            AccountType::IsolatedMargin => Decimal::ZERO,
        };
        AccountState::from_position(
            account_type,
            self.position.as_ref(),
            free_margin,
            self.max_leverage(),
        )
    }

    pub fn fee_schedule(&self, market: &Market, keeper_eth_deposit: Decimal) -> FeeSchedule {
        FeeSchedule::for_market(
            market,
            self.dynamic_fee_rate,
            self.cross_margin_settings.clone(),
            keeper_eth_deposit,
        )
    }

    /// Price the trade executes at: the typed order price for limit/stop
    /// orders, the market price otherwise
    pub fn trade_price(&self, order_type: OrderType) -> Decimal {
        if order_type.is_advanced() {
            return self.order_price.unwrap_or_default();
        }
        self.market.as_ref().map(|m| m.price).unwrap_or_default()
    }

    pub fn selected_leverage(&self, default_leverage: Decimal) -> Decimal {
        let preferred = self
            .market
            .as_ref()
            .and_then(|m| self.preferred_leverage.get(&m.asset))
            .copied();
        selected_leverage(preferred, default_leverage, self.max_leverage())
    }
}
