use rust_decimal::Decimal;

use crate::calculation::types::{FeeSchedule, TradeFees};
use crate::common::types::{AccountType, FeeRates, Market, OrderType};

/// True when both values point the same way; a flat skew counts as either side
fn same_side(size: Decimal, skew: Decimal) -> bool {
    skew.is_zero() || size.is_sign_positive() == skew.is_sign_positive()
}

/// Static rate for a trade of `size_delta` against a market skew
///
/// Trades that grow the skew pay the taker rate, trades that reduce it pay
/// the maker rate.
pub fn skew_fee_rate(fee_rates: &FeeRates, market_skew: Decimal, size_delta: Decimal) -> Decimal {
    if same_side(size_delta, market_skew) {
        fee_rates.taker_fee
    } else {
        fee_rates.maker_fee
    }
}

/// Static fee rate of `market` for a trade of `size_delta`
pub fn static_fee_rate(market: &Market, size_delta: Decimal) -> Decimal {
    skew_fee_rate(&market.fee_rates, market.market_skew, size_delta)
}

/// Commit deposit held by a delayed order until it executes
///
/// Returns zero when the market has no price.
pub fn delayed_order_commit_deposit(market: &Market, size_delta: Decimal) -> Decimal {
    if market.price.is_zero() {
        return Decimal::ZERO;
    }
    let notional = size_delta * market.price;
    let skew_usd = market.market_skew * market.price;
    let rate = if same_side(notional, skew_usd) {
        market.fee_rates.taker_fee_delayed_order
    } else {
        market.fee_rates.maker_fee_delayed_order
    };
    (notional * rate).abs()
}

/// Everything a delayed order reserves: commit deposit plus keeper deposit
pub fn delayed_order_total_deposit(market: &Market, size_delta: Decimal) -> Decimal {
    delayed_order_commit_deposit(market, size_delta) + market.keeper_deposit
}

/// Fee calculation utilities
pub struct FeeCalculator;

impl FeeCalculator {
    /// Fee breakdown for a trade
    ///
    /// # Arguments
    /// * `schedule` - Rates of the market being traded
    /// * `account_type` - Cross-margin trades pay the account contract fee
    /// * `order_type` - Limit/stop orders pay the keeper fee and deposit
    /// * `susd_size_delta` - Trade size in sUSD (signed)
    /// * `native_size_delta` - Trade size in base units (signed), picks the static rate
    /// * `keeper_eth_balance` - ETH the account already holds for keepers
    pub fn calculate(
        schedule: &FeeSchedule,
        account_type: AccountType,
        order_type: OrderType,
        susd_size_delta: Decimal,
        native_size_delta: Decimal,
        keeper_eth_balance: Decimal,
    ) -> TradeFees {
        let susd_size = susd_size_delta.abs();
        let static_rate = schedule.static_rate(native_size_delta);

        let static_fee = susd_size * static_rate;
        let dynamic_fee = susd_size * schedule.dynamic_fee_rate;
        let cross_margin_fee = match account_type {
            AccountType::CrossMargin => susd_size * schedule.cross_margin.trade_fee,
            AccountType::IsolatedMargin => Decimal::ZERO,
        };
        let limit_stop_order_fee = susd_size * schedule.advanced_order_rate(order_type);
        let keeper_eth_deposit = if order_type.is_advanced() {
            Self::keeper_eth_deposit(schedule.keeper_eth_deposit, keeper_eth_balance)
        } else {
            Decimal::ZERO
        };

        TradeFees {
            static_fee,
            dynamic_fee,
            cross_margin_fee,
            limit_stop_order_fee,
            keeper_eth_deposit,
            dynamic_fee_rate: schedule.dynamic_fee_rate,
            total: static_fee + dynamic_fee + cross_margin_fee + limit_stop_order_fee,
        }
    }

    /// ETH still missing from the keeper balance
    pub fn keeper_eth_deposit(required: Decimal, current_balance: Decimal) -> Decimal {
        if current_balance < required {
            required - current_balance
        } else {
            Decimal::ZERO
        }
    }

    /// Sum of every rate that applies to a cross-margin trade of `size_delta`
    pub fn total_fee_rate(schedule: &FeeSchedule, order_type: OrderType, size_delta: Decimal) -> Decimal {
        schedule.cross_margin.trade_fee
            + schedule.dynamic_fee_rate
            + schedule.static_rate(size_delta)
            + schedule.advanced_order_rate(order_type)
    }
}
