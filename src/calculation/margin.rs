//! Margin, leverage headroom and buying-power calculations
//!
//! Every function here is pure. Divisions are guarded by explicit zero checks,
//! a zero divisor yields zero rather than an error.

use rust_decimal::Decimal;

use crate::calculation::fees::{delayed_order_total_deposit, FeeCalculator};
use crate::calculation::types::{
    AccountState, FeeSchedule, MarginSummary, OrderInput, PotentialTrade, TradeFees,
};
use crate::common::types::{AccountType, Market, OrderType, Position, PositionSide};

/// Margin to add (positive) or withdraw (negative) so the position resulting
/// from `input` sits at `input.leverage`, with fees funded on top.
///
/// A withdrawal never exceeds the margin currently held by the position.
pub fn margin_delta(input: &OrderInput, fees: &TradeFees, account: &AccountState) -> Decimal {
    if input.leverage.is_zero() {
        return Decimal::ZERO;
    }
    let current_margin = account.position_margin;
    let target_size = account.signed_position_size() + input.native_size_delta;
    let target_notional = target_size.abs() * input.order_price;
    let target_margin = target_notional / input.leverage;

    (target_margin - current_margin + fees.total).max(-current_margin)
}

/// Notional reachable at `selected_leverage`
///
/// Trading on the position's side only the free margin is usable; any other
/// side (including no position) also frees the position's margin and notional.
fn notional_headroom(
    account: &AccountState,
    order_side: PositionSide,
    selected_leverage: Decimal,
    position_notional: Decimal,
) -> Decimal {
    let same_side = account.position_side() == Some(order_side);
    let total_margin = if same_side {
        account.free_margin
    } else {
        account.free_margin + account.position_margin
    };

    let max_usd = total_margin * selected_leverage;
    if same_side {
        max_usd
    } else {
        max_usd + position_notional
    }
}

/// Worst-case fee for a trade using all of the headroom
///
/// Returns `None` while there is no margin or no price to size against.
pub fn max_fee(
    account: &AccountState,
    schedule: &FeeSchedule,
    order_type: OrderType,
    order_side: PositionSide,
    trade_price: Decimal,
    selected_leverage: Decimal,
) -> Option<Decimal> {
    if account.remaining_margin().is_zero() || trade_price.is_zero() {
        return None;
    }
    let max_usd = notional_headroom(account, order_side, selected_leverage, account.position_notional());
    let rate = FeeCalculator::total_fee_rate(schedule, order_type, max_usd);
    Some(max_usd * rate)
}

/// Inputs of [`max_usd_input_amount`]
#[derive(Debug, Clone)]
pub struct MaxInputParams<'a> {
    pub account: &'a AccountState,
    pub order_side: PositionSide,
    pub trade_price: Decimal,
    pub selected_leverage: Decimal,
    pub max_fee: Decimal,
    /// Fraction of the headroom kept back
    pub buffer_ratio: Decimal,
}

/// Largest sUSD size the order form accepts
pub fn max_usd_input_amount(params: &MaxInputParams<'_>) -> Decimal {
    let account = params.account;
    if account.account_type == AccountType::IsolatedMargin {
        return (account.max_leverage * account.remaining_margin()).max(Decimal::ZERO);
    }
    if account.above_max_leverage() && account.position_side() == Some(params.order_side) {
        return Decimal::ZERO;
    }

    let position_notional = account
        .position
        .as_ref()
        .map(|p| p.size * params.trade_price)
        .unwrap_or_default();
    let mut max_usd = notional_headroom(
        account,
        params.order_side,
        params.selected_leverage,
        position_notional,
    );
    max_usd -= params.max_fee * params.selected_leverage;
    let buffer = max_usd * params.buffer_ratio;

    (max_usd.abs() - buffer).max(Decimal::ZERO)
}

/// Margin locked by a position of `notional`, at least the market's minimum
/// initial margin once anything is locked
pub fn inaccessible_margin(
    notional: Decimal,
    market_max_leverage: Decimal,
    min_initial_margin: Decimal,
) -> Decimal {
    if market_max_leverage.is_zero() {
        return Decimal::ZERO;
    }
    let inaccessible = (notional / market_max_leverage).abs();
    if inaccessible > Decimal::ZERO && inaccessible < min_initial_margin {
        min_initial_margin
    } else {
        inaccessible
    }
}

/// Margin left to trade with after `trade` executes
pub fn potential_available_margin(
    trade: &PotentialTrade,
    market_max_leverage: Decimal,
    min_initial_margin: Decimal,
) -> Decimal {
    let inaccessible =
        inaccessible_margin(trade.notional_value, market_max_leverage, min_initial_margin);
    (trade.margin - inaccessible).max(Decimal::ZERO)
}

pub fn buying_power(available_margin: Decimal, max_leverage: Decimal) -> Decimal {
    (available_margin * max_leverage).abs()
}

/// Share of `margin` that is locked, in [0, 1]
pub fn margin_usage(margin: Decimal, available_margin: Decimal) -> Decimal {
    if margin <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    ((margin - available_margin) / margin)
        .abs()
        .min(Decimal::ONE)
}

/// Available margin, buying power and usage after `trade`
///
/// Deferred orders also hold back their commit and keeper deposits.
pub fn preview_summary(
    trade: &PotentialTrade,
    market: &Market,
    order_type: OrderType,
    size_delta: Decimal,
    max_leverage: Decimal,
) -> MarginSummary {
    let mut available =
        potential_available_margin(trade, market.max_leverage, market.min_initial_margin);
    if order_type.is_deferred() {
        available = (available - delayed_order_total_deposit(market, size_delta)).max(Decimal::ZERO);
    }

    MarginSummary {
        total_margin: trade.margin,
        available_margin: available,
        buying_power: buying_power(available, max_leverage),
        margin_usage: margin_usage(trade.margin, available),
    }
}

/// Figures for the current position, before any trade
pub fn account_summary(position: Option<&Position>, max_leverage: Decimal) -> MarginSummary {
    let total_margin = position.map(|p| p.remaining_margin).unwrap_or_default();
    let available_margin = position.map(|p| p.accessible_margin).unwrap_or_default();

    let buying_power = if total_margin > Decimal::ZERO {
        total_margin * max_leverage
    } else {
        Decimal::ZERO
    };
    let margin_usage = if available_margin > Decimal::ZERO {
        margin_usage(total_margin, available_margin)
    } else {
        Decimal::ZERO
    };

    MarginSummary {
        total_margin,
        available_margin,
        buying_power,
        margin_usage,
    }
}

/// Local stand-in for the oracle's answer, used for the optimistic preview
pub fn estimate_potential_trade(
    input: &OrderInput,
    account: &AccountState,
    fees: &TradeFees,
    margin_delta: Decimal,
) -> PotentialTrade {
    let target_size = account.signed_position_size() + input.native_size_delta;
    let notional_value = target_size.abs() * input.order_price;
    let margin = (account.position_margin + margin_delta - fees.total).max(Decimal::ZERO);
    let leverage = if margin.is_zero() {
        Decimal::ZERO
    } else {
        notional_value / margin
    };

    PotentialTrade {
        margin,
        notional_value,
        fee: fees.total,
        liquidation_price: None,
        leverage,
        error: None,
    }
}
