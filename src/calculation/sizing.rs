use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

use crate::calculation::types::OrderInput;
use crate::common::types::{AccountType, CurrencyType, PositionSide};

/// Max leverage assumed by the leverage selector before market data arrives
pub const DEFAULT_SELECTOR_MAX_LEVERAGE: Decimal = dec!(10);

/// Decimal places kept when displaying a derived leverage
const LEVERAGE_DECIMALS: u32 = 2;

/// Largest size, in either currency, accepted from the order form
const MAX_TRADE_AMOUNT: Decimal = dec!(1000000000000000000);

/// Leverage to trade at: the user's preference for the market, or the
/// default, never above the market maximum
pub fn selected_leverage(
    preferred: Option<Decimal>,
    default_leverage: Decimal,
    max_leverage: Decimal,
) -> Decimal {
    preferred.unwrap_or(default_leverage).min(max_leverage)
}

/// A size edit coming from the order form
#[derive(Debug, Clone)]
pub struct TradeAmountChange<'a> {
    /// Raw text of the edited field
    pub value: &'a str,
    pub price: Decimal,
    pub currency: CurrencyType,
    pub side: PositionSide,
    pub account_type: AccountType,
    /// Margin backing the trade (see `AccountState::remaining_margin`)
    pub remaining_margin: Decimal,
    pub max_leverage: Decimal,
    pub selected_leverage: Decimal,
    /// Explicit cross-margin leverage, overrides `selected_leverage`
    pub cross_margin_leverage: Option<Decimal>,
}

/// Convert a size edit into a staged order
///
/// Returns `None` for an empty, unparsable or zero value, for a zero price
/// and for sizes no market could fill; callers treat that as "clear the
/// form", not as an error.
pub fn stage_trade_amount(change: &TradeAmountChange<'_>) -> Option<OrderInput> {
    let value = Decimal::from_str(change.value.trim()).ok()?;
    if value.is_zero() || change.price.is_zero() {
        return None;
    }

    let (native_size, usd_size) = match change.currency {
        CurrencyType::Native => (value, change.price.checked_mul(value)?),
        CurrencyType::Usd => (value.checked_div(change.price)?, value),
    };
    if native_size.abs() > MAX_TRADE_AMOUNT || usd_size.abs() > MAX_TRADE_AMOUNT {
        return None;
    }

    let has_margin = change.remaining_margin > Decimal::ZERO;
    let leverage = if !has_margin {
        Decimal::ZERO
    } else {
        match change.account_type {
            AccountType::CrossMargin => change
                .cross_margin_leverage
                .unwrap_or(change.selected_leverage),
            AccountType::IsolatedMargin => usd_size.checked_div(change.remaining_margin)?.abs(),
        }
    };
    let leverage = floor_leverage(leverage.min(change.max_leverage));

    Some(OrderInput {
        side: change.side,
        native_size_delta: change.side.signed(native_size),
        susd_size_delta: change.side.signed(usd_size),
        order_price: change.price,
        leverage,
        edited: change.currency,
    })
}

fn floor_leverage(leverage: Decimal) -> Decimal {
    leverage.round_dp_with_strategy(LEVERAGE_DECIMALS, RoundingStrategy::ToNegativeInfinity)
}

/// Leverage picker of the edit-leverage dialog
///
/// Holds a draft value stepped in whole units within `[1, max]`; the draft
/// only replaces the committed leverage on [`LeverageSelector::confirm`].
#[derive(Debug, Clone, PartialEq)]
pub struct LeverageSelector {
    committed: Decimal,
    draft: Decimal,
    max_leverage: Decimal,
}

impl LeverageSelector {
    pub fn new(committed: Decimal, market_max_leverage: Option<Decimal>) -> Self {
        let max_leverage = market_max_leverage
            .unwrap_or(DEFAULT_SELECTOR_MAX_LEVERAGE)
            .round_dp_with_strategy(2, RoundingStrategy::ToZero);
        Self {
            committed,
            draft: committed,
            max_leverage,
        }
    }

    pub fn draft(&self) -> Decimal {
        self.draft
    }

    pub fn committed(&self) -> Decimal {
        self.committed
    }

    pub fn max_leverage(&self) -> Decimal {
        self.max_leverage
    }

    pub fn increase(&mut self) {
        self.draft = (self.draft + Decimal::ONE).min(self.max_leverage);
    }

    pub fn decrease(&mut self) {
        self.draft = (self.draft - Decimal::ONE).max(Decimal::ONE);
    }

    /// Slider or text input; out-of-range values are clamped
    pub fn set(&mut self, leverage: Decimal) {
        self.draft = leverage.max(Decimal::ONE).min(self.max_leverage);
    }

    /// Largest position the committed leverage allows on `total_margin`
    pub fn max_position_usd(&self, total_margin: Decimal) -> Decimal {
        total_margin * self.committed
    }

    pub fn confirm(&mut self) -> Decimal {
        self.committed = self.draft;
        self.committed
    }
}
