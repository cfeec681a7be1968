//! Market, position and order types shared by the calculation and preview layers

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Direction of a position or order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// +1 for long, -1 for short
    pub fn sign(&self) -> Decimal {
        match self {
            PositionSide::Long => Decimal::ONE,
            PositionSide::Short => Decimal::NEGATIVE_ONE,
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            PositionSide::Long => PositionSide::Short,
            PositionSide::Short => PositionSide::Long,
        }
    }

    /// Apply this side's sign to an unsigned amount
    pub fn signed(&self, amount: Decimal) -> Decimal {
        amount.abs() * self.sign()
    }
}

impl std::fmt::Display for PositionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionSide::Long => write!(f, "long"),
            PositionSide::Short => write!(f, "short"),
        }
    }
}

impl std::str::FromStr for PositionSide {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "long" => Ok(PositionSide::Long),
            "short" => Ok(PositionSide::Short),
            other => Err(format!("unknown position side: {}", other)),
        }
    }
}

/// Margin account model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    /// Margin dedicated to a single position
    IsolatedMargin,
    /// Margin pooled in a smart-margin account
    CrossMargin,
}

impl Default for AccountType {
    fn default() -> Self {
        AccountType::CrossMargin
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountType::IsolatedMargin => write!(f, "isolated_margin"),
            AccountType::CrossMargin => write!(f, "cross_margin"),
        }
    }
}

impl std::str::FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "isolated_margin" | "isolated" => Ok(AccountType::IsolatedMargin),
            "cross_margin" | "cross" => Ok(AccountType::CrossMargin),
            other => Err(format!("unknown account type: {}", other)),
        }
    }
}

/// Order execution type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Market,
    Limit,
    StopMarket,
    /// Next-price order settled by a keeper at a later oracle update
    Delayed,
}

impl Default for OrderType {
    fn default() -> Self {
        OrderType::Market
    }
}

impl OrderType {
    /// Limit and stop orders wait for an off-chain keeper and need an ETH deposit
    pub fn is_advanced(&self) -> bool {
        matches!(self, OrderType::Limit | OrderType::StopMarket)
    }

    /// Orders whose execution is deferred and reserve a commit deposit
    pub fn is_deferred(&self) -> bool {
        matches!(self, OrderType::Delayed)
    }

    pub fn is_allowed_for(&self, account_type: AccountType) -> bool {
        match account_type {
            AccountType::CrossMargin => {
                matches!(self, OrderType::Market | OrderType::Limit | OrderType::StopMarket)
            }
            AccountType::IsolatedMargin => matches!(self, OrderType::Market | OrderType::Delayed),
        }
    }

    /// Keep this order type if the account supports it, otherwise fall back
    /// to the account's default type.
    pub fn normalize_for(self, account_type: AccountType) -> Self {
        if self.is_allowed_for(account_type) {
            return self;
        }
        match account_type {
            AccountType::CrossMargin => OrderType::Market,
            AccountType::IsolatedMargin => OrderType::Delayed,
        }
    }
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderType::Market => write!(f, "market"),
            OrderType::Limit => write!(f, "limit"),
            OrderType::StopMarket => write!(f, "stop market"),
            OrderType::Delayed => write!(f, "delayed"),
        }
    }
}

impl std::str::FromStr for OrderType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', ' '], "_").as_str() {
            "market" => Ok(OrderType::Market),
            "limit" => Ok(OrderType::Limit),
            "stop_market" | "stop" => Ok(OrderType::StopMarket),
            "delayed" | "next_price" => Ok(OrderType::Delayed),
            other => Err(format!("unknown order type: {}", other)),
        }
    }
}

/// Unit the user typed the order size in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurrencyType {
    /// Quote currency (sUSD)
    Usd,
    /// Base asset units
    Native,
}

impl std::str::FromStr for CurrencyType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "usd" | "susd" => Ok(CurrencyType::Usd),
            "native" => Ok(CurrencyType::Native),
            other => Err(format!("unknown currency type: {}", other)),
        }
    }
}

/// Static fee rates of a market
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeeRates {
    /// Rate for trades that reduce the market skew
    pub maker_fee: Decimal,
    /// Rate for trades that grow the market skew
    pub taker_fee: Decimal,
    #[serde(default)]
    pub maker_fee_delayed_order: Decimal,
    #[serde(default)]
    pub taker_fee_delayed_order: Decimal,
}

/// Market parameters as reported by the oracle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    /// Market key, e.g. `sETHPERP`
    pub key: String,
    /// Base asset, e.g. `sETH`
    pub asset: String,
    /// Current oracle price
    pub price: Decimal,
    pub max_leverage: Decimal,
    /// Margin reserved per open position regardless of size
    pub min_initial_margin: Decimal,
    /// Net open interest (long minus short) in base units
    #[serde(default)]
    pub market_skew: Decimal,
    pub fee_rates: FeeRates,
    /// Keeper deposit charged on delayed orders
    #[serde(default)]
    pub keeper_deposit: Decimal,
    #[serde(default)]
    pub is_suspended: bool,
}

/// Open position details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPosition {
    pub side: PositionSide,
    /// Absolute size in base units
    pub size: Decimal,
    /// Absolute notional value at the last price
    pub notional_value: Decimal,
}

impl OpenPosition {
    pub fn signed_size(&self) -> Decimal {
        self.side.signed(self.size)
    }
}

/// Margin held for a market, with the open position if there is one
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub remaining_margin: Decimal,
    pub accessible_margin: Decimal,
    #[serde(default)]
    pub position: Option<OpenPosition>,
}

impl Position {
    pub fn side(&self) -> Option<PositionSide> {
        self.position.as_ref().map(|p| p.side)
    }

    /// Current leverage, zero without margin or position
    pub fn leverage(&self) -> Decimal {
        match &self.position {
            Some(open) if !self.remaining_margin.is_zero() => {
                (open.notional_value / self.remaining_margin).abs()
            }
            _ => Decimal::ZERO,
        }
    }
}

/// Fee rates charged by the cross-margin account contract
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrossMarginSettings {
    pub trade_fee: Decimal,
    pub limit_order_fee: Decimal,
    pub stop_order_fee: Decimal,
}
