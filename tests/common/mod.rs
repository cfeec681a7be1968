//! Common test utilities and fixtures

#![allow(dead_code)]

use futures_trade_preview::common::types::{
    AccountType, CrossMarginSettings, FeeRates, Market, OpenPosition, Position, PositionSide,
};
use futures_trade_preview::config::types::EngineSettings;
use futures_trade_preview::{InMemoryOracle, PreviewEngine};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub const MARKET_KEY: &str = "sETHPERP";
pub const WALLET: &str = "0xabc";

/// ETH market at 2000 with a flat skew
pub fn eth_market() -> Market {
    Market {
        key: MARKET_KEY.to_string(),
        asset: "sETH".to_string(),
        price: dec!(2000),
        max_leverage: dec!(25),
        min_initial_margin: dec!(40),
        market_skew: Decimal::ZERO,
        fee_rates: FeeRates {
            maker_fee: dec!(0.0005),
            taker_fee: dec!(0.0005),
            maker_fee_delayed_order: dec!(0.0002),
            taker_fee_delayed_order: dec!(0.0002),
        },
        keeper_deposit: dec!(2),
        is_suspended: false,
    }
}

pub fn cross_margin_settings() -> CrossMarginSettings {
    CrossMarginSettings {
        trade_fee: dec!(0.0008),
        limit_order_fee: dec!(0.0003),
        stop_order_fee: dec!(0.0004),
    }
}

/// One ETH long backed by 1000 sUSD
pub fn long_position() -> Position {
    Position {
        remaining_margin: dec!(1000),
        accessible_margin: dec!(920),
        position: Some(OpenPosition {
            side: PositionSide::Long,
            size: dec!(1),
            notional_value: dec!(2000),
        }),
    }
}

/// Oracle with the ETH market and a cross-margin account holding 5000 free
pub async fn cross_oracle() -> InMemoryOracle {
    let oracle = InMemoryOracle::new();
    oracle.set_market(eth_market()).await;
    oracle.set_dynamic_fee_rate(MARKET_KEY, dec!(0.0001)).await;
    oracle.set_cross_margin_settings(cross_margin_settings()).await;
    oracle.set_free_margin(WALLET, dec!(5000)).await;
    oracle
}

/// Oracle with an isolated-margin account holding 1000 margin and no position
pub async fn isolated_oracle() -> InMemoryOracle {
    let oracle = InMemoryOracle::new();
    oracle.set_market(eth_market()).await;
    oracle
        .set_position(
            MARKET_KEY,
            WALLET,
            AccountType::IsolatedMargin,
            Position {
                remaining_margin: dec!(1000),
                accessible_margin: dec!(1000),
                position: None,
            },
        )
        .await;
    oracle
}

/// Engine over `oracle` with the ETH market and wallet selected and synced
pub async fn engine_for(
    oracle: InMemoryOracle,
    account_type: AccountType,
    settings: EngineSettings,
) -> PreviewEngine<InMemoryOracle> {
    let mut engine = PreviewEngine::new(oracle, settings);
    engine.switch_account_type(account_type).await;
    engine.switch_market(MARKET_KEY).await;
    engine.switch_wallet(Some(WALLET.to_string())).await;
    engine.sync().await.expect("Failed to sync trade context");
    engine
}

/// Sample oracle gateway responses
pub mod api_responses {
    pub const MARKET: &str = r#"{
        "key": "sETHPERP",
        "asset": "sETH",
        "price": "2000",
        "maxLeverage": "25",
        "minInitialMargin": "40",
        "marketSkew": "150.5",
        "feeRates": {
            "makerFee": "0.0002",
            "takerFee": "0.0005",
            "makerFeeDelayedOrder": "0.0001",
            "takerFeeDelayedOrder": "0.0003"
        },
        "keeperDeposit": "2"
    }"#;

    pub const POSITION: &str = r#"{
        "remainingMargin": "1000",
        "accessibleMargin": "920",
        "position": {"side": "short", "size": "-1.5", "notionalValue": "-3000"}
    }"#;

    pub const DYNAMIC_FEE: &str = r#"{"feeRate": "0.0001", "tooVolatile": false}"#;

    pub const CROSS_MARGIN_SETTINGS: &str =
        r#"{"tradeFee": "0.0008", "limitOrderFee": "0.0003", "stopOrderFee": "0.0004"}"#;

    pub const FREE_MARGIN: &str = r#"{"freeMargin": "5000"}"#;

    pub const KEEPER_BALANCE: &str = r#"{"balance": "0.002"}"#;

    pub const PREVIEW: &str = r#"{
        "margin": "1998.8",
        "notionalValue": "2000",
        "fee": "1.2",
        "liquidationPrice": "1010.5",
        "leverage": "1.0006"
    }"#;

    pub const PREVIEW_WITH_ERROR: &str = r#"{
        "margin": "0",
        "notionalValue": "0",
        "fee": "0",
        "error": "Max leverage exceeded"
    }"#;

    pub const REJECTION: &str = r#"{"error": "Insufficient margin"}"#;
}
