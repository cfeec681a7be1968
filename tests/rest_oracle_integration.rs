//! Integration tests for the oracle gateway client
//!
//! Each test starts a local mock gateway, so nothing leaves the machine.

mod common;

use std::time::Duration;

use common::api_responses;
use futures_trade_preview::calculation::PreviewRequest;
use futures_trade_preview::config::types::EngineSettings;
use futures_trade_preview::preview::FailureKind;
use futures_trade_preview::{
    AccountType, CurrencyType, KnownRejection, OrderType, PositionSide, PreviewEngine,
    PreviewError, PreviewPhase, PricingOracle, RestOracle, TradeAmountOptions,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn json_response(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "application/json")
}

fn create_test_oracle(server: &MockServer) -> RestOracle {
    RestOracle::with_timeout(&server.uri(), Duration::from_secs(5))
        .expect("Failed to create REST oracle")
}

fn preview_request() -> PreviewRequest {
    PreviewRequest {
        market_key: "sETHPERP".to_string(),
        account: Some("0xabc".to_string()),
        account_type: AccountType::CrossMargin,
        order_type: OrderType::Market,
        size_delta: dec!(1),
        margin_delta: dec!(2002.8),
        price: dec!(2000),
    }
}

async fn mount_market_data(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/markets/sETHPERP"))
        .respond_with(json_response(api_responses::MARKET))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/markets/sETHPERP/dynamic-fee"))
        .respond_with(json_response(api_responses::DYNAMIC_FEE))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cross-margin/settings"))
        .respond_with(json_response(api_responses::CROSS_MARGIN_SETTINGS))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/accounts/0xabc/free-margin"))
        .respond_with(json_response(api_responses::FREE_MARGIN))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/accounts/0xabc/keeper-balance"))
        .respond_with(json_response(api_responses::KEEPER_BALANCE))
        .mount(server)
        .await;
}

// ============================================================================
// Read Endpoint Tests
// ============================================================================

#[tokio::test]
async fn test_get_market() {
    let server = MockServer::start().await;
    mount_market_data(&server).await;
    let oracle = create_test_oracle(&server);

    let market = assert_ok!(oracle.market("sETHPERP").await);
    assert_eq!(market.asset, "sETH");
    assert_eq!(market.price, dec!(2000));
    assert_eq!(market.market_skew, dec!(150.5));
    assert_eq!(market.fee_rates.maker_fee, dec!(0.0002));
    assert_eq!(market.fee_rates.taker_fee_delayed_order, dec!(0.0003));

    // Long trades grow a positive skew and pay the taker rate
    assert_eq!(oracle.static_fee_rate(&market, dec!(1)), dec!(0.0005));
    assert_eq!(oracle.static_fee_rate(&market, dec!(-1)), dec!(0.0002));
}

#[tokio::test]
async fn test_unknown_market() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/markets/sDOGEPERP"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let oracle = create_test_oracle(&server);

    let err = assert_err!(oracle.market("sDOGEPERP").await);
    assert!(
        matches!(err, PreviewError::MarketNotFound(ref key) if key == "sDOGEPERP"),
        "Unexpected error: {:?}",
        err
    );
}

#[tokio::test]
async fn test_get_position() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts/0xabc/positions/sETHPERP"))
        .and(query_param("accountType", "cross_margin"))
        .respond_with(json_response(api_responses::POSITION))
        .mount(&server)
        .await;
    let oracle = create_test_oracle(&server);

    let position = oracle
        .position("sETHPERP", "0xabc", AccountType::CrossMargin)
        .await
        .expect("Failed to get position")
        .expect("Expected a position");
    assert_eq!(position.remaining_margin, dec!(1000));
    let open = position.position.expect("Expected an open position");
    assert_eq!(open.side, PositionSide::Short);
    assert_eq!(open.size, dec!(1.5));
    assert_eq!(open.signed_size(), dec!(-1.5));
    assert_eq!(open.notional_value, dec!(3000));
}

#[tokio::test]
async fn test_missing_position_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts/0xabc/positions/sETHPERP"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let oracle = create_test_oracle(&server);

    let position = oracle
        .position("sETHPERP", "0xabc", AccountType::IsolatedMargin)
        .await
        .expect("A missing position is not an error");
    assert!(position.is_none());
}

#[tokio::test]
async fn test_fee_and_balance_reads() {
    let server = MockServer::start().await;
    mount_market_data(&server).await;
    let oracle = create_test_oracle(&server);

    assert_eq!(assert_ok!(oracle.dynamic_fee_rate("sETHPERP").await), dec!(0.0001));

    let settings = assert_ok!(oracle.cross_margin_settings().await);
    assert_eq!(settings.trade_fee, dec!(0.0008));
    assert_eq!(settings.stop_order_fee, dec!(0.0004));

    assert_eq!(oracle.free_margin("0xabc").await.expect("free margin"), dec!(5000));
    assert_eq!(oracle.keeper_eth_balance("0xabc").await.expect("keeper balance"), dec!(0.002));
}

// ============================================================================
// Preview Endpoint Tests
// ============================================================================

#[tokio::test]
async fn test_preview_trade() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/markets/sETHPERP/preview"))
        .and(body_partial_json(json!({
            "marketKey": "sETHPERP",
            "accountType": "cross_margin",
            "sizeDelta": "1",
            "marginDelta": "2002.8"
        })))
        .respond_with(json_response(api_responses::PREVIEW))
        .expect(1)
        .mount(&server)
        .await;
    let oracle = create_test_oracle(&server);

    let trade = oracle
        .preview_trade(&preview_request())
        .await
        .expect("Failed to preview trade");
    assert_eq!(trade.margin, dec!(1998.8));
    assert_eq!(trade.fee, dec!(1.2));
    assert_eq!(trade.liquidation_price, Some(dec!(1010.5)));
    assert!(trade.error.is_none());
}

#[tokio::test]
async fn test_preview_rejected_with_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/markets/sETHPERP/preview"))
        .respond_with(
            ResponseTemplate::new(422).set_body_raw(api_responses::REJECTION, "application/json"),
        )
        .mount(&server)
        .await;
    let oracle = create_test_oracle(&server);

    let err = oracle
        .preview_trade(&preview_request())
        .await
        .expect_err("Expected a rejection");
    assert_eq!(err.known_rejection(), Some(KnownRejection::InsufficientMargin));
}

#[tokio::test]
async fn test_preview_rejected_in_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/markets/sETHPERP/preview"))
        .respond_with(json_response(api_responses::PREVIEW_WITH_ERROR))
        .mount(&server)
        .await;
    let oracle = create_test_oracle(&server);

    let err = oracle
        .preview_trade(&preview_request())
        .await
        .expect_err("Expected a rejection");
    assert!(matches!(err, PreviewError::Rejected(ref m) if m == "Max leverage exceeded"));
    assert_eq!(err.known_rejection(), Some(KnownRejection::MaxLeverageExceeded));
}

#[tokio::test]
async fn test_preview_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/markets/sETHPERP/preview"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream node down"))
        .mount(&server)
        .await;
    let oracle = create_test_oracle(&server);

    let err = oracle
        .preview_trade(&preview_request())
        .await
        .expect_err("Expected a failure");
    assert!(matches!(err, PreviewError::InvalidResponse(_)));
    assert!(err.known_rejection().is_none());
}

// ============================================================================
// Engine over HTTP Tests
// ============================================================================

fn fast_settings() -> EngineSettings {
    EngineSettings {
        debounce_ms: 20,
        preview_timeout_ms: 2000,
        ..EngineSettings::default()
    }
}

async fn synced_engine(server: &MockServer) -> PreviewEngine<RestOracle> {
    let mut engine = PreviewEngine::new(create_test_oracle(server), fast_settings());
    engine.switch_market("sETHPERP").await;
    engine.switch_wallet(Some("0xabc".to_string())).await;
    engine.sync().await.expect("Failed to sync");
    engine
}

#[tokio::test]
async fn test_engine_resolves_over_http() {
    let server = MockServer::start().await;
    mount_market_data(&server).await;
    Mock::given(method("GET"))
        .and(path("/accounts/0xabc/positions/sETHPERP"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/markets/sETHPERP/preview"))
        .respond_with(json_response(api_responses::PREVIEW))
        .mount(&server)
        .await;

    let mut engine = synced_engine(&server).await;
    let context = engine.context().await;
    assert_eq!(context.free_margin, dec!(5000));
    assert!(context.position.is_none());

    engine
        .on_trade_amount_change("2000", CurrencyType::Usd, TradeAmountOptions::default())
        .await;
    let state = engine.settle().await;

    assert_eq!(state.phase, PreviewPhase::Resolved);
    let preview = state.preview.expect("Expected a resolved preview");
    assert_eq!(preview.margin, dec!(1998.8));
    assert_eq!(preview.liquidation_price, Some(dec!(1010.5)));
    assert!(preview.summary.margin_usage >= Decimal::ZERO);
    assert!(preview.summary.margin_usage <= Decimal::ONE);
}

#[tokio::test]
async fn test_engine_maps_server_error_to_generic() {
    let server = MockServer::start().await;
    mount_market_data(&server).await;
    Mock::given(method("GET"))
        .and(path("/accounts/0xabc/positions/sETHPERP"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/markets/sETHPERP/preview"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut engine = synced_engine(&server).await;
    engine
        .on_trade_amount_change("2000", CurrencyType::Usd, TradeAmountOptions::default())
        .await;
    let state = engine.settle().await;

    assert_eq!(state.phase, PreviewPhase::Failed);
    let failure = state.error.expect("Expected a failure");
    assert_eq!(failure.kind, FailureKind::Generic);
    assert_eq!(failure.message, "Failed to fetch trade preview");
}
