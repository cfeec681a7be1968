//! Scripted trade sessions replayed against the in-memory oracle

use std::path::Path;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::memory::InMemoryOracle;
use crate::common::errors::{PreviewError, Result};
use crate::common::traits::PricingOracle;
use crate::common::types::{
    AccountType, CrossMarginSettings, CurrencyType, Market, OrderType, Position, PositionSide,
};
use crate::preview::{PreviewEngine, SessionState, TradeAmountOptions};

fn default_side() -> PositionSide {
    PositionSide::Long
}

fn default_currency() -> CurrencyType {
    CurrencyType::Usd
}

/// Market, account and a list of form edits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub market: Market,
    #[serde(default)]
    pub wallet: Option<String>,
    #[serde(default)]
    pub account_type: AccountType,
    #[serde(default)]
    pub order_type: OrderType,
    #[serde(default = "default_side")]
    pub side: PositionSide,
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub free_margin: Decimal,
    #[serde(default)]
    pub cross_margin_settings: CrossMarginSettings,
    #[serde(default)]
    pub dynamic_fee_rate: Decimal,
    #[serde(default)]
    pub keeper_eth_balance: Decimal,
    /// Order price for limit/stop orders
    #[serde(default)]
    pub order_price: Option<Decimal>,
    /// Preferred leverage for the market's asset
    #[serde(default)]
    pub leverage: Option<Decimal>,
    #[serde(default)]
    pub edits: Vec<ScenarioEdit>,
}

/// One form edit; without a `value` it is a leverage-only edit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioEdit {
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default = "default_currency")]
    pub currency: CurrencyType,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub leverage: Option<Decimal>,
    /// Pause before this edit
    #[serde(default)]
    pub wait_ms: u64,
}

impl Scenario {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            PreviewError::Configuration(format!("cannot read scenario {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    /// Oracle holding the scenario's market and account
    pub async fn oracle(&self) -> InMemoryOracle {
        let oracle = InMemoryOracle::new();
        oracle.set_market(self.market.clone()).await;
        oracle
            .set_dynamic_fee_rate(&self.market.key, self.dynamic_fee_rate)
            .await;
        oracle
            .set_cross_margin_settings(self.cross_margin_settings.clone())
            .await;

        if let Some(wallet) = &self.wallet {
            if let Some(position) = &self.position {
                oracle
                    .set_position(&self.market.key, wallet, self.account_type, position.clone())
                    .await;
            }
            oracle.set_free_margin(wallet, self.free_margin).await;
            oracle.set_keeper_eth_balance(wallet, self.keeper_eth_balance).await;
        }
        oracle
    }

    /// Select the scenario's market and account on `engine`, replay every
    /// edit and return the settled state
    pub async fn run<O: PricingOracle + 'static>(
        &self,
        engine: &mut PreviewEngine<O>,
    ) -> Result<SessionState> {
        engine.switch_account_type(self.account_type).await;
        engine.switch_market(&self.market.key).await;
        engine.switch_wallet(self.wallet.clone()).await;
        engine.sync().await?;

        engine.set_order_price(self.order_price).await;
        if let Some(leverage) = self.leverage {
            engine.set_preferred_leverage(leverage).await?;
        }
        engine.set_order_type(self.order_type).await;
        engine.set_leverage_side(self.side).await;

        info!(
            market = %self.market.key,
            edits = self.edits.len(),
            "Replaying scenario"
        );
        for edit in &self.edits {
            if edit.wait_ms > 0 {
                tokio::time::sleep(Duration::from_millis(edit.wait_ms)).await;
            }
            match (&edit.value, edit.leverage) {
                (Some(value), cross_margin_leverage) => {
                    debug!("Edit: {} {:?}", value, edit.currency);
                    let options = TradeAmountOptions {
                        price: edit.price,
                        cross_margin_leverage,
                        ..Default::default()
                    };
                    engine
                        .on_trade_amount_change(value, edit.currency, options)
                        .await;
                }
                (None, Some(leverage)) => {
                    debug!("Leverage edit: {}", leverage);
                    engine.on_change_open_pos_leverage(leverage).await;
                }
                (None, None) => debug!("Skipping empty edit"),
            }
        }

        Ok(engine.settle().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::EngineSettings;
    use crate::preview::PreviewPhase;
    use rust_decimal_macros::dec;

    const SCENARIO: &str = r#"{
        "market": {
            "key": "sETHPERP",
            "asset": "sETH",
            "price": "2000",
            "max_leverage": "10",
            "min_initial_margin": "40",
            "fee_rates": {"maker_fee": "0.0005", "taker_fee": "0.0005"}
        },
        "wallet": "0xabc",
        "account_type": "isolated_margin",
        "position": {"remaining_margin": "1000", "accessible_margin": "1000"},
        "edits": [
            {"value": "1000", "wait_ms": 0},
            {"value": "5000", "wait_ms": 100}
        ]
    }"#;

    #[test]
    fn test_parse_defaults() {
        let scenario = Scenario::from_json(SCENARIO).expect("parses");
        assert_eq!(scenario.side, PositionSide::Long);
        assert_eq!(scenario.order_type, OrderType::Market);
        assert_eq!(scenario.edits[1].currency, CurrencyType::Usd);
        assert!(scenario.position.as_ref().and_then(|p| p.position.as_ref()).is_none());
    }

    #[test]
    fn test_bad_json_is_a_parse_error() {
        assert!(matches!(
            Scenario::from_json("{\"market\": 1}"),
            Err(PreviewError::JsonParse(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_isolated_scenario_runs_to_resolution() {
        let scenario = Scenario::from_json(SCENARIO).expect("parses");
        let mut engine = PreviewEngine::new(scenario.oracle().await, EngineSettings::default());

        let state = scenario.run(&mut engine).await.expect("runs");
        assert_eq!(state.phase, PreviewPhase::Resolved);

        let inputs = state.inputs.expect("inputs");
        assert_eq!(inputs.leverage, dec!(5));
        assert_eq!(inputs.native_size_delta, dec!(2.5));
        assert_eq!(engine.oracle().preview_call_count().await, 1);
    }
}
