//! In-memory oracle with scriptable latency and rejections

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::debug;

use crate::calculation::{PotentialTrade, PreviewRequest};
use crate::common::errors::{KnownRejection, PreviewError, Result};
use crate::common::traits::PricingOracle;
use crate::common::types::{AccountType, CrossMarginSettings, Market, Position};

/// Preview requests kept by the call log; older ones are dropped
pub const CALL_LOG_CAPACITY: usize = 256;

/// A preview request as seen by the oracle
#[derive(Debug, Clone)]
pub struct RecordedPreview {
    pub request: PreviewRequest,
    /// When the request reached the oracle
    pub at: Instant,
}

#[derive(Debug, Default)]
struct CallLog {
    recent: VecDeque<RecordedPreview>,
    total: usize,
}

impl CallLog {
    fn record(&mut self, call: RecordedPreview) {
        if self.recent.len() == CALL_LOG_CAPACITY {
            self.recent.pop_front();
        }
        self.recent.push_back(call);
        self.total += 1;
    }
}

/// How a scripted preview call should end
#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    /// Answer after the given delay using the built-in simulation
    Respond(Duration),
    /// Reject with the given message after the delay
    Reject(Duration, String),
}

/// Oracle backed by plain maps
///
/// Preview answers are simulated from the stored market and position: the
/// new margin is the old margin plus the margin delta minus the fee, and
/// trades past the market's max leverage are rejected. Scripted outcomes are
/// consumed one per preview call, in order.
pub struct InMemoryOracle {
    markets: RwLock<HashMap<String, Market>>,
    positions: RwLock<HashMap<(String, String, AccountType), Position>>,
    dynamic_fee_rates: RwLock<HashMap<String, Decimal>>,
    cross_margin_settings: RwLock<CrossMarginSettings>,
    free_margin: RwLock<HashMap<String, Decimal>>,
    keeper_balances: RwLock<HashMap<String, Decimal>>,
    script: Mutex<VecDeque<ScriptedOutcome>>,
    calls: Mutex<CallLog>,
}

impl InMemoryOracle {
    pub fn new() -> Self {
        Self {
            markets: RwLock::new(HashMap::new()),
            positions: RwLock::new(HashMap::new()),
            dynamic_fee_rates: RwLock::new(HashMap::new()),
            cross_margin_settings: RwLock::new(CrossMarginSettings::default()),
            free_margin: RwLock::new(HashMap::new()),
            keeper_balances: RwLock::new(HashMap::new()),
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(CallLog::default()),
        }
    }

    pub async fn set_market(&self, market: Market) {
        self.markets.write().await.insert(market.key.clone(), market);
    }

    pub async fn set_position(
        &self,
        market_key: &str,
        account: &str,
        account_type: AccountType,
        position: Position,
    ) {
        self.positions
            .write()
            .await
            .insert((market_key.to_string(), account.to_string(), account_type), position);
    }

    pub async fn set_dynamic_fee_rate(&self, market_key: &str, rate: Decimal) {
        self.dynamic_fee_rates
            .write()
            .await
            .insert(market_key.to_string(), rate);
    }

    pub async fn set_cross_margin_settings(&self, settings: CrossMarginSettings) {
        *self.cross_margin_settings.write().await = settings;
    }

    pub async fn set_free_margin(&self, account: &str, amount: Decimal) {
        self.free_margin.write().await.insert(account.to_string(), amount);
    }

    pub async fn set_keeper_eth_balance(&self, account: &str, amount: Decimal) {
        self.keeper_balances
            .write()
            .await
            .insert(account.to_string(), amount);
    }

    /// Queue the outcome of the next unscripted preview call
    pub async fn push_outcome(&self, outcome: ScriptedOutcome) {
        self.script.lock().await.push_back(outcome);
    }

    /// The last [`CALL_LOG_CAPACITY`] preview requests, oldest first
    pub async fn preview_calls(&self) -> Vec<RecordedPreview> {
        self.calls.lock().await.recent.iter().cloned().collect()
    }

    /// Preview requests received since creation or the last [`Self::clear_calls`]
    pub async fn preview_call_count(&self) -> usize {
        self.calls.lock().await.total
    }

    pub async fn clear_calls(&self) {
        *self.calls.lock().await = CallLog::default();
    }

    async fn simulate(&self, request: &PreviewRequest) -> Result<PotentialTrade> {
        let market = self.market(&request.market_key).await?;
        let position = match &request.account {
            Some(account) => {
                self.position(&request.market_key, account, request.account_type)
                    .await?
            }
            None => None,
        };
        let dynamic_rate = self.dynamic_fee_rate(&request.market_key).await?;

        let current_size = position
            .as_ref()
            .and_then(|p| p.position.as_ref())
            .map(|p| p.signed_size())
            .unwrap_or_default();
        let current_margin = position.as_ref().map(|p| p.remaining_margin).unwrap_or_default();

        let new_size = current_size + request.size_delta;
        let notional_value = new_size.abs() * request.price;
        let fee_rate = self.static_fee_rate(&market, request.size_delta) + dynamic_rate;
        let fee = (request.size_delta * request.price).abs() * fee_rate;
        let margin = current_margin + request.margin_delta - fee;

        if margin < Decimal::ZERO || (margin.is_zero() && !notional_value.is_zero()) {
            return Err(PreviewError::Rejected(
                KnownRejection::InsufficientMargin.message().to_string(),
            ));
        }
        let leverage = if margin.is_zero() {
            Decimal::ZERO
        } else {
            notional_value / margin
        };
        if leverage > market.max_leverage {
            return Err(PreviewError::Rejected(
                KnownRejection::MaxLeverageExceeded.message().to_string(),
            ));
        }

        let liquidation_price = if new_size.is_zero() {
            None
        } else {
            Some((request.price - margin / new_size).max(Decimal::ZERO))
        };

        Ok(PotentialTrade {
            margin,
            notional_value,
            fee,
            liquidation_price,
            leverage,
            error: None,
        })
    }
}

impl Default for InMemoryOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PricingOracle for InMemoryOracle {
    async fn market(&self, market_key: &str) -> Result<Market> {
        self.markets
            .read()
            .await
            .get(market_key)
            .cloned()
            .ok_or_else(|| PreviewError::MarketNotFound(market_key.to_string()))
    }

    async fn position(
        &self,
        market_key: &str,
        account: &str,
        account_type: AccountType,
    ) -> Result<Option<Position>> {
        let key = (market_key.to_string(), account.to_string(), account_type);
        Ok(self.positions.read().await.get(&key).cloned())
    }

    async fn dynamic_fee_rate(&self, market_key: &str) -> Result<Decimal> {
        Ok(self
            .dynamic_fee_rates
            .read()
            .await
            .get(market_key)
            .copied()
            .unwrap_or_default())
    }

    async fn cross_margin_settings(&self) -> Result<CrossMarginSettings> {
        Ok(self.cross_margin_settings.read().await.clone())
    }

    async fn free_margin(&self, account: &str) -> Result<Decimal> {
        Ok(self
            .free_margin
            .read()
            .await
            .get(account)
            .copied()
            .unwrap_or_default())
    }

    async fn keeper_eth_balance(&self, account: &str) -> Result<Decimal> {
        Ok(self
            .keeper_balances
            .read()
            .await
            .get(account)
            .copied()
            .unwrap_or_default())
    }

    async fn preview_trade(&self, request: &PreviewRequest) -> Result<PotentialTrade> {
        self.calls.lock().await.record(RecordedPreview {
            request: request.clone(),
            at: Instant::now(),
        });
        debug!(
            "Preview requested: {} size {} margin {}",
            request.market_key, request.size_delta, request.margin_delta
        );

        let outcome = self.script.lock().await.pop_front();
        match outcome {
            Some(ScriptedOutcome::Respond(delay)) => {
                tokio::time::sleep(delay).await;
                self.simulate(request).await
            }
            Some(ScriptedOutcome::Reject(delay, message)) => {
                tokio::time::sleep(delay).await;
                Err(PreviewError::Rejected(message))
            }
            None => self.simulate(request).await,
        }
    }

    fn oracle_name(&self) -> &'static str {
        "in-memory"
    }
}
