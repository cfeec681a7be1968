//! Per-session preview driver

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, instrument, warn};

use super::context::TradeContext;
use super::debounce::Debouncer;
use super::state::{PreviewFailure, PreviewPhase, SessionAction, SessionState};
use super::submission::{build_submission, OrderSubmission};
use super::PreviewEvent;
use crate::calculation::margin::{self, MaxInputParams};
use crate::calculation::sizing::stage_trade_amount;
use crate::calculation::{
    FeeCalculator, LeverageSelector, MarginSummary, OrderInput, PotentialTrade, PreviewRequest,
    PreviewSource, TradeAmountChange, TradeFees, TradePreview,
};
use crate::common::errors::{PreviewError, Result};
use crate::common::traits::PricingOracle;
use crate::common::types::{AccountType, CurrencyType, Market, OrderType, PositionSide};
use crate::config::types::EngineSettings;

const SETTLE_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Options of a size edit
#[derive(Debug, Clone, Copy, Default)]
pub struct TradeAmountOptions {
    /// Only update the simulated inputs, no preview cycle
    pub simulate: bool,
    /// Cross-margin leverage for this trade instead of the selected one
    pub cross_margin_leverage: Option<Decimal>,
    /// Price to size against instead of the current trade price
    pub price: Option<Decimal>,
}

/// Fees and margin delta of one staged input
struct Priced {
    input: OrderInput,
    fees: TradeFees,
    margin_delta: Decimal,
    max_fee: Decimal,
}

impl Priced {
    fn into_preview(
        self,
        source: PreviewSource,
        seq: u64,
        trade: &PotentialTrade,
        market: &Market,
        order_type: OrderType,
    ) -> TradePreview {
        let size_delta = self.input.native_size_delta;
        TradePreview {
            source,
            seq,
            size_delta,
            margin_delta: self.margin_delta,
            total_fee: self.fees.total,
            fees: self.fees,
            max_fee: self.max_fee,
            margin: trade.margin,
            notional_value: trade.notional_value,
            leverage: trade.leverage,
            liquidation_price: trade.liquidation_price,
            summary: margin::preview_summary(trade, market, order_type, size_delta, market.max_leverage),
            computed_at: Utc::now(),
        }
    }
}

struct Shared<O> {
    oracle: O,
    settings: EngineSettings,
    state: RwLock<SessionState>,
    context: RwLock<TradeContext>,
    events: Option<mpsc::Sender<PreviewEvent>>,
}

impl<O: PricingOracle + 'static> Shared<O> {
    async fn snapshot(&self) -> (SessionState, TradeContext) {
        let state = self.state.read().await.clone();
        let context = self.context.read().await.clone();
        (state, context)
    }

    fn emit(&self, event: PreviewEvent) {
        if let Some(sender) = &self.events {
            if let Err(e) = sender.try_send(event) {
                warn!("Dropping preview event: {}", e);
            }
        }
    }

    fn max_fee(&self, state: &SessionState, context: &TradeContext) -> Decimal {
        let Some(market) = context.market.as_ref() else {
            return Decimal::ZERO;
        };
        let mut schedule = context.fee_schedule(market, self.settings.keeper_eth_deposit);
        schedule.static_fee_rate = Some(
            self.oracle
                .static_fee_rate(market, state.leverage_side.signed(Decimal::ONE)),
        );
        margin::max_fee(
            &context.account_state(state.account_type),
            &schedule,
            state.order_type,
            state.leverage_side,
            context.trade_price(state.order_type),
            context.selected_leverage(self.settings.default_leverage),
        )
        .unwrap_or_default()
    }

    fn price_trade(
        &self,
        state: &SessionState,
        context: &TradeContext,
        market: &Market,
        input: OrderInput,
        keeper_eth_balance: Decimal,
        from_leverage: bool,
    ) -> Priced {
        let mut schedule = context.fee_schedule(market, self.settings.keeper_eth_deposit);
        schedule.static_fee_rate = Some(self.oracle.static_fee_rate(market, input.native_size_delta));
        let fees = FeeCalculator::calculate(
            &schedule,
            state.account_type,
            state.order_type,
            input.susd_size_delta,
            input.native_size_delta,
            keeper_eth_balance,
        );

        // Isolated positions are margined by the oracle itself
        let margin_delta = match state.account_type {
            AccountType::CrossMargin if input.has_size() || from_leverage => {
                margin::margin_delta(&input, &fees, &context.account_state(state.account_type))
            }
            _ => Decimal::ZERO,
        };

        Priced {
            max_fee: self.max_fee(state, context),
            input,
            fees,
            margin_delta,
        }
    }

    fn estimate(
        &self,
        state: &SessionState,
        context: &TradeContext,
        input: &OrderInput,
        from_leverage: bool,
    ) -> Option<TradePreview> {
        let market = context.market.as_ref()?;
        let priced = self.price_trade(
            state,
            context,
            market,
            input.clone(),
            context.keeper_eth_balance,
            from_leverage,
        );
        let account = context.account_state(state.account_type);
        let trade = margin::estimate_potential_trade(input, &account, &priced.fees, priced.margin_delta);
        Some(priced.into_preview(PreviewSource::Optimistic, 0, &trade, market, state.order_type))
    }

    async fn run_preview(&self, seq: u64, input: OrderInput, from_leverage: bool) {
        if !self.state.write().await.apply(SessionAction::Issue { seq }) {
            debug!(seq, "Preview superseded before it was issued");
            return;
        }
        self.emit(PreviewEvent::Previewing { seq });

        let result = match tokio::time::timeout(
            self.settings.preview_timeout(),
            self.fetch_preview(seq, input, from_leverage),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(PreviewError::Timeout(self.settings.preview_timeout_ms)),
        };

        match result {
            Ok(preview) => {
                let applied = self.state.write().await.apply(SessionAction::Resolve {
                    seq,
                    preview: preview.clone(),
                });
                if !applied {
                    debug!(seq, "Discarding stale preview");
                    return;
                }
                info!(
                    seq,
                    "Preview resolved: margin {} leverage {} fee {}",
                    preview.margin, preview.leverage, preview.total_fee
                );
                self.emit(PreviewEvent::Resolved(preview));
            }
            Err(err) => {
                let failure = PreviewFailure::from_error(&err, &self.settings.generic_error_message);
                let applied = self.state.write().await.apply(SessionAction::Fail {
                    seq,
                    failure: failure.clone(),
                });
                if !applied {
                    debug!(seq, "Discarding stale preview failure: {}", err);
                    return;
                }
                if failure.is_known() {
                    warn!(seq, "Preview rejected: {}", failure.message);
                } else {
                    error!(seq, "Preview failed: {}", err);
                }
                self.emit(PreviewEvent::Failed { seq, failure });
            }
        }
    }

    async fn fetch_preview(
        &self,
        seq: u64,
        input: OrderInput,
        from_leverage: bool,
    ) -> Result<TradePreview> {
        let (state, context) = self.snapshot().await;
        let market = context
            .market
            .clone()
            .ok_or_else(|| PreviewError::MissingContext("market data not loaded".to_string()))?;

        let keeper_eth_balance = match (&state.wallet, state.order_type.is_advanced()) {
            (Some(wallet), true) => {
                let balance = self.oracle.keeper_eth_balance(wallet).await?;
                self.context.write().await.keeper_eth_balance = balance;
                balance
            }
            _ => Decimal::ZERO,
        };

        let priced = self.price_trade(&state, &context, &market, input, keeper_eth_balance, from_leverage);
        self.state.write().await.apply(SessionAction::PublishFees {
            seq,
            fees: priced.fees.clone(),
            margin_delta: priced.margin_delta,
        });

        let request = PreviewRequest {
            market_key: market.key.clone(),
            account: state.wallet.clone(),
            account_type: state.account_type,
            order_type: state.order_type,
            size_delta: priced.input.native_size_delta,
            margin_delta: priced.margin_delta,
            price: priced.input.order_price,
        };
        debug!(
            seq,
            oracle = self.oracle.oracle_name(),
            "Requesting preview: size {} margin {}",
            request.size_delta,
            request.margin_delta
        );

        let mut trade = self.oracle.preview_trade(&request).await?;
        if let Some(message) = trade.error.take() {
            return Err(PreviewError::Rejected(message));
        }
        Ok(priced.into_preview(PreviewSource::Oracle, seq, &trade, &market, state.order_type))
    }
}

/// Drives one trade-input session against a [`PricingOracle`]
///
/// Edits produce an optimistic preview immediately and an oracle preview
/// after the debounce delay. Only the answer to the latest edit is ever
/// applied; switching account type, market or wallet clears everything.
pub struct PreviewEngine<O: PricingOracle + 'static> {
    shared: Arc<Shared<O>>,
    debouncer: Debouncer,
}

impl<O: PricingOracle + 'static> PreviewEngine<O> {
    pub fn new(oracle: O, settings: EngineSettings) -> Self {
        Self::build(oracle, settings, None)
    }

    /// Engine that also publishes [`PreviewEvent`]s on `events`
    pub fn with_events(
        oracle: O,
        settings: EngineSettings,
        events: mpsc::Sender<PreviewEvent>,
    ) -> Self {
        Self::build(oracle, settings, Some(events))
    }

    fn build(oracle: O, settings: EngineSettings, events: Option<mpsc::Sender<PreviewEvent>>) -> Self {
        let debouncer = Debouncer::new(settings.debounce());
        Self {
            shared: Arc::new(Shared {
                oracle,
                settings,
                state: RwLock::new(SessionState::default()),
                context: RwLock::new(TradeContext::default()),
                events,
            }),
            debouncer,
        }
    }

    pub fn oracle(&self) -> &O {
        &self.shared.oracle
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.shared.settings
    }

    pub async fn state(&self) -> SessionState {
        self.shared.state.read().await.clone()
    }

    pub async fn context(&self) -> TradeContext {
        self.shared.context.read().await.clone()
    }

    /// Push market or account data obtained elsewhere
    pub async fn update_context<F>(&self, update: F)
    where
        F: FnOnce(&mut TradeContext),
    {
        update(&mut *self.shared.context.write().await);
    }

    /// Load market, fee and account data for the selected market and wallet
    #[instrument(skip(self))]
    pub async fn sync(&self) -> Result<()> {
        let state = self.state().await;
        let market_key = state
            .market_key
            .clone()
            .ok_or_else(|| PreviewError::MissingContext("no market selected".to_string()))?;
        let oracle = &self.shared.oracle;

        let market = oracle.market(&market_key).await?;
        if market.is_suspended {
            warn!("Market {} is suspended", market_key);
        }
        let dynamic_fee_rate = oracle.dynamic_fee_rate(&market_key).await?;
        let cross_margin_settings = oracle.cross_margin_settings().await?;

        let (position, free_margin, keeper_eth_balance) = match &state.wallet {
            Some(wallet) => {
                let position = oracle.position(&market_key, wallet, state.account_type).await?;
                let free_margin = match state.account_type {
                    AccountType::CrossMargin => oracle.free_margin(wallet).await?,
                    AccountType::IsolatedMargin => Decimal::ZERO,
                };
                let keeper_eth_balance = oracle.keeper_eth_balance(wallet).await?;
                (position, free_margin, keeper_eth_balance)
            }
            None => (None, Decimal::ZERO, Decimal::ZERO),
        };

        let mut context = self.shared.context.write().await;
        context.market = Some(market);
        context.position = position;
        context.free_margin = free_margin;
        context.cross_margin_settings = cross_margin_settings;
        context.dynamic_fee_rate = dynamic_fee_rate;
        context.keeper_eth_balance = keeper_eth_balance;

        info!(
            market = %market_key,
            oracle = oracle.oracle_name(),
            "Trade context synced"
        );
        Ok(())
    }

    /// Size edit from the order form
    ///
    /// An empty, zero or unparsable value (or a zero price) clears the form
    /// without asking the oracle.
    #[instrument(skip(self, options))]
    pub async fn on_trade_amount_change(
        &mut self,
        value: &str,
        currency: CurrencyType,
        options: TradeAmountOptions,
    ) {
        let (state, context) = self.shared.snapshot().await;
        let price = options
            .price
            .unwrap_or_else(|| context.trade_price(state.order_type));
        let account = context.account_state(state.account_type);

        let change = TradeAmountChange {
            value,
            price,
            currency,
            side: state.leverage_side,
            account_type: state.account_type,
            remaining_margin: account.remaining_margin(),
            max_leverage: context.max_leverage(),
            selected_leverage: context.selected_leverage(self.shared.settings.default_leverage),
            cross_margin_leverage: options.cross_margin_leverage,
        };

        let Some(input) = stage_trade_amount(&change) else {
            debug!("Nothing to preview, clearing trade inputs");
            self.reset().await;
            return;
        };

        if options.simulate {
            self.shared.state.write().await.apply(SessionAction::Simulate(input));
            return;
        }
        self.stage(input, false).await;
    }

    /// Leverage change on the open position, without a size change
    #[instrument(skip(self))]
    pub async fn on_change_open_pos_leverage(&mut self, leverage: Decimal) {
        let (state, context) = self.shared.snapshot().await;
        let input = OrderInput::leverage_only(
            state.leverage_side,
            leverage,
            context.trade_price(state.order_type),
        );
        self.stage(input, true).await;
    }

    /// Order price edit for limit/stop orders; re-sizes the staged sUSD amount
    #[instrument(skip(self))]
    pub async fn on_trade_order_price_change(&mut self, price: &str) {
        let price = Decimal::from_str(price.trim())
            .ok()
            .filter(|p| *p > Decimal::ZERO);
        self.set_order_price(price).await;

        let staged_usd = self
            .state()
            .await
            .inputs
            .map(|input| input.susd_size_delta.abs())
            .filter(|usd| !usd.is_zero());
        if let (Some(price), Some(usd)) = (price, staged_usd) {
            let options = TradeAmountOptions {
                price: Some(price),
                ..Default::default()
            };
            self.on_trade_amount_change(&usd.to_string(), CurrencyType::Usd, options)
                .await;
        }
    }

    pub async fn set_order_price(&self, price: Option<Decimal>) {
        self.shared.context.write().await.order_price = price;
    }

    /// Remember the leverage picked for the current market's asset
    pub async fn set_preferred_leverage(&self, leverage: Decimal) -> Result<()> {
        let mut context = self.shared.context.write().await;
        let asset = context
            .market
            .as_ref()
            .map(|m| m.asset.clone())
            .ok_or_else(|| PreviewError::MissingContext("market data not loaded".to_string()))?;
        context.preferred_leverage.insert(asset, leverage);
        Ok(())
    }

    /// Selector for the edit-leverage dialog, starting at the selected leverage
    pub async fn leverage_selector(&self) -> LeverageSelector {
        let context = self.context().await;
        LeverageSelector::new(
            context.selected_leverage(self.shared.settings.default_leverage),
            context.market.as_ref().map(|m| m.max_leverage),
        )
    }

    /// Zero all inputs and drop any pending or in-flight preview
    pub async fn reset(&mut self) {
        self.debouncer.cancel();
        self.shared.state.write().await.apply(SessionAction::Reset);
        self.shared.emit(PreviewEvent::Reset);
    }

    #[instrument(skip(self))]
    pub async fn switch_account_type(&mut self, account_type: AccountType) {
        self.debouncer.cancel();
        self.shared
            .state
            .write()
            .await
            .apply(SessionAction::SwitchAccountType(account_type));
        {
            let mut context = self.shared.context.write().await;
            context.position = None;
            context.free_margin = Decimal::ZERO;
        }
        info!("Switched account type to {}", account_type);
        self.shared.emit(PreviewEvent::Reset);
    }

    #[instrument(skip(self))]
    pub async fn switch_market(&mut self, market_key: &str) {
        self.debouncer.cancel();
        self.shared
            .state
            .write()
            .await
            .apply(SessionAction::SwitchMarket(market_key.to_string()));
        {
            let mut context = self.shared.context.write().await;
            context.market = None;
            context.position = None;
            context.dynamic_fee_rate = Decimal::ZERO;
            context.order_price = None;
        }
        info!("Switched market to {}", market_key);
        self.shared.emit(PreviewEvent::Reset);
    }

    #[instrument(skip(self))]
    pub async fn switch_wallet(&mut self, wallet: Option<String>) {
        self.debouncer.cancel();
        self.shared
            .state
            .write()
            .await
            .apply(SessionAction::SwitchWallet(wallet));
        {
            let mut context = self.shared.context.write().await;
            context.position = None;
            context.free_margin = Decimal::ZERO;
            context.keeper_eth_balance = Decimal::ZERO;
        }
        self.shared.emit(PreviewEvent::Reset);
    }

    /// Change the order type; unsupported types fall back to the account's default
    ///
    /// A preview pending or in flight for the previous type is dropped and
    /// the staged size is previewed again.
    pub async fn set_order_type(&mut self, order_type: OrderType) {
        let changed = self
            .shared
            .state
            .write()
            .await
            .apply(SessionAction::SetOrderType(order_type));
        if changed {
            self.debouncer.cancel();
            self.restage().await;
        }
    }

    pub async fn set_leverage_side(&mut self, side: PositionSide) {
        let changed = self
            .shared
            .state
            .write()
            .await
            .apply(SessionAction::SetLeverageSide(side));
        if changed {
            self.debouncer.cancel();
            self.restage().await;
        }
    }

    /// Worst-case fee at full headroom, zero while it cannot be computed
    pub async fn max_fee(&self) -> Decimal {
        let (state, context) = self.shared.snapshot().await;
        self.shared.max_fee(&state, &context)
    }

    pub async fn max_usd_input_amount(&self) -> Decimal {
        let (state, context) = self.shared.snapshot().await;
        let account = context.account_state(state.account_type);
        let params = MaxInputParams {
            account: &account,
            order_side: state.leverage_side,
            trade_price: context.trade_price(state.order_type),
            selected_leverage: context.selected_leverage(self.shared.settings.default_leverage),
            max_fee: self.shared.max_fee(&state, &context),
            buffer_ratio: self.shared.settings.max_usd_buffer_ratio,
        };
        margin::max_usd_input_amount(&params)
    }

    /// Margin figures of the current position, before any trade
    pub async fn account_summary(&self) -> MarginSummary {
        let context = self.context().await;
        margin::account_summary(context.position.as_ref(), context.max_leverage())
    }

    /// Payload for submitting the staged trade
    pub async fn order_submission(
        &self,
        from_edit_leverage: bool,
        fee_cap: Decimal,
    ) -> Result<OrderSubmission> {
        let (state, context) = self.shared.snapshot().await;
        build_submission(&state, &context, from_edit_leverage, fee_cap)
    }

    /// Wait until the latest edit has resolved or failed, bounded by the
    /// debounce delay plus the preview timeout
    pub async fn settle(&self) -> SessionState {
        let settings = &self.shared.settings;
        let deadline = tokio::time::Instant::now()
            + settings.debounce()
            + settings.preview_timeout()
            + SETTLE_POLL_INTERVAL;
        loop {
            let state = self.state().await;
            let in_progress = matches!(state.phase, PreviewPhase::Optimistic | PreviewPhase::Previewing);
            if !in_progress || tokio::time::Instant::now() >= deadline {
                return state;
            }
            tokio::time::sleep(SETTLE_POLL_INTERVAL).await;
        }
    }

    /// Recompute the staged sUSD amount under changed order settings
    async fn restage(&mut self) {
        let staged_usd = self
            .state()
            .await
            .inputs
            .map(|input| input.susd_size_delta.abs())
            .filter(|usd| !usd.is_zero());
        if let Some(usd) = staged_usd {
            self.on_trade_amount_change(&usd.to_string(), CurrencyType::Usd, TradeAmountOptions::default())
                .await;
        }
    }

    async fn stage(&mut self, input: OrderInput, from_leverage: bool) {
        let (seq, optimistic) = {
            let context = self.shared.context.read().await;
            let mut state = self.shared.state.write().await;
            let estimate = self.shared.estimate(&state, &context, &input, from_leverage);
            let action = if from_leverage {
                SessionAction::StageLeverage { estimate }
            } else {
                SessionAction::Stage {
                    input: input.clone(),
                    estimate,
                }
            };
            state.apply(action);
            (state.latest_seq, state.optimistic.clone())
        };

        debug!(seq, from_leverage, "Staged trade input");
        if let Some(preview) = optimistic {
            self.shared.emit(PreviewEvent::Optimistic(preview));
        }

        let shared = Arc::clone(&self.shared);
        self.debouncer.schedule(async move {
            shared.run_preview(seq, input, from_leverage).await;
        });
    }
}
