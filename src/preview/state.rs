use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calculation::{OrderInput, TradeFees, TradePreview};
use crate::common::errors::{KnownRejection, PreviewError};
use crate::common::types::{AccountType, OrderType, PositionSide};

/// Where a trade-input session currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewPhase {
    Idle,
    /// Local estimate shown, oracle not asked yet
    Optimistic,
    /// Oracle request in flight
    Previewing,
    Resolved,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Known(KnownRejection),
    Generic,
}

/// Failure as shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl PreviewFailure {
    pub fn known(rejection: KnownRejection) -> Self {
        Self {
            kind: FailureKind::Known(rejection),
            message: rejection.message().to_string(),
        }
    }

    pub fn generic(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Generic,
            message: message.into(),
        }
    }

    /// Recognised rejections keep the oracle's message, everything else gets
    /// `generic_message`
    pub fn from_error(err: &PreviewError, generic_message: &str) -> Self {
        match err.known_rejection() {
            Some(rejection) => Self::known(rejection),
            None => Self::generic(generic_message),
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self.kind, FailureKind::Known(_))
    }
}

/// State transitions of a session
#[derive(Debug, Clone)]
pub enum SessionAction {
    /// New inputs staged with their local estimate; starts a new cycle
    Stage {
        input: OrderInput,
        estimate: Option<TradePreview>,
    },
    /// Leverage-only edit; starts a new cycle without touching the inputs
    StageLeverage { estimate: Option<TradePreview> },
    /// Snappy input update while dragging; no preview cycle
    Simulate(OrderInput),
    /// Oracle request for `seq` is going out
    Issue { seq: u64 },
    /// Fee breakdown and margin delta computed for `seq`
    PublishFees {
        seq: u64,
        fees: TradeFees,
        margin_delta: Decimal,
    },
    Resolve { seq: u64, preview: TradePreview },
    Fail { seq: u64, failure: PreviewFailure },
    Reset,
    SwitchAccountType(AccountType),
    SwitchMarket(String),
    SwitchWallet(Option<String>),
    /// Invalidates the current cycle when the order type changes
    SetOrderType(OrderType),
    /// Invalidates the current cycle when the side changes
    SetLeverageSide(PositionSide),
}

/// Everything the order form shows for one trade-input session
///
/// Only [`SessionState::apply`] mutates it. Results tagged with a sequence
/// number other than `latest_seq` are dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub account_type: AccountType,
    pub market_key: Option<String>,
    pub wallet: Option<String>,
    pub order_type: OrderType,
    pub leverage_side: PositionSide,
    pub inputs: Option<OrderInput>,
    pub simulated: Option<OrderInput>,
    pub phase: PreviewPhase,
    pub latest_seq: u64,
    pub optimistic: Option<TradePreview>,
    pub preview: Option<TradePreview>,
    pub trade_fees: TradeFees,
    pub margin_delta: Decimal,
    pub error: Option<PreviewFailure>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(AccountType::default())
    }
}

impl SessionState {
    pub fn new(account_type: AccountType) -> Self {
        Self {
            account_type,
            market_key: None,
            wallet: None,
            order_type: OrderType::default().normalize_for(account_type),
            leverage_side: PositionSide::Long,
            inputs: None,
            simulated: None,
            phase: PreviewPhase::Idle,
            latest_seq: 0,
            optimistic: None,
            preview: None,
            trade_fees: TradeFees::zero(),
            margin_delta: Decimal::ZERO,
            error: None,
        }
    }

    pub fn is_current(&self, seq: u64) -> bool {
        seq == self.latest_seq
    }

    /// The oracle has answered for the latest input
    pub fn is_settled(&self) -> bool {
        self.phase == PreviewPhase::Resolved
            && self.preview.as_ref().map(|p| p.seq) == Some(self.latest_seq)
    }

    /// Preview to display: the oracle's if resolved, else the local estimate
    pub fn current_preview(&self) -> Option<&TradePreview> {
        self.preview.as_ref().or(self.optimistic.as_ref())
    }

    /// Apply `action`; returns false when it was dropped as stale or changed
    /// nothing
    pub fn apply(&mut self, action: SessionAction) -> bool {
        match action {
            SessionAction::Stage { input, estimate } => {
                self.inputs = Some(input);
                self.simulated = None;
                self.begin_cycle(estimate);
                true
            }
            SessionAction::StageLeverage { estimate } => {
                self.begin_cycle(estimate);
                true
            }
            SessionAction::Simulate(input) => {
                self.simulated = Some(input);
                true
            }
            SessionAction::Issue { seq } => {
                if !self.is_current(seq) {
                    return false;
                }
                self.phase = PreviewPhase::Previewing;
                true
            }
            SessionAction::PublishFees {
                seq,
                fees,
                margin_delta,
            } => {
                if !self.is_current(seq) {
                    return false;
                }
                self.trade_fees = fees;
                self.margin_delta = margin_delta;
                true
            }
            SessionAction::Resolve { seq, preview } => {
                if !self.is_current(seq) {
                    return false;
                }
                self.preview = Some(preview);
                self.phase = PreviewPhase::Resolved;
                self.error = None;
                true
            }
            SessionAction::Fail { seq, failure } => {
                if !self.is_current(seq) {
                    return false;
                }
                self.clear_previews();
                self.phase = PreviewPhase::Failed;
                self.error = Some(failure);
                true
            }
            SessionAction::Reset => {
                self.reset();
                true
            }
            SessionAction::SwitchAccountType(account_type) => {
                self.account_type = account_type;
                self.order_type = self.order_type.normalize_for(account_type);
                self.reset();
                true
            }
            SessionAction::SwitchMarket(market_key) => {
                self.market_key = Some(market_key);
                self.reset();
                true
            }
            SessionAction::SwitchWallet(wallet) => {
                self.wallet = wallet;
                self.reset();
                true
            }
            SessionAction::SetOrderType(order_type) => {
                let order_type = order_type.normalize_for(self.account_type);
                if order_type == self.order_type {
                    return false;
                }
                self.order_type = order_type;
                self.invalidate();
                true
            }
            SessionAction::SetLeverageSide(side) => {
                if side == self.leverage_side {
                    return false;
                }
                self.leverage_side = side;
                self.invalidate();
                true
            }
        }
    }

    fn begin_cycle(&mut self, estimate: Option<TradePreview>) {
        self.latest_seq += 1;
        self.phase = PreviewPhase::Optimistic;
        self.error = None;
        self.preview = None;
        self.optimistic = estimate.map(|mut preview| {
            preview.seq = self.latest_seq;
            preview
        });
    }

    fn clear_previews(&mut self) {
        self.optimistic = None;
        self.preview = None;
        self.trade_fees = TradeFees::zero();
    }

    /// Drop every result of the current cycle but keep the inputs
    fn invalidate(&mut self) {
        self.latest_seq += 1;
        self.margin_delta = Decimal::ZERO;
        self.clear_previews();
        self.error = None;
        self.phase = PreviewPhase::Idle;
    }

    /// Zero all inputs and invalidate any request still in flight
    fn reset(&mut self) {
        self.inputs = None;
        self.simulated = None;
        self.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculation::{MarginSummary, PreviewSource};
    use crate::common::types::CurrencyType;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn input(size: Decimal) -> OrderInput {
        OrderInput {
            side: PositionSide::Long,
            native_size_delta: size,
            susd_size_delta: size * dec!(2000),
            order_price: dec!(2000),
            leverage: dec!(2),
            edited: CurrencyType::Native,
        }
    }

    fn preview(source: PreviewSource, size: Decimal) -> TradePreview {
        TradePreview {
            source,
            seq: 0,
            size_delta: size,
            margin_delta: dec!(1000),
            fees: TradeFees::zero(),
            total_fee: Decimal::ZERO,
            max_fee: Decimal::ZERO,
            margin: dec!(1000),
            notional_value: size * dec!(2000),
            leverage: dec!(2),
            liquidation_price: None,
            summary: MarginSummary::default(),
            computed_at: Utc::now(),
        }
    }

    #[test]
    fn test_full_cycle() {
        let mut state = SessionState::new(AccountType::CrossMargin);
        assert!(state.apply(SessionAction::Stage {
            input: input(dec!(1)),
            estimate: Some(preview(PreviewSource::Optimistic, dec!(1))),
        }));
        assert_eq!(state.phase, PreviewPhase::Optimistic);
        assert_eq!(state.optimistic.as_ref().map(|p| p.seq), Some(1));

        assert!(state.apply(SessionAction::Issue { seq: 1 }));
        assert_eq!(state.phase, PreviewPhase::Previewing);

        assert!(state.apply(SessionAction::Resolve {
            seq: 1,
            preview: preview(PreviewSource::Oracle, dec!(1)),
        }));
        assert_eq!(state.phase, PreviewPhase::Resolved);
        assert_eq!(state.current_preview().map(|p| p.source), Some(PreviewSource::Oracle));
    }

    #[test]
    fn test_stale_results_are_dropped() {
        let mut state = SessionState::new(AccountType::CrossMargin);
        state.apply(SessionAction::Stage { input: input(dec!(1)), estimate: None });
        state.apply(SessionAction::Issue { seq: 1 });
        state.apply(SessionAction::Stage { input: input(dec!(2)), estimate: None });

        assert!(!state.apply(SessionAction::Resolve {
            seq: 1,
            preview: preview(PreviewSource::Oracle, dec!(1)),
        }));
        assert!(!state.apply(SessionAction::Fail {
            seq: 1,
            failure: PreviewFailure::generic("boom"),
        }));
        assert!(state.preview.is_none());
        assert!(state.error.is_none());
        assert_eq!(state.phase, PreviewPhase::Optimistic);
    }

    #[test]
    fn test_failure_clears_everything() {
        let mut state = SessionState::new(AccountType::CrossMargin);
        state.apply(SessionAction::Stage {
            input: input(dec!(1)),
            estimate: Some(preview(PreviewSource::Optimistic, dec!(1))),
        });
        state.apply(SessionAction::PublishFees {
            seq: 1,
            fees: TradeFees { total: dec!(3), ..TradeFees::zero() },
            margin_delta: dec!(1003),
        });
        state.apply(SessionAction::Fail {
            seq: 1,
            failure: PreviewFailure::known(KnownRejection::InsufficientMargin),
        });

        assert_eq!(state.phase, PreviewPhase::Failed);
        assert_eq!(state.trade_fees, TradeFees::zero());
        assert!(state.current_preview().is_none());
        assert_eq!(state.error.as_ref().map(|e| e.message.as_str()), Some("Insufficient margin"));
    }

    #[test]
    fn test_order_settings_invalidate_cycle() {
        let mut state = SessionState::new(AccountType::CrossMargin);
        state.apply(SessionAction::StageLeverage {
            estimate: Some(preview(PreviewSource::Optimistic, Decimal::ZERO)),
        });
        let seq = state.latest_seq;

        assert!(!state.apply(SessionAction::SetOrderType(OrderType::Market)));
        assert!(state.is_current(seq));

        assert!(state.apply(SessionAction::SetOrderType(OrderType::Limit)));
        assert!(!state.apply(SessionAction::Issue { seq }));
        assert_eq!(state.phase, PreviewPhase::Idle);
        assert!(state.current_preview().is_none());

        let seq = state.latest_seq;
        assert!(state.apply(SessionAction::SetLeverageSide(PositionSide::Short)));
        assert!(!state.is_current(seq));
        assert!(!state.apply(SessionAction::SetLeverageSide(PositionSide::Short)));
    }

    #[test]
    fn test_switches_reset_inputs() {
        let mut state = SessionState::new(AccountType::CrossMargin);
        state.apply(SessionAction::SetOrderType(OrderType::Limit));
        state.apply(SessionAction::Stage { input: input(dec!(1)), estimate: None });

        state.apply(SessionAction::SwitchAccountType(AccountType::IsolatedMargin));
        assert!(state.inputs.is_none());
        assert_eq!(state.phase, PreviewPhase::Idle);
        assert_eq!(state.order_type, OrderType::Delayed);
        assert_eq!(state.latest_seq, 3);

        state.apply(SessionAction::Stage { input: input(dec!(1)), estimate: None });
        state.apply(SessionAction::SwitchWallet(Some("0xdef".to_string())));
        assert!(state.inputs.is_none());

        state.apply(SessionAction::Stage { input: input(dec!(1)), estimate: None });
        state.apply(SessionAction::SwitchMarket("sBTCPERP".to_string()));
        assert!(state.inputs.is_none());
        assert_eq!(state.market_key.as_deref(), Some("sBTCPERP"));
    }

    #[test]
    fn test_failure_classification() {
        let known = PreviewFailure::from_error(
            &PreviewError::Rejected("Price impact exceeded".to_string()),
            "generic",
        );
        assert_eq!(known, PreviewFailure::known(KnownRejection::PriceImpactExceeded));

        let generic = PreviewFailure::from_error(&PreviewError::Timeout(15_000), "generic");
        assert!(!generic.is_known());
        assert_eq!(generic.message, "generic");
    }

    #[test]
    fn test_state_serializes() {
        let mut state = SessionState::new(AccountType::CrossMargin);
        state.apply(SessionAction::Stage { input: input(dec!(1)), estimate: None });
        let json = serde_json::to_string(&state).expect("serializes");
        let back: SessionState = serde_json::from_str(&json).expect("deserializes");
        assert_eq!(back, state);
    }
}
