//! Order payloads built from a previewed session

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::context::TradeContext;
use super::state::SessionState;
use crate::common::errors::{PreviewError, Result};
use crate::common::types::{AccountType, OrderType};

/// Conditional order flavour understood by the cross-margin account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionalOrderKind {
    Limit = 0,
    Stop = 1,
}

/// What the form hands to the wallet once the user confirms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum OrderSubmission {
    /// Immediate cross-margin trade or margin top-up
    DistributeMargin {
        market_key: String,
        margin_delta: Decimal,
        size_delta: Decimal,
    },
    /// Cross-margin limit/stop order held by a keeper
    PlaceOrderWithFeeCap {
        market_key: String,
        margin_delta: Decimal,
        size_delta: Decimal,
        target_price: Decimal,
        kind: ConditionalOrderKind,
        fee_cap: Decimal,
        /// ETH sent along to fund the keeper
        keeper_eth_value: Decimal,
    },
    /// Isolated-margin market or delayed order
    ModifyIsolatedPosition {
        market_key: String,
        size_delta: Decimal,
        delayed: bool,
    },
}

/// Build the payload for the staged trade
///
/// `from_edit_leverage` sends a plain margin redistribution whatever the
/// order type. Fails with [`PreviewError::PreviewPending`] until the oracle
/// has answered for the latest input, so size and margin always agree.
pub fn build_submission(
    state: &SessionState,
    context: &TradeContext,
    from_edit_leverage: bool,
    fee_cap: Decimal,
) -> Result<OrderSubmission> {
    let market_key = state
        .market_key
        .clone()
        .ok_or_else(|| PreviewError::MissingContext("no market selected".to_string()))?;
    if !state.is_settled() {
        return Err(PreviewError::PreviewPending(state.latest_seq));
    }
    let size_delta = state
        .inputs
        .as_ref()
        .map(|input| input.native_size_delta)
        .unwrap_or_default();

    if state.account_type == AccountType::IsolatedMargin {
        return Ok(OrderSubmission::ModifyIsolatedPosition {
            market_key,
            size_delta,
            delayed: state.order_type.is_deferred(),
        });
    }

    let kind = match state.order_type {
        _ if from_edit_leverage => None,
        OrderType::Limit => Some(ConditionalOrderKind::Limit),
        OrderType::StopMarket => Some(ConditionalOrderKind::Stop),
        OrderType::Market | OrderType::Delayed => None,
    };

    match kind {
        None => Ok(OrderSubmission::DistributeMargin {
            market_key,
            margin_delta: state.margin_delta,
            size_delta,
        }),
        Some(kind) => {
            let target_price = context.order_price.ok_or_else(|| {
                PreviewError::MissingContext("order price required for conditional orders".to_string())
            })?;
            Ok(OrderSubmission::PlaceOrderWithFeeCap {
                market_key,
                margin_delta: state.margin_delta,
                size_delta,
                target_price,
                kind,
                fee_cap,
                keeper_eth_value: state.trade_fees.keeper_eth_deposit,
            })
        }
    }
}
