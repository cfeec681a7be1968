//! Futures Trade Preview Library
//!
//! Fee, margin and buying-power arithmetic for perpetual futures orders,
//! plus a debounced preview engine that confirms trades against a
//! pricing/margin oracle.

pub mod calculation;
pub mod common;
pub mod config;
pub mod oracle;
pub mod preview;

// Re-export commonly used types
pub use common::errors::{KnownRejection, PreviewError, Result};
pub use common::traits::PricingOracle;
pub use common::types::{
    AccountType, CrossMarginSettings, CurrencyType, FeeRates, Market, OpenPosition, OrderType,
    Position, PositionSide,
};
pub use config::types::{AppConfig, EngineSettings};
pub use oracle::{InMemoryOracle, RestOracle, Scenario};

// Calculation and preview types
pub use calculation::{
    FeeCalculator, MarginSummary, OrderInput, PotentialTrade, PreviewRequest, TradeFees,
    TradePreview,
};
pub use preview::{
    OrderSubmission, PreviewEngine, PreviewEvent, PreviewFailure, PreviewPhase, SessionState,
    TradeAmountOptions,
};
