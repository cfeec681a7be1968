//! Pure trade-preview arithmetic
//!
//! Maps (market parameters, account state, order inputs) to margin delta,
//! fee breakdown, maximum tradable size, available margin, margin usage and
//! buying power. Nothing in this module performs I/O or holds state, so it
//! can be called from anywhere without synchronization.
//!
//! # Components
//!
//! - [`fees`]: static skew fee curve, fee breakdown, keeper and delayed-order deposits
//! - [`margin`]: margin delta, max fee, max sUSD input, available margin summaries
//! - [`sizing`]: converting form edits into an [`OrderInput`], leverage selection
//!
//! # Example
//!
//! ```ignore
//! let fees = FeeCalculator::calculate(
//!     &schedule,
//!     AccountType::CrossMargin,
//!     OrderType::Market,
//!     dec!(2000),
//!     dec!(1),
//!     Decimal::ZERO,
//! );
//! assert_eq!(fees.total, dec!(2.8));
//! ```

pub mod fees;
pub mod margin;
pub mod sizing;
mod types;

pub use types::{
    AccountState,
    FeeSchedule,
    MarginSummary,
    OrderInput,
    PotentialTrade,
    PreviewRequest,
    PreviewSource,
    TradeFees,
    TradePreview,
};

pub use fees::FeeCalculator;
pub use margin::MaxInputParams;
pub use sizing::{LeverageSelector, TradeAmountChange};
