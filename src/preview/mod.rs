//! Trade-preview orchestration
//!
//! Turns form edits into optimistic local previews, debounces them into
//! oracle requests and keeps only the answer to the latest edit.
//!
//! # Components
//!
//! - [`engine`]: [`PreviewEngine`], the per-session driver
//! - [`state`]: serializable [`SessionState`] and its reducer
//! - [`debounce`]: trailing-edge [`Debouncer`]
//! - [`context`]: market and account data the calculations run against
//! - [`submission`]: order payloads for the wallet

pub mod context;
pub mod debounce;
pub mod engine;
pub mod state;
pub mod submission;

pub use context::TradeContext;
pub use debounce::Debouncer;
pub use engine::{PreviewEngine, TradeAmountOptions};
pub use state::{FailureKind, PreviewFailure, PreviewPhase, SessionAction, SessionState};
pub use submission::{ConditionalOrderKind, OrderSubmission};

use crate::calculation::TradePreview;

/// Published on every visible state change of a session
#[derive(Debug, Clone, PartialEq)]
pub enum PreviewEvent {
    /// Local estimate for a freshly staged edit
    Optimistic(TradePreview),
    /// Oracle request for `seq` went out
    Previewing { seq: u64 },
    Resolved(TradePreview),
    Failed { seq: u64, failure: PreviewFailure },
    /// Inputs cleared
    Reset,
}
