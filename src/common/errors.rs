//! Error types for the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using our PreviewError
pub type Result<T> = std::result::Result<T, PreviewError>;

/// Main error type for oracle and preview operations
#[derive(Error, Debug)]
pub enum PreviewError {
    /// The oracle refused the trade and gave a reason
    #[error("Trade preview rejected: {0}")]
    Rejected(String),

    /// Preview request did not complete in time
    #[error("Operation timed out after {0} ms")]
    Timeout(u64),

    /// HTTP request errors
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Invalid oracle response
    #[error("Invalid oracle response: {0}")]
    InvalidResponse(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Market not found
    #[error("Market not found: {0}")]
    MarketNotFound(String),

    /// The engine has not been given enough context (market, wallet) to act
    #[error("Missing context: {0}")]
    MissingContext(String),

    /// The latest input has no resolved preview yet
    #[error("Preview for input {0} has not resolved")]
    PreviewPending(u64),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PreviewError {
    /// The recognised rejection carried by this error, if any.
    pub fn known_rejection(&self) -> Option<KnownRejection> {
        match self {
            PreviewError::Rejected(message) => KnownRejection::from_message(message),
            _ => None,
        }
    }
}

/// Rejection reasons the oracle is known to return.
///
/// Messages are matched verbatim; anything else is shown as a generic failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnownRejection {
    InsufficientFreeMargin,
    InsufficientEthBalance,
    InsufficientMargin,
    MaxLeverageExceeded,
    MaxMarketSizeExceeded,
    PriceImpactExceeded,
    CanLiquidate,
    PriceTooVolatile,
}

impl KnownRejection {
    pub const ALL: [KnownRejection; 8] = [
        KnownRejection::InsufficientFreeMargin,
        KnownRejection::InsufficientEthBalance,
        KnownRejection::InsufficientMargin,
        KnownRejection::MaxLeverageExceeded,
        KnownRejection::MaxMarketSizeExceeded,
        KnownRejection::PriceImpactExceeded,
        KnownRejection::CanLiquidate,
        KnownRejection::PriceTooVolatile,
    ];

    /// Message exactly as the oracle reports it
    pub fn message(&self) -> &'static str {
        match self {
            KnownRejection::InsufficientFreeMargin => "Insufficient free margin",
            KnownRejection::InsufficientEthBalance => "Insufficient ETH balance for keeper fee",
            KnownRejection::InsufficientMargin => "Insufficient margin",
            KnownRejection::MaxLeverageExceeded => "Max leverage exceeded",
            KnownRejection::MaxMarketSizeExceeded => "Max market size exceeded",
            KnownRejection::PriceImpactExceeded => "Price impact exceeded",
            KnownRejection::CanLiquidate => "Position can be liquidated",
            KnownRejection::PriceTooVolatile => "Price too volatile",
        }
    }

    pub fn from_message(message: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|known| known.message() == message)
    }
}

impl std::fmt::Display for KnownRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}
