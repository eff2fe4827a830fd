//! Market data provider abstraction.
//!
//! Defines the `MarketDataProvider` trait that data sources implement. Both
//! fetches may fail per symbol; the universe evaluator turns a failure into an
//! all-absent snapshot instead of aborting the pass.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

use super::Candle;

// ============================================================================
// Provider Error
// ============================================================================

/// Errors specific to data providers.
#[derive(Debug, Clone)]
pub enum ProviderError {
    /// Network error (connection failed, timeout)
    Network(String),
    /// Rate limit exceeded
    RateLimited { retry_after_secs: Option<u64> },
    /// Data not available for the requested symbol
    DataNotAvailable(String),
    /// Response could not be decoded
    Decode(String),
    /// Internal provider error
    Internal(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "Network error: {}", msg),
            Self::RateLimited { retry_after_secs } => {
                write!(f, "Rate limited")?;
                if let Some(secs) = retry_after_secs {
                    write!(f, ", retry after {} seconds", secs)?;
                }
                Ok(())
            }
            Self::DataNotAvailable(msg) => write!(f, "Data not available: {}", msg),
            Self::Decode(msg) => write!(f, "Decode error: {}", msg),
            Self::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

impl ProviderError {
    /// How long the provider asked callers to hold off, if it did.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited {
                retry_after_secs: Some(secs),
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

// ============================================================================
// Market Data Provider Trait
// ============================================================================

/// Trait for market data providers.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Get the provider name (e.g., "yahoo")
    fn name(&self) -> &'static str;

    /// Fetch roughly one year of daily bars for a symbol.
    ///
    /// An empty vector is a valid answer; callers treat it the same as
    /// `DataNotAvailable`.
    async fn fetch_price_history(&self, symbol: &str) -> Result<Vec<Candle>, ProviderError>;

    /// Fetch raw fundamental fields for a symbol as a flat JSON object.
    ///
    /// Field names follow the provider's vocabulary; the fundamental
    /// normalizer maps them onto the canonical snapshot.
    async fn fetch_fundamentals(&self, symbol: &str) -> Result<Value, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::RateLimited {
            retry_after_secs: Some(30),
        };
        assert_eq!(err.to_string(), "Rate limited, retry after 30 seconds");
        assert_eq!(
            ProviderError::DataNotAvailable("XYZ".into()).to_string(),
            "Data not available: XYZ"
        );
    }

    #[test]
    fn test_provider_error_retry_after() {
        let err = ProviderError::RateLimited {
            retry_after_secs: Some(30),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(30)));
        assert_eq!(ProviderError::RateLimited { retry_after_secs: None }.retry_after(), None);
        assert_eq!(ProviderError::Network("timeout".into()).retry_after(), None);
    }
}
