use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("no SOL/USD rate available")]
    Unavailable,
}

/// SOL to USD conversion seam. Callers treat a failure as "rate unknown"
/// and skip USD thresholds rather than guessing.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PriceOracle: Send + Sync {
    async fn sol_usd(&self) -> Result<Decimal, OracleError>;
}

/// Fixed-rate oracle configured from the TOML file.
pub struct StaticOracle {
    rate: Decimal,
}

impl StaticOracle {
    pub fn new(rate: Decimal) -> Self {
        Self { rate }
    }
}

#[async_trait::async_trait]
impl PriceOracle for StaticOracle {
    async fn sol_usd(&self) -> Result<Decimal, OracleError> {
        if self.rate > Decimal::ZERO {
            Ok(self.rate)
        } else {
            Err(OracleError::Unavailable)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn static_oracle_returns_configured_rate() {
        let oracle = StaticOracle::new(dec!(256));
        assert_eq!(oracle.sol_usd().await.unwrap(), dec!(256));
    }

    #[tokio::test]
    async fn zero_rate_is_unavailable() {
        let oracle = StaticOracle::new(Decimal::ZERO);
        assert!(matches!(oracle.sol_usd().await, Err(OracleError::Unavailable)));
    }

    #[tokio::test]
    async fn mock_oracle_scripts_a_rate() {
        let mut oracle = MockPriceOracle::new();
        oracle.expect_sol_usd().returning(|| Ok(dec!(300)));
        assert_eq!(oracle.sol_usd().await.unwrap(), dec!(300));
    }
}
