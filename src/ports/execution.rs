use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("API request failed: {0}")]
    Api(String),
    #[error("order rejected: {0}")]
    Rejected(String),
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderAction {
    Buy,
    Sell,
}

/// A trade-local order as the portal expects it on the wire. Amounts are
/// SOL for buys and a token percentage string ("99%") for sells; fees go
/// out as plain floats because the endpoint rejects quoted numbers.
#[derive(Debug, Clone, Serialize)]
pub struct OrderRequest {
    #[serde(rename = "publicKey")]
    pub public_key: String,
    pub action: OrderAction,
    pub mint: String,
    pub amount: serde_json::Value,
    #[serde(rename = "denominatedInSol")]
    pub denominated_in_sol: String,
    pub slippage: f64,
    #[serde(rename = "priorityFee")]
    pub priority_fee: f64,
    #[serde(rename = "briberyFee")]
    pub bribery_fee: f64,
    pub pool: String,
}

impl OrderRequest {
    #[allow(clippy::too_many_arguments)]
    pub fn buy(
        public_key: &str,
        mint: &str,
        amount_sol: Decimal,
        slippage_pct: Decimal,
        priority_fee: Decimal,
        bribery_fee: Decimal,
        pool: &str,
    ) -> Self {
        Self {
            public_key: public_key.to_string(),
            action: OrderAction::Buy,
            mint: mint.to_string(),
            amount: serde_json::json!(amount_sol.to_f64().unwrap_or(0.0)),
            denominated_in_sol: "true".to_string(),
            slippage: slippage_pct.to_f64().unwrap_or(0.0),
            priority_fee: priority_fee.to_f64().unwrap_or(0.0),
            bribery_fee: bribery_fee.to_f64().unwrap_or(0.0),
            pool: pool.to_string(),
        }
    }

    /// Sell a percentage of the held token balance.
    #[allow(clippy::too_many_arguments)]
    pub fn sell_pct(
        public_key: &str,
        mint: &str,
        pct: Decimal,
        slippage_pct: Decimal,
        priority_fee: Decimal,
        bribery_fee: Decimal,
        pool: &str,
    ) -> Self {
        Self {
            public_key: public_key.to_string(),
            action: OrderAction::Sell,
            mint: mint.to_string(),
            amount: serde_json::json!(format!("{}%", pct)),
            denominated_in_sol: "false".to_string(),
            slippage: slippage_pct.to_f64().unwrap_or(0.0),
            priority_fee: priority_fee.to_f64().unwrap_or(0.0),
            bribery_fee: bribery_fee.to_f64().unwrap_or(0.0),
            pool: pool.to_string(),
        }
    }
}

/// Confirmed order result. The portal only returns a signature; a fill
/// price is present when the adapter can infer one (paper trading).
#[derive(Debug, Clone, PartialEq)]
pub struct OrderFill {
    pub signature: String,
    pub fill_price: Option<Decimal>,
}

/// Seam for order submission. No internal retry: failures come back as
/// values and the caller decides.
#[async_trait::async_trait]
pub trait TradePort: Send + Sync {
    async fn submit_order(&self, request: OrderRequest) -> Result<OrderFill, ExecutionError>;
}
