use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::ports::execution::{ExecutionError, OrderFill, OrderRequest, TradePort};

/// Trade-local HTTP execution adapter. Submits signed-by-portal orders
/// and hands back the transaction signature; it never retries on its own.
pub struct PumpPortalTradeApi {
    client: reqwest::Client,
    trade_url: String,
    api_key: Option<String>,
    request_timeout: Duration,
}

impl PumpPortalTradeApi {
    pub fn new(trade_url: String, api_key: Option<String>, request_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            trade_url,
            api_key,
            request_timeout,
        }
    }

    fn url(&self) -> String {
        match &self.api_key {
            Some(key) => format!("{}?api-key={}", self.trade_url, key),
            None => self.trade_url.clone(),
        }
    }
}

#[async_trait::async_trait]
impl TradePort for PumpPortalTradeApi {
    async fn submit_order(&self, request: OrderRequest) -> Result<OrderFill, ExecutionError> {
        debug!(mint = %request.mint, action = ?request.action, "submitting order");

        let send = self.client.post(self.url()).json(&request).send();
        let response = tokio::time::timeout(self.request_timeout, send)
            .await
            .map_err(|_| ExecutionError::Timeout(self.request_timeout))?
            .map_err(|e| ExecutionError::Api(e.to_string()))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            if body.to_lowercase().contains("insufficient") {
                return Err(ExecutionError::InsufficientFunds);
            }
            return Err(ExecutionError::Api(body));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ExecutionError::Api(e.to_string()))?;

        if let Some(errors) = body.get("errors") {
            if !errors.is_null() && errors.as_array().map(|a| !a.is_empty()).unwrap_or(true) {
                return Err(ExecutionError::Rejected(errors.to_string()));
            }
        }

        match body.get("signature").and_then(Value::as_str) {
            Some(signature) => Ok(OrderFill {
                signature: signature.to_string(),
                fill_price: None,
            }),
            None => Err(ExecutionError::Api(
                "response carried no signature".to_string(),
            )),
        }
    }
}
