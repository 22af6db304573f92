use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use rand::Rng;
use rust_decimal::Decimal;

use crate::domain::events::Notification;
use crate::ports::execution::{ExecutionError, OrderFill, OrderRequest, TradePort};
use crate::ports::notify::Notifier;

/// Recording trade port with scripted results. Results are consumed in
/// order; when the script runs out, every order fills with the default
/// price.
#[derive(Debug, Default)]
pub struct MockTradePort {
    calls: Arc<Mutex<Vec<OrderRequest>>>,
    script: Arc<Mutex<VecDeque<Result<OrderFill, ExecutionError>>>>,
    default_fill_price: Option<Decimal>,
}

impl MockTradePort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to queue one scripted result.
    pub fn with_result(self, result: Result<OrderFill, ExecutionError>) -> Self {
        self.script.lock().unwrap().push_back(result);
        self
    }

    pub fn with_default_fill_price(mut self, price: Decimal) -> Self {
        self.default_fill_price = Some(price);
        self
    }

    /// Get all recorded order requests.
    pub fn calls(&self) -> Vec<OrderRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl TradePort for MockTradePort {
    async fn submit_order(&self, request: OrderRequest) -> Result<OrderFill, ExecutionError> {
        self.calls.lock().unwrap().push(request);
        let scripted = self.script.lock().unwrap().pop_front();
        match scripted {
            Some(result) => result,
            None => Ok(OrderFill {
                signature: format!("MOCKSIG{}", self.calls.lock().unwrap().len()),
                fill_price: self.default_fill_price,
            }),
        }
    }
}

/// Dry-run trade port: every order fills instantly with a synthetic
/// signature and no on-chain activity.
#[derive(Debug, Default)]
pub struct PaperTradePort {
    submitted: Arc<Mutex<Vec<OrderRequest>>>,
}

impl PaperTradePort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submitted(&self) -> Vec<OrderRequest> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl TradePort for PaperTradePort {
    async fn submit_order(&self, request: OrderRequest) -> Result<OrderFill, ExecutionError> {
        self.submitted.lock().unwrap().push(request);
        let suffix: u64 = rand::thread_rng().gen();
        Ok(OrderFill {
            signature: format!("PAPER{:016x}", suffix),
            fill_price: None,
        })
    }
}

/// Records every notification for later assertions.
#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    events: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Notification> {
        self.events.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, event: Notification) {
        self.events.lock().unwrap().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn scripted_results_consumed_in_order() {
        let port = MockTradePort::new()
            .with_result(Ok(OrderFill {
                signature: "SIG1".to_string(),
                fill_price: Some(dec!(1)),
            }))
            .with_result(Err(ExecutionError::InsufficientFunds));

        let req = OrderRequest::buy(
            "W", "M", dec!(0.01), dec!(5), dec!(0.001), dec!(0.001), "pump",
        );
        let first = port.submit_order(req.clone()).await;
        assert_eq!(first.unwrap().signature, "SIG1");
        let second = port.submit_order(req).await;
        assert!(matches!(second, Err(ExecutionError::InsufficientFunds)));
        assert_eq!(port.calls().len(), 2);
    }

    #[tokio::test]
    async fn paper_port_always_fills() {
        let port = PaperTradePort::new();
        let req = OrderRequest::sell_pct(
            "W", "M", dec!(99), dec!(5), dec!(0.001), dec!(0.001), "pump",
        );
        let fill = port.submit_order(req).await.unwrap();
        assert!(fill.signature.starts_with("PAPER"));
        assert_eq!(port.submitted().len(), 1);
    }
}
