use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{error, info, warn};

use crate::domain::ledger::{SettlementRecord, TradeLedger, TransactionRecord, TxKind};
use crate::ports::execution::{OrderRequest, TradePort};

/// A closed spot waiting for its rent to be reclaimed.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSpot {
    pub mint: String,
    pub signature: String,
    pub created_at: DateTime<Utc>,
    pub retries: u32,
}

#[derive(Debug, Clone)]
pub struct SettlementConfig {
    /// Queue depth that triggers a batch regardless of elapsed time.
    pub min_spots: usize,
    pub max_batch_size: usize,
    pub interval: Duration,
    /// Failed spots are requeued up to this many times, then dropped.
    pub max_retries: u32,
    /// SOL reclaimed per settled spot.
    pub spot_amount_sol: Decimal,
    pub base_priority_fee_sol: Decimal,
    pub slippage_pct: Decimal,
    pub pool: String,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            min_spots: 5,
            max_batch_size: 20,
            interval: Duration::from_secs(3600),
            max_retries: 2,
            spot_amount_sol: dec!(0.002),
            base_priority_fee_sol: dec!(0.001),
            slippage_pct: dec!(5),
            pool: "pump".to_string(),
        }
    }
}

/// FIFO queue of pending spots with threshold-or-interval batching.
/// Settlement is oldest-first and bounded per batch; anything beyond the
/// batch size stays queued for the next round.
#[derive(Debug)]
pub struct BatchSettlement {
    config: SettlementConfig,
    pending: VecDeque<PendingSpot>,
    last_settled_at: DateTime<Utc>,
}

impl BatchSettlement {
    pub fn new(config: SettlementConfig) -> Self {
        Self {
            config,
            pending: VecDeque::new(),
            last_settled_at: Utc::now(),
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn pending_mints(&self) -> Vec<String> {
        self.pending.iter().map(|s| s.mint.clone()).collect()
    }

    pub fn add_spot(&mut self, mint: &str, signature: &str, at: DateTime<Utc>) {
        self.pending.push_back(PendingSpot {
            mint: mint.to_string(),
            signature: signature.to_string(),
            created_at: at,
            retries: 0,
        });
    }

    /// Whether a batch should run now: queue at threshold, or the interval
    /// has elapsed with anything pending.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if self.pending.len() >= self.config.min_spots {
            return true;
        }
        !self.pending.is_empty()
            && (now - self.last_settled_at).to_std().unwrap_or_default() >= self.config.interval
    }

    /// Drain the oldest spots, up to the batch limit.
    pub fn take_batch(&mut self) -> Vec<PendingSpot> {
        let n = self.pending.len().min(self.config.max_batch_size);
        self.pending.drain(..n).collect()
    }

    /// Settle one batch: sell each spot through the trade port, splitting
    /// the base priority fee across the batch. Failures are requeued until
    /// the retry cap, then dropped with an error so nothing vanishes
    /// silently from the books.
    pub async fn settle_batch(
        &mut self,
        port: &dyn TradePort,
        ledger: &mut TradeLedger,
        wallet: &str,
        now: DateTime<Utc>,
    ) {
        let batch = self.take_batch();
        if batch.is_empty() {
            return;
        }
        let fee_per_spot =
            self.config.base_priority_fee_sol / Decimal::from(batch.len() as u64);
        let mut signatures = Vec::new();

        for spot in batch {
            let request = OrderRequest::sell_pct(
                wallet,
                &spot.mint,
                dec!(100),
                self.config.slippage_pct,
                fee_per_spot,
                Decimal::ZERO,
                &self.config.pool,
            );
            match port.submit_order(request).await {
                Ok(fill) => {
                    ledger.record_transaction(TransactionRecord {
                        kind: TxKind::Burn,
                        amount: self.config.spot_amount_sol,
                        fee: fee_per_spot,
                        signature: Some(fill.signature.clone()),
                        at: now,
                    });
                    signatures.push(fill.signature);
                }
                Err(e) if spot.retries < self.config.max_retries => {
                    warn!(mint = %spot.mint, retries = spot.retries, error = %e,
                        "spot settlement failed, requeueing");
                    self.pending.push_back(PendingSpot {
                        retries: spot.retries + 1,
                        ..spot
                    });
                }
                Err(e) => {
                    error!(mint = %spot.mint, error = %e,
                        "spot settlement failed after max retries, dropping");
                }
            }
        }

        self.last_settled_at = now;
        if !signatures.is_empty() {
            info!(count = signatures.len(), "settled rent spot batch");
            ledger.record_settlement(SettlementRecord {
                at: now,
                count: signatures.len(),
                signatures,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::execution::{ExecutionError, OrderFill};
    use crate::ports::mocks::MockTradePort;

    fn config(min_spots: usize, max_batch: usize) -> SettlementConfig {
        SettlementConfig {
            min_spots,
            max_batch_size: max_batch,
            ..SettlementConfig::default()
        }
    }

    fn fill(sig: &str) -> Result<OrderFill, ExecutionError> {
        Ok(OrderFill {
            signature: sig.to_string(),
            fill_price: None,
        })
    }

    #[test]
    fn not_due_when_empty() {
        let settlement = BatchSettlement::new(config(3, 20));
        assert!(!settlement.is_due(Utc::now()));
    }

    #[test]
    fn due_at_threshold() {
        let mut settlement = BatchSettlement::new(config(3, 20));
        let now = Utc::now();
        settlement.add_spot("A", "S1", now);
        settlement.add_spot("B", "S2", now);
        assert!(!settlement.is_due(now));
        settlement.add_spot("C", "S3", now);
        assert!(settlement.is_due(now));
    }

    #[test]
    fn due_after_interval_with_any_pending() {
        let mut settlement = BatchSettlement::new(SettlementConfig {
            min_spots: 5,
            interval: Duration::from_secs(3600),
            ..SettlementConfig::default()
        });
        let now = Utc::now();
        settlement.add_spot("A", "S1", now);
        assert!(!settlement.is_due(now));
        assert!(settlement.is_due(now + chrono::Duration::seconds(3601)));
    }

    #[test]
    fn batch_is_fifo_and_bounded() {
        let mut settlement = BatchSettlement::new(config(3, 3));
        let now = Utc::now();
        for mint in ["A", "B", "C", "D", "E"] {
            settlement.add_spot(mint, "SIG", now);
        }
        let first: Vec<_> = settlement.take_batch().into_iter().map(|s| s.mint).collect();
        assert_eq!(first, vec!["A", "B", "C"]);
        let second: Vec<_> = settlement.take_batch().into_iter().map(|s| s.mint).collect();
        assert_eq!(second, vec!["D", "E"]);
    }

    #[tokio::test]
    async fn settles_batch_and_records_ledger() {
        let mut settlement = BatchSettlement::new(config(2, 20));
        let mut ledger = TradeLedger::new();
        let now = Utc::now();
        settlement.add_spot("A", "S1", now);
        settlement.add_spot("B", "S2", now);

        let port = MockTradePort::new()
            .with_result(fill("BURN1"))
            .with_result(fill("BURN2"));
        settlement.settle_batch(&port, &mut ledger, "WALLET", now).await;

        assert_eq!(settlement.pending_count(), 0);
        assert_eq!(ledger.settlements().len(), 1);
        assert_eq!(ledger.settlements()[0].signatures, vec!["BURN1", "BURN2"]);
        // Two spot amounts returned, fee split across the batch.
        let s = ledger.summary();
        assert_eq!(s.total_returns, dec!(0.004));
        assert_eq!(s.total_costs, dec!(0.001));
    }

    #[tokio::test]
    async fn failed_spot_requeued_then_dropped() {
        let mut settlement = BatchSettlement::new(SettlementConfig {
            min_spots: 1,
            max_retries: 1,
            ..SettlementConfig::default()
        });
        let mut ledger = TradeLedger::new();
        let now = Utc::now();
        settlement.add_spot("A", "S1", now);

        let port = MockTradePort::new()
            .with_result(Err(ExecutionError::Api("down".to_string())))
            .with_result(Err(ExecutionError::Api("still down".to_string())));

        settlement.settle_batch(&port, &mut ledger, "WALLET", now).await;
        // First failure: requeued with retries = 1.
        assert_eq!(settlement.pending_count(), 1);

        settlement.settle_batch(&port, &mut ledger, "WALLET", now).await;
        // Second failure exceeds the cap: dropped.
        assert_eq!(settlement.pending_count(), 0);
        assert_eq!(ledger.settlements().len(), 0);
    }
}
