use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// A fully closed position, appended to the ledger once.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedTrade {
    pub mint: String,
    pub entry_price: Option<Decimal>,
    pub exit_price: Decimal,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub pnl: Decimal,
    pub hold_secs: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxKind {
    Buy,
    Sell,
    Burn,
}

/// Raw cash-flow record: buys add amount+fee to costs, sells and burns
/// add amount to returns and fee to costs.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub kind: TxKind,
    pub amount: Decimal,
    pub fee: Decimal,
    pub signature: Option<String>,
    pub at: DateTime<Utc>,
}

/// One settled batch of rent spots.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementRecord {
    pub at: DateTime<Utc>,
    pub count: usize,
    pub signatures: Vec<String>,
}

/// O(1) snapshot of the ledger aggregates.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerSummary {
    pub total_trades: u64,
    pub successful_trades: u64,
    pub success_rate_pct: Decimal,
    pub cumulative_profit: Decimal,
    pub avg_profit: Decimal,
    pub best_trade: Option<Decimal>,
    pub worst_trade: Option<Decimal>,
    pub peak_equity: Decimal,
    pub current_drawdown_pct: Decimal,
    pub max_drawdown_pct: Decimal,
    pub total_costs: Decimal,
    pub total_returns: Decimal,
    pub roi_pct: Decimal,
}

/// Append-only trade history with incrementally maintained aggregates.
/// `summary()` never rescans the trade list.
#[derive(Debug, Default)]
pub struct TradeLedger {
    trades: Vec<CompletedTrade>,
    transactions: Vec<TransactionRecord>,
    settlements: Vec<SettlementRecord>,
    total_trades: u64,
    successful_trades: u64,
    cumulative_profit: Decimal,
    best_trade: Option<Decimal>,
    worst_trade: Option<Decimal>,
    peak_equity: Decimal,
    current_drawdown_pct: Decimal,
    max_drawdown_pct: Decimal,
    total_costs: Decimal,
    total_returns: Decimal,
}

impl TradeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, trade: CompletedTrade) {
        self.total_trades += 1;
        if trade.pnl > Decimal::ZERO {
            self.successful_trades += 1;
        }
        self.cumulative_profit += trade.pnl;

        self.best_trade = Some(match self.best_trade {
            Some(best) => best.max(trade.pnl),
            None => trade.pnl,
        });
        self.worst_trade = Some(match self.worst_trade {
            Some(worst) => worst.min(trade.pnl),
            None => trade.pnl,
        });

        // Peak first, then drawdown against the updated peak.
        if self.cumulative_profit > self.peak_equity {
            self.peak_equity = self.cumulative_profit;
        }
        self.current_drawdown_pct = if self.peak_equity > Decimal::ZERO {
            (self.peak_equity - self.cumulative_profit) / self.peak_equity * dec!(100)
        } else {
            Decimal::ZERO
        };
        if self.current_drawdown_pct > self.max_drawdown_pct {
            self.max_drawdown_pct = self.current_drawdown_pct;
        }

        self.trades.push(trade);
    }

    pub fn record_transaction(&mut self, tx: TransactionRecord) {
        match tx.kind {
            TxKind::Buy => {
                self.total_costs += tx.amount + tx.fee;
            }
            TxKind::Sell | TxKind::Burn => {
                self.total_returns += tx.amount;
                self.total_costs += tx.fee;
            }
        }
        self.transactions.push(tx);
    }

    pub fn record_settlement(&mut self, record: SettlementRecord) {
        self.settlements.push(record);
    }

    pub fn trades(&self) -> &[CompletedTrade] {
        &self.trades
    }

    pub fn settlements(&self) -> &[SettlementRecord] {
        &self.settlements
    }

    pub fn summary(&self) -> LedgerSummary {
        let success_rate_pct = if self.total_trades > 0 {
            Decimal::from(self.successful_trades) / Decimal::from(self.total_trades) * dec!(100)
        } else {
            Decimal::ZERO
        };
        let avg_profit = if self.total_trades > 0 {
            self.cumulative_profit / Decimal::from(self.total_trades)
        } else {
            Decimal::ZERO
        };
        let net = self.total_returns - self.total_costs;
        let roi_pct = if self.total_costs > Decimal::ZERO {
            net / self.total_costs * dec!(100)
        } else {
            Decimal::ZERO
        };

        LedgerSummary {
            total_trades: self.total_trades,
            successful_trades: self.successful_trades,
            success_rate_pct,
            cumulative_profit: self.cumulative_profit,
            avg_profit,
            best_trade: self.best_trade,
            worst_trade: self.worst_trade,
            peak_equity: self.peak_equity,
            current_drawdown_pct: self.current_drawdown_pct,
            max_drawdown_pct: self.max_drawdown_pct,
            total_costs: self.total_costs,
            total_returns: self.total_returns,
            roi_pct,
        }
    }
}
