use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{error, info, warn};

use crate::adapters::pump_portal::stream::{StreamConnection, StreamEvent};
use crate::config::Config;
use crate::domain::events::{ConnectionStatus, NewTokenEvent, Notification, TradeUpdateEvent};
use crate::domain::filter::{Admission, EligibilityFilter};
use crate::domain::ledger::{LedgerSummary, TradeLedger, TransactionRecord, TxKind};
use crate::domain::positions::PositionBook;
use crate::domain::settlement::BatchSettlement;
use crate::ports::execution::{OrderRequest, TradePort};
use crate::ports::notify::Notifier;
use crate::ports::oracle::PriceOracle;

const SETTLEMENT_CHECK_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("feed failed permanently after exhausting reconnect attempts")]
    StreamFailed,
}

/// Mutable trading state, owned by the event loop. Events are processed
/// one at a time, so no two evaluations for the same mint can interleave.
struct SessionState {
    filter: EligibilityFilter,
    book: PositionBook,
    ledger: TradeLedger,
    settlement: BatchSettlement,
}

/// One bot run: stream in, decide, trade out. All state lives inside
/// `run()`; the session owns only its collaborators and the stop signal.
pub struct BotSession {
    config: Config,
    trade_port: Arc<dyn TradePort>,
    oracle: Arc<dyn PriceOracle>,
    notifier: Arc<dyn Notifier>,
    shutdown: Arc<Notify>,
}

impl BotSession {
    pub fn new(
        config: Config,
        trade_port: Arc<dyn TradePort>,
        oracle: Arc<dyn PriceOracle>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            trade_port,
            oracle,
            notifier,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Request a graceful stop: admission halts, in-flight work finishes,
    /// the stream is closed.
    pub fn stop_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    pub async fn run(&self) -> Result<LedgerSummary, SessionError> {
        let (stream, mut events) = StreamConnection::start(self.config.stream_config());
        let mut state = SessionState {
            filter: EligibilityFilter::new(self.config.filter_config()),
            book: PositionBook::new(self.config.tracker_config()),
            ledger: TradeLedger::new(),
            settlement: BatchSettlement::new(self.config.settlement_config()),
        };
        let mut accepting = true;
        let mut settlement_tick = tokio::time::interval(SETTLEMENT_CHECK_INTERVAL);
        settlement_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!(
            max_active = self.config.trading.max_active_tokens,
            trade_amount = %self.config.trading.trade_amount_sol,
            "session started"
        );

        let result = loop {
            tokio::select! {
                _ = self.shutdown.notified() => {
                    info!("shutdown requested, draining");
                    accepting = false;
                    stream.stop().await;
                }
                _ = settlement_tick.tick() => {
                    let now = Utc::now();
                    if state.settlement.is_due(now) {
                        state
                            .settlement
                            .settle_batch(
                                self.trade_port.as_ref(),
                                &mut state.ledger,
                                &self.config.trading.get_wallet_public_key(),
                                now,
                            )
                            .await;
                    }
                }
                event = events.recv() => {
                    match event {
                        Some(StreamEvent::Status { status, reconnect_count }) => {
                            self.notifier.notify(Notification::ConnectionStatus {
                                status,
                                reconnect_count,
                            });
                            match status {
                                ConnectionStatus::Failed => {
                                    error!("feed failed permanently");
                                    break Err(SessionError::StreamFailed);
                                }
                                ConnectionStatus::Disconnected => break Ok(()),
                                _ => {}
                            }
                        }
                        Some(StreamEvent::NewToken(event)) => {
                            if accepting {
                                self.handle_new_token(&stream, &mut state, event).await;
                            }
                        }
                        Some(StreamEvent::TradeUpdate(event)) => {
                            self.handle_trade_update(&stream, &mut state, event).await;
                        }
                        None => break Ok(()),
                    }
                }
            }
        };

        let summary = state.ledger.summary();
        info!(
            trades = summary.total_trades,
            profit = %summary.cumulative_profit,
            "session finished"
        );
        result.map(|_| summary)
    }

    async fn handle_new_token(
        &self,
        stream: &StreamConnection,
        state: &mut SessionState,
        event: NewTokenEvent,
    ) {
        self.notifier.notify(Notification::NewToken {
            mint: event.mint.clone(),
            market_cap_sol: event.market_cap_sol,
            initial_buy: event.initial_buy,
        });

        let now = Utc::now();
        if let Some(creator) = &event.creator {
            state.filter.creators.observe(&event.mint, creator, event.observed_at);
        }
        state
            .filter
            .creators
            .mark_survivors(now, self.config.monitoring.creator_success_secs);

        let rate = self.oracle.sol_usd().await.ok();
        let admission = state
            .filter
            .evaluate(&event, state.book.active_count(), rate);

        let priority = match admission {
            Admission::Admit { priority } => priority,
            Admission::Reject(reason) => {
                info!(mint = %event.mint, %reason, "launch rejected");
                stream.unsubscribe_token(&event.mint).await;
                return;
            }
        };

        let trading = &self.config.trading;
        let priority_fee = if priority {
            trading.priority_fee_sol * trading.trusted_priority_multiplier
        } else {
            trading.priority_fee_sol
        };
        let request = OrderRequest::buy(
            &trading.get_wallet_public_key(),
            &event.mint,
            trading.trade_amount_sol,
            trading.slippage_pct,
            priority_fee,
            trading.bribery_fee_sol,
            &self.config.portal.pool,
        );

        match self.submit_bounded(request).await {
            Ok(fill) => {
                state
                    .book
                    .on_buy_filled(&event.mint, fill.fill_price, event.market_cap_sol, now);
                state.ledger.record_transaction(TransactionRecord {
                    kind: TxKind::Buy,
                    amount: trading.trade_amount_sol,
                    fee: priority_fee + trading.bribery_fee_sol,
                    signature: Some(fill.signature),
                    at: now,
                });
                info!(mint = %event.mint, priority, "sniped");
                self.notifier.notify(Notification::Buy {
                    mint: event.mint.clone(),
                    price: fill.fill_price,
                    amount_sol: trading.trade_amount_sol,
                });
            }
            Err(e) => {
                // The mint stays marked as attempted; one shot per launch.
                warn!(mint = %event.mint, error = %e, "buy failed");
                stream.unsubscribe_token(&event.mint).await;
            }
        }
    }

    async fn handle_trade_update(
        &self,
        stream: &StreamConnection,
        state: &mut SessionState,
        event: TradeUpdateEvent,
    ) {
        if !state.book.is_active(&event.mint) {
            return;
        }
        self.notifier.notify(Notification::PriceUpdate {
            mint: event.mint.clone(),
            price: event.price,
            market_cap_sol: event.market_cap_sol,
        });

        let rate = self.oracle.sol_usd().await.ok();
        let Some(decision) =
            state
                .book
                .on_price_update(&event.mint, event.market_cap_sol, event.price, rate)
        else {
            return;
        };
        info!(mint = %event.mint, reason = %decision.reason, pct = %decision.sell_pct, "exiting");

        let trading = &self.config.trading;
        let request = OrderRequest::sell_pct(
            &trading.get_wallet_public_key(),
            &event.mint,
            decision.sell_pct,
            trading.slippage_pct,
            trading.priority_fee_sol,
            trading.bribery_fee_sol,
            &self.config.portal.pool,
        );

        let fill = match self.submit_bounded(request).await {
            Ok(fill) => fill,
            Err(e) => {
                // Leave the position open; the next update re-evaluates.
                warn!(mint = %event.mint, error = %e, "exit sell failed, will retry");
                return;
            }
        };

        let now = Utc::now();
        let proceeds = self.estimate_proceeds(state, &event.mint, decision.sell_pct, event.price);
        let completed = state
            .book
            .on_sell_completed(&event.mint, event.price, decision.sell_pct, now);

        state.ledger.record_transaction(TransactionRecord {
            kind: TxKind::Sell,
            amount: proceeds,
            fee: trading.priority_fee_sol + trading.bribery_fee_sol,
            signature: Some(fill.signature.clone()),
            at: now,
        });

        let profit = completed.as_ref().map(|t| t.pnl);
        if let Some(trade) = completed {
            state.ledger.record(trade);
            state.settlement.add_spot(&event.mint, &fill.signature, now);
            stream.unsubscribe_token(&event.mint).await;
            if state.settlement.is_due(now) {
                state
                    .settlement
                    .settle_batch(
                        self.trade_port.as_ref(),
                        &mut state.ledger,
                        &trading.get_wallet_public_key(),
                        now,
                    )
                    .await;
            }
        }

        self.notifier.notify(Notification::Sell {
            mint: event.mint,
            price: event.price,
            fraction_pct: decision.sell_pct,
            profit,
        });
    }

    /// SOL proceeds estimate for a partial or full sell, from the current
    /// position size scaled by the price move since entry.
    fn estimate_proceeds(
        &self,
        state: &SessionState,
        mint: &str,
        sell_pct: Decimal,
        price: Decimal,
    ) -> Decimal {
        let Some(tracker) = state.book.tracker(mint) else {
            return Decimal::ZERO;
        };
        let sold = tracker.size_sol * sell_pct / dec!(100);
        match tracker.entry_price {
            Some(entry) if entry > Decimal::ZERO => sold * price / entry,
            _ => sold,
        }
    }

    async fn submit_bounded(
        &self,
        request: OrderRequest,
    ) -> Result<crate::ports::execution::OrderFill, crate::ports::execution::ExecutionError> {
        let budget = Duration::from_secs(self.config.portal.request_timeout_secs.max(1));
        tokio::time::timeout(budget, self.trade_port.submit_order(request))
            .await
            .map_err(|_| crate::ports::execution::ExecutionError::Timeout(budget))?
    }
}
