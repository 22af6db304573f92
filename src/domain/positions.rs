use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, error};

use crate::domain::ledger::CompletedTrade;
use crate::domain::tracker::{ExitDecision, TokenTracker, TrackerConfig};

/// Remainder left behind by a near-full (99%) exit. Kept for unrealized
/// P&L visibility; never re-traded by the bot.
#[derive(Debug, Clone, PartialEq)]
pub struct DustPosition {
    pub mint: String,
    pub size_sol: Decimal,
    pub last_price: Decimal,
    pub closed_at: DateTime<Utc>,
}

/// Owns every active tracker, keyed by mint. All mutations to a position
/// flow through this book, so no two evaluations for one mint can race.
#[derive(Debug)]
pub struct PositionBook {
    config: TrackerConfig,
    active: HashMap<String, TokenTracker>,
    dust: HashMap<String, DustPosition>,
}

impl PositionBook {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            active: HashMap::new(),
            dust: HashMap::new(),
        }
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn is_active(&self, mint: &str) -> bool {
        self.active.contains_key(mint)
    }

    pub fn tracker(&self, mint: &str) -> Option<&TokenTracker> {
        self.active.get(mint)
    }

    pub fn dust(&self) -> impl Iterator<Item = &DustPosition> {
        self.dust.values()
    }

    /// Open a position after a confirmed buy fill. The fill endpoint does
    /// not report a price, so `fill_price` may be absent; the first trade
    /// update anchors the entry in that case.
    pub fn on_buy_filled(
        &mut self,
        mint: &str,
        fill_price: Option<Decimal>,
        market_cap_sol: Decimal,
        at: DateTime<Utc>,
    ) {
        let tracker = TokenTracker::new(
            mint.to_string(),
            fill_price,
            market_cap_sol,
            at,
            self.config.clone(),
        );
        self.active.insert(mint.to_string(), tracker);
    }

    /// Route a price update to its tracker. Updates for unknown mints are
    /// dropped (the subscription may outlive the position briefly).
    pub fn on_price_update(
        &mut self,
        mint: &str,
        market_cap_sol: Decimal,
        price: Decimal,
        sol_usd: Option<Decimal>,
    ) -> Option<ExitDecision> {
        if let Some(dust) = self.dust.get_mut(mint) {
            dust.last_price = price;
        }
        match self.active.get_mut(mint) {
            Some(tracker) => tracker.update(market_cap_sol, price, sol_usd),
            None => {
                debug!(mint, "price update for untracked mint, dropping");
                None
            }
        }
    }

    /// Apply a confirmed sell. A >= 99% sell closes the position: the
    /// tracker is removed, the remainder becomes dust and a CompletedTrade
    /// is returned. A partial sell shrinks the size and advances the
    /// profit stage.
    pub fn on_sell_completed(
        &mut self,
        mint: &str,
        exit_price: Decimal,
        sell_pct: Decimal,
        at: DateTime<Utc>,
    ) -> Option<CompletedTrade> {
        let full_exit = sell_pct >= dec!(99);

        if full_exit {
            let Some(tracker) = self.active.remove(mint) else {
                error!(mint, "sell completed for a mint with no open position");
                return None;
            };
            let remainder = tracker.size_sol * (Decimal::ONE - sell_pct / dec!(100));
            self.dust.insert(
                mint.to_string(),
                DustPosition {
                    mint: mint.to_string(),
                    size_sol: remainder,
                    last_price: exit_price,
                    closed_at: at,
                },
            );
            // Same arithmetic as the loss trigger: price move times size.
            let pnl = match tracker.entry_price {
                Some(entry) if entry > Decimal::ZERO => {
                    (exit_price - entry) * tracker.size_sol
                }
                _ => Decimal::ZERO,
            };
            return Some(CompletedTrade {
                mint: mint.to_string(),
                entry_price: tracker.entry_price,
                exit_price,
                entry_time: tracker.opened_at,
                exit_time: at,
                pnl,
                hold_secs: (at - tracker.opened_at).num_seconds(),
            });
        }

        match self.active.get_mut(mint) {
            Some(tracker) => {
                tracker.size_sol *= Decimal::ONE - sell_pct / dec!(100);
                tracker.advance_stage();
                None
            }
            None => {
                error!(mint, "partial sell completed for a mint with no open position");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tracker::ProfitStage;

    fn book() -> PositionBook {
        PositionBook::new(TrackerConfig {
            trade_amount_sol: dec!(10),
            ..TrackerConfig::default()
        })
    }

    #[test]
    fn buy_fill_opens_position() {
        let mut b = book();
        b.on_buy_filled("M1", Some(dec!(1)), dec!(100), Utc::now());
        assert!(b.is_active("M1"));
        assert_eq!(b.active_count(), 1);
    }

    #[test]
    fn unknown_mint_update_is_noop() {
        let mut b = book();
        assert!(b
            .on_price_update("GHOST", dec!(100), dec!(1), None)
            .is_none());
    }

    #[test]
    fn full_exit_emits_completed_trade_and_dust() {
        let mut b = book();
        let t0 = Utc::now();
        b.on_buy_filled("M1", Some(dec!(1)), dec!(100), t0);

        let trade = b
            .on_sell_completed("M1", dec!(1.5), dec!(99), t0)
            .expect("full exit should emit a trade");
        // +50% on a 10 SOL position.
        assert_eq!(trade.pnl, dec!(5.0));
        assert!(!b.is_active("M1"));

        let dust: Vec<_> = b.dust().collect();
        assert_eq!(dust.len(), 1);
        assert_eq!(dust[0].size_sol, dec!(0.10));
    }

    #[test]
    fn full_exit_pnl_uses_absolute_price_move() {
        let mut b = book();
        let t0 = Utc::now();
        b.on_buy_filled("M1", Some(dec!(2.0)), dec!(100), t0);

        let trade = b.on_sell_completed("M1", dec!(1.7), dec!(99), t0).unwrap();
        // (1.7 - 2.0) * 10 SOL.
        assert_eq!(trade.pnl, dec!(-3.0));
    }

    #[test]
    fn partial_sell_halves_size_and_advances_stage() {
        let mut b = book();
        b.on_buy_filled("M1", Some(dec!(1)), dec!(100), Utc::now());

        assert!(b.on_sell_completed("M1", dec!(2), dec!(50), Utc::now()).is_none());
        let tracker = b.tracker("M1").unwrap();
        assert_eq!(tracker.size_sol, dec!(5.0));
        assert_eq!(tracker.stage, ProfitStage::AwaitingSecondSpike);
        assert!(b.is_active("M1"));
    }

    #[test]
    fn sell_for_unknown_mint_returns_none() {
        let mut b = book();
        assert!(b
            .on_sell_completed("GHOST", dec!(1), dec!(99), Utc::now())
            .is_none());
    }
}
