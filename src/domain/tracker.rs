use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Samples kept in the rolling price history.
pub const PRICE_HISTORY_CAP: usize = 30;
/// Trailing samples used for the volatility estimate.
pub const VOLATILITY_WINDOW: usize = 10;

/// Profit-taking progression for a position. Advanced once per partial
/// sell; `LettingItRide` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfitStage {
    AwaitingFirstSpike,
    AwaitingSecondSpike,
    AwaitingThirdSpike,
    AwaitingFourthSpike,
    LettingItRide,
}

impl ProfitStage {
    pub fn next(self) -> Self {
        match self {
            ProfitStage::AwaitingFirstSpike => ProfitStage::AwaitingSecondSpike,
            ProfitStage::AwaitingSecondSpike => ProfitStage::AwaitingThirdSpike,
            ProfitStage::AwaitingThirdSpike => ProfitStage::AwaitingFourthSpike,
            ProfitStage::AwaitingFourthSpike => ProfitStage::LettingItRide,
            ProfitStage::LettingItRide => ProfitStage::LettingItRide,
        }
    }
}

/// Why a tracker decided to exit (fully or partially).
#[derive(Debug, Clone, PartialEq)]
pub enum ExitReason {
    StopLoss { loss: Decimal },
    TrailingStop,
    Buyback { multiple: Decimal },
    TargetReached { usd_mcap: Decimal },
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::StopLoss { loss } => write!(f, "stop loss hit ({} SOL down)", loss),
            ExitReason::TrailingStop => write!(f, "trailing stop hit"),
            ExitReason::Buyback { multiple } => write!(f, "buyback point ({}x entry)", multiple),
            ExitReason::TargetReached { usd_mcap } => {
                write!(f, "target reached (${} mcap)", usd_mcap)
            }
        }
    }
}

/// A single exit instruction emitted by `TokenTracker::update`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitDecision {
    /// Percentage of the position to sell (99 = near-full, 50 = half).
    pub sell_pct: Decimal,
    pub reason: ExitReason,
}

impl ExitDecision {
    pub fn is_full_exit(&self) -> bool {
        self.sell_pct >= dec!(99)
    }
}

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// SOL spent on the initial buy.
    pub trade_amount_sol: Decimal,
    /// Hard loss cap in SOL; breach forces a near-full exit.
    pub stop_loss_sol: Decimal,
    /// Take half off the table at 2x entry mcap.
    pub auto_buyback: bool,
    /// USD market cap that triggers the final sell.
    pub sell_mcap_usd: Decimal,
    pub min_trailing_stop_pct: Decimal,
    pub max_trailing_stop_pct: Decimal,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            trade_amount_sol: dec!(0.01),
            stop_loss_sol: dec!(0.1),
            auto_buyback: true,
            sell_mcap_usd: dec!(1_000_000),
            min_trailing_stop_pct: dec!(5),
            max_trailing_stop_pct: dec!(20),
        }
    }
}

/// Per-position state machine. One tracker per held mint; `update` is the
/// only mutation path while the position is open and returns at most one
/// exit decision, checked in capital-preservation-first order.
#[derive(Debug, Clone)]
pub struct TokenTracker {
    pub mint: String,
    pub entry_price: Option<Decimal>,
    pub entry_mcap_sol: Decimal,
    pub size_sol: Decimal,
    pub opened_at: DateTime<Utc>,
    pub stage: ProfitStage,
    /// Loss if the position were closed at the latest price: the absolute
    /// price drop from entry times the trade size. Recomputed (not
    /// accumulated) on every update.
    pub cumulative_loss: Decimal,
    peak_mcap_sol: Decimal,
    price_history: VecDeque<Decimal>,
    trailing_stop_price: Option<Decimal>,
    config: TrackerConfig,
}

impl TokenTracker {
    pub fn new(
        mint: String,
        entry_price: Option<Decimal>,
        entry_mcap_sol: Decimal,
        opened_at: DateTime<Utc>,
        config: TrackerConfig,
    ) -> Self {
        let size_sol = config.trade_amount_sol;
        Self {
            mint,
            entry_price,
            entry_mcap_sol,
            size_sol,
            opened_at,
            stage: ProfitStage::AwaitingFirstSpike,
            cumulative_loss: Decimal::ZERO,
            peak_mcap_sol: entry_mcap_sol,
            price_history: VecDeque::with_capacity(PRICE_HISTORY_CAP),
            trailing_stop_price: None,
            config,
        }
    }

    pub fn peak_mcap_sol(&self) -> Decimal {
        self.peak_mcap_sol
    }

    pub fn trailing_stop_price(&self) -> Option<Decimal> {
        self.trailing_stop_price
    }

    pub fn sample_count(&self) -> usize {
        self.price_history.len()
    }

    /// Feed one trade update into the tracker. `sol_usd` may be absent
    /// (oracle down); the USD target check is skipped in that case.
    pub fn update(
        &mut self,
        market_cap_sol: Decimal,
        price: Decimal,
        sol_usd: Option<Decimal>,
    ) -> Option<ExitDecision> {
        if self.price_history.len() == PRICE_HISTORY_CAP {
            self.price_history.pop_front();
        }
        self.price_history.push_back(price);

        let peak_advanced = market_cap_sol > self.peak_mcap_sol;
        if peak_advanced {
            self.peak_mcap_sol = market_cap_sol;
        }

        // The fill endpoint does not report a price, so the first observed
        // trade after the buy anchors the entry.
        if self.entry_price.is_none() && price > Decimal::ZERO {
            self.entry_price = Some(price);
        }

        if let Some(entry) = self.entry_price {
            self.cumulative_loss = ((entry - price) * self.size_sol).max(Decimal::ZERO);
            if self.cumulative_loss >= self.config.stop_loss_sol {
                return Some(ExitDecision {
                    sell_pct: dec!(99),
                    reason: ExitReason::StopLoss {
                        loss: self.cumulative_loss,
                    },
                });
            }
        }

        if peak_advanced && self.entry_price.is_some() {
            self.ratchet_trailing_stop(price);
        }

        if let Some(stop) = self.trailing_stop_price {
            if price <= stop {
                return Some(ExitDecision {
                    sell_pct: dec!(99),
                    reason: ExitReason::TrailingStop,
                });
            }
        }

        if self.config.auto_buyback
            && self.stage == ProfitStage::AwaitingFirstSpike
            && self.entry_mcap_sol > Decimal::ZERO
            && market_cap_sol >= self.entry_mcap_sol * dec!(2)
        {
            return Some(ExitDecision {
                sell_pct: dec!(50),
                reason: ExitReason::Buyback {
                    multiple: market_cap_sol / self.entry_mcap_sol,
                },
            });
        }

        if let Some(rate) = sol_usd {
            let usd_mcap = market_cap_sol * rate;
            if usd_mcap >= self.config.sell_mcap_usd {
                return Some(ExitDecision {
                    sell_pct: dec!(99),
                    reason: ExitReason::TargetReached { usd_mcap },
                });
            }
        }

        None
    }

    /// Advance the profit stage after a completed partial sell.
    pub fn advance_stage(&mut self) {
        self.stage = self.stage.next();
    }

    /// Recompute the trailing stop from recent volatility. The stop only
    /// ever ratchets upward; a lower candidate is discarded.
    fn ratchet_trailing_stop(&mut self, price: Decimal) {
        if self.price_history.len() < VOLATILITY_WINDOW {
            return;
        }
        let window: Vec<Decimal> = self
            .price_history
            .iter()
            .rev()
            .take(VOLATILITY_WINDOW)
            .copied()
            .collect();

        let mut sum = Decimal::ZERO;
        let mut count = 0u32;
        for pair in window.windows(2) {
            let (newer, older) = (pair[0], pair[1]);
            if older > Decimal::ZERO {
                sum += ((newer - older) / older * dec!(100)).abs();
                count += 1;
            }
        }
        if count == 0 {
            return;
        }
        let volatility = sum / Decimal::from(count);
        let stop_pct = (volatility * dec!(2))
            .clamp(self.config.min_trailing_stop_pct, self.config.max_trailing_stop_pct);
        let candidate = price * (Decimal::ONE - stop_pct / dec!(100));

        match self.trailing_stop_price {
            Some(current) if candidate <= current => {}
            _ => self.trailing_stop_price = Some(candidate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> TokenTracker {
        TokenTracker::new(
            "MINT1".to_string(),
            Some(dec!(1.0)),
            dec!(100),
            Utc::now(),
            TrackerConfig {
                trade_amount_sol: dec!(10),
                stop_loss_sol: dec!(2),
                ..TrackerConfig::default()
            },
        )
    }

    #[test]
    fn entry_price_set_from_first_update_when_absent() {
        let mut t = TokenTracker::new(
            "MINT1".to_string(),
            None,
            dec!(100),
            Utc::now(),
            TrackerConfig::default(),
        );
        assert!(t.entry_price.is_none());
        t.update(dec!(100), dec!(0.5), None);
        assert_eq!(t.entry_price, Some(dec!(0.5)));
    }

    #[test]
    fn stop_loss_fires_when_loss_reaches_threshold() {
        let mut t = tracker();
        // entry 1.0, size 10 SOL: price 0.7 => loss 3.0 >= 2.0
        let decision = t.update(dec!(70), dec!(0.7), None).unwrap();
        assert!(decision.is_full_exit());
        assert!(matches!(decision.reason, ExitReason::StopLoss { loss } if loss == dec!(3.0)));
    }

    #[test]
    fn stop_loss_scales_with_absolute_price_drop() {
        // Entry away from 1.0: the trigger is (entry - price) * size, not
        // a fractional return. Entry 2.0, size 10, stop 2.0: price 1.7 is
        // a 3.0 SOL loss and must exit.
        let mut t = TokenTracker::new(
            "MINT1".to_string(),
            Some(dec!(2.0)),
            dec!(100),
            Utc::now(),
            TrackerConfig {
                trade_amount_sol: dec!(10),
                stop_loss_sol: dec!(2),
                ..TrackerConfig::default()
            },
        );
        let decision = t.update(dec!(85), dec!(1.7), None).unwrap();
        assert!(decision.is_full_exit());
        assert!(matches!(decision.reason, ExitReason::StopLoss { loss } if loss == dec!(3.0)));
    }

    #[test]
    fn stop_loss_outranks_usd_target() {
        // Both conditions true in one update: the loss check wins.
        let mut t = TokenTracker::new(
            "MINT1".to_string(),
            Some(dec!(1.0)),
            dec!(100),
            Utc::now(),
            TrackerConfig {
                trade_amount_sol: dec!(10),
                stop_loss_sol: dec!(2),
                auto_buyback: false,
                ..TrackerConfig::default()
            },
        );
        // 5000 SOL mcap * $256 = $1.28M over the $1M target, while price
        // 0.7 is a 3 SOL loss over the 2 SOL stop.
        let decision = t.update(dec!(5000), dec!(0.7), Some(dec!(256))).unwrap();
        assert!(matches!(decision.reason, ExitReason::StopLoss { .. }));
    }

    #[test]
    fn stop_loss_is_snapshot_not_accumulated() {
        let mut t = tracker();
        // Two updates at -9% each must not sum to a breach.
        assert!(t.update(dec!(91), dec!(0.91), None).is_none());
        assert!(t.update(dec!(91), dec!(0.91), None).is_none());
        assert_eq!(t.cumulative_loss, dec!(0.9));
    }

    #[test]
    fn peak_mcap_is_monotonic() {
        let mut t = tracker();
        t.update(dec!(150), dec!(1.5), None);
        assert_eq!(t.peak_mcap_sol(), dec!(150));
        t.update(dec!(120), dec!(1.2), None);
        assert_eq!(t.peak_mcap_sol(), dec!(150));
    }

    #[test]
    fn trailing_stop_only_ratchets_up() {
        let mut t = tracker();
        // Climb steadily so each update advances the peak and has >= 10 samples.
        let mut price = dec!(1.0);
        for _ in 0..12 {
            price += dec!(0.05);
            t.update(price * dec!(100), price, None);
        }
        let stop_after_climb = t.trailing_stop_price().unwrap();
        // A dip (peak not advanced) must leave the stop untouched.
        t.update(dec!(100), stop_after_climb + dec!(0.001), None);
        assert_eq!(t.trailing_stop_price().unwrap(), stop_after_climb);
    }

    #[test]
    fn trailing_stop_exit_fires_on_breach() {
        let mut t = tracker();
        let mut price = dec!(1.0);
        for _ in 0..12 {
            price += dec!(0.05);
            t.update(price * dec!(100), price, None);
        }
        let stop = t.trailing_stop_price().unwrap();
        let decision = t.update(stop * dec!(100), stop, None).unwrap();
        assert_eq!(decision.reason, ExitReason::TrailingStop);
        assert!(decision.is_full_exit());
    }

    #[test]
    fn buyback_fires_at_double_entry_mcap() {
        let mut t = tracker();
        let decision = t.update(dec!(200), dec!(2.0), None).unwrap();
        assert_eq!(decision.sell_pct, dec!(50));
        assert!(matches!(decision.reason, ExitReason::Buyback { multiple } if multiple == dec!(2)));
    }

    #[test]
    fn buyback_only_fires_once() {
        let mut t = tracker();
        t.update(dec!(200), dec!(2.0), None);
        t.advance_stage();
        let decision = t.update(dec!(210), dec!(2.1), None);
        // Stage has advanced; 2x check no longer applies.
        assert!(decision.is_none() || !matches!(
            decision.unwrap().reason,
            ExitReason::Buyback { .. }
        ));
    }

    #[test]
    fn usd_target_fires_with_oracle_rate() {
        let mut t = TokenTracker::new(
            "MINT1".to_string(),
            Some(dec!(1.0)),
            dec!(100),
            Utc::now(),
            TrackerConfig {
                auto_buyback: false,
                ..TrackerConfig::default()
            },
        );
        // 4000 SOL mcap * $256 = $1,024,000 >= $1M
        let decision = t.update(dec!(4000), dec!(1.1), Some(dec!(256))).unwrap();
        assert!(matches!(decision.reason, ExitReason::TargetReached { .. }));
    }

    #[test]
    fn usd_target_skipped_without_oracle() {
        let mut t = TokenTracker::new(
            "MINT1".to_string(),
            Some(dec!(1.0)),
            dec!(100),
            Utc::now(),
            TrackerConfig {
                auto_buyback: false,
                ..TrackerConfig::default()
            },
        );
        assert!(t.update(dec!(4000), dec!(1.1), None).is_none());
    }

    #[test]
    fn history_is_bounded() {
        let mut t = tracker();
        for i in 0..100 {
            t.update(dec!(100), dec!(1) + Decimal::from(i) / dec!(1000), None);
        }
        assert_eq!(t.sample_count(), PRICE_HISTORY_CAP);
    }

    #[test]
    fn stage_progression_is_terminal() {
        let mut s = ProfitStage::AwaitingFirstSpike;
        for _ in 0..10 {
            s = s.next();
        }
        assert_eq!(s, ProfitStage::LettingItRide);
    }
}
