use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::events::NewTokenEvent;

#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Minimum USD market cap for admission.
    pub min_mcap_usd: Decimal,
    /// Hard cap on concurrently tracked positions.
    pub max_active_tokens: usize,
    /// Creator success rate at or above which buys get priority fees.
    pub trusted_creator_rate: Decimal,
    /// Seconds a token must survive to count as a creator success.
    pub creator_success_secs: i64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_mcap_usd: dec!(100_000),
            max_active_tokens: 30,
            trusted_creator_rate: dec!(0.30),
            creator_success_secs: 10,
        }
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    /// Buy it. `priority` scales the priority fee, nothing else.
    Admit { priority: bool },
    Reject(RejectReason),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    Duplicate,
    McapTooLow { usd: Decimal, min: Decimal },
    Capacity { active: usize, max: usize },
    OracleUnavailable,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::Duplicate => write!(f, "already attempted"),
            RejectReason::McapTooLow { usd, min } => {
                write!(f, "mcap ${} below minimum ${}", usd.round_dp(0), min)
            }
            RejectReason::Capacity { active, max } => {
                write!(f, "at capacity ({}/{} active)", active, max)
            }
            RejectReason::OracleUnavailable => write!(f, "no SOL/USD rate available"),
        }
    }
}

#[derive(Debug, Default)]
struct CreatorStats {
    tokens_seen: u32,
    successes: u32,
}

/// Per-creator track record. A token counts as a success once it has
/// survived `creator_success_secs` after first sighting.
#[derive(Debug, Default)]
pub struct CreatorBook {
    stats: HashMap<String, CreatorStats>,
    // mint -> (creator, first seen, already counted)
    watch: HashMap<String, (String, DateTime<Utc>, bool)>,
}

impl CreatorBook {
    pub fn observe(&mut self, mint: &str, creator: &str, at: DateTime<Utc>) {
        if self.watch.contains_key(mint) {
            return;
        }
        self.stats
            .entry(creator.to_string())
            .or_default()
            .tokens_seen += 1;
        self.watch
            .insert(mint.to_string(), (creator.to_string(), at, false));
    }

    /// Credit creators whose tokens have outlived the survival threshold.
    pub fn mark_survivors(&mut self, now: DateTime<Utc>, threshold_secs: i64) {
        let threshold = Duration::seconds(threshold_secs);
        for (creator, seen_at, counted) in self.watch.values_mut() {
            if !*counted && now - *seen_at >= threshold {
                *counted = true;
                if let Some(stats) = self.stats.get_mut(creator) {
                    stats.successes += 1;
                }
            }
        }
    }

    pub fn success_rate(&self, creator: &str) -> Option<Decimal> {
        let stats = self.stats.get(creator)?;
        if stats.tokens_seen == 0 {
            return None;
        }
        Some(Decimal::from(stats.successes) / Decimal::from(stats.tokens_seen))
    }

    pub fn is_trusted(&self, creator: &str, min_rate: Decimal) -> bool {
        self.success_rate(creator)
            .map(|rate| rate >= min_rate)
            .unwrap_or(false)
    }
}

/// Ordered, short-circuiting admission filter. Every mint is marked as
/// attempted exactly once, whatever the outcome, so a rejected or failed
/// mint is never retried.
#[derive(Debug)]
pub struct EligibilityFilter {
    config: FilterConfig,
    attempted: HashSet<String>,
    pub creators: CreatorBook,
}

impl EligibilityFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self {
            config,
            attempted: HashSet::new(),
            creators: CreatorBook::default(),
        }
    }

    pub fn attempted_count(&self) -> usize {
        self.attempted.len()
    }

    /// Evaluate one launch. `sol_usd` is the oracle rate; `None` means the
    /// rate is unavailable, which rejects rather than guessing a threshold.
    pub fn evaluate(
        &mut self,
        event: &NewTokenEvent,
        active_count: usize,
        sol_usd: Option<Decimal>,
    ) -> Admission {
        if !self.attempted.insert(event.mint.clone()) {
            return Admission::Reject(RejectReason::Duplicate);
        }

        let rate = match sol_usd {
            Some(rate) if rate > Decimal::ZERO => rate,
            _ => return Admission::Reject(RejectReason::OracleUnavailable),
        };

        let usd = event.market_cap_sol * rate;
        if usd < self.config.min_mcap_usd {
            return Admission::Reject(RejectReason::McapTooLow {
                usd,
                min: self.config.min_mcap_usd,
            });
        }

        if active_count >= self.config.max_active_tokens {
            return Admission::Reject(RejectReason::Capacity {
                active: active_count,
                max: self.config.max_active_tokens,
            });
        }

        let priority = event
            .creator
            .as_deref()
            .map(|c| self.creators.is_trusted(c, self.config.trusted_creator_rate))
            .unwrap_or(false);

        Admission::Admit { priority }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn launch(mint: &str, mcap_sol: Decimal) -> NewTokenEvent {
        NewTokenEvent {
            mint: mint.to_string(),
            name: "Test".to_string(),
            symbol: "TST".to_string(),
            market_cap_sol: mcap_sol,
            initial_buy: dec!(1),
            creator: Some("CREATOR1".to_string()),
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn admits_eligible_launch() {
        let mut filter = EligibilityFilter::new(FilterConfig::default());
        // 500 SOL * $256 = $128,000 >= $100,000
        let result = filter.evaluate(&launch("M1", dec!(500)), 0, Some(dec!(256)));
        assert_eq!(result, Admission::Admit { priority: false });
    }

    #[test]
    fn duplicate_mint_rejected_even_if_first_attempt_was_rejected() {
        let mut filter = EligibilityFilter::new(FilterConfig::default());
        let low = launch("M1", dec!(10));
        assert!(matches!(
            filter.evaluate(&low, 0, Some(dec!(256))),
            Admission::Reject(RejectReason::McapTooLow { .. })
        ));
        // Same mint, now with a healthy mcap: still rejected as duplicate.
        assert_eq!(
            filter.evaluate(&launch("M1", dec!(500)), 0, Some(dec!(256))),
            Admission::Reject(RejectReason::Duplicate)
        );
    }

    #[test]
    fn missing_oracle_rate_rejects() {
        let mut filter = EligibilityFilter::new(FilterConfig::default());
        assert_eq!(
            filter.evaluate(&launch("M1", dec!(500)), 0, None),
            Admission::Reject(RejectReason::OracleUnavailable)
        );
    }

    #[test]
    fn capacity_rejects_at_limit() {
        let mut filter = EligibilityFilter::new(FilterConfig {
            max_active_tokens: 2,
            ..FilterConfig::default()
        });
        assert!(matches!(
            filter.evaluate(&launch("M1", dec!(500)), 2, Some(dec!(256))),
            Admission::Reject(RejectReason::Capacity { active: 2, max: 2 })
        ));
    }

    #[test]
    fn trusted_creator_gets_priority() {
        let mut filter = EligibilityFilter::new(FilterConfig::default());
        let t0 = Utc::now();
        filter.creators.observe("OLD1", "CREATOR1", t0);
        filter
            .creators
            .mark_survivors(t0 + Duration::seconds(15), 10);
        assert!(filter.creators.is_trusted("CREATOR1", dec!(0.30)));

        let result = filter.evaluate(&launch("M1", dec!(500)), 0, Some(dec!(256)));
        assert_eq!(result, Admission::Admit { priority: true });
    }

    #[test]
    fn unknown_creator_is_not_trusted() {
        let book = CreatorBook::default();
        assert!(!book.is_trusted("NOBODY", dec!(0.30)));
    }

    #[test]
    fn survivors_counted_once() {
        let mut book = CreatorBook::default();
        let t0 = Utc::now();
        book.observe("M1", "C1", t0);
        book.observe("M2", "C1", t0);
        book.mark_survivors(t0 + Duration::seconds(11), 10);
        book.mark_survivors(t0 + Duration::seconds(22), 10);
        // Two tokens, both survived, counted once each: rate 1.0.
        assert_eq!(book.success_rate("C1"), Some(dec!(1)));
    }
}
