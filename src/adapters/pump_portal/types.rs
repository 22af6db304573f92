use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::events::{NewTokenEvent, TradeUpdateEvent};

/// A token creation message as the portal emits it. Every field is
/// defaulted; the feed omits fields without warning.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTokenMessage {
    #[serde(default)]
    pub mint: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default, rename = "marketCapSol")]
    pub market_cap_sol: Decimal,
    #[serde(default, rename = "initialBuy")]
    pub initial_buy: Decimal,
    #[serde(default, rename = "traderPublicKey")]
    pub creator: Option<String>,
}

impl NewTokenMessage {
    pub fn into_event(self, observed_at: DateTime<Utc>) -> NewTokenEvent {
        NewTokenEvent {
            mint: self.mint,
            name: self.name,
            symbol: self.symbol,
            market_cap_sol: self.market_cap_sol,
            initial_buy: self.initial_buy,
            creator: self.creator,
            observed_at,
        }
    }
}

/// A trade message for a subscribed token. Price may be explicit or
/// derivable from the bonding curve reserves.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TradeMessage {
    #[serde(default)]
    pub mint: String,
    #[serde(default, rename = "txType")]
    pub tx_type: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default, rename = "marketCapSol")]
    pub market_cap_sol: Decimal,
    #[serde(default, rename = "vSolInBondingCurve")]
    pub v_sol_in_bonding_curve: Option<Decimal>,
    #[serde(default, rename = "vTokensInBondingCurve")]
    pub v_tokens_in_bonding_curve: Option<Decimal>,
    #[serde(
        default,
        alias = "uniqueHolders",
        alias = "holders",
        alias = "numHolders"
    )]
    pub holder_count: Option<u64>,
    #[serde(default)]
    pub signature: Option<String>,
}

impl TradeMessage {
    /// Explicit price when present, otherwise derived from the bonding
    /// curve reserves, otherwise zero.
    pub fn effective_price(&self) -> Decimal {
        if let Some(price) = self.price {
            return price;
        }
        match (self.v_sol_in_bonding_curve, self.v_tokens_in_bonding_curve) {
            (Some(sol), Some(tokens)) if tokens > Decimal::ZERO => sol / tokens,
            _ => Decimal::ZERO,
        }
    }

    pub fn into_event(self, observed_at: DateTime<Utc>) -> TradeUpdateEvent {
        let price = self.effective_price();
        TradeUpdateEvent {
            mint: self.mint,
            price,
            market_cap_sol: self.market_cap_sol,
            holder_count: self.holder_count,
            observed_at,
        }
    }
}

/// Outbound control message for the portal feed.
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeMessage {
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<Vec<String>>,
}

impl SubscribeMessage {
    pub fn new_tokens() -> Self {
        Self {
            method: "subscribeNewToken".to_string(),
            keys: None,
        }
    }

    pub fn token_trades(mints: Vec<String>) -> Self {
        Self {
            method: "subscribeTokenTrade".to_string(),
            keys: Some(mints),
        }
    }

    pub fn unsubscribe_token_trades(mints: Vec<String>) -> Self {
        Self {
            method: "unsubscribeTokenTrade".to_string(),
            keys: Some(mints),
        }
    }
}
