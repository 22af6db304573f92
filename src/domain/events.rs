use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A newly launched token observed on the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTokenEvent {
    pub mint: String,
    pub name: String,
    pub symbol: String,
    pub market_cap_sol: Decimal,
    pub initial_buy: Decimal,
    pub creator: Option<String>,
    pub observed_at: DateTime<Utc>,
}

/// A trade / price update for a token we may be tracking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeUpdateEvent {
    pub mint: String,
    pub price: Decimal,
    pub market_cap_sol: Decimal,
    pub holder_count: Option<u64>,
    pub observed_at: DateTime<Utc>,
}

/// Connection lifecycle states for the upstream feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Failed,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Reconnecting => "reconnecting",
            ConnectionStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Outbound notifications, one per underlying event. Delivery is
/// best-effort; a failed notification never affects trading.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    ConnectionStatus {
        status: ConnectionStatus,
        reconnect_count: u32,
    },
    NewToken {
        mint: String,
        market_cap_sol: Decimal,
        initial_buy: Decimal,
    },
    Buy {
        mint: String,
        price: Option<Decimal>,
        amount_sol: Decimal,
    },
    Sell {
        mint: String,
        price: Decimal,
        fraction_pct: Decimal,
        profit: Option<Decimal>,
    },
    PriceUpdate {
        mint: String,
        price: Decimal,
        market_cap_sol: Decimal,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_status_display() {
        assert_eq!(ConnectionStatus::Connected.to_string(), "connected");
        assert_eq!(ConnectionStatus::Reconnecting.to_string(), "reconnecting");
        assert_eq!(ConnectionStatus::Failed.to_string(), "failed");
    }
}
