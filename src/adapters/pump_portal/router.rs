use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use crate::adapters::pump_portal::types::{NewTokenMessage, TradeMessage};
use crate::domain::events::{NewTokenEvent, TradeUpdateEvent};

/// A classified inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum RoutedMessage {
    /// Subscription acknowledgement; bookkeeping only, never dispatched.
    SubscriptionAck(String),
    NewToken(NewTokenEvent),
    TradeUpdate(TradeUpdateEvent),
    /// Anything unrecognized. Logged at debug and dropped.
    Unknown,
}

/// Shape-based classifier for the portal feed. The feed is loosely typed,
/// so classification is ordered and first-match-wins; malformed input can
/// never panic or error out of the read loop.
#[derive(Debug, Default)]
pub struct EventRouter {
    acks_seen: u64,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acks_seen(&self) -> u64 {
        self.acks_seen
    }

    pub fn classify(&mut self, raw: &str) -> RoutedMessage {
        let value: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(_) => {
                debug!(len = raw.len(), "unparseable feed message, dropping");
                return RoutedMessage::Unknown;
            }
        };
        let Some(obj) = value.as_object() else {
            debug!("non-object feed message, dropping");
            return RoutedMessage::Unknown;
        };

        // 1. Subscription ack.
        if let Some(message) = obj.get("message").and_then(Value::as_str) {
            self.acks_seen += 1;
            return RoutedMessage::SubscriptionAck(message.to_string());
        }

        let tx_type = obj.get("txType").and_then(Value::as_str);

        // 2. Top-level token creation: mint + marketCapSol, and either no
        // txType or an explicit create. Trade messages also carry these
        // fields, so the txType guard keeps them out of this arm.
        if obj.contains_key("mint")
            && obj.contains_key("marketCapSol")
            && matches!(tx_type, None | Some("create"))
        {
            return self.parse_new_token(&value);
        }

        // 3. Nested creation payload.
        if let Some(data) = obj.get("data") {
            let nested_tx = data.get("txType").and_then(Value::as_str);
            if nested_tx == Some("create") {
                return self.parse_new_token(data);
            }
        }

        // 4. Trade update.
        let is_trade = matches!(tx_type, Some("trade") | Some("buy") | Some("sell"))
            || (tx_type.is_none() && obj.contains_key("price") && obj.contains_key("mint"));
        if is_trade {
            return self.parse_trade(&value);
        }

        debug!("unrecognized feed message shape, dropping");
        RoutedMessage::Unknown
    }

    fn parse_new_token(&self, value: &Value) -> RoutedMessage {
        match serde_json::from_value::<NewTokenMessage>(value.clone()) {
            Ok(msg) if !msg.mint.is_empty() => {
                RoutedMessage::NewToken(msg.into_event(Utc::now()))
            }
            _ => {
                debug!("token creation message missing mint, dropping");
                RoutedMessage::Unknown
            }
        }
    }

    fn parse_trade(&self, value: &Value) -> RoutedMessage {
        match serde_json::from_value::<TradeMessage>(value.clone()) {
            Ok(msg) if !msg.mint.is_empty() => {
                RoutedMessage::TradeUpdate(msg.into_event(Utc::now()))
            }
            _ => {
                debug!("trade message missing mint, dropping");
                RoutedMessage::Unknown
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn ack_classified_first() {
        let mut router = EventRouter::new();
        let routed = router.classify(r#"{"message": "Successfully subscribed to token trades"}"#);
        assert!(matches!(routed, RoutedMessage::SubscriptionAck(_)));
        assert_eq!(router.acks_seen(), 1);
    }

    #[test]
    fn top_level_creation_routes_as_new_token() {
        let mut router = EventRouter::new();
        let routed = router.classify(
            r#"{"mint":"M1","name":"T","symbol":"T","marketCapSol":500,"initialBuy":2}"#,
        );
        match routed {
            RoutedMessage::NewToken(event) => {
                assert_eq!(event.mint, "M1");
                assert_eq!(event.market_cap_sol, dec!(500));
            }
            other => panic!("expected NewToken, got {:?}", other),
        }
    }

    #[test]
    fn trade_with_mcap_routes_as_trade_not_creation() {
        let mut router = EventRouter::new();
        let routed = router.classify(
            r#"{"mint":"M1","txType":"buy","price":0.05,"marketCapSol":600}"#,
        );
        assert!(matches!(routed, RoutedMessage::TradeUpdate(_)));
    }

    #[test]
    fn nested_creation_unwrapped() {
        let mut router = EventRouter::new();
        let routed = router.classify(
            r#"{"data":{"mint":"M1","txType":"create","marketCapSol":400,"initialBuy":1}}"#,
        );
        match routed {
            RoutedMessage::NewToken(event) => assert_eq!(event.market_cap_sol, dec!(400)),
            other => panic!("expected NewToken, got {:?}", other),
        }
    }

    #[test]
    fn typeless_price_message_routes_as_trade() {
        let mut router = EventRouter::new();
        let routed = router.classify(r#"{"mint":"M1","price":0.07}"#);
        match routed {
            RoutedMessage::TradeUpdate(event) => assert_eq!(event.price, dec!(0.07)),
            other => panic!("expected TradeUpdate, got {:?}", other),
        }
    }

    #[test]
    fn garbage_never_panics() {
        let mut router = EventRouter::new();
        assert_eq!(router.classify("not json at all"), RoutedMessage::Unknown);
        assert_eq!(router.classify("[1,2,3]"), RoutedMessage::Unknown);
        assert_eq!(router.classify(r#"{"foo":"bar"}"#), RoutedMessage::Unknown);
        assert_eq!(router.classify(""), RoutedMessage::Unknown);
    }

    #[test]
    fn creation_without_mint_dropped() {
        let mut router = EventRouter::new();
        assert_eq!(
            router.classify(r#"{"mint":"","marketCapSol":500}"#),
            RoutedMessage::Unknown
        );
    }
}
