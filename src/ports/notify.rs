use tokio::sync::mpsc;
use tracing::info;

use crate::domain::events::Notification;

/// Outbound notification seam. Delivery is best-effort and synchronous;
/// implementations must never block the event loop.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: Notification);
}

/// Discards everything. Useful in tests and for headless runs.
#[derive(Debug, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _event: Notification) {}
}

/// Logs notifications through tracing.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: Notification) {
        match event {
            Notification::ConnectionStatus {
                status,
                reconnect_count,
            } => info!(%status, reconnect_count, "feed status"),
            Notification::NewToken {
                mint,
                market_cap_sol,
                initial_buy,
            } => info!(%mint, %market_cap_sol, %initial_buy, "new token"),
            Notification::Buy {
                mint,
                price,
                amount_sol,
            } => info!(%mint, ?price, %amount_sol, "bought"),
            Notification::Sell {
                mint,
                price,
                fraction_pct,
                profit,
            } => info!(%mint, %price, %fraction_pct, ?profit, "sold"),
            Notification::PriceUpdate {
                mint,
                price,
                market_cap_sol,
            } => info!(%mint, %price, %market_cap_sol, "price update"),
        }
    }
}

/// Forwards notifications over an unbounded channel. Send errors (receiver
/// gone) are ignored; notifications never fail the caller.
#[derive(Debug)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, event: Notification) {
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::ConnectionStatus;

    #[tokio::test]
    async fn channel_notifier_forwards_events() {
        let (notifier, mut rx) = ChannelNotifier::new();
        notifier.notify(Notification::ConnectionStatus {
            status: ConnectionStatus::Connected,
            reconnect_count: 0,
        });
        let received = rx.recv().await.unwrap();
        assert!(matches!(
            received,
            Notification::ConnectionStatus {
                status: ConnectionStatus::Connected,
                ..
            }
        ));
    }

    #[test]
    fn channel_notifier_survives_dropped_receiver() {
        let (notifier, rx) = ChannelNotifier::new();
        drop(rx);
        notifier.notify(Notification::NewToken {
            mint: "M1".to_string(),
            market_cap_sol: rust_decimal_macros::dec!(100),
            initial_buy: rust_decimal_macros::dec!(1),
        });
    }
}
