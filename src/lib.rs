//! RentSpot Sniper - pump.fun launch sniper with trailing-stop exits
//!
//! Streams token creations from the PumpPortal feed, snipes launches that
//! pass eligibility, and manages each position through a volatility-scaled
//! trailing-stop state machine. Reclaimed rent spots are settled in batches.
//!
//! # Modules
//!
//! - `domain`: Core business logic (filter, tracker, positions, ledger, settlement)
//! - `ports`: Trait abstractions (TradePort, PriceOracle, Notifier) and test doubles
//! - `adapters`: PumpPortal websocket feed and trade-local HTTP execution
//! - `config`: Configuration loading and validation
//! - `application`: BotSession event loop

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use application::{BotSession, SessionError};
