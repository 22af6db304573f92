//! PumpPortal adapters: the realtime data feed (websocket stream + event
//! router + wire types) and the trade-local execution API.

pub mod router;
pub mod stream;
pub mod trade_api;
pub mod types;
