pub mod events;
pub mod filter;
pub mod ledger;
pub mod positions;
pub mod settlement;
pub mod tracker;
