pub mod session;

pub use session::{BotSession, SessionError};
