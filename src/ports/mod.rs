pub mod execution;
pub mod mocks;
pub mod notify;
pub mod oracle;
