pub mod condition;
pub mod error;
pub mod protocol;
pub mod session;
