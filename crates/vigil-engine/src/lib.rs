pub mod background;
pub mod config;
pub mod control;
pub mod controller;
pub mod host;
pub mod recovery;
pub mod store;

pub use vigil_common::condition;
pub use vigil_common::error;
pub use vigil_common::protocol;
pub use vigil_common::session;
