pub mod cdp;
pub mod host;
pub mod inject;

pub use host::ChromiumHost;
