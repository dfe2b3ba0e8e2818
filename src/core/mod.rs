pub mod breaker;
pub mod config;

pub use self::breaker::*;
pub use self::config::*;
