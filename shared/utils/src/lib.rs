pub mod config;
pub mod error;
pub mod logging;

pub use self::config::*;
pub use error::*;
pub use logging::*;
