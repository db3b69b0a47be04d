pub mod config;
pub mod error;
pub mod loader;
pub mod platform;
pub mod resolver;

pub use config::*;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use platform::*;
pub use resolver::*;
