pub mod config;
pub mod error;
pub mod modules;
pub mod sprinkler;
pub mod util;

pub use config::SprinklerConfig;
pub use error::{Result, SprinklerError};
pub use sprinkler::Sprinkler;
