pub mod collect;
pub mod commons;
pub mod config;
pub mod download;
pub mod error;
pub mod geo_core;
pub mod logging;
pub mod products;
pub mod search;

pub use collect::bridge::BridgeCollect;
pub use collect::session::SessionContext;
pub use error::{ErrorKind, GeosysError, Result};
