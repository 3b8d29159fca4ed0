pub mod catalog;
pub mod router;
pub mod thumbnail;
pub mod types;
