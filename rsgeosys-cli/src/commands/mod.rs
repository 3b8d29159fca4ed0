//! CLI command implementations.
//!
//! - [`products`] - Catalog listing (no network access)
//! - [`search`] - Coverage search with thumbnails
//! - [`create`] - Field map creation and download
//! - [`difference`] - Difference map between two dates
//! - [`zones`] - Management-zone map and zone layers

pub mod common;
pub mod create;
pub mod difference;
pub mod products;
pub mod search;
pub mod zones;
