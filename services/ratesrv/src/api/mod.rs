//! HTTP handlers
//!
//! - `price`: rate lookup
//! - `catalog`: rule and country-default listings
//! - `admin`: forced reload and health

pub mod admin;
pub mod catalog;
pub mod price;
