//! Domain types shared by every trendwatch crate.

pub mod types;
