pub mod api;
pub mod app;
pub mod builder;
pub mod config;
pub mod logging;
pub mod scheduler;
pub mod state;
