pub mod api;
pub mod config;
pub mod error;
pub mod routes;
pub mod session;
pub mod storage;
pub mod store;
pub mod sync;
pub mod utils;
pub mod view;

#[cfg(feature = "ui")]
pub mod ui;
