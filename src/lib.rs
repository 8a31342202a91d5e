pub mod app;
pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod image;
pub mod logging;
pub mod network;
pub mod records;
pub mod remote;
pub mod store;
pub mod sync;
