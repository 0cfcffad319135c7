pub mod config;
pub mod directory;
pub mod domain;
pub mod error;
pub mod geocoding;
pub mod logging;
pub mod projector;
pub mod proximity;
pub mod server;
pub mod store;
