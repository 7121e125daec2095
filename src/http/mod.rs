//! Web layer: visualizer API, host risk mutation and live updates

pub mod handler;
pub mod server;

pub use server::HttpServer;
