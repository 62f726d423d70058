//! The local proxy: configuration, server and shutdown handling.

mod config;
mod server;
mod signal;

pub use config::ProxyConfig;
pub use server::{ProxyBody, ProxyServer};
pub use signal::{cancel_on_signal, shutdown_signal};
