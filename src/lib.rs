//! Venue Probe - Core Library
//! JSON-RPC order lifecycle probe: logon, status query, place, cancel

// Public modules
pub mod core;
pub mod protocol;
pub mod session;
pub mod transport;

// Re-exports
pub use core::{Config, Error, Result};
pub use session::{Dispatcher, Outcome};
