//! Client bindings for VDR's dbus2vdr control interface.
//!
//! The [`facility`] module holds one proxy per remote facility (channels, EPG,
//! timers, ...). [`VdrClient`] builds them once VDR reports `Ready`, rebuilds them
//! after VDR restarts and dispatches VDR's signals to registered callbacks.

pub mod client;
pub mod config;
pub mod error;
pub mod facility;
pub mod lifecycle;
pub mod signals;

// Re-export commonly used types for convenience
pub use client::VdrClient;
pub use config::Config;
pub use error::{Result, VdrError};
pub use facility::{Facility, VdrStatus};
pub use lifecycle::Readiness;
pub use signals::VdrSignal;
