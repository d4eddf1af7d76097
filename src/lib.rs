//! Bar-driven market making for perpetual futures.
//!
//! The core (`indicators`, `strategy`, `paper`, `runner`) is synchronous and
//! exchange-agnostic. `binance` holds the network adapters.

pub mod binance;
pub mod config;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod output;
pub mod paper;
pub mod runner;
pub mod strategy;
pub mod types;

pub use error::{MmError, Result};
