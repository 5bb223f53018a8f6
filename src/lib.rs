#![forbid(unsafe_code)]

//! Host side of the Agent Client Protocol.
//!
//! Spawns coding agents with the user's login-shell environment, negotiates
//! sessions over JSON-RPC, and serves the agents' file requests.

pub mod acp;
pub mod config;
pub mod errors;
pub mod fs_delegate;
pub mod models;
pub mod session;
pub mod shell_env;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
