//! Application layer
//!
//! Configuration loading and the [`CucpApp`] lifecycle: N2 association and NG
//! Setup first, then the F1 listener, then an orderly shutdown that drains the
//! state machines.

mod config_loader;
mod cucp_app;

pub use config_loader::{load_config, load_config_from_str, ConfigError};
pub use cucp_app::{AppError, CucpApp};
