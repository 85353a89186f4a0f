pub mod chunk;
pub mod config;
pub mod diagnostics;
pub mod endpoint;
pub mod error;
pub mod format;
pub mod state;
