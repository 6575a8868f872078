//! Vector Wave editorial console.
//!
//! A console over an editorial backend: content folders, topic analysis,
//! metadata and a streamed editorial pipeline. An assistant runtime drives it
//! through named actions and reads a projected context; the user drives the
//! same state from the terminal.

pub mod actions;
pub mod bridge;
pub mod client;
pub mod config;
pub mod console;
pub mod context;
pub mod error_taxonomy;
pub mod logging;
pub mod models;
pub mod repl;
pub mod session;
pub mod shell;
pub mod state;
pub mod suggestions;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;
