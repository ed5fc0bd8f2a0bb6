//! Persistence, migration and backup engine for the payroll desktop app.
//!
//! The UI talks to [`commands`]; commands go through the switching
//! repository in [`repo`], which routes to the relational store, the legacy
//! JSON document, or both.

pub mod backup;
pub mod commands;
pub mod config;
pub mod db;
pub mod defaults;
pub mod error;
pub mod import;
pub mod legacy_store;
pub mod logging;
pub mod migrate;
pub mod model;
pub mod normalize;
pub mod repo;
pub mod state;
pub mod time;

pub use error::{AppError, AppResult};
pub use logging::{init_file_logging, init_logging};
pub use state::AppState;
