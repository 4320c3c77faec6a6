#![forbid(unsafe_code)]

pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod format;
pub mod gateway;
pub mod insight;
pub mod models;
pub mod pipeline;
pub mod sqlite;
pub mod store;
pub mod utils;

pub use cli::app::{Cli, Command};
pub use error::{BidlensError, ErrorKind, Result};
