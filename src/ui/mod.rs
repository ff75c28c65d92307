//! # User Interface
//!
//! Colored terminal output with clickable artifact links.

pub mod log;

pub use log::{debug, error, header, info, path_link, success, summary, warn, Log};
