//! Formatting helpers shared by the terminal client.

pub mod format;

pub use format::{format_countdown, format_datetime, format_relative, mask_token, truncate_string};
