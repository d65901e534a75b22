//! UI primitives for the KeepTower CLI.
//!
//! - **Context**: Output mode and terminal detection (TTY, width, color)
//! - **Theme**: Badge tokens and text styles
//! - **Render**: Tables, headers, receipts, hints
//! - **Progress**: Spinner and check report
//! - **Format**: String utilities (truncate, timestamps, sizes)

mod context;
pub mod format;
pub mod progress;
pub mod render;
pub mod theme;

pub use context::UiContext;
pub use render::{header, hint, kv, print, print_error, print_json, receipt, table};

pub use progress::{CheckReport, Outcome, Spinner};

pub use format::{format_bytes, format_datetime, format_timestamp, short_id, truncate, yes_no};
