//! Command handlers, one module per top-level subcommand.

pub mod backup;
pub mod completions;
pub mod info;
pub mod init;
pub mod passwd;
pub mod policy;
pub mod records;
pub mod upgrade;
pub mod users;
