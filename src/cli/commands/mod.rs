//! CLI command implementations.

pub mod init_config;
pub mod once;
pub mod providers;
pub mod run;
pub mod validate;
