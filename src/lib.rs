pub mod config;
pub mod env;
pub mod tasks;
