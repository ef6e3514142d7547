//! Infrastructure implementations of the application ports.

pub mod api;
pub mod command_runner;
pub mod config;
pub mod redirect;
pub mod ssh;
