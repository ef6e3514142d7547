//! Application layer: port traits and the lifecycle services built on them.

pub mod ports;
pub mod services;
