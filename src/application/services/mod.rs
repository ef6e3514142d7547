//! Application services: the lifecycle state machine and its waits.

pub mod lifecycle;
pub mod poll;
pub mod readiness;
